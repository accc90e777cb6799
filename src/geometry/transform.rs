//! Signed axis permutations and block-to-block index transformations.
//!
//! A [`Rotation`] maps destination axis `i` to a source axis plus an optional
//! reflection. Reflections act differently on cell-centered and node-centered
//! coordinates: a cell index `v` reflects to `-v - 1` (cell `0` and cell `-1`
//! face each other across the origin plane), while a node index reflects to
//! `-v` (the origin plane is its own mirror image). Getting these two rules
//! right is what keeps face data aligned across block boundaries.

use core::fmt;

use serde::{Deserialize, Serialize};

use crate::decomp_error::DecompError;
use crate::geometry::{BlockId, IndexBox, IntVector};

/// A signed permutation of the coordinate axes.
///
/// Entry `i` of the map is `(source_axis, reflected)`: destination component
/// `i` is read from that source component, negated when `reflected` is set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Rotation<const D: usize> {
    #[serde(with = "crate::geometry::serde_array")]
    map: [(usize, bool); D],
}

impl<const D: usize> Rotation<D> {
    /// The identity rotation.
    pub fn identity() -> Self {
        Self {
            map: core::array::from_fn(|d| (d, false)),
        }
    }

    /// Rotation from an explicit axis map.
    ///
    /// # Errors
    /// [`DecompError::InvalidRotation`] unless every axis in `0..D` appears as
    /// a source exactly once.
    pub fn new(map: [(usize, bool); D]) -> Result<Self, DecompError> {
        let mut seen = [false; D];
        for (i, &(s, _)) in map.iter().enumerate() {
            if s >= D {
                return Err(DecompError::InvalidRotation(format!(
                    "entry {i} names source axis {s}, dimension is {D}"
                )));
            }
            if seen[s] {
                return Err(DecompError::InvalidRotation(format!(
                    "source axis {s} appears more than once"
                )));
            }
            seen[s] = true;
        }
        Ok(Self { map })
    }

    /// `(source_axis, reflected)` feeding destination axis `i`.
    pub fn source_of(&self, dst_axis: usize) -> (usize, bool) {
        self.map[dst_axis]
    }

    /// Destination axis that source axis `a` lands on.
    pub fn image_axis(&self, src_axis: usize) -> usize {
        // map is a permutation, so exactly one entry matches
        (0..D).find(|&i| self.map[i].0 == src_axis).unwrap_or(src_axis)
    }

    pub fn is_identity(&self) -> bool {
        (0..D).all(|d| self.map[d] == (d, false))
    }

    /// Apply to a cell-centered coordinate (reflection rule `v -> -v - 1`).
    pub fn apply_cell(&self, v: &IntVector<D>) -> IntVector<D> {
        let mut out = IntVector::zero();
        for i in 0..D {
            let (s, flip) = self.map[i];
            out[i] = if flip { -v[s] - 1 } else { v[s] };
        }
        out
    }

    /// Apply to a node-centered coordinate (reflection rule `v -> -v`).
    pub fn apply_node(&self, v: &IntVector<D>) -> IntVector<D> {
        let mut out = IntVector::zero();
        for i in 0..D {
            let (s, flip) = self.map[i];
            out[i] = if flip { -v[s] } else { v[s] };
        }
        out
    }

    /// The inverse rotation.
    pub fn inverse(&self) -> Rotation<D> {
        let mut map = [(0usize, false); D];
        for i in 0..D {
            let (s, flip) = self.map[i];
            map[s] = (i, flip);
        }
        Rotation { map }
    }

    /// Composition: apply `self`, then `next`.
    pub fn then(&self, next: &Rotation<D>) -> Rotation<D> {
        let map = core::array::from_fn(|i| {
            let (m, f2) = next.map[i];
            let (s, f1) = self.map[m];
            (s, f1 ^ f2)
        });
        Rotation { map }
    }
}

impl<const D: usize> Default for Rotation<D> {
    fn default() -> Self {
        Self::identity()
    }
}

impl<const D: usize> fmt::Display for Rotation<D> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, &(s, flip)) in self.map.iter().enumerate() {
            if i > 0 {
                write!(f, " ")?;
            }
            write!(f, "{i}<-{}{s}", if flip { "-" } else { "+" })?;
        }
        Ok(())
    }
}

/// An affine index transformation between two blocks.
///
/// Applies the rotation about the origin, then translates by `offset`; the
/// result lives in `dst_block`. The identity transformation is the common
/// single-block case.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transformation<const D: usize> {
    rotation: Rotation<D>,
    offset: IntVector<D>,
    src_block: BlockId,
    dst_block: BlockId,
}

impl<const D: usize> Transformation<D> {
    /// The identity transformation within block 0.
    pub fn identity() -> Self {
        Self {
            rotation: Rotation::identity(),
            offset: IntVector::zero(),
            src_block: BlockId::ZERO,
            dst_block: BlockId::ZERO,
        }
    }

    pub fn new(
        rotation: Rotation<D>,
        offset: IntVector<D>,
        src_block: BlockId,
        dst_block: BlockId,
    ) -> Self {
        Self {
            rotation,
            offset,
            src_block,
            dst_block,
        }
    }

    /// Pure translation within one block.
    pub fn translation(offset: IntVector<D>, block: BlockId) -> Self {
        Self {
            rotation: Rotation::identity(),
            offset,
            src_block: block,
            dst_block: block,
        }
    }

    pub fn rotation(&self) -> &Rotation<D> {
        &self.rotation
    }

    pub fn offset(&self) -> &IntVector<D> {
        &self.offset
    }

    pub fn src_block(&self) -> BlockId {
        self.src_block
    }

    pub fn dst_block(&self) -> BlockId {
        self.dst_block
    }

    pub fn is_identity(&self) -> bool {
        self.rotation.is_identity()
            && self.offset == IntVector::zero()
            && self.src_block == self.dst_block
    }

    /// Map a cell index from the source block to the destination block.
    pub fn transform_cell_index(&self, v: &IntVector<D>) -> IntVector<D> {
        self.rotation.apply_cell(v) + self.offset
    }

    /// Map a node index from the source block to the destination block.
    pub fn transform_node_index(&self, v: &IntVector<D>) -> IntVector<D> {
        self.rotation.apply_node(v) + self.offset
    }

    /// Map a cell box into the destination block. Reflections swap which
    /// corner is lower, so corners are re-sorted componentwise.
    pub fn transform_cell_box(&self, box_: &IndexBox<D>) -> IndexBox<D> {
        debug_assert_eq!(
            box_.block(),
            self.src_block,
            "transforming a box from the wrong block"
        );
        if box_.is_empty() {
            return IndexBox::empty_in(self.dst_block);
        }
        let a = self.transform_cell_index(box_.lower());
        let b = self.transform_cell_index(box_.upper());
        IndexBox::with_block(a.min(&b), a.max(&b), self.dst_block)
    }

    /// The transformation mapping destination indices back to source indices.
    pub fn inverse(&self) -> Transformation<D> {
        let rotation = self.rotation.inverse();
        let mut offset = IntVector::zero();
        for i in 0..D {
            let (s, flip) = self.rotation.source_of(i);
            // reflection absorbs the sign change of the undone translation
            offset[s] = if flip { self.offset[i] } else { -self.offset[i] };
        }
        Transformation {
            rotation,
            offset,
            src_block: self.dst_block,
            dst_block: self.src_block,
        }
    }
}

impl<const D: usize> Default for Transformation<D> {
    fn default() -> Self {
        Self::identity()
    }
}

impl<const D: usize> fmt::Display for Transformation<D> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "rotation [{}] offset {} block {} -> {}",
            self.rotation, self.offset, self.src_block, self.dst_block
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn quarter_turn() -> Rotation<2> {
        // dst x reads -y, dst y reads +x
        Rotation::new([(1, true), (0, false)]).unwrap()
    }

    #[test]
    fn rejects_non_permutations() {
        assert!(Rotation::<2>::new([(0, false), (0, true)]).is_err());
        assert!(Rotation::<2>::new([(2, false), (1, false)]).is_err());
    }

    #[test]
    fn cell_and_node_reflection_rules() {
        let flip = Rotation::<1>::new([(0, true)]).unwrap();
        assert_eq!(flip.apply_cell(&IntVector::new([0])), IntVector::new([-1]));
        assert_eq!(flip.apply_cell(&IntVector::new([3])), IntVector::new([-4]));
        assert_eq!(flip.apply_node(&IntVector::new([0])), IntVector::new([0]));
        assert_eq!(flip.apply_node(&IntVector::new([3])), IntVector::new([-3]));
    }

    #[test]
    fn inverse_rotation_round_trips_both_centerings() {
        let r = quarter_turn();
        let inv = r.inverse();
        let v = IntVector::new([5, -2]);
        assert_eq!(inv.apply_cell(&r.apply_cell(&v)), v);
        assert_eq!(inv.apply_node(&r.apply_node(&v)), v);
        assert!(r.then(&inv).is_identity());
    }

    #[test]
    fn image_axis_tracks_the_permutation() {
        let r = quarter_turn();
        assert_eq!(r.image_axis(1), 0);
        assert_eq!(r.image_axis(0), 1);
    }

    #[test]
    fn box_transform_resorts_corners() {
        let t = Transformation::new(
            quarter_turn(),
            IntVector::new([10, 0]),
            BlockId::ZERO,
            BlockId(1),
        );
        let b = IndexBox::new(IntVector::new([0, 0]), IntVector::new([2, 3]));
        let tb = t.transform_cell_box(&b);
        // y in [0,3] maps through -y-1 to [-4,-1], then +10 -> [6,9]
        assert_eq!(*tb.lower(), IntVector::new([6, 0]));
        assert_eq!(*tb.upper(), IntVector::new([9, 2]));
        assert_eq!(tb.block(), BlockId(1));
        assert_eq!(tb.num_cells(), b.num_cells());
    }

    #[test]
    fn inverse_transformation_round_trips_indices_and_boxes() {
        let t = Transformation::new(
            quarter_turn(),
            IntVector::new([7, -3]),
            BlockId(2),
            BlockId(5),
        );
        let inv = t.inverse();
        let v = IntVector::new([4, 9]);
        assert_eq!(inv.transform_cell_index(&t.transform_cell_index(&v)), v);
        assert_eq!(inv.transform_node_index(&t.transform_node_index(&v)), v);
        let b = IndexBox::with_block(IntVector::new([-1, 2]), IntVector::new([3, 4]), BlockId(2));
        assert_eq!(inv.transform_cell_box(&t.transform_cell_box(&b)), b);
        assert_eq!(inv.src_block(), BlockId(5));
        assert_eq!(inv.dst_block(), BlockId(2));
    }

    #[test]
    fn serde_round_trip() {
        let t = Transformation::new(
            quarter_turn(),
            IntVector::new([1, 2]),
            BlockId::ZERO,
            BlockId(3),
        );
        let json = serde_json::to_string(&t).unwrap();
        let back: Transformation<2> = serde_json::from_str(&json).unwrap();
        assert_eq!(back, t);
    }
}
