//! Outerside data: values stored only on a patch's outermost side planes.
//!
//! Boundary-sum algorithms never touch a patch's interior sides, so storing
//! the full side-centered array would waste almost all of it. This container
//! keeps exactly the `2 * D` outer face planes, each a degenerate box in the
//! side convention, packed back to back in one flat buffer the way an atlas
//! maps points to slices.

use num_traits::Zero;
use serde::{Deserialize, Serialize};

use crate::debug_invariants::DebugInvariants;
use crate::decomp_error::DecompError;
use crate::geometry::IndexBox;
use crate::overlap::SideIndex;

/// Which of the two faces along an axis.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Side {
    /// The face at the lower end of the axis.
    Lower,
    /// The face at the upper end of the axis.
    Upper,
}

impl Side {
    /// Both sides, lower first; the storage and transfer order.
    pub const ALL: [Side; 2] = [Side::Lower, Side::Upper];

    fn index(self) -> usize {
        match self {
            Side::Lower => 0,
            Side::Upper => 1,
        }
    }
}

/// The side-convention box of one outer face of `box_`: the plane of sides
/// at the lower or upper end of `axis`, spanning the box's cells on every
/// other axis. Computable from patch metadata alone, so both endpoints of a
/// transfer can name remote faces without holding remote data.
pub fn face_box_of<const D: usize>(box_: &IndexBox<D>, axis: usize, side: Side) -> IndexBox<D> {
    if box_.is_empty() {
        return IndexBox::empty_in(box_.block());
    }
    let mut lower = *box_.lower();
    let mut upper = *box_.upper();
    let plane = match side {
        Side::Lower => box_.lower()[axis],
        Side::Upper => box_.upper()[axis] + 1,
    };
    lower[axis] = plane;
    upper[axis] = plane;
    IndexBox::with_block(lower, upper, box_.block())
}

/// Storage for `depth` components on the outer faces of one patch.
///
/// Values are laid out face by face (axis-major, lower before upper), within
/// a face in row-major element order with the last axis fastest, and with the
/// `depth` components of one element adjacent. Rows of elements are therefore
/// contiguous runs of `depth * row_len` values, which is what the transfer
/// fast path leans on.
#[derive(Debug, Clone, PartialEq)]
pub struct OutersideData<V, const D: usize> {
    box_: IndexBox<D>,
    depth: usize,
    /// (offset, values) per (axis, side) into `data`.
    spans: [[(usize, usize); 2]; D],
    face_boxes: [[IndexBox<D>; 2]; D],
    data: Vec<V>,
}

impl<V: Copy + Zero, const D: usize> OutersideData<V, D> {
    /// Zero-initialized storage for the outer faces of `box_`.
    ///
    /// # Errors
    /// - [`DecompError::EmptyPatchBox`] if `box_` has no cells.
    /// - [`DecompError::ZeroDepth`] if `depth` is zero.
    pub fn new(box_: IndexBox<D>, depth: usize) -> Result<Self, DecompError> {
        if box_.is_empty() {
            return Err(DecompError::EmptyPatchBox(box_.to_string()));
        }
        if depth == 0 {
            return Err(DecompError::ZeroDepth);
        }
        let face_boxes: [[IndexBox<D>; 2]; D] = core::array::from_fn(|axis| {
            [
                face_box_of(&box_, axis, Side::Lower),
                face_box_of(&box_, axis, Side::Upper),
            ]
        });
        let mut spans = [[(0usize, 0usize); 2]; D];
        let mut offset = 0usize;
        for axis in 0..D {
            for side in 0..2 {
                let values = face_boxes[axis][side].num_cells() as usize * depth;
                spans[axis][side] = (offset, values);
                offset += values;
            }
        }
        let out = Self {
            box_,
            depth,
            spans,
            face_boxes,
            data: vec![V::zero(); offset],
        };
        out.debug_assert_invariants();
        Ok(out)
    }

    /// Set every value on every face to `v`.
    pub fn fill(&mut self, v: V) {
        self.data.fill(v);
    }
}

impl<V, const D: usize> OutersideData<V, D> {
    /// The cell box whose outer faces this data covers.
    pub fn patch_box(&self) -> &IndexBox<D> {
        &self.box_
    }

    /// Components per side element.
    pub fn depth(&self) -> usize {
        self.depth
    }

    /// Total stored values across all faces and components.
    pub fn total_values(&self) -> usize {
        self.data.len()
    }

    /// The side-convention box of one face.
    ///
    /// # Panics
    /// Panics if `axis >= D`.
    pub fn face_box(&self, axis: usize, side: Side) -> &IndexBox<D> {
        &self.face_boxes[axis][side.index()]
    }

    /// All values of one face, in storage order.
    ///
    /// # Panics
    /// Panics if `axis >= D`.
    pub fn face_slice(&self, axis: usize, side: Side) -> &[V] {
        let (offset, len) = self.spans[axis][side.index()];
        &self.data[offset..offset + len]
    }

    /// Mutable values of one face, in storage order.
    ///
    /// # Panics
    /// Panics if `axis >= D`.
    pub fn face_slice_mut(&mut self, axis: usize, side: Side) -> &mut [V] {
        let (offset, len) = self.spans[axis][side.index()];
        &mut self.data[offset..offset + len]
    }

    /// The whole buffer; offsets from [`OutersideData::offset_of`] index into
    /// it.
    pub fn values(&self) -> &[V] {
        &self.data
    }

    /// Mutable view of the whole buffer.
    pub fn values_mut(&mut self) -> &mut [V] {
        &mut self.data
    }

    /// Flat offset of one component of one side element, or `None` if the
    /// element is not on any outer face of this patch.
    pub fn offset_of(&self, index: &SideIndex<D>, component: usize) -> Option<usize> {
        debug_assert!(component < self.depth);
        if index.axis >= D {
            return None;
        }
        for side in Side::ALL {
            let face = &self.face_boxes[index.axis][side.index()];
            if let Some(pos) = face.linear_index(&index.coord) {
                let (offset, _) = self.spans[index.axis][side.index()];
                return Some(offset + pos * self.depth + component);
            }
        }
        None
    }
}

impl<V, const D: usize> DebugInvariants for OutersideData<V, D> {
    fn debug_assert_invariants(&self) {
        crate::debug_invariants!(self.validate_invariants(), "OutersideData invalid");
    }

    fn validate_invariants(&self) -> Result<(), DecompError> {
        if self.depth == 0 {
            return Err(DecompError::ZeroDepth);
        }
        let mut expected = 0usize;
        for axis in 0..D {
            for side in Side::ALL {
                let face = &self.face_boxes[axis][side.index()];
                if face.extent(axis) != 1 {
                    return Err(DecompError::SelfCheckFailed { problems: 1 });
                }
                let (offset, len) = self.spans[axis][side.index()];
                if offset != expected || len != face.num_cells() as usize * self.depth {
                    return Err(DecompError::SelfCheckFailed { problems: 1 });
                }
                expected = offset + len;
            }
        }
        if expected != self.data.len() {
            return Err(DecompError::SelfCheckFailed { problems: 1 });
        }
        Ok(())
    }
}
