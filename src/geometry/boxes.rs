//! Axis-aligned boxes over the cell index space.

use core::fmt;

use serde::{Deserialize, Serialize};

use crate::geometry::IntVector;

/// Identifier of a block in a multiblock index space.
///
/// Single-block problems use [`BlockId::ZERO`] everywhere. Boxes in different
/// blocks never intersect directly; a coordinate transformation rebases one
/// block's indices into the other's.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
pub struct BlockId(pub u32);

impl BlockId {
    pub const ZERO: BlockId = BlockId(0);
}

impl fmt::Display for BlockId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// An axis-aligned box of cells, closed on both ends.
///
/// `lower` and `upper` are the corner cell indices and both belong to the box.
/// The box is empty exactly when `upper[d] < lower[d]` on some axis; the
/// canonical empty box is `[0 ... -1]`. Representable state satisfies
/// `lower[d] <= upper[d] + 1`, so a box is at most "empty by one" per axis and
/// extents never go negative.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct IndexBox<const D: usize> {
    lower: IntVector<D>,
    upper: IntVector<D>,
    block: BlockId,
}

impl<const D: usize> IndexBox<D> {
    /// Box spanning `lower ..= upper` in block 0.
    pub fn new(lower: IntVector<D>, upper: IntVector<D>) -> Self {
        Self {
            lower,
            upper,
            block: BlockId::ZERO,
        }
    }

    /// Box spanning `lower ..= upper` in the given block.
    pub fn with_block(lower: IntVector<D>, upper: IntVector<D>, block: BlockId) -> Self {
        Self {
            lower,
            upper,
            block,
        }
    }

    /// The canonical empty box in the given block.
    pub fn empty_in(block: BlockId) -> Self {
        Self {
            lower: IntVector::zero(),
            upper: IntVector::splat(-1),
            block,
        }
    }

    pub fn lower(&self) -> &IntVector<D> {
        &self.lower
    }

    pub fn upper(&self) -> &IntVector<D> {
        &self.upper
    }

    pub fn block(&self) -> BlockId {
        self.block
    }

    /// `true` if any axis has crossed corners.
    pub fn is_empty(&self) -> bool {
        (0..D).any(|d| self.upper[d] < self.lower[d])
    }

    /// Number of cells along `axis`, zero for empty boxes.
    pub fn extent(&self, axis: usize) -> i64 {
        (self.upper[axis] - self.lower[axis] + 1).max(0)
    }

    /// Per-axis cell counts, zero on empty axes.
    pub fn extents(&self) -> IntVector<D> {
        let mut out = IntVector::zero();
        for d in 0..D {
            out[d] = self.extent(d);
        }
        out
    }

    /// Total number of cells; zero if the box is empty.
    pub fn num_cells(&self) -> i64 {
        if self.is_empty() {
            return 0;
        }
        self.extents().product()
    }

    /// `true` if `point` lies inside the box.
    pub fn contains(&self, point: &IntVector<D>) -> bool {
        self.lower.all_le(point) && self.upper.all_ge(point)
    }

    /// `true` if every cell of `other` lies inside `self`. Empty boxes are
    /// contained in everything.
    pub fn contains_box(&self, other: &IndexBox<D>) -> bool {
        other.is_empty() || (self.contains(&other.lower) && self.contains(&other.upper))
    }

    /// Componentwise intersection. Boxes must share a block; the result may be
    /// empty.
    pub fn intersect(&self, other: &IndexBox<D>) -> IndexBox<D> {
        debug_assert_eq!(
            self.block, other.block,
            "intersecting boxes from different blocks"
        );
        let lower = self.lower.max(&other.lower);
        let upper = self.upper.min(&other.upper);
        if (0..D).any(|d| upper[d] < lower[d]) {
            return Self::empty_in(self.block);
        }
        Self {
            lower,
            upper,
            block: self.block,
        }
    }

    /// `true` if the boxes share at least one cell.
    pub fn intersects(&self, other: &IndexBox<D>) -> bool {
        !self.intersect(other).is_empty()
    }

    /// Box shifted by `offset`.
    pub fn translate(&self, offset: &IntVector<D>) -> IndexBox<D> {
        Self {
            lower: self.lower + *offset,
            upper: self.upper + *offset,
            block: self.block,
        }
    }

    /// Box grown by `width` cells on both ends of every axis. Negative widths
    /// shrink; an over-shrunk box comes back empty.
    pub fn grow(&self, width: &IntVector<D>) -> IndexBox<D> {
        if self.is_empty() {
            return *self;
        }
        let lower = self.lower - *width;
        let upper = self.upper + *width;
        if (0..D).any(|d| upper[d] < lower[d]) {
            return Self::empty_in(self.block);
        }
        Self {
            lower,
            upper,
            block: self.block,
        }
    }

    /// Box with the lower corner moved by `n` along one axis (positive `n`
    /// moves the face outward).
    pub fn grow_lower(&self, axis: usize, n: i64) -> IndexBox<D> {
        let mut out = *self;
        out.lower[axis] -= n;
        out
    }

    /// Box with the upper corner moved by `n` along one axis (positive `n`
    /// moves the face outward).
    pub fn grow_upper(&self, axis: usize, n: i64) -> IndexBox<D> {
        let mut out = *self;
        out.upper[axis] += n;
        out
    }

    /// Cells of `self` not covered by `other`, as at most `2 * D` disjoint
    /// boxes. The usual axis sweep: slabs below and above `other` are peeled
    /// off one axis at a time, and whatever remains is inside `other`.
    pub fn subtract(&self, other: &IndexBox<D>) -> Vec<IndexBox<D>> {
        if self.is_empty() {
            return Vec::new();
        }
        if !self.intersects(other) {
            return vec![*self];
        }
        let mut out = Vec::new();
        let mut rest = *self;
        for d in 0..D {
            if rest.lower[d] < other.lower[d] {
                let mut slab = rest;
                slab.upper[d] = other.lower[d] - 1;
                out.push(slab);
                rest.lower[d] = other.lower[d];
            }
            if rest.upper[d] > other.upper[d] {
                let mut slab = rest;
                slab.lower[d] = other.upper[d] + 1;
                out.push(slab);
                rest.upper[d] = other.upper[d];
            }
        }
        out
    }

    /// Row-major linear position of `point` within the box, last axis fastest.
    /// `None` if the point is outside.
    pub fn linear_index(&self, point: &IntVector<D>) -> Option<usize> {
        if !self.contains(point) {
            return None;
        }
        let mut pos: i64 = 0;
        for d in 0..D {
            pos = pos * self.extent(d) + (point[d] - self.lower[d]);
        }
        Some(pos as usize)
    }
}

impl<const D: usize> fmt::Display for IndexBox<D> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{} ... {}] (block {})", self.lower, self.upper, self.block)
    }
}
