//! Side-centered geometry: where face-located data from two patches lines up.
//!
//! A value with side centering lives on the planes between cells. Along its
//! normal axis a side index is node-valued, so a box of sides has one more
//! plane than the matching box of cells; the "side convention" below extends a
//! cell box by one on the upper end of the normal axis. Overlap calculation
//! brings both patches into the destination index space, converts to the side
//! convention per direction, and intersects.

use serde::{Deserialize, Serialize};

use crate::decomp_error::DecompError;
use crate::geometry::{IndexBox, IntVector, Transformation};
use crate::overlap::side_overlap::SideOverlap;

/// One side element: the plane with the given normal `axis` at `coord`.
///
/// The normal component of `coord` is node-valued (cell `c` is bounded by
/// sides `c` and `c + 1`); the other components are cell-valued.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SideIndex<const D: usize> {
    pub axis: usize,
    pub coord: IntVector<D>,
}

impl<const D: usize> core::fmt::Display for SideIndex<D> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{}/{}", self.axis, self.coord)
    }
}

/// The geometry of one patch's side-centered data: its cell box plus ghost
/// widths.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SideGeometry<const D: usize> {
    box_: IndexBox<D>,
    ghosts: IntVector<D>,
}

impl<const D: usize> SideGeometry<D> {
    /// # Errors
    /// [`DecompError::InvalidGhostWidth`] if any ghost width is negative.
    pub fn new(box_: IndexBox<D>, ghosts: IntVector<D>) -> Result<Self, DecompError> {
        if !ghosts.all_ge(&IntVector::zero()) {
            return Err(DecompError::InvalidGhostWidth(ghosts.to_string()));
        }
        Ok(Self { box_, ghosts })
    }

    /// The patch interior, in cell convention.
    pub fn patch_box(&self) -> &IndexBox<D> {
        &self.box_
    }

    pub fn ghosts(&self) -> &IntVector<D> {
        &self.ghosts
    }

    /// Interior plus ghost cells.
    pub fn ghost_box(&self) -> IndexBox<D> {
        self.box_.grow(&self.ghosts)
    }

    /// The box of sides with normal `axis` belonging to the cells of
    /// `cell_box`: one more plane along the normal.
    pub fn to_side_box(cell_box: &IndexBox<D>, axis: usize) -> IndexBox<D> {
        if cell_box.is_empty() {
            return IndexBox::empty_in(cell_box.block());
        }
        cell_box.grow_upper(axis, 1)
    }

    /// Inverse of [`SideGeometry::to_side_box`]: the cells whose sides the
    /// box spans. A bare plane has no interior cells and comes back empty.
    pub fn from_side_box(side_box: &IndexBox<D>, axis: usize) -> IndexBox<D> {
        if side_box.is_empty() {
            return IndexBox::empty_in(side_box.block());
        }
        side_box.grow_upper(axis, -1)
    }

    /// Map a box of sides into the destination block. Returns the transformed
    /// box and the image of the normal axis. The normal component moves under
    /// the node reflection rule, every other component under the cell rule;
    /// this is what keeps a degenerate face plane a face plane.
    pub fn transform_side_box(
        side_box: &IndexBox<D>,
        normal: usize,
        t: &Transformation<D>,
    ) -> (IndexBox<D>, usize) {
        let new_normal = t.rotation().image_axis(normal);
        if side_box.is_empty() {
            return (IndexBox::empty_in(t.dst_block()), new_normal);
        }
        let a = transform_mixed(side_box.lower(), normal, t);
        let b = transform_mixed(side_box.upper(), normal, t);
        (
            IndexBox::with_block(a.min(&b), a.max(&b), t.dst_block()),
            new_normal,
        )
    }

    /// Map a single side element into the destination block.
    pub fn transform_side_index(index: &SideIndex<D>, t: &Transformation<D>) -> SideIndex<D> {
        SideIndex {
            axis: t.rotation().image_axis(index.axis),
            coord: transform_mixed(&index.coord, index.axis, t),
        }
    }

    /// Where side data from `src` lands on this (destination) patch.
    ///
    /// The source region is its ghost box clipped by `src_mask` (both in the
    /// source index space), carried into the destination space by
    /// `transformation`. The destination region is its ghost box clipped by
    /// `fill_box`. Per destination direction, both regions go to the side
    /// convention and intersect. With `overwrite_interior` unset, sides of
    /// the destination interior are removed. A non-empty `dst_restrict_boxes`
    /// (cell convention, assumed mutually disjoint) further clips the result;
    /// `retry` re-runs once without the restriction if it clipped everything
    /// away.
    ///
    /// An empty result is a normal value, not an error.
    ///
    /// # Errors
    /// [`DecompError::BlockMismatch`] if the operand blocks disagree with the
    /// transformation's block pair.
    #[allow(clippy::too_many_arguments)]
    pub fn calculate_overlap(
        &self,
        src: &SideGeometry<D>,
        src_mask: &IndexBox<D>,
        fill_box: &IndexBox<D>,
        overwrite_interior: bool,
        transformation: &Transformation<D>,
        retry: bool,
        dst_restrict_boxes: &[IndexBox<D>],
    ) -> Result<SideOverlap<D>, DecompError> {
        if transformation.src_block() != src.box_.block()
            || transformation.dst_block() != self.box_.block()
        {
            return Err(DecompError::BlockMismatch(format!(
                "transformation maps block {} -> {}, source is in block {}, destination in block {}",
                transformation.src_block(),
                transformation.dst_block(),
                src.box_.block(),
                self.box_.block()
            )));
        }
        if src_mask.block() != src.box_.block() {
            return Err(DecompError::BlockMismatch(format!(
                "source mask is in block {}, source patch in block {}",
                src_mask.block(),
                src.box_.block()
            )));
        }
        if fill_box.block() != self.box_.block() {
            return Err(DecompError::BlockMismatch(format!(
                "fill box is in block {}, destination patch in block {}",
                fill_box.block(),
                self.box_.block()
            )));
        }
        for r in dst_restrict_boxes {
            if r.block() != self.box_.block() {
                return Err(DecompError::BlockMismatch(format!(
                    "restriction box {r} is not in destination block {}",
                    self.box_.block()
                )));
            }
        }

        let boxes = self.overlap_boxes(
            src,
            src_mask,
            fill_box,
            overwrite_interior,
            transformation,
            dst_restrict_boxes,
        );
        if retry && !dst_restrict_boxes.is_empty() && boxes.iter().all(Vec::is_empty) {
            log::trace!("side overlap empty under restriction, retrying unrestricted");
            let boxes =
                self.overlap_boxes(src, src_mask, fill_box, overwrite_interior, transformation, &[]);
            return Ok(SideOverlap::new(boxes, *transformation));
        }
        Ok(SideOverlap::new(boxes, *transformation))
    }

    fn overlap_boxes(
        &self,
        src: &SideGeometry<D>,
        src_mask: &IndexBox<D>,
        fill_box: &IndexBox<D>,
        overwrite_interior: bool,
        transformation: &Transformation<D>,
        dst_restrict_boxes: &[IndexBox<D>],
    ) -> [Vec<IndexBox<D>>; D] {
        let src_cells = src.ghost_box().intersect(src_mask);
        let src_in_dst = transformation.transform_cell_box(&src_cells);
        let dst_cells = self.ghost_box().intersect(fill_box);

        core::array::from_fn(|d| {
            let side_src = Self::to_side_box(&src_in_dst, d);
            let side_dst = Self::to_side_box(&dst_cells, d);
            let shared = side_src.intersect(&side_dst);
            if shared.is_empty() {
                return Vec::new();
            }
            let mut pieces = if overwrite_interior {
                vec![shared]
            } else {
                shared.subtract(&Self::to_side_box(&self.box_, d))
            };
            if !dst_restrict_boxes.is_empty() {
                let mut restricted = Vec::new();
                for piece in &pieces {
                    for r in dst_restrict_boxes {
                        let clipped = piece.intersect(&Self::to_side_box(r, d));
                        if !clipped.is_empty() {
                            restricted.push(clipped);
                        }
                    }
                }
                pieces = restricted;
            }
            pieces.retain(|b| !b.is_empty());
            pieces
        })
    }
}

fn transform_mixed<const D: usize>(
    v: &IntVector<D>,
    node_axis: usize,
    t: &Transformation<D>,
) -> IntVector<D> {
    let mut out = IntVector::zero();
    for i in 0..D {
        let (s, flip) = t.rotation().source_of(i);
        let component = if flip {
            if s == node_axis { -v[s] } else { -v[s] - 1 }
        } else {
            v[s]
        };
        out[i] = component + t.offset()[i];
    }
    out
}
