//! Immutable descriptions of where side data moves between two patches.

use core::fmt;

use crate::debug_invariants::DebugInvariants;
use crate::decomp_error::DecompError;
use crate::geometry::{IndexBox, Transformation};
use crate::overlap::side_geometry::SideGeometry;

/// The result of an overlap calculation: for each destination direction, the
/// boxes of sides to transfer, all in the destination index space and side
/// convention, plus the transformation that carried the source there.
///
/// Overlaps are value objects: once computed they are never edited, and both
/// endpoints of a transfer derive identical element enumerations (and
/// therefore identical message sizes) from equal overlaps.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SideOverlap<const D: usize> {
    boxes: [Vec<IndexBox<D>>; D],
    transformation: Transformation<D>,
}

impl<const D: usize> SideOverlap<D> {
    pub(crate) fn new(boxes: [Vec<IndexBox<D>>; D], transformation: Transformation<D>) -> Self {
        let out = Self {
            boxes,
            transformation,
        };
        out.debug_assert_invariants();
        out
    }

    /// Build a descriptor from explicit cell boxes already in the destination
    /// index space: every direction gets the side boxes of the given cells.
    /// This is the entry point for callers that computed the target region
    /// themselves, like patch-boundary sum schedules.
    pub fn from_cell_boxes(cell_boxes: &[IndexBox<D>], transformation: Transformation<D>) -> Self {
        let boxes = core::array::from_fn(|d| {
            cell_boxes
                .iter()
                .filter(|b| !b.is_empty())
                .map(|b| SideGeometry::to_side_box(b, d))
                .collect()
        });
        Self::new(boxes, transformation)
    }

    /// `true` when no direction has anything to transfer.
    pub fn is_empty(&self) -> bool {
        self.boxes.iter().all(Vec::is_empty)
    }

    /// Transfer boxes for sides with normal `axis`, in side convention.
    pub fn boxes(&self, axis: usize) -> &[IndexBox<D>] {
        &self.boxes[axis]
    }

    /// The source-to-destination transformation this overlap was computed
    /// under.
    pub fn transformation(&self) -> &Transformation<D> {
        &self.transformation
    }

    /// Total number of side elements named by the descriptor.
    pub fn total_elements(&self) -> usize {
        self.boxes
            .iter()
            .flatten()
            .map(|b| b.num_cells() as usize)
            .sum()
    }
}

impl<const D: usize> DebugInvariants for SideOverlap<D> {
    fn debug_assert_invariants(&self) {
        crate::debug_invariants!(self.validate_invariants(), "SideOverlap invalid");
    }

    fn validate_invariants(&self) -> Result<(), DecompError> {
        for per_axis in &self.boxes {
            for b in per_axis {
                if b.is_empty() {
                    return Err(DecompError::SelfCheckFailed { problems: 1 });
                }
                if b.block() != self.transformation.dst_block() {
                    return Err(DecompError::BlockMismatch(format!(
                        "overlap box {b} not in destination block {}",
                        self.transformation.dst_block()
                    )));
                }
            }
        }
        Ok(())
    }
}

impl<const D: usize> fmt::Display for SideOverlap<D> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "side overlap: {} elements, {}",
            self.total_elements(),
            self.transformation
        )?;
        for (d, per_axis) in self.boxes.iter().enumerate() {
            for b in per_axis {
                writeln!(f, "  normal {d}: {b}")?;
            }
        }
        Ok(())
    }
}
