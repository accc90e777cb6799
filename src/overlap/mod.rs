//! Overlap module: where side-centered data from one patch lands on another.
//!
//! [`side_geometry`] computes overlaps under block transformations;
//! [`side_overlap`] is the immutable descriptor both transfer endpoints share.

pub mod side_geometry;
pub mod side_overlap;

pub use side_geometry::{SideGeometry, SideIndex};
pub use side_overlap::SideOverlap;
