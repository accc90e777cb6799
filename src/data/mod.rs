//! Data module: outerside storage and patch levels
#![warn(missing_docs)]

pub mod level;
pub mod outerside;

pub use level::{Patch, PatchLevel};
pub use outerside::{OutersideData, Side, face_box_of};
