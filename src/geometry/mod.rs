//! Integer index-space geometry: vectors, boxes, and block transformations.
//!
//! Everything downstream (partitioning, overlap calculation, data transfer)
//! speaks in these types. Boxes are closed cell ranges tagged with a
//! [`BlockId`]; [`Transformation`] carries indices between blocks.

pub mod boxes;
pub mod serde_array;
pub mod transform;
pub mod vector;

pub use boxes::{BlockId, IndexBox};
pub use transform::{Rotation, Transformation};
pub use vector::IntVector;

#[cfg(test)]
mod abi_tests {
    use super::*;
    use static_assertions::{assert_eq_size, assert_impl_all};

    assert_eq_size!(IntVector<3>, [i64; 3]);
    assert_impl_all!(IndexBox<3>: Send, Sync, Copy);
    assert_impl_all!(Transformation<3>: Send, Sync, Copy);
}
