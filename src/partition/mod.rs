//! Communication-free domain decomposition.

pub mod assumed_box;

pub use assumed_box::AssumedPartitionBox;
