//! Transaction module: transfer items and boundary-sum transactions
#![warn(missing_docs)]

pub mod outerside_sum;
pub mod registry;

pub use outerside_sum::{OutersideSumTransaction, TransactionMode};
pub use registry::{RegistryWindow, TransferItem, TransferRegistry};
