//! # amr-decomp
//!
//! amr-decomp is the domain-decomposition and boundary-reconciliation core of a
//! structured-AMR workflow: deterministic partitioning of index boxes across
//! ranks, side-centered overlap geometry between patches (including across
//! rotated multiblock interfaces), and sum transactions that reconcile the
//! values patches hold on their coincident outer faces.
//!
//! ## Features
//! - `AssumedPartitionBox` for arithmetic-only box partitions every rank can
//!   evaluate without communication
//! - `IndexBox`/`Transformation` geometry with distinct cell and node
//!   reflection rules, so degenerate face planes survive block rotations
//! - `SideGeometry::calculate_overlap` for where one patch's side data lands
//!   on another, with masks, interior protection, and restriction retry
//! - `OutersideSumTransaction` for packing, unpacking, and locally combining
//!   the shared-face transfer set with size symmetry between endpoints
//! - Extensive unit and property-based testing
//!
//! ## Determinism
//!
//! Every partition decision is pure integer arithmetic on replicated inputs,
//! so any rank (or a test) can reproduce any other rank's answers exactly.
//! Randomized tests fix their seeds.
//!
//! ## Usage
//! Add `amr-decomp` as a dependency in your `Cargo.toml`:
//!
//! ```toml
//! [dependencies]
//! amr-decomp = "0.3"
//! # Optional features:
//! # features = ["check-invariants"]
//! ```

// Re-export our major subsystems:
pub mod data;
pub mod debug_invariants;
pub mod decomp_error;
pub mod geometry;
pub mod overlap;
pub mod partition;
pub mod transaction;
pub mod wire;

pub use debug_invariants::DebugInvariants;
pub use decomp_error::DecompError;

/// A convenient prelude to import the most-used traits & types:
pub mod prelude {
    pub use crate::data::level::{Patch, PatchLevel};
    pub use crate::data::outerside::{OutersideData, Side};
    pub use crate::debug_invariants::DebugInvariants;
    pub use crate::decomp_error::DecompError;
    pub use crate::geometry::{BlockId, IndexBox, IntVector, Rotation, Transformation};
    pub use crate::overlap::{SideGeometry, SideIndex, SideOverlap};
    pub use crate::partition::AssumedPartitionBox;
    pub use crate::transaction::{
        OutersideSumTransaction, TransactionMode, TransferItem, TransferRegistry,
    };
    pub use crate::wire::MessageBuffer;
}
