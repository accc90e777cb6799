//! DecompError: unified error type for amr-decomp public APIs.
//!
//! Every fallible operation in this crate reports failure through this type.
//! Invalid-argument and misuse conditions are errors, not panics; panicking
//! checks are reserved for the debug-time invariant machinery in
//! [`crate::debug_invariants`].

use thiserror::Error;

/// Unified error type for domain-decomposition operations.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DecompError {
    /// Rank interval `[rank_begin, rank_end)` is empty or reversed.
    #[error("empty rank range: rank_begin={rank_begin} rank_end={rank_end}")]
    EmptyRankRange { rank_begin: usize, rank_end: usize },
    /// The box handed to the partitioner has no cells.
    #[error("cannot partition empty box {0}")]
    EmptyPartitionBox(String),
    /// `parts_per_rank` must be finite and strictly positive.
    #[error("invalid parts_per_rank: {0}")]
    InvalidPartsPerRank(String),
    /// Partition index outside `[begin, end)`.
    #[error("partition index {index} outside [{begin}, {end})")]
    IndexOutOfRange { index: usize, begin: usize, end: usize },
    /// Rank outside the partition's rank interval.
    #[error("rank {rank} outside [{rank_begin}, {rank_end})")]
    RankOutOfRange { rank: usize, rank_begin: usize, rank_end: usize },
    /// Queried cell position lies outside the partitioned box.
    #[error("position {position} outside partitioned box {box_}")]
    PositionOutsideBox { position: String, box_: String },
    /// Contiguous per-rank index intervals do not exist under interleaved assignment.
    #[error("per-rank index interval is undefined for an interleaved partition")]
    InterleavedRankQuery,
    /// Axis map is not a permutation of `0..D`.
    #[error("invalid rotation: {0}")]
    InvalidRotation(String),
    /// Ghost-cell widths must be non-negative on every axis.
    #[error("invalid ghost width {0}")]
    InvalidGhostWidth(String),
    /// Transformation's block pair disagrees with the operand boxes.
    #[error("block mismatch: {0}")]
    BlockMismatch(String),
    /// Patch data must carry at least one component.
    #[error("data depth must be nonzero")]
    ZeroDepth,
    /// Patch data cannot be allocated over a box with no cells.
    #[error("cannot allocate patch data on empty box {0}")]
    EmptyPatchBox(String),
    /// Patch id outside the level's patch list.
    #[error("patch {patch} out of range (level has {len} patches)")]
    PatchOutOfRange { patch: usize, len: usize },
    /// Slot id outside a patch's slot list.
    #[error("slot {slot} out of range (patch has {len} slots)")]
    SlotOutOfRange { slot: usize, len: usize },
    /// Attempted to touch storage of a patch owned by another rank.
    #[error("patch {patch} is owned by rank {owner}; local rank is {rank}")]
    RemotePatchData { patch: usize, owner: usize, rank: usize },
    /// Slot exists but no data was allocated in it.
    #[error("no data allocated for patch {patch} slot {slot}")]
    MissingPatchData { patch: usize, slot: usize },
    /// Destination and source data carry different component counts.
    #[error("depth mismatch: destination {dst} vs source {src}")]
    DepthMismatch { dst: usize, src: usize },
    /// Neither endpoint of a transaction lives on the local rank.
    #[error(
        "no local endpoint: destination owner {dst_owner}, source owner {src_owner}, local rank {rank}"
    )]
    NoLocalEndpoint { dst_owner: usize, src_owner: usize, rank: usize },
    /// Operation invoked on a transaction in the wrong mode.
    #[error("transaction mode is {actual}; operation requires {expected}")]
    WrongTransactionMode { expected: &'static str, actual: &'static str },
    /// Transfer-item lookup outside an open registry window.
    #[error("transfer registry is closed")]
    RegistryClosed,
    /// A registry window is already open; windows do not nest.
    #[error("transfer registry window already open")]
    RegistryAlreadyOpen,
    /// Transfer-item id outside the registry's table.
    #[error("transfer item {item} out of range (registry has {len} items)")]
    TransferItemOutOfRange { item: usize, len: usize },
    /// Tried to read past the end of a message buffer.
    #[error("message buffer underrun: needed {needed} bytes, {available} available")]
    BufferUnderrun { needed: usize, available: usize },
    /// A transfer element fell outside the patch's outer faces.
    #[error("element {index} not on the outer faces of patch {patch}")]
    FaceElementMissing { patch: usize, index: String },
    /// A consistency audit found problems; details go to the log.
    #[error("self check found {problems} problem(s)")]
    SelfCheckFailed { problems: usize },
}
