//! Patch levels: the per-process view of one level's patches.
//!
//! Every rank holds the full patch list (boxes and owners are replicated
//! metadata), but storage is allocated only for patches the local rank owns.
//! Slots let several variables coexist on the same patch; each allocated slot
//! sits behind its own lock so concurrent transactions can stream different
//! variables without contending.

use num_traits::Zero;
use parking_lot::RwLock;

use crate::data::outerside::OutersideData;
use crate::decomp_error::DecompError;
use crate::geometry::IndexBox;

/// One patch: replicated metadata plus locally-allocated slot storage.
#[derive(Debug)]
pub struct Patch<V, const D: usize> {
    box_: IndexBox<D>,
    owner: usize,
    slots: Vec<Option<RwLock<OutersideData<V, D>>>>,
}

impl<V, const D: usize> Patch<V, D> {
    /// The patch's cell box.
    pub fn box_(&self) -> &IndexBox<D> {
        &self.box_
    }

    /// Rank that owns this patch's storage.
    pub fn owner(&self) -> usize {
        self.owner
    }

    /// Number of slots the patch has seen, allocated or not.
    pub fn num_slots(&self) -> usize {
        self.slots.len()
    }
}

/// All patches of one level as seen from one rank.
#[derive(Debug)]
pub struct PatchLevel<V, const D: usize> {
    rank: usize,
    patches: Vec<Patch<V, D>>,
}

impl<V, const D: usize> PatchLevel<V, D> {
    /// An empty level viewed from `rank`.
    pub fn new(rank: usize) -> Self {
        Self {
            rank,
            patches: Vec::new(),
        }
    }

    /// The local rank this view belongs to.
    pub fn rank(&self) -> usize {
        self.rank
    }

    /// Number of registered patches.
    pub fn num_patches(&self) -> usize {
        self.patches.len()
    }

    /// Register a patch (metadata only) and return its id. Every rank must
    /// register the same patches in the same order.
    pub fn add_patch(&mut self, box_: IndexBox<D>, owner: usize) -> usize {
        let id = self.patches.len();
        self.patches.push(Patch {
            box_,
            owner,
            slots: Vec::new(),
        });
        id
    }

    /// Look up a patch by id.
    ///
    /// # Errors
    /// [`DecompError::PatchOutOfRange`] if `patch` was never registered.
    pub fn patch(&self, patch: usize) -> Result<&Patch<V, D>, DecompError> {
        self.patches.get(patch).ok_or(DecompError::PatchOutOfRange {
            patch,
            len: self.patches.len(),
        })
    }

    /// Storage of one slot of one locally-owned patch.
    ///
    /// # Errors
    /// - [`DecompError::PatchOutOfRange`] for an unregistered patch id.
    /// - [`DecompError::RemotePatchData`] if the patch is owned elsewhere.
    /// - [`DecompError::SlotOutOfRange`] / [`DecompError::MissingPatchData`]
    ///   if the slot was never allocated.
    pub fn data(
        &self,
        patch: usize,
        slot: usize,
    ) -> Result<&RwLock<OutersideData<V, D>>, DecompError> {
        let p = self.patch(patch)?;
        if p.owner != self.rank {
            return Err(DecompError::RemotePatchData {
                patch,
                owner: p.owner,
                rank: self.rank,
            });
        }
        match p.slots.get(slot) {
            Some(Some(lock)) => Ok(lock),
            Some(None) => Err(DecompError::MissingPatchData { patch, slot }),
            None => Err(DecompError::SlotOutOfRange {
                slot,
                len: p.slots.len(),
            }),
        }
    }
}

impl<V: Copy + Zero, const D: usize> PatchLevel<V, D> {
    /// Allocate zero-filled outerside storage in `slot` of a locally-owned
    /// patch, growing the slot list as needed. Re-allocating a slot resets
    /// its values.
    ///
    /// # Errors
    /// - [`DecompError::PatchOutOfRange`] for an unregistered patch id.
    /// - [`DecompError::RemotePatchData`] if the patch is owned elsewhere.
    /// - Anything [`OutersideData::new`] rejects.
    pub fn allocate(&mut self, patch: usize, slot: usize, depth: usize) -> Result<(), DecompError> {
        let rank = self.rank;
        let len = self.patches.len();
        let p = self
            .patches
            .get_mut(patch)
            .ok_or(DecompError::PatchOutOfRange { patch, len })?;
        if p.owner != rank {
            return Err(DecompError::RemotePatchData {
                patch,
                owner: p.owner,
                rank,
            });
        }
        let data = OutersideData::new(p.box_, depth)?;
        if p.slots.len() <= slot {
            p.slots.resize_with(slot + 1, || None);
        }
        p.slots[slot] = Some(RwLock::new(data));
        Ok(())
    }
}
