//! Transfer-item registry: the table transactions resolve their variable
//! bindings against.
//!
//! A schedule is built once and executed many times, and every execution must
//! see the same item table. The registry enforces that with a window
//! discipline: items can be looked up only while a [`RegistryWindow`] is
//! open, and at most one window exists at a time. Opening the window is the
//! caller's claim that the table will not change until the window drops.

use std::sync::atomic::{AtomicBool, Ordering};

use serde::{Deserialize, Serialize};

use crate::decomp_error::DecompError;

/// One registered transfer: which slots move under which variable.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransferItem {
    /// Variable name, for diagnostics only.
    pub var_name: String,
    /// Slot read on the source patch.
    pub src_slot: usize,
    /// Slot combined into on the destination patch.
    pub dst_slot: usize,
    /// Name of the combine operation, for diagnostics only.
    pub op_name: String,
    /// Whether the transfer also fills ghost sides, once a schedule asks.
    pub fill_ghosts: bool,
}

/// Table of [`TransferItem`]s shared by all transactions of one schedule.
#[derive(Debug, Default)]
pub struct TransferRegistry {
    items: Vec<TransferItem>,
    open: AtomicBool,
}

impl TransferRegistry {
    /// An empty, closed registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an item and return its id. Ids are dense and stable.
    pub fn register(&mut self, item: TransferItem) -> usize {
        let id = self.items.len();
        self.items.push(item);
        id
    }

    /// Number of registered items.
    pub fn num_items(&self) -> usize {
        self.items.len()
    }

    /// Open the lookup window.
    ///
    /// # Errors
    /// [`DecompError::RegistryAlreadyOpen`] if a window is already live.
    pub fn open(&self) -> Result<RegistryWindow<'_>, DecompError> {
        self.open
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .map_err(|_| DecompError::RegistryAlreadyOpen)?;
        Ok(RegistryWindow { registry: self })
    }

    /// Look up an item by id. Valid only while a window is open.
    ///
    /// # Errors
    /// - [`DecompError::RegistryClosed`] outside a window.
    /// - [`DecompError::TransferItemOutOfRange`] for an unknown id.
    pub fn item(&self, id: usize) -> Result<&TransferItem, DecompError> {
        if !self.open.load(Ordering::Acquire) {
            return Err(DecompError::RegistryClosed);
        }
        self.items.get(id).ok_or(DecompError::TransferItemOutOfRange {
            item: id,
            len: self.items.len(),
        })
    }
}

/// Proof that the registry is open; lookups stay valid until this drops.
#[derive(Debug)]
pub struct RegistryWindow<'a> {
    registry: &'a TransferRegistry,
}

impl RegistryWindow<'_> {
    /// Same as [`TransferRegistry::item`], via the window.
    pub fn item(&self, id: usize) -> Result<&TransferItem, DecompError> {
        self.registry.item(id)
    }
}

impl Drop for RegistryWindow<'_> {
    fn drop(&mut self) {
        self.registry.open.store(false, Ordering::Release);
    }
}
