//! In-flight slots.
//!
//! A slot is claimed for every invoice being settled and, for token payments,
//! for the `(owner, spender, token)` allowance the attempt will read and may
//! overwrite. A second claim on a held slot fails; the orchestrator turns that
//! into `AlreadyInProgress`.

use std::sync::Arc;

use alloy::primitives::Address;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;

use crate::invoice::InvoiceKey;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SlotKey {
    Invoice(InvoiceKey),
    Allowance {
        owner: Address,
        spender: Address,
        token: Address,
    },
}

#[derive(Debug, Default, Clone)]
pub struct InFlightRegistry {
    slots: Arc<DashMap<SlotKey, ()>>,
}

impl InFlightRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Atomically claim `key`. `None` if someone else holds it.
    pub fn try_claim(&self, key: SlotKey) -> Option<SlotGuard> {
        match self.slots.entry(key) {
            Entry::Occupied(_) => None,
            Entry::Vacant(v) => {
                v.insert(());
                Some(SlotGuard {
                    slots: Arc::clone(&self.slots),
                    key,
                })
            }
        }
    }

    pub fn is_claimed(&self, key: &SlotKey) -> bool {
        self.slots.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }
}

/// Releases its slot on drop.
#[derive(Debug)]
pub struct SlotGuard {
    slots: Arc<DashMap<SlotKey, ()>>,
    key: SlotKey,
}

impl SlotGuard {
    pub fn key(&self) -> &SlotKey {
        &self.key
    }
}

impl Drop for SlotGuard {
    fn drop(&mut self) {
        self.slots.remove(&self.key);
    }
}

/// Every slot one attempt holds. Shared with confirmation watchers so the
/// slots outlive a cancelled `settle()` until the receipt is seen.
#[derive(Debug)]
pub struct ClaimedSlots {
    _invoice: SlotGuard,
    _allowance: Option<SlotGuard>,
}

impl ClaimedSlots {
    pub fn new(invoice: SlotGuard, allowance: Option<SlotGuard>) -> Self {
        Self {
            _invoice: invoice,
            _allowance: allowance,
        }
    }
}
