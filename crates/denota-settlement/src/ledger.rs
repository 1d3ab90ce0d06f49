use std::time::Instant;

use dashmap::DashMap;

use crate::chain::{Confirmation, TxHandle, TxKind};
use crate::error::ChainError;
use crate::invoice::InvoiceKey;
use crate::outcome::SettlementOutcome;

/// Record of invoices this process has seen settle.
///
/// Used to answer a repeated `settle()` for a paid invoice with the cached
/// outcome instead of paying twice. Implementations must be thread-safe.
pub trait SettlementLedger: Send + Sync {
    /// Cached outcome if `key` is known to be settled.
    fn settled(&self, key: &InvoiceKey) -> Option<SettlementOutcome>;

    /// Record `key` as settled. Returns `true` if it was not recorded before.
    fn record_settled(&self, key: InvoiceKey, outcome: SettlementOutcome) -> bool;

    /// Drop entries older than `max_age_secs`. Returns number purged.
    fn purge_expired(&self, max_age_secs: u64) -> usize;
}

/// In-memory ledger backed by DashMap. Lost on restart.
pub struct InMemoryLedger {
    entries: DashMap<InvoiceKey, (SettlementOutcome, Instant)>,
}

impl InMemoryLedger {
    pub fn new() -> Self {
        Self {
            entries: DashMap::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Default for InMemoryLedger {
    fn default() -> Self {
        Self::new()
    }
}

impl SettlementLedger for InMemoryLedger {
    fn settled(&self, key: &InvoiceKey) -> Option<SettlementOutcome> {
        self.entries.get(key).map(|entry| entry.0.clone())
    }

    fn record_settled(&self, key: InvoiceKey, outcome: SettlementOutcome) -> bool {
        self.entries.insert(key, (outcome, Instant::now())).is_none()
    }

    fn purge_expired(&self, max_age_secs: u64) -> usize {
        let before = self.entries.len();
        self.entries
            .retain(|_, (_, recorded)| recorded.elapsed().as_secs() < max_age_secs);
        before - self.entries.len()
    }
}

/// Latest known state of a submitted transaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TxStatus {
    /// Submitted; no receipt observed yet.
    Pending,
    Confirmed,
    Reverted { reason: Option<String> },
}

impl From<&Confirmation> for TxStatus {
    fn from(confirmation: &Confirmation) -> Self {
        if confirmation.success {
            TxStatus::Confirmed
        } else {
            TxStatus::Reverted {
                reason: confirmation.revert_reason.clone(),
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TxRecord {
    pub invoice: InvoiceKey,
    pub kind: TxKind,
    pub status: TxStatus,
}

/// Every transaction the orchestrator has submitted, with its latest status.
///
/// Outlives the attempts that created the entries, so a handle whose
/// confirmation timed out can be resolved later.
#[derive(Debug, Default)]
pub struct TransactionLog {
    records: DashMap<TxHandle, TxRecord>,
}

impl TransactionLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_submitted(&self, handle: TxHandle, invoice: InvoiceKey, kind: TxKind) {
        self.records.insert(
            handle,
            TxRecord {
                invoice,
                kind,
                status: TxStatus::Pending,
            },
        );
    }

    /// Fold a confirmation result into the log. Errors (timeouts, failed
    /// lookups) leave the status untouched. Returns the updated record.
    pub fn record_result(
        &self,
        handle: TxHandle,
        result: &Result<Confirmation, ChainError>,
    ) -> Option<TxRecord> {
        let mut record = self.records.get_mut(&handle)?;
        if let Ok(confirmation) = result {
            record.status = TxStatus::from(confirmation);
        }
        Some(record.clone())
    }

    pub fn get(&self, handle: &TxHandle) -> Option<TxRecord> {
        self.records.get(handle).map(|r| r.clone())
    }

    /// Handles still waiting on a receipt.
    pub fn pending(&self) -> Vec<TxHandle> {
        self.records
            .iter()
            .filter(|r| r.status == TxStatus::Pending)
            .map(|r| *r.key())
            .collect()
    }

    /// A funding transaction for `invoice` that has not been resolved yet.
    pub fn pending_funding(&self, invoice: &InvoiceKey) -> Option<TxHandle> {
        self.records
            .iter()
            .find(|r| {
                r.kind == TxKind::Funding && r.status == TxStatus::Pending && &r.invoice == invoice
            })
            .map(|r| *r.key())
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}
