//! Terminal outcome delivery.
//!
//! The orchestrator calls [`SettlementNotifier::notify`] exactly once per
//! `settle()` call, after the outcome is final. Implementations must not
//! block; anything slow (HTTP, UI refresh) belongs on a spawned task.

use std::sync::Arc;

use crate::outcome::SettlementOutcome;

pub trait SettlementNotifier: Send + Sync {
    fn notify(&self, outcome: &SettlementOutcome);
}

/// Logs every outcome through `tracing`.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingNotifier;

impl SettlementNotifier for TracingNotifier {
    fn notify(&self, outcome: &SettlementOutcome) {
        match outcome.reason {
            None => tracing::info!(
                invoice = %outcome.invoice_id,
                approval_tx = ?outcome.approval_tx.map(|h| h.to_string()),
                funding_tx = ?outcome.funding_tx.map(|h| h.to_string()),
                "invoice settled"
            ),
            Some(reason) => tracing::warn!(
                invoice = %outcome.invoice_id,
                reason = %reason,
                detail = outcome.detail.as_deref().unwrap_or(""),
                retryable = reason.is_retryable(),
                "settlement failed"
            ),
        }
    }
}

/// Forwards each outcome to every inner notifier, in order.
#[derive(Default, Clone)]
pub struct FanoutNotifier {
    notifiers: Vec<Arc<dyn SettlementNotifier>>,
}

impl FanoutNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, notifier: Arc<dyn SettlementNotifier>) -> Self {
        self.notifiers.push(notifier);
        self
    }

    pub fn len(&self) -> usize {
        self.notifiers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.notifiers.is_empty()
    }
}

impl SettlementNotifier for FanoutNotifier {
    fn notify(&self, outcome: &SettlementOutcome) {
        for notifier in &self.notifiers {
            notifier.notify(outcome);
        }
    }
}
