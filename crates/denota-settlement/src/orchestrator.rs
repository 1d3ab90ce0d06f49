//! The settlement state machine.
//!
//! Re-entrancy policy: a second `settle()` for an invoice whose attempt is
//! still in flight is rejected with `AlreadyInProgress`; it is never
//! coalesced. Token attempts also hold the `(payer, registrar, token)`
//! allowance slot for their whole run, because `approve` overwrites the
//! allowance another attempt may be about to spend.

use std::sync::Arc;
use std::time::Duration;

use alloy::primitives::{Bytes, U256};
use tokio::sync::broadcast;

use crate::allowance::{AllowanceEvaluator, NextAction};
use crate::attempt::{Phase, SettlementAttempt};
use crate::chain::{ChainAccessor, Confirmation, FundingCall, TxHandle, TxKind};
use crate::constants::ChainConfig;
use crate::error::ChainError;
use crate::inflight::{ClaimedSlots, InFlightRegistry, SlotKey};
use crate::invoice::{Invoice, ResolvedToken};
use crate::ledger::{InMemoryLedger, SettlementLedger, TransactionLog, TxStatus};
use crate::notifier::{SettlementNotifier, TracingNotifier};
use crate::outcome::{Failure, FailureReason, PhaseEvent, SettlementOutcome};

const EVENT_CAPACITY: usize = 256;

/// Drives invoices from evaluation to a terminal [`SettlementOutcome`].
pub struct TransactionOrchestrator<A> {
    accessor: Arc<A>,
    config: ChainConfig,
    notifier: Arc<dyn SettlementNotifier>,
    ledger: Arc<dyn SettlementLedger>,
    tx_log: Arc<TransactionLog>,
    in_flight: InFlightRegistry,
    events: broadcast::Sender<PhaseEvent>,
}

impl<A: ChainAccessor + 'static> TransactionOrchestrator<A> {
    /// Orchestrator with a tracing notifier and an in-memory ledger.
    pub fn new(accessor: A, config: ChainConfig) -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            accessor: Arc::new(accessor),
            config,
            notifier: Arc::new(TracingNotifier),
            ledger: Arc::new(InMemoryLedger::new()),
            tx_log: Arc::new(TransactionLog::new()),
            in_flight: InFlightRegistry::new(),
            events,
        }
    }

    pub fn with_notifier(mut self, notifier: Arc<dyn SettlementNotifier>) -> Self {
        self.notifier = notifier;
        self
    }

    pub fn with_ledger(mut self, ledger: Arc<dyn SettlementLedger>) -> Self {
        self.ledger = ledger;
        self
    }

    pub fn accessor(&self) -> &A {
        &self.accessor
    }

    pub fn config(&self) -> &ChainConfig {
        &self.config
    }

    /// Progress stream: one event per phase transition of every attempt.
    pub fn subscribe(&self) -> broadcast::Receiver<PhaseEvent> {
        self.events.subscribe()
    }

    pub fn in_flight(&self) -> &InFlightRegistry {
        &self.in_flight
    }

    /// Latest known status of a transaction this orchestrator submitted.
    pub fn transaction(&self, handle: &TxHandle) -> Option<TxStatus> {
        self.tx_log.get(handle).map(|r| r.status)
    }

    pub fn transactions(&self) -> &TransactionLog {
        &self.tx_log
    }

    /// Settle `invoice`. Always resolves to an outcome; see [`FailureReason`]
    /// for the ways it can fail.
    pub async fn settle(&self, invoice: Invoice) -> SettlementOutcome {
        let outcome = self.run(invoice).await;
        self.notifier.notify(&outcome);
        outcome
    }

    /// Label for the invoice's pay button, without submitting anything.
    pub async fn next_action(&self, invoice: &Invoice) -> Result<NextAction, Failure> {
        let amount = invoice
            .payable_amount()
            .ok_or_else(|| Failure::new(FailureReason::InvalidAmount))?;
        let token = self
            .config
            .resolve(&invoice.currency)
            .ok_or_else(|| Failure::with_detail(FailureReason::UnknownToken, invoice.currency.to_string()))?;
        AllowanceEvaluator::new(self.accessor.as_ref())
            .next_action(&token, amount, invoice.payer, invoice.registrar)
            .await
            .map_err(|e| Failure::with_detail(FailureReason::EvaluationError, e.to_string()))
    }

    /// Query a previously submitted transaction out-of-band, waiting up to
    /// `timeout`. A confirmed funding transaction marks its invoice settled.
    pub async fn resolve(&self, handle: TxHandle, timeout: Duration) -> Result<TxStatus, ChainError> {
        let result = self.accessor.await_confirmation(handle, timeout).await;
        let status = record_confirmation(&self.tx_log, self.ledger.as_ref(), handle, &result);
        let confirmation = result?;
        Ok(status.unwrap_or_else(|| TxStatus::from(&confirmation)))
    }

    async fn run(&self, invoice: Invoice) -> SettlementOutcome {
        let mut attempt = SettlementAttempt::new(invoice);
        self.emit(&attempt);

        let Some(amount) = attempt.invoice().payable_amount() else {
            let detail = attempt.invoice().amount_raw.to_string();
            return self.finish(attempt, Err(Failure::with_detail(FailureReason::InvalidAmount, detail)));
        };
        let Some(token) = self.config.resolve(&attempt.invoice().currency) else {
            let detail = attempt.invoice().currency.to_string();
            return self.finish(attempt, Err(Failure::with_detail(FailureReason::UnknownToken, detail)));
        };
        if let Some(signer) = self.accessor.signer() {
            let payer = attempt.invoice().payer;
            if signer != payer {
                let detail = format!("invoice payer {payer} is not the signing account {signer}");
                return self.finish(attempt, Err(Failure::with_detail(FailureReason::PayerMismatch, detail)));
            }
        }

        let slots = match self.claim(attempt.invoice(), &token) {
            Some(slots) => Arc::new(slots),
            None => return self.finish(attempt, Err(FailureReason::AlreadyInProgress.into())),
        };

        // Checked under the invoice slot so a concurrent attempt cannot
        // settle between this lookup and our first submission.
        let key = attempt.invoice().key();
        if let Some(cached) = self.ledger.settled(&key) {
            tracing::info!(invoice = %key, "invoice already settled, nothing submitted");
            let _ = self.events.send(PhaseEvent {
                invoice_id: cached.invoice_id,
                phase: Phase::Settled,
                reason: None,
            });
            return cached;
        }
        // A funding whose wait ended without a receipt may still be mined.
        if let Some(handle) = self.tx_log.pending_funding(&key) {
            tracing::warn!(invoice = %key, tx = %handle, "earlier funding unresolved, nothing submitted");
            let detail = format!("funding {handle} still pending");
            return self.finish(attempt, Err(Failure::with_detail(FailureReason::AlreadyInProgress, detail)));
        }

        let result = self.drive(&mut attempt, &token, amount, &slots).await;
        self.finish(attempt, result)
    }

    fn claim(&self, invoice: &Invoice, token: &ResolvedToken) -> Option<ClaimedSlots> {
        let invoice_slot = self.in_flight.try_claim(SlotKey::Invoice(invoice.key()))?;
        let allowance_slot = match token.address() {
            Some(token) => Some(self.in_flight.try_claim(SlotKey::Allowance {
                owner: invoice.payer,
                spender: invoice.registrar,
                token,
            })?),
            None => None,
        };
        Some(ClaimedSlots::new(invoice_slot, allowance_slot))
    }

    async fn drive(
        &self,
        attempt: &mut SettlementAttempt,
        token: &ResolvedToken,
        amount: U256,
        slots: &Arc<ClaimedSlots>,
    ) -> Result<(), Failure> {
        let owner = attempt.invoice().payer;
        let spender = attempt.invoice().registrar;

        let state = AllowanceEvaluator::new(self.accessor.as_ref())
            .evaluate(token, amount, owner, spender)
            .await
            .map_err(|e| Failure::with_detail(FailureReason::EvaluationError, e.to_string()))?;

        if let (true, Some(token_address)) = (state.required, token.address()) {
            self.advance(attempt, Phase::AwaitingApproval)?;

            // Exact-amount approval only.
            let handle = self
                .accessor
                .submit_approval(token_address, spender, amount)
                .await
                .map_err(|e| Failure::with_detail(FailureReason::SubmissionError, e.to_string()))?;
            attempt.attach_approval(handle).map_err(invariant)?;

            let confirmation = self.confirm(attempt, handle, TxKind::Approval, slots).await?;
            if !confirmation.success {
                return Err(rejected(FailureReason::ApprovalRejected, confirmation));
            }
            self.advance(attempt, Phase::ApprovalConfirmed)?;

            let allowance = self
                .accessor
                .read_allowance(token_address, owner, spender)
                .await
                .map_err(|e| Failure::with_detail(FailureReason::ChainReadError, e.to_string()))?;
            if allowance < amount {
                return Err(Failure::with_detail(
                    FailureReason::InvariantViolation,
                    format!("allowance {allowance} below {amount} after confirmed approval"),
                ));
            }
        }

        self.advance(attempt, Phase::AwaitingFunding)?;

        let payload = match token {
            ResolvedToken::Native => Bytes::new(),
            ResolvedToken::Erc20 { .. } => self.accessor.funding_payload(attempt.invoice()),
        };
        let call = FundingCall::for_invoice(attempt.invoice(), token, amount, payload);
        let handle = self
            .accessor
            .submit_funding(call)
            .await
            .map_err(|e| Failure::with_detail(FailureReason::SubmissionError, e.to_string()))?;
        attempt.attach_funding(handle).map_err(invariant)?;

        let confirmation = self.confirm(attempt, handle, TxKind::Funding, slots).await?;
        if !confirmation.success {
            return Err(rejected(FailureReason::FundingRejected, confirmation));
        }
        self.advance(attempt, Phase::Settled)
    }

    /// Wait for `handle` on a detached task. The task keeps the attempt's
    /// slots and records the receipt even if this future is dropped.
    async fn confirm(
        &self,
        attempt: &SettlementAttempt,
        handle: TxHandle,
        kind: TxKind,
        slots: &Arc<ClaimedSlots>,
    ) -> Result<Confirmation, Failure> {
        self.tx_log
            .record_submitted(handle, attempt.invoice().key(), kind);

        let accessor = Arc::clone(&self.accessor);
        let tx_log = Arc::clone(&self.tx_log);
        let ledger = Arc::clone(&self.ledger);
        let slots = Arc::clone(slots);
        let timeout = self.config.confirmation_timeout;

        let watcher = tokio::spawn(async move {
            let result = accessor.await_confirmation(handle, timeout).await;
            record_confirmation(&tx_log, ledger.as_ref(), handle, &result);
            drop(slots);
            result
        });

        let result = watcher.await.map_err(|e| {
            Failure::with_detail(
                FailureReason::ChainReadError,
                format!("{kind} watcher for {handle} failed: {e}"),
            )
        })?;

        result.map_err(|e| match e {
            ChainError::Timeout { .. } => {
                Failure::with_detail(FailureReason::ConfirmationTimeout, e.to_string())
            }
            other => Failure::with_detail(FailureReason::ChainReadError, other.to_string()),
        })
    }

    fn advance(&self, attempt: &mut SettlementAttempt, next: Phase) -> Result<(), Failure> {
        attempt.advance(next).map_err(invariant)?;
        tracing::debug!(invoice = %attempt.invoice().id, phase = %next, "phase transition");
        self.emit(attempt);
        Ok(())
    }

    fn finish(&self, mut attempt: SettlementAttempt, result: Result<(), Failure>) -> SettlementOutcome {
        if let Err(failure) = result {
            // Already-terminal attempts keep their first outcome.
            if attempt.fail(failure).is_ok() {
                self.emit(&attempt);
            }
        }
        let key = attempt.invoice().key();
        let outcome = attempt.into_outcome();
        if outcome.is_settled() {
            self.ledger.record_settled(key, outcome.clone());
        }
        outcome
    }

    fn emit(&self, attempt: &SettlementAttempt) {
        // No subscribers is fine.
        let _ = self.events.send(PhaseEvent {
            invoice_id: attempt.invoice().id,
            phase: attempt.phase(),
            reason: attempt.failure().map(|f| f.reason),
        });
    }
}

fn invariant(e: crate::error::TransitionError) -> Failure {
    Failure::with_detail(FailureReason::InvariantViolation, e.to_string())
}

fn rejected(reason: FailureReason, confirmation: Confirmation) -> Failure {
    Failure {
        reason,
        detail: confirmation.revert_reason,
    }
}

/// Apply a confirmation result to the log; a successful funding receipt also
/// marks the invoice settled.
fn record_confirmation(
    tx_log: &TransactionLog,
    ledger: &dyn SettlementLedger,
    handle: TxHandle,
    result: &Result<Confirmation, ChainError>,
) -> Option<TxStatus> {
    let record = tx_log.record_result(handle, result)?;
    tracing::debug!(tx = %handle, kind = %record.kind, status = ?record.status, "transaction status recorded");
    if record.kind == TxKind::Funding && record.status == TxStatus::Confirmed {
        ledger.record_settled(
            record.invoice,
            SettlementOutcome::settled(record.invoice.id, None, Some(handle)),
        );
    }
    Some(record.status)
}
