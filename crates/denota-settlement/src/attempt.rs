//! Per-call settlement state.
//!
//! ```text
//! Evaluating --(no approval)--> AwaitingFunding
//! Evaluating --(approval)-----> AwaitingApproval --> ApprovalConfirmed --> AwaitingFunding
//! AwaitingFunding --> Settled
//! any non-terminal phase --> Failed
//! ```

use std::fmt;

use crate::chain::TxHandle;
use crate::error::TransitionError;
use crate::invoice::Invoice;
use crate::outcome::{Failure, SettlementOutcome, TerminalPhase};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Phase {
    Evaluating,
    AwaitingApproval,
    ApprovalConfirmed,
    AwaitingFunding,
    Settled,
    Failed,
}

impl Phase {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Phase::Settled | Phase::Failed)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Phase::Evaluating => "evaluating",
            Phase::AwaitingApproval => "awaiting_approval",
            Phase::ApprovalConfirmed => "approval_confirmed",
            Phase::AwaitingFunding => "awaiting_funding",
            Phase::Settled => "settled",
            Phase::Failed => "failed",
        }
    }

    fn can_advance_to(&self, next: Phase) -> bool {
        matches!(
            (self, next),
            (Phase::Evaluating, Phase::AwaitingFunding)
                | (Phase::Evaluating, Phase::AwaitingApproval)
                | (Phase::AwaitingApproval, Phase::ApprovalConfirmed)
                | (Phase::ApprovalConfirmed, Phase::AwaitingFunding)
                | (Phase::AwaitingFunding, Phase::Settled)
        )
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One `settle()` call. Owns the transaction handles it submits.
#[derive(Debug)]
pub struct SettlementAttempt {
    invoice: Invoice,
    phase: Phase,
    approval_tx: Option<TxHandle>,
    funding_tx: Option<TxHandle>,
    failure: Option<Failure>,
}

impl SettlementAttempt {
    pub fn new(invoice: Invoice) -> Self {
        Self {
            invoice,
            phase: Phase::Evaluating,
            approval_tx: None,
            funding_tx: None,
            failure: None,
        }
    }

    pub fn invoice(&self) -> &Invoice {
        &self.invoice
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn approval_tx(&self) -> Option<TxHandle> {
        self.approval_tx
    }

    pub fn funding_tx(&self) -> Option<TxHandle> {
        self.funding_tx
    }

    pub fn failure(&self) -> Option<&Failure> {
        self.failure.as_ref()
    }

    /// Move along a success edge of the state machine.
    pub fn advance(&mut self, next: Phase) -> Result<(), TransitionError> {
        if self.phase.is_terminal() {
            return Err(TransitionError::Terminal(self.phase));
        }
        if !self.phase.can_advance_to(next) {
            return Err(TransitionError::Illegal {
                from: self.phase,
                to: next,
            });
        }
        self.phase = next;
        Ok(())
    }

    /// Enter `Failed`. No further transitions are accepted afterwards.
    pub fn fail(&mut self, failure: Failure) -> Result<(), TransitionError> {
        if self.phase.is_terminal() {
            return Err(TransitionError::Terminal(self.phase));
        }
        self.phase = Phase::Failed;
        self.failure = Some(failure);
        Ok(())
    }

    /// Record the approval handle. Only one per attempt.
    pub fn attach_approval(&mut self, handle: TxHandle) -> Result<(), TransitionError> {
        if self.phase != Phase::AwaitingApproval {
            return Err(TransitionError::Illegal {
                from: self.phase,
                to: Phase::AwaitingApproval,
            });
        }
        if self.approval_tx.is_some() {
            return Err(TransitionError::DuplicateHandle { kind: "approval" });
        }
        self.approval_tx = Some(handle);
        Ok(())
    }

    /// Record the funding handle. Only one per attempt.
    pub fn attach_funding(&mut self, handle: TxHandle) -> Result<(), TransitionError> {
        if self.phase != Phase::AwaitingFunding {
            return Err(TransitionError::Illegal {
                from: self.phase,
                to: Phase::AwaitingFunding,
            });
        }
        if self.funding_tx.is_some() {
            return Err(TransitionError::DuplicateHandle { kind: "funding" });
        }
        self.funding_tx = Some(handle);
        Ok(())
    }

    /// Consume a terminal attempt into its outcome.
    ///
    /// A non-terminal attempt is reported as a failure; callers only reach
    /// this after driving the attempt to `Settled` or `Failed`.
    pub fn into_outcome(self) -> SettlementOutcome {
        let (phase, reason, detail) = match (self.phase, self.failure) {
            (Phase::Settled, _) => (TerminalPhase::Settled, None, None),
            (_, Some(failure)) => (TerminalPhase::Failed, Some(failure.reason), failure.detail),
            (phase, None) => (
                TerminalPhase::Failed,
                Some(crate::outcome::FailureReason::InvariantViolation),
                Some(format!("attempt abandoned in phase {phase}")),
            ),
        };
        SettlementOutcome {
            invoice_id: self.invoice.id,
            phase,
            reason,
            detail,
            approval_tx: self.approval_tx,
            funding_tx: self.funding_tx,
        }
    }
}
