use std::fmt;

use serde::Serialize;

use crate::attempt::Phase;
use crate::chain::TxHandle;
use crate::invoice::InvoiceId;

/// Why a settlement ended in `Failed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureReason {
    InvalidAmount,
    UnknownToken,
    /// The invoice payer is not the account that signs for this accessor.
    PayerMismatch,
    /// Allowance could not be read before anything was submitted.
    EvaluationError,
    /// A read after submission failed (receipt lookup, allowance re-check).
    ChainReadError,
    SubmissionError,
    ApprovalRejected,
    FundingRejected,
    ConfirmationTimeout,
    /// Approval mined but the allowance is still short.
    InvariantViolation,
    AlreadyInProgress,
}

impl FailureReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            FailureReason::InvalidAmount => "invalid_amount",
            FailureReason::UnknownToken => "unknown_token",
            FailureReason::PayerMismatch => "payer_mismatch",
            FailureReason::EvaluationError => "evaluation_error",
            FailureReason::ChainReadError => "chain_read_error",
            FailureReason::SubmissionError => "submission_error",
            FailureReason::ApprovalRejected => "approval_rejected",
            FailureReason::FundingRejected => "funding_rejected",
            FailureReason::ConfirmationTimeout => "confirmation_timeout",
            FailureReason::InvariantViolation => "invariant_violation",
            FailureReason::AlreadyInProgress => "already_in_progress",
        }
    }

    /// Whether a fresh `settle()` call could plausibly succeed without the
    /// invoice or the chain state being changed first.
    ///
    /// `ConfirmationTimeout` is not: the funding transaction may still be
    /// mined, so it has to be resolved before another attempt.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            FailureReason::EvaluationError
                | FailureReason::ChainReadError
                | FailureReason::SubmissionError
                | FailureReason::AlreadyInProgress
        )
    }

    /// User-facing message category.
    pub fn message(&self) -> &'static str {
        match self {
            FailureReason::InvalidAmount => "This invoice has no payable amount.",
            FailureReason::UnknownToken => "This invoice uses a token that is not supported.",
            FailureReason::PayerMismatch => {
                "This invoice must be paid from a different account."
            }
            FailureReason::EvaluationError => {
                "Could not check your token allowance. Please try again."
            }
            FailureReason::ChainReadError => {
                "Lost contact with the network while confirming. Check your wallet activity before retrying."
            }
            FailureReason::SubmissionError => "The transaction was not sent.",
            FailureReason::ApprovalRejected => "The token approval was rejected on-chain.",
            FailureReason::FundingRejected => "The payment was rejected on-chain.",
            FailureReason::ConfirmationTimeout => {
                "The transaction is taking longer than expected. It may still complete."
            }
            FailureReason::InvariantViolation => {
                "The approval confirmed but the allowance is still insufficient."
            }
            FailureReason::AlreadyInProgress => "A payment for this invoice is already in progress.",
        }
    }
}

impl fmt::Display for FailureReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A failure reason plus diagnostic detail (revert reason, RPC error text).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Failure {
    pub reason: FailureReason,
    pub detail: Option<String>,
}

impl Failure {
    pub fn new(reason: FailureReason) -> Self {
        Self {
            reason,
            detail: None,
        }
    }

    pub fn with_detail(reason: FailureReason, detail: impl Into<String>) -> Self {
        Self {
            reason,
            detail: Some(detail.into()),
        }
    }
}

impl From<FailureReason> for Failure {
    fn from(reason: FailureReason) -> Self {
        Self::new(reason)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TerminalPhase {
    Settled,
    Failed,
}

/// The single value every `settle()` call resolves to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SettlementOutcome {
    pub invoice_id: InvoiceId,
    pub phase: TerminalPhase,
    pub reason: Option<FailureReason>,
    /// Revert reason or error text, passed through verbatim.
    pub detail: Option<String>,
    pub approval_tx: Option<TxHandle>,
    pub funding_tx: Option<TxHandle>,
}

impl SettlementOutcome {
    pub fn settled(
        invoice_id: InvoiceId,
        approval_tx: Option<TxHandle>,
        funding_tx: Option<TxHandle>,
    ) -> Self {
        Self {
            invoice_id,
            phase: TerminalPhase::Settled,
            reason: None,
            detail: None,
            approval_tx,
            funding_tx,
        }
    }

    /// A failure that happened before any transaction was submitted.
    pub fn rejected(invoice_id: InvoiceId, failure: Failure) -> Self {
        Self {
            invoice_id,
            phase: TerminalPhase::Failed,
            reason: Some(failure.reason),
            detail: failure.detail,
            approval_tx: None,
            funding_tx: None,
        }
    }

    pub fn is_settled(&self) -> bool {
        self.phase == TerminalPhase::Settled
    }

    /// User-facing message category for this outcome.
    pub fn message(&self) -> &'static str {
        match (self.phase, self.reason) {
            (TerminalPhase::Settled, _) => "Payment complete.",
            (TerminalPhase::Failed, Some(reason)) => reason.message(),
            (TerminalPhase::Failed, None) => "The payment failed.",
        }
    }
}

/// Broadcast on every phase transition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PhaseEvent {
    pub invoice_id: InvoiceId,
    pub phase: Phase,
    pub reason: Option<FailureReason>,
}
