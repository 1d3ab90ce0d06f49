use std::time::Duration;

use thiserror::Error;

use crate::attempt::Phase;
use crate::chain::TxHandle;

/// Failures reported by a [`ChainAccessor`](crate::ChainAccessor).
///
/// A confirmed revert is not an error: it is a [`Confirmation`](crate::Confirmation)
/// with `success == false`.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ChainError {
    #[error("chain read failed: {0}")]
    Read(String),

    #[error("transaction submission failed: {0}")]
    Submission(String),

    #[error("no receipt for {handle} after {}s", waited.as_secs())]
    Timeout { handle: TxHandle, waited: Duration },
}

/// Errors building an [`Invoice`](crate::Invoice) from external text.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum InvoiceError {
    #[error("invalid invoice id: {0}")]
    InvalidId(String),

    #[error("invalid amount: {0}")]
    InvalidAmount(String),

    #[error("invalid currency: {0}")]
    InvalidCurrency(String),
}

/// Configuration errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("missing required setting {0}")]
    Missing(&'static str),

    #[error("invalid value for {name}: {reason}")]
    Invalid { name: &'static str, reason: String },
}

/// A [`SettlementAttempt`](crate::SettlementAttempt) was asked to move along an
/// edge the state machine does not have.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransitionError {
    #[error("illegal transition {from} -> {to}")]
    Illegal { from: Phase, to: Phase },

    #[error("{kind} transaction already attached to this attempt")]
    DuplicateHandle { kind: &'static str },

    #[error("attempt already terminal in phase {0}")]
    Terminal(Phase),
}
