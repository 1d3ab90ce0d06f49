//! Settlement of Denota notas on EVM chains.
//!
//! Given an [`Invoice`] denominated in the native currency or an ERC-20 token,
//! the [`TransactionOrchestrator`] decides whether the registrar contract needs
//! an allowance first, submits the approval (for exactly the invoice amount),
//! waits for it, re-checks the allowance, funds the nota and waits again.
//! Every call resolves to a [`SettlementOutcome`]; nothing escapes as a panic
//! or an error.
//!
//! # Components
//!
//! - [`ChainAccessor`]: the only network-facing dependency
//! - [`AllowanceEvaluator`]: decides whether an approval step is needed
//! - [`TransactionOrchestrator`]: the settlement state machine
//! - [`SettlementNotifier`]: receives terminal outcomes
//!
//! # Quick example
//!
//! ```no_run
//! use alloy::network::EthereumWallet;
//! use alloy::providers::ProviderBuilder;
//! use alloy::signers::local::PrivateKeySigner;
//! use settlement::{AlloyChainAccessor, ChainConfig, Invoice, TransactionOrchestrator};
//!
//! # #[tokio::main]
//! # async fn main() {
//! let signer: PrivateKeySigner = "0xYOUR_KEY".parse().unwrap();
//! let payer = signer.address();
//! let config = ChainConfig::default().with_token("DAI", "0x6B175474E89094C44Da98b954EedeAC495271d0F".parse().unwrap());
//! let provider = ProviderBuilder::new()
//!     .wallet(EthereumWallet::from(signer))
//!     .connect_http(config.rpc_url.parse().unwrap());
//!
//! let orchestrator = TransactionOrchestrator::new(AlloyChainAccessor::new(provider, payer, config.clone()), config);
//! let invoice = Invoice::parse("42", "DAI", "500", payer, "0x000000000000000000000000000000000000dEaD".parse().unwrap()).unwrap();
//! let outcome = orchestrator.settle(invoice).await;
//! println!("{}", outcome.message());
//! # }
//! ```

// Core types and traits
pub mod allowance;
pub mod attempt;
pub mod chain;
pub mod constants;
pub mod error;
pub mod invoice;
pub mod notifier;
pub mod outcome;

// Runtime: EVM adapter and orchestrator
#[cfg(feature = "full")]
pub mod accessor;
#[cfg(feature = "full")]
pub mod erc20;
#[cfg(feature = "full")]
pub mod inflight;
#[cfg(feature = "full")]
pub mod ledger;
#[cfg(feature = "full")]
pub mod orchestrator;

use alloy::sol;

// ERC-20 surface used for allowance checks and approvals.
sol! {
    #[sol(rpc)]
    interface ERC20 {
        function balanceOf(address owner) external view returns (uint256);
        function allowance(address owner, address spender) external view returns (uint256);
        function approve(address spender, uint256 value) external returns (bool);
    }
}

// Nota registrar funding entry point. Native payments carry the amount as
// msg.value with a zero `amount`; token payments carry `amount` and zero value.
sol! {
    #[sol(rpc)]
    interface INotaRegistrar {
        function fund(uint256 notaId, uint256 amount, uint256 instant, bytes calldata fundData) external payable;
    }
}

// Re-exports
pub use allowance::{AllowanceEvaluator, AllowanceState, NextAction};
pub use attempt::{Phase, SettlementAttempt};
pub use chain::{ChainAccessor, Confirmation, FundingCall, TxHandle, TxKind};
pub use constants::*;
pub use error::{ChainError, ConfigError, InvoiceError, TransitionError};
pub use invoice::{Currency, Invoice, InvoiceId, InvoiceKey, ResolvedToken};
pub use notifier::{FanoutNotifier, SettlementNotifier, TracingNotifier};
pub use outcome::{Failure, FailureReason, PhaseEvent, SettlementOutcome, TerminalPhase};

#[cfg(feature = "full")]
pub use accessor::AlloyChainAccessor;
#[cfg(feature = "full")]
pub use ledger::{InMemoryLedger, SettlementLedger, TransactionLog, TxRecord, TxStatus};
#[cfg(feature = "full")]
pub use orchestrator::TransactionOrchestrator;
