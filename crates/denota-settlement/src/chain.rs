//! The network seam.
//!
//! [`ChainAccessor`] is everything the orchestrator needs from a blockchain
//! client. [`crate::accessor::AlloyChainAccessor`] is the EVM implementation;
//! tests script their own.

use std::fmt;
use std::future::Future;
use std::time::Duration;

use alloy::primitives::{Address, Bytes, TxHash, U256};

use crate::error::ChainError;
use crate::invoice::{Invoice, InvoiceId, ResolvedToken};

/// Reference to a submitted transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TxHandle(pub TxHash);

impl fmt::Display for TxHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TxKind {
    Approval,
    Funding,
}

impl TxKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            TxKind::Approval => "approval",
            TxKind::Funding => "funding",
        }
    }
}

impl fmt::Display for TxKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Mined result of a transaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Confirmation {
    pub success: bool,
    pub revert_reason: Option<String>,
}

impl Confirmation {
    pub fn success() -> Self {
        Self {
            success: true,
            revert_reason: None,
        }
    }

    pub fn reverted(reason: Option<String>) -> Self {
        Self {
            success: false,
            revert_reason: reason,
        }
    }
}

/// Arguments of a registrar `fund` call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FundingCall {
    pub contract: Address,
    pub invoice_id: InvoiceId,
    /// Calldata amount. Zero for native payments.
    pub amount: U256,
    /// Attached `msg.value`. Zero for token payments.
    pub value: U256,
    /// Opaque module payload produced by [`ChainAccessor::funding_payload`].
    pub payload: Bytes,
}

impl FundingCall {
    /// Route `amount` through value or calldata depending on the currency.
    pub fn for_invoice(
        invoice: &Invoice,
        token: &ResolvedToken,
        amount: U256,
        payload: Bytes,
    ) -> Self {
        let (amount, value) = match token {
            ResolvedToken::Native => (U256::ZERO, amount),
            ResolvedToken::Erc20 { .. } => (amount, U256::ZERO),
        };
        Self {
            contract: invoice.registrar,
            invoice_id: invoice.id,
            amount,
            value,
            payload,
        }
    }
}

/// Capabilities the orchestrator requires from a blockchain connection.
///
/// Every method is a suspension point. Implementations must be cheap to share
/// behind an `Arc`; confirmation watches run on detached tasks.
pub trait ChainAccessor: Send + Sync {
    /// Allowance `owner` has granted `spender` on `token`.
    fn read_allowance(
        &self,
        token: Address,
        owner: Address,
        spender: Address,
    ) -> impl Future<Output = Result<U256, ChainError>> + Send;

    /// Submit `approve(spender, amount)` on `token` from the payer account.
    fn submit_approval(
        &self,
        token: Address,
        spender: Address,
        amount: U256,
    ) -> impl Future<Output = Result<TxHandle, ChainError>> + Send;

    /// Submit the registrar funding call.
    fn submit_funding(
        &self,
        call: FundingCall,
    ) -> impl Future<Output = Result<TxHandle, ChainError>> + Send;

    /// Wait until `handle` is mined, or fail with [`ChainError::Timeout`] after `timeout`.
    /// A timeout says nothing about the transaction's eventual fate.
    fn await_confirmation(
        &self,
        handle: TxHandle,
        timeout: Duration,
    ) -> impl Future<Output = Result<Confirmation, ChainError>> + Send;

    /// Module payload for token funding calls. Empty unless the registrar
    /// module expects one.
    fn funding_payload(&self, _invoice: &Invoice) -> Bytes {
        Bytes::new()
    }

    /// Account that signs submitted transactions, when fixed. Invoices whose
    /// payer differs are rejected before any chain call.
    fn signer(&self) -> Option<Address> {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn invoice() -> Invoice {
        Invoice::parse(
            "9",
            "DAI",
            "500",
            Address::repeat_byte(0x11),
            Address::repeat_byte(0x22),
        )
        .unwrap()
    }

    #[test]
    fn test_native_funding_moves_amount_into_value() {
        let call = FundingCall::for_invoice(
            &invoice(),
            &ResolvedToken::Native,
            U256::from(500),
            Bytes::new(),
        );
        assert_eq!(call.amount, U256::ZERO);
        assert_eq!(call.value, U256::from(500));
        assert_eq!(call.contract, Address::repeat_byte(0x22));
    }

    #[test]
    fn test_token_funding_carries_amount_in_calldata() {
        let token = ResolvedToken::Erc20 {
            symbol: "DAI".into(),
            address: Address::repeat_byte(0xda),
        };
        let call = FundingCall::for_invoice(
            &invoice(),
            &token,
            U256::from(500),
            Bytes::from_static(&[1, 2, 3]),
        );
        assert_eq!(call.amount, U256::from(500));
        assert_eq!(call.value, U256::ZERO);
        assert_eq!(call.payload.as_ref(), &[1, 2, 3]);
    }
}
