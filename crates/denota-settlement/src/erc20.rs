//! Thin alloy wrappers over the ERC-20 and registrar contracts.
//!
//! Submissions return as soon as the node accepts the transaction; receipts
//! are awaited separately through [`wait_for_receipt`] so the orchestrator can
//! watch them on a detached task.

use std::time::Duration;

use alloy::primitives::{Address, TxHash, U256};
use alloy::providers::Provider;

use crate::chain::{Confirmation, FundingCall, TxHandle};
use crate::error::ChainError;
use crate::{ERC20, INotaRegistrar};

/// Query the ERC-20 balance of `owner`.
pub async fn balance_of<P: Provider>(
    provider: &P,
    token: Address,
    owner: Address,
) -> Result<U256, ChainError> {
    let contract = ERC20::new(token, provider);
    contract
        .balanceOf(owner)
        .call()
        .await
        .map_err(|e| ChainError::Read(format!("balanceOf failed: {e}")))
}

/// Query the allowance that `owner` has granted to `spender`.
pub async fn allowance<P: Provider>(
    provider: &P,
    token: Address,
    owner: Address,
    spender: Address,
) -> Result<U256, ChainError> {
    let contract = ERC20::new(token, provider);
    contract
        .allowance(owner, spender)
        .call()
        .await
        .map_err(|e| ChainError::Read(format!("allowance failed: {e}")))
}

/// Send `approve(spender, amount)`. Returns once the node has the transaction.
pub async fn send_approve<P: Provider>(
    provider: &P,
    token: Address,
    spender: Address,
    amount: U256,
    send_timeout: Duration,
) -> Result<TxHash, ChainError> {
    let contract = ERC20::new(token, provider);
    // Bounded so an unresponsive RPC cannot pin the in-flight slot forever.
    let pending = tokio::time::timeout(send_timeout, contract.approve(spender, amount).send())
        .await
        .map_err(|_| {
            ChainError::Submission(format!(
                "approve send timed out after {}s",
                send_timeout.as_secs()
            ))
        })?
        .map_err(|e| ChainError::Submission(format!("approve send failed: {e}")))?;

    Ok(*pending.tx_hash())
}

/// Send the registrar `fund` call with the value/amount split already decided.
pub async fn send_fund<P: Provider>(
    provider: &P,
    call: FundingCall,
    send_timeout: Duration,
) -> Result<TxHash, ChainError> {
    let registrar = INotaRegistrar::new(call.contract, provider);
    let request = registrar
        .fund(call.invoice_id.as_u256(), call.amount, U256::ZERO, call.payload)
        .value(call.value);

    let pending = tokio::time::timeout(send_timeout, request.send())
        .await
        .map_err(|_| {
            ChainError::Submission(format!(
                "fund send timed out after {}s",
                send_timeout.as_secs()
            ))
        })?
        .map_err(|e| ChainError::Submission(format!("fund send failed: {e}")))?;

    Ok(*pending.tx_hash())
}

/// Poll for the receipt of `hash` every `poll_interval` until `timeout`.
///
/// A missing receipt at the deadline is [`ChainError::Timeout`]; a failed
/// lookup is [`ChainError::Read`]. Neither means the transaction failed.
pub async fn wait_for_receipt<P: Provider>(
    provider: &P,
    hash: TxHash,
    timeout: Duration,
    poll_interval: Duration,
) -> Result<Confirmation, ChainError> {
    let watch = async {
        loop {
            match provider.get_transaction_receipt(hash).await {
                Ok(Some(receipt)) => {
                    return Ok(if receipt.status() {
                        Confirmation::success()
                    } else {
                        Confirmation::reverted(None)
                    });
                }
                Ok(None) => tokio::time::sleep(poll_interval).await,
                Err(e) => {
                    return Err(ChainError::Read(format!("receipt lookup failed: {e}")));
                }
            }
        }
    };

    tokio::time::timeout(timeout, watch)
        .await
        .map_err(|_| ChainError::Timeout {
            handle: TxHandle(hash),
            waited: timeout,
        })?
}
