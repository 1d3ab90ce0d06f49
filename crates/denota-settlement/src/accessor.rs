use std::time::Duration;

use alloy::primitives::{Address, Bytes, U256};
use alloy::providers::Provider;
use alloy::sol_types::SolValue;

use crate::chain::{ChainAccessor, Confirmation, FundingCall, TxHandle};
use crate::constants::ChainConfig;
use crate::erc20;
use crate::error::ChainError;
use crate::invoice::Invoice;

/// [`ChainAccessor`] over an alloy provider whose wallet signs for the payer.
pub struct AlloyChainAccessor<P> {
    provider: P,
    payer: Address,
    config: ChainConfig,
}

impl<P> AlloyChainAccessor<P> {
    /// `payer` must be the address the provider's wallet filler signs with.
    pub fn new(provider: P, payer: Address, config: ChainConfig) -> Self {
        Self {
            provider,
            payer,
            config,
        }
    }

    pub fn payer(&self) -> Address {
        self.payer
    }

    pub fn provider(&self) -> &P {
        &self.provider
    }

    pub fn config(&self) -> &ChainConfig {
        &self.config
    }
}

impl<P> AlloyChainAccessor<P>
where
    P: Provider + Send + Sync,
{
    /// Check RPC connectivity by fetching the latest block number.
    pub async fn health_check(&self) -> Result<u64, ChainError> {
        self.provider
            .get_block_number()
            .await
            .map_err(|e| ChainError::Read(format!("health check failed: {e}")))
    }

    /// Payer balance in `token`, or in the native currency when `token` is `None`.
    pub async fn payer_balance(&self, token: Option<Address>) -> Result<U256, ChainError> {
        match token {
            Some(token) => erc20::balance_of(&self.provider, token, self.payer).await,
            None => self
                .provider
                .get_balance(self.payer)
                .await
                .map_err(|e| ChainError::Read(format!("balance lookup failed: {e}"))),
        }
    }
}

impl<P> ChainAccessor for AlloyChainAccessor<P>
where
    P: Provider + Send + Sync,
{
    async fn read_allowance(
        &self,
        token: Address,
        owner: Address,
        spender: Address,
    ) -> Result<U256, ChainError> {
        erc20::allowance(&self.provider, token, owner, spender).await
    }

    async fn submit_approval(
        &self,
        token: Address,
        spender: Address,
        amount: U256,
    ) -> Result<TxHandle, ChainError> {
        let hash =
            erc20::send_approve(&self.provider, token, spender, amount, self.config.send_timeout)
                .await?;
        tracing::info!(tx = %hash, token = %token, spender = %spender, amount = %amount, "approval submitted");
        Ok(TxHandle(hash))
    }

    async fn submit_funding(&self, call: FundingCall) -> Result<TxHandle, ChainError> {
        let invoice = call.invoice_id;
        let value = call.value;
        let hash = erc20::send_fund(&self.provider, call, self.config.send_timeout).await?;
        tracing::info!(tx = %hash, invoice = %invoice, value = %value, "funding submitted");
        Ok(TxHandle(hash))
    }

    async fn await_confirmation(
        &self,
        handle: TxHandle,
        timeout: Duration,
    ) -> Result<Confirmation, ChainError> {
        erc20::wait_for_receipt(
            &self.provider,
            handle.0,
            timeout,
            self.config.receipt_poll_interval,
        )
        .await
    }

    /// The direct-pay module expects the ABI-encoded payer address.
    fn funding_payload(&self, invoice: &Invoice) -> Bytes {
        Bytes::from(invoice.payer.abi_encode())
    }

    fn signer(&self) -> Option<Address> {
        Some(self.payer)
    }
}
