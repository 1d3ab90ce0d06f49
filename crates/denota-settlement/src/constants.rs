use std::collections::BTreeMap;
use std::time::Duration;

use alloy::primitives::Address;

use crate::invoice::{Currency, ResolvedToken};

/// Chain ID of a local Anvil/Hardhat development node.
pub const DEV_CHAIN_ID: u64 = 31337;

/// Default RPC endpoint for a local development node.
pub const RPC_URL: &str = "http://localhost:8545";

/// Symbol used for invoices paid in the chain's native currency.
pub const NATIVE_SYMBOL: &str = "NATIVE";

/// How long a settlement waits for a receipt before giving up locally.
pub const DEFAULT_CONFIRMATION_TIMEOUT: Duration = Duration::from_secs(60);

/// Upper bound on a single `eth_sendTransaction` round trip.
pub const DEFAULT_SEND_TIMEOUT: Duration = Duration::from_secs(30);

/// Interval between receipt lookups while a transaction is pending.
pub const DEFAULT_RECEIPT_POLL_INTERVAL: Duration = Duration::from_millis(1_000);

/// Runtime chain configuration shared by the EVM adapter and the orchestrator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChainConfig {
    pub chain_id: u64,
    pub rpc_url: String,
    /// Token registry, keyed by upper-case symbol.
    pub tokens: BTreeMap<String, Address>,
    pub confirmation_timeout: Duration,
    pub send_timeout: Duration,
    pub receipt_poll_interval: Duration,
}

impl Default for ChainConfig {
    /// Local development node, empty token registry.
    fn default() -> Self {
        Self {
            chain_id: DEV_CHAIN_ID,
            rpc_url: RPC_URL.to_string(),
            tokens: BTreeMap::new(),
            confirmation_timeout: DEFAULT_CONFIRMATION_TIMEOUT,
            send_timeout: DEFAULT_SEND_TIMEOUT,
            receipt_poll_interval: DEFAULT_RECEIPT_POLL_INTERVAL,
        }
    }
}

impl ChainConfig {
    /// Register (or replace) a token contract under `symbol`.
    pub fn with_token(mut self, symbol: &str, address: Address) -> Self {
        self.tokens.insert(symbol.trim().to_ascii_uppercase(), address);
        self
    }

    pub fn with_confirmation_timeout(mut self, timeout: Duration) -> Self {
        self.confirmation_timeout = timeout;
        self
    }

    /// Resolve an invoice currency against the registry.
    /// Returns `None` for symbols with no known contract.
    pub fn resolve(&self, currency: &Currency) -> Option<ResolvedToken> {
        match currency {
            Currency::Native => Some(ResolvedToken::Native),
            Currency::Token(symbol) => {
                let symbol = symbol.to_ascii_uppercase();
                self.tokens
                    .get(&symbol)
                    .map(|address| ResolvedToken::Erc20 {
                        symbol,
                        address: *address,
                    })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_is_case_insensitive() {
        let dai = Address::repeat_byte(0xda);
        let config = ChainConfig::default().with_token("dai", dai);

        assert_eq!(
            config.resolve(&Currency::Token("Dai".into())),
            Some(ResolvedToken::Erc20 {
                symbol: "DAI".into(),
                address: dai
            })
        );
    }

    #[test]
    fn test_resolve_native_without_registry() {
        let config = ChainConfig::default();
        assert_eq!(config.resolve(&Currency::Native), Some(ResolvedToken::Native));
        assert_eq!(config.resolve(&Currency::Token("WETH".into())), None);
    }
}
