//! Wire a [`PayConfig`] into a ready-to-use orchestrator.

use std::sync::Arc;

use alloy::network::EthereumWallet;
use alloy::primitives::Address;
use alloy::providers::{DynProvider, Provider, ProviderBuilder};
use alloy::signers::local::PrivateKeySigner;
use settlement::{
    AlloyChainAccessor, ConfigError, FanoutNotifier, TracingNotifier, TransactionOrchestrator,
};

use crate::config::PayConfig;
use crate::metrics::MetricsNotifier;
use crate::webhook::{validate_webhook_urls, WebhookNotifier};

pub type PayAccessor = AlloyChainAccessor<DynProvider>;
pub type PayOrchestrator = TransactionOrchestrator<PayAccessor>;

pub struct PayService {
    pub payer: Address,
    pub orchestrator: Arc<PayOrchestrator>,
    pub webhooks: Option<Arc<WebhookNotifier>>,
}

/// Parse the payer key, connect the signing provider and assemble the
/// orchestrator with tracing, metrics and (if configured) webhook notifiers.
pub fn bootstrap(config: &PayConfig) -> Result<PayService, ConfigError> {
    let signer = config
        .private_key
        .parse::<PrivateKeySigner>()
        .map_err(|e| ConfigError::Invalid {
            name: "PAYER_PRIVATE_KEY",
            reason: e.to_string(),
        })?;
    let payer = signer.address();

    let rpc_url = config
        .chain
        .rpc_url
        .parse::<url::Url>()
        .map_err(|e| ConfigError::Invalid {
            name: "RPC_URL",
            reason: e.to_string(),
        })?;
    let provider = ProviderBuilder::new()
        .wallet(EthereumWallet::from(signer))
        .connect_http(rpc_url)
        .erased();

    let mut notifier = FanoutNotifier::new()
        .with(Arc::new(TracingNotifier))
        .with(Arc::new(MetricsNotifier));
    let mut webhooks = None;
    if !config.webhook_urls.is_empty() {
        validate_webhook_urls(&config.webhook_urls)?;
        tracing::info!(count = config.webhook_urls.len(), "webhook URLs configured");
        let webhook = Arc::new(WebhookNotifier::new(
            config.webhook_urls.clone(),
            config.webhook_secret.clone(),
            config.chain.chain_id,
        ));
        notifier = notifier.with(webhook.clone());
        webhooks = Some(webhook);
    }

    let accessor = AlloyChainAccessor::new(provider, payer, config.chain.clone());
    let orchestrator =
        TransactionOrchestrator::new(accessor, config.chain.clone()).with_notifier(Arc::new(notifier));

    tracing::info!(
        payer = %payer,
        chain_id = config.chain.chain_id,
        rpc = %config.chain.rpc_url,
        tokens = config.chain.tokens.len(),
        "settlement service ready"
    );

    Ok(PayService {
        payer,
        orchestrator: Arc::new(orchestrator),
        webhooks,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use settlement::ChainConfig;

    fn config(key: &str, webhooks: Vec<String>) -> PayConfig {
        PayConfig {
            chain: ChainConfig::default(),
            registrar: Address::repeat_byte(0xb2),
            private_key: key.to_string(),
            webhook_urls: webhooks,
            webhook_secret: None,
            invoice: None,
        }
    }

    // First default anvil account.
    const KEY: &str = "0xac0974bec39a17e36ba4a6b4d238ff944bacb478cbed5efcae784d7bf4f2ff80";

    #[test]
    fn test_payer_derived_from_key() {
        let service = bootstrap(&config(KEY, vec![])).unwrap();
        assert_eq!(
            service.payer,
            "0xf39Fd6e51aad88F6F4ce6aB8827279cffFb92266".parse::<Address>().unwrap()
        );
        assert_eq!(service.orchestrator.accessor().payer(), service.payer);
        assert!(service.webhooks.is_none());

        let service = bootstrap(&config(KEY, vec!["https://hooks.example.com".into()])).unwrap();
        assert_eq!(service.webhooks.unwrap().urls().len(), 1);
    }

    #[test]
    fn test_rejects_bad_key_and_webhooks() {
        assert!(matches!(
            bootstrap(&config("0x1234", vec![])),
            Err(ConfigError::Invalid { name: "PAYER_PRIVATE_KEY", .. })
        ));
        assert!(matches!(
            bootstrap(&config(KEY, vec!["ftp://hooks".into()])),
            Err(ConfigError::Invalid { name: "WEBHOOK_URLS", .. })
        ));
    }
}
