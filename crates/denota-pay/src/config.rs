use std::fmt;
use std::time::Duration;

use alloy::primitives::Address;
use settlement::{ChainConfig, ConfigError, DEV_CHAIN_ID, RPC_URL};

/// Invoice fields as handed over by the caller, parsed once the payer is known.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvoiceRequest {
    pub id: String,
    pub token: String,
    pub amount: String,
}

/// Everything the `denota-pay` binary needs, read from the environment.
#[derive(Clone)]
pub struct PayConfig {
    pub chain: ChainConfig,
    pub registrar: Address,
    pub private_key: String,
    pub webhook_urls: Vec<String>,
    pub webhook_secret: Option<Vec<u8>>,
    pub invoice: Option<InvoiceRequest>,
}

impl fmt::Debug for PayConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PayConfig")
            .field("chain", &self.chain)
            .field("registrar", &self.registrar)
            .field("private_key", &"<redacted>")
            .field("webhook_urls", &self.webhook_urls)
            .field("webhook_secret", &self.webhook_secret.as_ref().map(|_| "<redacted>"))
            .field("invoice", &self.invoice)
            .finish()
    }
}

impl PayConfig {
    /// Read `.env` (if present) and the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Build from an arbitrary variable source. Empty values count as unset.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let var = |name: &str| {
            lookup(name)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        let mut chain = ChainConfig {
            rpc_url: var("RPC_URL").unwrap_or_else(|| RPC_URL.to_string()),
            chain_id: parse_or("CHAIN_ID", var("CHAIN_ID"), DEV_CHAIN_ID)?,
            ..ChainConfig::default()
        };
        if let Some(secs) = var("CONFIRMATION_TIMEOUT_SECS") {
            chain.confirmation_timeout =
                Duration::from_secs(parse_or("CONFIRMATION_TIMEOUT_SECS", Some(secs), 0)?);
        }
        if let Some(secs) = var("SEND_TIMEOUT_SECS") {
            chain.send_timeout = Duration::from_secs(parse_or("SEND_TIMEOUT_SECS", Some(secs), 0)?);
        }
        if let Some(ms) = var("RECEIPT_POLL_MS") {
            chain.receipt_poll_interval =
                Duration::from_millis(parse_or("RECEIPT_POLL_MS", Some(ms), 0)?);
        }
        if let Some(tokens) = var("TOKENS") {
            for (symbol, address) in parse_tokens(&tokens)? {
                chain = chain.with_token(&symbol, address);
            }
        }

        let registrar = var("REGISTRAR_ADDRESS")
            .ok_or(ConfigError::Missing("REGISTRAR_ADDRESS"))?
            .parse::<Address>()
            .map_err(|e| ConfigError::Invalid {
                name: "REGISTRAR_ADDRESS",
                reason: e.to_string(),
            })?;
        let private_key = var("PAYER_PRIVATE_KEY").ok_or(ConfigError::Missing("PAYER_PRIVATE_KEY"))?;

        let webhook_urls = var("WEBHOOK_URLS")
            .map(|urls| {
                urls.split(',')
                    .map(|s| s.trim().to_string())
                    .filter(|s| !s.is_empty())
                    .collect()
            })
            .unwrap_or_default();
        let webhook_secret = var("WEBHOOK_SECRET").map(String::into_bytes);

        let invoice = match (var("INVOICE_ID"), var("INVOICE_TOKEN"), var("INVOICE_AMOUNT")) {
            (Some(id), Some(token), Some(amount)) => Some(InvoiceRequest { id, token, amount }),
            (None, None, None) => None,
            (None, _, _) => return Err(ConfigError::Missing("INVOICE_ID")),
            (_, None, _) => return Err(ConfigError::Missing("INVOICE_TOKEN")),
            (_, _, None) => return Err(ConfigError::Missing("INVOICE_AMOUNT")),
        };

        Ok(Self {
            chain,
            registrar,
            private_key,
            webhook_urls,
            webhook_secret,
            invoice,
        })
    }
}

/// Parse `SYM=0xaddr,SYM2=0xaddr2`.
pub fn parse_tokens(raw: &str) -> Result<Vec<(String, Address)>, ConfigError> {
    raw.split(',')
        .map(str::trim)
        .filter(|entry| !entry.is_empty())
        .map(|entry| {
            let (symbol, address) = entry.split_once('=').ok_or_else(|| ConfigError::Invalid {
                name: "TOKENS",
                reason: format!("{entry:?} is not SYMBOL=ADDRESS"),
            })?;
            let symbol = symbol.trim();
            if symbol.is_empty() {
                return Err(ConfigError::Invalid {
                    name: "TOKENS",
                    reason: format!("{entry:?} has an empty symbol"),
                });
            }
            let address = address.trim().parse::<Address>().map_err(|e| ConfigError::Invalid {
                name: "TOKENS",
                reason: format!("{symbol}: {e}"),
            })?;
            Ok((symbol.to_string(), address))
        })
        .collect()
}

fn parse_or<T: std::str::FromStr>(
    name: &'static str,
    value: Option<String>,
    default: T,
) -> Result<T, ConfigError>
where
    T::Err: fmt::Display,
{
    match value {
        None => Ok(default),
        Some(v) => v.parse().map_err(|e: T::Err| ConfigError::Invalid {
            name,
            reason: format!("{v:?}: {e}"),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use settlement::{Currency, ResolvedToken};
    use std::collections::HashMap;

    const KEY: &str = "0xac0974bec39a17e36ba4a6b4d238ff944bacb478cbed5efcae784d7bf4f2ff80";

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name| vars.get(name).cloned()
    }

    fn base() -> Vec<(&'static str, &'static str)> {
        vec![
            ("REGISTRAR_ADDRESS", "0x000000000000000000000000000000000000dEaD"),
            ("PAYER_PRIVATE_KEY", KEY),
        ]
    }

    #[test]
    fn test_defaults() {
        let config = PayConfig::from_lookup(lookup(&base())).unwrap();
        assert_eq!(config.chain.chain_id, DEV_CHAIN_ID);
        assert_eq!(config.chain.rpc_url, RPC_URL);
        assert!(config.chain.tokens.is_empty());
        assert!(config.webhook_urls.is_empty());
        assert!(config.invoice.is_none());
    }

    #[test]
    fn test_full_environment() {
        let mut vars = base();
        vars.extend([
            ("CHAIN_ID", "80001"),
            ("TOKENS", "dai=0x6B175474E89094C44Da98b954EedeAC495271d0F, USDC=0xA0b86991c6218b36c1d19D4a2e9Eb0cE3606eB48"),
            ("CONFIRMATION_TIMEOUT_SECS", "90"),
            ("RECEIPT_POLL_MS", "250"),
            ("WEBHOOK_URLS", "https://a.example/hook, ,https://b.example/hook"),
            ("WEBHOOK_SECRET", "s3cret"),
            ("INVOICE_ID", "7"),
            ("INVOICE_TOKEN", "DAI"),
            ("INVOICE_AMOUNT", "500"),
        ]);
        let config = PayConfig::from_lookup(lookup(&vars)).unwrap();

        assert_eq!(config.chain.chain_id, 80001);
        assert_eq!(config.chain.confirmation_timeout, Duration::from_secs(90));
        assert_eq!(config.chain.receipt_poll_interval, Duration::from_millis(250));
        assert!(matches!(
            config.chain.resolve(&Currency::Token("Dai".into())),
            Some(ResolvedToken::Erc20 { .. })
        ));
        assert_eq!(config.webhook_urls.len(), 2);
        assert_eq!(config.webhook_secret.as_deref(), Some(&b"s3cret"[..]));
        assert_eq!(
            config.invoice,
            Some(InvoiceRequest {
                id: "7".into(),
                token: "DAI".into(),
                amount: "500".into(),
            })
        );
        assert!(!format!("{config:?}").contains(KEY));
    }

    #[test]
    fn test_missing_and_invalid() {
        let err = PayConfig::from_lookup(lookup(&[("PAYER_PRIVATE_KEY", KEY)])).unwrap_err();
        assert_eq!(err, ConfigError::Missing("REGISTRAR_ADDRESS"));

        let mut vars = base();
        vars.push(("CHAIN_ID", "mainnet"));
        assert!(matches!(
            PayConfig::from_lookup(lookup(&vars)).unwrap_err(),
            ConfigError::Invalid { name: "CHAIN_ID", .. }
        ));

        let mut vars = base();
        vars.push(("INVOICE_ID", "7"));
        assert_eq!(
            PayConfig::from_lookup(lookup(&vars)).unwrap_err(),
            ConfigError::Missing("INVOICE_TOKEN")
        );
    }

    #[test]
    fn test_parse_tokens() {
        let tokens = parse_tokens("WETH=0xC02aaA39b223FE8D0A0e5C4F27eAD9083C756Cc2").unwrap();
        assert_eq!(tokens[0].0, "WETH");
        assert!(parse_tokens("").unwrap().is_empty());
        assert!(parse_tokens("WETH").is_err());
        assert!(parse_tokens("=0xC02aaA39b223FE8D0A0e5C4F27eAD9083C756Cc2").is_err());
        assert!(parse_tokens("WETH=0x12").is_err());
    }
}
