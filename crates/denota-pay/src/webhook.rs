use std::sync::Mutex;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use serde::Serialize;
use settlement::{ConfigError, SettlementNotifier, SettlementOutcome, TerminalPhase};
use tokio::task::JoinHandle;

use crate::hmac::webhook_signature;

const DELIVERY_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct SettlementWebhook {
    pub event: String,
    pub invoice_id: String,
    pub phase: TerminalPhase,
    pub reason: Option<String>,
    pub detail: Option<String>,
    pub approval_tx: Option<String>,
    pub funding_tx: Option<String>,
    pub chain_id: u64,
    pub timestamp: u64,
}

impl SettlementWebhook {
    pub fn from_outcome(outcome: &SettlementOutcome, chain_id: u64) -> Self {
        let event = match outcome.phase {
            TerminalPhase::Settled => "settlement.settled",
            TerminalPhase::Failed => "settlement.failed",
        };
        Self {
            event: event.to_string(),
            invoice_id: outcome.invoice_id.to_string(),
            phase: outcome.phase,
            reason: outcome.reason.map(|r| r.as_str().to_string()),
            detail: outcome.detail.clone(),
            approval_tx: outcome.approval_tx.map(|h| h.to_string()),
            funding_tx: outcome.funding_tx.map(|h| h.to_string()),
            chain_id,
            timestamp: SystemTime::now()
                .duration_since(UNIX_EPOCH)
                .map(|d| d.as_secs())
                .unwrap_or_default(),
        }
    }
}

/// Check webhook URLs at startup. Non-HTTP schemes are rejected; plain HTTP
/// is accepted with a warning.
pub fn validate_webhook_urls(urls: &[String]) -> Result<(), ConfigError> {
    for raw in urls {
        let parsed = url::Url::parse(raw).map_err(|e| ConfigError::Invalid {
            name: "WEBHOOK_URLS",
            reason: format!("{raw}: {e}"),
        })?;
        match parsed.scheme() {
            "https" => {}
            "http" => tracing::warn!(
                url = %raw,
                "webhook URL does not use HTTPS, payloads will be sent in cleartext"
            ),
            other => {
                return Err(ConfigError::Invalid {
                    name: "WEBHOOK_URLS",
                    reason: format!("{raw}: unsupported scheme {other}"),
                })
            }
        }
    }
    Ok(())
}

pub fn webhook_client() -> reqwest::Client {
    reqwest::Client::builder()
        .timeout(DELIVERY_TIMEOUT)
        .build()
        .unwrap_or_else(|_| reqwest::Client::new())
}

/// POSTs every outcome to the configured URLs, fire-and-forget.
/// With a secret set, each request carries an `X-Webhook-Signature` header.
pub struct WebhookNotifier {
    client: reqwest::Client,
    urls: Vec<String>,
    secret: Option<Vec<u8>>,
    chain_id: u64,
    in_flight: Mutex<Vec<JoinHandle<()>>>,
}

impl WebhookNotifier {
    pub fn new(urls: Vec<String>, secret: Option<Vec<u8>>, chain_id: u64) -> Self {
        Self {
            client: webhook_client(),
            urls,
            secret,
            chain_id,
            in_flight: Mutex::new(Vec::new()),
        }
    }

    pub fn urls(&self) -> &[String] {
        &self.urls
    }

    /// Wait for deliveries started so far. Each is bounded by the client timeout.
    pub async fn drain(&self) {
        let handles = match self.in_flight.lock() {
            Ok(mut handles) => std::mem::take(&mut *handles),
            Err(_) => return,
        };
        for handle in handles {
            let _ = handle.await;
        }
    }
}

impl SettlementNotifier for WebhookNotifier {
    fn notify(&self, outcome: &SettlementOutcome) {
        if self.urls.is_empty() {
            return;
        }
        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            tracing::warn!("no async runtime, webhooks skipped");
            return;
        };

        let webhook = SettlementWebhook::from_outcome(outcome, self.chain_id);
        let body = match serde_json::to_vec(&webhook) {
            Ok(b) => b,
            Err(e) => {
                tracing::error!(error = %e, "failed to serialize webhook payload");
                return;
            }
        };
        let signature = self
            .secret
            .as_deref()
            .map(|secret| webhook_signature(secret, &body));

        for url in &self.urls {
            let client = self.client.clone();
            let url = url.clone();
            let body = body.clone();
            let signature = signature.clone();

            let delivery = runtime.spawn(async move {
                let mut req = client
                    .post(&url)
                    .header("content-type", "application/json");
                if let Some(sig) = &signature {
                    req = req.header("X-Webhook-Signature", sig.as_str());
                }

                match req.body(body).send().await {
                    Ok(resp) => {
                        tracing::debug!(url = %url, status = %resp.status(), "webhook delivered")
                    }
                    Err(e) => tracing::warn!(url = %url, error = %e, "webhook delivery failed"),
                }
            });
            if let Ok(mut handles) = self.in_flight.lock() {
                handles.retain(|h| !h.is_finished());
                handles.push(delivery);
            }
        }
    }
}
