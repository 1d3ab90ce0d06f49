use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use denota_pay::metrics::{metrics_output, record_phase};
use denota_pay::{bootstrap, PayConfig, PayService};
use settlement::Invoice;

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = match PayConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            tracing::error!("Invalid configuration: {e}");
            std::process::exit(1);
        }
    };

    let Some(request) = config.invoice.clone() else {
        tracing::error!("INVOICE_ID, INVOICE_TOKEN and INVOICE_AMOUNT are required");
        std::process::exit(1);
    };

    let PayService {
        payer,
        orchestrator,
        webhooks,
    } = match bootstrap(&config) {
        Ok(service) => service,
        Err(e) => {
            tracing::error!("Failed to start: {e}");
            std::process::exit(1);
        }
    };

    let invoice = match Invoice::parse(
        &request.id,
        &request.token,
        &request.amount,
        payer,
        config.registrar,
    ) {
        Ok(invoice) => invoice,
        Err(e) => {
            tracing::error!("Invalid invoice: {e}");
            std::process::exit(1);
        }
    };

    match orchestrator.accessor().health_check().await {
        Ok(block) => tracing::info!(block, "RPC reachable"),
        Err(e) => {
            tracing::error!("RPC unreachable at {}: {e}", config.chain.rpc_url);
            std::process::exit(1);
        }
    }

    // Warn only; the settlement itself reports the definitive outcome.
    if let (Some(token), Some(amount)) = (
        config.chain.resolve(&invoice.currency),
        invoice.payable_amount(),
    ) {
        match orchestrator.accessor().payer_balance(token.address()).await {
            Ok(balance) if balance < amount => tracing::warn!(
                token = %token.symbol(),
                balance = %balance,
                amount = %amount,
                "payer balance is below the invoice amount"
            ),
            Ok(_) => {}
            Err(e) => tracing::warn!(error = %e, "balance pre-check failed"),
        }
        match orchestrator.next_action(&invoice).await {
            Ok(action) => tracing::info!(invoice = %invoice.id, next = %action, "next action"),
            Err(failure) => tracing::debug!(reason = %failure.reason, "next action unavailable"),
        }
    }

    let mut events = orchestrator.subscribe();
    let outcome = orchestrator.settle(invoice).await;
    while let Ok(event) = events.try_recv() {
        record_phase(&event);
        tracing::debug!(invoice = %event.invoice_id, phase = %event.phase, "progress");
    }

    if let Some(webhooks) = webhooks {
        webhooks.drain().await;
    }

    println!("{}", outcome.message());
    if let Some(tx) = outcome.approval_tx {
        println!("approval: {tx}");
    }
    if let Some(tx) = outcome.funding_tx {
        println!("funding:  {tx}");
    }
    if let Some(detail) = &outcome.detail {
        println!("detail:   {detail}");
    }
    if std::env::args().any(|a| a == "--metrics") {
        print!("{}", metrics_output());
    }

    if !outcome.is_settled() {
        std::process::exit(1);
    }
}
