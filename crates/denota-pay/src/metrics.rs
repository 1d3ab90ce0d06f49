use prometheus::{register_int_counter_vec, Encoder, IntCounterVec, TextEncoder};
use std::sync::LazyLock;

use settlement::{PhaseEvent, SettlementNotifier, SettlementOutcome, TerminalPhase};

pub static SETTLEMENTS: LazyLock<IntCounterVec> = LazyLock::new(|| {
    register_int_counter_vec!(
        "denota_settlements_total",
        "Terminal settlement outcomes",
        &["phase", "reason"]
    )
    .unwrap()
});

pub static PHASE_TRANSITIONS: LazyLock<IntCounterVec> = LazyLock::new(|| {
    register_int_counter_vec!(
        "denota_phase_transitions_total",
        "Settlement attempts entering each phase",
        &["phase"]
    )
    .unwrap()
});

pub fn record_phase(event: &PhaseEvent) {
    PHASE_TRANSITIONS
        .with_label_values(&[event.phase.as_str()])
        .inc();
}

/// Counts outcomes by terminal phase and failure reason.
#[derive(Debug, Default, Clone, Copy)]
pub struct MetricsNotifier;

impl SettlementNotifier for MetricsNotifier {
    fn notify(&self, outcome: &SettlementOutcome) {
        let phase = match outcome.phase {
            TerminalPhase::Settled => "settled",
            TerminalPhase::Failed => "failed",
        };
        let reason = outcome.reason.map(|r| r.as_str()).unwrap_or("none");
        SETTLEMENTS.with_label_values(&[phase, reason]).inc();
    }
}

pub fn metrics_output() -> String {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = Vec::new();
    if encoder.encode(&metric_families, &mut buffer).is_err() {
        return String::new();
    }
    String::from_utf8(buffer).unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use settlement::{Failure, FailureReason, InvoiceId, Phase};

    #[test]
    fn test_outcomes_are_counted_by_reason() {
        let counter = SETTLEMENTS.with_label_values(&["failed", "unknown_token"]);
        let before = counter.get();

        MetricsNotifier.notify(&SettlementOutcome::rejected(
            InvoiceId::from(1),
            Failure::new(FailureReason::UnknownToken),
        ));

        assert_eq!(counter.get(), before + 1);
        assert!(metrics_output().contains("denota_settlements_total"));
    }

    #[test]
    fn test_phase_events_are_counted() {
        let counter = PHASE_TRANSITIONS.with_label_values(&["awaiting_approval"]);
        let before = counter.get();
        record_phase(&PhaseEvent {
            invoice_id: InvoiceId::from(1),
            phase: Phase::AwaitingApproval,
            reason: None,
        });
        assert_eq!(counter.get(), before + 1);
    }
}
