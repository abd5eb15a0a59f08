use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use std::sync::OnceLock;

static METRICS_HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();

/// Install the Prometheus recorder. Safe to call more than once; later
/// calls are no-ops so test harnesses can spawn several applications in
/// one process.
pub fn init_metrics() {
    if METRICS_HANDLE.get().is_some() {
        return;
    }
    if let Ok(handle) = PrometheusBuilder::new().install_recorder() {
        let _ = METRICS_HANDLE.set(handle);
    }
}

pub fn get_metrics() -> String {
    METRICS_HANDLE
        .get()
        .map(|handle| handle.render())
        .unwrap_or_else(|| "# metrics recorder not initialized\n".to_string())
}

/// Count a payment session creation attempt by outcome
/// ("accepted" / "rejected").
pub fn record_payment_created(outcome: &'static str) {
    metrics::counter!("payments_created_total", "outcome" => outcome).increment(1);
}

/// Accumulate accepted payment amounts in minor units for metering.
pub fn record_payment_amount(currency: &str, amount_minor: u64) {
    metrics::counter!("payments_amount_minor_total", "currency" => currency.to_string())
        .increment(amount_minor);
}

/// Count gateway callbacks by disposition
/// ("applied" / "replayed" / "rejected_hash" / "unknown_order").
pub fn record_callback(disposition: &'static str) {
    metrics::counter!("payment_callbacks_total", "disposition" => disposition).increment(1);
}
