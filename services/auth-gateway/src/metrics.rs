//! Prometheus metrics exposition
//!
//! - `auth_token_exchanges_total` (counter): label `outcome`
//!   (`issued`, `rejected`, `malformed`, `error`, `unauthorized`)
//! - `auth_token_exchange_duration_seconds` (histogram): label `outcome`
//! - `auth_logouts_total` (counter)

use metrics_exporter_prometheus::{Matcher, PrometheusBuilder, PrometheusHandle};

const EXCHANGE_DURATION: &str = "auth_token_exchange_duration_seconds";

/// Backend round trips are expected in the 10ms-10s range.
const EXCHANGE_BUCKETS: &[f64] = &[0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0];

fn builder() -> PrometheusBuilder {
    PrometheusBuilder::new()
        .set_buckets_for_metric(Matcher::Full(EXCHANGE_DURATION.to_string()), EXCHANGE_BUCKETS)
        .expect("histogram bucket list is non-empty")
}

/// Install the Prometheus recorder and return a handle for rendering metrics.
pub fn install_recorder() -> PrometheusHandle {
    builder()
        .install_recorder()
        .expect("failed to install Prometheus recorder")
}

/// Build a recorder handle without installing it globally (tests only;
/// only one global recorder may exist per process).
#[cfg(test)]
pub fn isolated_handle() -> PrometheusHandle {
    builder().build_recorder().handle()
}

/// Record one authorize attempt and how it ended.
pub fn record_exchange(outcome: &'static str, duration_secs: f64) {
    metrics::counter!("auth_token_exchanges_total", "outcome" => outcome).increment(1);
    metrics::histogram!(EXCHANGE_DURATION, "outcome" => outcome).record(duration_secs);
}

pub fn record_logout() {
    metrics::counter!("auth_logouts_total").increment(1);
}
