//! Prometheus metrics exposition
//!
//! Metrics emitted across the workspace and rendered on `/metrics`:
//!
//! - `dispatch_requests_total` (counter): labels `kind`, `outcome`
//! - `dispatch_attempts_total` (counter): label `kind`
//! - `dispatch_duration_seconds` (histogram): label `kind`
//! - `pool_quota_resets_total` (counter)
//! - `gateway_requests_total` (counter): labels `route`, `status`

use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};

/// Install the Prometheus recorder and return a handle for rendering metrics.
///
/// Configures `dispatch_duration_seconds` with explicit buckets so it renders
/// as a Prometheus histogram (with `_bucket` lines for `histogram_quantile()`
/// queries) rather than the default summary. Bucket boundaries cover the
/// range from 5ms to 60s, matching the configurable upstream timeout range.
pub fn install_recorder() -> PrometheusHandle {
    PrometheusBuilder::new()
        .set_buckets_for_metric(
            metrics_exporter_prometheus::Matcher::Full(
                "dispatch_duration_seconds".to_string(),
            ),
            &[
                0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0, 60.0,
            ],
        )
        .expect("failed to set histogram buckets")
        .install_recorder()
        .expect("failed to install Prometheus recorder")
}

/// Record a completed gateway request with route and status labels.
pub fn record_request(route: &'static str, status: u16) {
    metrics::counter!("gateway_requests_total", "route" => route, "status" => status.to_string())
        .increment(1);
}
