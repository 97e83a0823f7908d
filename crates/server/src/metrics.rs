//! Prometheus metrics

use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use once_cell::sync::OnceCell;

static HANDLE: OnceCell<PrometheusHandle> = OnceCell::new();

/// Install the Prometheus recorder. Safe to call more than once; only
/// the first call installs.
pub fn init_metrics() {
    let result = HANDLE.get_or_try_init(|| PrometheusBuilder::new().install_recorder());
    if let Err(e) = result {
        tracing::warn!(error = %e, "metrics recorder not installed");
    }
}

/// `GET /metrics`
pub async fn metrics_handler() -> String {
    HANDLE.get().map(|handle| handle.render()).unwrap_or_default()
}
