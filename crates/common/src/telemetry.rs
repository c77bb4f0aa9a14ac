//! Tracing subscriber and metrics exporter setup for the binaries

use metrics_exporter_prometheus::{Matcher, PrometheusBuilder};
use std::net::SocketAddr;
use tracing_subscriber::EnvFilter;

use crate::config::ObservabilityConfig;
use crate::errors::{AppError, Result};
use crate::metrics::{register_metrics, GATEWAY_BUCKETS, METRICS_PREFIX, RETRIEVAL_BUCKETS};

/// Install the global tracing subscriber
///
/// `RUST_LOG` wins over the configured level. Logs go to stderr so that
/// command output on stdout stays machine-readable.
pub fn init_tracing(config: &ObservabilityConfig) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.log_level));

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(std::io::stderr);

    if config.json_logging {
        builder.json().with_current_span(true).init();
    } else {
        builder.init();
    }
}

/// Start the Prometheus exporter when a metrics port is configured
pub fn init_metrics(config: &ObservabilityConfig) -> Result<()> {
    if config.metrics_port == 0 {
        return Ok(());
    }

    let addr = SocketAddr::from(([0, 0, 0, 0], config.metrics_port));
    PrometheusBuilder::new()
        .with_http_listener(addr)
        .set_buckets_for_metric(
            Matcher::Full(format!("{}_retrieval_duration_seconds", METRICS_PREFIX)),
            RETRIEVAL_BUCKETS,
        )
        .and_then(|b| {
            b.set_buckets_for_metric(
                Matcher::Suffix("_duration_seconds".to_string()),
                GATEWAY_BUCKETS,
            )
        })
        .and_then(|b| b.install())
        .map_err(|e| AppError::Configuration {
            message: format!("Failed to install metrics exporter: {}", e),
        })?;

    register_metrics();
    tracing::info!(port = config.metrics_port, "Metrics exporter listening");
    Ok(())
}
