// packages/agent/src/observability.rs
//! Tracing and metrics setup
//!
//! Logs go to stderr so stdout stays free for the stdio control-plane
//! transport.

use crate::utils::config::{LogFormat, ObservabilityConfig};
use crate::utils::errors::{AgentError, Result};
use metrics_exporter_prometheus::PrometheusBuilder;
use std::net::SocketAddr;
use tracing::info;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Install the global tracing subscriber.
///
/// `RUST_LOG` overrides the configured level.
pub fn init_tracing(config: &ObservabilityConfig) -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.log_level))
        .map_err(|e| AgentError::Observability(format!("Invalid log filter: {}", e)))?;

    let registry = tracing_subscriber::registry().with(filter);

    let installed = match config.log_format {
        LogFormat::Json => registry
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .try_init(),
        LogFormat::Pretty => registry
            .with(fmt::layer().with_writer(std::io::stderr))
            .try_init(),
    };

    installed.map_err(|e| AgentError::Observability(e.to_string()))
}

/// Start the Prometheus exporter when an address is configured
pub fn init_metrics(addr: Option<SocketAddr>) -> Result<()> {
    let Some(addr) = addr else {
        return Ok(());
    };

    PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()
        .map_err(|e| AgentError::Observability(format!("Failed to start metrics exporter: {}", e)))?;

    info!("Prometheus metrics exported on {}", addr);
    Ok(())
}
