// packages/agent/src/main.rs
//! Intercept Agent
//!
//! Runs next to a workload, relays its inbound traffic and arbitrates
//! intercept requests received as newline-delimited JSON snapshots on stdin.
//! Decision reports are written to stdout, logs to stderr.
//!
//! ```bash
//! intercept-agent [CONFIG_FILE]
//! ```

use anyhow::{Context, Result};
use intercept_agent::control::{reconciler, stdio};
use intercept_agent::observability::{init_metrics, init_tracing};
use intercept_agent::{AgentConfig, Arbitrator, Forwarder, ForwarderTarget, VERSION};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

#[tokio::main]
async fn main() -> Result<()> {
    // Load configuration
    let config = match std::env::args_os().nth(1) {
        Some(path) => AgentConfig::load_from(&path)
            .with_context(|| format!("Failed to load configuration from {:?}", path))?,
        None => AgentConfig::load().context("Failed to load configuration")?,
    };

    // Initialize observability (tracing, metrics)
    init_tracing(&config.observability)?;
    init_metrics(config.observability.metrics_addr)?;

    info!("Starting intercept agent v{} for {}", VERSION, config.agent.name);
    info!("Configuration loaded: {:?}", config);

    let forwarder = Arc::new(
        Forwarder::new(config.listen_addr()?).with_dial_timeout(config.forwarder.dial_timeout()),
    );
    let default_target = ForwarderTarget::new(config.app.host.clone(), config.app.port);
    let arbitrator = Arbitrator::new(
        Arc::clone(&forwarder),
        config.control_plane.host.clone(),
        default_target.clone(),
    );

    // Route to the app before either task runs; serve only fills an unset target
    arbitrator.reset();

    let cancel = CancellationToken::new();

    // Graceful shutdown handler
    tokio::spawn({
        let cancel = cancel.clone();
        async move {
            match tokio::signal::ctrl_c().await {
                Ok(()) => {
                    info!("Received shutdown signal, cleaning up...");
                    cancel.cancel();
                }
                Err(e) => error!("Failed to install CTRL+C signal handler: {}", e),
            }
        }
    });

    let mut serving = tokio::spawn({
        let forwarder = Arc::clone(&forwarder);
        let cancel = cancel.clone();
        async move {
            forwarder
                .serve(default_target.host, default_target.port, cancel)
                .await
        }
    });

    let reconciling = reconciler::run(
        &arbitrator,
        stdio::snapshots(tokio::io::stdin()),
        stdio::reports(tokio::io::stdout()),
        cancel.clone(),
    );

    let reconciled = tokio::select! {
        reconciled = reconciling => reconciled,
        served = &mut serving => {
            cancel.cancel();
            served.context("Forwarder task panicked")??;
            info!("Forwarder stopped");
            return Ok(());
        }
    };

    cancel.cancel();
    match &reconciled {
        Ok(stats) => info!(
            "Reconciliation finished: {} passes, {} reports, {} skipped snapshots",
            stats.passes, stats.reports_sent, stats.skipped_snapshots
        ),
        Err(e) => error!("Reconciliation failed: {}", e),
    }

    serving.await.context("Forwarder task panicked")??;
    info!("Agent stopped gracefully");

    reconciled.map(|_| ()).map_err(Into::into)
}
