// packages/agent/src/control/reconciler.rs
//! Reconciliation loop
//!
//! Pulls full intercept snapshots from the control plane, runs each one
//! through the [`Arbitrator`] and pushes the resulting reports back. The
//! transport is anything that yields snapshots as a `Stream` and accepts
//! reports as a `Sink`.

use crate::interception::{Arbitrator, DecisionReport, InterceptRequest};
use crate::utils::errors::{AgentError, Result};
use futures::{pin_mut, Sink, SinkExt, Stream, StreamExt};
use std::fmt;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Counters for one run of the loop
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReconcileStats {
    /// Snapshots reconciled
    pub passes: u64,

    /// Reports accepted by the sink
    pub reports_sent: u64,

    /// Snapshots that failed to decode and were skipped
    pub skipped_snapshots: u64,
}

/// Reconcile every snapshot from `snapshots` until the stream ends, the
/// sink fails, or `cancel` fires.
///
/// The forwarder is pointed back at the workload on exit.
pub async fn run<S, K>(
    arbitrator: &Arbitrator,
    snapshots: S,
    reviews: K,
    cancel: CancellationToken,
) -> Result<ReconcileStats>
where
    S: Stream<Item = Result<Vec<InterceptRequest>>>,
    K: Sink<DecisionReport>,
    K::Error: fmt::Display,
{
    pin_mut!(snapshots);
    pin_mut!(reviews);

    let mut stats = ReconcileStats::default();

    let outcome = loop {
        let next = tokio::select! {
            _ = cancel.cancelled() => {
                info!("Reconciliation cancelled");
                break Ok(());
            }
            next = snapshots.next() => next,
        };

        let snapshot = match next {
            Some(Ok(snapshot)) => snapshot,
            Some(Err(e)) => {
                warn!("Skipping unreadable intercept snapshot: {}", e);
                stats.skipped_snapshots += 1;
                continue;
            }
            None => {
                info!("Intercept snapshot stream ended");
                break Ok(());
            }
        };

        stats.passes += 1;
        let reports = arbitrator.reconcile(&snapshot);
        debug!("Pass {} produced {} reports", stats.passes, reports.len());

        match send_reports(reviews.as_mut(), reports).await {
            Ok(sent) => stats.reports_sent += sent,
            Err(e) => break Err(e),
        }
    };

    arbitrator.reset();
    outcome.map(|()| stats)
}

async fn send_reports<K>(
    mut reviews: std::pin::Pin<&mut K>,
    reports: Vec<DecisionReport>,
) -> Result<u64>
where
    K: Sink<DecisionReport>,
    K::Error: fmt::Display,
{
    let mut sent = 0;
    for report in reports {
        reviews
            .feed(report)
            .await
            .map_err(|e| AgentError::ControlPlane(format!("Failed to send review: {}", e)))?;
        sent += 1;
    }

    reviews
        .flush()
        .await
        .map_err(|e| AgentError::ControlPlane(format!("Failed to flush reviews: {}", e)))?;

    Ok(sent)
}
