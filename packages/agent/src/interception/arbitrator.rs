// packages/agent/src/interception/arbitrator.rs
//! Intercept arbitration
//!
//! Turns a full snapshot of intercept requests into a forwarding decision
//! and one report per waiting request. Nothing is carried between passes
//! except the forwarder's current target, so every pass is recomputed from
//! the snapshot alone.
//!
//! Priority is strictly positional: the first confirmed `ACTIVE` request is
//! served, and if none is, the first `WAITING` request is admitted. Every
//! other waiting request is rejected with a message naming the winner.

use crate::interception::forwarder::{Forwarder, ForwarderTarget};
use crate::interception::intercept::{DecisionReport, Disposition, InterceptRequest};
use std::sync::Arc;
use tracing::{debug, info};

/// Decides which intercept, if any, the forwarder serves
pub struct Arbitrator {
    forwarder: Arc<Forwarder>,

    /// Host that served requests' destination ports live on
    control_plane_host: String,

    /// The workload's own endpoint
    default_target: ForwarderTarget,
}

impl Arbitrator {
    pub fn new(
        forwarder: Arc<Forwarder>,
        control_plane_host: impl Into<String>,
        default_target: ForwarderTarget,
    ) -> Self {
        Self {
            forwarder,
            control_plane_host: control_plane_host.into(),
            default_target,
        }
    }

    pub fn forwarder(&self) -> &Arc<Forwarder> {
        &self.forwarder
    }

    /// Point the forwarder back at the workload
    pub fn reset(&self) {
        self.forwarder
            .change_target(self.default_target.host.clone(), self.default_target.port);
    }

    /// Run one reconciliation pass over `snapshot`.
    ///
    /// Reports come back in snapshot order and cover only `WAITING`
    /// requests; confirmed active requests are never re-reported.
    pub fn reconcile(&self, snapshot: &[InterceptRequest]) -> Vec<DecisionReport> {
        if snapshot.is_empty() {
            self.reset();
            return Vec::new();
        }

        let served = snapshot.iter().find_map(|request| {
            request
                .served_port()
                .map(|port| (request.id.as_str(), port))
        });

        match served {
            Some((id, port)) => {
                debug!("Serving intercept {} on {}:{}", id, self.control_plane_host, port);
                self.forwarder
                    .change_target(self.control_plane_host.clone(), port);
            }
            None => self.reset(),
        }

        let mut first_waiting: Option<&str> = None;
        let mut reports = Vec::new();

        for request in snapshot
            .iter()
            .filter(|request| request.disposition == Disposition::Waiting)
        {
            let report = if let Some((served_id, _)) = served {
                DecisionReport::rejected(
                    &request.id,
                    format!("Conflicts with the currently-served intercept {:?}", served_id),
                )
            } else if let Some(waiting_id) = first_waiting {
                DecisionReport::rejected(
                    &request.id,
                    format!(
                        "Conflicts with the currently-waiting-to-be-served intercept {:?}",
                        waiting_id
                    ),
                )
            } else {
                first_waiting = Some(request.id.as_str());
                DecisionReport::admitted(&request.id)
            };

            if report.is_admitted() {
                info!("Admitted intercept {} from {}", request.id, request.client);
                metrics::counter!("intercept_agent_reviews_total", "outcome" => "admitted")
                    .increment(1);
            } else {
                info!(
                    "Rejected intercept {} from {}: {}",
                    request.id,
                    request.client,
                    report.message.as_deref().unwrap_or_default()
                );
                metrics::counter!("intercept_agent_reviews_total", "outcome" => "rejected")
                    .increment(1);
            }

            reports.push(report);
        }

        debug!(
            "Reconciled {} intercepts into {} reports",
            snapshot.len(),
            reports.len()
        );
        reports
    }
}
