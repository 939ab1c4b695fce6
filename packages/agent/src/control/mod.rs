// packages/agent/src/control/mod.rs
//! Control-plane boundary
//!
//! - **Reconciler**: Drives the arbitrator from a stream of full snapshots
//! - **Stdio**: Newline-delimited JSON snapshots in, reports out

pub mod reconciler;
pub mod stdio;

pub use reconciler::ReconcileStats;
