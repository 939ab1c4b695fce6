// packages/agent/src/interception/mod.rs
//! Traffic interception core
//!
//! This module decides where the workload's inbound traffic goes:
//!
//! - **Intercept**: Request and report types exchanged with the control plane
//! - **Arbitrator**: Admits at most one intercept per pass, rejects the rest
//! - **Forwarder**: TCP relay with a destination that can change at any time
//!
//! # Architecture
//!
//! ```text
//! snapshot ──► Arbitrator ──► DecisionReports ──► control plane
//!                  │
//!                  └─ change_target ──► Forwarder ──► app or intercept
//!                                           ▲
//!                               inbound connections
//! ```

pub mod arbitrator;
pub mod forwarder;
pub mod intercept;

// Re-export commonly used types
pub use arbitrator::Arbitrator;
pub use forwarder::{Forwarder, ForwarderTarget};
pub use intercept::{DecisionReport, Disposition, InterceptRequest};
