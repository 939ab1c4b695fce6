// packages/agent/src/lib.rs
//! Intercept Agent Library
//!
//! The traffic-interception core of an agent that runs next to a workload.
//! For every inbound connection it decides whether the bytes go to the
//! workload's own listener or to the party currently holding an intercept.
//!
//! # Architecture
//!
//! The agent is structured into a few modules:
//!
//! - **interception**: Intercept arbitration and the switchable TCP forwarder
//! - **control**: Reconciliation loop and control-plane transports
//! - **observability**: Tracing and metrics setup
//! - **utils**: Configuration and errors

pub mod control;
pub mod interception;
pub mod observability;
pub mod utils;

// Re-export commonly used types
pub use interception::{
    Arbitrator, DecisionReport, Disposition, Forwarder, ForwarderTarget, InterceptRequest,
};
pub use utils::config::AgentConfig;
pub use utils::errors::{AgentError, Result};

// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version() {
        assert!(!VERSION.is_empty());
    }
}
