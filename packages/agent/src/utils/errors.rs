// packages/agent/src/utils/errors.rs
//! Error types for the intercept agent

use std::net::SocketAddr;
use thiserror::Error;

/// Crate-wide result type
pub type Result<T> = std::result::Result<T, AgentError>;

/// Errors raised by the agent.
///
/// Arbitration conflicts are not errors: they travel back to the requester
/// as `AGENT_ERROR` decision reports.
#[derive(Debug, Error)]
pub enum AgentError {
    /// The forwarder could not bind its listening address
    #[error("Failed to bind forwarder listener on {addr}: {source}")]
    Bind {
        addr: SocketAddr,
        #[source]
        source: std::io::Error,
    },

    /// An outbound dial to the current target failed
    #[error("Failed to dial {target}: {reason}")]
    Dial { target: String, reason: String },

    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// The control-plane transport failed to deliver or accept a message
    #[error("Control plane error: {0}")]
    ControlPlane(String),

    #[error("Observability setup failed: {0}")]
    Observability(String),
}

impl AgentError {
    /// Whether the error only affects a single relayed connection
    pub fn is_per_connection(&self) -> bool {
        matches!(self, AgentError::Dial { .. })
    }
}
