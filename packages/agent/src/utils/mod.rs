// packages/agent/src/utils/mod.rs
//! Configuration and error handling shared across the agent

pub mod config;
pub mod errors;

pub use self::config::{
    AgentConfig, AgentSettings, AppConfig, ControlPlaneConfig, ForwarderConfig, LogFormat,
    ObservabilityConfig,
};
pub use self::errors::{AgentError, Result};
