// packages/agent/src/utils/config.rs
//! Agent configuration
//!
//! Values are layered: built-in defaults, then an optional configuration
//! file (`agent.toml`, `agent.yaml`, ... or an explicit path), then
//! environment variables prefixed with `AGENT` using `__` as the section
//! separator, e.g. `AGENT__APP__PORT=8080`.

use crate::utils::errors::{AgentError, Result};
use config::{Config, ConfigBuilder, Environment, File};
use serde::{Deserialize, Serialize};
use std::net::{SocketAddr, ToSocketAddrs};
use std::path::Path;
use std::time::Duration;

/// Top-level agent configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentConfig {
    pub agent: AgentSettings,
    pub forwarder: ForwarderConfig,
    pub app: AppConfig,
    pub control_plane: ControlPlaneConfig,
    pub observability: ObservabilityConfig,
}

/// Identity of this agent
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentSettings {
    /// Name of the workload this agent sits next to
    pub name: String,
}

/// Forwarder listener settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ForwarderConfig {
    /// Listen host (default: 0.0.0.0)
    pub listen_host: String,

    /// Listen port (default: 9900)
    pub listen_port: u16,

    /// Outbound dial timeout in milliseconds (default: 5000)
    pub dial_timeout_ms: u64,
}

impl ForwarderConfig {
    pub fn dial_timeout(&self) -> Duration {
        Duration::from_millis(self.dial_timeout_ms)
    }
}

impl Default for ForwarderConfig {
    fn default() -> Self {
        Self {
            listen_host: "0.0.0.0".to_string(),
            listen_port: 9900,
            dial_timeout_ms: 5_000,
        }
    }
}

/// The workload's own listener, used as the default forwarding target
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub host: String,
    pub port: u16,
}

/// Control-plane settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ControlPlaneConfig {
    /// Host that served intercepts' destination ports are resolved against
    pub host: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    Pretty,
    Json,
}

/// Logging and metrics settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ObservabilityConfig {
    pub log_format: LogFormat,

    /// Default filter directive; `RUST_LOG` takes precedence
    pub log_level: String,

    /// Prometheus exporter listen address (disabled when absent)
    #[serde(default)]
    pub metrics_addr: Option<SocketAddr>,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_format: LogFormat::Pretty,
            log_level: "info".to_string(),
            metrics_addr: None,
        }
    }
}

impl AgentConfig {
    /// Load configuration from `agent.*` in the working directory (if
    /// present) and the environment
    pub fn load() -> Result<Self> {
        let builder = Self::defaults()?.add_source(File::with_name("agent").required(false));
        Self::finish(builder)
    }

    /// Load configuration from an explicit file plus the environment
    pub fn load_from(path: impl AsRef<Path>) -> Result<Self> {
        let builder = Self::defaults()?.add_source(File::from(path.as_ref()).required(true));
        Self::finish(builder)
    }

    fn defaults() -> Result<ConfigBuilder<config::builder::DefaultState>> {
        let forwarder = ForwarderConfig::default();
        let observability = ObservabilityConfig::default();

        let builder = Config::builder()
            .set_default("agent.name", "workload")?
            .set_default("forwarder.listen_host", forwarder.listen_host)?
            .set_default("forwarder.listen_port", i64::from(forwarder.listen_port))?
            .set_default("forwarder.dial_timeout_ms", forwarder.dial_timeout_ms as i64)?
            .set_default("app.host", "127.0.0.1")?
            .set_default("app.port", 8080_i64)?
            .set_default("control_plane.host", "traffic-manager")?
            .set_default("observability.log_format", "pretty")?
            .set_default("observability.log_level", observability.log_level)?;

        Ok(builder)
    }

    fn finish(builder: ConfigBuilder<config::builder::DefaultState>) -> Result<Self> {
        let config: AgentConfig = builder
            .add_source(
                Environment::with_prefix("AGENT")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?
            .try_deserialize()?;

        config.validate()?;
        Ok(config)
    }

    /// Reject configurations the agent cannot run with
    pub fn validate(&self) -> Result<()> {
        if self.forwarder.listen_port == 0 {
            return Err(AgentError::InvalidConfig(
                "forwarder.listen_port must be non-zero".into(),
            ));
        }
        if self.app.port == 0 {
            return Err(AgentError::InvalidConfig("app.port must be non-zero".into()));
        }
        if self.app.host.trim().is_empty() {
            return Err(AgentError::InvalidConfig("app.host must not be empty".into()));
        }
        if self.control_plane.host.trim().is_empty() {
            return Err(AgentError::InvalidConfig(
                "control_plane.host must not be empty".into(),
            ));
        }
        Ok(())
    }

    /// Resolve the forwarder's listening address
    pub fn listen_addr(&self) -> Result<SocketAddr> {
        let host = self.forwarder.listen_host.as_str();
        (host, self.forwarder.listen_port)
            .to_socket_addrs()?
            .next()
            .ok_or_else(|| {
                AgentError::InvalidConfig(format!(
                    "forwarder.listen_host {} did not resolve to an address",
                    host
                ))
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults() {
        let config = AgentConfig::finish(AgentConfig::defaults().unwrap()).unwrap();
        assert_eq!(config.forwarder.listen_port, 9900);
        assert_eq!(config.forwarder.dial_timeout(), Duration::from_secs(5));
        assert_eq!(config.app.host, "127.0.0.1");
        assert_eq!(config.control_plane.host, "traffic-manager");
        assert_eq!(config.observability.log_format, LogFormat::Pretty);
        assert!(config.observability.metrics_addr.is_none());
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(
            file,
            r#"
[agent]
name = "echo-server"

[forwarder]
listen_host = "127.0.0.1"
listen_port = 9911

[app]
host = "127.0.0.1"
port = 5000

[control_plane]
host = "manager.ambassador"

[observability]
log_format = "json"
metrics_addr = "127.0.0.1:9102"
"#
        )
        .unwrap();

        let config = AgentConfig::load_from(file.path()).unwrap();
        assert_eq!(config.agent.name, "echo-server");
        assert_eq!(config.forwarder.listen_port, 9911);
        assert_eq!(config.forwarder.dial_timeout_ms, 5_000);
        assert_eq!(config.app.port, 5000);
        assert_eq!(config.control_plane.host, "manager.ambassador");
        assert_eq!(config.observability.log_format, LogFormat::Json);
        assert_eq!(
            config.observability.metrics_addr,
            Some("127.0.0.1:9102".parse().unwrap())
        );
        assert_eq!(
            config.listen_addr().unwrap(),
            "127.0.0.1:9911".parse().unwrap()
        );
    }

    #[test]
    fn test_missing_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let result = AgentConfig::load_from(dir.path().join("absent.toml"));
        assert!(matches!(result, Err(AgentError::Config(_))));
    }

    #[test]
    fn test_validate_rejects_zero_app_port() {
        let mut config = AgentConfig::finish(AgentConfig::defaults().unwrap()).unwrap();
        config.app.port = 0;
        assert!(matches!(
            config.validate(),
            Err(AgentError::InvalidConfig(_))
        ));
    }

    #[test]
    fn test_validate_rejects_empty_control_plane_host() {
        let mut config = AgentConfig::finish(AgentConfig::defaults().unwrap()).unwrap();
        config.control_plane.host = " ".into();
        assert!(config.validate().is_err());
    }
}
