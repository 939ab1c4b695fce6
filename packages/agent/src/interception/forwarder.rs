// packages/agent/src/interception/forwarder.rs
//! Switchable TCP forwarder
//!
//! Accepts connections on a fixed listening address and relays each one to
//! whichever target is current when the connection is accepted. The target
//! can be replaced at any time; established relays keep their original
//! destination.
//!
//! # Architecture
//!
//! ```text
//! client ──► listener ──► accept loop ──► relay task ──► current target
//!                              │                          (app or intercept)
//!                              └── reads Arc<ForwarderTarget> once per connection
//! ```

use crate::utils::errors::{AgentError, Result};
use parking_lot::RwLock;
use std::fmt;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{copy_bidirectional, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

const DEFAULT_DIAL_TIMEOUT: Duration = Duration::from_secs(5);
const ACCEPT_ERROR_BACKOFF: Duration = Duration::from_millis(50);

/// Destination the forwarder relays to
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ForwarderTarget {
    pub host: String,
    pub port: u16,
}

impl ForwarderTarget {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
        }
    }
}

impl fmt::Display for ForwarderTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.host, self.port)
    }
}

/// TCP forwarder with a replaceable destination
pub struct Forwarder {
    /// Address the accept loop binds to
    listen_addr: SocketAddr,

    /// Upper bound on each outbound connect
    dial_timeout: Duration,

    /// Swapped as a whole so readers never see a mixed host/port pair
    target: RwLock<Option<Arc<ForwarderTarget>>>,
}

impl Forwarder {
    pub fn new(listen_addr: SocketAddr) -> Self {
        Self {
            listen_addr,
            dial_timeout: DEFAULT_DIAL_TIMEOUT,
            target: RwLock::new(None),
        }
    }

    pub fn with_dial_timeout(mut self, dial_timeout: Duration) -> Self {
        self.dial_timeout = dial_timeout;
        self
    }

    /// The target in effect right now, or `None` before the first
    /// `serve`/`change_target`
    pub fn target(&self) -> Option<Arc<ForwarderTarget>> {
        self.target.read().clone()
    }

    /// Replace the current target.
    ///
    /// Only connections accepted afterwards are affected. Returns `true` when
    /// the target actually changed.
    pub fn change_target(&self, host: impl Into<String>, port: u16) -> bool {
        let next = ForwarderTarget::new(host, port);
        let mut current = self.target.write();

        if current.as_deref() == Some(&next) {
            return false;
        }

        info!("Forwarding target changed to {}", next);
        metrics::counter!("intercept_agent_target_changes_total").increment(1);
        *current = Some(Arc::new(next));
        true
    }

    /// Set the target only if none has been set yet.
    ///
    /// Returns `true` when `(host, port)` became the target.
    pub fn init_target(&self, host: impl Into<String>, port: u16) -> bool {
        let mut current = self.target.write();
        if current.is_some() {
            return false;
        }

        let initial = ForwarderTarget::new(host, port);
        info!("Forwarding target initialized to {}", initial);
        *current = Some(Arc::new(initial));
        true
    }

    /// Bind the listening address and run the accept loop until `cancel`
    /// fires.
    ///
    /// `(default_host, default_port)` becomes the target unless one was
    /// already set, so an earlier reconciliation pass is never undone.
    /// A bind failure is returned to the caller; per-connection failures are
    /// logged and never end the loop.
    pub async fn serve(
        &self,
        default_host: impl Into<String>,
        default_port: u16,
        cancel: CancellationToken,
    ) -> Result<()> {
        let listener = TcpListener::bind(self.listen_addr)
            .await
            .map_err(|source| AgentError::Bind {
                addr: self.listen_addr,
                source,
            })?;

        self.serve_listener(listener, default_host, default_port, cancel)
            .await
    }

    /// Run the accept loop over an already-bound listener
    pub async fn serve_listener(
        &self,
        listener: TcpListener,
        default_host: impl Into<String>,
        default_port: u16,
        cancel: CancellationToken,
    ) -> Result<()> {
        self.init_target(default_host, default_port);

        let local_addr = listener.local_addr()?;
        info!("Forwarder listening on {}", local_addr);

        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    info!("Forwarder on {} stopped accepting connections", local_addr);
                    return Ok(());
                }

                accepted = listener.accept() => match accepted {
                    Ok((inbound, peer)) => {
                        metrics::counter!("intercept_agent_connections_total").increment(1);

                        let target = self.target();
                        let dial_timeout = self.dial_timeout;

                        tokio::spawn(async move {
                            let Some(target) = target else {
                                warn!("No forwarding target set, dropping connection from {}", peer);
                                return;
                            };

                            debug!("Accepted connection from {}, relaying to {}", peer, target);

                            match relay(inbound, &target, dial_timeout).await {
                                Ok(()) => debug!("Relay {} -> {} closed", peer, target),
                                Err(e) if e.is_per_connection() => {
                                    metrics::counter!("intercept_agent_dial_failures_total")
                                        .increment(1);
                                    warn!("Dropping connection from {}: {}", peer, e);
                                }
                                Err(e) => warn!("Relay {} -> {} failed: {}", peer, target, e),
                            }
                        });
                    }
                    Err(e) => {
                        error!("Failed to accept connection: {}", e);
                        pause(&cancel, ACCEPT_ERROR_BACKOFF).await;
                    }
                }
            }
        }
    }
}

/// Sleep for `delay`, cut short by cancellation
async fn pause(cancel: &CancellationToken, delay: Duration) {
    tokio::select! {
        _ = cancel.cancelled() => {}
        _ = tokio::time::sleep(delay) => {}
    }
}

/// Dial `target` and pipe bytes both ways until either side closes
async fn relay(
    mut inbound: TcpStream,
    target: &ForwarderTarget,
    dial_timeout: Duration,
) -> Result<()> {
    let connect = TcpStream::connect((target.host.as_str(), target.port));
    let mut outbound = match tokio::time::timeout(dial_timeout, connect).await {
        Ok(Ok(stream)) => stream,
        Ok(Err(e)) => {
            return Err(AgentError::Dial {
                target: target.to_string(),
                reason: e.to_string(),
            })
        }
        Err(_) => {
            return Err(AgentError::Dial {
                target: target.to_string(),
                reason: format!("timed out after {:?}", dial_timeout),
            })
        }
    };

    inbound.set_nodelay(true).ok();
    outbound.set_nodelay(true).ok();

    let copied = copy_bidirectional(&mut inbound, &mut outbound).await;
    let _ = outbound.shutdown().await;
    let _ = inbound.shutdown().await;

    match copied {
        Ok((to_target, to_client)) => {
            metrics::counter!("intercept_agent_bytes_total", "direction" => "to_target")
                .increment(to_target);
            metrics::counter!("intercept_agent_bytes_total", "direction" => "to_client")
                .increment(to_client);
            Ok(())
        }
        // Half-close races at teardown
        Err(e)
            if matches!(
                e.kind(),
                std::io::ErrorKind::BrokenPipe
                    | std::io::ErrorKind::NotConnected
                    | std::io::ErrorKind::ConnectionReset
            ) =>
        {
            Ok(())
        }
        Err(e) => Err(e.into()),
    }
}
