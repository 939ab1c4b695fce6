// packages/agent/src/interception/intercept.rs
//! Intercept requests and decision reports
//!
//! Both types are scoped to a single reconciliation pass. The control plane
//! owns the authoritative request set; the agent only reviews it.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Lifecycle status of an intercept request, as echoed by the control plane
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Disposition {
    #[default]
    Unspecified,
    Active,
    Waiting,
    AgentError,
    NoClient,
    NoAgent,
    NoMechanism,
    NoPorts,
    Removed,
}

impl Disposition {
    /// Only waiting and active requests take part in arbitration
    pub fn is_reviewable(self) -> bool {
        matches!(self, Disposition::Waiting | Disposition::Active)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Disposition::Unspecified => "UNSPECIFIED",
            Disposition::Active => "ACTIVE",
            Disposition::Waiting => "WAITING",
            Disposition::AgentError => "AGENT_ERROR",
            Disposition::NoClient => "NO_CLIENT",
            Disposition::NoAgent => "NO_AGENT",
            Disposition::NoMechanism => "NO_MECHANISM",
            Disposition::NoPorts => "NO_PORTS",
            Disposition::Removed => "REMOVED",
        }
    }
}

impl fmt::Display for Disposition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One party's request to receive the workload's traffic
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InterceptRequest {
    /// Stable across passes for the same logical request
    pub id: String,

    /// Human-readable intercept name
    #[serde(default)]
    pub name: String,

    /// Requesting party, e.g. "user@host"
    #[serde(default)]
    pub client: String,

    /// Interception mechanism, e.g. "tcp"
    #[serde(default)]
    pub mechanism: String,

    pub disposition: Disposition,

    /// Port on the control-plane host to forward to once served
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub destination_port: Option<u16>,
}

impl InterceptRequest {
    pub fn new(id: impl Into<String>, disposition: Disposition) -> Self {
        Self {
            id: id.into(),
            name: String::new(),
            client: String::new(),
            mechanism: "tcp".to_string(),
            disposition,
            destination_port: None,
        }
    }

    pub fn with_client(mut self, client: impl Into<String>) -> Self {
        self.client = client.into();
        self
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn with_destination_port(mut self, port: u16) -> Self {
        self.destination_port = Some(port);
        self
    }

    /// The destination port of a confirmed active request.
    ///
    /// Returns `None` for anything that is not `ACTIVE` or has no usable port.
    pub fn served_port(&self) -> Option<u16> {
        match (self.disposition, self.destination_port) {
            (Disposition::Active, Some(port)) if port != 0 => Some(port),
            _ => None,
        }
    }
}

/// The agent's verdict on one reviewed request
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DecisionReport {
    /// Id of the request this report answers
    pub id: String,

    /// `ACTIVE` when admitted, `AGENT_ERROR` when rejected
    pub disposition: Disposition,

    /// Rejection reason
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl DecisionReport {
    pub fn admitted(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            disposition: Disposition::Active,
            message: None,
        }
    }

    pub fn rejected(id: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            disposition: Disposition::AgentError,
            message: Some(message.into()),
        }
    }

    pub fn is_admitted(&self) -> bool {
        self.disposition == Disposition::Active
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reviewable_dispositions() {
        assert!(Disposition::Waiting.is_reviewable());
        assert!(Disposition::Active.is_reviewable());
        assert!(!Disposition::NoPorts.is_reviewable());
        assert!(!Disposition::NoClient.is_reviewable());
        assert!(!Disposition::AgentError.is_reviewable());
    }

    #[test]
    fn test_served_port() {
        let active = InterceptRequest::new("a", Disposition::Active).with_destination_port(1138);
        assert_eq!(active.served_port(), Some(1138));

        let no_port = InterceptRequest::new("b", Disposition::Active);
        assert_eq!(no_port.served_port(), None);

        let zero = InterceptRequest::new("c", Disposition::Active).with_destination_port(0);
        assert_eq!(zero.served_port(), None);

        let waiting = InterceptRequest::new("d", Disposition::Waiting).with_destination_port(1138);
        assert_eq!(waiting.served_port(), None);
    }

    #[test]
    fn test_request_json_shape() {
        let json = r#"{"id":"intercept-01","client":"user@host1","disposition":"WAITING"}"#;
        let request: InterceptRequest = serde_json::from_str(json).unwrap();
        assert_eq!(request.id, "intercept-01");
        assert_eq!(request.client, "user@host1");
        assert_eq!(request.disposition, Disposition::Waiting);
        assert_eq!(request.destination_port, None);
    }

    #[test]
    fn test_report_json_omits_empty_message() {
        let admitted = serde_json::to_string(&DecisionReport::admitted("intercept-01")).unwrap();
        assert_eq!(admitted, r#"{"id":"intercept-01","disposition":"ACTIVE"}"#);

        let rejected =
            serde_json::to_value(DecisionReport::rejected("intercept-02", "busy")).unwrap();
        assert_eq!(rejected["disposition"], "AGENT_ERROR");
        assert_eq!(rejected["message"], "busy");
    }
}
