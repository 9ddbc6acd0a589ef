//! Agent identities and lifecycle status.

use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Kind of agent behind an identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AgentKind {
    /// Executes actions (shell, file ops) on behalf of others.
    Executor,
    /// Produces plans from goals.
    Planner,
    /// Analyzes artifacts and reports findings.
    Analyzer,
    /// Coordinates other agents.
    Coordinator,
}

impl fmt::Display for AgentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Executor => "executor",
            Self::Planner => "planner",
            Self::Analyzer => "analyzer",
            Self::Coordinator => "coordinator",
        };
        f.write_str(s)
    }
}

impl FromStr for AgentKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "executor" => Ok(Self::Executor),
            "planner" => Ok(Self::Planner),
            "analyzer" => Ok(Self::Analyzer),
            "coordinator" => Ok(Self::Coordinator),
            _ => Err(format!("invalid agent kind: {s}")),
        }
    }
}

/// Lifecycle status of an agent.
///
/// Transitions are not validated; an agent may set any status. Status
/// changes are broadcast as events so coordinators can observe them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AgentStatus {
    #[default]
    Idle,
    Busy,
    Error,
    Offline,
}

impl fmt::Display for AgentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Idle => "idle",
            Self::Busy => "busy",
            Self::Error => "error",
            Self::Offline => "offline",
        };
        f.write_str(s)
    }
}

/// Bookkeeping attached to every identity.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentMetadata {
    /// Agent implementation version.
    pub version: String,
    /// When the identity was created.
    pub created: DateTime<Utc>,
    /// Last time the agent handled a message.
    pub last_active: DateTime<Utc>,
    /// Free-form extras (model name, host, ...).
    #[serde(default, skip_serializing_if = "serde_json::Map::is_empty")]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl Default for AgentMetadata {
    fn default() -> Self {
        let now = Utc::now();
        Self {
            version: "0.1.0".to_string(),
            created: now,
            last_active: now,
            extra: serde_json::Map::new(),
        }
    }
}

/// Addressable identity of an agent.
///
/// Owned by its agent; only that agent's handler mutates status and
/// `last_active`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentIdentity {
    pub id: String,
    pub kind: AgentKind,
    /// Backing provider (e.g. which LLM or runtime serves this agent).
    pub provider: String,
    /// Advertised capability names (e.g. "execute", "plan").
    pub capabilities: BTreeSet<String>,
    pub status: AgentStatus,
    pub metadata: AgentMetadata,
}

impl AgentIdentity {
    /// Create an identity with default provider and no capabilities.
    pub fn new(id: impl Into<String>, kind: AgentKind) -> Self {
        Self {
            id: id.into(),
            kind,
            provider: "local".to_string(),
            capabilities: BTreeSet::new(),
            status: AgentStatus::Idle,
            metadata: AgentMetadata::default(),
        }
    }

    /// Set the backing provider.
    pub fn with_provider(mut self, provider: impl Into<String>) -> Self {
        self.provider = provider.into();
        self
    }

    /// Advertise a capability.
    pub fn with_capability(mut self, cap: impl Into<String>) -> Self {
        self.capabilities.insert(cap.into());
        self
    }

    /// Whether this agent advertises the given capability.
    pub fn has_capability(&self, cap: &str) -> bool {
        self.capabilities.contains(cap)
    }

    /// Refresh the last-active timestamp.
    pub fn touch(&mut self) {
        self.metadata.last_active = Utc::now();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_agent_kind_round_trip() {
        for kind in [
            AgentKind::Executor,
            AgentKind::Planner,
            AgentKind::Analyzer,
            AgentKind::Coordinator,
        ] {
            let parsed: AgentKind = kind.to_string().parse().unwrap();
            assert_eq!(parsed, kind);
        }
    }

    #[test]
    fn test_agent_kind_invalid() {
        assert!("librarian".parse::<AgentKind>().is_err());
    }

    #[test]
    fn test_identity_builder() {
        let id = AgentIdentity::new("exec-1", AgentKind::Executor)
            .with_provider("sandbox")
            .with_capability("execute")
            .with_capability("write");

        assert_eq!(id.id, "exec-1");
        assert_eq!(id.provider, "sandbox");
        assert!(id.has_capability("execute"));
        assert!(id.has_capability("write"));
        assert!(!id.has_capability("plan"));
        assert_eq!(id.status, AgentStatus::Idle);
    }

    #[test]
    fn test_touch_advances_last_active() {
        let mut id = AgentIdentity::new("a", AgentKind::Planner);
        let before = id.metadata.last_active;
        id.touch();
        assert!(id.metadata.last_active >= before);
    }

    #[test]
    fn test_identity_serde() {
        let id = AgentIdentity::new("exec-1", AgentKind::Executor).with_capability("execute");
        let json = serde_json::to_string(&id).unwrap();
        assert!(json.contains("\"kind\":\"executor\""));
        let back: AgentIdentity = serde_json::from_str(&json).unwrap();
        assert_eq!(back.id, "exec-1");
        assert!(back.has_capability("execute"));
    }
}
