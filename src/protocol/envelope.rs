//! The message envelope and addressing forms.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use uuid::Uuid;

use super::error::ProtocolError;
use super::identity::AgentIdentity;
use super::payload::{MessageKind, Payload};

/// Protocol version stamped on every envelope.
pub const PROTOCOL_VERSION: &str = "1.0";

/// Wire prefix for topic addresses.
const TOPIC_PREFIX: &str = "topic:";

/// Delivery target of a message.
///
/// Canonical wire forms: a literal agent id, `*` for broadcast, and
/// `topic:<name>` for topic delivery.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Address {
    /// A single named agent.
    Agent(String),
    /// Every registered agent except the sender.
    Broadcast,
    /// The current subscriber set of a named topic.
    Topic(String),
}

impl Address {
    pub fn agent(id: impl Into<String>) -> Self {
        Self::Agent(id.into())
    }

    pub fn topic(name: impl Into<String>) -> Self {
        Self::Topic(name.into())
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Agent(id) => f.write_str(id),
            Self::Broadcast => f.write_str("*"),
            Self::Topic(name) => write!(f, "{TOPIC_PREFIX}{name}"),
        }
    }
}

impl FromStr for Address {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s == "*" {
            Ok(Self::Broadcast)
        } else if let Some(name) = s.strip_prefix(TOPIC_PREFIX) {
            Ok(Self::Topic(name.to_string()))
        } else {
            Ok(Self::Agent(s.to_string()))
        }
    }
}

impl Serialize for Address {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for Address {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        match s.parse() {
            Ok(address) => Ok(address),
            Err(never) => match never {},
        }
    }
}

/// Encryption metadata. Structure only; enforcement is out of scope.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EncryptionInfo {
    pub algorithm: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub key_id: Option<String>,
}

/// The common wrapper around every payload.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentMessage {
    /// Unique message id.
    pub id: String,
    /// Creation instant.
    pub timestamp: DateTime<Utc>,
    /// Protocol version, currently fixed at [`PROTOCOL_VERSION`].
    pub version: String,
    pub from: AgentIdentity,
    pub to: Address,
    #[serde(flatten)]
    pub payload: Payload,
    /// For responses: the id of the originating request.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub correlation_id: Option<String>,
    #[serde(default)]
    pub priority: Priority,
    /// Time-to-live in milliseconds from `timestamp`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ttl_ms: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub encryption: Option<EncryptionInfo>,
}

/// Delivery priority tier.
///
/// `Critical` messages bypass the queue for immediate best-effort dispatch.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    Low = 0,
    #[default]
    Normal = 1,
    High = 2,
    Critical = 3,
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Low => "low",
            Self::Normal => "normal",
            Self::High => "high",
            Self::Critical => "critical",
        };
        f.write_str(s)
    }
}

impl AgentMessage {
    /// Create a fully-formed envelope: fresh id, current timestamp, fixed
    /// version, normal priority.
    pub fn new(from: AgentIdentity, to: Address, payload: Payload) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            timestamp: Utc::now(),
            version: PROTOCOL_VERSION.to_string(),
            from,
            to,
            payload,
            correlation_id: None,
            priority: Priority::default(),
            ttl_ms: None,
            encryption: None,
        }
    }

    pub fn with_priority(mut self, priority: Priority) -> Self {
        self.priority = priority;
        self
    }

    pub fn with_correlation(mut self, id: impl Into<String>) -> Self {
        self.correlation_id = Some(id.into());
        self
    }

    pub fn with_ttl_ms(mut self, ttl_ms: i64) -> Self {
        self.ttl_ms = Some(ttl_ms);
        self
    }

    /// The kind tag of this message's payload.
    pub fn kind(&self) -> MessageKind {
        self.payload.kind()
    }

    /// Whether the TTL has elapsed at `now`.
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        match self.ttl_ms {
            Some(ttl) => (now - self.timestamp).num_milliseconds() > ttl,
            None => false,
        }
    }

    /// Check envelope completeness and TTL.
    ///
    /// An invalid message is rejected here, before any route is computed.
    pub fn validate(&self, now: DateTime<Utc>) -> Result<(), ProtocolError> {
        if self.id.is_empty() {
            return Err(ProtocolError::MissingField("id"));
        }
        if self.version.is_empty() {
            return Err(ProtocolError::MissingField("version"));
        }
        if self.version != PROTOCOL_VERSION {
            return Err(ProtocolError::UnsupportedVersion(self.version.clone()));
        }
        if self.from.id.is_empty() {
            return Err(ProtocolError::MissingField("from"));
        }
        if let Address::Agent(id) = &self.to {
            if id.is_empty() {
                return Err(ProtocolError::MissingField("to"));
            }
        }
        if matches!(self.payload, Payload::Response { .. }) && self.correlation_id.is_none() {
            return Err(ProtocolError::MissingCorrelation(self.id.clone()));
        }
        if let Some(ttl) = self.ttl_ms {
            let age = (now - self.timestamp).num_milliseconds();
            if age > ttl {
                return Err(ProtocolError::Expired {
                    id: self.id.clone(),
                    age_ms: age,
                    ttl_ms: ttl,
                });
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::identity::AgentKind;

    fn sender() -> AgentIdentity {
        AgentIdentity::new("sender", AgentKind::Coordinator)
    }

    fn ping(to: Address) -> AgentMessage {
        AgentMessage::new(
            sender(),
            to,
            Payload::request("ping", serde_json::Value::Null),
        )
    }

    // =========================================================================
    // Address Tests
    // =========================================================================

    #[test]
    fn test_address_wire_forms() {
        assert_eq!(Address::agent("exec-1").to_string(), "exec-1");
        assert_eq!(Address::Broadcast.to_string(), "*");
        assert_eq!(Address::topic("status").to_string(), "topic:status");
    }

    #[test]
    fn test_address_parse() {
        assert_eq!("*".parse::<Address>().unwrap(), Address::Broadcast);
        assert_eq!(
            "topic:status".parse::<Address>().unwrap(),
            Address::topic("status")
        );
        assert_eq!("exec-1".parse::<Address>().unwrap(), Address::agent("exec-1"));
    }

    #[test]
    fn test_address_serde_as_string() {
        let json = serde_json::to_string(&Address::topic("builds")).unwrap();
        assert_eq!(json, "\"topic:builds\"");
        let back: Address = serde_json::from_str(&json).unwrap();
        assert_eq!(back, Address::topic("builds"));
    }

    // =========================================================================
    // Envelope Tests
    // =========================================================================

    #[test]
    fn test_new_envelope_defaults() {
        let msg = ping(Address::agent("b"));
        assert!(!msg.id.is_empty());
        assert_eq!(msg.version, PROTOCOL_VERSION);
        assert_eq!(msg.priority, Priority::Normal);
        assert!(msg.correlation_id.is_none());
        assert!(msg.ttl_ms.is_none());
    }

    #[test]
    fn test_unique_ids() {
        let a = ping(Address::agent("b"));
        let b = ping(Address::agent("b"));
        assert_ne!(a.id, b.id);
    }

    #[test]
    fn test_priority_ordering() {
        assert!(Priority::Critical > Priority::High);
        assert!(Priority::High > Priority::Normal);
        assert!(Priority::Normal > Priority::Low);
    }

    #[test]
    fn test_validate_ok() {
        let msg = ping(Address::agent("b"));
        assert!(msg.validate(Utc::now()).is_ok());
    }

    #[test]
    fn test_validate_rejects_empty_id() {
        let mut msg = ping(Address::agent("b"));
        msg.id.clear();
        assert!(matches!(
            msg.validate(Utc::now()),
            Err(ProtocolError::MissingField("id"))
        ));
    }

    #[test]
    fn test_validate_rejects_unknown_version() {
        let mut msg = ping(Address::agent("b"));
        msg.version = "2.0".to_string();
        assert!(matches!(
            msg.validate(Utc::now()),
            Err(ProtocolError::UnsupportedVersion(_))
        ));
    }

    #[test]
    fn test_validate_rejects_expired_ttl() {
        let mut msg = ping(Address::agent("b")).with_ttl_ms(50);
        msg.timestamp = Utc::now() - chrono::Duration::milliseconds(200);
        assert!(matches!(
            msg.validate(Utc::now()),
            Err(ProtocolError::Expired { .. })
        ));
        assert!(msg.is_expired(Utc::now()));
    }

    #[test]
    fn test_validate_response_needs_correlation() {
        let msg = AgentMessage::new(
            sender(),
            Address::agent("b"),
            Payload::response_ok(serde_json::Value::Null),
        );
        assert!(matches!(
            msg.validate(Utc::now()),
            Err(ProtocolError::MissingCorrelation(_))
        ));

        let msg = msg.with_correlation("req-1");
        assert!(msg.validate(Utc::now()).is_ok());
    }

    #[test]
    fn test_envelope_serde_round_trip() {
        let msg = ping(Address::Broadcast)
            .with_priority(Priority::High)
            .with_ttl_ms(5_000);
        let json = serde_json::to_value(&msg).unwrap();
        assert_eq!(json["to"], "*");
        assert_eq!(json["type"], "request");
        assert_eq!(json["priority"], "high");

        let back: AgentMessage = serde_json::from_value(json).unwrap();
        assert_eq!(back.id, msg.id);
        assert_eq!(back.to, Address::Broadcast);
        assert_eq!(back.kind(), MessageKind::Request);
    }
}
