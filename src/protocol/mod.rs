//! Message model: envelopes, payloads, identities, errors.
//!
//! Pure data; no routing behavior lives here. The wire format is JSON
//! with a `type` tag on every payload (version [`PROTOCOL_VERSION`]).

mod envelope;
mod error;
mod identity;
mod payload;

pub use envelope::{Address, AgentMessage, EncryptionInfo, Priority, PROTOCOL_VERSION};
pub use error::{ErrorCode, ErrorPayload, HandlerError, ProtocolError};
pub use identity::{AgentIdentity, AgentKind, AgentMetadata, AgentStatus};
pub use payload::{HeartbeatMetrics, MessageKind, NotificationLevel, Payload};

use serde::{Deserialize, Serialize};

/// Per-agent delivery predicate.
///
/// Owned and set by the agent, consulted by the router when computing
/// routes. An unset field matches everything.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MessageFilter {
    /// Accept only these message kinds.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub kinds: Option<Vec<MessageKind>>,
    /// Accept only messages from these agent ids.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub from: Option<Vec<String>>,
    /// Accept only messages at or above this priority.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub min_priority: Option<Priority>,
}

impl MessageFilter {
    /// Whether the message passes this filter.
    pub fn matches(&self, message: &AgentMessage) -> bool {
        if let Some(kinds) = &self.kinds {
            if !kinds.contains(&message.kind()) {
                return false;
            }
        }
        if let Some(from) = &self.from {
            if !from.iter().any(|id| id == &message.from.id) {
                return false;
            }
        }
        if let Some(min) = self.min_priority {
            if message.priority < min {
                return false;
            }
        }
        true
    }
}
