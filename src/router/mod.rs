//! Central message routing.
//!
//! The [`MessageRouter`] owns the registry of live handlers, the
//! topic-subscription table, the per-agent filter table, and the
//! pending-delivery queue. Agents never talk to each other directly;
//! every send goes through [`MessageRouter::route_message`].

mod config;
mod retry;
#[allow(clippy::module_inception)]
mod router;

pub use config::RouterConfig;
pub use retry::{backoff_delay, QueuedMessage};
pub use router::{MessageRouter, RouterStats};

use serde::{Deserialize, Serialize};

use crate::protocol::ProtocolError;

/// How a route was computed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RouteKind {
    Direct,
    Topic,
    Broadcast,
}

/// A single resolved delivery obligation.
///
/// Ephemeral: computed per send, never persisted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Route {
    pub kind: RouteKind,
    /// Registry id of the target agent.
    pub target: String,
}

/// Routing failures surfaced to callers of `route_message`.
#[derive(Debug, thiserror::Error)]
pub enum RouterError {
    #[error("invalid message: {0}")]
    Protocol(#[from] ProtocolError),
    #[error("agent not registered: {0}")]
    AgentUnavailable(String),
}
