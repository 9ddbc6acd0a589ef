//! Corral Library
//!
//! Typed message routing for multi-agent systems: a message protocol,
//! a priority-aware delivery queue, a central [`MessageRouter`], and the
//! [`AgentHandler`] contract agents implement.
//!
//! ## Main Components
//!
//! - [`protocol`] - Message envelope, payload taxonomy, identities, errors
//! - [`queue`] - Priority queue backing the router's pending messages
//! - [`router`] - Central registry, route computation, retry/backoff
//! - [`handler`] - AgentHandler trait, per-agent context, heartbeats
//!
//! ## Quick Start
//!
//! ```ignore
//! use corral::{AgentIdentity, AgentKind, Address, MessageRouter, Payload};
//!
//! let router = MessageRouter::new();
//! router.register_agent(my_agent);
//! let from = AgentIdentity::new("coordinator", AgentKind::Coordinator);
//! let msg = corral::AgentMessage::new(from, Address::agent("worker"),
//!     Payload::request("build", serde_json::json!({"target": "release"})));
//! router.route_message(msg).await?;
//! ```

pub mod handler;
pub mod protocol;
pub mod queue;
pub mod router;

// Re-export commonly used types
pub use handler::{
    dispatch_message, start_default_heartbeat, start_heartbeat, AgentContext, AgentHandler,
    LocalCallback,
};
pub use protocol::{
    Address, AgentIdentity, AgentKind, AgentMessage, AgentMetadata, AgentStatus, ErrorCode,
    ErrorPayload, HandlerError, HeartbeatMetrics, MessageFilter, MessageKind, NotificationLevel,
    Payload, Priority, ProtocolError, PROTOCOL_VERSION,
};
pub use queue::{IndexedPriorityQueue, PriorityQueue};
pub use router::{MessageRouter, Route, RouteKind, RouterConfig, RouterError, RouterStats};
