//! Message payload variants.
//!
//! One payload shape per message type, so dispatch is an exhaustive
//! `match` instead of a runtime switch on strings.

use serde::{Deserialize, Serialize};

use super::error::ErrorPayload;
use super::identity::AgentStatus;

/// Severity for notifications.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NotificationLevel {
    #[default]
    Info,
    Warning,
    Error,
}

/// Runtime metrics carried by heartbeats.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct HeartbeatMetrics {
    pub cpu: f64,
    pub memory: f64,
    pub queue_depth: usize,
    pub response_time_ms: u64,
}

/// Type-specific payload of a message.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Payload {
    /// Ask an agent to perform an action; expects a response.
    Request {
        action: String,
        #[serde(default)]
        params: serde_json::Value,
    },
    /// Outcome of a request, correlated by the request id.
    Response {
        success: bool,
        #[serde(default, skip_serializing_if = "serde_json::Value::is_null")]
        result: serde_json::Value,
        #[serde(skip_serializing_if = "Option::is_none")]
        error: Option<String>,
        /// Milliseconds between the request's timestamp and the response.
        #[serde(skip_serializing_if = "Option::is_none")]
        duration_ms: Option<i64>,
    },
    /// Something happened; no reply expected.
    Event {
        name: String,
        #[serde(default)]
        data: serde_json::Value,
    },
    /// Imperative instruction; no reply expected.
    Command {
        command: String,
        #[serde(default)]
        args: serde_json::Value,
    },
    /// Ask for information; expects a response.
    Query {
        query: String,
        #[serde(default)]
        params: serde_json::Value,
    },
    /// Informational one-way message.
    Notification {
        #[serde(default)]
        level: NotificationLevel,
        text: String,
        #[serde(default, skip_serializing_if = "serde_json::Value::is_null")]
        data: serde_json::Value,
    },
    /// Periodic liveness broadcast; never acknowledged.
    Heartbeat {
        status: AgentStatus,
        metrics: HeartbeatMetrics,
        uptime_secs: u64,
    },
    /// Structured failure report.
    Error(ErrorPayload),
}

/// Fieldless mirror of [`Payload`] for filters and stats.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageKind {
    Request,
    Response,
    Event,
    Command,
    Query,
    Notification,
    Heartbeat,
    Error,
}

impl Payload {
    /// Create a request payload.
    pub fn request(action: impl Into<String>, params: serde_json::Value) -> Self {
        Self::Request {
            action: action.into(),
            params,
        }
    }

    /// Create a successful response payload.
    pub fn response_ok(result: serde_json::Value) -> Self {
        Self::Response {
            success: true,
            result,
            error: None,
            duration_ms: None,
        }
    }

    /// Create a failed response payload.
    pub fn response_err(error: impl Into<String>) -> Self {
        Self::Response {
            success: false,
            result: serde_json::Value::Null,
            error: Some(error.into()),
            duration_ms: None,
        }
    }

    /// Create an event payload.
    pub fn event(name: impl Into<String>, data: serde_json::Value) -> Self {
        Self::Event {
            name: name.into(),
            data,
        }
    }

    /// Create a command payload.
    pub fn command(command: impl Into<String>, args: serde_json::Value) -> Self {
        Self::Command {
            command: command.into(),
            args,
        }
    }

    /// Create a query payload.
    pub fn query(query: impl Into<String>, params: serde_json::Value) -> Self {
        Self::Query {
            query: query.into(),
            params,
        }
    }

    /// Create a notification payload.
    pub fn notification(level: NotificationLevel, text: impl Into<String>) -> Self {
        Self::Notification {
            level,
            text: text.into(),
            data: serde_json::Value::Null,
        }
    }

    /// The kind tag of this payload.
    pub fn kind(&self) -> MessageKind {
        match self {
            Self::Request { .. } => MessageKind::Request,
            Self::Response { .. } => MessageKind::Response,
            Self::Event { .. } => MessageKind::Event,
            Self::Command { .. } => MessageKind::Command,
            Self::Query { .. } => MessageKind::Query,
            Self::Notification { .. } => MessageKind::Notification,
            Self::Heartbeat { .. } => MessageKind::Heartbeat,
            Self::Error(_) => MessageKind::Error,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::error::ErrorCode;

    #[test]
    fn test_payload_kind_mapping() {
        assert_eq!(
            Payload::request("ping", serde_json::Value::Null).kind(),
            MessageKind::Request
        );
        assert_eq!(
            Payload::response_ok(serde_json::Value::Null).kind(),
            MessageKind::Response
        );
        assert_eq!(
            Payload::event("e", serde_json::Value::Null).kind(),
            MessageKind::Event
        );
        assert_eq!(
            Payload::Error(ErrorPayload::new(ErrorCode::ExecFailed, "x")).kind(),
            MessageKind::Error
        );
    }

    #[test]
    fn test_payload_tagged_serde() {
        let payload = Payload::request("execute", serde_json::json!({"cmd": "ls"}));
        let json = serde_json::to_value(&payload).unwrap();
        assert_eq!(json["type"], "request");
        assert_eq!(json["action"], "execute");
        assert_eq!(json["params"]["cmd"], "ls");

        let back: Payload = serde_json::from_value(json).unwrap();
        assert_eq!(back.kind(), MessageKind::Request);
    }

    #[test]
    fn test_response_err_shape() {
        let payload = Payload::response_err("no such action");
        if let Payload::Response {
            success,
            error,
            duration_ms,
            ..
        } = &payload
        {
            assert!(!success);
            assert_eq!(error.as_deref(), Some("no such action"));
            assert!(duration_ms.is_none());
        } else {
            panic!("expected Response payload");
        }
    }

    #[test]
    fn test_heartbeat_serde() {
        let payload = Payload::Heartbeat {
            status: AgentStatus::Busy,
            metrics: HeartbeatMetrics {
                cpu: 0.5,
                memory: 0.25,
                queue_depth: 3,
                response_time_ms: 12,
            },
            uptime_secs: 90,
        };
        let json = serde_json::to_value(&payload).unwrap();
        assert_eq!(json["type"], "heartbeat");
        assert_eq!(json["status"], "busy");
        assert_eq!(json["metrics"]["queue_depth"], 3);
    }
}
