//! Error taxonomy for the messaging protocol.

use serde::{Deserialize, Serialize};

/// Wire-level error codes carried in `Error` payloads.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    // Protocol failures
    ProtocolInvalidMessage,
    ProtocolUnsupportedVersion,
    ProtocolRoutingFailed,
    // Agent failures
    AgentUnavailable,
    AgentTimeout,
    AgentOverloaded,
    // Execution failures
    ExecFailed,
    ExecPermissionDenied,
    ExecResourceExhausted,
}

/// Structured error carried across the wire.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorPayload {
    pub code: ErrorCode,
    pub message: String,
    /// Arbitrary context for diagnostics (request id, action name, ...).
    #[serde(default, skip_serializing_if = "serde_json::Value::is_null")]
    pub context: serde_json::Value,
    pub recoverable: bool,
}

impl ErrorPayload {
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            context: serde_json::Value::Null,
            recoverable: false,
        }
    }

    pub fn with_context(mut self, context: serde_json::Value) -> Self {
        self.context = context;
        self
    }

    pub fn recoverable(mut self) -> Self {
        self.recoverable = true;
        self
    }
}

/// Envelope validation failures.
///
/// Raised synchronously by `route_message` before anything is queued.
#[derive(Debug, Clone, thiserror::Error)]
pub enum ProtocolError {
    #[error("missing required field: {0}")]
    MissingField(&'static str),
    #[error("unsupported protocol version: {0}")]
    UnsupportedVersion(String),
    #[error("message {id} expired: age {age_ms}ms exceeds ttl {ttl_ms}ms")]
    Expired { id: String, age_ms: i64, ttl_ms: i64 },
    #[error("response {0} is missing a correlation id")]
    MissingCorrelation(String),
}

impl ProtocolError {
    /// Wire code for this validation failure.
    pub fn code(&self) -> ErrorCode {
        match self {
            Self::UnsupportedVersion(_) => ErrorCode::ProtocolUnsupportedVersion,
            _ => ErrorCode::ProtocolInvalidMessage,
        }
    }
}

/// Failures inside a handler's message-processing operations.
#[derive(Debug, thiserror::Error)]
pub enum HandlerError {
    #[error("execution failed: {0}")]
    ExecutionFailed(String),
    #[error("permission denied: {0}")]
    PermissionDenied(String),
    #[error("resource exhausted: {0}")]
    ResourceExhausted(String),
    #[error("agent overloaded: {0}")]
    Overloaded(String),
    #[error("timed out: {0}")]
    Timeout(String),
    #[error("{0}")]
    Other(String),
}

impl HandlerError {
    /// Wire code for this failure.
    pub fn code(&self) -> ErrorCode {
        match self {
            Self::ExecutionFailed(_) | Self::Other(_) => ErrorCode::ExecFailed,
            Self::PermissionDenied(_) => ErrorCode::ExecPermissionDenied,
            Self::ResourceExhausted(_) => ErrorCode::ExecResourceExhausted,
            Self::Overloaded(_) => ErrorCode::AgentOverloaded,
            Self::Timeout(_) => ErrorCode::AgentTimeout,
        }
    }

    /// Whether the sender may reasonably retry.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, Self::Overloaded(_) | Self::Timeout(_))
    }
}

impl From<&HandlerError> for ErrorPayload {
    fn from(err: &HandlerError) -> Self {
        let payload = ErrorPayload::new(err.code(), err.to_string());
        if err.is_recoverable() {
            payload.recoverable()
        } else {
            payload
        }
    }
}
