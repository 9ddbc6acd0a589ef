//! Per-agent context: identity, router handle, send helpers.

use std::sync::{Arc, Mutex, RwLock};
use std::time::Instant;

use chrono::Utc;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::protocol::{
    Address, AgentIdentity, AgentMessage, AgentStatus, ErrorPayload, HandlerError, MessageKind,
    NotificationLevel, Payload, Priority,
};
use crate::router::{MessageRouter, RouterError};

/// Callback invoked for messages an agent observed locally.
pub type LocalCallback = Arc<dyn Fn(&AgentMessage) -> Result<(), HandlerError> + Send + Sync>;

struct LocalSubscriber {
    /// `None` subscribes to every kind.
    kind: Option<MessageKind>,
    callback: LocalCallback,
}

/// State shared by every handler implementation.
///
/// Owns the agent's identity (only this agent mutates its status and
/// `last_active`), holds the router handle all `send_*` helpers delegate
/// to, and tracks the heartbeat task so shutdown can cancel it
/// deterministically.
pub struct AgentContext {
    identity: RwLock<AgentIdentity>,
    router: Arc<MessageRouter>,
    subscribers: RwLock<Vec<LocalSubscriber>>,
    heartbeat: Mutex<Option<JoinHandle<()>>>,
    started: Instant,
}

impl AgentContext {
    pub fn new(identity: AgentIdentity, router: Arc<MessageRouter>) -> Self {
        Self {
            identity: RwLock::new(identity),
            router,
            subscribers: RwLock::new(Vec::new()),
            heartbeat: Mutex::new(None),
            started: Instant::now(),
        }
    }

    /// The agent's id.
    pub fn id(&self) -> String {
        self.identity_read().id.clone()
    }

    /// Snapshot of the agent's identity.
    pub fn identity(&self) -> AgentIdentity {
        self.identity_read().clone()
    }

    pub fn status(&self) -> AgentStatus {
        self.identity_read().status
    }

    pub fn router(&self) -> &Arc<MessageRouter> {
        &self.router
    }

    /// Seconds since this context was created.
    pub fn uptime_secs(&self) -> u64 {
        self.started.elapsed().as_secs()
    }

    /// Refresh the identity's last-active timestamp.
    pub fn touch(&self) {
        self.identity_write().touch();
    }

    // =========================================================================
    // Send helpers. Each builds a fully-formed envelope and delegates to
    // the router.
    // =========================================================================

    /// Send a response correlated to `request`, with `duration_ms`
    /// measured from the request's timestamp.
    pub async fn send_response(
        &self,
        request: &AgentMessage,
        success: bool,
        result: serde_json::Value,
        error: Option<String>,
    ) -> Result<(), RouterError> {
        let duration_ms = (Utc::now() - request.timestamp).num_milliseconds().max(0);
        let payload = Payload::Response {
            success,
            result,
            error,
            duration_ms: Some(duration_ms),
        };
        let message = AgentMessage::new(
            self.identity(),
            Address::agent(request.from.id.clone()),
            payload,
        )
        .with_correlation(request.id.clone());
        self.router.route_message(message).await
    }

    /// Emit an event.
    pub async fn send_event(
        &self,
        name: impl Into<String>,
        data: serde_json::Value,
        to: Address,
    ) -> Result<(), RouterError> {
        let message = AgentMessage::new(self.identity(), to, Payload::event(name, data));
        self.router.route_message(message).await
    }

    /// Emit a notification.
    pub async fn send_notification(
        &self,
        level: NotificationLevel,
        text: impl Into<String>,
        to: Address,
    ) -> Result<(), RouterError> {
        let message = AgentMessage::new(self.identity(), to, Payload::notification(level, text));
        self.router.route_message(message).await
    }

    /// Emit a structured error at high priority.
    pub async fn send_error(&self, to: Address, error: ErrorPayload) -> Result<(), RouterError> {
        let message = AgentMessage::new(self.identity(), to, Payload::Error(error))
            .with_priority(Priority::High);
        self.router.route_message(message).await
    }

    // =========================================================================
    // Status lifecycle
    // =========================================================================

    /// Set the agent's status and broadcast the change as an event so
    /// coordinators can observe it. Transitions are not validated.
    pub async fn set_status(&self, status: AgentStatus) {
        let previous = {
            let mut identity = self.identity_write();
            let previous = identity.status;
            identity.status = status;
            previous
        };
        if previous == status {
            return;
        }
        let data = serde_json::json!({
            "agent": self.id(),
            "from": previous,
            "to": status,
        });
        if let Err(err) = self.send_event("agent.status", data, Address::Broadcast).await {
            debug!(agent = %self.id(), %err, "status event not routed");
        }
    }

    /// Mark the agent busy while it works.
    pub async fn busy(&self) {
        self.set_status(AgentStatus::Busy).await;
    }

    /// Mark the agent idle again.
    pub async fn idle(&self) {
        self.set_status(AgentStatus::Idle).await;
    }

    /// Go offline: cancel the heartbeat, broadcast the status change,
    /// unregister from the router, clear local subscriptions. In-flight
    /// queued messages addressed here will fail delivery and follow the
    /// router's retry/drop path.
    pub async fn shutdown(&self) {
        self.stop_heartbeat();
        self.set_status(AgentStatus::Offline).await;
        self.router.unregister_agent(&self.id());
        self.clear_subscriptions();
        debug!(agent = %self.id(), "agent shut down");
    }

    // =========================================================================
    // Local subscribers
    // =========================================================================

    /// Register a local observer, optionally filtered by message kind.
    pub fn subscribe_local(&self, kind: Option<MessageKind>, callback: LocalCallback) {
        self.subscribers_write().push(LocalSubscriber { kind, callback });
    }

    pub fn clear_subscriptions(&self) {
        self.subscribers_write().clear();
    }

    /// Notify local subscribers matching the message's kind.
    /// Fire-and-forget: subscriber errors are logged, never propagated.
    pub fn notify_local(&self, message: &AgentMessage) {
        let callbacks: Vec<LocalCallback> = self
            .subscribers_read()
            .iter()
            .filter(|s| s.kind.is_none() || s.kind == Some(message.kind()))
            .map(|s| Arc::clone(&s.callback))
            .collect();
        for callback in callbacks {
            if let Err(err) = callback(message) {
                warn!(agent = %self.id(), %err, "local subscriber failed");
            }
        }
    }

    // =========================================================================
    // Heartbeat task ownership
    // =========================================================================

    /// Take ownership of the heartbeat task, aborting any previous one.
    pub(crate) fn set_heartbeat(&self, handle: JoinHandle<()>) {
        if let Some(old) = self.heartbeat_lock().replace(handle) {
            old.abort();
        }
    }

    /// Cancel the heartbeat task, if running.
    pub fn stop_heartbeat(&self) {
        if let Some(handle) = self.heartbeat_lock().take() {
            handle.abort();
        }
    }

    /// Whether a heartbeat task is currently owned.
    pub fn heartbeat_running(&self) -> bool {
        self.heartbeat_lock().is_some()
    }

    fn identity_read(&self) -> std::sync::RwLockReadGuard<'_, AgentIdentity> {
        self.identity.read().unwrap_or_else(|e| e.into_inner())
    }

    fn identity_write(&self) -> std::sync::RwLockWriteGuard<'_, AgentIdentity> {
        self.identity.write().unwrap_or_else(|e| e.into_inner())
    }

    fn subscribers_read(&self) -> std::sync::RwLockReadGuard<'_, Vec<LocalSubscriber>> {
        self.subscribers.read().unwrap_or_else(|e| e.into_inner())
    }

    fn subscribers_write(&self) -> std::sync::RwLockWriteGuard<'_, Vec<LocalSubscriber>> {
        self.subscribers.write().unwrap_or_else(|e| e.into_inner())
    }

    fn heartbeat_lock(&self) -> std::sync::MutexGuard<'_, Option<JoinHandle<()>>> {
        self.heartbeat.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl Drop for AgentContext {
    fn drop(&mut self) {
        // The heartbeat task must not outlive its agent.
        if let Some(handle) = self.heartbeat_lock().take() {
            handle.abort();
        }
    }
}
