//! Per-agent message handling.
//!
//! Every agent implements the [`AgentHandler`] capability trait: four
//! required operations (request, command, query, event) plus overridable
//! defaults for the rest. [`dispatch_message`] is the shared inbound
//! state machine the router drives; there is no base-class hierarchy.

mod context;
mod dispatch;
mod heartbeat;

pub use context::{AgentContext, LocalCallback};
pub use dispatch::dispatch_message;
pub use heartbeat::{start_default_heartbeat, start_heartbeat};

use async_trait::async_trait;
use tracing::{debug, trace};

use crate::protocol::{AgentMessage, ErrorPayload, HandlerError};

/// The capability contract every agent implements.
///
/// Required: [`context`](Self::context) and the four typed operations.
/// The remaining operations default to log-and-drop and may be
/// overridden. Failures returned from any operation are converted by
/// [`dispatch_message`] into a failed response / error pair for the
/// sender; they never reach the router.
#[async_trait]
pub trait AgentHandler: Send + Sync {
    /// The agent's shared context (identity, router handle, lifecycle).
    fn context(&self) -> &AgentContext;

    /// Handle a request expecting a response.
    async fn handle_request(
        &self,
        message: &AgentMessage,
        action: &str,
        params: &serde_json::Value,
    ) -> Result<(), HandlerError>;

    /// Handle an imperative command.
    async fn handle_command(
        &self,
        message: &AgentMessage,
        command: &str,
        args: &serde_json::Value,
    ) -> Result<(), HandlerError>;

    /// Handle an information query.
    async fn handle_query(
        &self,
        message: &AgentMessage,
        query: &str,
        params: &serde_json::Value,
    ) -> Result<(), HandlerError>;

    /// Handle an event.
    async fn handle_event(
        &self,
        message: &AgentMessage,
        name: &str,
        data: &serde_json::Value,
    ) -> Result<(), HandlerError>;

    /// Handle a response to an earlier request.
    async fn handle_response(&self, message: &AgentMessage) -> Result<(), HandlerError> {
        self.handle_unknown(message).await
    }

    /// Handle a notification.
    async fn handle_notification(&self, message: &AgentMessage) -> Result<(), HandlerError> {
        self.handle_unknown(message).await
    }

    /// Handle a heartbeat.
    async fn handle_heartbeat(&self, message: &AgentMessage) -> Result<(), HandlerError> {
        self.handle_unknown(message).await
    }

    /// Handle an inbound error report.
    async fn handle_error(
        &self,
        message: &AgentMessage,
        error: &ErrorPayload,
    ) -> Result<(), HandlerError> {
        debug!(agent = %self.context().id(), id = %message.id, code = ?error.code,
            "unhandled error message");
        Ok(())
    }

    /// Fallback for kinds the agent does not care about: logged, dropped,
    /// no error.
    async fn handle_unknown(&self, message: &AgentMessage) -> Result<(), HandlerError> {
        debug!(agent = %self.context().id(), id = %message.id, kind = ?message.kind(),
            "unhandled message, dropping");
        Ok(())
    }

    /// Pre-dispatch hook.
    async fn before_handle(&self, message: &AgentMessage) -> Result<(), HandlerError> {
        trace!(agent = %self.context().id(), id = %message.id, kind = ?message.kind(),
            "handling message");
        Ok(())
    }

    /// Post-dispatch hook. The default refreshes `last_active`.
    async fn after_handle(&self, _message: &AgentMessage) -> Result<(), HandlerError> {
        self.context().touch();
        Ok(())
    }

    /// Recovery hook invoked after a dispatch failure was reported back
    /// to the sender.
    async fn on_dispatch_error(&self, _message: &AgentMessage, _error: &HandlerError) {}
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::{
        Address, AgentIdentity, AgentKind, AgentStatus, MessageKind, Payload,
    };
    use crate::router::MessageRouter;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    /// Minimal agent recording which operations ran.
    struct ProbeAgent {
        ctx: AgentContext,
        requests: AtomicUsize,
        commands: AtomicUsize,
        queries: AtomicUsize,
        events: AtomicUsize,
        fail_requests: bool,
    }

    impl ProbeAgent {
        fn new(id: &str, router: Arc<MessageRouter>) -> Self {
            Self {
                ctx: AgentContext::new(
                    AgentIdentity::new(id, AgentKind::Executor),
                    router,
                ),
                requests: AtomicUsize::new(0),
                commands: AtomicUsize::new(0),
                queries: AtomicUsize::new(0),
                events: AtomicUsize::new(0),
                fail_requests: false,
            }
        }
    }

    #[async_trait]
    impl AgentHandler for ProbeAgent {
        fn context(&self) -> &AgentContext {
            &self.ctx
        }

        async fn handle_request(
            &self,
            _message: &AgentMessage,
            _action: &str,
            _params: &serde_json::Value,
        ) -> Result<(), HandlerError> {
            self.requests.fetch_add(1, Ordering::SeqCst);
            if self.fail_requests {
                return Err(HandlerError::ExecutionFailed("probe failure".into()));
            }
            Ok(())
        }

        async fn handle_command(
            &self,
            _message: &AgentMessage,
            _command: &str,
            _args: &serde_json::Value,
        ) -> Result<(), HandlerError> {
            self.commands.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }

        async fn handle_query(
            &self,
            _message: &AgentMessage,
            _query: &str,
            _params: &serde_json::Value,
        ) -> Result<(), HandlerError> {
            self.queries.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }

        async fn handle_event(
            &self,
            _message: &AgentMessage,
            _name: &str,
            _data: &serde_json::Value,
        ) -> Result<(), HandlerError> {
            self.events.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    fn inbound(payload: Payload) -> AgentMessage {
        AgentMessage::new(
            AgentIdentity::new("other", AgentKind::Coordinator),
            Address::agent("probe"),
            payload,
        )
    }

    // =========================================================================
    // Dispatch Tests
    // =========================================================================

    #[tokio::test]
    async fn test_dispatch_routes_by_type() {
        let router = MessageRouter::new();
        let agent = ProbeAgent::new("probe", router);

        dispatch_message(&agent, &inbound(Payload::request("a", serde_json::Value::Null))).await;
        dispatch_message(&agent, &inbound(Payload::command("c", serde_json::Value::Null))).await;
        dispatch_message(&agent, &inbound(Payload::query("q", serde_json::Value::Null))).await;
        dispatch_message(&agent, &inbound(Payload::event("e", serde_json::Value::Null))).await;

        assert_eq!(agent.requests.load(Ordering::SeqCst), 1);
        assert_eq!(agent.commands.load(Ordering::SeqCst), 1);
        assert_eq!(agent.queries.load(Ordering::SeqCst), 1);
        assert_eq!(agent.events.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_default_operations_are_noop() {
        let router = MessageRouter::new();
        let agent = ProbeAgent::new("probe", router);

        // None of these are overridden; all must be swallowed quietly.
        dispatch_message(
            &agent,
            &inbound(Payload::response_ok(serde_json::Value::Null)).with_correlation("r"),
        )
        .await;
        dispatch_message(
            &agent,
            &inbound(Payload::notification(
                crate::protocol::NotificationLevel::Info,
                "hi",
            )),
        )
        .await;

        assert_eq!(agent.requests.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_failure_is_not_rethrown() {
        let router = MessageRouter::new();
        let mut agent = ProbeAgent::new("probe", router);
        agent.fail_requests = true;

        // Sender is not registered, so the failure response dead-letters;
        // dispatch itself must still complete without panicking.
        dispatch_message(&agent, &inbound(Payload::request("a", serde_json::Value::Null))).await;
        assert_eq!(agent.requests.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_after_handle_touches_last_active() {
        let router = MessageRouter::new();
        let agent = ProbeAgent::new("probe", router);
        let before = agent.context().identity().metadata.last_active;

        dispatch_message(&agent, &inbound(Payload::event("e", serde_json::Value::Null))).await;

        assert!(agent.context().identity().metadata.last_active >= before);
    }

    // =========================================================================
    // Local Subscriber Tests
    // =========================================================================

    #[tokio::test]
    async fn test_local_subscribers_filtered_by_kind() {
        let router = MessageRouter::new();
        let agent = ProbeAgent::new("probe", router);

        let event_seen = Arc::new(AtomicUsize::new(0));
        let all_seen = Arc::new(AtomicUsize::new(0));

        let seen = Arc::clone(&event_seen);
        agent.context().subscribe_local(
            Some(MessageKind::Event),
            Arc::new(move |_| {
                seen.fetch_add(1, Ordering::SeqCst);
                Ok(())
            }),
        );
        let seen = Arc::clone(&all_seen);
        agent.context().subscribe_local(
            None,
            Arc::new(move |_| {
                seen.fetch_add(1, Ordering::SeqCst);
                Ok(())
            }),
        );

        dispatch_message(&agent, &inbound(Payload::event("e", serde_json::Value::Null))).await;
        dispatch_message(&agent, &inbound(Payload::command("c", serde_json::Value::Null))).await;

        assert_eq!(event_seen.load(Ordering::SeqCst), 1);
        assert_eq!(all_seen.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_subscriber_error_never_propagates() {
        let router = MessageRouter::new();
        let agent = ProbeAgent::new("probe", router);
        agent.context().subscribe_local(
            None,
            Arc::new(|_| Err(HandlerError::Other("subscriber broke".into()))),
        );

        dispatch_message(&agent, &inbound(Payload::event("e", serde_json::Value::Null))).await;
        // Still dispatched; error was logged and swallowed.
        assert_eq!(agent.events.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_clear_subscriptions() {
        let router = MessageRouter::new();
        let agent = ProbeAgent::new("probe", router);
        let seen = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&seen);
        agent.context().subscribe_local(
            None,
            Arc::new(move |_| {
                counter.fetch_add(1, Ordering::SeqCst);
                Ok(())
            }),
        );
        agent.context().clear_subscriptions();

        dispatch_message(&agent, &inbound(Payload::event("e", serde_json::Value::Null))).await;
        assert_eq!(seen.load(Ordering::SeqCst), 0);
    }

    // =========================================================================
    // Lifecycle Tests
    // =========================================================================

    #[tokio::test]
    async fn test_status_lifecycle() {
        let router = MessageRouter::new();
        let agent = ProbeAgent::new("probe", router);
        assert_eq!(agent.context().status(), AgentStatus::Idle);

        agent.context().busy().await;
        assert_eq!(agent.context().status(), AgentStatus::Busy);

        agent.context().idle().await;
        assert_eq!(agent.context().status(), AgentStatus::Idle);
    }

    #[tokio::test]
    async fn test_shutdown_unregisters_and_goes_offline() {
        let router = MessageRouter::new();
        let agent = Arc::new(ProbeAgent::new("probe", Arc::clone(&router)));
        router.register_agent(agent.clone());
        router.subscribe_topic("probe", "status");
        assert!(router.is_registered("probe"));

        agent.context().shutdown().await;

        assert_eq!(agent.context().status(), AgentStatus::Offline);
        assert!(!router.is_registered("probe"));
        assert!(!agent.context().heartbeat_running());
    }
}
