//! Shared inbound dispatch for every handler.

use tracing::{debug, warn};

use crate::protocol::{AgentMessage, ErrorPayload, HandlerError, Payload};

use super::AgentHandler;

/// Single inbound entry point for a handler.
///
/// Runs the handler's hooks and the type dispatch, then notifies local
/// subscribers. Failures anywhere in that chain are caught here: if the
/// inbound message was a request, exactly one failed response plus one
/// error message go back to the sender. Nothing is ever re-thrown to the
/// router.
pub async fn dispatch_message(handler: &dyn AgentHandler, message: &AgentMessage) {
    if let Err(err) = run(handler, message).await {
        report_failure(handler, message, &err).await;
        handler.on_dispatch_error(message, &err).await;
    }
}

async fn run(handler: &dyn AgentHandler, message: &AgentMessage) -> Result<(), HandlerError> {
    handler.before_handle(message).await?;

    match &message.payload {
        Payload::Request { action, params } => {
            handler.handle_request(message, action, params).await?
        }
        Payload::Command { command, args } => {
            handler.handle_command(message, command, args).await?
        }
        Payload::Query { query, params } => handler.handle_query(message, query, params).await?,
        Payload::Event { name, data } => handler.handle_event(message, name, data).await?,
        Payload::Response { .. } => handler.handle_response(message).await?,
        Payload::Notification { .. } => handler.handle_notification(message).await?,
        Payload::Heartbeat { .. } => handler.handle_heartbeat(message).await?,
        Payload::Error(error) => handler.handle_error(message, error).await?,
    }

    handler.after_handle(message).await?;
    handler.context().notify_local(message);
    Ok(())
}

/// Convert a dispatch failure into a failed response (for requests) and
/// an error message back to the original sender.
async fn report_failure(handler: &dyn AgentHandler, message: &AgentMessage, err: &HandlerError) {
    let ctx = handler.context();
    warn!(agent = %ctx.id(), id = %message.id, %err, "message handling failed");

    if matches!(message.payload, Payload::Request { .. }) {
        if let Err(send_err) = ctx
            .send_response(message, false, serde_json::Value::Null, Some(err.to_string()))
            .await
        {
            debug!(agent = %ctx.id(), %send_err, "failure response not routed");
        }
    }

    let payload = ErrorPayload::from(err)
        .with_context(serde_json::json!({ "message_id": message.id }));
    let to = crate::protocol::Address::agent(message.from.id.clone());
    if let Err(send_err) = ctx.send_error(to, payload).await {
        debug!(agent = %ctx.id(), %send_err, "error notification not routed");
    }
}
