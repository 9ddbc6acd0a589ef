//! Periodic heartbeat broadcasts.

use std::sync::Arc;
use std::time::Duration;

use tracing::debug;

use crate::protocol::{Address, AgentMessage, HeartbeatMetrics, Payload};

use super::AgentContext;

/// Start a heartbeat task owned by the agent's context.
///
/// Broadcasts a heartbeat at every tick until [`AgentContext::shutdown`]
/// (or [`AgentContext::stop_heartbeat`]) aborts it. Heartbeats are
/// ordinary normal-priority messages, queued like everything else and
/// never acknowledged. Queue depth is sampled from the router; the
/// remaining metrics come from `metrics_fn`.
pub fn start_heartbeat<F>(ctx: Arc<AgentContext>, interval: Duration, metrics_fn: F)
where
    F: Fn() -> HeartbeatMetrics + Send + 'static,
{
    let task_ctx = Arc::clone(&ctx);
    let handle = tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        // The immediate first tick would heartbeat at startup; skip it.
        ticker.tick().await;
        loop {
            ticker.tick().await;
            let mut metrics = metrics_fn();
            metrics.queue_depth = task_ctx.router().stats().queue_depth;
            let payload = Payload::Heartbeat {
                status: task_ctx.status(),
                metrics,
                uptime_secs: task_ctx.uptime_secs(),
            };
            let message = AgentMessage::new(task_ctx.identity(), Address::Broadcast, payload);
            if let Err(err) = task_ctx.router().route_message(message).await {
                debug!(agent = %task_ctx.id(), %err, "heartbeat not routed");
            }
        }
    });
    ctx.set_heartbeat(handle);
}

/// Start a heartbeat using the router's configured default interval and
/// zeroed cpu/memory metrics.
pub fn start_default_heartbeat(ctx: Arc<AgentContext>) {
    let secs = ctx.router().config().default_heartbeat_secs;
    start_heartbeat(ctx, Duration::from_secs(secs), HeartbeatMetrics::default);
}
