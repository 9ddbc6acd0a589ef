//! Corral - typed message routing for multi-agent systems
//!
//! The binary is a small demonstration: it wires up a router, a couple
//! of agents, and runs a request/response exchange plus a topic
//! broadcast, printing router stats at the end.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use clap::Parser;
use tokio::sync::mpsc;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use corral::{
    start_heartbeat, Address, AgentContext, AgentHandler, AgentIdentity, AgentKind, AgentMessage,
    HandlerError, HeartbeatMetrics, MessageRouter, Payload,
};

/// Corral - message routing playground for agent swarms
#[derive(Parser, Debug)]
#[command(name = "corral")]
#[command(version, about, long_about = None)]
struct Args {
    /// Number of worker agents to spawn
    #[arg(short, long, default_value_t = 2)]
    workers: usize,

    /// Broadcast coordinator heartbeats at this interval
    #[arg(long)]
    heartbeat_secs: Option<u64>,

    /// Enable debug logging (equivalent to RUST_LOG=debug)
    #[arg(short = 'd', long)]
    debug: bool,

    /// Enable verbose logging (equivalent to RUST_LOG=trace)
    #[arg(short = 'v', long)]
    verbose: bool,
}

/// Worker that answers `ping` requests and watches the demo topic.
struct Worker {
    ctx: AgentContext,
}

#[async_trait]
impl AgentHandler for Worker {
    fn context(&self) -> &AgentContext {
        &self.ctx
    }

    async fn handle_request(
        &self,
        message: &AgentMessage,
        action: &str,
        _params: &serde_json::Value,
    ) -> Result<(), HandlerError> {
        match action {
            "ping" => self
                .ctx
                .send_response(message, true, serde_json::json!({"reply": "pong"}), None)
                .await
                .map_err(|e| HandlerError::Other(e.to_string())),
            other => Err(HandlerError::ExecutionFailed(format!(
                "unknown action: {other}"
            ))),
        }
    }

    async fn handle_command(
        &self,
        _message: &AgentMessage,
        command: &str,
        _args: &serde_json::Value,
    ) -> Result<(), HandlerError> {
        info!(agent = %self.ctx.id(), %command, "command received");
        Ok(())
    }

    async fn handle_query(
        &self,
        _message: &AgentMessage,
        _query: &str,
        _params: &serde_json::Value,
    ) -> Result<(), HandlerError> {
        Ok(())
    }

    async fn handle_event(
        &self,
        _message: &AgentMessage,
        name: &str,
        _data: &serde_json::Value,
    ) -> Result<(), HandlerError> {
        info!(agent = %self.ctx.id(), event = %name, "event received");
        Ok(())
    }
}

/// Coordinator that forwards worker responses onto a channel.
struct Coordinator {
    ctx: AgentContext,
    responses: mpsc::UnboundedSender<AgentMessage>,
}

#[async_trait]
impl AgentHandler for Coordinator {
    fn context(&self) -> &AgentContext {
        &self.ctx
    }

    async fn handle_request(
        &self,
        _message: &AgentMessage,
        _action: &str,
        _params: &serde_json::Value,
    ) -> Result<(), HandlerError> {
        Ok(())
    }

    async fn handle_command(
        &self,
        _message: &AgentMessage,
        _command: &str,
        _args: &serde_json::Value,
    ) -> Result<(), HandlerError> {
        Ok(())
    }

    async fn handle_query(
        &self,
        _message: &AgentMessage,
        _query: &str,
        _params: &serde_json::Value,
    ) -> Result<(), HandlerError> {
        Ok(())
    }

    async fn handle_event(
        &self,
        _message: &AgentMessage,
        _name: &str,
        _data: &serde_json::Value,
    ) -> Result<(), HandlerError> {
        Ok(())
    }

    async fn handle_response(&self, message: &AgentMessage) -> Result<(), HandlerError> {
        let _ = self.responses.send(message.clone());
        Ok(())
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let default_filter = if args.verbose {
        "trace"
    } else if args.debug {
        "debug"
    } else {
        "info"
    };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));
    tracing_subscriber::registry()
        .with(filter)
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(true)
                .with_thread_ids(false)
                .with_writer(std::io::stderr),
        )
        .init();

    let router = MessageRouter::new();

    for n in 0..args.workers {
        let id = format!("worker-{n}");
        let identity = AgentIdentity::new(&id, AgentKind::Executor).with_capability("ping");
        let worker = Arc::new(Worker {
            ctx: AgentContext::new(identity, Arc::clone(&router)),
        });
        router.register_agent(worker);
        router.subscribe_topic(&id, "demo");
    }

    let (tx, mut rx) = mpsc::unbounded_channel();
    let coordinator = Arc::new(Coordinator {
        ctx: AgentContext::new(
            AgentIdentity::new("coordinator", AgentKind::Coordinator),
            Arc::clone(&router),
        ),
        responses: tx,
    });
    router.register_agent(coordinator.clone());

    let heartbeat_ctx = args.heartbeat_secs.map(|secs| {
        let ctx = Arc::new(AgentContext::new(
            coordinator.context().identity(),
            Arc::clone(&router),
        ));
        start_heartbeat(
            Arc::clone(&ctx),
            Duration::from_secs(secs),
            HeartbeatMetrics::default,
        );
        ctx
    });

    // Ping every worker and wait for the responses.
    for target in router.find_agents_by_capability("ping") {
        let message = AgentMessage::new(
            coordinator.context().identity(),
            Address::agent(target.id.clone()),
            Payload::request("ping", serde_json::Value::Null),
        );
        info!(to = %target.id, "sending ping");
        router.route_message(message).await?;
    }
    for _ in 0..args.workers {
        match tokio::time::timeout(Duration::from_secs(5), rx.recv()).await {
            Ok(Some(response)) => {
                if let Payload::Response { duration_ms, .. } = &response.payload {
                    info!(from = %response.from.id, ?duration_ms, "pong");
                }
            }
            _ => anyhow::bail!("timed out waiting for ping responses"),
        }
    }

    // Fan an event out over the demo topic.
    coordinator
        .context()
        .send_event(
            "demo.shutdown",
            serde_json::json!({"reason": "demo complete"}),
            Address::topic("demo"),
        )
        .await?;
    tokio::time::sleep(Duration::from_millis(100)).await;

    if let Some(ctx) = heartbeat_ctx {
        ctx.stop_heartbeat();
    }

    let stats = router.stats();
    println!(
        "agents={} topics={} queue_depth={} filters={}",
        stats.registered_agents, stats.topics, stats.queue_depth, stats.active_filters
    );
    Ok(())
}
