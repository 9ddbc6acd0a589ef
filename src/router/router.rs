//! The router itself: registry, route computation, queue drain.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering as AtomicOrdering};
use std::sync::{Arc, Mutex, RwLock, Weak};

use chrono::Utc;
use futures::future::join_all;
use tracing::{debug, warn};

use crate::handler::{dispatch_message, AgentHandler};
use crate::protocol::{AgentIdentity, AgentKind, AgentMessage, Address, MessageFilter, Priority};
use crate::queue::{priority_comparator, IndexedPriorityQueue};

use super::retry::QueuedMessage;
use super::{Route, RouteKind, RouterConfig, RouterError};

/// Observability snapshot. No side effects.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RouterStats {
    pub registered_agents: usize,
    pub topics: usize,
    pub queue_depth: usize,
    pub active_filters: usize,
}

/// The central coordinator for agent messaging.
///
/// Construct once at process start ([`MessageRouter::new`] hands back an
/// `Arc`) and pass the handle to every agent. There is no global
/// singleton.
pub struct MessageRouter {
    registry: RwLock<HashMap<String, Arc<dyn AgentHandler>>>,
    topics: RwLock<HashMap<String, HashSet<String>>>,
    filters: RwLock<HashMap<String, MessageFilter>>,
    pending: Mutex<IndexedPriorityQueue<QueuedMessage>>,
    /// Single-flight guard: concurrent drains never overlap.
    draining: AtomicBool,
    config: RouterConfig,
    weak: Weak<MessageRouter>,
}

impl MessageRouter {
    /// Create a router with default configuration.
    pub fn new() -> Arc<Self> {
        Self::with_config(RouterConfig::default())
    }

    /// Create a router with the given configuration.
    pub fn with_config(config: RouterConfig) -> Arc<Self> {
        Arc::new_cyclic(|weak| Self {
            registry: RwLock::new(HashMap::new()),
            topics: RwLock::new(HashMap::new()),
            filters: RwLock::new(HashMap::new()),
            pending: Mutex::new(IndexedPriorityQueue::new(
                priority_comparator(|item: &QueuedMessage| item.message.priority),
                Arc::new(|item: &QueuedMessage| item.message.id.clone()),
            )),
            draining: AtomicBool::new(false),
            config,
            weak: weak.clone(),
        })
    }

    pub fn config(&self) -> &RouterConfig {
        &self.config
    }

    // =========================================================================
    // Registry
    // =========================================================================

    /// Register a handler under its identity's id.
    ///
    /// Idempotent overwrite: registering an id twice replaces the first
    /// handler, last registration wins.
    pub fn register_agent(&self, handler: Arc<dyn AgentHandler>) {
        let id = handler.context().id();
        debug!(agent = %id, "registering agent");
        self.registry_write().insert(id, handler);
    }

    /// Remove an agent from the registry, every topic's subscriber set,
    /// and the filter table. No-op when absent.
    pub fn unregister_agent(&self, id: &str) {
        let removed = self.registry_write().remove(id).is_some();
        for subscribers in self.topics_write().values_mut() {
            subscribers.remove(id);
        }
        self.filters_write().remove(id);
        if removed {
            debug!(agent = %id, "unregistered agent");
        }
    }

    /// Whether an agent id is currently registered.
    pub fn is_registered(&self, id: &str) -> bool {
        self.registry_read().contains_key(id)
    }

    /// Identities of agents advertising the given capability.
    pub fn find_agents_by_capability(&self, cap: &str) -> Vec<AgentIdentity> {
        self.identity_snapshot()
            .into_iter()
            .filter(|identity| identity.has_capability(cap))
            .collect()
    }

    /// Identities of agents of the given kind.
    pub fn find_agents_by_kind(&self, kind: AgentKind) -> Vec<AgentIdentity> {
        self.identity_snapshot()
            .into_iter()
            .filter(|identity| identity.kind == kind)
            .collect()
    }

    // =========================================================================
    // Topics & filters
    // =========================================================================

    /// Add an agent to a topic's subscriber set.
    pub fn subscribe_topic(&self, agent_id: &str, topic: &str) {
        self.topics_write()
            .entry(topic.to_string())
            .or_default()
            .insert(agent_id.to_string());
    }

    /// Remove an agent from a topic's subscriber set.
    pub fn unsubscribe_topic(&self, agent_id: &str, topic: &str) {
        if let Some(subscribers) = self.topics_write().get_mut(topic) {
            subscribers.remove(agent_id);
        }
    }

    /// Replace the stored filter for an agent wholesale.
    pub fn set_filter(&self, agent_id: &str, filter: MessageFilter) {
        self.filters_write().insert(agent_id.to_string(), filter);
    }

    /// Drop the stored filter for an agent.
    pub fn clear_filter(&self, agent_id: &str) {
        self.filters_write().remove(agent_id);
    }

    /// Counts for observability.
    pub fn stats(&self) -> RouterStats {
        RouterStats {
            registered_agents: self.registry_read().len(),
            topics: self.topics_read().len(),
            queue_depth: self.pending_lock().len(),
            active_filters: self.filters_read().len(),
        }
    }

    // =========================================================================
    // Sending
    // =========================================================================

    /// The only send entry point.
    ///
    /// Validation failures raise synchronously and are never queued.
    /// Messages matching no route are logged and dropped (dead-letter
    /// policy). Critical-priority messages bypass the queue and are
    /// delivered immediately to all routes, each independently fallible;
    /// everything else is queued and drained in priority order.
    pub async fn route_message(&self, message: AgentMessage) -> Result<(), RouterError> {
        message.validate(Utc::now())?;

        let routes = self.compute_routes(&message);
        if routes.is_empty() {
            debug!(id = %message.id, to = %message.to, "no route for message, dropping");
            return Ok(());
        }

        if message.priority == Priority::Critical {
            let outcomes = join_all(routes.iter().map(|r| self.deliver(r, &message))).await;
            for (route, outcome) in routes.iter().zip(outcomes) {
                if let Err(err) = outcome {
                    warn!(id = %message.id, target = %route.target, %err,
                        "critical delivery failed");
                }
            }
            return Ok(());
        }

        self.enqueue(QueuedMessage::new(message, routes));
        Ok(())
    }

    /// Compute delivery routes for a validated message.
    ///
    /// Broadcast fans out to every registered agent except the sender;
    /// topic delivery fans out to the topic's current subscriber set.
    /// Both consult the target's filter. A direct address resolves to the
    /// named agent if registered.
    fn compute_routes(&self, message: &AgentMessage) -> Vec<Route> {
        match &message.to {
            Address::Broadcast => {
                let targets: Vec<String> = self.registry_read().keys().cloned().collect();
                targets
                    .into_iter()
                    .filter(|id| id != &message.from.id)
                    .filter(|id| self.filter_allows(id, message))
                    .map(|target| Route {
                        kind: RouteKind::Broadcast,
                        target,
                    })
                    .collect()
            }
            Address::Topic(name) => {
                let subscribers: Vec<String> = self
                    .topics_read()
                    .get(name)
                    .map(|set| set.iter().cloned().collect())
                    .unwrap_or_default();
                subscribers
                    .into_iter()
                    .filter(|id| self.filter_allows(id, message))
                    .map(|target| Route {
                        kind: RouteKind::Topic,
                        target,
                    })
                    .collect()
            }
            Address::Agent(id) => {
                if self.registry_read().contains_key(id) {
                    vec![Route {
                        kind: RouteKind::Direct,
                        target: id.clone(),
                    }]
                } else {
                    Vec::new()
                }
            }
        }
    }

    fn filter_allows(&self, agent_id: &str, message: &AgentMessage) -> bool {
        self.filters_read()
            .get(agent_id)
            .map_or(true, |filter| filter.matches(message))
    }

    /// Deliver one route. Fails when the target vanished from the
    /// registry; handler-internal failures never propagate this far.
    async fn deliver(&self, route: &Route, message: &AgentMessage) -> Result<(), RouterError> {
        let handler = self
            .registry_read()
            .get(&route.target)
            .cloned()
            .ok_or_else(|| RouterError::AgentUnavailable(route.target.clone()))?;
        dispatch_message(handler.as_ref(), message).await;
        Ok(())
    }

    // =========================================================================
    // Queue drain
    // =========================================================================

    fn enqueue(&self, item: QueuedMessage) {
        self.pending_lock().enqueue(item);
        self.ensure_drain();
    }

    /// Start the drain task unless one is already in flight.
    fn ensure_drain(&self) {
        if self
            .draining
            .compare_exchange(
                false,
                true,
                AtomicOrdering::SeqCst,
                AtomicOrdering::SeqCst,
            )
            .is_err()
        {
            return;
        }
        match self.weak.upgrade() {
            Some(router) => {
                tokio::spawn(async move { router.drain_queue().await });
            }
            None => self.draining.store(false, AtomicOrdering::SeqCst),
        }
    }

    /// Single-flight drain: messages are dequeued one at a time in
    /// priority order; the deliveries for one item's routes run
    /// concurrently.
    async fn drain_queue(self: Arc<Self>) {
        loop {
            let item = self.pending_lock().dequeue();
            match item {
                Some(item) => self.process_queued(item).await,
                None => break,
            }
        }
        self.draining.store(false, AtomicOrdering::SeqCst);
        // A message may have landed between the final dequeue and the
        // flag reset; restart so it is not stranded.
        if !self.pending_lock().is_empty() {
            self.ensure_drain();
        }
    }

    async fn process_queued(&self, item: QueuedMessage) {
        let outcomes = join_all(item.routes.iter().map(|r| self.deliver(r, &item.message))).await;

        let mut any_failed = false;
        for (route, outcome) in item.routes.iter().zip(&outcomes) {
            if let Err(err) = outcome {
                any_failed = true;
                debug!(id = %item.message.id, target = %route.target, %err,
                    "route delivery failed");
            }
        }
        if !any_failed {
            return;
        }

        let retried = item.retry(Utc::now(), self.config.backoff_base_secs);
        if retried.attempts >= self.config.max_delivery_attempts {
            warn!(id = %retried.message.id, attempts = retried.attempts,
                "dropping message after exhausting delivery attempts");
            return;
        }

        if self.config.honor_backoff {
            let delay = retried.delay_from(Utc::now());
            if !delay.is_zero() {
                if let Some(router) = self.weak.upgrade() {
                    // Deferred requeue keeps the drain loop moving for
                    // other pending messages.
                    tokio::spawn(async move {
                        tokio::time::sleep(delay).await;
                        router.enqueue(retried);
                    });
                    return;
                }
            }
        }
        self.enqueue(retried);
    }

    // =========================================================================
    // Lock plumbing (poison-recovering)
    // =========================================================================

    fn registry_read(&self) -> std::sync::RwLockReadGuard<'_, HashMap<String, Arc<dyn AgentHandler>>> {
        self.registry.read().unwrap_or_else(|e| e.into_inner())
    }

    fn registry_write(
        &self,
    ) -> std::sync::RwLockWriteGuard<'_, HashMap<String, Arc<dyn AgentHandler>>> {
        self.registry.write().unwrap_or_else(|e| e.into_inner())
    }

    fn topics_read(&self) -> std::sync::RwLockReadGuard<'_, HashMap<String, HashSet<String>>> {
        self.topics.read().unwrap_or_else(|e| e.into_inner())
    }

    fn topics_write(&self) -> std::sync::RwLockWriteGuard<'_, HashMap<String, HashSet<String>>> {
        self.topics.write().unwrap_or_else(|e| e.into_inner())
    }

    fn filters_read(&self) -> std::sync::RwLockReadGuard<'_, HashMap<String, MessageFilter>> {
        self.filters.read().unwrap_or_else(|e| e.into_inner())
    }

    fn filters_write(&self) -> std::sync::RwLockWriteGuard<'_, HashMap<String, MessageFilter>> {
        self.filters.write().unwrap_or_else(|e| e.into_inner())
    }

    fn pending_lock(&self) -> std::sync::MutexGuard<'_, IndexedPriorityQueue<QueuedMessage>> {
        self.pending.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn identity_snapshot(&self) -> Vec<AgentIdentity> {
        self.registry_read()
            .values()
            .map(|handler| handler.context().identity())
            .collect()
    }
}
