//! Pending-delivery records and retry backoff.

use std::time::Duration;

use chrono::{DateTime, Utc};

use crate::protocol::AgentMessage;

use super::Route;

/// A message waiting in the router's pending queue.
///
/// Created on enqueue, replaced (never mutated in place) on retry, and
/// destroyed on successful delivery or once the retry budget is spent.
#[derive(Debug, Clone)]
pub struct QueuedMessage {
    pub message: AgentMessage,
    pub routes: Vec<Route>,
    /// Delivery attempts completed so far.
    pub attempts: u32,
    /// Earliest instant the next attempt should run.
    pub next_retry_at: Option<DateTime<Utc>>,
}

impl QueuedMessage {
    pub fn new(message: AgentMessage, routes: Vec<Route>) -> Self {
        Self {
            message,
            routes,
            attempts: 0,
            next_retry_at: None,
        }
    }

    /// Record a failed attempt, producing the replacement record.
    ///
    /// Routes are carried over unchanged: a retry re-attempts every route,
    /// not just the failed ones.
    pub fn retry(self, now: DateTime<Utc>, backoff_base_secs: u64) -> Self {
        let attempts = self.attempts + 1;
        let delay = backoff_delay(backoff_base_secs, attempts);
        Self {
            next_retry_at: Some(now + chrono::Duration::from_std(delay).unwrap_or_default()),
            attempts,
            ..self
        }
    }

    /// How long until `next_retry_at`, measured from `now`. Zero when due.
    pub fn delay_from(&self, now: DateTime<Utc>) -> Duration {
        match self.next_retry_at {
            Some(at) if at > now => (at - now).to_std().unwrap_or_default(),
            _ => Duration::ZERO,
        }
    }
}

/// Exponential backoff: `base^attempts` seconds.
pub fn backoff_delay(base_secs: u64, attempts: u32) -> Duration {
    Duration::from_secs(base_secs.saturating_pow(attempts))
}
