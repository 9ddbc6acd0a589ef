//! Router tuning knobs.

use serde::{Deserialize, Serialize};

/// Configuration for a [`super::MessageRouter`].
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RouterConfig {
    /// Delivery attempts per queued message before it is dead-lettered.
    pub max_delivery_attempts: u32,
    /// Base of the exponential backoff, in seconds (delay = base^attempts).
    pub backoff_base_secs: u64,
    /// When false, failed messages are requeued immediately and
    /// `next_retry_at` is advisory only.
    pub honor_backoff: bool,
    /// Default heartbeat interval for long-lived agents, in seconds.
    pub default_heartbeat_secs: u64,
}

impl Default for RouterConfig {
    fn default() -> Self {
        Self {
            max_delivery_attempts: 3,
            backoff_base_secs: 2,
            honor_backoff: true,
            default_heartbeat_secs: 30,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = RouterConfig::default();
        assert_eq!(config.max_delivery_attempts, 3);
        assert_eq!(config.backoff_base_secs, 2);
        assert!(config.honor_backoff);
        assert_eq!(config.default_heartbeat_secs, 30);
    }

    #[test]
    fn test_partial_deserialization_fills_defaults() {
        let config: RouterConfig =
            serde_json::from_str(r#"{"max_delivery_attempts": 5}"#).unwrap();
        assert_eq!(config.max_delivery_attempts, 5);
        assert_eq!(config.backoff_base_secs, 2);
    }
}
