// File: src/aggregation/config.rs

use std::time::Duration;

use crate::lock::env_millis;

/// Tier-1 aggregation configuration
#[derive(Debug, Clone)]
pub struct AggregationConfig {
    /// How often staged leaves are rolled into trees
    pub interval: Duration,

    /// Upper bound on leaves per tree; larger batches are split
    pub max_leaves_per_tree: usize,
}

impl Default for AggregationConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_millis(1000),
            max_leaves_per_tree: 4096,
        }
    }
}

impl AggregationConfig {
    /// Create config from environment variables
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            interval: env_millis("CAL_AGGREGATION_INTERVAL_MS").unwrap_or(defaults.interval),
            max_leaves_per_tree: std::env::var("CAL_MAX_LEAVES_PER_TREE")
                .ok()
                .and_then(|s| s.parse().ok())
                .filter(|n| *n > 0)
                .unwrap_or(defaults.max_leaves_per_tree),
        }
    }
}
