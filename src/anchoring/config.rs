// File: src/anchoring/config.rs

use std::time::Duration;

use super::chain::AnchorChain;
use crate::lock::env_millis;

/// Rollup settings for one external chain
#[derive(Debug, Clone)]
pub struct ChainAnchorConfig {
    pub enabled: bool,

    /// How often a rollup is attempted
    pub interval: Duration,

    /// A rollup is skipped while the last anchor is younger than this
    pub min_interval: Duration,
}

/// Anchoring configuration for every chain
#[derive(Debug, Clone)]
pub struct AnchorConfig {
    pub btc: ChainAnchorConfig,
    pub eth: ChainAnchorConfig,
}

impl Default for AnchorConfig {
    fn default() -> Self {
        Self {
            btc: ChainAnchorConfig {
                enabled: true,
                interval: Duration::from_secs(60),
                min_interval: Duration::from_secs(3600),
            },
            eth: ChainAnchorConfig {
                enabled: false,
                interval: Duration::from_secs(60),
                min_interval: Duration::from_secs(600),
            },
        }
    }
}

impl AnchorConfig {
    /// Create config from environment variables
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            btc: chain_from_env("BTC", defaults.btc),
            eth: chain_from_env("ETH", defaults.eth),
        }
    }

    pub fn for_chain(&self, chain: AnchorChain) -> &ChainAnchorConfig {
        match chain {
            AnchorChain::Btc => &self.btc,
            AnchorChain::Eth => &self.eth,
        }
    }
}

fn chain_from_env(prefix: &str, defaults: ChainAnchorConfig) -> ChainAnchorConfig {
    ChainAnchorConfig {
        enabled: std::env::var(format!("CAL_{prefix}_ANCHOR_ENABLED"))
            .map(|v| v == "true" || v == "1")
            .unwrap_or(defaults.enabled),
        interval: env_millis(&format!("CAL_{prefix}_ANCHOR_INTERVAL_MS")).unwrap_or(defaults.interval),
        min_interval: env_millis(&format!("CAL_{prefix}_MIN_ANCHOR_INTERVAL_MS"))
            .unwrap_or(defaults.min_interval),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    #[test]
    #[serial]
    fn test_chain_settings_from_env() {
        std::env::set_var("CAL_ETH_ANCHOR_ENABLED", "true");
        std::env::set_var("CAL_ETH_MIN_ANCHOR_INTERVAL_MS", "1500");
        std::env::set_var("CAL_BTC_ANCHOR_ENABLED", "0");

        let config = AnchorConfig::from_env();
        assert!(config.eth.enabled);
        assert_eq!(config.eth.min_interval, Duration::from_millis(1500));
        assert!(!config.for_chain(AnchorChain::Btc).enabled);
        assert_eq!(config.btc.interval, AnchorConfig::default().btc.interval);

        std::env::remove_var("CAL_ETH_ANCHOR_ENABLED");
        std::env::remove_var("CAL_ETH_MIN_ANCHOR_INTERVAL_MS");
        std::env::remove_var("CAL_BTC_ANCHOR_ENABLED");
    }
}
