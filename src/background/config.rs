// File: src/background/config.rs

use std::time::Duration;

use crate::aggregation::AggregationConfig;
use crate::anchoring::AnchorConfig;
use crate::lock::env_millis;

/// Calendar tier configuration
#[derive(Debug, Clone)]
pub struct CalendarJobConfig {
    /// How often staged aggregation roots become a `cal` block
    pub interval: Duration,
}

impl Default for CalendarJobConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(10),
        }
    }
}

/// NIST beacon tier configuration
#[derive(Debug, Clone)]
pub struct NistJobConfig {
    pub interval: Duration,
}

impl Default for NistJobConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(60),
        }
    }
}

/// Global background jobs configuration
#[derive(Debug, Clone)]
pub struct BackgroundConfig {
    /// Disable all background jobs (for testing)
    pub disabled: bool,

    pub aggregation: AggregationConfig,
    pub calendar: CalendarJobConfig,
    pub nist: NistJobConfig,
    pub anchor: AnchorConfig,

    /// Fixed backoff before a failed delivery is handed back to the broker
    pub broker_retry: Duration,
}

impl Default for BackgroundConfig {
    fn default() -> Self {
        Self {
            disabled: false,
            aggregation: AggregationConfig::default(),
            calendar: CalendarJobConfig::default(),
            nist: NistJobConfig::default(),
            anchor: AnchorConfig::default(),
            broker_retry: Duration::from_millis(1000),
        }
    }
}

impl BackgroundConfig {
    /// Create config from environment variables
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            disabled: std::env::var("CAL_BACKGROUND_DISABLED")
                .map(|v| v == "true" || v == "1")
                .unwrap_or(false),
            aggregation: AggregationConfig::from_env(),
            calendar: CalendarJobConfig {
                interval: env_millis("CAL_CALENDAR_INTERVAL_MS").unwrap_or(defaults.calendar.interval),
            },
            nist: NistJobConfig {
                interval: env_millis("CAL_NIST_INTERVAL_MS").unwrap_or(defaults.nist.interval),
            },
            anchor: AnchorConfig::from_env(),
            broker_retry: env_millis("CAL_BROKER_RETRY_MS").unwrap_or(defaults.broker_retry),
        }
    }
}
