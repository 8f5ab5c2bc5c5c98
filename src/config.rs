//! Server configuration

use crate::background::BackgroundConfig;
use crate::lock::LockConfig;

/// Server configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// SQLite file holding the calendar ledger and, for the SQLite lock
    /// backend, the lock table
    pub database_path: String,
    /// Ed25519 seed file (None = ephemeral key, development only)
    pub signing_key_path: Option<String>,
    /// Stack identifier written into every block
    pub stack_id: String,
    /// Public base URI used in anchor descriptors
    pub stack_uri: String,
    pub log_level: String,
    pub lock: LockConfig,
    pub background: BackgroundConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            database_path: "./calendar.db".to_string(),
            signing_key_path: None,
            stack_id: "calendar-local".to_string(),
            stack_uri: "http://localhost:3000".to_string(),
            log_level: "info".to_string(),
            lock: LockConfig::default(),
            background: BackgroundConfig::default(),
        }
    }
}

impl Config {
    /// Load from environment variables, falling back to defaults
    pub fn from_env() -> Self {
        let defaults = Self::default();

        Self {
            database_path: std::env::var("CAL_DATABASE_PATH").unwrap_or(defaults.database_path),
            signing_key_path: std::env::var("CAL_SIGNING_KEY_PATH")
                .ok()
                .filter(|s| !s.is_empty()),
            stack_id: std::env::var("CAL_STACK_ID").unwrap_or(defaults.stack_id),
            stack_uri: std::env::var("CAL_STACK_URI")
                .map(|s| s.trim_end_matches('/').to_string())
                .unwrap_or(defaults.stack_uri),
            log_level: std::env::var("CAL_LOG_LEVEL").unwrap_or(defaults.log_level),
            lock: LockConfig::from_env(),
            background: BackgroundConfig::from_env(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use std::time::Duration;

    const VARS: [&str; 8] = [
        "CAL_DATABASE_PATH",
        "CAL_SIGNING_KEY_PATH",
        "CAL_STACK_ID",
        "CAL_STACK_URI",
        "CAL_LOG_LEVEL",
        "CAL_BACKGROUND_DISABLED",
        "CAL_CALENDAR_INTERVAL_MS",
        "CAL_LOCK_TTL_MS",
    ];

    fn clear_env() {
        for var in VARS {
            std::env::remove_var(var);
        }
    }

    #[test]
    fn test_config_default() {
        let config = Config::default();
        assert_eq!(config.database_path, "./calendar.db");
        assert!(config.signing_key_path.is_none());
        assert_eq!(config.log_level, "info");
        assert!(!config.background.disabled);
        assert_eq!(config.background.broker_retry, Duration::from_millis(1000));
    }

    #[test]
    #[serial]
    fn test_config_from_env_empty() {
        clear_env();

        let config = Config::from_env();
        assert_eq!(config.database_path, "./calendar.db");
        assert_eq!(config.stack_id, "calendar-local");
        assert_eq!(config.lock.ttl, LockConfig::default().ttl);
        assert_eq!(config.background.calendar.interval, Duration::from_secs(10));
    }

    #[test]
    #[serial]
    fn test_config_from_env_all_values() {
        clear_env();
        std::env::set_var("CAL_DATABASE_PATH", "/data/cal.db");
        std::env::set_var("CAL_SIGNING_KEY_PATH", "/keys/calendar.key");
        std::env::set_var("CAL_STACK_ID", "stack-eu-1");
        std::env::set_var("CAL_STACK_URI", "https://a.cal.example/");
        std::env::set_var("CAL_LOG_LEVEL", "debug");
        std::env::set_var("CAL_BACKGROUND_DISABLED", "1");
        std::env::set_var("CAL_CALENDAR_INTERVAL_MS", "2500");
        std::env::set_var("CAL_LOCK_TTL_MS", "9000");

        let config = Config::from_env();
        assert_eq!(config.database_path, "/data/cal.db");
        assert_eq!(config.signing_key_path.as_deref(), Some("/keys/calendar.key"));
        assert_eq!(config.stack_id, "stack-eu-1");
        assert_eq!(config.stack_uri, "https://a.cal.example");
        assert_eq!(config.log_level, "debug");
        assert!(config.background.disabled);
        assert_eq!(config.background.calendar.interval, Duration::from_millis(2500));
        assert_eq!(config.lock.ttl, Duration::from_millis(9000));

        clear_env();
    }

    #[test]
    #[serial]
    fn test_empty_signing_key_path_is_none() {
        clear_env();
        std::env::set_var("CAL_SIGNING_KEY_PATH", "");

        assert!(Config::from_env().signing_key_path.is_none());

        clear_env();
    }
}
