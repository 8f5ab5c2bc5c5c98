// File: src/storage/sqlite/config.rs

/// SQLite storage backend configuration
#[derive(Debug, Clone)]
pub struct SqliteConfig {
    /// Path to database file (or ":memory:" for in-memory)
    pub path: String,

    /// Enable WAL mode for concurrent reads
    pub wal_mode: bool,

    /// Busy timeout in milliseconds
    pub busy_timeout_ms: u32,
}

impl Default for SqliteConfig {
    fn default() -> Self {
        Self {
            path: "calendar.db".to_string(),
            wal_mode: true,
            busy_timeout_ms: 5000,
        }
    }
}

impl SqliteConfig {
    /// Whether this config points at a private in-memory database
    pub fn is_memory(&self) -> bool {
        self.path == ":memory:"
    }
}

/// Ledger statistics
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LedgerStats {
    /// Total blocks
    pub block_count: u64,

    /// Height of the tip (None for an empty ledger)
    pub tip_height: Option<u64>,

    /// Number of currently held, unexpired locks
    pub held_locks: u64,
}
