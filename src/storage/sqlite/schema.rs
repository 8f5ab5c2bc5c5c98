// File: src/storage/sqlite/schema.rs

use crate::error::ServerResult;
use rusqlite::Connection;

/// Current schema version
pub const SCHEMA_VERSION: u32 = 1;

/// Create all tables (idempotent)
pub fn create_tables(conn: &Connection) -> ServerResult<()> {
    conn.execute_batch(SCHEMA_SQL)?;

    let now = chrono::Utc::now().timestamp_millis();
    conn.execute(
        "INSERT OR IGNORE INTO cal_config (key, value, updated_at) VALUES ('schema_version', ?1, ?2)",
        rusqlite::params![SCHEMA_VERSION.to_string(), now],
    )?;
    Ok(())
}

/// Read the stored schema version
pub fn schema_version(conn: &Connection) -> ServerResult<u32> {
    let version = conn.query_row(
        "SELECT value FROM cal_config WHERE key = 'schema_version'",
        [],
        |row| row.get::<_, String>(0),
    )?;
    Ok(version.parse().unwrap_or(0))
}

const SCHEMA_SQL: &str = r#"
-- Core configuration
CREATE TABLE IF NOT EXISTS cal_config (
    key TEXT PRIMARY KEY,
    value TEXT NOT NULL,
    updated_at INTEGER NOT NULL
);

-- Calendar blocks: append-only, hash-linked
CREATE TABLE IF NOT EXISTS blocks (
    height INTEGER PRIMARY KEY,             -- Strictly sequential from 0
    time INTEGER NOT NULL,                  -- Unix milliseconds
    version INTEGER NOT NULL,
    stack_id TEXT NOT NULL,
    block_type TEXT NOT NULL,               -- 'genesis', 'cal', 'nist', 'btc-anchor', ...
    data_id TEXT NOT NULL,
    data_val TEXT NOT NULL,
    prev_hash TEXT NOT NULL UNIQUE,         -- Hex hash of block at height - 1
    hash TEXT NOT NULL UNIQUE,              -- Hex SHA-256
    sig TEXT NOT NULL                       -- key_id:base64 Ed25519 signature
);

CREATE INDEX IF NOT EXISTS idx_blocks_type_height ON blocks(block_type, height);

-- Lease locks shared by every replica using this database
CREATE TABLE IF NOT EXISTS locks (
    lock_key TEXT PRIMARY KEY,              -- 'calendar', 'btc-anchor', ...
    holder TEXT NOT NULL,                   -- Replica identifier
    token TEXT NOT NULL,                    -- Lease token
    operation TEXT NOT NULL,                -- Informational: what holds the lock
    acquired_at INTEGER NOT NULL,           -- Unix milliseconds
    expires_at INTEGER NOT NULL             -- Unix milliseconds
);
"#;
