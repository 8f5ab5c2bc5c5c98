// File: src/storage/sqlite/store.rs

use super::config::{LedgerStats, SqliteConfig};
use super::schema;
use crate::error::{ServerError, ServerResult, StorageError};
use rusqlite::Connection;
use std::path::Path;
use std::sync::{Mutex, MutexGuard};

/// SQLite implementation of the BlockStore trait
///
/// File-backed databases get a second, read-only connection so ledger reads
/// never queue behind an in-flight write.
pub struct SqliteBlockStore {
    /// Write connection (also used for reads of in-memory databases)
    writer: Mutex<Connection>,

    /// Read connection (None for in-memory databases)
    reader: Option<Mutex<Connection>>,

    config: SqliteConfig,
}

impl SqliteBlockStore {
    /// Open or create a database file with default configuration
    pub fn new<P: AsRef<Path>>(path: P) -> ServerResult<Self> {
        let config = SqliteConfig {
            path: path.as_ref().to_string_lossy().to_string(),
            ..Default::default()
        };
        Self::with_config(config)
    }

    /// Create with custom configuration
    pub fn with_config(config: SqliteConfig) -> ServerResult<Self> {
        let writer = open_connection(&config)?;
        schema::create_tables(&writer)?;

        let reader = if config.is_memory() {
            None
        } else {
            Some(Mutex::new(open_connection(&config)?))
        };

        Ok(Self {
            writer: Mutex::new(writer),
            reader,
            config,
        })
    }

    /// Create an in-memory database (for testing)
    pub fn in_memory() -> ServerResult<Self> {
        Self::with_config(SqliteConfig {
            path: ":memory:".to_string(),
            ..Default::default()
        })
    }

    pub fn config(&self) -> &SqliteConfig {
        &self.config
    }

    /// Schema version recorded in the database
    pub fn schema_version(&self) -> ServerResult<u32> {
        schema::schema_version(&*self.read_conn()?)
    }

    /// Get ledger statistics
    pub fn stats(&self) -> ServerResult<LedgerStats> {
        let conn = self.read_conn()?;
        let now = chrono::Utc::now().timestamp_millis();

        let block_count: i64 = conn.query_row("SELECT COUNT(*) FROM blocks", [], |row| row.get(0))?;
        let tip: Option<i64> =
            conn.query_row("SELECT MAX(height) FROM blocks", [], |row| row.get(0))?;
        let held_locks: i64 = conn.query_row(
            "SELECT COUNT(*) FROM locks WHERE expires_at > ?1",
            [now],
            |row| row.get(0),
        )?;

        Ok(LedgerStats {
            block_count: block_count as u64,
            tip_height: tip.map(|h| h as u64),
            held_locks: held_locks as u64,
        })
    }

    /// Get locked write connection
    pub(crate) fn write_conn(&self) -> ServerResult<MutexGuard<'_, Connection>> {
        self.writer.lock().map_err(|_| {
            ServerError::Storage(StorageError::ConnectionFailed("lock poisoned".into()))
        })
    }

    /// Get locked read connection
    pub(crate) fn read_conn(&self) -> ServerResult<MutexGuard<'_, Connection>> {
        match &self.reader {
            Some(reader) => reader.lock().map_err(|_| {
                ServerError::Storage(StorageError::ConnectionFailed("lock poisoned".into()))
            }),
            None => self.write_conn(),
        }
    }
}

/// Open a connection and apply pragmas
pub(crate) fn open_connection(config: &SqliteConfig) -> ServerResult<Connection> {
    let conn = Connection::open(&config.path).map_err(|e| {
        ServerError::Storage(StorageError::ConnectionFailed(format!(
            "failed to open db: {}",
            e
        )))
    })?;

    if config.wal_mode && !config.is_memory() {
        conn.pragma_update(None, "journal_mode", "WAL")?;
    }
    conn.pragma_update(None, "busy_timeout", config.busy_timeout_ms)?;
    conn.pragma_update(None, "synchronous", "NORMAL")?;
    Ok(conn)
}
