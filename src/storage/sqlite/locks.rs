// File: src/storage/sqlite/locks.rs

use super::config::SqliteConfig;
use super::schema;
use super::store::open_connection;
use crate::error::{ServerError, ServerResult, StorageError};
use crate::traits::{DistributedLock, LockAcquisition, LockToken};
use async_trait::async_trait;
use rusqlite::{params, Connection};
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

/// Lease locks in the `locks` table
///
/// Every replica opening the same database file shares these locks. Expired
/// leases are taken over in place by the next acquirer. Lease queries run on
/// the blocking pool: a write waiting on `busy_timeout` stalls only the
/// calling task.
pub struct SqliteLockService {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteLockService {
    pub fn open<P: AsRef<Path>>(path: P) -> ServerResult<Self> {
        Self::with_config(SqliteConfig {
            path: path.as_ref().to_string_lossy().to_string(),
            ..Default::default()
        })
    }

    pub fn with_config(config: SqliteConfig) -> ServerResult<Self> {
        let conn = open_connection(&config)?;
        schema::create_tables(&conn)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Private in-memory lock table (for testing)
    pub fn in_memory() -> ServerResult<Self> {
        Self::with_config(SqliteConfig {
            path: ":memory:".to_string(),
            ..Default::default()
        })
    }

    /// Operation recorded by the current unexpired holder of `key`
    pub fn current_operation(&self, key: &str) -> ServerResult<Option<String>> {
        let conn = lock_conn(&self.conn)?;
        let now = chrono::Utc::now().timestamp_millis();
        let mut stmt =
            conn.prepare("SELECT operation FROM locks WHERE lock_key = ?1 AND expires_at > ?2")?;
        let mut rows = stmt.query(params![key, now])?;
        match rows.next()? {
            Some(row) => Ok(Some(row.get(0)?)),
            None => Ok(None),
        }
    }

    async fn blocking<T, F>(&self, query: F) -> ServerResult<T>
    where
        F: FnOnce(&Connection) -> ServerResult<T> + Send + 'static,
        T: Send + 'static,
    {
        let conn = Arc::clone(&self.conn);
        tokio::task::spawn_blocking(move || query(&*lock_conn(&conn)?))
            .await
            .map_err(|e| ServerError::Internal(format!("spawn_blocking failed: {}", e)))?
    }
}

fn lock_conn(conn: &Mutex<Connection>) -> ServerResult<MutexGuard<'_, Connection>> {
    conn.lock().map_err(|_| {
        ServerError::Storage(StorageError::ConnectionFailed("lock poisoned".into()))
    })
}

#[async_trait]
impl DistributedLock for SqliteLockService {
    async fn try_acquire(
        &self,
        key: &str,
        holder: &str,
        operation: &str,
        ttl: Duration,
    ) -> ServerResult<LockAcquisition> {
        let now = chrono::Utc::now().timestamp_millis();
        let expires_at = now + ttl.as_millis() as i64;
        let token = LockToken {
            key: key.to_string(),
            holder: holder.to_string(),
            token: uuid::Uuid::new_v4().to_string(),
            expires_at,
        };
        let operation = operation.to_string();

        self.blocking(move |conn| {
            let changed = conn.execute(
                "INSERT INTO locks (lock_key, holder, token, operation, acquired_at, expires_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)
                 ON CONFLICT(lock_key) DO UPDATE SET
                    holder = excluded.holder,
                    token = excluded.token,
                    operation = excluded.operation,
                    acquired_at = excluded.acquired_at,
                    expires_at = excluded.expires_at
                 WHERE locks.expires_at <= ?5",
                params![token.key, token.holder, token.token, operation, now, expires_at],
            )?;

            if changed == 0 {
                return Ok(LockAcquisition::Busy);
            }
            Ok(LockAcquisition::Acquired(token))
        })
        .await
    }

    async fn renew(&self, token: &LockToken, ttl: Duration) -> ServerResult<bool> {
        let now = chrono::Utc::now().timestamp_millis();
        let expires_at = now + ttl.as_millis() as i64;
        let token = token.clone();

        self.blocking(move |conn| {
            let changed = conn.execute(
                "UPDATE locks SET expires_at = ?1 WHERE lock_key = ?2 AND token = ?3 AND expires_at > ?4",
                params![expires_at, token.key, token.token, now],
            )?;
            Ok(changed == 1)
        })
        .await
    }

    async fn release(&self, token: &LockToken) -> ServerResult<()> {
        let token = token.clone();

        self.blocking(move |conn| {
            conn.execute(
                "DELETE FROM locks WHERE lock_key = ?1 AND token = ?2",
                params![token.key, token.token],
            )?;
            Ok(())
        })
        .await
    }
}
