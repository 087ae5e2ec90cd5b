//! SQLite backend for the memo cache.

use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use rusqlite::{params, Connection, OptionalExtension};

use super::backend::MemoBackend;
use super::current_epoch_millis;
use super::entry::{MemoEntry, MemoKey};
use super::error::MemoCacheError;

/// SQLite-based memo backend.
///
/// Lets several worker processes on one host share memoized lookups.
/// Uses WAL mode so readers do not block each other.
///
/// Every statement runs on tokio's blocking pool, so upload workers never
/// block a runtime thread on the connection lock or on disk I/O. Expired
/// rows are deleted when a lookup finds them and when the database is
/// opened.
pub struct SqliteMemoBackend {
    /// Database connection (protected by mutex for thread safety).
    conn: Arc<Mutex<Connection>>,
    /// Table name (versioned for schema migrations).
    table_name: Arc<str>,
}

impl SqliteMemoBackend {
    /// Database schema version.
    const CACHE_DB_VERSION: u32 = 1;

    /// Create or open a SQLite memo cache at the given path.
    ///
    /// Entries that have already expired are removed.
    ///
    /// # Arguments
    /// * `db_path` - Path to the SQLite database file
    ///
    /// # Errors
    /// Returns error if database cannot be opened or initialized.
    pub fn open(db_path: &Path) -> Result<Self, MemoCacheError> {
        let conn: Connection = Connection::open(db_path)?;

        conn.execute_batch("PRAGMA journal_mode=WAL;")?;
        conn.busy_timeout(std::time::Duration::from_secs(5))?;

        let table_name: String = format!("memo_cache_v{}", Self::CACHE_DB_VERSION);
        let create_sql: String = format!(
            "CREATE TABLE IF NOT EXISTS {} (
                cache_key TEXT PRIMARY KEY,
                value TEXT,
                created_at_ms INTEGER NOT NULL,
                expires_at_ms INTEGER NOT NULL
            )",
            table_name
        );
        conn.execute(&create_sql, [])?;

        let backend: Self = Self {
            conn: Arc::new(Mutex::new(conn)),
            table_name: Arc::from(table_name),
        };
        let deleted: usize = backend.cleanup_expired(current_epoch_millis())?;
        if deleted > 0 {
            log::debug!("Removed {} expired memo entries from {}", deleted, db_path.display());
        }
        Ok(backend)
    }

    /// Delete entries that expired before `now_ms`.
    ///
    /// # Returns
    /// Number of entries deleted.
    pub fn cleanup_expired(&self, now_ms: i64) -> Result<usize, MemoCacheError> {
        let conn = lock(&self.conn);
        let deleted: usize = conn.execute(
            &format!("DELETE FROM {} WHERE expires_at_ms <= ?", self.table_name),
            params![now_ms],
        )?;
        Ok(deleted)
    }

    /// Get the number of entries in the cache.
    pub fn count(&self) -> Result<usize, MemoCacheError> {
        let conn = lock(&self.conn);
        let count: i64 = conn.query_row(
            &format!("SELECT COUNT(*) FROM {}", self.table_name),
            [],
            |row| row.get(0),
        )?;
        Ok(count as usize)
    }

    /// Run `op` against the connection on the blocking pool.
    async fn run<T, F>(&self, op: F) -> Result<T, MemoCacheError>
    where
        T: Send + 'static,
        F: FnOnce(&Connection, &str) -> rusqlite::Result<T> + Send + 'static,
    {
        let conn: Arc<Mutex<Connection>> = Arc::clone(&self.conn);
        let table_name: Arc<str> = Arc::clone(&self.table_name);
        let result: rusqlite::Result<T> =
            tokio::task::spawn_blocking(move || op(&lock(&conn), &table_name))
                .await
                .map_err(|e| MemoCacheError::Task(e.to_string()))?;
        Ok(result?)
    }
}

fn lock(conn: &Mutex<Connection>) -> MutexGuard<'_, Connection> {
    conn.lock().unwrap_or_else(PoisonError::into_inner)
}

#[async_trait::async_trait]
impl MemoBackend for SqliteMemoBackend {
    async fn get(&self, key: &MemoKey, now_ms: i64) -> Option<MemoEntry> {
        let owned_key: MemoKey = key.clone();
        let result = self
            .run(move |conn, table_name| {
                let entry: Option<MemoEntry> = conn
                    .query_row(
                        &format!(
                            "SELECT value, created_at_ms, expires_at_ms FROM {} WHERE cache_key = ?",
                            table_name
                        ),
                        params![owned_key.as_str()],
                        |row| {
                            Ok(MemoEntry {
                                key: owned_key.clone(),
                                value: row.get(0)?,
                                created_at_ms: row.get(1)?,
                                expires_at_ms: row.get(2)?,
                            })
                        },
                    )
                    .optional()?;

                match entry {
                    Some(entry) if entry.is_expired(now_ms) => {
                        conn.execute(
                            &format!(
                                "DELETE FROM {} WHERE cache_key = ? AND expires_at_ms <= ?",
                                table_name
                            ),
                            params![owned_key.as_str(), now_ms],
                        )?;
                        Ok(None)
                    }
                    entry => Ok(entry),
                }
            })
            .await;

        match result {
            Ok(entry) => entry,
            Err(e) => {
                log::warn!("Memo cache get error: {}", e);
                None
            }
        }
    }

    async fn put(&self, entry: &MemoEntry) {
        let entry: MemoEntry = entry.clone();
        let result = self
            .run(move |conn, table_name| {
                conn.execute(
                    &format!(
                        "INSERT OR REPLACE INTO {} (cache_key, value, created_at_ms, expires_at_ms)
                         VALUES (?, ?, ?, ?)",
                        table_name
                    ),
                    params![
                        entry.key.as_str(),
                        entry.value,
                        entry.created_at_ms,
                        entry.expires_at_ms
                    ],
                )
            })
            .await;

        if let Err(e) = result {
            log::warn!("Memo cache put error: {}", e);
        }
    }

    async fn delete(&self, key: &MemoKey) {
        let key: MemoKey = key.clone();
        let result = self
            .run(move |conn, table_name| {
                conn.execute(
                    &format!("DELETE FROM {} WHERE cache_key = ?", table_name),
                    params![key.as_str()],
                )
            })
            .await;

        if let Err(e) = result {
            log::warn!("Memo cache delete error: {}", e);
        }
    }

    async fn clear(&self) {
        let result = self
            .run(|conn, table_name| conn.execute(&format!("DELETE FROM {}", table_name), []))
            .await;
        if let Err(e) = result {
            log::warn!("Memo cache clear error: {}", e);
        }
    }
}
