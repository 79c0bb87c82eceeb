use std::path::Path;
use std::sync::Mutex;

use nsrl_sync::{HashSetStore, StoreError};
use tracing::debug;

use crate::schema;

/// A SQLite-backed hash set store.
///
/// Each set is the rows of `hash_members` sharing a `set_key`. Inserts of
/// an existing member are ignored, so re-importing a list is harmless.
pub struct SqliteHashStore {
    conn: Mutex<rusqlite::Connection>,
}

impl SqliteHashStore {
    /// Open a store backed by a file on disk.
    pub fn open(path: &Path) -> Result<Self, StoreError> {
        Ok(Self {
            conn: Mutex::new(schema::connect(Some(path))?),
        })
    }

    /// Open an in-memory store (for testing).
    pub fn open_in_memory() -> Result<Self, StoreError> {
        Ok(Self {
            conn: Mutex::new(schema::connect(None)?),
        })
    }

    /// Number of members in a set.
    pub fn count(&self, set_key: &str) -> Result<u64, StoreError> {
        let conn = self.conn.lock().unwrap();
        let count: i64 = conn
            .query_row(
                "SELECT COUNT(*) FROM hash_members WHERE set_key = ?1",
                [set_key],
                |row| row.get(0),
            )
            .map_err(|e| StoreError::Database(e.to_string()))?;
        u64::try_from(count).map_err(|e| StoreError::Database(e.to_string()))
    }
}

#[async_trait::async_trait]
impl HashSetStore for SqliteHashStore {
    async fn add_members(&self, set_key: &str, values: &[String]) -> Result<(), StoreError> {
        let mut conn = self.conn.lock().unwrap();
        let tx = conn
            .transaction()
            .map_err(|e| StoreError::Database(e.to_string()))?;

        {
            let mut stmt = tx
                .prepare_cached(
                    "INSERT OR IGNORE INTO hash_members (set_key, value) VALUES (?1, ?2)",
                )
                .map_err(|e| StoreError::Database(e.to_string()))?;
            for value in values {
                stmt.execute(rusqlite::params![set_key, value])
                    .map_err(|e| StoreError::Database(e.to_string()))?;
            }
        }

        tx.commit().map_err(|e| StoreError::Database(e.to_string()))?;
        debug!(set_key, count = values.len(), "batch committed");
        Ok(())
    }

    async fn is_member(&self, set_key: &str, value: &str) -> Result<bool, StoreError> {
        let conn = self.conn.lock().unwrap();
        conn.query_row(
            "SELECT EXISTS(SELECT 1 FROM hash_members WHERE set_key = ?1 AND value = ?2)",
            [set_key, value],
            |row| row.get(0),
        )
        .map_err(|e| StoreError::Database(e.to_string()))
    }
}
