use std::path::Path;
use std::sync::Mutex;

use chrono::{DateTime, SecondsFormat, Utc};
use nsrl_sync::{SourceState, StoreError, UpdateState};

use crate::schema;

/// Persists [`UpdateState`] in the `update_state` table.
///
/// Timestamps are stored as RFC 3339 text with full sub-second precision,
/// so a saved state loads back exactly.
pub struct StateStore {
    conn: Mutex<rusqlite::Connection>,
}

impl StateStore {
    pub fn open(path: &Path) -> Result<Self, StoreError> {
        Ok(Self {
            conn: Mutex::new(schema::connect(Some(path))?),
        })
    }

    pub fn open_in_memory() -> Result<Self, StoreError> {
        Ok(Self {
            conn: Mutex::new(schema::connect(None)?),
        })
    }

    pub fn load(&self) -> Result<UpdateState, StoreError> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn
            .prepare("SELECT name, previous_update, previous_hash FROM update_state")
            .map_err(|e| StoreError::Database(e.to_string()))?;

        let rows = stmt
            .query_map([], |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, Option<String>>(1)?,
                    row.get::<_, Option<String>>(2)?,
                ))
            })
            .map_err(|e| StoreError::Database(e.to_string()))?;

        rows.map(|row| {
            let (name, previous_update, previous_hash) =
                row.map_err(|e| StoreError::Database(e.to_string()))?;
            let previous_update = previous_update.as_deref().map(parse_timestamp).transpose()?;
            Ok((
                name,
                SourceState {
                    previous_update,
                    previous_hash,
                },
            ))
        })
        .collect()
    }

    /// Write every entry of `state` in a single transaction. Rows for
    /// sources not in `state` are left alone.
    pub fn save(&self, state: &UpdateState) -> Result<(), StoreError> {
        let mut conn = self.conn.lock().unwrap();
        let tx = conn
            .transaction()
            .map_err(|e| StoreError::Database(e.to_string()))?;

        {
            let mut stmt = tx
                .prepare(
                    "INSERT OR REPLACE INTO update_state (name, previous_update, previous_hash)
                     VALUES (?1, ?2, ?3)",
                )
                .map_err(|e| StoreError::Database(e.to_string()))?;

            for (name, entry) in state.iter() {
                let previous_update = entry
                    .previous_update
                    .map(|at| at.to_rfc3339_opts(SecondsFormat::AutoSi, true));
                stmt.execute(rusqlite::params![name, previous_update, entry.previous_hash])
                    .map_err(|e| StoreError::Database(e.to_string()))?;
            }
        }

        tx.commit().map_err(|e| StoreError::Database(e.to_string()))
    }
}

fn parse_timestamp(value: &str) -> Result<DateTime<Utc>, StoreError> {
    DateTime::parse_from_rfc3339(value)
        .map(|at| at.with_timezone(&Utc))
        .map_err(|e| StoreError::Database(format!("invalid timestamp {value:?}: {e}")))
}
