use rusqlite_migration::{M, Migrations};

pub fn migrations() -> Migrations<'static> {
    Migrations::new(vec![M::up(
        "CREATE TABLE hash_members (
            set_key     TEXT NOT NULL,
            value       TEXT NOT NULL,
            PRIMARY KEY (set_key, value)
        ) WITHOUT ROWID;

        CREATE TABLE update_state (
            name            TEXT PRIMARY KEY,
            previous_update TEXT,
            previous_hash   TEXT
        );",
    )])
}

/// Open a connection at `path`, or in memory, and bring it to the latest
/// schema.
pub fn connect(
    path: Option<&std::path::Path>,
) -> Result<rusqlite::Connection, nsrl_sync::StoreError> {
    use nsrl_sync::StoreError;

    let mut conn = match path {
        Some(path) => rusqlite::Connection::open(path),
        None => rusqlite::Connection::open_in_memory(),
    }
    .map_err(|e| StoreError::Database(e.to_string()))?;

    migrations()
        .to_latest(&mut conn)
        .map_err(|e| StoreError::Migration(e.to_string()))?;

    Ok(conn)
}
