pub mod check;
pub mod status;
pub mod update;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use nsrl_sync::{ConfigurationError, HashSetStore};
use nsrl_sync_store::{RedisHashStore, SqliteHashStore, StateStore, redis_supported};

use crate::config::{Backend, StoreSection, UpdaterSection};

fn data_dir() -> Result<PathBuf> {
    let base = dirs::cache_dir().context("could not determine cache directory")?;
    Ok(base.join("nsrl-sync"))
}

/// SQLite database for the sqlite backend and for update state.
pub fn database_path(store: &StoreSection) -> Result<PathBuf> {
    let path = match &store.path {
        Some(path) => path.clone(),
        None => data_dir()?.join("hashes.db"),
    };
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("failed to create database directory: {}", parent.display()))?;
    }
    Ok(path)
}

pub fn working_dir(updater: &UpdaterSection) -> Result<PathBuf> {
    match &updater.working_dir {
        Some(dir) => Ok(dir.clone()),
        None => Ok(data_dir()?.join("work")),
    }
}

pub fn open_state(store: &StoreSection) -> Result<StateStore> {
    let path = database_path(store)?;
    let state = StateStore::open(&path).map_err(|e| ConfigurationError::State(e.to_string()))?;
    Ok(state)
}

pub async fn open_hash_store(store: &StoreSection) -> Result<Arc<dyn HashSetStore>> {
    match store.backend {
        Backend::Sqlite => {
            let path = database_path(store)?;
            let hashes = SqliteHashStore::open(&path)
                .with_context(|| format!("failed to open hash database {}", path.display()))?;
            Ok(Arc::new(hashes))
        }
        Backend::Redis => {
            if !redis_supported() {
                return Err(ConfigurationError::Other(
                    "backend = \"redis\" needs a build with the `redis` feature".into(),
                )
                .into());
            }
            let url = store.url.as_deref().ok_or_else(|| {
                ConfigurationError::Other("backend = \"redis\" requires store.url".into())
            })?;
            let hashes = RedisHashStore::connect(url)
                .await
                .with_context(|| format!("failed to connect to {url}"))?;
            Ok(Arc::new(hashes))
        }
    }
}
