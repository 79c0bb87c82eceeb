use anyhow::Result;
use chrono::{DateTime, Utc};
use nsrl_sync::UpdateState;
use serde::Serialize;

use crate::config::AppConfig;

#[derive(Debug, Serialize)]
struct SourceRow<'a> {
    name: &'a str,
    uri: &'a str,
    enabled: bool,
    previous_update: Option<DateTime<Utc>>,
    previous_hash: Option<&'a str>,
}

fn rows<'a>(config: &'a AppConfig, state: &'a UpdateState) -> Vec<SourceRow<'a>> {
    config
        .sources
        .iter()
        .map(|entry| {
            let entry_state = state.get(&entry.name);
            SourceRow {
                name: &entry.name,
                uri: &entry.uri,
                enabled: entry.enabled,
                previous_update: entry_state.and_then(|s| s.previous_update),
                previous_hash: entry_state.and_then(|s| s.previous_hash.as_deref()),
            }
        })
        .collect()
}

/// Print each configured source with its persisted freshness state.
pub fn run(config: &AppConfig, json: bool) -> Result<()> {
    let state = crate::commands::open_state(&config.store)?
        .load()
        .map_err(|e| nsrl_sync::ConfigurationError::State(e.to_string()))?;
    let rows = rows(config, &state);

    if json {
        println!("{}", serde_json::to_string_pretty(&rows)?);
        return Ok(());
    }

    for row in &rows {
        let updated = row
            .previous_update
            .map(|at| at.to_rfc3339())
            .unwrap_or_else(|| "never".into());
        let disabled = if row.enabled { "" } else { " (disabled)" };
        println!("{}{disabled}", row.name);
        println!("  uri:          {}", row.uri);
        println!("  last update:  {updated}");
        println!("  fingerprint:  {}", row.previous_hash.unwrap_or("none"));
    }
    Ok(())
}
