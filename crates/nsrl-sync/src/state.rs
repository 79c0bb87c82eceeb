use std::collections::BTreeMap;

use chrono::{DateTime, Utc};

/// Freshness metadata for a single source.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SourceState {
    /// When the source was last fetched and imported successfully.
    pub previous_update: Option<DateTime<Utc>>,
    /// Uppercase hex SHA-1 of the last imported artifact.
    pub previous_hash: Option<String>,
}

/// Per-source freshness metadata, keyed by source name.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UpdateState {
    entries: BTreeMap<String, SourceState>,
}

impl UpdateState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, name: &str) -> Option<&SourceState> {
        self.entries.get(name)
    }

    pub fn previous_update(&self, name: &str) -> Option<DateTime<Utc>> {
        self.get(name).and_then(|s| s.previous_update)
    }

    pub fn insert(&mut self, name: impl Into<String>, state: SourceState) {
        self.entries.insert(name.into(), state);
    }

    /// Advance a source after a successful update. The fingerprint is only
    /// replaced when a new one is given.
    pub fn record_success(&mut self, name: &str, at: DateTime<Utc>, fingerprint: Option<String>) {
        let entry = self.entries.entry(name.to_owned()).or_default();
        entry.previous_update = Some(at);
        if fingerprint.is_some() {
            entry.previous_hash = fingerprint;
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &SourceState)> {
        self.entries.iter().map(|(name, state)| (name.as_str(), state))
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl FromIterator<(String, SourceState)> for UpdateState {
    fn from_iter<I: IntoIterator<Item = (String, SourceState)>>(iter: I) -> Self {
        Self {
            entries: iter.into_iter().collect(),
        }
    }
}
