//! In-memory fakes for exercising the pipeline without a network or a
//! database.

pub mod fixtures;

use std::collections::{HashMap, HashSet};
use std::path::Path;
use std::sync::Mutex;

use chrono::{DateTime, Utc};

use crate::{ArtifactFetcher, FetchError, FetchOutcome, HashSetStore, SourceDescriptor, StoreError};

/// A hash set store held in memory. Can be told to fail after a number of
/// inserts to simulate the store going away mid-import.
#[derive(Default)]
pub struct InMemoryHashStore {
    sets: Mutex<HashMap<String, HashSet<String>>>,
    remaining_inserts: Mutex<Option<usize>>,
    add_calls: Mutex<usize>,
}

impl InMemoryHashStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// A store that accepts `inserts` values and then fails every insert.
    pub fn failing_after(inserts: usize) -> Self {
        Self {
            remaining_inserts: Mutex::new(Some(inserts)),
            ..Self::default()
        }
    }

    /// Stop injecting failures.
    pub fn heal(&self) {
        *self.remaining_inserts.lock().unwrap() = None;
    }

    pub fn members(&self, set_key: &str) -> HashSet<String> {
        self.sets
            .lock()
            .unwrap()
            .get(set_key)
            .cloned()
            .unwrap_or_default()
    }

    pub fn len(&self, set_key: &str) -> usize {
        self.sets.lock().unwrap().get(set_key).map_or(0, HashSet::len)
    }

    /// How many times `add_members` has been called.
    pub fn add_calls(&self) -> usize {
        *self.add_calls.lock().unwrap()
    }
}

#[async_trait::async_trait]
impl HashSetStore for InMemoryHashStore {
    async fn add_members(&self, set_key: &str, values: &[String]) -> Result<(), StoreError> {
        *self.add_calls.lock().unwrap() += 1;
        let mut sets = self.sets.lock().unwrap();
        let mut remaining = self.remaining_inserts.lock().unwrap();
        let set = sets.entry(set_key.to_owned()).or_default();

        for value in values {
            if let Some(left) = remaining.as_mut() {
                if *left == 0 {
                    return Err(StoreError::Unavailable("injected failure".into()));
                }
                *left -= 1;
            }
            set.insert(value.clone());
        }

        Ok(())
    }

    async fn is_member(&self, set_key: &str, value: &str) -> Result<bool, StoreError> {
        Ok(self
            .sets
            .lock()
            .unwrap()
            .get(set_key)
            .is_some_and(|set| set.contains(value)))
    }
}

/// What a [`StaticFetcher`] serves for one source.
#[derive(Debug, Clone)]
pub enum StaticResponse {
    /// Serve `body`, reporting `last_modified` so repeated fetches behave
    /// like a conditional server.
    Artifact {
        body: Vec<u8>,
        last_modified: DateTime<Utc>,
    },
    /// Fail with a network error.
    Fail(String),
}

/// One recorded call to [`StaticFetcher::fetch`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchCall {
    pub name: String,
    pub previous_update: Option<DateTime<Utc>>,
    pub downloaded: bool,
}

/// A fetcher that serves scripted artifacts by source name.
#[derive(Default)]
pub struct StaticFetcher {
    responses: Mutex<HashMap<String, StaticResponse>>,
    calls: Mutex<Vec<FetchCall>>,
}

impl StaticFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn serve(&self, name: &str, body: impl Into<Vec<u8>>, last_modified: DateTime<Utc>) {
        self.responses.lock().unwrap().insert(
            name.to_owned(),
            StaticResponse::Artifact {
                body: body.into(),
                last_modified,
            },
        );
    }

    pub fn fail(&self, name: &str, message: &str) {
        self.responses
            .lock()
            .unwrap()
            .insert(name.to_owned(), StaticResponse::Fail(message.to_owned()));
    }

    pub fn calls(&self) -> Vec<FetchCall> {
        self.calls.lock().unwrap().clone()
    }

    /// Number of fetches that transferred a body.
    pub fn downloads(&self) -> usize {
        self.calls.lock().unwrap().iter().filter(|c| c.downloaded).count()
    }
}

#[async_trait::async_trait]
impl ArtifactFetcher for StaticFetcher {
    async fn fetch(
        &self,
        source: &SourceDescriptor,
        target: &Path,
        previous_update: Option<DateTime<Utc>>,
    ) -> Result<FetchOutcome, FetchError> {
        let response = self.responses.lock().unwrap().get(&source.name).cloned();
        let mut call = FetchCall {
            name: source.name.clone(),
            previous_update,
            downloaded: false,
        };

        let outcome = match response {
            None => Err(FetchError::Status {
                uri: source.uri.clone(),
                status: 404,
            }),
            Some(StaticResponse::Fail(message)) => Err(FetchError::Network {
                uri: source.uri.clone(),
                message,
            }),
            Some(StaticResponse::Artifact { last_modified, .. })
                if previous_update.is_some_and(|previous| last_modified <= previous) =>
            {
                Ok(FetchOutcome::NotModified)
            }
            Some(StaticResponse::Artifact {
                body,
                last_modified,
            }) => {
                std::fs::write(target, &body).map_err(|source| FetchError::Io {
                    path: target.to_path_buf(),
                    source,
                })?;
                call.downloaded = true;
                Ok(FetchOutcome::Updated {
                    last_modified: Some(last_modified),
                })
            }
        };

        self.calls.lock().unwrap().push(call);
        outcome
    }
}
