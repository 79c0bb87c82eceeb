//! Drives every configured source through fetch, extract and import.

use std::fmt;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::Utc;
use tracing::{Instrument, debug, error, info, info_span, warn};

use crate::error::{ConfigurationError, ExtractionError, FetchError, ImportError};
use crate::fetch::{ArtifactFetcher, FetchOutcome};
use crate::source::{SourceDescriptor, validate_sources};
use crate::state::{SourceState, UpdateState};
use crate::store::{DEFAULT_SET_KEY, HashSetStore};
use crate::{extract, fingerprint, loader, workdir};

/// Settings shared by every source in a run.
#[derive(Debug, Clone)]
pub struct UpdaterOptions {
    /// Scratch directory for artifacts. Wiped at the start of every run.
    pub working_dir: PathBuf,
    /// Set that imported hashes are added to.
    pub set_key: String,
    /// Skip extraction and import when a downloaded artifact has the same
    /// SHA-1 as the last one imported.
    pub fingerprint_dedup: bool,
}

impl UpdaterOptions {
    pub fn new(working_dir: impl Into<PathBuf>) -> Self {
        Self {
            working_dir: working_dir.into(),
            set_key: DEFAULT_SET_KEY.to_owned(),
            fingerprint_dedup: true,
        }
    }
}

/// The pipeline stage a source failed in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Fetching,
    Extracting,
    Importing,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Fetching => "fetching",
            Self::Extracting => "extracting",
            Self::Importing => "importing",
        })
    }
}

/// Why a single source did not complete. Never fatal to the run.
#[derive(Debug, thiserror::Error)]
pub enum UpdateError {
    #[error(transparent)]
    Fetch(#[from] FetchError),

    #[error(transparent)]
    Extraction(#[from] ExtractionError),

    #[error(transparent)]
    Import(#[from] ImportError),
}

impl UpdateError {
    pub fn stage(&self) -> Stage {
        match self {
            Self::Fetch(_) => Stage::Fetching,
            Self::Extraction(_) => Stage::Extracting,
            Self::Import(_) => Stage::Importing,
        }
    }
}

/// Terminal state of one source in one run.
#[derive(Debug)]
pub enum SourceStatus {
    /// The remote copy is no newer than the last successful update.
    NotModified,
    /// Downloaded, but byte-identical to the last imported artifact.
    Unchanged,
    Imported { records: u64 },
    Failed(UpdateError),
}

impl SourceStatus {
    pub fn is_failed(&self) -> bool {
        matches!(self, Self::Failed(_))
    }
}

impl fmt::Display for SourceStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotModified => f.write_str("not modified"),
            Self::Unchanged => f.write_str("unchanged"),
            Self::Imported { records } => write!(f, "imported {records} records"),
            Self::Failed(e) => write!(f, "failed while {}: {e}", e.stage()),
        }
    }
}

#[derive(Debug)]
pub struct SourceOutcome {
    pub name: String,
    pub status: SourceStatus,
}

/// Result of a run: the state to persist and what happened to each source,
/// in configured order.
#[derive(Debug)]
pub struct RunReport {
    pub state: UpdateState,
    pub outcomes: Vec<SourceOutcome>,
}

impl RunReport {
    pub fn failed(&self) -> usize {
        self.count(|s| s.is_failed())
    }

    pub fn imported(&self) -> usize {
        self.count(|s| matches!(s, SourceStatus::Imported { .. }))
    }

    pub fn all_failed(&self) -> bool {
        !self.outcomes.is_empty() && self.failed() == self.outcomes.len()
    }

    pub fn outcome(&self, name: &str) -> Option<&SourceStatus> {
        self.outcomes
            .iter()
            .find(|o| o.name == name)
            .map(|o| &o.status)
    }

    fn count(&self, predicate: impl Fn(&SourceStatus) -> bool) -> usize {
        self.outcomes.iter().filter(|o| predicate(&o.status)).count()
    }
}

/// A source that got through the pipeline without failing.
enum Completed {
    NotModified,
    Unchanged { fingerprint: String },
    Imported { records: u64, fingerprint: String },
}

pub struct Updater {
    fetcher: Arc<dyn ArtifactFetcher>,
    store: Arc<dyn HashSetStore>,
    options: UpdaterOptions,
}

impl Updater {
    pub fn new(
        fetcher: Arc<dyn ArtifactFetcher>,
        store: Arc<dyn HashSetStore>,
        options: UpdaterOptions,
    ) -> Self {
        Self {
            fetcher,
            store,
            options,
        }
    }

    /// Update every source in order, starting from `prior`.
    ///
    /// Per-source failures are reported in the returned [`RunReport`] and
    /// leave that source's entry in the state untouched. Only invalid
    /// configuration or an unusable working directory fail the whole run,
    /// and both are detected before any source is fetched.
    pub async fn run(
        &self,
        sources: &[SourceDescriptor],
        prior: UpdateState,
    ) -> Result<RunReport, ConfigurationError> {
        validate_sources(sources)?;

        let work = &self.options.working_dir;
        workdir::reset(work).map_err(|source| ConfigurationError::WorkingDirectory {
            path: work.clone(),
            source,
        })?;

        let mut state = prior;
        let mut outcomes = Vec::with_capacity(sources.len());

        for source in sources {
            let span = info_span!("source", name = %source.name);
            let status = self.update_source(source, &mut state).instrument(span).await;
            outcomes.push(SourceOutcome {
                name: source.name.clone(),
                status,
            });
        }

        let report = RunReport { state, outcomes };
        info!(
            sources = report.outcomes.len(),
            imported = report.imported(),
            failed = report.failed(),
            "done"
        );
        if report.all_failed() {
            warn!("every source failed this run");
        }

        Ok(report)
    }

    async fn update_source(
        &self,
        source: &SourceDescriptor,
        state: &mut UpdateState,
    ) -> SourceStatus {
        match self.process(source, state.get(&source.name)).await {
            Ok(Completed::NotModified) => {
                info!("remote copy not modified, skipping");
                SourceStatus::NotModified
            }
            Ok(Completed::Unchanged { fingerprint }) => {
                info!(%fingerprint, "artifact matches last import, skipping");
                state.record_success(&source.name, Utc::now(), Some(fingerprint));
                SourceStatus::Unchanged
            }
            Ok(Completed::Imported {
                records,
                fingerprint,
            }) => {
                info!(records, "source updated");
                state.record_success(&source.name, Utc::now(), Some(fingerprint));
                SourceStatus::Imported { records }
            }
            Err(e) => {
                error!(
                    source = %source.name,
                    stage = %e.stage(),
                    error = %e,
                    "source update failed"
                );
                SourceStatus::Failed(e)
            }
        }
    }

    async fn process(
        &self,
        source: &SourceDescriptor,
        prior: Option<&SourceState>,
    ) -> Result<Completed, UpdateError> {
        let work = &self.options.working_dir;
        let artifact = source.artifact_path(work);
        let previous_update = prior.and_then(|s| s.previous_update);

        match self.fetcher.fetch(source, &artifact, previous_update).await? {
            FetchOutcome::NotModified => return Ok(Completed::NotModified),
            FetchOutcome::Updated { last_modified } => {
                debug!(?last_modified, artifact = %artifact.display(), "artifact downloaded");
            }
        }

        let fingerprint = fingerprint_artifact(&artifact).await?;
        let previous_hash = prior.and_then(|s| s.previous_hash.as_deref());
        if self.options.fingerprint_dedup && previous_hash == Some(fingerprint.as_str()) {
            workdir::remove_if_exists(&artifact).map_err(|source| FetchError::Io {
                path: artifact.clone(),
                source,
            })?;
            return Ok(Completed::Unchanged { fingerprint });
        }

        let list = if source.container_kind().is_container() {
            let source = source.clone();
            let work = work.clone();
            tokio::task::spawn_blocking(move || extract::extract(&source, &work))
                .await
                .map_err(|e| ExtractionError::Io(io::Error::other(e)))??
        } else {
            artifact
        };

        let records = loader::load(&list, self.store.as_ref(), &self.options.set_key).await?;

        Ok(Completed::Imported {
            records,
            fingerprint,
        })
    }
}

async fn fingerprint_artifact(artifact: &Path) -> Result<String, FetchError> {
    let path = artifact.to_path_buf();
    let io_error = |source| FetchError::Io {
        path: artifact.to_path_buf(),
        source,
    };

    tokio::task::spawn_blocking(move || fingerprint::sha1_file(&path))
        .await
        .map_err(|e| io_error(io::Error::other(e)))?
        .map_err(io_error)
}
