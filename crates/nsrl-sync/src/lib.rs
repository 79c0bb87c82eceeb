//! Keeps a known-file hash set in sync with NSRL-style reference data.
//!
//! Each configured source runs through the same pipeline: a conditional
//! fetch, an optional archive extraction (ZIP, or an ISO9660 image wrapping
//! a ZIP), and a streamed bulk load into a shared [`HashSetStore`]. The
//! [`Updater`] drives the pipeline source by source and returns the
//! freshness state to persist for the next run.

pub mod error;
pub mod extract;
pub mod fetch;
pub mod fingerprint;
pub mod loader;
pub mod source;
pub mod state;
pub mod store;
pub mod updater;
pub mod workdir;

pub use error::{ConfigurationError, ExtractionError, FetchError, ImportError, StoreError};
pub use fetch::{ArtifactFetcher, FetchOutcome};
pub use source::{ContainerKind, Credentials, SourceDescriptor, validate_sources};
pub use state::{SourceState, UpdateState};
pub use store::{DEFAULT_SET_KEY, HashSetStore, normalize_digest};
pub use updater::{
    RunReport, SourceOutcome, SourceStatus, Stage, UpdateError, Updater, UpdaterOptions,
};

#[cfg(any(test, feature = "test-support"))]
pub mod test_support;

/// Block size for streamed reads and writes of working files.
pub const BLOCK_SIZE: usize = 64 * 1024;
