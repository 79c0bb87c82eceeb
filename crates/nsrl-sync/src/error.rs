use std::path::PathBuf;

use crate::source::ContainerKind;

/// Errors from retrieving a source's artifact. All of them are transient:
/// the source is skipped for this run and retried on the next one.
#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    #[error("request to {uri} timed out")]
    Timeout { uri: String },

    #[error("network error for {uri}: {message}")]
    Network { uri: String, message: String },

    #[error("{uri} returned HTTP {status}")]
    Status { uri: String, status: u16 },

    #[error("invalid client setup for {uri}: {message}")]
    Client { uri: String, message: String },

    #[error("I/O error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Errors from turning a downloaded container into a flat hash list.
#[derive(Debug, thiserror::Error)]
pub enum ExtractionError {
    #[error("entry {entry} not found in {}", archive.display())]
    MissingEntry { archive: PathBuf, entry: String },

    #[error("corrupt archive {}: {message}", archive.display())]
    Corrupt { archive: PathBuf, message: String },

    #[error("{kind} artifacts need a pattern to extract")]
    MissingPattern { kind: ContainerKind },

    #[error("{0} artifacts are not containers")]
    NotAContainer(ContainerKind),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors from importing a flat hash list into the store.
#[derive(Debug, thiserror::Error)]
pub enum ImportError {
    #[error("failed to read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("malformed record on line {line} of {}", path.display())]
    MalformedRecord { path: PathBuf, line: u64 },

    #[error("store error: {0}")]
    Store(#[from] StoreError),
}

/// Errors that stop a run before any source is touched.
#[derive(Debug, thiserror::Error)]
pub enum ConfigurationError {
    #[error("no sources configured")]
    NoSources,

    #[error("duplicate source name: {0}")]
    DuplicateName(String),

    #[error("invalid source name {0:?}: names must be non-empty and contain no path separators")]
    InvalidName(String),

    #[error("source {name} is a {kind} container but has no pattern")]
    MissingPattern { name: String, kind: ContainerKind },

    #[error("failed to prepare working directory {}: {source}", path.display())]
    WorkingDirectory {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("config file {}: {message}", path.display())]
    File { path: PathBuf, message: String },

    #[error("update state unreadable: {0}")]
    State(String),

    #[error("{0}")]
    Other(String),
}

/// Errors raised by a hash set store backend.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("store unavailable: {0}")]
    Unavailable(String),

    #[error("database error: {0}")]
    Database(String),

    #[error("migration error: {0}")]
    Migration(String),
}
