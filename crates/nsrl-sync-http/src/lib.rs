//! The conditional HTTP fetcher behind [`nsrl_sync::ArtifactFetcher`].

pub mod fetcher;
pub mod http_date;

pub use fetcher::{DEFAULT_TIMEOUT, HttpFetcher};
