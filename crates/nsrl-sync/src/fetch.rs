use std::path::Path;
use std::sync::Arc;

use chrono::{DateTime, Utc};

use crate::error::FetchError;
use crate::source::SourceDescriptor;

/// Result of a conditional fetch that did not fail.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchOutcome {
    /// A full body was written to the target path.
    Updated {
        last_modified: Option<DateTime<Utc>>,
    },
    /// The remote resource has not changed; nothing was written.
    NotModified,
}

/// Retrieves a source's artifact, skipping the transfer when the remote
/// copy is not newer than `previous_update`.
///
/// Implementations must leave `target` either fully written or absent.
#[async_trait::async_trait]
pub trait ArtifactFetcher: Send + Sync {
    async fn fetch(
        &self,
        source: &SourceDescriptor,
        target: &Path,
        previous_update: Option<DateTime<Utc>>,
    ) -> Result<FetchOutcome, FetchError>;
}

#[async_trait::async_trait]
impl<T: ArtifactFetcher + ?Sized> ArtifactFetcher for Arc<T> {
    async fn fetch(
        &self,
        source: &SourceDescriptor,
        target: &Path,
        previous_update: Option<DateTime<Utc>>,
    ) -> Result<FetchOutcome, FetchError> {
        (**self).fetch(source, target, previous_update).await
    }
}
