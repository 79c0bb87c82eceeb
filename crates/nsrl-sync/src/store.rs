use std::sync::Arc;

use crate::error::StoreError;

/// Set key used when none is configured.
pub const DEFAULT_SET_KEY: &str = "hashes";

/// A shared, persistent set of known hash values.
///
/// Mutation is additive only: adding a value that is already present is a
/// no-op, never an error. Several sources write to the same set.
#[async_trait::async_trait]
pub trait HashSetStore: Send + Sync {
    /// Add every value to the set under `set_key`.
    async fn add_members(&self, set_key: &str, values: &[String]) -> Result<(), StoreError>;

    /// Add a single value.
    async fn add_member(&self, set_key: &str, value: &str) -> Result<(), StoreError> {
        self.add_members(set_key, &[value.to_owned()]).await
    }

    /// Whether `value` is in the set under `set_key`.
    async fn is_member(&self, set_key: &str, value: &str) -> Result<bool, StoreError>;
}

#[async_trait::async_trait]
impl<T: HashSetStore + ?Sized> HashSetStore for Arc<T> {
    async fn add_members(&self, set_key: &str, values: &[String]) -> Result<(), StoreError> {
        (**self).add_members(set_key, values).await
    }

    async fn add_member(&self, set_key: &str, value: &str) -> Result<(), StoreError> {
        (**self).add_member(set_key, value).await
    }

    async fn is_member(&self, set_key: &str, value: &str) -> Result<bool, StoreError> {
        (**self).is_member(set_key, value).await
    }
}

/// Canonical form of a hex digest: trimmed and uppercase.
pub fn normalize_digest(digest: &str) -> String {
    digest.trim().to_ascii_uppercase()
}
