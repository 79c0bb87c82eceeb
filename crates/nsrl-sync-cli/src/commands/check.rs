use anyhow::{Context, Result};
use nsrl_sync::{HashSetStore, normalize_digest};

use crate::config::StoreSection;

/// Print whether a SHA-1 digest is in the configured set.
pub async fn run(store: &StoreSection, digest: &str) -> Result<bool> {
    let hashes = crate::commands::open_hash_store(store).await?;
    lookup(hashes.as_ref(), &store.set_key, digest).await
}

async fn lookup(hashes: &dyn HashSetStore, set_key: &str, digest: &str) -> Result<bool> {
    let digest = normalize_digest(digest);
    if digest.len() != 40 || !digest.bytes().all(|b| b.is_ascii_hexdigit()) {
        anyhow::bail!("not a SHA-1 digest: {digest}");
    }

    let known = hashes
        .is_member(set_key, &digest)
        .await
        .with_context(|| format!("lookup in set {set_key} failed"))?;

    if known {
        println!("{digest}: known");
    } else {
        println!("{digest}: not found");
    }
    Ok(known)
}
