//! Persisted snapshot inspection.

use chrono::Utc;
use techshop_storefront::ClientConfig;
use techshop_storefront::storage::{FileSnapshotStore, snapshot};
use tracing::info;

use super::CommandError;

/// Print the stored snapshot: entries, age, and whether it would be trusted.
///
/// # Errors
///
/// Returns an error if the snapshot exists but cannot be read.
pub fn show(config: &ClientConfig) -> Result<(), CommandError> {
    let store = FileSnapshotStore::new(&config.snapshot_dir);

    let Some(stored) = snapshot::load(&store)? else {
        info!(dir = %store.dir().display(), "No snapshot stored");
        return Ok(());
    };

    let now = Utc::now();
    info!(
        dir = %store.dir().display(),
        entries = stored.entries.len(),
        age_secs = stored.age(now).map(|age| age.num_seconds()),
        fresh = stored.is_fresh(config.cache.cache_ttl, now),
        "Snapshot"
    );

    for (product_id, status) in &stored.entries {
        info!(
            product_id = %product_id,
            preorder_id = status.preorder_id().map_or("-", |id| id.as_str()),
            status = status.status().map_or("-", |s| s.as_str()),
            "Entry"
        );
    }
    Ok(())
}

/// Delete the stored snapshot.
///
/// # Errors
///
/// Returns an error if the files exist but cannot be removed.
pub fn clear(config: &ClientConfig) -> Result<(), CommandError> {
    let store = FileSnapshotStore::new(&config.snapshot_dir);
    snapshot::clear(&store)?;
    info!(dir = %store.dir().display(), "Snapshot cleared");
    Ok(())
}
