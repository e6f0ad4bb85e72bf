//! Persisted snapshot of the pre-order cache.
//!
//! Two keys: the entry map as a JSON object, and the epoch-millisecond
//! timestamp of the last write. Both are written and deleted together.

use std::collections::BTreeMap;
use std::time::Duration;

use chrono::{DateTime, TimeDelta, Utc};
use techshop_core::{PreorderStatus, ProductId};

use super::{KeyValueStore, StorageError};

/// Key holding the productId -> status map.
pub const ENTRIES_KEY: &str = "preorder_states";

/// Key holding the write timestamp in epoch milliseconds.
pub const TIMESTAMP_KEY: &str = "preorder_states_timestamp";

/// Snapshot entries, ordered so the stored JSON is stable.
pub type SnapshotEntries = BTreeMap<ProductId, PreorderStatus>;

/// A snapshot read back from storage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Snapshot {
    pub entries: SnapshotEntries,
    /// `None` when the entries exist without a timestamp.
    pub saved_at: Option<DateTime<Utc>>,
}

impl Snapshot {
    /// Age at `now`; `None` if the write time is unknown.
    #[must_use]
    pub fn age(&self, now: DateTime<Utc>) -> Option<TimeDelta> {
        self.saved_at.map(|saved| now - saved)
    }

    /// Whether the snapshot may still be trusted.
    ///
    /// A missing timestamp counts as stale. A timestamp in the future is
    /// tolerated as clock skew between writers, up to `ttl` ahead of `now`.
    #[must_use]
    pub fn is_fresh(&self, ttl: Duration, now: DateTime<Utc>) -> bool {
        let Ok(ttl) = TimeDelta::from_std(ttl) else {
            return true;
        };
        self.age(now).is_some_and(|age| age <= ttl && -age <= ttl)
    }
}

/// Read the full snapshot. Returns `None` when no entries are stored.
///
/// # Errors
///
/// Returns `StorageError::Corrupt` if either key holds unparseable data.
pub fn load(store: &dyn KeyValueStore) -> Result<Option<Snapshot>, StorageError> {
    let Some(entries) = load_entries(store)? else {
        return Ok(None);
    };

    let saved_at = match store.get(TIMESTAMP_KEY)? {
        Some(raw) => {
            let millis: i64 = serde_json::from_str(raw.trim()).map_err(|source| {
                StorageError::Corrupt {
                    key: TIMESTAMP_KEY.to_string(),
                    source,
                }
            })?;
            DateTime::from_timestamp_millis(millis)
        }
        None => None,
    };

    Ok(Some(Snapshot { entries, saved_at }))
}

/// Read only the entry map, as peers do after a change notification.
///
/// # Errors
///
/// Returns `StorageError::Corrupt` if the stored map cannot be parsed.
pub fn load_entries(store: &dyn KeyValueStore) -> Result<Option<SnapshotEntries>, StorageError> {
    store
        .get(ENTRIES_KEY)?
        .map(|raw| {
            serde_json::from_str(&raw).map_err(|source| StorageError::Corrupt {
                key: ENTRIES_KEY.to_string(),
                source,
            })
        })
        .transpose()
}

/// Write entries and timestamp.
///
/// # Errors
///
/// Returns `StorageError` if encoding or either write fails.
pub fn save(
    store: &dyn KeyValueStore,
    entries: &SnapshotEntries,
    now: DateTime<Utc>,
) -> Result<(), StorageError> {
    let encoded = serde_json::to_string(entries)?;
    store.set(ENTRIES_KEY, &encoded)?;
    store.set(TIMESTAMP_KEY, &now.timestamp_millis().to_string())
}

/// Delete both keys.
///
/// # Errors
///
/// Returns `StorageError` if either delete fails.
pub fn clear(store: &dyn KeyValueStore) -> Result<(), StorageError> {
    store.remove(ENTRIES_KEY)?;
    store.remove(TIMESTAMP_KEY)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::storage::SharedMemoryStore;
    use techshop_core::{PreorderId, PreorderPhase};

    fn entries() -> SnapshotEntries {
        let mut map = BTreeMap::new();
        map.insert(
            ProductId::from(42_u64),
            PreorderStatus::active(
                PreorderId::parse("po-9").unwrap(),
                Some(PreorderPhase::Pending),
            ),
        );
        map
    }

    #[test]
    fn test_save_then_load() {
        let store = SharedMemoryStore::new();
        let now = Utc::now();
        save(&store, &entries(), now).unwrap();

        let snapshot = load(&store).unwrap().unwrap();
        assert_eq!(snapshot.entries, entries());
        assert_eq!(
            snapshot.saved_at.unwrap().timestamp_millis(),
            now.timestamp_millis()
        );
    }

    #[test]
    fn test_stored_format() {
        let store = SharedMemoryStore::new();
        let now = DateTime::from_timestamp_millis(1_700_000_000_000).unwrap();
        save(&store, &entries(), now).unwrap();

        assert_eq!(
            store.get(ENTRIES_KEY).unwrap().unwrap(),
            r#"{"42":{"hasPreorder":true,"preorderId":"po-9","status":"pending"}}"#
        );
        assert_eq!(
            store.get(TIMESTAMP_KEY).unwrap().unwrap(),
            "1700000000000"
        );
    }

    #[test]
    fn test_load_empty_store() {
        let store = SharedMemoryStore::new();
        assert_eq!(load(&store).unwrap(), None);
    }

    #[test]
    fn test_freshness() {
        let now = Utc::now();
        let ttl = Duration::from_secs(300);
        let snapshot = |saved_at| Snapshot {
            entries: entries(),
            saved_at,
        };

        assert!(snapshot(Some(now - TimeDelta::seconds(299))).is_fresh(ttl, now));
        assert!(!snapshot(Some(now - TimeDelta::seconds(301))).is_fresh(ttl, now));
        assert!(snapshot(Some(now + TimeDelta::seconds(5))).is_fresh(ttl, now));
        assert!(!snapshot(Some(now + TimeDelta::seconds(301))).is_fresh(ttl, now));
        assert!(!snapshot(Some(now + TimeDelta::days(365))).is_fresh(ttl, now));
        assert!(!snapshot(None).is_fresh(ttl, now));
    }

    #[test]
    fn test_corrupt_entries() {
        let store = SharedMemoryStore::new();
        store.set(ENTRIES_KEY, "not json").unwrap();
        assert!(matches!(
            load(&store),
            Err(StorageError::Corrupt { .. })
        ));
    }

    #[test]
    fn test_clear_removes_both_keys() {
        let store = SharedMemoryStore::new();
        save(&store, &entries(), Utc::now()).unwrap();
        clear(&store).unwrap();
        assert_eq!(store.get(ENTRIES_KEY).unwrap(), None);
        assert_eq!(store.get(TIMESTAMP_KEY).unwrap(), None);
    }
}
