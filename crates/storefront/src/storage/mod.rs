//! Key-value storage for the persisted pre-order snapshot.
//!
//! Stores are synchronous: a write has landed when `set` returns. Stores that
//! are shared between several cache instances also publish change
//! notifications, which peers use to re-read the snapshot. A writer never
//! sees notifications for its own writes.
//!
//! - [`FileSnapshotStore`] - one JSON file per key, no change feed
//! - [`SharedMemoryStore`] - process-wide map with a change feed per handle

mod file;
mod memory;
pub mod snapshot;

pub use file::FileSnapshotStore;
pub use memory::SharedMemoryStore;
pub use snapshot::Snapshot;

use thiserror::Error;
use tokio::sync::broadcast;
use uuid::Uuid;

/// Errors from a storage backend.
#[derive(Debug, Error)]
pub enum StorageError {
    /// Filesystem operation failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Stored value is not valid JSON for its key.
    #[error("Corrupt value under '{key}': {source}")]
    Corrupt {
        key: String,
        #[source]
        source: serde_json::Error,
    },

    /// Value could not be encoded.
    #[error("JSON encode error: {0}")]
    Encode(#[from] serde_json::Error),

    /// Key contains characters the backend cannot store.
    #[error("Invalid storage key: {0}")]
    InvalidKey(String),
}

/// A synchronous string key-value store.
pub trait KeyValueStore: Send + Sync {
    /// Read a value.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the backend cannot be read.
    fn get(&self, key: &str) -> Result<Option<String>, StorageError>;

    /// Write a value, replacing any previous one.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the backend cannot be written.
    fn set(&self, key: &str, value: &str) -> Result<(), StorageError>;

    /// Delete a value. Deleting a missing key is not an error.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the backend cannot be written.
    fn remove(&self, key: &str) -> Result<(), StorageError>;

    /// Subscribe to changes made through other handles, if supported.
    fn subscribe(&self) -> Option<StorageSubscription> {
        None
    }
}

/// A change observed in a shared store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StorageEvent {
    /// The changed key, or `None` when notifications were dropped and any
    /// key may have changed.
    pub key: Option<String>,
}

impl StorageEvent {
    /// Whether this event may concern `key`.
    #[must_use]
    pub fn affects(&self, key: &str) -> bool {
        self.key.as_deref().is_none_or(|k| k == key)
    }
}

/// Change as broadcast between handles of one shared store.
#[derive(Debug, Clone)]
pub(crate) struct RawChange {
    pub origin: Uuid,
    pub key: String,
}

/// Receiver for changes made by other handles.
pub struct StorageSubscription {
    origin: Uuid,
    receiver: broadcast::Receiver<RawChange>,
}

impl StorageSubscription {
    pub(crate) const fn new(origin: Uuid, receiver: broadcast::Receiver<RawChange>) -> Self {
        Self { origin, receiver }
    }

    /// Wait for the next foreign change. Returns `None` once the store is gone.
    pub async fn next(&mut self) -> Option<StorageEvent> {
        loop {
            match self.receiver.recv().await {
                Ok(change) if change.origin == self.origin => {}
                Ok(change) => {
                    return Some(StorageEvent {
                        key: Some(change.key),
                    });
                }
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    tracing::debug!(skipped, "Storage subscriber lagged");
                    return Some(StorageEvent { key: None });
                }
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_affects_named_key_only() {
        let event = StorageEvent {
            key: Some("a".to_string()),
        };
        assert!(event.affects("a"));
        assert!(!event.affects("b"));
    }

    #[test]
    fn test_lagged_event_affects_every_key() {
        let event = StorageEvent { key: None };
        assert!(event.affects("anything"));
    }
}
