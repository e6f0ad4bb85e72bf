//! In-process shared store with change notifications.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tokio::sync::broadcast;
use uuid::Uuid;

use super::{KeyValueStore, RawChange, StorageError, StorageSubscription};

const CHANGE_CAPACITY: usize = 64;

/// A key-value map shared by every handle opened from it.
///
/// Each handle has its own origin, so a cache instance holding one handle is
/// notified about writes made through the others but not about its own.
/// Writes that leave a value unchanged are not announced.
#[derive(Clone)]
pub struct SharedMemoryStore {
    shared: Arc<Shared>,
    origin: Uuid,
}

struct Shared {
    data: Mutex<HashMap<String, String>>,
    changes: broadcast::Sender<RawChange>,
}

impl Default for SharedMemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl SharedMemoryStore {
    /// Create an empty store and its first handle.
    #[must_use]
    pub fn new() -> Self {
        let (changes, _) = broadcast::channel(CHANGE_CAPACITY);
        Self {
            shared: Arc::new(Shared {
                data: Mutex::new(HashMap::new()),
                changes,
            }),
            origin: Uuid::new_v4(),
        }
    }

    /// Open another handle onto the same data with its own origin.
    #[must_use]
    pub fn open_peer(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
            origin: Uuid::new_v4(),
        }
    }

    fn data(&self) -> MutexGuard<'_, HashMap<String, String>> {
        self.shared
            .data
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    fn announce(&self, key: &str) {
        // No receivers is fine: nobody is listening yet.
        let _ = self.shared.changes.send(RawChange {
            origin: self.origin,
            key: key.to_string(),
        });
    }
}

impl KeyValueStore for SharedMemoryStore {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        Ok(self.data().get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StorageError> {
        let changed = {
            let mut data = self.data();
            let previous = data.insert(key.to_string(), value.to_string());
            previous.as_deref() != Some(value)
        };
        if changed {
            self.announce(key);
        }
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), StorageError> {
        let removed = self.data().remove(key).is_some();
        if removed {
            self.announce(key);
        }
        Ok(())
    }

    fn subscribe(&self) -> Option<StorageSubscription> {
        Some(StorageSubscription::new(
            self.origin,
            self.shared.changes.subscribe(),
        ))
    }
}
