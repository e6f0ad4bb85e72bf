//! Client-side cache of "does product X have an active pre-order".
//!
//! The backend is the only source of truth. This cache keeps a local belief
//! per product so pre-order buttons can render without a round-trip, and
//! publishes a `PreorderChange` whenever that belief changes.
//!
//! # Ordering
//!
//! Every write (reconciliation, optimistic update, cancellation, storage
//! re-read) takes a number from one monotonically increasing sequence, and
//! each product remembers the number of the last write applied to it. A
//! reconciliation response is applied to a product only if the request was
//! issued after that product's last write. A slow response therefore never
//! overwrites a newer reconciliation or an optimistic update made while it
//! was in flight.

use std::collections::{BTreeSet, HashMap};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard, Weak};
use std::time::Duration;

use chrono::{DateTime, TimeDelta, Utc};
use techshop_core::{
    ChangeSource, PreorderChange, PreorderId, PreorderPhase, PreorderStatus, ProductId,
};
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::{debug, info, instrument, warn};

use super::CancelError;
use crate::api::PreorderApi;
use crate::config::CacheOptions;
use crate::storage::snapshot::{self, ENTRIES_KEY, SnapshotEntries};
use crate::storage::KeyValueStore;

/// Pre-order state cache.
///
/// Construct one per session and share it (`Arc`) with everything that
/// renders pre-order state. Call [`initialize`](Self::initialize) before
/// use: until then the session counts as signed out.
pub struct PreorderStateCache<A, S> {
    api: A,
    store: S,
    options: CacheOptions,
    state: RwLock<CacheState>,
    sequence: AtomicU64,
    events: broadcast::Sender<PreorderChange>,
}

#[derive(Default)]
struct CacheState {
    entries: HashMap<ProductId, PreorderStatus>,
    /// Sequence number of the last write per product. Kept after the entry
    /// itself is deleted.
    versions: HashMap<ProductId, u64>,
    last_sync: Option<DateTime<Utc>>,
    authenticated: bool,
}

impl CacheState {
    fn status(&self, product_id: &ProductId) -> PreorderStatus {
        self.entries.get(product_id).cloned().unwrap_or_default()
    }

    /// Store `status` for a product, deleting the entry when inactive.
    /// Returns the change if the visible status differs from before.
    fn put(
        &mut self,
        product_id: &ProductId,
        status: PreorderStatus,
        version: u64,
        source: ChangeSource,
    ) -> Option<PreorderChange> {
        self.versions.insert(product_id.clone(), version);
        let previous = if status.has_preorder() {
            self.entries.insert(product_id.clone(), status.clone())
        } else {
            self.entries.remove(product_id)
        };

        (previous.unwrap_or_default() != status).then(|| PreorderChange {
            product_id: product_id.clone(),
            state: status,
            source,
        })
    }

    fn snapshot_entries(&self) -> SnapshotEntries {
        self.entries
            .iter()
            .map(|(id, status)| (id.clone(), status.clone()))
            .collect()
    }
}

impl<A: PreorderApi, S: KeyValueStore> PreorderStateCache<A, S> {
    /// Create an uninitialized cache.
    pub fn new(api: A, store: S, options: CacheOptions) -> Self {
        let (events, _) = broadcast::channel(options.event_capacity.max(1));
        Self {
            api,
            store,
            options,
            state: RwLock::new(CacheState::default()),
            sequence: AtomicU64::new(0),
            events,
        }
    }

    // =========================================================================
    // Lifecycle
    // =========================================================================

    /// Probe the session and seed from the persisted snapshot.
    ///
    /// A signed-in session loads the snapshot if it is younger than the cache
    /// TTL and deletes it otherwise. A signed-out session (or a failed probe)
    /// deletes any snapshot left behind. A failed probe counts as signed out
    /// but leaves the snapshot in place. Never contacts the status endpoint.
    #[instrument(skip(self))]
    pub async fn initialize(&self) {
        let (authenticated, seeded) = match self.api.current_user().await {
            Ok(user) if user.authenticated => (true, self.load_fresh_snapshot()),
            Ok(_) => {
                self.discard_snapshot();
                (false, None)
            }
            // The snapshot may still belong to this session, so it is kept.
            Err(e) => {
                warn!(error = %e, "Identity probe failed, treating session as signed out");
                (false, None)
            }
        };

        let version = self.next_version();
        let mut state = self.write();
        state.authenticated = authenticated;
        state.entries.clear();
        state.last_sync = None;

        if let Some(snapshot) = seeded {
            for id in snapshot.entries.keys() {
                state.versions.insert(id.clone(), version);
            }
            state.entries.extend(snapshot.entries);
            state.last_sync = snapshot.saved_at;
        }

        info!(
            authenticated,
            seeded = state.entries.len(),
            "Pre-order cache initialized"
        );
    }

    fn load_fresh_snapshot(&self) -> Option<snapshot::Snapshot> {
        match snapshot::load(&self.store) {
            Ok(Some(snapshot)) if snapshot.is_fresh(self.options.cache_ttl, Utc::now()) => {
                debug!(entries = snapshot.entries.len(), "Seeding from snapshot");
                Some(snapshot)
            }
            Ok(Some(_)) => {
                debug!("Persisted snapshot is stale, discarding");
                self.discard_snapshot();
                None
            }
            Ok(None) => None,
            Err(e) => {
                warn!(error = %e, "Unreadable snapshot, discarding");
                self.discard_snapshot();
                None
            }
        }
    }

    fn discard_snapshot(&self) {
        if let Err(e) = snapshot::clear(&self.store) {
            warn!(error = %e, "Failed to delete persisted snapshot");
        }
    }

    // =========================================================================
    // Reads
    // =========================================================================

    /// Cached status of a product. Absent entries read as no pre-order.
    pub fn get_status(&self, product_id: &ProductId) -> PreorderStatus {
        self.read().status(product_id)
    }

    /// Whether the identity probe found a signed-in session.
    pub fn is_authenticated(&self) -> bool {
        self.read().authenticated
    }

    /// When the cache was last reconciled with the backend.
    pub fn last_sync(&self) -> Option<DateTime<Utc>> {
        self.read().last_sync
    }

    /// Copy of every active entry.
    pub fn entries(&self) -> SnapshotEntries {
        self.read().snapshot_entries()
    }

    /// Receive a `PreorderChange` for every change to a cached status.
    pub fn subscribe(&self) -> broadcast::Receiver<PreorderChange> {
        self.events.subscribe()
    }

    // =========================================================================
    // Reconciliation
    // =========================================================================

    /// Replace the cached status of `product_ids` with the backend's answer.
    ///
    /// Returns the resulting status of every requested product. Returns an
    /// empty map when the input is empty, when signed out, and when the
    /// request fails; failures leave the cache untouched and are only logged.
    #[instrument(skip(self, product_ids))]
    pub async fn reconcile<I>(&self, product_ids: I) -> HashMap<ProductId, PreorderStatus>
    where
        I: IntoIterator<Item = ProductId>,
    {
        let requested: BTreeSet<ProductId> = product_ids.into_iter().collect();
        if requested.is_empty() {
            return HashMap::new();
        }

        if !self.is_authenticated() {
            self.clear_signed_out(&requested);
            return HashMap::new();
        }

        let version = self.next_version();
        let ids: Vec<ProductId> = requested.iter().cloned().collect();

        let statuses = match self.api.preorder_status(&ids).await {
            Ok(statuses) => statuses,
            Err(e) => {
                warn!(
                    error = %e,
                    products = ids.len(),
                    "Pre-order reconciliation failed, keeping cached state"
                );
                return HashMap::new();
            }
        };

        let mut result = HashMap::with_capacity(ids.len());
        let mut changes = Vec::new();
        let mut applied = 0_usize;
        {
            let mut state = self.write();
            for id in ids {
                let last_write = state.versions.get(&id).copied().unwrap_or(0);
                if version <= last_write {
                    debug!(product_id = %id, version, last_write, "Discarding superseded status");
                    let current = state.status(&id);
                    result.insert(id, current);
                    continue;
                }

                // Products the backend left out have no active pre-order.
                let status = statuses.get(&id).cloned().unwrap_or_default();
                changes.extend(state.put(&id, status.clone(), version, ChangeSource::Reconciled));
                result.insert(id, status);
                applied += 1;
            }
            // A response superseded for every product does not count as a sync.
            if applied > 0 {
                state.last_sync = Some(Utc::now());
                self.persist(&state);
            }
        }

        debug!(changed = changes.len(), "Reconciled pre-order statuses");
        self.publish(changes);
        result
    }

    /// Reconcile only if the last sync is older than `max_age` (or never happened).
    ///
    /// Used when a page regains focus. Returns `None` if the cache was fresh
    /// enough and no request was made.
    pub async fn refresh_if_stale<I>(
        &self,
        product_ids: I,
        max_age: Duration,
    ) -> Option<HashMap<ProductId, PreorderStatus>>
    where
        I: IntoIterator<Item = ProductId>,
    {
        let max_age = TimeDelta::from_std(max_age).unwrap_or(TimeDelta::MAX);
        let fresh = self
            .last_sync()
            .is_some_and(|synced| Utc::now() - synced < max_age);
        if fresh {
            debug!("Pre-order cache fresh, skipping refresh");
            return None;
        }
        Some(self.reconcile(product_ids).await)
    }

    fn clear_signed_out(&self, requested: &BTreeSet<ProductId>) {
        let version = self.next_version();
        let mut changes = Vec::new();
        {
            let mut state = self.write();
            for id in requested {
                changes.extend(state.put(
                    id,
                    PreorderStatus::none(),
                    version,
                    ChangeSource::SignedOut,
                ));
            }
            state.last_sync = Some(Utc::now());
        }
        self.publish(changes);
    }

    // =========================================================================
    // Local mutations
    // =========================================================================

    /// Optimistically mark a product as pre-ordered, without a round-trip.
    ///
    /// Ignored when signed out. The update wins over any reconciliation that
    /// was already in flight.
    pub fn set_active(
        &self,
        product_id: &ProductId,
        preorder_id: PreorderId,
        status: Option<PreorderPhase>,
    ) {
        if !self.is_authenticated() {
            debug!(product_id = %product_id, "Ignoring optimistic update while signed out");
            return;
        }
        self.apply_local(
            product_id,
            PreorderStatus::active(preorder_id, status),
            ChangeSource::Optimistic,
        );
    }

    /// React to a pre-order created elsewhere on the page: apply it
    /// optimistically, then confirm it with the backend.
    pub async fn record_created(
        &self,
        product_id: &ProductId,
        preorder_id: PreorderId,
        status: Option<PreorderPhase>,
    ) -> PreorderStatus {
        self.set_active(product_id, preorder_id, status);
        self.reconcile([product_id.clone()]).await;
        self.get_status(product_id)
    }

    /// Cancel a pre-order.
    ///
    /// The backend cancellation must succeed before anything local changes.
    /// Removing the matching cart line is best-effort: its failure is logged
    /// and does not fail the call.
    ///
    /// # Errors
    ///
    /// Returns `CancelError` if signed out or if the backend does not confirm
    /// the cancellation. The cached status is unchanged in that case.
    #[instrument(skip(self), fields(preorder_id = %preorder_id, product_id = %product_id))]
    pub async fn cancel(
        &self,
        preorder_id: &PreorderId,
        product_id: &ProductId,
    ) -> Result<(), CancelError> {
        if !self.is_authenticated() {
            return Err(CancelError::NotAuthenticated);
        }

        self.api
            .cancel_preorder(preorder_id)
            .await
            .map_err(|e| {
                warn!(error = %e, "Pre-order cancellation failed");
                CancelError::from(e)
            })?;

        if let Err(e) = self.api.remove_preorder_from_cart(preorder_id).await {
            warn!(error = %e, "Could not remove cancelled pre-order from cart");
        }

        self.apply_local(product_id, PreorderStatus::none(), ChangeSource::Cancelled);
        info!("Pre-order cancelled");
        Ok(())
    }

    /// Write one product's status, persist, and always announce it.
    fn apply_local(&self, product_id: &ProductId, status: PreorderStatus, source: ChangeSource) {
        let version = self.next_version();
        {
            let mut state = self.write();
            state.put(product_id, status.clone(), version, source);
            self.persist(&state);
        }
        self.publish([PreorderChange {
            product_id: product_id.clone(),
            state: status,
            source,
        }]);
    }

    // =========================================================================
    // Shared storage
    // =========================================================================

    /// Re-read the entry map written by another cache instance.
    ///
    /// The stored map replaces local entries wholesale (last writer wins).
    /// A missing map leaves local entries alone. Returns the number of
    /// products whose status changed.
    pub fn sync_from_storage(&self) -> usize {
        if !self.is_authenticated() {
            return 0;
        }

        let stored = match snapshot::load_entries(&self.store) {
            Ok(Some(entries)) => entries,
            // A deleted snapshot says nothing about the server's state.
            Ok(None) => {
                debug!("Shared snapshot removed, keeping cached state");
                return 0;
            }
            Err(e) => {
                warn!(error = %e, "Ignoring unreadable shared snapshot");
                return 0;
            }
        };

        let version = self.next_version();
        let mut changes = Vec::new();
        {
            let mut state = self.write();
            let dropped: Vec<ProductId> = state
                .entries
                .keys()
                .filter(|id| !stored.contains_key(*id))
                .cloned()
                .collect();
            for id in dropped {
                changes.extend(state.put(&id, PreorderStatus::none(), version, ChangeSource::Storage));
            }
            for (id, status) in stored {
                changes.extend(state.put(&id, status, version, ChangeSource::Storage));
            }
        }

        let changed = changes.len();
        debug!(changed, "Applied shared snapshot");
        self.publish(changes);
        changed
    }

    // =========================================================================
    // Helpers
    // =========================================================================

    fn next_version(&self) -> u64 {
        self.sequence.fetch_add(1, Ordering::Relaxed) + 1
    }

    fn persist(&self, state: &CacheState) {
        if !state.authenticated {
            return;
        }
        if let Err(e) = snapshot::save(&self.store, &state.snapshot_entries(), Utc::now()) {
            warn!(error = %e, "Failed to persist pre-order snapshot");
        }
    }

    fn publish(&self, changes: impl IntoIterator<Item = PreorderChange>) {
        for change in changes {
            // Sending fails only when nobody is subscribed.
            let _ = self.events.send(change);
        }
    }

    fn read(&self) -> RwLockReadGuard<'_, CacheState> {
        self.state.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, CacheState> {
        self.state.write().unwrap_or_else(PoisonError::into_inner)
    }
}

impl<A, S> PreorderStateCache<A, S>
where
    A: PreorderApi + 'static,
    S: KeyValueStore + 'static,
{
    /// Follow shared-store notifications and re-read the snapshot whenever
    /// another instance changes it.
    ///
    /// Returns `None` if the store has no change feed. The task holds only a
    /// weak reference and ends once the cache is dropped.
    pub fn spawn_storage_listener(self: &Arc<Self>) -> Option<JoinHandle<()>> {
        let mut subscription = self.store.subscribe()?;
        let cache: Weak<Self> = Arc::downgrade(self);

        Some(tokio::spawn(async move {
            while let Some(event) = subscription.next().await {
                if !event.affects(ENTRIES_KEY) {
                    continue;
                }
                let Some(cache) = cache.upgrade() else {
                    break;
                };
                cache.sync_from_storage();
            }
        }))
    }
}
