//! End-to-end tests for the pre-order cache against the fake backend.
//!
//! Each test drives `HttpPreorderApi` over real HTTP and persists to a
//! temporary snapshot directory.

#![allow(clippy::unwrap_used)]

use techshop_core::{ChangeSource, PreorderId, PreorderPhase, ProductId};
use techshop_integration_tests::FakeBackend;
use techshop_storefront::api::HttpPreorderApi;
use techshop_storefront::storage::{FileSnapshotStore, snapshot};
use techshop_storefront::{BackendConfig, CacheOptions, CancelError, PreorderStateCache};
use tempfile::TempDir;

type Cache = PreorderStateCache<HttpPreorderApi, FileSnapshotStore>;

async fn open_cache(config: &BackendConfig, dir: &TempDir) -> Cache {
    let api = HttpPreorderApi::new(config).unwrap();
    let store = FileSnapshotStore::new(dir.path());
    let cache = PreorderStateCache::new(api, store, CacheOptions::default());
    cache.initialize().await;
    cache
}

fn product(id: u64) -> ProductId {
    ProductId::from(id)
}

#[tokio::test]
async fn test_signed_in_reconcile_reads_backend_and_persists() {
    let backend = FakeBackend::start().await;
    backend.state.add_preorder("42", "po-9", "pending");
    let dir = TempDir::new().unwrap();

    let cache = open_cache(&backend.signed_in_config(), &dir).await;
    assert!(cache.is_authenticated());

    let result = cache.reconcile([product(42), product(43)]).await;

    assert_eq!(result.len(), 2);
    let status = cache.get_status(&product(42));
    assert!(status.has_preorder());
    assert_eq!(status.preorder_id().unwrap().as_str(), "po-9");
    assert_eq!(status.status(), Some(&PreorderPhase::Pending));
    assert!(!cache.get_status(&product(43)).has_preorder());
    assert!(cache.last_sync().is_some());

    let stored = snapshot::load(&FileSnapshotStore::new(dir.path()))
        .unwrap()
        .unwrap();
    assert_eq!(stored.entries.len(), 1);
    assert!(stored.entries.contains_key(&product(42)));
    assert!(stored.saved_at.is_some());
}

#[tokio::test]
async fn test_anonymous_session_never_asks_for_status() {
    let backend = FakeBackend::start().await;
    backend.state.add_preorder("42", "po-9", "pending");
    let dir = TempDir::new().unwrap();

    let cache = open_cache(&backend.anonymous_config(), &dir).await;
    assert!(!cache.is_authenticated());

    let result = cache.reconcile([product(42)]).await;

    assert!(result.is_empty());
    assert!(!cache.get_status(&product(42)).has_preorder());
    assert_eq!(backend.state.status_requests(), 0);
    assert!(snapshot::load(&FileSnapshotStore::new(dir.path())).unwrap().is_none());
}

#[tokio::test]
async fn test_cancel_removes_preorder_and_cart_line() {
    let backend = FakeBackend::start().await;
    backend.state.add_preorder("42", "po-9", "confirmed");
    let dir = TempDir::new().unwrap();
    let cache = open_cache(&backend.signed_in_config(), &dir).await;
    cache.reconcile([product(42)]).await;
    let mut changes = cache.subscribe();

    cache
        .cancel(&PreorderId::parse("po-9").unwrap(), &product(42))
        .await
        .unwrap();

    assert!(!cache.get_status(&product(42)).has_preorder());
    assert!(!backend.state.has_preorder("42"));
    assert!(!backend.state.cart_contains("po-9"));

    let change = changes.recv().await.unwrap();
    assert_eq!(change.product_id, product(42));
    assert_eq!(change.source, ChangeSource::Cancelled);
    assert!(!change.state.has_preorder());

    let requests = backend.state.requests();
    let cancel_at = requests
        .iter()
        .position(|r| r == "POST /api/preorders/po-9/cancel")
        .unwrap();
    let cart_at = requests
        .iter()
        .position(|r| r == "POST /api/cart/remove-preorder")
        .unwrap();
    assert!(cancel_at < cart_at);
}

#[tokio::test]
async fn test_rejected_cancel_keeps_state_and_reports_reason() {
    let backend = FakeBackend::start().await;
    backend.state.add_preorder("42", "po-9", "ready");
    backend
        .state
        .reject_cancellations("Pre-order already shipped");
    let dir = TempDir::new().unwrap();
    let cache = open_cache(&backend.signed_in_config(), &dir).await;
    cache.reconcile([product(42)]).await;

    let err = cache
        .cancel(&PreorderId::parse("po-9").unwrap(), &product(42))
        .await
        .unwrap_err();

    assert!(matches!(&err, CancelError::Rejected(reason) if reason == "Pre-order already shipped"));
    assert_eq!(err.user_message(), "Pre-order already shipped");
    assert!(cache.get_status(&product(42)).has_preorder());
    assert!(backend.state.cart_contains("po-9"));
    assert!(
        !backend
            .state
            .requests()
            .iter()
            .any(|r| r == "POST /api/cart/remove-preorder")
    );
}

#[tokio::test]
async fn test_cart_failure_does_not_fail_cancel() {
    let backend = FakeBackend::start().await;
    backend.state.add_preorder("42", "po-9", "pending");
    backend.state.break_cart();
    let dir = TempDir::new().unwrap();
    let cache = open_cache(&backend.signed_in_config(), &dir).await;
    cache.reconcile([product(42)]).await;

    cache
        .cancel(&PreorderId::parse("po-9").unwrap(), &product(42))
        .await
        .unwrap();

    assert!(!cache.get_status(&product(42)).has_preorder());
    assert!(backend.state.cart_contains("po-9"));
}

#[tokio::test]
async fn test_backend_error_keeps_cached_state() {
    let backend = FakeBackend::start().await;
    backend.state.add_preorder("42", "po-9", "pending");
    let dir = TempDir::new().unwrap();
    let cache = open_cache(&backend.signed_in_config(), &dir).await;
    cache.reconcile([product(42)]).await;
    let synced_at = cache.last_sync();

    backend.state.break_status_endpoint();
    let result = cache.reconcile([product(42)]).await;

    assert!(result.is_empty());
    assert!(cache.get_status(&product(42)).has_preorder());
    assert_eq!(cache.last_sync(), synced_at);
}

#[tokio::test]
async fn test_new_instance_is_seeded_from_snapshot() {
    let backend = FakeBackend::start().await;
    backend.state.add_preorder("42", "po-9", "pending");
    let dir = TempDir::new().unwrap();

    let first = open_cache(&backend.signed_in_config(), &dir).await;
    first.reconcile([product(42)]).await;
    assert_eq!(backend.state.status_requests(), 1);

    let second = open_cache(&backend.signed_in_config(), &dir).await;

    assert!(second.get_status(&product(42)).has_preorder());
    assert!(second.last_sync().is_some());
    assert_eq!(backend.state.status_requests(), 1);
}

#[tokio::test]
async fn test_signed_out_start_discards_snapshot() {
    let backend = FakeBackend::start().await;
    backend.state.add_preorder("42", "po-9", "pending");
    let dir = TempDir::new().unwrap();

    let signed_in = open_cache(&backend.signed_in_config(), &dir).await;
    signed_in.reconcile([product(42)]).await;

    let anonymous = open_cache(&backend.anonymous_config(), &dir).await;

    assert!(!anonymous.get_status(&product(42)).has_preorder());
    assert!(snapshot::load(&FileSnapshotStore::new(dir.path())).unwrap().is_none());
}

#[tokio::test]
async fn test_record_created_is_confirmed_by_backend() {
    let backend = FakeBackend::start().await;
    backend.state.add_preorder("42", "po-9", "confirmed");
    let dir = TempDir::new().unwrap();
    let cache = open_cache(&backend.signed_in_config(), &dir).await;

    let status = cache
        .record_created(
            &product(42),
            PreorderId::parse("po-9").unwrap(),
            Some(PreorderPhase::Pending),
        )
        .await;

    assert_eq!(status.status(), Some(&PreorderPhase::Confirmed));
    assert_eq!(backend.state.status_requests(), 1);
}
