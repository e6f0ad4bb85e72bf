//! Pre-order commands against the live backend.
//!
//! # Environment Variables
//!
//! - `TECHSHOP_BASE_URL` - Backend base URL
//! - `TECHSHOP_SESSION_COOKIE` - Session cookie of the customer to act as
//! - `TECHSHOP_SNAPSHOT_DIR` - Where the snapshot is persisted

use std::sync::Arc;
use std::time::Duration;

use techshop_core::{PreorderId, PreorderPhase, PreorderStatus, ProductId};
use techshop_storefront::api::HttpPreorderApi;
use techshop_storefront::storage::FileSnapshotStore;
use techshop_storefront::{ClientConfig, PreorderStateCache};
use tokio::sync::broadcast::error::RecvError;
use tracing::{info, warn};

use super::CommandError;

type Cache = PreorderStateCache<HttpPreorderApi, FileSnapshotStore>;

/// Build and initialize a cache from configuration.
async fn open_cache(config: &ClientConfig) -> Result<Cache, CommandError> {
    let api = HttpPreorderApi::new(&config.backend)?;
    let store = FileSnapshotStore::new(&config.snapshot_dir);
    let cache = PreorderStateCache::new(api, store, config.cache);
    cache.initialize().await;
    Ok(cache)
}

fn parse_products(raw: &[String]) -> Result<Vec<ProductId>, CommandError> {
    raw.iter()
        .map(|s| ProductId::parse(s).map_err(CommandError::from))
        .collect()
}

fn log_status(product_id: &ProductId, status: &PreorderStatus) {
    match status.preorder_id() {
        Some(preorder_id) => info!(
            product_id = %product_id,
            preorder_id = %preorder_id,
            status = status.status().map_or("-", PreorderPhase::as_str),
            "Active pre-order"
        ),
        None => info!(product_id = %product_id, "No pre-order"),
    }
}

/// Reconcile the given products and print their status.
///
/// # Errors
///
/// Returns an error if arguments or configuration are invalid. A failed
/// reconciliation is not an error; cached values are printed instead.
pub async fn status(config: &ClientConfig, products: &[String]) -> Result<(), CommandError> {
    let products = parse_products(products)?;
    let cache = open_cache(config).await?;

    if !cache.is_authenticated() {
        warn!("Session is not signed in; every product reports no pre-order");
    }

    let reconciled = cache.reconcile(products.iter().cloned()).await;
    if reconciled.is_empty() && cache.is_authenticated() {
        warn!("Backend unavailable, showing cached state");
    }

    for product_id in &products {
        log_status(product_id, &cache.get_status(product_id));
    }
    Ok(())
}

/// Cancel a pre-order.
///
/// # Errors
///
/// Returns an error if the backend does not confirm the cancellation.
pub async fn cancel(
    config: &ClientConfig,
    preorder: &str,
    product: &str,
) -> Result<(), CommandError> {
    let preorder_id = PreorderId::parse(preorder)?;
    let product_id = ProductId::parse(product)?;
    let cache = open_cache(config).await?;

    cache.cancel(&preorder_id, &product_id).await.map_err(|e| {
        warn!(reason = %e.user_message(), "Cancellation not confirmed");
        CommandError::from(e)
    })?;

    log_status(&product_id, &cache.get_status(&product_id));
    Ok(())
}

/// Record a pre-order optimistically, then confirm it with the backend.
///
/// # Errors
///
/// Returns an error if arguments are invalid or the session is signed out.
pub async fn mark_active(
    config: &ClientConfig,
    product: &str,
    preorder: &str,
    status: Option<&str>,
) -> Result<(), CommandError> {
    let product_id = ProductId::parse(product)?;
    let preorder_id = PreorderId::parse(preorder)?;
    let cache = open_cache(config).await?;

    if !cache.is_authenticated() {
        return Err(CommandError::NotSignedIn);
    }

    let confirmed = cache
        .record_created(&product_id, preorder_id, status.map(PreorderPhase::from))
        .await;
    log_status(&product_id, &confirmed);
    Ok(())
}

/// Print change notifications for the given products until interrupted.
///
/// Every `every_secs` the cache is refreshed if it is older than the
/// configured refresh threshold.
///
/// # Errors
///
/// Returns an error if arguments or configuration are invalid.
pub async fn watch(
    config: &ClientConfig,
    products: &[String],
    every_secs: u64,
) -> Result<(), CommandError> {
    let products = parse_products(products)?;
    let cache = Arc::new(open_cache(config).await?);
    let mut changes = cache.subscribe();

    cache.reconcile(products.iter().cloned()).await;
    for product_id in &products {
        log_status(product_id, &cache.get_status(product_id));
    }

    let mut ticker = tokio::time::interval(Duration::from_secs(every_secs.max(1)));
    ticker.tick().await;

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                cache.refresh_if_stale(products.iter().cloned(), config.refresh_after).await;
            }
            change = changes.recv() => match change {
                Ok(change) => {
                    info!(source = ?change.source, "Pre-order status changed");
                    log_status(&change.product_id, &change.state);
                }
                Err(RecvError::Lagged(skipped)) => warn!(skipped, "Missed change notifications"),
                Err(RecvError::Closed) => break,
            },
            _ = tokio::signal::ctrl_c() => {
                info!("Stopping watch");
                break;
            }
        }
    }
    Ok(())
}
