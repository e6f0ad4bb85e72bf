//! Pre-order state synchronization.
//!
//! [`PreorderStateCache`] keeps the local view of which products have an
//! active pre-order, reconciles it against the backend on demand, persists it
//! as a short-lived snapshot, and fans changes out to subscribers.
//!
//! # Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use techshop_storefront::{api::HttpPreorderApi, preorder::PreorderStateCache};
//! use techshop_storefront::storage::FileSnapshotStore;
//!
//! let api = HttpPreorderApi::new(&config.backend)?;
//! let store = FileSnapshotStore::new(&config.snapshot_dir);
//! let cache = Arc::new(PreorderStateCache::new(api, store, config.cache));
//! cache.initialize().await;
//!
//! let statuses = cache.reconcile(product_ids).await;
//! if let Err(e) = cache.cancel(&preorder_id, &product_id).await {
//!     show_error(e.user_message());
//! }
//! ```

mod cache;
mod error;

pub use cache::PreorderStateCache;
pub use error::CancelError;
