//! Techshop Storefront library.
//!
//! Client-side pre-order support for the storefront: configuration, the
//! backend API client, snapshot storage and the pre-order state cache.

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod api;
pub mod config;
pub mod preorder;
pub mod storage;

pub use config::{BackendConfig, CacheOptions, ClientConfig, ConfigError};
pub use preorder::{CancelError, PreorderStateCache};
