//! Techshop Core - Shared types library.
//!
//! This crate provides common types used across all Techshop components:
//! - `storefront` - Pre-order client: API access, snapshot storage, state cache
//! - `cli` - Command-line tools for inspecting and driving the cache
//!
//! # Architecture
//!
//! The core crate contains only types - no I/O, no storage access,
//! no HTTP clients. This keeps it lightweight and allows it to be used anywhere.
//!
//! # Modules
//!
//! - [`types`] - Normalized IDs, pre-order statuses and change notifications

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod types;

pub use types::*;
