//! CLI command implementations.

pub mod preorder;
pub mod snapshot;

use techshop_core::IdError;
use techshop_storefront::api::ApiError;
use techshop_storefront::storage::StorageError;
use techshop_storefront::{CancelError, ConfigError};
use thiserror::Error;

/// Errors that can occur while running a command.
#[derive(Debug, Error)]
pub enum CommandError {
    /// Configuration could not be loaded.
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Backend client could not be built.
    #[error("Backend error: {0}")]
    Api(#[from] ApiError),

    /// Cancellation was not confirmed.
    #[error("Cancellation failed: {0}")]
    Cancel(#[from] CancelError),

    /// Snapshot storage failed.
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    /// An ID argument was invalid.
    #[error("Invalid ID: {0}")]
    InvalidId(#[from] IdError),

    /// The backend did not recognize the session.
    #[error("Not signed in; set TECHSHOP_SESSION_COOKIE")]
    NotSignedIn,
}
