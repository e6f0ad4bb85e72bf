//! Shop backend JSON API.
//!
//! # Architecture
//!
//! - The backend is the source of truth for pre-order state
//! - `PreorderApi` is the seam the state cache talks to; `HttpPreorderApi`
//!   implements it with `reqwest`, tests implement it with scripted fakes
//!
//! # Endpoints
//!
//! - `GET  api/user/current` - identity probe
//! - `GET  api/preorders/status?product_ids=1,2,3` - batched status lookup
//! - `POST api/preorders/{id}/cancel` - cancel a pre-order
//! - `POST api/cart/remove-preorder` - drop the cart line holding a pre-order

mod client;
pub mod types;

use std::collections::HashMap;
use std::future::Future;

pub use client::HttpPreorderApi;
pub use types::CurrentUser;

use techshop_core::{PreorderId, PreorderStatus, ProductId};
use thiserror::Error;

/// Errors that can occur when talking to the shop backend.
#[derive(Debug, Error)]
pub enum ApiError {
    /// HTTP request failed.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Backend answered with a non-success status and no usable body.
    #[error("API error: {status} - {message}")]
    Status { status: u16, message: String },

    /// Session is missing or expired.
    #[error("Not authenticated")]
    Unauthorized,

    /// Rate limited by the backend.
    #[error("Rate limited, retry after {0} seconds")]
    RateLimited(u64),

    /// Well-formed response with `success: false`.
    #[error("Rejected by server: {0}")]
    Rejected(String),

    /// JSON parsing failed.
    #[error("JSON parse error: {0}")]
    Parse(#[from] serde_json::Error),

    /// Response parsed but is missing expected fields.
    #[error("Malformed response: {0}")]
    Malformed(String),

    /// Endpoint URL could not be built from the configured base URL.
    #[error("Invalid endpoint: {0}")]
    InvalidEndpoint(String),
}

/// Backend operations the pre-order cache depends on.
pub trait PreorderApi: Send + Sync {
    /// Probe who the current session belongs to.
    fn current_user(&self) -> impl Future<Output = Result<CurrentUser, ApiError>> + Send;

    /// Look up pre-order status for a batch of products in one request.
    ///
    /// Products the backend leaves out of its answer are absent from the map.
    fn preorder_status(
        &self,
        product_ids: &[ProductId],
    ) -> impl Future<Output = Result<HashMap<ProductId, PreorderStatus>, ApiError>> + Send;

    /// Cancel a pre-order.
    fn cancel_preorder(
        &self,
        preorder_id: &PreorderId,
    ) -> impl Future<Output = Result<(), ApiError>> + Send;

    /// Remove the cart line item that references a pre-order.
    fn remove_preorder_from_cart(
        &self,
        preorder_id: &PreorderId,
    ) -> impl Future<Output = Result<(), ApiError>> + Send;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_api_error_display() {
        let err = ApiError::Status {
            status: 502,
            message: "Bad Gateway".to_string(),
        };
        assert_eq!(err.to_string(), "API error: 502 - Bad Gateway");
    }

    #[test]
    fn test_rate_limited_error() {
        let err = ApiError::RateLimited(60);
        assert_eq!(err.to_string(), "Rate limited, retry after 60 seconds");
    }

    #[test]
    fn test_rejected_error() {
        let err = ApiError::Rejected("Pre-order not found".to_string());
        assert_eq!(err.to_string(), "Rejected by server: Pre-order not found");
    }
}
