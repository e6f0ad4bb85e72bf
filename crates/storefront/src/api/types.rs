//! Wire types for the shop backend's JSON API.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use techshop_core::{PreorderId, PreorderPhase, PreorderStatus, ProductId, UserId};

use super::ApiError;

/// Response from the identity probe.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct CurrentUser {
    pub authenticated: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<UserId>,
}

impl CurrentUser {
    /// An anonymous visitor.
    #[must_use]
    pub const fn anonymous() -> Self {
        Self {
            authenticated: false,
            user_id: None,
        }
    }
}

/// Response from the batched pre-order status endpoint.
#[derive(Debug, Deserialize, Serialize)]
pub struct StatusResponse {
    pub success: bool,
    #[serde(default)]
    pub preorder_status: Option<HashMap<String, WireStatus>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// One product's entry in `StatusResponse::preorder_status`.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct WireStatus {
    pub has_preorder: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub preorder_id: Option<PreorderId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
}

/// Generic `{success, error?}` acknowledgement used by mutations.
#[derive(Debug, Deserialize, Serialize)]
pub struct AckResponse {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Body of the cart line removal request.
#[derive(Debug, Serialize, Deserialize)]
pub struct RemovePreorderRequest {
    pub preorder_id: PreorderId,
}

impl StatusResponse {
    /// Convert into typed statuses keyed by product.
    ///
    /// # Errors
    ///
    /// Returns `ApiError::Rejected` when `success` is false, and
    /// `ApiError::Malformed` when the status map is missing, a key is not a
    /// valid product ID, or an active entry has no pre-order ID.
    pub fn into_statuses(self) -> Result<HashMap<ProductId, PreorderStatus>, ApiError> {
        if !self.success {
            return Err(ApiError::Rejected(
                self.error
                    .unwrap_or_else(|| "status request rejected".to_string()),
            ));
        }

        let Some(entries) = self.preorder_status else {
            return Err(ApiError::Malformed(
                "missing preorder_status in successful response".to_string(),
            ));
        };

        entries
            .into_iter()
            .map(|(key, wire)| {
                let product_id = ProductId::parse(&key)
                    .map_err(|e| ApiError::Malformed(format!("product key '{key}': {e}")))?;
                let status = PreorderStatus::from_parts(
                    wire.has_preorder,
                    wire.preorder_id,
                    wire.status.map(PreorderPhase::from),
                )
                .map_err(|e| ApiError::Malformed(format!("product {product_id}: {e}")))?;
                Ok((product_id, status))
            })
            .collect()
    }
}

impl AckResponse {
    /// Turn a `success: false` acknowledgement into an error.
    ///
    /// # Errors
    ///
    /// Returns `ApiError::Rejected` with the server's reason.
    pub fn into_result(self, action: &str) -> Result<(), ApiError> {
        if self.success {
            Ok(())
        } else {
            Err(ApiError::Rejected(
                self.error.unwrap_or_else(|| format!("{action} rejected")),
            ))
        }
    }
}
