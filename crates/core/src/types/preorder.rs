//! Pre-order status values and change notifications.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::id::{PreorderId, ProductId};
use super::status::PreorderPhase;

/// Whether a product has an active pre-order for the current user.
///
/// A status with `has_preorder == true` always carries a `preorder_id`;
/// the constructors and `Deserialize` both enforce this. Serialized in the
/// camelCase shape used by the persisted snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase", try_from = "RawPreorderStatus")]
pub struct PreorderStatus {
    has_preorder: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    preorder_id: Option<PreorderId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    status: Option<PreorderPhase>,
}

/// Error for a status claiming an active pre-order without naming it.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("active pre-order status is missing its preorder id")]
pub struct MissingPreorderId;

impl PreorderStatus {
    /// No active pre-order. Equivalent to an absent cache entry.
    #[must_use]
    pub const fn none() -> Self {
        Self {
            has_preorder: false,
            preorder_id: None,
            status: None,
        }
    }

    /// An active pre-order.
    #[must_use]
    pub const fn active(preorder_id: PreorderId, status: Option<PreorderPhase>) -> Self {
        Self {
            has_preorder: true,
            preorder_id: Some(preorder_id),
            status,
        }
    }

    /// Build a status from loose parts, as received from the backend.
    ///
    /// An inactive status drops any id or phase the server sent along.
    ///
    /// # Errors
    ///
    /// Returns `MissingPreorderId` if `has_preorder` is set without an id.
    pub fn from_parts(
        has_preorder: bool,
        preorder_id: Option<PreorderId>,
        status: Option<PreorderPhase>,
    ) -> Result<Self, MissingPreorderId> {
        if !has_preorder {
            return Ok(Self::none());
        }
        preorder_id
            .map(|id| Self::active(id, status))
            .ok_or(MissingPreorderId)
    }

    #[must_use]
    pub const fn has_preorder(&self) -> bool {
        self.has_preorder
    }

    #[must_use]
    pub const fn preorder_id(&self) -> Option<&PreorderId> {
        self.preorder_id.as_ref()
    }

    #[must_use]
    pub const fn status(&self) -> Option<&PreorderPhase> {
        self.status.as_ref()
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawPreorderStatus {
    #[serde(default)]
    has_preorder: bool,
    #[serde(default)]
    preorder_id: Option<PreorderId>,
    #[serde(default)]
    status: Option<PreorderPhase>,
}

impl TryFrom<RawPreorderStatus> for PreorderStatus {
    type Error = MissingPreorderId;

    fn try_from(raw: RawPreorderStatus) -> Result<Self, Self::Error> {
        Self::from_parts(raw.has_preorder, raw.preorder_id, raw.status)
    }
}

/// What caused a cached status to change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeSource {
    /// Server reconciliation replaced the local belief.
    Reconciled,
    /// Optimistic local update after creating a pre-order.
    Optimistic,
    /// A pre-order was cancelled through this cache.
    Cancelled,
    /// Another cache instance wrote the shared snapshot.
    Storage,
    /// The session is not authenticated, so the entry was dropped.
    SignedOut,
}

/// Notification emitted whenever a product's cached status changes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PreorderChange {
    pub product_id: ProductId,
    pub state: PreorderStatus,
    pub source: ChangeSource,
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn pid(s: &str) -> PreorderId {
        PreorderId::parse(s).unwrap()
    }

    #[test]
    fn test_default_is_none() {
        assert_eq!(PreorderStatus::default(), PreorderStatus::none());
        assert!(!PreorderStatus::none().has_preorder());
    }

    #[test]
    fn test_from_parts_inactive_drops_details() {
        let status =
            PreorderStatus::from_parts(false, Some(pid("p1")), Some(PreorderPhase::Pending))
                .unwrap();
        assert_eq!(status, PreorderStatus::none());
    }

    #[test]
    fn test_from_parts_active_requires_id() {
        assert_eq!(
            PreorderStatus::from_parts(true, None, None),
            Err(MissingPreorderId)
        );
    }

    #[test]
    fn test_snapshot_shape_is_camel_case() {
        let status = PreorderStatus::active(pid("po-9"), Some(PreorderPhase::Pending));
        let json = serde_json::to_value(&status).unwrap();
        assert_eq!(
            json,
            serde_json::json!({"hasPreorder": true, "preorderId": "po-9", "status": "pending"})
        );
    }

    #[test]
    fn test_deserialize_rejects_active_without_id() {
        let result = serde_json::from_str::<PreorderStatus>(r#"{"hasPreorder": true}"#);
        assert!(result.is_err());
    }

    #[test]
    fn test_deserialize_numeric_preorder_id() {
        let status: PreorderStatus =
            serde_json::from_str(r#"{"hasPreorder": true, "preorderId": 12}"#).unwrap();
        assert_eq!(status.preorder_id(), Some(&pid("12")));
        assert_eq!(status.status(), None);
    }
}
