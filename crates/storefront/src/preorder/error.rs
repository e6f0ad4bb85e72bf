//! Errors surfaced by pre-order mutations.

use thiserror::Error;

use crate::api::ApiError;

/// Why a pre-order cancellation failed. Local state is untouched in every case.
#[derive(Debug, Error)]
pub enum CancelError {
    /// No signed-in session, so there is nothing to cancel.
    #[error("Not signed in")]
    NotAuthenticated,

    /// The backend could not be reached or answered with a transport-level failure.
    #[error("Network error: {0}")]
    Network(#[source] ApiError),

    /// The backend refused the cancellation; carries its reason.
    #[error("{0}")]
    Rejected(String),

    /// The backend's answer could not be understood.
    #[error("Malformed response: {0}")]
    Malformed(#[source] ApiError),
}

impl From<ApiError> for CancelError {
    fn from(err: ApiError) -> Self {
        match err {
            ApiError::Unauthorized => Self::NotAuthenticated,
            ApiError::Rejected(reason) => Self::Rejected(reason),
            ApiError::Parse(_) | ApiError::Malformed(_) => Self::Malformed(err),
            ApiError::Http(_)
            | ApiError::Status { .. }
            | ApiError::RateLimited(_)
            | ApiError::InvalidEndpoint(_) => Self::Network(err),
        }
    }
}

impl CancelError {
    /// Message suitable for showing to the customer.
    #[must_use]
    pub fn user_message(&self) -> String {
        match self {
            Self::NotAuthenticated => "Please sign in to manage your pre-orders.".to_string(),
            Self::Rejected(reason) => reason.clone(),
            Self::Network(_) | Self::Malformed(_) => {
                "Could not cancel the pre-order right now. Please try again.".to_string()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rejected_keeps_server_reason() {
        let err = CancelError::from(ApiError::Rejected("Already fulfilled".to_string()));
        assert!(matches!(&err, CancelError::Rejected(r) if r == "Already fulfilled"));
        assert_eq!(err.to_string(), "Already fulfilled");
        assert_eq!(err.user_message(), "Already fulfilled");
    }

    #[test]
    fn test_unauthorized_maps_to_not_authenticated() {
        assert!(matches!(
            CancelError::from(ApiError::Unauthorized),
            CancelError::NotAuthenticated
        ));
    }

    #[test]
    fn test_transport_failures_map_to_network() {
        let err = CancelError::from(ApiError::Status {
            status: 503,
            message: "unavailable".to_string(),
        });
        assert!(matches!(err, CancelError::Network(_)));
        assert!(err.user_message().contains("try again"));
    }

    #[test]
    fn test_malformed_maps_to_malformed() {
        let err = CancelError::from(ApiError::Malformed("missing success".to_string()));
        assert!(matches!(err, CancelError::Malformed(_)));
    }
}
