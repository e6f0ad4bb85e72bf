//! `reqwest` implementation of `PreorderApi`.

use std::collections::HashMap;

use reqwest::StatusCode;
use reqwest::header::{COOKIE, HeaderMap, HeaderValue};
use serde::de::DeserializeOwned;
use techshop_core::{PreorderId, PreorderStatus, ProductId};
use tracing::{debug, instrument};
use url::Url;

use super::types::{AckResponse, CurrentUser, RemovePreorderRequest, StatusResponse};
use super::{ApiError, PreorderApi};
use crate::config::BackendConfig;

/// Longest response body excerpt written to logs.
const LOG_BODY_LIMIT: usize = 500;

/// HTTP client for the shop backend.
#[derive(Clone)]
pub struct HttpPreorderApi {
    client: reqwest::Client,
    base_url: Url,
}

impl HttpPreorderApi {
    /// Create a new backend client.
    ///
    /// The session cookie, if configured, is attached to every request.
    ///
    /// # Errors
    ///
    /// Returns error if the cookie is not a valid header value or the HTTP
    /// client fails to build.
    pub fn new(config: &BackendConfig) -> Result<Self, ApiError> {
        let mut headers = HeaderMap::new();

        if let Some(cookie) = config.cookie_header() {
            let mut value = HeaderValue::from_str(cookie)
                .map_err(|e| ApiError::InvalidEndpoint(format!("Invalid session cookie: {e}")))?;
            value.set_sensitive(true);
            headers.insert(COOKIE, value);
        }

        let client = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(config.timeout)
            .build()?;

        Ok(Self {
            client,
            base_url: config.base_url.clone(),
        })
    }

    /// Build an endpoint URL below the base URL, percent-encoding each segment.
    fn endpoint(&self, segments: &[&str]) -> Result<Url, ApiError> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|()| ApiError::InvalidEndpoint(self.base_url.to_string()))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    /// Check the status code and decode a JSON body.
    ///
    /// Non-success responses that still carry `{success: false, error}` are
    /// reported as `Rejected` so the server's reason reaches the caller.
    async fn read_json<T: DeserializeOwned>(response: reqwest::Response) -> Result<T, ApiError> {
        let status = response.status();

        if status == StatusCode::TOO_MANY_REQUESTS {
            let retry_after = response
                .headers()
                .get("Retry-After")
                .and_then(|v| v.to_str().ok())
                .and_then(|s| s.parse::<u64>().ok())
                .unwrap_or(1);
            return Err(ApiError::RateLimited(retry_after));
        }

        if status == StatusCode::UNAUTHORIZED {
            return Err(ApiError::Unauthorized);
        }

        let body = response.text().await?;

        if !status.is_success() {
            tracing::error!(
                status = %status,
                body = %excerpt(&body),
                "Backend returned non-success status"
            );
            if let Ok(AckResponse {
                error: Some(reason),
                ..
            }) = serde_json::from_str::<AckResponse>(&body)
            {
                return Err(ApiError::Rejected(reason));
            }
            return Err(ApiError::Status {
                status: status.as_u16(),
                message: body.chars().take(200).collect(),
            });
        }

        serde_json::from_str(&body).map_err(|e| {
            tracing::error!(
                error = %e,
                body = %excerpt(&body),
                "Failed to parse backend response"
            );
            ApiError::Parse(e)
        })
    }
}

impl PreorderApi for HttpPreorderApi {
    #[instrument(skip(self))]
    async fn current_user(&self) -> Result<CurrentUser, ApiError> {
        let url = self.endpoint(&["api", "user", "current"])?;
        let response = self.client.get(url).send().await?;

        match Self::read_json::<CurrentUser>(response).await {
            Err(ApiError::Unauthorized) => Ok(CurrentUser::anonymous()),
            other => other,
        }
    }

    #[instrument(skip(self, product_ids), fields(count = product_ids.len()))]
    async fn preorder_status(
        &self,
        product_ids: &[ProductId],
    ) -> Result<HashMap<ProductId, PreorderStatus>, ApiError> {
        let joined = product_ids
            .iter()
            .map(ProductId::as_str)
            .collect::<Vec<_>>()
            .join(",");

        let mut url = self.endpoint(&["api", "preorders", "status"])?;
        url.query_pairs_mut().append_pair("product_ids", &joined);

        let response = self.client.get(url).send().await?;
        let statuses = Self::read_json::<StatusResponse>(response)
            .await?
            .into_statuses()?;

        debug!(returned = statuses.len(), "Fetched pre-order statuses");
        Ok(statuses)
    }

    #[instrument(skip(self), fields(preorder_id = %preorder_id))]
    async fn cancel_preorder(&self, preorder_id: &PreorderId) -> Result<(), ApiError> {
        let url = self.endpoint(&["api", "preorders", preorder_id.as_str(), "cancel"])?;
        let response = self.client.post(url).send().await?;

        Self::read_json::<AckResponse>(response)
            .await?
            .into_result("cancel")
    }

    #[instrument(skip(self), fields(preorder_id = %preorder_id))]
    async fn remove_preorder_from_cart(&self, preorder_id: &PreorderId) -> Result<(), ApiError> {
        let url = self.endpoint(&["api", "cart", "remove-preorder"])?;
        let body = RemovePreorderRequest {
            preorder_id: preorder_id.clone(),
        };
        let response = self.client.post(url).json(&body).send().await?;

        Self::read_json::<AckResponse>(response)
            .await?
            .into_result("cart removal")
    }
}

fn excerpt(body: &str) -> String {
    body.chars().take(LOG_BODY_LIMIT).collect()
}
