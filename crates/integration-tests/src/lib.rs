//! Integration tests for Techshop.
//!
//! # Running Tests
//!
//! ```bash
//! cargo test -p techshop-integration-tests
//! ```
//!
//! Tests start [`FakeBackend`], an in-process `axum` server that speaks the
//! shop backend's pre-order API, and drive the real `reqwest` client and
//! state cache against it. No external services are needed.

#![allow(clippy::missing_panics_doc, clippy::unwrap_used)]

use std::collections::{HashMap, HashSet};
use std::net::SocketAddr;
use std::sync::{Arc, Mutex, MutexGuard};

use axum::extract::{Path, Query, State};
use axum::http::{HeaderMap, StatusCode, header};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use secrecy::SecretString;
use serde::Deserialize;
use serde_json::json;
use techshop_storefront::BackendConfig;
use tokio::task::JoinHandle;
use url::Url;

/// Session cookie the fake backend accepts as signed in.
pub const SESSION_COOKIE: &str = "sessionid=k3Jx9QvT2mWz";

/// A pre-order held by the fake backend.
#[derive(Debug, Clone)]
pub struct FakePreorder {
    pub preorder_id: String,
    pub status: String,
}

#[derive(Default)]
struct Inner {
    preorders: HashMap<String, FakePreorder>,
    cart: HashSet<String>,
    cancel_rejection: Option<String>,
    status_broken: bool,
    cart_broken: bool,
    requests: Vec<String>,
}

/// Mutable backend state shared with the running server.
#[derive(Clone, Default)]
pub struct BackendState {
    inner: Arc<Mutex<Inner>>,
}

impl BackendState {
    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap()
    }

    /// Create a pre-order for `product_id` and put it in the cart.
    pub fn add_preorder(&self, product_id: &str, preorder_id: &str, status: &str) {
        let mut inner = self.lock();
        inner.preorders.insert(
            product_id.to_string(),
            FakePreorder {
                preorder_id: preorder_id.to_string(),
                status: status.to_string(),
            },
        );
        inner.cart.insert(preorder_id.to_string());
    }

    /// Make cancellations fail with `reason`.
    pub fn reject_cancellations(&self, reason: &str) {
        self.lock().cancel_rejection = Some(reason.to_string());
    }

    /// Make the status endpoint answer 500.
    pub fn break_status_endpoint(&self) {
        self.lock().status_broken = true;
    }

    /// Make cart removal answer `success: false`.
    pub fn break_cart(&self) {
        self.lock().cart_broken = true;
    }

    #[must_use]
    pub fn has_preorder(&self, product_id: &str) -> bool {
        self.lock().preorders.contains_key(product_id)
    }

    #[must_use]
    pub fn cart_contains(&self, preorder_id: &str) -> bool {
        self.lock().cart.contains(preorder_id)
    }

    /// Requests seen so far, as `METHOD path`.
    #[must_use]
    pub fn requests(&self) -> Vec<String> {
        self.lock().requests.clone()
    }

    /// Number of status lookups served.
    #[must_use]
    pub fn status_requests(&self) -> usize {
        self.requests()
            .iter()
            .filter(|r| r.starts_with("GET /api/preorders/status"))
            .count()
    }

    fn record(&self, request: String) {
        self.lock().requests.push(request);
    }
}

/// A running fake backend.
pub struct FakeBackend {
    pub addr: SocketAddr,
    pub state: BackendState,
    server: JoinHandle<()>,
}

impl FakeBackend {
    /// Start a fake backend on an ephemeral port.
    pub async fn start() -> Self {
        let state = BackendState::default();
        let app = Router::new()
            .route("/api/user/current", get(current_user))
            .route("/api/preorders/status", get(preorder_status))
            .route("/api/preorders/{id}/cancel", post(cancel_preorder))
            .route("/api/cart/remove-preorder", post(remove_from_cart))
            .with_state(state.clone());

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let server = tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self {
            addr,
            state,
            server,
        }
    }

    #[must_use]
    pub fn base_url(&self) -> Url {
        Url::parse(&format!("http://{}/", self.addr)).unwrap()
    }

    /// Backend settings for an anonymous visitor.
    #[must_use]
    pub fn anonymous_config(&self) -> BackendConfig {
        BackendConfig::new(self.base_url())
    }

    /// Backend settings for the signed-in customer.
    #[must_use]
    pub fn signed_in_config(&self) -> BackendConfig {
        BackendConfig {
            session_cookie: Some(SecretString::from(SESSION_COOKIE)),
            ..self.anonymous_config()
        }
    }
}

impl Drop for FakeBackend {
    fn drop(&mut self) {
        self.server.abort();
    }
}

// =============================================================================
// Handlers
// =============================================================================

fn signed_in(headers: &HeaderMap) -> bool {
    headers
        .get(header::COOKIE)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|cookies| cookies.split(';').any(|c| c.trim() == SESSION_COOKIE))
}

fn unauthorized() -> Response {
    (
        StatusCode::UNAUTHORIZED,
        Json(json!({"success": false, "error": "Login required"})),
    )
        .into_response()
}

async fn current_user(State(state): State<BackendState>, headers: HeaderMap) -> Response {
    state.record("GET /api/user/current".to_string());
    if !signed_in(&headers) {
        return unauthorized();
    }
    Json(json!({"authenticated": true, "user_id": 7})).into_response()
}

async fn preorder_status(
    State(state): State<BackendState>,
    headers: HeaderMap,
    Query(query): Query<HashMap<String, String>>,
) -> Response {
    let ids = query.get("product_ids").cloned().unwrap_or_default();
    state.record(format!("GET /api/preorders/status?product_ids={ids}"));

    if !signed_in(&headers) {
        return unauthorized();
    }
    let inner = state.lock();
    if inner.status_broken {
        return (StatusCode::INTERNAL_SERVER_ERROR, "database unavailable").into_response();
    }

    let statuses: serde_json::Map<String, serde_json::Value> = ids
        .split(',')
        .filter(|id| !id.is_empty())
        .map(|id| {
            let entry = inner.preorders.get(id).map_or_else(
                || json!({"has_preorder": false}),
                |p| {
                    json!({
                        "has_preorder": true,
                        "preorder_id": p.preorder_id,
                        "status": p.status,
                    })
                },
            );
            (id.to_string(), entry)
        })
        .collect();

    Json(json!({"success": true, "preorder_status": statuses})).into_response()
}

async fn cancel_preorder(
    State(state): State<BackendState>,
    headers: HeaderMap,
    Path(preorder_id): Path<String>,
) -> Response {
    state.record(format!("POST /api/preorders/{preorder_id}/cancel"));

    if !signed_in(&headers) {
        return unauthorized();
    }
    let mut inner = state.lock();
    if let Some(reason) = inner.cancel_rejection.clone() {
        return (
            StatusCode::BAD_REQUEST,
            Json(json!({"success": false, "error": reason})),
        )
            .into_response();
    }

    let before = inner.preorders.len();
    inner.preorders.retain(|_, p| p.preorder_id != preorder_id);
    if inner.preorders.len() == before {
        return Json(json!({"success": false, "error": "Pre-order not found"})).into_response();
    }
    Json(json!({"success": true})).into_response()
}

#[derive(Deserialize)]
struct RemoveRequest {
    preorder_id: String,
}

async fn remove_from_cart(
    State(state): State<BackendState>,
    headers: HeaderMap,
    Json(body): Json<RemoveRequest>,
) -> Response {
    state.record("POST /api/cart/remove-preorder".to_string());

    if !signed_in(&headers) {
        return unauthorized();
    }
    let mut inner = state.lock();
    if inner.cart_broken {
        return Json(json!({"success": false, "error": "Cart is locked"})).into_response();
    }
    inner.cart.remove(&body.preorder_id);
    Json(json!({"success": true})).into_response()
}
