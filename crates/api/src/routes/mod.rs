//! HTTP route handlers for the shop API.
//!
//! # Route Structure
//!
//! ```text
//! GET  /health                                  - Liveness
//! GET  /health/ready                            - Readiness (database ping)
//!
//! # Accounts (/api/v1/users)
//! POST /register                                - Register (rate limited)
//! POST /login                                   - Log in (rate limited)
//! POST /logout                                  - Log out
//! GET  /profile, PUT /profile                   - Own profile
//! GET  /                                        - All users (admin)
//!
//! # Addresses (/api/v1/address)
//! GET  /provinces                               - Provinces
//! GET  /province/{code}                         - One province
//! GET  /province/{code}/districts               - Districts of a province
//! GET  /district/{code}                         - One district
//! GET  /district/{code}/sub_districts           - Sub-districts of a district
//! GET  /sub_district/{code}                     - One sub-district
//! GET  /, POST /                                - Own addresses
//! GET|PUT|DELETE /{id}                          - One own address
//!
//! # Catalog (/api/v1/snacks)
//! GET  /                                        - Listing (page, sort, filter)
//! GET  /types                                   - Distinct types
//! GET  /{id}                                    - Snack with reviews
//! GET  /{id}/image                              - Image bytes
//! POST /, PUT /{id}, DELETE /{id}               - Manage snacks (admin)
//! GET  /{id}/reviews, POST /{id}/reviews        - Reviews
//!
//! # Cart (/api/v1/cart, rate limited)
//! GET  /, POST /, PUT /                         - View, add, change quantity
//! DELETE /{item_id}                             - Remove a line
//!
//! # Orders (/api/v1/orders)
//! POST /confirm                                 - Cart to order
//! GET  /history                                 - Own orders
//! GET  /tracking/{tracking_id}                  - By tracking ID
//! GET  /{id}                                    - One order
//! GET  /, PUT /status, GET /revenue             - Management (admin)
//!
//! # Payments (/api/v1/payments)
//! POST /                                        - Upload proof (multipart)
//! GET  /{id}/proof                              - Proof bytes
//! ```

pub mod address;
pub mod cart;
pub mod extract;
pub mod health;
pub mod orders;
pub mod payments;
pub mod snacks;
pub mod users;

use axum::{
    Router,
    extract::{DefaultBodyLimit, Request},
    http::{HeaderValue, Method, header},
    routing::{get, post, put},
};
use serde::Deserialize;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::config::ApiConfig;
use crate::db::PageRequest;
use crate::error::AppError;
use crate::middleware::{
    api_rate_limiter, auth_rate_limiter, create_session_layer, request_id_middleware,
};
use crate::state::AppState;

/// Room for multipart boundaries and text fields on top of the file itself.
const MULTIPART_OVERHEAD: usize = 64 * 1024;

/// `?page=&page_size=` query string.
#[derive(Debug, Clone, Copy, Default, Deserialize)]
pub struct PageQuery {
    pub page: Option<u32>,
    pub page_size: Option<u32>,
}

impl PageQuery {
    /// Apply defaults and bounds.
    ///
    /// # Errors
    ///
    /// Returns `AppError::BadRequest` if `page_size` is outside 1..=100.
    pub fn into_request(self) -> Result<PageRequest, AppError> {
        let page_size = self.page_size.unwrap_or(PageRequest::DEFAULT_PAGE_SIZE);
        if !(1..=PageRequest::MAX_PAGE_SIZE).contains(&page_size) {
            return Err(AppError::BadRequest(format!(
                "page_size must be between 1 and {}",
                PageRequest::MAX_PAGE_SIZE
            )));
        }
        Ok(PageRequest {
            page: self.page.unwrap_or(0),
            page_size,
        })
    }
}

fn user_routes() -> Router<AppState> {
    let rate_limited = Router::new()
        .route("/register", post(users::register))
        .route("/login", post(users::login))
        .route_layer(auth_rate_limiter());

    Router::new()
        .route("/", get(users::list))
        .route("/logout", post(users::logout))
        .route("/profile", get(users::profile).put(users::update_profile))
        .merge(rate_limited)
}

fn address_routes() -> Router<AppState> {
    Router::new()
        .route("/provinces", get(address::provinces))
        .route("/province/{code}", get(address::province))
        .route("/province/{code}/districts", get(address::districts))
        .route("/district/{code}", get(address::district))
        .route("/district/{code}/sub_districts", get(address::sub_districts))
        .route("/sub_district/{code}", get(address::sub_district))
        .route("/", get(address::list).post(address::create))
        .route(
            "/{id}",
            get(address::show)
                .put(address::update)
                .delete(address::delete),
        )
}

fn snack_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(snacks::list).post(snacks::create))
        .route("/types", get(snacks::types))
        .route(
            "/{id}",
            get(snacks::show).put(snacks::update).delete(snacks::delete),
        )
        .route("/{id}/image", get(snacks::image))
        .route(
            "/{id}/reviews",
            get(snacks::reviews).post(snacks::add_review),
        )
}

fn cart_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(cart::show).post(cart::add).put(cart::update))
        .route("/{item_id}", axum::routing::delete(cart::remove))
        .route_layer(api_rate_limiter())
}

fn order_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(orders::list))
        .route("/confirm", post(orders::confirm))
        .route("/history", get(orders::history))
        .route("/status", put(orders::update_status))
        .route("/revenue", get(orders::revenue))
        .route("/tracking/{tracking_id}", get(orders::by_tracking))
        .route("/{id}", get(orders::show))
}

fn payment_routes() -> Router<AppState> {
    Router::new()
        .route("/", post(payments::submit))
        .route("/{id}/proof", get(payments::proof))
}

/// All `/api/v1` routes.
pub fn api_routes() -> Router<AppState> {
    Router::new()
        .nest("/users", user_routes())
        .nest("/address", address_routes())
        .nest("/snacks", snack_routes())
        .nest("/cart", cart_routes())
        .nest("/orders", order_routes())
        .nest("/payments", payment_routes())
}

fn cors_layer(config: &ApiConfig) -> CorsLayer {
    let origins: Vec<HeaderValue> = config
        .cors_origins
        .iter()
        .filter_map(|origin| match HeaderValue::from_str(origin) {
            Ok(value) => Some(value),
            Err(_) => {
                tracing::warn!(origin = %origin, "ignoring invalid CORS origin");
                None
            }
        })
        .collect();

    CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE])
        .allow_headers([header::CONTENT_TYPE])
        .allow_credentials(true)
}

/// Build the complete application with middleware.
pub fn app(state: AppState) -> Router {
    let session_layer = create_session_layer(state.pool(), state.config());
    let body_limit = state.config().max_upload_bytes() + MULTIPART_OVERHEAD;
    let cors = cors_layer(state.config());

    Router::new()
        .route("/health", get(health::health))
        .route("/health/ready", get(health::readiness))
        .nest("/api/v1", api_routes())
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(session_layer)
        .layer(cors)
        .layer(axum::middleware::from_fn(request_id_middleware))
        .layer(
            TraceLayer::new_for_http().make_span_with(|request: &Request| {
                tracing::info_span!(
                    "http_request",
                    method = %request.method(),
                    uri = %request.uri(),
                    request_id = tracing::field::Empty,
                    user_id = tracing::field::Empty,
                )
            }),
        )
        .with_state(state)
        // Sentry layers (outermost for full request coverage)
        .layer(sentry_tower::NewSentryLayer::new_from_top())
        .layer(sentry_tower::SentryHttpLayer::new().enable_transaction())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use axum::body::{Body, to_bytes};
    use axum::http::StatusCode;
    use sqlx::postgres::PgPoolOptions;
    use tower::ServiceExt;

    use super::*;
    use crate::config::tests::test_config;

    /// App over a pool that never connects; only routes that stay off the
    /// database can be exercised.
    fn offline_app() -> Router {
        let pool = PgPoolOptions::new()
            .connect_lazy("postgres://nobody@localhost:1/none")
            .unwrap();
        app(AppState::new(test_config(), pool))
    }

    async fn send(request: axum::http::Request<Body>) -> (StatusCode, Vec<u8>) {
        let response = offline_app().oneshot(request).await.unwrap();
        let status = response.status();
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, body.to_vec())
    }

    fn get_request(uri: &str) -> axum::http::Request<Body> {
        axum::http::Request::builder()
            .uri(uri)
            .header("x-forwarded-for", "198.51.100.1")
            .body(Body::empty())
            .unwrap()
    }

    #[test]
    fn test_page_query_defaults_and_bounds() {
        let page = PageQuery::default().into_request().unwrap();
        assert_eq!(page, PageRequest::default());

        let page = PageQuery {
            page: Some(2),
            page_size: Some(100),
        }
        .into_request()
        .unwrap();
        assert_eq!(page.offset(), 200);

        assert!(
            PageQuery {
                page: None,
                page_size: Some(0)
            }
            .into_request()
            .is_err()
        );
    }

    #[tokio::test]
    async fn test_health() {
        let (status, body) = send(get_request("/health")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, b"ok");
    }

    #[tokio::test]
    async fn test_cart_requires_login() {
        let (status, body) = send(get_request("/api/v1/cart")).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body, br#"{"error":"Unauthorized"}"#);
    }

    #[tokio::test]
    async fn test_admin_routes_require_login() {
        let (status, _) = send(get_request("/api/v1/orders/revenue")).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_bad_path_id_is_a_json_400() {
        let (status, body) = send(get_request("/api/v1/snacks/not-a-uuid")).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        let body: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert!(body["error"].is_string());
    }

    #[tokio::test]
    async fn test_response_carries_request_id() {
        let request = axum::http::Request::builder()
            .uri("/health")
            .header("x-request-id", "abc-123")
            .body(Body::empty())
            .unwrap();
        let response = offline_app().oneshot(request).await.unwrap();
        assert_eq!(response.headers()["x-request-id"], "abc-123");
    }
}
