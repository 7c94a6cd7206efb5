//! Route definitions and router construction.

use axum::extract::Request;
use axum::http::{header, StatusCode};
use axum::middleware::{self, Next};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, head};
use axum::Router;

use crate::handlers;
use crate::state::{AppState, PRODUCT_TOKEN};

/// Rejects any request whose `User-Agent` begins with our own product
/// token, preventing loopback proxy chains (spec.md §6).
async fn reject_loopback_ua(req: Request, next: Next) -> Response {
    let is_loopback = req
        .headers()
        .get(header::USER_AGENT)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|ua| ua.starts_with(PRODUCT_TOKEN));

    if is_loopback {
        return StatusCode::FORBIDDEN.into_response();
    }
    next.run(req).await
}

#[must_use]
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/*path", get(handlers::get_file).head(handlers::head_bg))
        .layer(middleware::from_fn(reject_loopback_ua))
        .with_state(state)
}
