//! Shared state handed to every axum handler.

use std::sync::Arc;

use pkgmirror_cache::CacheRegistry;
use pkgmirror_router::Router;
use reqwest::Client;

/// The product token sent as our `User-Agent` on upstream requests and
/// checked against incoming requests to reject loopbacks (spec.md §6).
pub const PRODUCT_TOKEN: &str = "pkgmirror/0.1";

#[derive(Clone)]
pub struct AppState {
    pub cache: Arc<CacheRegistry>,
    pub router: Arc<Router>,
    pub http_client: Client,
}

impl AppState {
    #[must_use]
    pub fn new(cache: Arc<CacheRegistry>, router: Arc<Router>, http_client: Client) -> Self {
        Self {
            cache,
            router,
            http_client,
        }
    }
}
