//! The HTTP adapter: axum routes serving a [`pkgmirror_cache::CacheRegistry`]
//! over HTTP, per spec.md §6.

mod error;
mod handlers;
mod routes;
mod state;
mod stream;

pub use routes::build_router;
pub use state::{AppState, PRODUCT_TOKEN};
