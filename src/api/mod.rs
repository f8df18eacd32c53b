//! API layer - HTTP handlers and routing
//!
//! - `/` and `/state` serve the session pages over GET and POST
//! - `/health` answers `OK`

pub mod cookies;
pub mod middleware;
pub mod pages;
pub mod params;

use axum::{middleware as axum_middleware, routing::get, Router};
use tower_http::trace::TraceLayer;

pub use middleware::{cache_control_no_cache, AppState, PageError};
pub use params::PageRequest;

/// Build the application router
pub fn build_router(state: AppState) -> Router {
    let page_routes = Router::new()
        .route("/", get(pages::session_page).post(pages::session_page))
        .route("/state", get(pages::session_page).post(pages::session_page))
        .layer(axum_middleware::from_fn(middleware::add_no_cache_headers));

    Router::new()
        .merge(page_routes)
        .route("/health", get(pages::health))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

#[cfg(test)]
mod tests;
