//! Shared request state, page errors and response middleware

use axum::{
    extract::Request,
    http::{header, HeaderValue, StatusCode},
    middleware::Next,
    response::{Html, IntoResponse, Response},
};
use std::sync::Arc;

use crate::services::{SessionService, SessionServiceError};
use crate::views::{PageRenderer, ViewError, GENERIC_ERROR_PAGE};

/// Application state containing shared services
#[derive(Clone)]
pub struct AppState {
    pub session_service: Arc<SessionService>,
    pub renderer: Arc<PageRenderer>,
    pub cookie_name: Arc<str>,
}

impl AppState {
    pub fn new(
        session_service: Arc<SessionService>,
        renderer: Arc<PageRenderer>,
        cookie_name: impl Into<Arc<str>>,
    ) -> Self {
        Self {
            session_service,
            renderer,
            cookie_name: cookie_name.into(),
        }
    }

    /// Cookie lifetime, equal to the session timeout
    pub fn cookie_max_age(&self) -> u64 {
        self.session_service.timeout().as_secs()
    }
}

/// Anything that stops a page from being served
#[derive(Debug, thiserror::Error)]
pub enum PageError {
    #[error(transparent)]
    Session(#[from] SessionServiceError),

    #[error(transparent)]
    View(#[from] ViewError),
}

impl IntoResponse for PageError {
    fn into_response(self) -> Response {
        // Details stay in the log; the client gets a fixed page
        tracing::error!("Failed to serve page: {}", self);
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            Html(GENERIC_ERROR_PAGE),
        )
            .into_response()
    }
}

/// Build Cache-Control header for per-session pages
pub fn cache_control_no_cache() -> HeaderValue {
    HeaderValue::from_static("no-cache, no-store, must-revalidate")
}

/// Middleware stopping browsers and proxies from caching session pages
pub async fn add_no_cache_headers(request: Request, next: Next) -> Response {
    let mut response = next.run(request).await;
    response
        .headers_mut()
        .insert(header::CACHE_CONTROL, cache_control_no_cache());
    response
}
