//! Session page handler
//!
//! One handler serves both pages and every action. The session cookie is
//! written on each response so an active session keeps sliding forward,
//! except after `destroy`, which expires it.

use axum::{
    extract::State,
    http::{header, HeaderMap, HeaderValue},
    response::{Html, IntoResponse, Response},
};

use super::cookies::{expired_cookie, session_cookie};
use super::middleware::{AppState, PageError};
use super::params::PageRequest;
use crate::models::{SessionId, SessionRecord, SessionUpdate};
use crate::services::resolve_or_create_id;
use crate::views::{Page, MESSAGE_CLEARED, MESSAGE_SAVED};

/// Shown when no client address can be determined
const UNKNOWN_ADDR: &str = "Unknown";

/// What the client asked for via the `action` parameter
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Action {
    Save,
    Destroy,
    Clear,
    View,
}

impl Action {
    fn from_param(value: Option<&str>) -> Self {
        match value.map(str::trim) {
            Some("save") => Action::Save,
            Some("destroy") => Action::Destroy,
            Some("clear") => Action::Clear,
            _ => Action::View,
        }
    }
}

/// GET/POST `/` and `/state`
pub async fn session_page(
    State(state): State<AppState>,
    request: PageRequest,
) -> Result<Response, PageError> {
    let id = resolve_or_create_id(
        request.cookie_headers.iter().map(String::as_str),
        &state.cookie_name,
    )?;
    let action = Action::from_param(request.param("action"));
    let page = Page::from_param(request.param("page"));
    let remote_addr = request.remote_addr.as_deref().unwrap_or(UNKNOWN_ADDR);

    let service = &state.session_service;
    match action {
        Action::Destroy => {
            service.destroy(&id).await?;
            let html = state.renderer.render_destroyed()?;
            Ok(html_with_cookie(expired_cookie(&state.cookie_name), html))
        }
        Action::Save => {
            let update = SessionUpdate::from_params(&request.params);
            let record = service.update(&id, &update).await?;
            tracing::debug!("Saved {} session fields", record.len());
            render(&state, &id, page, &record, Some(MESSAGE_SAVED), remote_addr)
        }
        Action::Clear => {
            service.destroy(&id).await?;
            render(
                &state,
                &id,
                page,
                &SessionRecord::new(),
                Some(MESSAGE_CLEARED),
                remote_addr,
            )
        }
        Action::View => {
            let record = service.load(&id).await?;
            render(&state, &id, page, &record, None, remote_addr)
        }
    }
}

fn render(
    state: &AppState,
    id: &SessionId,
    page: Page,
    record: &SessionRecord,
    message: Option<&str>,
    remote_addr: &str,
) -> Result<Response, PageError> {
    let html = state
        .renderer
        .render_page(page, record, message, remote_addr)?;
    let cookie = session_cookie(&state.cookie_name, id, state.cookie_max_age());
    Ok(html_with_cookie(cookie, html))
}

fn html_with_cookie(cookie: String, html: String) -> Response {
    let mut headers = HeaderMap::new();
    // Ids that can't be sent back as a header value are dropped; the
    // client simply gets a new one next time
    match HeaderValue::from_str(&cookie) {
        Ok(value) => {
            headers.insert(header::SET_COOKIE, value);
        }
        Err(_) => tracing::warn!("Session id not representable in a cookie header"),
    }
    (headers, Html(html)).into_response()
}

/// GET `/health`
pub async fn health() -> &'static str {
    "OK"
}
