use super::*;
use crate::services::SessionService;
use crate::store::{FileStore, Store};
use crate::views::PageRenderer;
use axum::http::{header, HeaderValue, StatusCode};
use axum_test::{TestResponse, TestServer};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;

const COOKIE: &str = "SESSID";

fn server_with_store(store: Store) -> TestServer {
    let service = Arc::new(SessionService::new(Arc::new(store)));
    let renderer = Arc::new(PageRenderer::new().unwrap());
    let state = AppState::new(service, renderer, COOKIE);
    TestServer::new(build_router(state)).unwrap()
}

fn test_server() -> (TestServer, TempDir) {
    let dir = TempDir::new().unwrap();
    let store = Store::File(FileStore::new(dir.path(), Duration::from_secs(1800)));
    (server_with_store(store), dir)
}

fn cookie_header(id: &str) -> HeaderValue {
    HeaderValue::from_str(&format!("{}={}", COOKIE, id)).unwrap()
}

fn set_cookie(response: &TestResponse) -> String {
    response
        .headers()
        .get(header::SET_COOKIE)
        .expect("missing Set-Cookie")
        .to_str()
        .unwrap()
        .to_string()
}

fn session_id(response: &TestResponse) -> String {
    let cookie = set_cookie(response);
    let value = cookie
        .strip_prefix(&format!("{}=", COOKIE))
        .expect("unexpected cookie name");
    value.split(';').next().unwrap().to_string()
}

fn form<'a>(pairs: &[(&'a str, &'a str)]) -> HashMap<&'a str, &'a str> {
    pairs.iter().copied().collect()
}

#[tokio::test]
async fn test_first_visit_issues_cookie() {
    let (server, _dir) = test_server();

    let response = server.get("/").await;

    assert_eq!(response.status_code(), StatusCode::OK);
    let cookie = set_cookie(&response);
    assert!(cookie.contains("Path=/"));
    assert!(cookie.contains("Max-Age=1800"));
    assert!(cookie.contains("HttpOnly"));
    assert!(cookie.contains("SameSite=Lax"));
    assert_eq!(session_id(&response).len(), 22);

    assert_eq!(
        response.headers().get(header::CACHE_CONTROL).unwrap(),
        "no-cache, no-store, must-revalidate"
    );
    assert_eq!(
        response.headers().get(header::CONTENT_TYPE).unwrap(),
        "text/html; charset=utf-8"
    );
    assert!(response.text().contains("No session data set yet."));
    assert!(response.text().contains("Your IP Address: Unknown"));
}

#[tokio::test]
async fn test_presented_cookie_is_echoed() {
    let (server, _dir) = test_server();

    let response = server
        .get("/state")
        .add_header(header::COOKIE, cookie_header("known-id"))
        .await;

    assert_eq!(session_id(&response), "known-id");
}

#[tokio::test]
async fn test_save_then_view_page_two() {
    let (server, _dir) = test_server();

    let saved = server
        .post("/state")
        .form(&form(&[
            ("action", "save"),
            ("page", "1"),
            ("username", "alice"),
            ("email", "alice@example.com"),
        ]))
        .await;
    assert_eq!(saved.status_code(), StatusCode::OK);
    assert!(saved.text().contains("Data saved!"));
    assert!(saved.text().contains("value=\"alice\""));
    let id = session_id(&saved);

    let page2 = server
        .get("/state")
        .add_query_param("page", "2")
        .add_header(header::COOKIE, cookie_header(&id))
        .await;
    let html = page2.text();
    assert!(html.contains("Sessions - Page 2"));
    assert!(html.contains("<strong>Username:</strong> alice"));
    assert!(html.contains("<strong>Email:</strong> alice@example.com"));
    assert!(!html.contains("Data saved!"));
}

#[tokio::test]
async fn test_partial_save_merges() {
    let (server, _dir) = test_server();

    let first = server
        .post("/state")
        .form(&form(&[("action", "save"), ("username", "a"), ("email", "b")]))
        .await;
    let id = session_id(&first);

    server
        .post("/state")
        .add_header(header::COOKIE, cookie_header(&id))
        .form(&form(&[
            ("action", "save"),
            ("username", ""),
            ("favorite_color", "red"),
        ]))
        .await;

    let html = server
        .get("/state")
        .add_query_param("page", "2")
        .add_header(header::COOKIE, cookie_header(&id))
        .await
        .text();
    assert!(html.contains("<strong>Username:</strong> a"));
    assert!(html.contains("<strong>Email:</strong> b"));
    assert!(html.contains("<strong>Favorite Color:</strong> red"));
}

#[tokio::test]
async fn test_json_body_is_accepted() {
    let (server, _dir) = test_server();

    let response = server
        .post("/")
        .json(&serde_json::json!({ "action": "save", "page": "2", "favorite_color": "blue" }))
        .await;

    let html = response.text();
    assert!(html.contains("Sessions - Page 2"));
    assert!(html.contains("<strong>Favorite Color:</strong> blue"));
}

#[tokio::test]
async fn test_query_parameters_work_for_save() {
    let (server, _dir) = test_server();

    let response = server
        .get("/state")
        .add_query_param("action", "save")
        .add_query_param("username", "viaquery")
        .await;

    assert!(response.text().contains("<strong>Username:</strong> viaquery"));
}

#[tokio::test]
async fn test_destroy_expires_cookie_and_data() {
    let (server, dir) = test_server();

    let saved = server
        .post("/state")
        .form(&form(&[("action", "save"), ("username", "bob")]))
        .await;
    let id = session_id(&saved);
    assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 1);

    let destroyed = server
        .post("/state")
        .add_header(header::COOKIE, cookie_header(&id))
        .form(&form(&[("action", "destroy")]))
        .await;
    assert_eq!(destroyed.status_code(), StatusCode::OK);
    assert!(destroyed.text().contains("Session Destroyed"));
    let cookie = set_cookie(&destroyed);
    assert!(cookie.starts_with("SESSID=deleted;"));
    assert!(cookie.contains("Max-Age=0"));
    assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);

    // A browser that ignores the expiry still sees nothing
    let after = server
        .get("/state")
        .add_header(header::COOKIE, cookie_header(&id))
        .await;
    assert!(after.text().contains("No session data set yet."));
}

#[tokio::test]
async fn test_clear_keeps_identifier() {
    let (server, _dir) = test_server();

    let saved = server
        .post("/state")
        .form(&form(&[("action", "save"), ("username", "carol")]))
        .await;
    let id = session_id(&saved);

    let cleared = server
        .post("/state")
        .add_header(header::COOKIE, cookie_header(&id))
        .form(&form(&[("action", "clear")]))
        .await;
    assert!(cleared.text().contains("Session data cleared!"));
    assert!(!cleared.text().contains("carol"));
    assert_eq!(session_id(&cleared), id);
}

#[tokio::test]
async fn test_sessions_are_isolated() {
    let (server, _dir) = test_server();

    server
        .post("/state")
        .add_header(header::COOKIE, cookie_header("one"))
        .form(&form(&[("action", "save"), ("username", "first")]))
        .await;

    let other = server
        .get("/state")
        .add_header(header::COOKIE, cookie_header("two"))
        .await;
    assert!(!other.text().contains("first"));
}

#[tokio::test]
async fn test_forwarded_address_is_shown() {
    let (server, _dir) = test_server();

    let response = server
        .get("/")
        .add_header(
            header::HeaderName::from_static("x-forwarded-for"),
            HeaderValue::from_static("203.0.113.7"),
        )
        .await;

    assert!(response.text().contains("Your IP Address: 203.0.113.7"));
}

#[tokio::test]
async fn test_storage_failure_is_generic_500() {
    let blocker = tempfile::NamedTempFile::new().unwrap();
    let store = Store::File(FileStore::new(
        blocker.path().join("sessions"),
        Duration::from_secs(1800),
    ));
    let server = server_with_store(store);

    let response = server
        .post("/state")
        .form(&form(&[("action", "save"), ("username", "x")]))
        .await;

    assert_eq!(response.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
    assert!(response.text().contains("Something went wrong"));
    assert!(!response.text().contains("sessions"));
    assert!(response.headers().get(header::SET_COOKIE).is_none());
}

#[tokio::test]
async fn test_health() {
    let (server, _dir) = test_server();

    let response = server.get("/health").await;

    assert_eq!(response.status_code(), StatusCode::OK);
    assert_eq!(response.text(), "OK");
}
