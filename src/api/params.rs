//! Request parameter extraction
//!
//! Pages accept the same parameters over GET and POST. The query string is
//! read first and a POST body, form-encoded or JSON, overrides it key by key.

use axum::extract::{ConnectInfo, FromRequest, Query, Request};
use axum::http::{header, HeaderMap, Method};
use axum::{Form, Json};
use std::collections::HashMap;
use std::convert::Infallible;
use std::net::SocketAddr;

/// Everything the page handler needs from a request
#[derive(Debug, Default)]
pub struct PageRequest {
    /// Merged query and body parameters
    pub params: HashMap<String, String>,
    /// Raw `Cookie` header values, in order
    pub cookie_headers: Vec<String>,
    /// Best guess at the client address
    pub remote_addr: Option<String>,
}

impl PageRequest {
    pub fn param(&self, key: &str) -> Option<&str> {
        self.params.get(key).map(String::as_str)
    }
}

impl<S> FromRequest<S> for PageRequest
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let mut params = match Query::<HashMap<String, String>>::try_from_uri(req.uri()) {
            Ok(Query(query)) => query,
            Err(e) => {
                tracing::debug!("Ignoring unparsable query string: {}", e.body_text());
                HashMap::new()
            }
        };

        let cookie_headers = req
            .headers()
            .get_all(header::COOKIE)
            .iter()
            .filter_map(|value| value.to_str().ok())
            .map(str::to_owned)
            .collect();

        let remote_addr = client_addr(
            req.headers(),
            req.extensions().get::<ConnectInfo<SocketAddr>>(),
        );

        if req.method() == Method::POST {
            match read_body(req, state).await {
                Ok(body) => params.extend(body),
                Err(reason) => tracing::debug!("Ignoring unreadable request body: {}", reason),
            }
        }

        Ok(Self {
            params,
            cookie_headers,
            remote_addr,
        })
    }
}

async fn read_body<S>(req: Request, state: &S) -> Result<HashMap<String, String>, String>
where
    S: Send + Sync,
{
    if is_json(req.headers()) {
        Json::<HashMap<String, String>>::from_request(req, state)
            .await
            .map(|Json(body)| body)
            .map_err(|e| e.body_text())
    } else {
        Form::<HashMap<String, String>>::from_request(req, state)
            .await
            .map(|Form(body)| body)
            .map_err(|e| e.body_text())
    }
}

fn is_json(headers: &HeaderMap) -> bool {
    headers
        .get(header::CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .is_some_and(|value| value.contains("application/json"))
}

/// `X-Forwarded-For` (first hop), then `X-Real-IP`, then the socket peer
fn client_addr(headers: &HeaderMap, peer: Option<&ConnectInfo<SocketAddr>>) -> Option<String> {
    let header_value = |name: &str| {
        headers
            .get(name)
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.split(',').next())
            .map(str::trim)
            .filter(|value| !value.is_empty())
            .map(str::to_owned)
    };

    header_value("x-forwarded-for")
        .or_else(|| header_value("x-real-ip"))
        .or_else(|| peer.map(|ConnectInfo(addr)| addr.ip().to_string()))
}
