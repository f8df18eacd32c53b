//! Session identity resolution
//!
//! Finds the session id a client presents in its `Cookie` headers, or mints
//! a new one. Writing the id back to the client is the HTTP layer's job.

use crate::models::SessionId;
use crate::services::session::SessionServiceError;

/// First non-empty value of cookie `name` in a single `Cookie` header.
///
/// Browsers repeat a name when the cookie exists on several paths, so an
/// empty occurrence does not hide a later one.
pub fn parse_cookie<'a>(header: &'a str, name: &str) -> Option<&'a str> {
    header.split(';').find_map(|pair| {
        let (key, value) = pair.trim().split_once('=')?;
        let value = value.trim().trim_matches('"');
        (key.trim() == name && !value.is_empty()).then_some(value)
    })
}

/// Return the id carried by cookie `cookie_name`, or a freshly generated one.
///
/// Every header is searched and the first non-empty value wins. The value is
/// not validated beyond that; unknown ids simply load an empty record.
pub fn resolve_or_create_id<'a>(
    cookie_headers: impl IntoIterator<Item = &'a str>,
    cookie_name: &str,
) -> Result<SessionId, SessionServiceError> {
    let presented = cookie_headers
        .into_iter()
        .filter_map(|header| parse_cookie(header, cookie_name))
        .find_map(SessionId::from_client);

    match presented {
        Some(id) => Ok(id),
        None => {
            let id = SessionId::generate()
                .map_err(|e| SessionServiceError::Entropy(e.to_string()))?;
            tracing::debug!("Issued new session id");
            Ok(id)
        }
    }
}
