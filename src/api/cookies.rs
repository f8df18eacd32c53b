//! `Set-Cookie` values for the session cookie

use crate::models::SessionId;

/// `Set-Cookie` value carrying `id`, valid for `max_age_secs`
pub fn session_cookie(name: &str, id: &SessionId, max_age_secs: u64) -> String {
    format!(
        "{}={}; Path=/; Max-Age={}; HttpOnly; SameSite=Lax",
        name, id, max_age_secs
    )
}

/// `Set-Cookie` value telling the browser to drop cookie `name` now
pub fn expired_cookie(name: &str) -> String {
    format!(
        "{}=deleted; Path=/; Max-Age=0; Expires=Thu, 01 Jan 1970 00:00:00 GMT",
        name
    )
}
