//! Services layer
//!
//! - `identity` resolves or mints the session id a request belongs to
//! - `session` owns load/save/destroy/update on top of the store layer

pub mod identity;
pub mod session;

pub use identity::{parse_cookie, resolve_or_create_id};
pub use session::{SessionService, SessionServiceError};
