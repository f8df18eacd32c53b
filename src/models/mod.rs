//! Data models
//!
//! Session identity, the stored record and the fields a save may submit.

mod session;

pub use session::{
    SessionId, SessionRecord, SessionUpdate, FIELD_EMAIL, FIELD_FAVORITE_COLOR, FIELD_USERNAME,
};
