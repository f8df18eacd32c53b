//! Session model

use data_encoding::BASE64URL_NOPAD;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::fmt;

/// Number of random bytes in a freshly issued session id (128 bits)
const SESSION_ID_BYTES: usize = 16;

/// Record key for the username field
pub const FIELD_USERNAME: &str = "username";
/// Record key for the email field
pub const FIELD_EMAIL: &str = "email";
/// Record key for the favorite color field
pub const FIELD_FAVORITE_COLOR: &str = "favorite_color";

/// Opaque per-client session token.
///
/// Ids presented by clients are taken as-is; only ids minted by
/// [`SessionId::generate`] are guaranteed to be URL-safe.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionId(String);

impl SessionId {
    /// Mint a new id from the operating system CSPRNG, encoded as unpadded
    /// URL-safe base64.
    pub fn generate() -> Result<Self, getrandom::Error> {
        let mut bytes = [0u8; SESSION_ID_BYTES];
        getrandom::fill(&mut bytes)?;
        Ok(Self(BASE64URL_NOPAD.encode(&bytes)))
    }

    /// Wrap a client-supplied value. Returns `None` for an empty string.
    pub fn from_client(value: &str) -> Option<Self> {
        if value.is_empty() {
            None
        } else {
            Some(Self(value.to_string()))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Flat string-keyed record stored per session.
///
/// Serializes as a plain JSON object so stored files stay readable.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionRecord(BTreeMap<String, String>);

impl SessionRecord {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).map(String::as_str)
    }

    pub fn set(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.0.insert(key.into(), value.into());
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Merge the non-empty fields of `update` into this record.
    ///
    /// Fields that were not submitted, or were submitted empty, keep their
    /// previous value.
    pub fn merge(&mut self, update: &SessionUpdate) {
        for (key, value) in update.fields() {
            if let Some(value) = value.filter(|v| !v.is_empty()) {
                self.set(key, value);
            }
        }
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for SessionRecord {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self(iter.into_iter().map(|(k, v)| (k.into(), v.into())).collect())
    }
}

/// Fields submitted by a save action
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct SessionUpdate {
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub favorite_color: Option<String>,
}

impl SessionUpdate {
    /// Pick the known fields out of a flat parameter map
    pub fn from_params(params: &HashMap<String, String>) -> Self {
        Self {
            username: params.get(FIELD_USERNAME).cloned(),
            email: params.get(FIELD_EMAIL).cloned(),
            favorite_color: params.get(FIELD_FAVORITE_COLOR).cloned(),
        }
    }

    fn fields(&self) -> [(&'static str, Option<&str>); 3] {
        [
            (FIELD_USERNAME, self.username.as_deref()),
            (FIELD_EMAIL, self.email.as_deref()),
            (FIELD_FAVORITE_COLOR, self.favorite_color.as_deref()),
        ]
    }
}
