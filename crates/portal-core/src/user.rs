use crate::error::CoreError;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use serde::{Deserialize, Serialize};
use std::fmt::Display;
use uuid::Uuid;

const MAX_LENGTH: usize = 128;

/// Identifier of the user that owns a set of URL records.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct UserId(String);

impl UserId {
    /// Generates a fresh id: a random v4 UUID, base64-encoded.
    pub fn generate() -> Self {
        Self(URL_SAFE_NO_PAD.encode(Uuid::new_v4().as_bytes()))
    }

    /// Wraps an id presented by a client or read back from storage.
    pub fn new(id: impl Into<String>) -> Result<Self, CoreError> {
        let id = id.into();
        if id.is_empty() || id.len() > MAX_LENGTH {
            return Err(CoreError::InvalidUserId(format!(
                "length must be between 1 and {}, got {}",
                MAX_LENGTH,
                id.len()
            )));
        }
        if !id.chars().all(|c| c.is_ascii_graphic()) {
            return Err(CoreError::InvalidUserId(format!(
                "must contain only printable ascii: '{}'",
                id.escape_default()
            )));
        }
        Ok(Self(id))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for UserId {
    type Error = CoreError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<UserId> for String {
    fn from(value: UserId) -> Self {
        value.0
    }
}

impl Display for UserId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// The caller of a request, as established by the transport layer.
///
/// `is_new` is true when the session was manufactured for the current
/// request because no credential was presented. It is derived per request
/// and never persisted.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct User {
    pub id: UserId,
    pub is_new: bool,
}

impl User {
    /// A user manufactured for a request without credentials.
    pub fn new_session() -> Self {
        Self {
            id: UserId::generate(),
            is_new: true,
        }
    }

    /// A user recovered from a presented credential.
    pub fn existing(id: UserId) -> Self {
        Self { id, is_new: false }
    }
}
