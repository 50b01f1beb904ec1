//! Credential extraction.
//!
//! Credentials are decoded once at the HTTP boundary into an explicit value
//! and passed into the gate; routes never re-parse headers ad hoc.

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;

use walletd_common::Username;

/// Credentials presented with a request.
#[derive(Debug, Clone)]
pub struct Credentials {
    /// Claimed account.
    pub username: Username,
    /// Plaintext password, held only for the duration of the request.
    pub password: String,
}

impl Credentials {
    /// Create credentials directly.
    pub fn new(username: impl Into<Username>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }

    /// Decode an HTTP `Authorization: Basic <payload>` header value.
    ///
    /// Returns `None` for anything that is not well-formed Basic auth; the
    /// caller maps that to the same `Unauthorized` as a bad password.
    pub fn from_basic_header(header_value: &str) -> Option<Self> {
        let payload = header_value.strip_prefix("Basic ")?;
        let decoded = BASE64.decode(payload.trim()).ok()?;
        let decoded = String::from_utf8(decoded).ok()?;
        let (username, password) = decoded.split_once(':')?;
        if username.is_empty() {
            return None;
        }
        Some(Self::new(username, password))
    }
}
