/// Token Claims
///
/// Payload carried by both token kinds. The `type` claim is part of the
/// trust boundary: a refresh token is never accepted where an access token
/// is required, and vice versa.

use chrono::{Duration, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// The two token tiers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TokenKind {
    /// Long-lived, exchanged for access tokens, revocable per account
    Refresh,
    /// Short-lived, authorizes individual resource operations
    Access,
}

impl TokenKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            TokenKind::Refresh => "refresh",
            TokenKind::Access => "access",
        }
    }
}

impl fmt::Display for TokenKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct Claims {
    #[serde(rename = "type")]
    pub kind: TokenKind,
    pub username: String,
    /// Expiration time (Unix timestamp)
    pub exp: i64,
    /// Issued at (Unix timestamp)
    pub iat: i64,
    pub iss: String,
}

impl Claims {
    pub fn new(kind: TokenKind, username: impl Into<String>, ttl: Duration, issuer: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            kind,
            username: username.into(),
            exp: (now + ttl).timestamp(),
            iat: now.timestamp(),
            iss: issuer.into(),
        }
    }
}
