/// Token Codec
///
/// Creates and parses signed, expiring tokens of both kinds. The signing
/// secret is injected through `JwtSettings` at construction and is never
/// read from global state.

use chrono::Duration;
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};

use crate::auth::claims::{Claims, TokenKind};
use crate::configuration::JwtSettings;
use crate::error::{AppError, TokenError};

const ALGORITHM: Algorithm = Algorithm::HS512;

#[derive(Clone)]
pub struct TokenCodec {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    validation: Validation,
    issuer: String,
    access_ttl: Duration,
    refresh_ttl: Duration,
}

impl TokenCodec {
    pub fn new(config: &JwtSettings) -> Self {
        let mut validation = Validation::new(ALGORITHM);
        validation.leeway = 0;
        validation.set_issuer(&[&config.issuer]);
        validation.set_required_spec_claims(&["exp", "iss"]);

        Self {
            encoding_key: EncodingKey::from_secret(config.secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(config.secret.as_bytes()),
            validation,
            issuer: config.issuer.clone(),
            access_ttl: Duration::seconds(config.access_token_expiry),
            refresh_ttl: Duration::seconds(config.refresh_token_expiry),
        }
    }

    /// Configured lifetime for a token kind
    pub fn ttl(&self, kind: TokenKind) -> Duration {
        match kind {
            TokenKind::Access => self.access_ttl,
            TokenKind::Refresh => self.refresh_ttl,
        }
    }

    /// Sign a token of `kind` for `username`, expiring `ttl` from now
    ///
    /// # Errors
    /// Returns `AppError::Internal` if the signing backend fails
    pub fn issue(&self, username: &str, kind: TokenKind, ttl: Duration) -> Result<String, AppError> {
        let claims = Claims::new(kind, username, ttl, self.issuer.clone());

        encode(&Header::new(ALGORITHM), &claims, &self.encoding_key).map_err(|e| {
            tracing::error!(username = %username, kind = %kind, error = %e, "Could not sign token");
            AppError::Internal(format!("Token generation failed: {}", e))
        })
    }

    pub fn issue_access(&self, username: &str) -> Result<String, AppError> {
        self.issue(username, TokenKind::Access, self.ttl(TokenKind::Access))
    }

    pub fn issue_refresh(&self, username: &str) -> Result<String, AppError> {
        self.issue(username, TokenKind::Refresh, self.ttl(TokenKind::Refresh))
    }

    /// Verify signature, expiry and issuer. The token kind is not checked.
    pub fn parse(&self, token: &str) -> Result<Claims, TokenError> {
        decode::<Claims>(token, &self.decoding_key, &self.validation)
            .map(|data| data.claims)
            .map_err(|e| {
                tracing::warn!(error = %e, "Token validation failed");
                TokenError::Invalid
            })
    }

    /// Parse a token and require it to be of `expected` kind. When
    /// `bound_to` is given the token must also have been issued for that
    /// identity.
    pub fn parse_kind(
        &self,
        token: &str,
        expected: TokenKind,
        bound_to: Option<&str>,
    ) -> Result<Claims, TokenError> {
        let claims = self.parse(token)?;

        if claims.kind != expected {
            return Err(TokenError::WrongKind {
                expected,
                actual: claims.kind,
            });
        }

        if let Some(username) = bound_to {
            if claims.username != username {
                return Err(TokenError::IdentityMismatch {
                    expected: username.to_string(),
                });
            }
        }

        Ok(claims)
    }
}
