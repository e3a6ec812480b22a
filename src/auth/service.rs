/// Token Issuance Flow
///
/// Orchestrates credential verification, token issuance and the
/// per-account validity flag:
///
/// `NoSession -> (issue refresh) -> Live -> (sign out) -> Revoked -> (issue refresh) -> Live`
///
/// Individual tokens carry no state beyond signature and expiry; the flag in
/// the credential store is the only authority that can revoke a refresh
/// token before it expires.

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::Instrument;

use crate::auth::jwt::TokenCodec;
use crate::auth::password::verify_password;
use crate::auth::TokenKind;
use crate::error::{AppError, AuthError, DatabaseError, ErrorContext, ValidationError};
use crate::store::{CredentialStore, UserRecord};

/// Returned by a successful sign-in
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: String,
}

/// Returned by a refresh-to-access exchange
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccessToken {
    pub access_token: String,
}

pub struct AuthService {
    store: Arc<dyn CredentialStore>,
    codec: TokenCodec,
}

impl AuthService {
    pub fn new(store: Arc<dyn CredentialStore>, codec: TokenCodec) -> Self {
        Self { store, codec }
    }

    /// Verify `password` for `username` and issue a refresh/access pair.
    ///
    /// The caller is expected to answer the client first and then call
    /// [`AuthService::mark_session_live`].
    ///
    /// # Errors
    /// - `Validation` if either argument is empty
    /// - `Database(NotFound)` for unknown users, `Database(_)` on store failure
    /// - `Auth(InvalidCredentials)` on password mismatch
    /// - `Internal` if signing fails
    pub async fn issue_refresh_and_access(
        &self,
        username: &str,
        password: &str,
    ) -> Result<TokenPair, AppError> {
        if username.is_empty() {
            return Err(ValidationError::Required("Username".to_string()).into());
        }
        if password.is_empty() {
            return Err(ValidationError::Required("Password header".to_string()).into());
        }

        let user = self.find_user(username, "issue_tokens").await?;

        if !verify_password(password, &user.password_hash) {
            tracing::warn!(username = %username, "Password incorrect");
            return Err(AuthError::InvalidCredentials.into());
        }

        let refresh_token = self.codec.issue_refresh(username)?;
        let access_token = self.codec.issue_access(username)?;

        tracing::info!(username = %username, "Issued refresh and access tokens");

        Ok(TokenPair {
            access_token,
            refresh_token,
        })
    }

    /// Clear the account's invalidation flag in a detached task.
    ///
    /// Tokens have already been handed out when this runs, so a failure is
    /// only logged and never reaches the client.
    pub fn mark_session_live(&self, username: &str) -> JoinHandle<()> {
        let store = Arc::clone(&self.store);
        let username = username.to_string();

        tokio::spawn(
            async move {
                match store.set_token_validity(&username, true).await {
                    Ok(()) => tracing::debug!(username = %username, "Token validity set to valid"),
                    Err(e) => tracing::error!(
                        username = %username,
                        error = %e,
                        "Could not set user token validity to valid"
                    ),
                }
            }
            .in_current_span(),
        )
    }

    /// Exchange a refresh token for a fresh access token.
    ///
    /// No new refresh token is issued and the account is not mutated.
    ///
    /// # Errors
    /// - `Auth(MissingToken)` without a bearer token
    /// - `Validation` if `username` is empty
    /// - `Database(NotFound)` / `Database(_)` from the store
    /// - `Auth(TokensInvalidated)` if the account flag is set
    /// - `Token(_)` if the bearer is not a valid refresh token for `username`
    pub async fn exchange_refresh_for_access(
        &self,
        bearer_token: Option<&str>,
        username: &str,
    ) -> Result<AccessToken, AppError> {
        let bearer_token = bearer_token
            .filter(|token| !token.is_empty())
            .ok_or(AuthError::MissingToken)?;
        if username.is_empty() {
            return Err(ValidationError::Required("Username".to_string()).into());
        }

        let user = self.find_user(username, "exchange_refresh_token").await?;

        if user.invalidated_tokens {
            tracing::warn!(username = %username, "Refresh attempted with invalidated tokens");
            return Err(AuthError::TokensInvalidated.into());
        }

        self.codec
            .parse_kind(bearer_token, TokenKind::Refresh, Some(&user.username))?;

        let access_token = self.codec.issue_access(username)?;

        tracing::info!(username = %username, "Exchanged refresh token for access token");

        Ok(AccessToken { access_token })
    }

    /// Set the account's invalidation flag, rejecting every outstanding
    /// refresh token until the next sign-in.
    pub async fn revoke_sessions(&self, username: &str) -> Result<(), AppError> {
        if username.is_empty() {
            return Err(ValidationError::Required("Username".to_string()).into());
        }

        self.store
            .set_token_validity(username, false)
            .await
            .map_err(|e| self.store_error(e, "revoke_sessions", username))?;

        tracing::info!(username = %username, "Refresh tokens invalidated");
        Ok(())
    }

    async fn find_user(&self, username: &str, operation: &str) -> Result<UserRecord, AppError> {
        self.store
            .get_user(username)
            .await
            .map_err(|e| self.store_error(e, operation, username))
    }

    fn store_error(&self, err: DatabaseError, operation: &str, username: &str) -> AppError {
        let err = AppError::Database(err);
        ErrorContext::new(operation)
            .with_username(username)
            .log_error(&err);
        err
    }
}
