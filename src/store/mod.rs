/// Credential Store
///
/// User records and the per-account token invalidation flag. The auth
/// flow only depends on the `CredentialStore` trait; Postgres backs it in
/// production and an in-memory map backs tests and local runs.

use async_trait::async_trait;

use crate::error::DatabaseError;

mod memory;
mod postgres;

pub use memory::InMemoryCredentialStore;
pub use postgres::PgCredentialStore;

/// A stored account
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserRecord {
    pub username: String,
    /// bcrypt hash, never sent back to clients
    pub password_hash: String,
    pub email: String,
    /// When set, every outstanding refresh token for this account is rejected
    pub invalidated_tokens: bool,
}

#[derive(Debug, Clone)]
pub struct NewUser {
    pub username: String,
    pub password_hash: String,
    pub email: String,
}

/// Partial update; `None` fields are left untouched
#[derive(Debug, Clone, Default)]
pub struct UserChanges {
    pub password_hash: Option<String>,
    pub email: Option<String>,
}

#[async_trait]
pub trait CredentialStore: Send + Sync {
    /// Fails with `UniqueConstraintViolation` if the username is taken
    async fn create_user(&self, user: &NewUser) -> Result<(), DatabaseError>;

    /// Fails with `NotFound("User <name>")` for unknown identities
    async fn get_user(&self, username: &str) -> Result<UserRecord, DatabaseError>;

    /// Fails with `NotFound` for unknown identities, even when `changes` is empty
    async fn update_user(&self, username: &str, changes: &UserChanges) -> Result<(), DatabaseError>;

    async fn delete_user(&self, username: &str) -> Result<(), DatabaseError>;

    /// `valid = true` clears the invalidation flag, `false` sets it
    async fn set_token_validity(&self, username: &str, valid: bool) -> Result<(), DatabaseError>;
}

pub(crate) fn user_not_found(username: &str) -> DatabaseError {
    DatabaseError::NotFound(format!("User {}", username))
}
