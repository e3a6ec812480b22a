use async_trait::async_trait;
use sqlx::PgPool;

use super::{user_not_found, CredentialStore, NewUser, UserChanges, UserRecord};
use crate::error::DatabaseError;

#[derive(Clone)]
pub struct PgCredentialStore {
    pool: PgPool,
}

impl PgCredentialStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl CredentialStore for PgCredentialStore {
    async fn create_user(&self, user: &NewUser) -> Result<(), DatabaseError> {
        sqlx::query(
            r#"
            INSERT INTO users (username, password_hash, email)
            VALUES ($1, $2, $3)
            "#,
        )
        .bind(&user.username)
        .bind(&user.password_hash)
        .bind(&user.email)
        .execute(&self.pool)
        .await
        .map_err(|e| match DatabaseError::from(e) {
            DatabaseError::UniqueConstraintViolation(_) => {
                DatabaseError::UniqueConstraintViolation(format!("User {}", user.username))
            }
            other => other,
        })?;

        Ok(())
    }

    async fn get_user(&self, username: &str) -> Result<UserRecord, DatabaseError> {
        let row = sqlx::query_as::<_, (String, String, String, bool)>(
            r#"
            SELECT username, password_hash, email, invalidated_tokens
            FROM users
            WHERE username = $1
            "#,
        )
        .bind(username)
        .fetch_optional(&self.pool)
        .await?;

        let (username_db, password_hash, email, invalidated_tokens) =
            row.ok_or_else(|| user_not_found(username))?;

        Ok(UserRecord {
            username: username_db,
            password_hash,
            email,
            invalidated_tokens,
        })
    }

    async fn update_user(&self, username: &str, changes: &UserChanges) -> Result<(), DatabaseError> {
        let result = sqlx::query(
            r#"
            UPDATE users
            SET password_hash = COALESCE($1, password_hash),
                email = COALESCE($2, email),
                updated_at = NOW()
            WHERE username = $3
            "#,
        )
        .bind(changes.password_hash.as_deref())
        .bind(changes.email.as_deref())
        .bind(username)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(user_not_found(username));
        }
        Ok(())
    }

    async fn delete_user(&self, username: &str) -> Result<(), DatabaseError> {
        let result = sqlx::query("DELETE FROM users WHERE username = $1")
            .bind(username)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(user_not_found(username));
        }
        Ok(())
    }

    async fn set_token_validity(&self, username: &str, valid: bool) -> Result<(), DatabaseError> {
        let result = sqlx::query(
            r#"
            UPDATE users
            SET invalidated_tokens = $1, updated_at = NOW()
            WHERE username = $2
            "#,
        )
        .bind(!valid)
        .bind(username)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(user_not_found(username));
        }
        Ok(())
    }
}
