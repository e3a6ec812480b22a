use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

use super::{user_not_found, CredentialStore, NewUser, UserChanges, UserRecord};
use crate::error::DatabaseError;

/// Map-backed store. Every operation holds the lock for its whole
/// read-modify-write, so a flag update and a validity check on the same
/// account never interleave.
#[derive(Default)]
pub struct InMemoryCredentialStore {
    users: Mutex<HashMap<String, UserRecord>>,
}

impl InMemoryCredentialStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn users(&self) -> Result<MutexGuard<'_, HashMap<String, UserRecord>>, DatabaseError> {
        self.users
            .lock()
            .map_err(|_| DatabaseError::UnexpectedError("user map lock poisoned".to_string()))
    }
}

#[async_trait]
impl CredentialStore for InMemoryCredentialStore {
    async fn create_user(&self, user: &NewUser) -> Result<(), DatabaseError> {
        let mut users = self.users()?;
        if users.contains_key(&user.username) {
            return Err(DatabaseError::UniqueConstraintViolation(format!(
                "User {}",
                user.username
            )));
        }

        users.insert(
            user.username.clone(),
            UserRecord {
                username: user.username.clone(),
                password_hash: user.password_hash.clone(),
                email: user.email.clone(),
                invalidated_tokens: false,
            },
        );
        Ok(())
    }

    async fn get_user(&self, username: &str) -> Result<UserRecord, DatabaseError> {
        self.users()?
            .get(username)
            .cloned()
            .ok_or_else(|| user_not_found(username))
    }

    async fn update_user(&self, username: &str, changes: &UserChanges) -> Result<(), DatabaseError> {
        let mut users = self.users()?;
        let user = users.get_mut(username).ok_or_else(|| user_not_found(username))?;

        if let Some(password_hash) = &changes.password_hash {
            user.password_hash = password_hash.clone();
        }
        if let Some(email) = &changes.email {
            user.email = email.clone();
        }
        Ok(())
    }

    async fn delete_user(&self, username: &str) -> Result<(), DatabaseError> {
        self.users()?
            .remove(username)
            .map(|_| ())
            .ok_or_else(|| user_not_found(username))
    }

    async fn set_token_validity(&self, username: &str, valid: bool) -> Result<(), DatabaseError> {
        let mut users = self.users()?;
        let user = users.get_mut(username).ok_or_else(|| user_not_found(username))?;
        user.invalidated_tokens = !valid;
        Ok(())
    }
}
