mod auth;
mod health_check;
mod users;

pub use auth::{exchange_token, issue_tokens, sign_out, PASSWORD_HEADER};
pub use health_check::health_check;
pub use users::{create_user, delete_user, get_user, update_user, user_exists};

use serde::Deserialize;

/// `{username}` path segment shared by the per-account routes
#[derive(Deserialize)]
pub struct UserPath {
    pub username: String,
}
