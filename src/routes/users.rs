/// Account Routes
///
/// Thin wrappers over the credential store. Passwords are hashed here and
/// never returned.

use actix_web::{http::StatusCode, web, HttpResponse};
use serde::{Deserialize, Serialize};

use crate::auth::{hash_password, Claims};
use crate::configuration::HashingSettings;
use crate::error::{AppError, DatabaseError, ErrorContext, ValidationError};
use crate::response::send_success;
use crate::routes::UserPath;
use crate::store::{CredentialStore, NewUser, UserChanges};
use crate::validators::{is_valid_email, is_valid_username};

#[derive(Deserialize)]
pub struct CreateUserRequest {
    pub username: Option<String>,
    pub password: Option<String>,
    pub email: Option<String>,
}

#[derive(Deserialize)]
pub struct UpdateUserRequest {
    pub password: Option<String>,
    pub email: Option<String>,
}

/// Query string of `GET /v1/users/exists`
#[derive(Deserialize)]
pub struct ExistsQuery {
    pub username: Option<String>,
}

#[derive(Serialize)]
pub struct UserResponse {
    pub username: String,
    pub email: String,
}

#[derive(Serialize)]
pub struct ExistsResponse {
    pub exists: bool,
}

/// POST /v1/users
///
/// # Errors
/// - 400: Missing username, invalid email, password too short/long, bad JSON
/// - 409: Username already taken
pub async fn create_user(
    body: web::Json<CreateUserRequest>,
    store: web::Data<dyn CredentialStore>,
    hashing: web::Data<HashingSettings>,
) -> Result<HttpResponse, AppError> {
    let body = body.into_inner();

    let username = is_valid_username(body.username.as_deref().unwrap_or_default())?;
    let email = is_valid_email(body.email.as_deref().unwrap_or_default())?;
    let password = body
        .password
        .filter(|p| !p.is_empty())
        .ok_or_else(|| ValidationError::Required("Password".to_string()))?;
    let password_hash = hash_password(&password, hashing.cost)?;

    let user = NewUser {
        username,
        password_hash,
        email,
    };
    store
        .create_user(&user)
        .await
        .map_err(store_failure("create_user", &user.username))?;

    tracing::info!(username = %user.username, "User created");
    Ok(HttpResponse::NoContent().finish())
}

/// GET /v1/users/exists?username=
pub async fn user_exists(
    query: web::Query<ExistsQuery>,
    store: web::Data<dyn CredentialStore>,
) -> Result<HttpResponse, AppError> {
    let username = query
        .username
        .as_deref()
        .filter(|u| !u.is_empty())
        .ok_or_else(|| ValidationError::Required("Username".to_string()))?;

    let exists = match store.get_user(username).await {
        Ok(_) => true,
        Err(DatabaseError::NotFound(_)) => false,
        Err(e) => return Err(store_failure("user_exists", username)(e)),
    };

    Ok(send_success(StatusCode::OK, ExistsResponse { exists }))
}

/// GET /v1/users/{username}
///
/// **Requires an access token.**
pub async fn get_user(
    path: web::Path<UserPath>,
    claims: web::ReqData<Claims>,
    store: web::Data<dyn CredentialStore>,
) -> Result<HttpResponse, AppError> {
    tracing::debug!(actor = %claims.username, username = %path.username, "Fetching user");

    let user = store
        .get_user(&path.username)
        .await
        .map_err(store_failure("get_user", &path.username))?;

    Ok(send_success(
        StatusCode::OK,
        UserResponse {
            username: user.username,
            email: user.email,
        },
    ))
}

/// PUT /v1/users/{username}
///
/// **Requires an access token.** A present password is re-hashed; fields
/// left out are unchanged.
pub async fn update_user(
    path: web::Path<UserPath>,
    claims: web::ReqData<Claims>,
    body: web::Json<UpdateUserRequest>,
    store: web::Data<dyn CredentialStore>,
    hashing: web::Data<HashingSettings>,
) -> Result<HttpResponse, AppError> {
    let body = body.into_inner();

    let changes = UserChanges {
        password_hash: body
            .password
            .map(|p| hash_password(&p, hashing.cost))
            .transpose()?,
        email: body.email.as_deref().map(is_valid_email).transpose()?,
    };

    store
        .update_user(&path.username, &changes)
        .await
        .map_err(store_failure("update_user", &path.username))?;

    tracing::info!(actor = %claims.username, username = %path.username, "User updated");
    Ok(HttpResponse::NoContent().finish())
}

/// DELETE /v1/users/{username}
///
/// **Requires an access token.**
pub async fn delete_user(
    path: web::Path<UserPath>,
    claims: web::ReqData<Claims>,
    store: web::Data<dyn CredentialStore>,
) -> Result<HttpResponse, AppError> {
    store
        .delete_user(&path.username)
        .await
        .map_err(store_failure("delete_user", &path.username))?;

    tracing::info!(actor = %claims.username, username = %path.username, "User deleted");
    Ok(HttpResponse::NoContent().finish())
}

/// Log a store failure with its operation and identity, then translate it
fn store_failure<'a>(
    operation: &'a str,
    username: &'a str,
) -> impl FnOnce(DatabaseError) -> AppError + 'a {
    move |e| {
        let err = AppError::from(e);
        ErrorContext::new(operation)
            .with_username(username)
            .log_error(&err);
        err
    }
}
