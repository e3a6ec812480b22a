/// Authentication Routes
///
/// Sign-in (refresh + access token pair), refresh-to-access exchange and
/// sign-out.

use actix_web::{http::StatusCode, web, HttpRequest, HttpResponse};

use crate::auth::AuthService;
use crate::error::AppError;
use crate::middleware::bearer_token;
use crate::response::send_success;
use crate::routes::UserPath;

/// Header carrying the plain-text password on sign-in
pub const PASSWORD_HEADER: &str = "Password";

/// GET /v1/users/{username}/authorize
///
/// Verifies the `Password` header and returns `{accessToken, refreshToken}`.
/// The account's invalidation flag is cleared after the response has been
/// built, in a detached task whose failure is only logged.
///
/// # Errors
/// - 400: Missing password header
/// - 401: Password incorrect
/// - 404: Unknown user
/// - 500: Store or signing failure
pub async fn issue_tokens(
    req: HttpRequest,
    path: web::Path<UserPath>,
    auth: web::Data<AuthService>,
) -> Result<HttpResponse, AppError> {
    let username = path.into_inner().username;
    let password = req
        .headers()
        .get(PASSWORD_HEADER)
        .and_then(|h| h.to_str().ok())
        .unwrap_or_default();

    let tokens = auth.issue_refresh_and_access(&username, password).await?;
    let response = send_success(StatusCode::OK, &tokens);

    auth.mark_session_live(&username);

    Ok(response)
}

/// GET /v1/users/{username}/token
///
/// **Requires a refresh token** in the Authorization header. Returns a fresh
/// `{accessToken}`; no new refresh token is issued.
///
/// # Errors
/// - 400: Token invalid, of the wrong kind, or issued for another user
/// - 401: Missing token, or the account's refresh tokens were invalidated
/// - 404: Unknown user
/// - 500: Store or signing failure
pub async fn exchange_token(
    req: HttpRequest,
    path: web::Path<UserPath>,
    auth: web::Data<AuthService>,
) -> Result<HttpResponse, AppError> {
    let username = path.into_inner().username;
    let bearer = bearer_token(req.headers());

    let token = auth
        .exchange_refresh_for_access(bearer.as_deref(), &username)
        .await?;

    Ok(send_success(StatusCode::OK, &token))
}

/// DELETE /v1/users/{username}/sessions
///
/// **Requires an access token** issued for `{username}`. Invalidates every
/// outstanding refresh token of the account until the next sign-in.
pub async fn sign_out(
    path: web::Path<UserPath>,
    auth: web::Data<AuthService>,
) -> Result<HttpResponse, AppError> {
    auth.revoke_sessions(&path.username).await?;
    Ok(HttpResponse::NoContent().finish())
}
