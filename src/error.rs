/// Application Error Handling
///
/// A single `AppError` type that every handler and middleware returns.
/// It is composed of small domain error enums so each layer only deals with
/// the failures it can actually produce:
/// 1. Validation errors (missing or malformed input)      -> 400
/// 2. Token errors (bad signature, expiry, wrong kind)    -> 400
/// 3. Authentication errors (credentials, revoked tokens) -> 401
/// 4. Database errors (not found, duplicates, backend)    -> 404 / 409 / 500
/// 5. Internal errors (signing or hashing backends)       -> 500
///
/// Responses are rendered in the `{ "error": { "code", "message" } }`
/// envelope; backend detail is logged and never sent to the client.

use actix_web::{error::ResponseError, http::StatusCode, HttpResponse};
use std::error::Error as StdError;
use std::fmt;

use crate::auth::TokenKind;
use crate::response::ApiResponse;

/// ============================================================================
/// 1. DOMAIN-SPECIFIC ERROR TYPES
/// ============================================================================

/// Validation errors for input data
#[derive(Debug, Clone)]
pub enum ValidationError {
    Required(String),
    TooShort(String, usize),
    TooLong(String, usize),
    InvalidFormat(String),
    SuspiciousContent(String),
    MalformedBody,
    MalformedQuery,
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValidationError::Required(field) => write!(f, "{} required", field),
            ValidationError::TooShort(field, min) => {
                write!(f, "{} must be at least {} characters", field, min)
            }
            ValidationError::TooLong(field, max) => {
                write!(f, "{} must be at most {} characters", field, max)
            }
            ValidationError::InvalidFormat(field) => write!(f, "{} has invalid format", field),
            ValidationError::SuspiciousContent(field) => {
                write!(f, "{} contains suspicious content", field)
            }
            ValidationError::MalformedBody => write!(f, "Could not parse body as JSON"),
            ValidationError::MalformedQuery => write!(f, "Could not parse query parameters"),
        }
    }
}

impl StdError for ValidationError {}

/// Token parsing and claim-check failures
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TokenError {
    /// Bad signature, malformed, expired or foreign issuer
    Invalid,
    WrongKind { expected: TokenKind, actual: TokenKind },
    IdentityMismatch { expected: String },
}

impl fmt::Display for TokenError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TokenError::Invalid => write!(f, "Invalid token"),
            TokenError::WrongKind { expected, actual } => write!(
                f,
                "Invalid token provided, '{}' token expected, got token with type '{}'",
                expected, actual
            ),
            TokenError::IdentityMismatch { expected } => {
                write!(f, "Token was not issued for user {}", expected)
            }
        }
    }
}

impl StdError for TokenError {}

/// Database operation errors
#[derive(Debug, Clone)]
pub enum DatabaseError {
    UniqueConstraintViolation(String),
    NotFound(String),
    QueryExecution(String),
    ConnectionPool(String),
    UnexpectedError(String),
}

impl fmt::Display for DatabaseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DatabaseError::UniqueConstraintViolation(msg) => write!(f, "{} already exists", msg),
            DatabaseError::NotFound(msg) => write!(f, "{} not found", msg),
            DatabaseError::QueryExecution(msg) => write!(f, "Query error: {}", msg),
            DatabaseError::ConnectionPool(msg) => write!(f, "Database connection error: {}", msg),
            DatabaseError::UnexpectedError(msg) => write!(f, "Database error: {}", msg),
        }
    }
}

impl StdError for DatabaseError {}

/// Authentication errors
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthError {
    MissingToken,
    InvalidCredentials,
    TokensInvalidated,
}

impl fmt::Display for AuthError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AuthError::MissingToken => write!(f, "Bearer token required"),
            AuthError::InvalidCredentials => write!(f, "Password incorrect"),
            AuthError::TokensInvalidated => write!(f, "Refresh token has been invalidated"),
        }
    }
}

impl StdError for AuthError {}

/// ============================================================================
/// 2. UNIFIED APPLICATION ERROR TYPE
/// ============================================================================

#[derive(Debug)]
pub enum AppError {
    Validation(ValidationError),
    Token(TokenError),
    Auth(AuthError),
    Database(DatabaseError),
    Internal(String),
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppError::Validation(e) => write!(f, "{}", e),
            AppError::Token(e) => write!(f, "{}", e),
            AppError::Auth(e) => write!(f, "{}", e),
            AppError::Database(e) => write!(f, "{}", e),
            AppError::Internal(msg) => write!(f, "Internal error: {}", msg),
        }
    }
}

impl StdError for AppError {}

// ============================================================================
// FROM IMPLEMENTATIONS
// ============================================================================

impl From<ValidationError> for AppError {
    fn from(err: ValidationError) -> Self {
        AppError::Validation(err)
    }
}

impl From<TokenError> for AppError {
    fn from(err: TokenError) -> Self {
        AppError::Token(err)
    }
}

impl From<AuthError> for AppError {
    fn from(err: AuthError) -> Self {
        AppError::Auth(err)
    }
}

impl From<DatabaseError> for AppError {
    fn from(err: DatabaseError) -> Self {
        AppError::Database(err)
    }
}

impl From<sqlx::Error> for DatabaseError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::RowNotFound => DatabaseError::NotFound("Record".to_string()),
            sqlx::Error::Database(db_err)
                if db_err.code().as_deref() == Some("23505") =>
            {
                DatabaseError::UniqueConstraintViolation("Record".to_string())
            }
            sqlx::Error::Database(db_err) => DatabaseError::QueryExecution(db_err.to_string()),
            e @ (sqlx::Error::PoolTimedOut | sqlx::Error::PoolClosed | sqlx::Error::Io(_)) => {
                DatabaseError::ConnectionPool(e.to_string())
            }
            other => DatabaseError::UnexpectedError(other.to_string()),
        }
    }
}

impl From<sqlx::Error> for AppError {
    fn from(err: sqlx::Error) -> Self {
        AppError::Database(err.into())
    }
}

// ============================================================================
// 3. HTTP RESPONSE MAPPING
// ============================================================================

impl AppError {
    /// Message safe to show to the client
    pub fn client_message(&self) -> String {
        match self {
            AppError::Validation(e) => e.to_string(),
            AppError::Token(e) => e.to_string(),
            AppError::Auth(e) => e.to_string(),
            AppError::Database(e) => match e {
                DatabaseError::NotFound(_) | DatabaseError::UniqueConstraintViolation(_) => {
                    e.to_string()
                }
                _ => "Database error occurred".to_string(),
            },
            AppError::Internal(_) => "Internal server error".to_string(),
        }
    }

    fn log(&self, status: StatusCode) {
        if status.is_server_error() {
            tracing::error!(status = status.as_u16(), error = %self, "Request failed");
        } else {
            tracing::warn!(status = status.as_u16(), error = %self, "Request rejected");
        }
    }
}

impl ResponseError for AppError {
    fn status_code(&self) -> StatusCode {
        match self {
            AppError::Validation(_) => StatusCode::BAD_REQUEST,
            AppError::Token(_) => StatusCode::BAD_REQUEST,
            AppError::Auth(_) => StatusCode::UNAUTHORIZED,
            AppError::Database(e) => match e {
                DatabaseError::NotFound(_) => StatusCode::NOT_FOUND,
                DatabaseError::UniqueConstraintViolation(_) => StatusCode::CONFLICT,
                _ => StatusCode::INTERNAL_SERVER_ERROR,
            },
            AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        let status = self.status_code();
        self.log(status);

        HttpResponse::build(status).json(ApiResponse::<()>::failure(status, self.client_message()))
    }
}

// ============================================================================
// 4. ERROR CONTEXT ENRICHMENT
// ============================================================================

/// Operation context attached to store failures before they are translated
/// into a client-facing message.
#[derive(Debug, Clone)]
pub struct ErrorContext {
    pub operation: String,
    pub username: Option<String>,
}

impl ErrorContext {
    pub fn new(operation: impl Into<String>) -> Self {
        Self {
            operation: operation.into(),
            username: None,
        }
    }

    pub fn with_username(mut self, username: impl Into<String>) -> Self {
        self.username = Some(username.into());
        self
    }

    pub fn log_error(&self, error: &AppError) {
        let username = self.username.as_deref().unwrap_or("-");
        match error {
            AppError::Database(DatabaseError::NotFound(_)) | AppError::Validation(_) => {
                tracing::warn!(
                    operation = %self.operation,
                    username = %username,
                    error = %error,
                    "Operation rejected"
                );
            }
            _ => {
                tracing::error!(
                    operation = %self.operation,
                    username = %username,
                    error = %error,
                    "Operation failed"
                );
            }
        }
    }
}
