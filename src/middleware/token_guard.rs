/// Bearer Token Middleware
///
/// Wraps a resource so that every request must carry a bearer token of the
/// expected kind. Rejected requests never reach the wrapped service; on
/// success the token claims are placed in request extensions and the request
/// is passed through unchanged.

use actix_web::{
    body::EitherBody,
    dev::{forward_ready, Service, ServiceRequest, ServiceResponse, Transform},
    http::header::{self, HeaderMap},
    Error, HttpMessage,
};
use futures::future::LocalBoxFuture;
use std::rc::Rc;

use crate::auth::{Claims, TokenCodec, TokenKind};
use crate::error::{AppError, AuthError, ValidationError};

/// Whether the token must have been issued for the `{username}` in the path
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IdentityBinding {
    /// Any valid token of the expected kind is accepted
    Unchecked,
    /// `claims.username` must equal the path identity
    PathIdentity,
}

/// Token guard for protecting resources
///
/// ```ignore
/// web::resource("/users/{username}")
///     .wrap(TokenGuard::access(codec.clone()).bound_to_path())
/// ```
pub struct TokenGuard {
    codec: TokenCodec,
    kind: TokenKind,
    binding: IdentityBinding,
}

impl TokenGuard {
    pub fn new(codec: TokenCodec, kind: TokenKind) -> Self {
        Self {
            codec,
            kind,
            binding: IdentityBinding::Unchecked,
        }
    }

    pub fn access(codec: TokenCodec) -> Self {
        Self::new(codec, TokenKind::Access)
    }

    pub fn refresh(codec: TokenCodec) -> Self {
        Self::new(codec, TokenKind::Refresh)
    }

    pub fn bound_to_path(mut self) -> Self {
        self.binding = IdentityBinding::PathIdentity;
        self
    }
}

impl<S, B> Transform<S, ServiceRequest> for TokenGuard
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<EitherBody<B>>;
    type Error = Error;
    type InitError = ();
    type Transform = TokenGuardService<S>;
    type Future = std::future::Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        std::future::ready(Ok(TokenGuardService {
            service: Rc::new(service),
            codec: self.codec.clone(),
            kind: self.kind,
            binding: self.binding,
        }))
    }
}

pub struct TokenGuardService<S> {
    service: Rc<S>,
    codec: TokenCodec,
    kind: TokenKind,
    binding: IdentityBinding,
}

impl<S> TokenGuardService<S> {
    fn authorize(&self, req: &ServiceRequest) -> Result<Claims, AppError> {
        let token = bearer_token(req.headers()).ok_or(AuthError::MissingToken)?;

        let username = req
            .match_info()
            .get("username")
            .filter(|username| !username.is_empty())
            .ok_or_else(|| ValidationError::Required("Username".to_string()))?;

        let bound_to = match self.binding {
            IdentityBinding::PathIdentity => Some(username),
            IdentityBinding::Unchecked => None,
        };
        let claims = self.codec.parse_kind(&token, self.kind, bound_to)?;

        tracing::debug!(
            username = %claims.username,
            kind = %claims.kind,
            "Bearer token accepted"
        );
        Ok(claims)
    }
}

impl<S, B> Service<ServiceRequest> for TokenGuardService<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<EitherBody<B>>;
    type Error = Error;
    type Future = LocalBoxFuture<'static, Result<Self::Response, Self::Error>>;

    forward_ready!(service);

    fn call(&self, req: ServiceRequest) -> Self::Future {
        match self.authorize(&req) {
            Ok(claims) => {
                req.extensions_mut().insert(claims);

                let service = self.service.clone();
                Box::pin(async move {
                    service
                        .call(req)
                        .await
                        .map(ServiceResponse::map_into_left_body)
                })
            }
            Err(e) => {
                let response = req.error_response(e).map_into_right_body();
                Box::pin(async move { Ok(response) })
            }
        }
    }
}

/// Token from an `Authorization: Bearer <token>` header
pub fn bearer_token(headers: &HeaderMap) -> Option<String> {
    headers
        .get(header::AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
        .and_then(|h| h.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|token| !token.is_empty())
        .map(str::to_string)
}
