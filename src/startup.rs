use actix_web::dev::Server;
use actix_web::{error, middleware::Logger, web, App, HttpServer};
use std::net::TcpListener;
use std::sync::Arc;

use crate::auth::{AuthService, TokenCodec};
use crate::configuration::{HashingSettings, JwtSettings};
use crate::error::{AppError, ValidationError};
use crate::middleware::{RequestLogger, TokenGuard};
use crate::routes::{
    create_user, delete_user, exchange_token, get_user, health_check, issue_tokens, sign_out,
    update_user, user_exists,
};
use crate::store::CredentialStore;

pub fn run(
    listener: TcpListener,
    store: Arc<dyn CredentialStore>,
    jwt_config: JwtSettings,
    hashing: HashingSettings,
) -> Result<Server, std::io::Error> {
    let codec = TokenCodec::new(&jwt_config);
    let auth_service = web::Data::new(AuthService::new(Arc::clone(&store), codec.clone()));
    let store = web::Data::from(store);
    let hashing = web::Data::new(hashing);

    let server = HttpServer::new(move || {
        App::new()
            // Global middleware
            .wrap(Logger::default())
            .wrap(RequestLogger)

            // Shared state
            .app_data(store.clone())
            .app_data(auth_service.clone())
            .app_data(hashing.clone())
            .app_data(web::JsonConfig::default().error_handler(|err, _req| {
                tracing::warn!(error = %err, "Rejected request body");
                error::Error::from(AppError::Validation(ValidationError::MalformedBody))
            }))
            .app_data(web::QueryConfig::default().error_handler(|err, _req| {
                tracing::warn!(error = %err, "Rejected query string");
                error::Error::from(AppError::Validation(ValidationError::MalformedQuery))
            }))

            .route("/health", web::get().to(health_check))
            .service(
                web::scope("/v1")
                    // Public routes
                    .route("/users", web::post().to(create_user))
                    .route("/users/exists", web::get().to(user_exists))
                    .route("/users/{username}/authorize", web::get().to(issue_tokens))

                    // Refresh token required
                    .service(
                        web::resource("/users/{username}/token")
                            .wrap(TokenGuard::refresh(codec.clone()))
                            .route(web::get().to(exchange_token)),
                    )

                    // Access token issued for {username} required
                    .service(
                        web::resource("/users/{username}/sessions")
                            .wrap(TokenGuard::access(codec.clone()).bound_to_path())
                            .route(web::delete().to(sign_out)),
                    )
                    .service(
                        web::resource("/users/{username}")
                            .wrap(TokenGuard::access(codec.clone()).bound_to_path())
                            .route(web::get().to(get_user))
                            .route(web::put().to(update_user))
                            .route(web::delete().to(delete_user)),
                    ),
            )
    })
    .listen(listener)?
    .run();

    Ok(server)
}
