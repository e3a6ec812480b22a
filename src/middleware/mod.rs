/// Middleware module
///
/// Bearer-token guarding and request logging.

mod request_logger;
mod token_guard;

pub use request_logger::RequestLogger;
pub use token_guard::bearer_token;
pub use token_guard::IdentityBinding;
pub use token_guard::TokenGuard;
