/// Authentication module
///
/// Handles token issuance/parsing, password hashing, and the
/// refresh-to-access issuance flow.

mod claims;
mod jwt;
mod password;
mod service;

pub use claims::Claims;
pub use claims::TokenKind;
pub use jwt::TokenCodec;
pub use password::hash_password;
pub use password::verify_password;
pub use service::AccessToken;
pub use service::AuthService;
pub use service::TokenPair;
