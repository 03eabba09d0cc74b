pub mod jwt_auth;
pub mod oauth_auth;

pub use jwt_auth::{AdminUser, AuthUser, GuardError};
pub use oauth_auth::{FlexibleUser, OpaqueUser};
