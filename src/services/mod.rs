pub mod auth;
pub mod email;
pub mod oauth;
pub mod rate_limiter;

pub use auth::IdentityService;
pub use oauth::OAuthService;
