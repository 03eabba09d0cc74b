pub mod authorization_code;
pub mod oauth_client;
pub mod oauth_token;
pub mod user;

pub use authorization_code::AuthorizationCode;
pub use oauth_client::{Grant, OAuthClient};
pub use oauth_token::{AccessToken, RefreshToken};
pub use user::{Role, User};
