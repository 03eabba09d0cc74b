pub mod authorization_code;
pub mod memory;
pub mod oauth_client;
pub mod oauth_token;
pub mod user;

pub use authorization_code::{AuthorizationCodeRepository, SqlAuthorizationCodeRepository};
pub use memory::MemoryStore;
pub use oauth_client::{OAuthClientRepository, SqlOAuthClientRepository};
pub use oauth_token::{OAuthTokenRepository, SqlOAuthTokenRepository};
pub use user::{SqlUserRepository, UserRepository};
