//! OAuth2/OIDC request and response shapes for the `oauth` route group (§4.E, §6).

use serde::{Deserialize, Serialize};

/// GET /api/v1/oauth/authorize
#[derive(Debug, Clone, Deserialize)]
pub struct AuthorizeQuery {
    pub response_type: String,
    pub client_id: String,
    pub redirect_uri: String,
    #[serde(default)]
    pub scope: Option<String>,
    pub state: Option<String>,
    pub code_challenge: Option<String>,
    pub code_challenge_method: Option<String>,
    pub nonce: Option<String>,
}

/// POST /api/v1/oauth/authorize/approve
#[derive(Debug, Clone, Deserialize)]
pub struct ApproveRequest {
    pub approved: bool,
    pub client_id: String,
    pub redirect_uri: String,
    #[serde(default)]
    pub scope: Option<String>,
    pub state: Option<String>,
    pub code_challenge: Option<String>,
    pub code_challenge_method: Option<String>,
    pub nonce: Option<String>,
}

/// POST /api/v1/oauth/token. Supports exactly `authorization_code` and
/// `refresh_token` (§1 Non-goals excludes the other RFC 6749 grants).
#[derive(Debug, Clone, Deserialize)]
pub struct TokenRequest {
    pub grant_type: String,
    pub code: Option<String>,
    pub redirect_uri: Option<String>,
    pub client_id: Option<String>,
    pub client_secret: Option<String>,
    pub code_verifier: Option<String>,
    pub refresh_token: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct TokenResponse {
    pub access_token: String,
    pub token_type: String,
    pub expires_in: i64,
    pub refresh_token: String,
    pub scope: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id_token: Option<String>,
}

/// POST /api/v1/oauth/introspect
#[derive(Debug, Clone, Deserialize)]
pub struct IntrospectRequest {
    pub token: String,
    pub token_type_hint: Option<String>,
    pub client_id: String,
    pub client_secret: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct IntrospectResponse {
    pub active: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub client_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scope: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub token_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub exp: Option<i64>,
}

/// POST /api/v1/oauth/revoke
#[derive(Debug, Clone, Deserialize)]
pub struct RevokeRequest {
    pub token: String,
    pub token_type_hint: Option<String>,
    pub client_id: Option<String>,
    pub client_secret: Option<String>,
}

/// GET /api/v1/oauth/userinfo
#[derive(Debug, Clone, Serialize)]
pub struct UserInfoResponse {
    pub sub: String,
    pub email: String,
    pub email_verified: bool,
    pub name: String,
}

/// GET /.well-known/openid-configuration
#[derive(Debug, Clone, Serialize)]
pub struct OpenIdConfiguration {
    pub issuer: String,
    pub authorization_endpoint: String,
    pub token_endpoint: String,
    pub userinfo_endpoint: String,
    pub revocation_endpoint: String,
    pub introspection_endpoint: String,
    pub response_types_supported: Vec<String>,
    pub grant_types_supported: Vec<String>,
    pub scopes_supported: Vec<String>,
    pub token_endpoint_auth_methods_supported: Vec<String>,
    pub code_challenge_methods_supported: Vec<String>,
}

impl OpenIdConfiguration {
    pub fn new(issuer: &str) -> Self {
        Self {
            issuer: issuer.to_string(),
            authorization_endpoint: format!("{issuer}/api/v1/oauth/authorize"),
            token_endpoint: format!("{issuer}/api/v1/oauth/token"),
            userinfo_endpoint: format!("{issuer}/api/v1/oauth/userinfo"),
            revocation_endpoint: format!("{issuer}/api/v1/oauth/revoke"),
            introspection_endpoint: format!("{issuer}/api/v1/oauth/introspect"),
            response_types_supported: vec!["code".to_string()],
            grant_types_supported: vec!["authorization_code".to_string(), "refresh_token".to_string()],
            scopes_supported: vec!["openid".to_string(), "profile".to_string(), "email".to_string()],
            token_endpoint_auth_methods_supported: vec!["client_secret_post".to_string()],
            code_challenge_methods_supported: vec!["S256".to_string(), "plain".to_string()],
        }
    }
}
