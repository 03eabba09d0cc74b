use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::IdentityError;
use crate::utils::secret::random_token;

/// Claims carried by the session access JWT minted on login (§4.B).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SessionClaims {
    pub sub: String,
    pub role: String,
    pub iat: i64,
    pub exp: i64,
    pub iss: String,
    pub sid: String,
}

/// Claims carried by an OIDC ID token (§4.B).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct IdTokenClaims {
    pub iss: String,
    pub sub: String,
    pub aud: String,
    pub iat: i64,
    pub exp: i64,
    pub auth_time: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub nonce: Option<String>,
    pub name: String,
    pub email: String,
    pub email_verified: bool,
}

/// Symmetric HS256 signer/verifier, keyed by a process-wide secret configured
/// at startup (§4.B). Issuer string is `"jiko-auth"` for session JWTs and the
/// issuer's absolute URL for ID tokens.
#[derive(Clone)]
pub struct JwtManager {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    issuer: String,
}

pub const SESSION_JWT_EXPIRY_SECS: i64 = 15 * 60;

impl JwtManager {
    pub fn new(secret: &str, issuer: impl Into<String>) -> Self {
        Self {
            encoding_key: EncodingKey::from_secret(secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
            issuer: issuer.into(),
        }
    }

    /// Mint a 15-minute session JWT (§4.B).
    pub fn issue_session_token(&self, user_id: Uuid, role: &str) -> Result<String, IdentityError> {
        let now = Utc::now();
        let claims = SessionClaims {
            sub: user_id.to_string(),
            role: role.to_string(),
            iat: now.timestamp(),
            exp: (now + Duration::seconds(SESSION_JWT_EXPIRY_SECS)).timestamp(),
            iss: self.issuer.clone(),
            sid: random_token(16),
        };

        encode(&Header::new(Algorithm::HS256), &claims, &self.encoding_key)
            .map_err(|e| IdentityError::StoreError(format!("jwt signing failed: {e}")))
    }

    pub fn validate_session_token(&self, token: &str) -> Result<SessionClaims, IdentityError> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.set_issuer(&[&self.issuer]);

        decode::<SessionClaims>(token, &self.decoding_key, &validation)
            .map(|data| data.claims)
            .map_err(|e| match e.kind() {
                jsonwebtoken::errors::ErrorKind::ExpiredSignature => IdentityError::ExpiredToken,
                _ => IdentityError::InvalidToken,
            })
    }

    /// Mint a 1-hour OIDC ID token (§4.B).
    #[allow(clippy::too_many_arguments)]
    pub fn issue_id_token(
        &self,
        issuer_url: &str,
        user_id: Uuid,
        client_id: Uuid,
        auth_time: chrono::DateTime<Utc>,
        nonce: Option<&str>,
        name: &str,
        email: &str,
        email_verified: bool,
    ) -> Result<String, IdentityError> {
        let now = Utc::now();
        let claims = IdTokenClaims {
            iss: issuer_url.to_string(),
            sub: user_id.to_string(),
            aud: client_id.to_string(),
            iat: now.timestamp(),
            exp: (now + Duration::hours(1)).timestamp(),
            auth_time: auth_time.timestamp(),
            nonce: nonce.map(|n| n.to_string()),
            name: name.to_string(),
            email: email.to_string(),
            email_verified,
        };

        encode(&Header::new(Algorithm::HS256), &claims, &self.encoding_key)
            .map_err(|e| IdentityError::StoreError(format!("jwt signing failed: {e}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_session_token_roundtrip() {
        let manager = JwtManager::new("test-secret", "jiko-auth");
        let user_id = Uuid::new_v4();
        let token = manager.issue_session_token(user_id, "admin").unwrap();

        let claims = manager.validate_session_token(&token).unwrap();
        assert_eq!(claims.sub, user_id.to_string());
        assert_eq!(claims.role, "admin");
        assert_eq!(claims.iss, "jiko-auth");
    }

    #[test]
    fn test_session_token_rejects_wrong_secret() {
        let manager = JwtManager::new("test-secret", "jiko-auth");
        let other = JwtManager::new("different-secret", "jiko-auth");
        let token = manager.issue_session_token(Uuid::new_v4(), "user").unwrap();

        assert!(other.validate_session_token(&token).is_err());
    }

    #[test]
    fn test_session_token_rejects_garbage() {
        let manager = JwtManager::new("test-secret", "jiko-auth");
        assert!(manager.validate_session_token("not.a.jwt").is_err());
    }

    #[test]
    fn test_id_token_carries_nonce_and_claims() {
        let manager = JwtManager::new("test-secret", "jiko-auth");
        let user_id = Uuid::new_v4();
        let client_id = Uuid::new_v4();

        let token = manager
            .issue_id_token(
                "https://auth.example.com",
                user_id,
                client_id,
                Utc::now(),
                Some("n1"),
                "alice",
                "alice@x.test",
                true,
            )
            .unwrap();

        let mut validation = Validation::new(Algorithm::HS256);
        validation.set_audience(&[client_id.to_string()]);
        let data = decode::<IdTokenClaims>(&token, &manager.decoding_key, &validation).unwrap();

        assert_eq!(data.claims.sub, user_id.to_string());
        assert_eq!(data.claims.nonce.as_deref(), Some("n1"));
        assert!(data.claims.email_verified);
    }
}
