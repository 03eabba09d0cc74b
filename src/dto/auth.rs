use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// POST /api/v1/auth/register
#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    pub username: String,
    pub email: String,
    pub password: String,
}

#[derive(Debug, Serialize)]
#[serde(tag = "status")]
pub enum RegisterResponse {
    #[serde(rename = "created")]
    Created { id: Uuid, username: String, email: String },
    #[serde(rename = "verification_resent")]
    VerificationResent { email: String },
}

/// GET /api/v1/auth/verify-email?token=...
#[derive(Debug, Deserialize)]
pub struct VerifyEmailQuery {
    pub token: String,
}

/// POST /api/v1/auth/login
#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub identifier: String,
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct SessionTokenResponse {
    pub access_token: String,
    pub token_type: String,
    pub expires_in: i64,
}

#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub message: String,
}
