use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

/// Identity service errors (registration, verification, login).
#[derive(Debug, thiserror::Error)]
pub enum IdentityError {
    #[error("password does not meet the strength policy")]
    WeakPassword,

    #[error("username already taken")]
    UsernameTaken,

    #[error("email already registered")]
    EmailTaken,

    #[error("too soon, try again later")]
    TooSoon,

    #[error("invalid credentials")]
    InvalidCredentials,

    #[error("email not verified")]
    EmailNotVerified,

    #[error("invalid token")]
    InvalidToken,

    #[error("token expired")]
    ExpiredToken,

    #[error("storage error: {0}")]
    StoreError(String),

    #[error("mail delivery error: {0}")]
    MailError(String),
}

impl From<anyhow::Error> for IdentityError {
    fn from(e: anyhow::Error) -> Self {
        IdentityError::StoreError(e.to_string())
    }
}

impl From<sqlx::Error> for IdentityError {
    fn from(e: sqlx::Error) -> Self {
        IdentityError::StoreError(e.to_string())
    }
}

impl IntoResponse for IdentityError {
    fn into_response(self) -> Response {
        let (status, error_type) = match &self {
            IdentityError::WeakPassword => (StatusCode::BAD_REQUEST, "weak_password"),
            IdentityError::UsernameTaken => (StatusCode::BAD_REQUEST, "username_taken"),
            IdentityError::EmailTaken => (StatusCode::BAD_REQUEST, "email_taken"),
            IdentityError::TooSoon => (StatusCode::BAD_REQUEST, "too_soon"),
            IdentityError::InvalidCredentials => (StatusCode::UNAUTHORIZED, "invalid_credentials"),
            IdentityError::EmailNotVerified => (StatusCode::UNAUTHORIZED, "email_not_verified"),
            IdentityError::InvalidToken => (StatusCode::UNAUTHORIZED, "invalid_token"),
            IdentityError::ExpiredToken => (StatusCode::UNAUTHORIZED, "expired_token"),
            IdentityError::StoreError(_) => (StatusCode::INTERNAL_SERVER_ERROR, "store_error"),
            IdentityError::MailError(_) => (StatusCode::INTERNAL_SERVER_ERROR, "mail_error"),
        };

        if matches!(self, IdentityError::StoreError(_)) {
            tracing::error!(error = %self, "identity store error");
        }

        let body = Json(ErrorResponse {
            error: error_type.to_string(),
            message: self.to_string(),
            status_code: status.as_u16(),
        });

        (status, body).into_response()
    }
}

/// OAuth2/OIDC protocol engine errors.
#[derive(Debug, thiserror::Error)]
pub enum OAuthError {
    #[error("invalid client")]
    InvalidClient,

    #[error("invalid redirect_uri")]
    InvalidRedirectURI,

    #[error("unsupported response_type")]
    UnsupportedResponseType,

    #[error("invalid grant")]
    InvalidGrant,

    #[error("client mismatch")]
    ClientMismatch,

    #[error("authorization code already used")]
    CodeAlreadyUsed,

    #[error("authorization code expired")]
    CodeExpired,

    #[error("redirect_uri mismatch")]
    RedirectMismatch,

    #[error("invalid code_verifier")]
    InvalidVerifier,

    #[error("unsupported code_challenge_method")]
    UnsupportedChallengeMethod,

    #[error("refresh token expired or revoked")]
    RefreshExpired,

    #[error("unsupported token_type_hint")]
    UnsupportedHint,

    #[error("storage error: {0}")]
    StoreError(String),
}

impl From<anyhow::Error> for OAuthError {
    fn from(e: anyhow::Error) -> Self {
        OAuthError::StoreError(e.to_string())
    }
}

impl From<sqlx::Error> for OAuthError {
    fn from(e: sqlx::Error) -> Self {
        OAuthError::StoreError(e.to_string())
    }
}

impl From<IdentityError> for OAuthError {
    fn from(e: IdentityError) -> Self {
        match e {
            IdentityError::InvalidToken | IdentityError::ExpiredToken => OAuthError::InvalidGrant,
            other => OAuthError::StoreError(other.to_string()),
        }
    }
}

impl IntoResponse for OAuthError {
    fn into_response(self) -> Response {
        let (status, error_type) = match &self {
            OAuthError::InvalidClient => (StatusCode::UNAUTHORIZED, "invalid_client"),
            OAuthError::InvalidRedirectURI => (StatusCode::BAD_REQUEST, "invalid_redirect_uri"),
            OAuthError::UnsupportedResponseType => {
                (StatusCode::BAD_REQUEST, "unsupported_response_type")
            }
            OAuthError::InvalidGrant => (StatusCode::BAD_REQUEST, "invalid_grant"),
            OAuthError::ClientMismatch => (StatusCode::BAD_REQUEST, "client_mismatch"),
            OAuthError::CodeAlreadyUsed => (StatusCode::BAD_REQUEST, "code_already_used"),
            OAuthError::CodeExpired => (StatusCode::BAD_REQUEST, "code_expired"),
            OAuthError::RedirectMismatch => (StatusCode::BAD_REQUEST, "redirect_mismatch"),
            OAuthError::InvalidVerifier => (StatusCode::BAD_REQUEST, "invalid_verifier"),
            OAuthError::UnsupportedChallengeMethod => {
                (StatusCode::BAD_REQUEST, "unsupported_challenge_method")
            }
            OAuthError::RefreshExpired => (StatusCode::BAD_REQUEST, "refresh_expired"),
            OAuthError::UnsupportedHint => (StatusCode::UNAUTHORIZED, "unsupported_hint"),
            OAuthError::StoreError(_) => (StatusCode::INTERNAL_SERVER_ERROR, "store_error"),
        };

        if matches!(self, OAuthError::StoreError(_)) {
            tracing::error!(error = %self, "oauth store error");
        }

        let body = Json(ErrorResponse {
            error: error_type.to_string(),
            message: self.to_string(),
            status_code: status.as_u16(),
        });

        (status, body).into_response()
    }
}

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub message: String,
    pub status_code: u16,
}
