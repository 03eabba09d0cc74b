use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use rand::RngCore;
use sha2::{Digest, Sha256};

use crate::error::OAuthError;

/// bcrypt cost factor used for client secrets and the admin password (§4.A: cost >= 10).
pub const BCRYPT_COST: u32 = 12;

/// Generate a cryptographically secure random token: N random bytes,
/// URL-safe base64 without padding (§4.A). Used for authorization codes,
/// access/refresh tokens, client secrets, and email verification tokens.
pub fn random_token(n_bytes: usize) -> String {
    let mut bytes = vec![0u8; n_bytes];
    rand::thread_rng().fill_bytes(&mut bytes);
    URL_SAFE_NO_PAD.encode(bytes)
}

/// Hash a client secret using bcrypt.
pub fn hash_secret(secret: &str) -> Result<String, OAuthError> {
    bcrypt::hash(secret, BCRYPT_COST)
        .map_err(|e| OAuthError::StoreError(format!("secret hashing failed: {e}")))
}

/// Verify a client secret against its stored bcrypt hash.
pub fn verify_secret(secret: &str, hash: &str) -> Result<bool, OAuthError> {
    bcrypt::verify(secret, hash)
        .map_err(|e| OAuthError::StoreError(format!("secret verification failed: {e}")))
}

/// Hash an opaque token (access/refresh/authorization code) with SHA-256 before
/// it touches storage. Tokens are already high-entropy, so no salt is needed.
pub fn hash_oauth_token(token: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(token.as_bytes());
    URL_SAFE_NO_PAD.encode(hasher.finalize())
}

/// Constant-time string comparison, used wherever a hash or secret is compared
/// to attacker-controlled input.
pub fn constant_time_compare(a: &str, b: &str) -> bool {
    if a.len() != b.len() {
        return false;
    }

    let mut result = 0u8;
    for (x, y) in a.bytes().zip(b.bytes()) {
        result |= x ^ y;
    }
    result == 0
}
