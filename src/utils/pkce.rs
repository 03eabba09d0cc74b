//! PKCE (RFC 7636) verification for the authorization code grant (§4.A).

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use sha2::{Digest, Sha256};

pub const PKCE_METHOD_S256: &str = "S256";
pub const PKCE_METHOD_PLAIN: &str = "plain";

/// Verify `code_verifier` against `code_challenge` for the given method.
/// Unsupported methods verify false; the caller maps that to
/// `UnsupportedChallengeMethod` before reaching here.
pub fn verify_pkce(code_verifier: &str, code_challenge: &str, method: &str) -> bool {
    match method {
        PKCE_METHOD_S256 => constant_time_compare(&compute_s256_challenge(code_verifier), code_challenge),
        PKCE_METHOD_PLAIN => constant_time_compare(code_verifier, code_challenge),
        _ => false,
    }
}

/// `BASE64URL-NoPad(SHA256(code_verifier))`.
pub fn compute_s256_challenge(code_verifier: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(code_verifier.as_bytes());
    URL_SAFE_NO_PAD.encode(hasher.finalize())
}

fn constant_time_compare(a: &str, b: &str) -> bool {
    if a.len() != b.len() {
        return false;
    }

    let mut result = 0u8;
    for (x, y) in a.bytes().zip(b.bytes()) {
        result |= x ^ y;
    }
    result == 0
}

#[cfg(test)]
mod proptests {
    use super::*;
    use proptest::prelude::*;

    proptest! {
        #[test]
        fn s256_challenge_of_any_verifier_verifies(verifier in "[A-Za-z0-9._~-]{43,128}") {
            let challenge = compute_s256_challenge(&verifier);
            prop_assert!(verify_pkce(&verifier, &challenge, PKCE_METHOD_S256));
        }

        #[test]
        fn s256_rejects_any_mismatched_verifier(a in "[A-Za-z0-9._~-]{43,128}", b in "[A-Za-z0-9._~-]{43,128}") {
            prop_assume!(a != b);
            let challenge = compute_s256_challenge(&a);
            prop_assert!(!verify_pkce(&b, &challenge, PKCE_METHOD_S256));
        }

        #[test]
        fn plain_verifies_iff_equal(a in "[A-Za-z0-9._~-]{1,128}", b in "[A-Za-z0-9._~-]{1,128}") {
            prop_assert_eq!(verify_pkce(&a, &b, PKCE_METHOD_PLAIN), a == b);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // RFC 7636 Appendix B test vector.
    const VERIFIER: &str = "dBjftJeZ4CVP-mB92K27uhbUJU1p1r_wW1gFWFOEjXk";
    const CHALLENGE: &str = "E9Melhoa2OwvFrEMTJguCHaoeK1t8URWbuGJSstw-cM";

    #[test]
    fn test_verify_pkce_s256_valid() {
        assert!(verify_pkce(VERIFIER, CHALLENGE, "S256"));
    }

    #[test]
    fn test_verify_pkce_s256_invalid_verifier() {
        assert!(!verify_pkce("wrong_verifier_that_is_long_enough_to_pass_length", CHALLENGE, "S256"));
    }

    #[test]
    fn test_verify_pkce_plain_valid() {
        let verifier = "my_plain_code_verifier_that_is_at_least_43_chars";
        assert!(verify_pkce(verifier, verifier, "plain"));
    }

    #[test]
    fn test_verify_pkce_plain_invalid() {
        let verifier = "my_plain_code_verifier_that_is_at_least_43_chars";
        assert!(!verify_pkce(verifier, "different_challenge_value_that_is_also_long_enough", "plain"));
    }

    #[test]
    fn test_verify_pkce_unsupported_method() {
        assert!(!verify_pkce(VERIFIER, CHALLENGE, "unsupported"));
    }

    #[test]
    fn test_compute_s256_challenge() {
        assert_eq!(compute_s256_challenge(VERIFIER), CHALLENGE);
    }

    #[test]
    fn test_constant_time_compare_equal() {
        assert!(constant_time_compare("hello", "hello"));
        assert!(constant_time_compare("", ""));
    }

    #[test]
    fn test_constant_time_compare_not_equal() {
        assert!(!constant_time_compare("hello", "world"));
        assert!(!constant_time_compare("hello", "hello!"));
        assert!(!constant_time_compare("hello", "hell"));
    }
}
