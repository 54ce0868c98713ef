//! Master password check for the `auth` action.
//!
//! Both the configured password and the candidate are reduced to an
//! HMAC-SHA256 under a per-process random key, and the tags are compared with
//! `verify_slice`. The comparison time does not depend on where the inputs
//! first differ, nor on their lengths.

use hmac::{Hmac, Mac};
use sha2::Sha256;

use crate::error::{ApiError, ApiResult};

type HmacSha256 = Hmac<Sha256>;

pub struct PasswordVerifier {
    key: [u8; 32],
    expected: Option<Vec<u8>>,
}

impl PasswordVerifier {
    /// Verifier for `master`. An unset or empty password rejects every
    /// attempt with a configuration error.
    pub fn new(master: Option<&str>) -> Self {
        let key: [u8; 32] = rand::random();
        let expected = master
            .filter(|m| !m.is_empty())
            .and_then(|m| Self::tag(&key, m).ok());
        Self { key, expected }
    }

    pub fn is_configured(&self) -> bool {
        self.expected.is_some()
    }

    fn mac(key: &[u8], value: &str) -> ApiResult<HmacSha256> {
        let mut mac = HmacSha256::new_from_slice(key)
            .map_err(|e| ApiError::configuration(format!("Invalid HMAC key: {}", e)))?;
        mac.update(value.as_bytes());
        Ok(mac)
    }

    fn tag(key: &[u8], value: &str) -> ApiResult<Vec<u8>> {
        Ok(Self::mac(key, value)?.finalize().into_bytes().to_vec())
    }

    /// Check `candidate` against the master password.
    pub fn verify(&self, candidate: &str) -> ApiResult<()> {
        let expected = self
            .expected
            .as_deref()
            .ok_or_else(|| ApiError::configuration("MASTER_PASSWORD is not configured"))?;

        Self::mac(&self.key, candidate)?
            .verify_slice(expected)
            .map_err(|_| ApiError::unauthorized("Invalid password"))
    }
}

impl std::fmt::Debug for PasswordVerifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PasswordVerifier")
            .field("configured", &self.is_configured())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_correct_password_accepted() {
        let verifier = PasswordVerifier::new(Some("open-sesame"));
        tokio_test::assert_ok!(verifier.verify("open-sesame"));
    }

    #[test]
    fn test_wrong_password_rejected_regardless_of_mismatch_position() {
        let verifier = PasswordVerifier::new(Some("open-sesame"));
        for candidate in ["Xpen-sesame", "open-sesamX", "open", "", "open-sesame-and-more"] {
            assert!(matches!(
                verifier.verify(candidate),
                Err(ApiError::Unauthorized(_))
            ));
        }
    }

    #[test]
    fn test_unconfigured_password_is_configuration_error() {
        for verifier in [PasswordVerifier::new(None), PasswordVerifier::new(Some(""))] {
            assert!(!verifier.is_configured());
            assert!(matches!(
                verifier.verify("anything"),
                Err(ApiError::Configuration(_))
            ));
        }
    }

    #[test]
    fn test_keys_differ_between_verifiers() {
        let a = PasswordVerifier::new(Some("x"));
        let b = PasswordVerifier::new(Some("x"));
        assert_ne!(a.key, b.key);
        assert_ne!(a.expected, b.expected);
    }
}
