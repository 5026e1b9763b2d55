//! Time-based one-time codes for email verification.
//!
//! Each identity (an email address) gets its own TOTP key, derived as
//! `HMAC-SHA256(shared_secret, identity)`, so a code issued for one address
//! is useless for another. Codes are 6-digit SHA-1 TOTP with a 30 second
//! step; verification accepts the current step and one step either side.
//! Nothing prevents a code from being replayed inside that window.

use chrono::Utc;
use hmac::{Hmac, Mac};
use sha2::Sha256;
use thiserror::Error;
use totp_rs::{Algorithm, TotpUrlError, TOTP};

pub const OTP_DIGITS: usize = 6;
pub const OTP_STEP_SECS: u64 = 30;
pub const OTP_SKEW_STEPS: u8 = 1;

#[derive(Debug, Error)]
pub enum OtpError {
    #[error("invalid OTP key length")]
    KeyLength,
    #[error("failed to build TOTP: {0:?}")]
    Totp(TotpUrlError),
}

impl From<TotpUrlError> for OtpError {
    fn from(err: TotpUrlError) -> Self {
        OtpError::Totp(err)
    }
}

#[derive(Clone)]
pub struct OtpGenerator {
    shared_secret: Vec<u8>,
}

impl std::fmt::Debug for OtpGenerator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OtpGenerator").finish_non_exhaustive()
    }
}

impl OtpGenerator {
    pub fn new(shared_secret: &str) -> Self {
        Self {
            shared_secret: shared_secret.as_bytes().to_vec(),
        }
    }

    fn totp_for(&self, identity: &str) -> Result<TOTP, OtpError> {
        let mut mac = Hmac::<Sha256>::new_from_slice(&self.shared_secret)
            .map_err(|_| OtpError::KeyLength)?;
        mac.update(identity.as_bytes());
        let key = mac.finalize().into_bytes().to_vec();

        Ok(TOTP::new(
            Algorithm::SHA1,
            OTP_DIGITS,
            OTP_SKEW_STEPS,
            OTP_STEP_SECS,
            key,
        )?)
    }

    /// Code for `identity` at the given unix time
    pub fn generate_at(&self, identity: &str, unix_secs: u64) -> Result<String, OtpError> {
        Ok(self.totp_for(identity)?.generate(unix_secs))
    }

    /// Code for `identity` right now
    pub fn generate(&self, identity: &str) -> Result<String, OtpError> {
        self.generate_at(identity, now_secs())
    }

    /// Whether `code` is valid for `identity` at the given unix time
    pub fn verify_at(&self, code: &str, identity: &str, unix_secs: u64) -> Result<bool, OtpError> {
        let code = code.trim();
        if code.len() != OTP_DIGITS || !code.bytes().all(|b| b.is_ascii_digit()) {
            return Ok(false);
        }
        Ok(self.totp_for(identity)?.check(code, unix_secs))
    }

    /// Whether `code` is valid for `identity` right now
    pub fn verify(&self, code: &str, identity: &str) -> Result<bool, OtpError> {
        self.verify_at(code, identity, now_secs())
    }
}

fn now_secs() -> u64 {
    u64::try_from(Utc::now().timestamp()).unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    const T0: u64 = 1_700_000_010;

    fn otp() -> OtpGenerator {
        OtpGenerator::new("test-otp-secret")
    }

    #[test]
    fn test_generate_shape() {
        let code = otp().generate_at("a@x.com", T0).unwrap();
        assert_eq!(code.len(), OTP_DIGITS);
        assert!(code.chars().all(|c| c.is_ascii_digit()));
    }

    #[test]
    fn test_verify_current_window() {
        let otp = otp();
        let code = otp.generate_at("a@x.com", T0).unwrap();
        assert!(otp.verify_at(&code, "a@x.com", T0).unwrap());
        assert!(otp.verify_at(&format!(" {} ", code), "a@x.com", T0).unwrap());
    }

    #[test]
    fn test_verify_adjacent_window() {
        let otp = otp();
        let code = otp.generate_at("a@x.com", T0).unwrap();
        assert!(otp.verify_at(&code, "a@x.com", T0 + OTP_STEP_SECS).unwrap());
        assert!(otp.verify_at(&code, "a@x.com", T0 - OTP_STEP_SECS).unwrap());
    }

    #[test]
    fn test_expired_code_rejected() {
        let otp = otp();
        let code = otp.generate_at("a@x.com", T0).unwrap();
        let later = otp.generate_at("a@x.com", T0 + 10 * OTP_STEP_SECS).unwrap();
        // Guard against a coincidental collision between the two windows
        if code != later {
            assert!(!otp.verify_at(&code, "a@x.com", T0 + 10 * OTP_STEP_SECS).unwrap());
        }
    }

    #[test]
    fn test_codes_bound_to_identity_and_secret() {
        let otp = otp();
        let a = otp.generate_at("a@x.com", T0).unwrap();
        let b = otp.generate_at("b@x.com", T0).unwrap();
        let other_secret = OtpGenerator::new("other").generate_at("a@x.com", T0).unwrap();

        if a != b {
            assert!(!otp.verify_at(&a, "b@x.com", T0).unwrap());
        }
        if a != other_secret {
            assert!(!otp.verify_at(&other_secret, "a@x.com", T0).unwrap());
        }
    }

    #[test]
    fn test_malformed_codes_rejected() {
        let otp = otp();
        assert!(!otp.verify_at("", "a@x.com", T0).unwrap());
        assert!(!otp.verify_at("12345", "a@x.com", T0).unwrap());
        assert!(!otp.verify_at("abcdef", "a@x.com", T0).unwrap());
    }
}
