//! Signing key derivation.
//!
//! The long-lived secret never signs anything directly. It is narrowed through four chained
//! HMAC-SHA256 steps into a key bound to one day, one region and one service:
//!
//! ```text
//! k_date    = HMAC("AWS4" + secret, date_stamp)
//! k_region  = HMAC(k_date, region)
//! k_service = HMAC(k_region, service)
//! k_signing = HMAC(k_service, "aws4_request")
//! ```

use std::fmt;

use hmac::{Hmac, Mac};
use sha2::Sha256;
use thiserror::Error;

type HmacSha256 = Hmac<Sha256>;

/// Prefix prepended to the secret to form the first HMAC key.
const SECRET_PREFIX: &str = "AWS4";

/// Literal closing every credential scope and the derivation chain.
pub const SCOPE_TERMINATOR: &str = "aws4_request";

/// Raw derived key. Only ever used as an HMAC key; never transmitted or logged.
#[derive(Clone, PartialEq, Eq)]
pub struct SigningKey([u8; 32]);

impl SigningKey {
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }
}

impl fmt::Debug for SigningKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SigningKey(..)")
    }
}

#[derive(Debug, Error)]
pub enum SigningError {
    #[error("HMAC key rejected by the MAC implementation")]
    InvalidKey,
}

/// HMAC-SHA256 of `message` under `key`.
pub(crate) fn hmac_sha256(key: &[u8], message: &[u8]) -> Result<[u8; 32], SigningError> {
    let mut mac = HmacSha256::new_from_slice(key).map_err(|_| SigningError::InvalidKey)?;
    mac.update(message);

    let mut out = [0u8; 32];
    out.copy_from_slice(&mac.finalize().into_bytes());
    Ok(out)
}

/// Derive the signing key for `date_stamp` (`YYYYMMDD`), `region` and `service`.
pub fn derive_signing_key(secret_key: &str, date_stamp: &str, region: &str, service: &str) -> Result<SigningKey, SigningError> {
    let k_secret = format!("{SECRET_PREFIX}{secret_key}");
    let k_date = hmac_sha256(k_secret.as_bytes(), date_stamp.as_bytes())?;
    let k_region = hmac_sha256(&k_date, region.as_bytes())?;
    let k_service = hmac_sha256(&k_region, service.as_bytes())?;
    Ok(SigningKey(hmac_sha256(&k_service, SCOPE_TERMINATOR.as_bytes())?))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_derive_signing_key_published_example() {
        // Example from the AWS "Deriving the signing key" documentation.
        let key = derive_signing_key("wJalrXUtnFEMI/K7MDENG+bPxRfiCYEXAMPLEKEY", "20120215", "us-east-1", "iam").unwrap();
        assert_eq!(
            hex::encode(key.as_bytes()),
            "f4780e2d9f65fa895f9c67b32ce1baf0b0d8a43505a000a1a9e090d414db404d"
        );
    }

    #[test]
    fn test_derive_signing_key_inference_scope() {
        let key = derive_signing_key("SECRET_KEY", "20240101", "eu-west-1", "sagemaker").unwrap();
        assert_eq!(
            hex::encode(key.as_bytes()),
            "da954284603f7035e46040d9c318b732c37772cf8348966f55f656fdc1ace15e"
        );
    }

    #[test]
    fn test_derive_signing_key_is_deterministic() {
        let a = derive_signing_key("secret", "20240101", "eu-west-1", "sagemaker").unwrap();
        let b = derive_signing_key("secret", "20240101", "eu-west-1", "sagemaker").unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_every_input_changes_the_key() {
        let base = derive_signing_key("secret", "20240101", "eu-west-1", "sagemaker").unwrap();

        let variants = [
            derive_signing_key("secret2", "20240101", "eu-west-1", "sagemaker").unwrap(),
            derive_signing_key("secret", "20240102", "eu-west-1", "sagemaker").unwrap(),
            derive_signing_key("secret", "20240101", "eu-west-2", "sagemaker").unwrap(),
            derive_signing_key("secret", "20240101", "eu-west-1", "sns").unwrap(),
        ];

        for (i, variant) in variants.iter().enumerate() {
            assert_ne!(&base, variant, "variant {i} collided with the base key");
        }
        for (i, a) in variants.iter().enumerate() {
            for b in &variants[i + 1..] {
                assert_ne!(a, b);
            }
        }
    }

    #[test]
    fn test_empty_secret_still_derives() {
        let key = derive_signing_key("", "20240101", "eu-west-1", "sagemaker").unwrap();
        assert_eq!(key.as_bytes().len(), 32);
        assert!(hmac_sha256(&[], b"message").is_ok());
    }

    #[test]
    fn test_debug_hides_key_material() {
        let key = derive_signing_key("secret", "20240101", "eu-west-1", "sagemaker").unwrap();
        assert_eq!(format!("{key:?}"), "SigningKey(..)");
    }
}
