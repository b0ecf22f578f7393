//! Request signing for the inference endpoint.
//!
//! Implements the vendor's SigV4 header authentication byte for byte, so that the unmodified
//! remote service accepts our requests:
//!
//! - [`canonical`]: canonical request serialization
//! - [`key`]: per-day/region/service signing key derivation
//! - [`signature`]: string-to-sign, hex signature and `Authorization` header
//!
//! [`sign_request`] runs the three steps against one captured instant.

pub mod canonical;
pub mod key;
pub mod signature;

use std::fmt;

use chrono::{DateTime, Utc};

pub use canonical::SIGNED_HEADERS;
pub use key::SigningError;
pub use signature::{ALGORITHM, SigningTime};

/// Access key identifier and secret key.
///
/// Constructed once at startup and shared read-only; the secret never appears in `Debug` output.
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    access_key: String,
    secret_key: String,
}

impl Credentials {
    pub fn new(access_key: impl Into<String>, secret_key: impl Into<String>) -> Self {
        Self {
            access_key: access_key.into(),
            secret_key: secret_key.into(),
        }
    }

    pub fn access_key(&self) -> &str {
        &self.access_key
    }

    pub(crate) fn secret_key(&self) -> &str {
        &self.secret_key
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("access_key", &self.access_key)
            .field("secret_key", &"<redacted>")
            .finish()
    }
}

/// Everything a signature is bound to apart from credentials, time and payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SigningContext<'a> {
    pub host: &'a str,
    pub path: &'a str,
    pub region: &'a str,
    pub service: &'a str,
}

/// Headers a signed request must carry on top of its own `Content-Type` and `Host`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignedHeaders {
    /// Value for the `X-Amz-Date` header.
    pub amz_date: String,
    /// Value for the `Authorization` header.
    pub authorization: String,
}

/// Sign one request at `instant`.
///
/// `body` must be the buffer that is transmitted afterwards, unmodified.
pub fn sign_request(
    credentials: &Credentials,
    context: &SigningContext<'_>,
    method: &str,
    content_type: &str,
    body: &[u8],
    instant: DateTime<Utc>,
) -> Result<SignedHeaders, SigningError> {
    let time = SigningTime::new(instant);

    let canonical = canonical::canonical_request(
        method,
        context.path,
        &canonical::CanonicalHeaders {
            content_type,
            host: context.host,
            amz_date: time.amz_date(),
        },
        body,
    );

    let scope = signature::credential_scope(time.date_stamp(), context.region, context.service);
    let string_to_sign = signature::string_to_sign(time.amz_date(), &scope, &canonical);
    let signing_key = key::derive_signing_key(credentials.secret_key(), time.date_stamp(), context.region, context.service)?;
    let signature = signature::compute_signature(&signing_key, &string_to_sign)?;

    Ok(SignedHeaders {
        authorization: signature::authorization_header(credentials.access_key(), &scope, &signature),
        amz_date: time.amz_date().to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    const CONTENT_TYPE: &str = "application/json; format=pandas-split";
    const BODY: &[u8] = br#"{"columns":["feature"],"data":[[1],[2],[3]]}"#;

    fn context() -> SigningContext<'static> {
        SigningContext {
            host: "runtime.sagemaker.eu-west-1.amazonaws.com",
            path: "/endpoints/ml-ids/invocations",
            region: "eu-west-1",
            service: "sagemaker",
        }
    }

    #[test]
    fn test_sign_request_golden_vector() {
        let credentials = Credentials::new("ACCESS_KEY", "SECRET_KEY");
        let instant = Utc.with_ymd_and_hms(2024, 1, 1, 12, 0, 0).unwrap();

        let signed = sign_request(&credentials, &context(), "POST", CONTENT_TYPE, BODY, instant).unwrap();

        assert_eq!(signed.amz_date, "20240101T120000Z");
        assert_eq!(
            signed.authorization,
            "AWS4-HMAC-SHA256 Credential=ACCESS_KEY/20240101/eu-west-1/sagemaker/aws4_request, \
             SignedHeaders=content-type;host;x-amz-date, \
             Signature=566209f306399de4566f246b5a1763b34aab07c6904b8cb0512a5f8965b46dba"
        );
    }

    #[test]
    fn test_sign_request_depends_on_body() {
        let credentials = Credentials::new("ACCESS_KEY", "SECRET_KEY");
        let instant = Utc.with_ymd_and_hms(2024, 1, 1, 12, 0, 0).unwrap();

        let a = sign_request(&credentials, &context(), "POST", CONTENT_TYPE, BODY, instant).unwrap();
        let b = sign_request(&credentials, &context(), "POST", CONTENT_TYPE, b"{}", instant).unwrap();

        assert_eq!(a.amz_date, b.amz_date);
        assert_ne!(a.authorization, b.authorization);
    }

    #[test]
    fn test_scope_date_matches_timestamp_at_day_boundary() {
        let credentials = Credentials::new("ACCESS_KEY", "SECRET_KEY");
        let instant = Utc.with_ymd_and_hms(2023, 12, 31, 23, 59, 59).unwrap();

        let signed = sign_request(&credentials, &context(), "POST", CONTENT_TYPE, BODY, instant).unwrap();

        assert_eq!(signed.amz_date, "20231231T235959Z");
        assert!(signed.authorization.contains("Credential=ACCESS_KEY/20231231/eu-west-1/sagemaker/aws4_request"));
    }

    #[test]
    fn test_credentials_debug_redacts_secret() {
        let credentials = Credentials::new("ACCESS_KEY", "SECRET_KEY");
        let debug = format!("{credentials:?}");
        assert!(debug.contains("ACCESS_KEY"));
        assert!(!debug.contains("SECRET_KEY"));
    }
}
