//! String-to-sign, signature and `Authorization` header assembly.

use chrono::{DateTime, Utc};

use super::canonical::{SIGNED_HEADERS, hex_sha256};
use super::key::{SCOPE_TERMINATOR, SigningError, SigningKey, hmac_sha256};

/// Signing algorithm identifier, first token of the string-to-sign and of the header.
pub const ALGORITHM: &str = "AWS4-HMAC-SHA256";

const AMZ_DATE_FORMAT: &str = "%Y%m%dT%H%M%SZ";
const DATE_STAMP_FORMAT: &str = "%Y%m%d";

/// The two textual forms of the single instant a request is signed at.
///
/// Both the `x-amz-date` header and the date stamp of the key derivation come from the same
/// value, so a request signed across midnight cannot end up with mismatching dates.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SigningTime {
    amz_date: String,
    date_stamp: String,
}

impl SigningTime {
    pub fn new(instant: DateTime<Utc>) -> Self {
        Self {
            amz_date: instant.format(AMZ_DATE_FORMAT).to_string(),
            date_stamp: instant.format(DATE_STAMP_FORMAT).to_string(),
        }
    }

    /// `YYYYMMDDTHHMMSSZ`
    pub fn amz_date(&self) -> &str {
        &self.amz_date
    }

    /// `YYYYMMDD`
    pub fn date_stamp(&self) -> &str {
        &self.date_stamp
    }
}

/// `YYYYMMDD/region/service/aws4_request`
pub fn credential_scope(date_stamp: &str, region: &str, service: &str) -> String {
    format!("{date_stamp}/{region}/{service}/{SCOPE_TERMINATOR}")
}

pub fn string_to_sign(amz_date: &str, credential_scope: &str, canonical_request: &str) -> String {
    format!(
        "{ALGORITHM}\n{amz_date}\n{credential_scope}\n{}",
        hex_sha256(canonical_request.as_bytes())
    )
}

/// Hex-encoded HMAC-SHA256 of the string-to-sign under the derived key.
pub fn compute_signature(key: &SigningKey, string_to_sign: &str) -> Result<String, SigningError> {
    Ok(hex::encode(hmac_sha256(key.as_bytes(), string_to_sign.as_bytes())?))
}

pub fn authorization_header(access_key: &str, credential_scope: &str, signature: &str) -> String {
    format!("{ALGORITHM} Credential={access_key}/{credential_scope}, SignedHeaders={SIGNED_HEADERS}, Signature={signature}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::signing::key::derive_signing_key;
    use chrono::TimeZone;

    #[test]
    fn test_signing_time_formats_one_instant() {
        let instant = Utc.with_ymd_and_hms(2024, 1, 1, 23, 59, 59).unwrap();
        let time = SigningTime::new(instant);

        assert_eq!(time.amz_date(), "20240101T235959Z");
        assert_eq!(time.date_stamp(), "20240101");
        assert!(time.amz_date().starts_with(time.date_stamp()));
    }

    #[test]
    fn test_credential_scope() {
        assert_eq!(
            credential_scope("20240101", "eu-west-1", "sagemaker"),
            "20240101/eu-west-1/sagemaker/aws4_request"
        );
    }

    #[test]
    fn test_string_to_sign_layout() {
        let canonical = "POST\n/endpoints/ml-ids/invocations\n\n\
                         content-type:application/json; format=pandas-split\n\
                         host:runtime.sagemaker.eu-west-1.amazonaws.com\n\
                         x-amz-date:20240101T120000Z\n\n\
                         content-type;host;x-amz-date\n\
                         b8ee6d38816c54c1c9e0bff18892726c52fa0428e885f8319206157b3cc27df4";
        let scope = credential_scope("20240101", "eu-west-1", "sagemaker");

        assert_eq!(
            string_to_sign("20240101T120000Z", &scope, canonical),
            "AWS4-HMAC-SHA256\n\
             20240101T120000Z\n\
             20240101/eu-west-1/sagemaker/aws4_request\n\
             8c715a12b6df09fe458a47c0b42583ebbbde258cc645fb8fec4f0e6b93313929"
        );
    }

    #[test]
    fn test_signature_and_header() {
        let key = derive_signing_key("SECRET_KEY", "20240101", "eu-west-1", "sagemaker").unwrap();
        let sts = "AWS4-HMAC-SHA256\n\
                   20240101T120000Z\n\
                   20240101/eu-west-1/sagemaker/aws4_request\n\
                   8c715a12b6df09fe458a47c0b42583ebbbde258cc645fb8fec4f0e6b93313929";

        let signature = compute_signature(&key, sts).unwrap();
        assert_eq!(signature, "566209f306399de4566f246b5a1763b34aab07c6904b8cb0512a5f8965b46dba");

        let header = authorization_header("ACCESS_KEY", "20240101/eu-west-1/sagemaker/aws4_request", &signature);
        assert_eq!(
            header,
            "AWS4-HMAC-SHA256 Credential=ACCESS_KEY/20240101/eu-west-1/sagemaker/aws4_request, \
             SignedHeaders=content-type;host;x-amz-date, \
             Signature=566209f306399de4566f246b5a1763b34aab07c6904b8cb0512a5f8965b46dba"
        );
    }
}
