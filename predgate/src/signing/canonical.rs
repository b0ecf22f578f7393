//! Canonical request serialization.
//!
//! The canonical request is the first input of the signature. Its layout is fixed:
//!
//! ```text
//! METHOD
//! PATH
//! QUERY_STRING                      (always empty)
//! content-type:<value>
//! host:<value>
//! x-amz-date:<value>
//!                                   (blank line closes the header block)
//! content-type;host;x-amz-date
//! hex(sha256(body))
//! ```
//!
//! Header lines follow the order of [`SIGNED_HEADERS`] exactly. They are not sorted at runtime:
//! the verifier rebuilds the same string from the header list sent in the authorization header.

use sha2::{Digest, Sha256};

/// Names of the headers covered by the signature, lowercase and `;`-separated.
pub const SIGNED_HEADERS: &str = "content-type;host;x-amz-date";

/// Header values that take part in the canonical request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CanonicalHeaders<'a> {
    pub content_type: &'a str,
    pub host: &'a str,
    pub amz_date: &'a str,
}

/// Lowercase hex SHA-256 of `data`.
pub fn hex_sha256(data: &[u8]) -> String {
    hex::encode(Sha256::digest(data))
}

/// Build the canonical request string.
///
/// `body` must be the exact buffer that goes on the wire.
pub fn canonical_request(method: &str, path: &str, headers: &CanonicalHeaders<'_>, body: &[u8]) -> String {
    let query_string = "";
    let payload_hash = hex_sha256(body);

    format!(
        "{method}\n{path}\n{query_string}\n\
         content-type:{}\nhost:{}\nx-amz-date:{}\n\n\
         {SIGNED_HEADERS}\n{payload_hash}",
        headers.content_type, headers.host, headers.amz_date,
    )
}
