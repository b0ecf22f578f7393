//! Signed client for the remote inference endpoint.
//!
//! [`InferenceClient`] abstracts "send a serialized batch, get one prediction per row back" so
//! the HTTP layer can be tested without a network. [`SigningHttpClient`] is the production
//! implementation: one SigV4-signed POST per call, no retries.

use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use chrono::Utc;
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE, HOST};
use thiserror::Error;
use url::Url;

use crate::dataset::{PANDAS_SPLIT_MEDIA_TYPE, Predictions};
use crate::signing::{self, ALGORITHM, Credentials, SigningContext, SigningError};

/// Header carrying the signing timestamp.
pub const AMZ_DATE_HEADER: &str = "x-amz-date";

/// Where and how invocations are addressed. Immutable once the client is built.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InferenceEndpoint {
    pub scheme: String,
    /// Host as sent in the `Host` header, including a non-default port if any.
    pub host: String,
    /// Absolute path of the invocation resource, e.g. `/endpoints/ml-ids/invocations`.
    pub path: String,
    pub region: String,
    pub service: String,
}

impl InferenceEndpoint {
    pub fn url(&self) -> Result<Url, url::ParseError> {
        Url::parse(&format!("{}://{}", self.scheme, self.host))?.join(&self.path)
    }

    pub fn algorithm(&self) -> &'static str {
        ALGORITHM
    }

    pub fn signing_context(&self) -> SigningContext<'_> {
        SigningContext {
            host: &self.host,
            path: &self.path,
            region: &self.region,
            service: &self.service,
        }
    }
}

/// What went wrong during an invocation.
#[derive(Debug, Error)]
pub enum InferenceFailure {
    #[error("request signing failed: {0}")]
    Signing(#[source] SigningError),

    #[error("transport error: {0}")]
    Transport(#[source] reqwest::Error),

    #[error("endpoint responded with HTTP {0}")]
    Status(u16),

    #[error("malformed response body: {0}")]
    MalformedBody(#[source] serde_json::Error),
}

/// Failed invocation: the cause, plus the status and body when a response was received.
#[derive(Debug, Error)]
#[error(
    "inference request failed: {cause}. Status code: [{}]. Response body: [{}]",
    display_or_none(.status.as_ref()),
    display_or_none(.body.as_ref())
)]
pub struct InferenceError {
    #[source]
    pub cause: InferenceFailure,
    pub status: Option<u16>,
    pub body: Option<String>,
}

fn display_or_none<T: std::fmt::Display>(value: Option<&T>) -> String {
    value.map_or_else(|| "None".to_string(), ToString::to_string)
}

impl InferenceError {
    /// The request never produced a response.
    pub fn transport(error: reqwest::Error) -> Self {
        Self {
            cause: InferenceFailure::Transport(error),
            status: None,
            body: None,
        }
    }

    /// The endpoint answered with a non-2xx status.
    pub fn status(status: u16, body: impl Into<String>) -> Self {
        Self {
            cause: InferenceFailure::Status(status),
            status: Some(status),
            body: Some(body.into()),
        }
    }
}

/// Sends a serialized batch for inference.
#[async_trait]
pub trait InferenceClient: Send + Sync {
    /// `body` is the split-JSON batch, forwarded byte for byte.
    async fn invoke(&self, body: Bytes) -> Result<Predictions, InferenceError>;
}

#[derive(Debug, Error)]
pub enum ClientBuildError {
    #[error("invalid inference endpoint url: {0}")]
    Url(#[from] url::ParseError),

    #[error("failed to build HTTP client: {0}")]
    Http(#[from] reqwest::Error),
}

/// SigV4-signing [`InferenceClient`] over reqwest.
#[derive(Debug, Clone)]
pub struct SigningHttpClient {
    credentials: Credentials,
    endpoint: InferenceEndpoint,
    url: Url,
    http: reqwest::Client,
}

impl SigningHttpClient {
    pub fn new(credentials: Credentials, endpoint: InferenceEndpoint, timeout: Duration) -> Result<Self, ClientBuildError> {
        let url = endpoint.url()?;
        let http = reqwest::Client::builder().timeout(timeout).build()?;

        Ok(Self {
            credentials,
            endpoint,
            url,
            http,
        })
    }

    pub fn endpoint(&self) -> &InferenceEndpoint {
        &self.endpoint
    }
}

#[async_trait]
impl InferenceClient for SigningHttpClient {
    #[tracing::instrument(skip_all, fields(url = %self.url, body_len = body.len()))]
    async fn invoke(&self, body: Bytes) -> Result<Predictions, InferenceError> {
        // One instant for both the header timestamp and the key's date stamp.
        let now = Utc::now();
        let signed = signing::sign_request(
            &self.credentials,
            &self.endpoint.signing_context(),
            "POST",
            PANDAS_SPLIT_MEDIA_TYPE,
            &body,
            now,
        )
        .map_err(|e| InferenceError {
            cause: InferenceFailure::Signing(e),
            status: None,
            body: None,
        })?;

        let response = self
            .http
            .post(self.url.clone())
            .header(CONTENT_TYPE, PANDAS_SPLIT_MEDIA_TYPE)
            .header(HOST, &self.endpoint.host)
            .header(AMZ_DATE_HEADER, &signed.amz_date)
            .header(AUTHORIZATION, &signed.authorization)
            .body(body)
            .send()
            .await
            .map_err(|e| {
                tracing::error!(error = %e, "Inference request failed before a response was received");
                InferenceError::transport(e)
            })?;

        let status = response.status();
        let text = response.text().await.map_err(|e| InferenceError {
            cause: InferenceFailure::Transport(e),
            status: Some(status.as_u16()),
            body: None,
        })?;

        if !status.is_success() {
            tracing::warn!(status = status.as_u16(), response_len = text.len(), "Inference endpoint returned an error");
            return Err(InferenceError::status(status.as_u16(), text));
        }

        let predictions: Predictions = serde_json::from_str(&text).map_err(|e| InferenceError {
            cause: InferenceFailure::MalformedBody(e),
            status: Some(status.as_u16()),
            body: Some(text.clone()),
        })?;

        tracing::debug!(status = status.as_u16(), predictions = predictions.len(), "Inference request completed");
        Ok(predictions)
    }
}
