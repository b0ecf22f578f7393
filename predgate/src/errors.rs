use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use thiserror::Error as ThisError;

use crate::dataset::{DatasetError, PANDAS_SPLIT_MEDIA_TYPE};
use crate::inference::InferenceError;
use crate::notifications::PublishError;

#[derive(ThisError, Debug)]
pub enum Error {
    /// Request declared a media type other than split JSON
    #[error(
        "Content-Type: '{}' is not supported. Supported content-types are ['{}'].",
        .content_type.as_deref().unwrap_or("None"),
        PANDAS_SPLIT_MEDIA_TYPE
    )]
    UnsupportedMediaType { content_type: Option<String> },

    /// Request had no body at all
    #[error("No request body supplied. Please provide a valid json request body in Pandas 'split' format.")]
    MissingBody,

    /// Body could not be read as a split-JSON batch
    #[error("Invalid request body supplied. Please provide a valid json request body in Pandas 'split' format. Cause: {0}")]
    InvalidBody(#[source] DatasetError),

    /// Batch and predictions disagree (e.g. row count mismatch)
    #[error("Prediction merge failed: {0}")]
    Validation(#[source] DatasetError),

    /// Remote inference call failed
    #[error(transparent)]
    Inference(#[from] InferenceError),

    /// Notification fan-out failed part way
    #[error(transparent)]
    Notification(#[from] PublishError),

    /// Configuration rejected at startup
    #[error("Invalid configuration: {message}")]
    InvalidConfig { message: String },
}

impl Error {
    pub fn status_code(&self) -> StatusCode {
        match self {
            Error::UnsupportedMediaType { .. } => StatusCode::UNSUPPORTED_MEDIA_TYPE,
            Error::MissingBody | Error::InvalidBody(_) | Error::Validation(_) => StatusCode::BAD_REQUEST,
            Error::Inference(_) | Error::Notification(_) | Error::InvalidConfig { .. } => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    /// Message returned to the caller. Client faults are described in full; server faults name
    /// the failing dependency without echoing remote response bodies.
    pub fn user_message(&self) -> String {
        match self {
            Error::Inference(err) => match err.status {
                Some(status) => format!("Inference endpoint request failed with status {status}"),
                None => "Inference endpoint request failed".to_string(),
            },
            Error::Notification(_) => "Failed to publish prediction notifications".to_string(),
            Error::InvalidConfig { .. } => "Internal server error".to_string(),
            _ => self.to_string(),
        }
    }
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        match &self {
            Error::Inference(_) | Error::Notification(_) | Error::InvalidConfig { .. } => {
                tracing::error!("Internal service error: {:#}", self);
            }
            Error::UnsupportedMediaType { .. } | Error::MissingBody | Error::InvalidBody(_) | Error::Validation(_) => {
                tracing::debug!("Client error: {}", self);
            }
        }

        let status = self.status_code();
        (status, Json(json!({ "error": self.user_message() }))).into_response()
    }
}
