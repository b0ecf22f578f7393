use axum::{
    Json,
    extract::State,
    http::{HeaderMap, header::CONTENT_TYPE},
};
use bytes::Bytes;
use tracing::{info, instrument};

use crate::AppState;
use crate::dataset::{Dataset, PANDAS_SPLIT_MEDIA_TYPE, Predictions, merge_predictions};
use crate::errors::Error;

/// Accept only the split-JSON media type, ignoring case and surrounding whitespace.
fn check_content_type(headers: &HeaderMap) -> Result<(), Error> {
    let declared = headers.get(CONTENT_TYPE).map(|v| String::from_utf8_lossy(v.as_bytes()).into_owned());

    if declared
        .as_deref()
        .is_some_and(|value| value.trim().eq_ignore_ascii_case(PANDAS_SPLIT_MEDIA_TYPE))
    {
        return Ok(());
    }

    Err(Error::UnsupportedMediaType { content_type: declared })
}

/// Classify a batch of network-flow records.
///
/// The body is forwarded to the inference endpoint unchanged. Every row is then published with
/// its prediction before the raw predictions are returned in row order.
#[instrument(skip_all, fields(body_len = body.len()))]
pub async fn create_predictions(State(state): State<AppState>, headers: HeaderMap, body: Bytes) -> Result<Json<Predictions>, Error> {
    check_content_type(&headers)?;

    if body.is_empty() {
        return Err(Error::MissingBody);
    }

    // Reject malformed batches before spending an inference call on them
    let dataset = Dataset::from_json(&body).map_err(Error::InvalidBody)?;

    let predictions = state.inference.invoke(body).await?;
    let predicted = merge_predictions(dataset, &predictions).map_err(Error::Validation)?;

    let published = state.notifier.publish_predictions(&predicted).await?;
    info!(rows = predicted.len(), published, "Prediction batch processed");

    Ok(Json(predictions))
}
