//! Per-row prediction notifications.
//!
//! - [`Publisher`]: the publish/subscribe primitive (`publish(topic, message, attributes)`)
//! - [`PredictionPublisher`]: fans a [`PredictedDataset`] out as one message per row
//! - [`sns`]: the Amazon SNS backed [`Publisher`]
//!
//! Messages go out sequentially in row order. The first failed publish aborts the rest of the
//! batch and is returned to the caller; nothing is retried here.

pub mod sns;

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use serde::Serialize;
use thiserror::Error;
use tracing::{debug, instrument};

use crate::dataset::PredictedDataset;

pub use sns::SnsPublisher;

/// Attribute key carrying the [`ThreatLabel`] of a row.
pub const PREDICTION_ATTRIBUTE: &str = "prediction";

/// Categorical label derived from a prediction.
///
/// Strictly binary: `1` is an attack, every other value (including unexpected classes such as
/// `2`) is reported as benign.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ThreatLabel {
    Attack,
    Benign,
}

impl ThreatLabel {
    pub fn from_prediction(prediction: i64) -> Self {
        if prediction == 1 { Self::Attack } else { Self::Benign }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Attack => "attack",
            Self::Benign => "benign",
        }
    }
}

impl fmt::Display for ThreatLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Typed message attribute value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct MessageAttribute {
    pub data_type: String,
    pub string_value: String,
}

impl MessageAttribute {
    pub fn string(value: impl Into<String>) -> Self {
        Self {
            data_type: "String".to_string(),
            string_value: value.into(),
        }
    }
}

pub type MessageAttributes = BTreeMap<String, MessageAttribute>;

#[derive(Debug, Error)]
pub enum PublishError {
    #[error("failed to serialize row {row}: {source}")]
    Serialize {
        row: usize,
        #[source]
        source: serde_json::Error,
    },

    #[error("invalid message attribute '{name}': {message}")]
    InvalidAttribute { name: String, message: String },

    #[error("failed to publish to {topic}: {message}")]
    Delivery { topic: String, message: String },
}

/// Publish/subscribe primitive.
#[async_trait]
pub trait Publisher: Send + Sync {
    async fn publish(&self, topic: &str, message: &str, attributes: &MessageAttributes) -> Result<(), PublishError>;
}

/// Emits one notification per predicted row to a fixed topic.
#[derive(Clone)]
pub struct PredictionPublisher {
    publisher: Arc<dyn Publisher>,
    topic: String,
}

impl PredictionPublisher {
    pub fn new(publisher: Arc<dyn Publisher>, topic: impl Into<String>) -> Self {
        Self {
            publisher,
            topic: topic.into(),
        }
    }

    pub fn topic(&self) -> &str {
        &self.topic
    }

    /// Publish every row of `data` in order. Returns the number of messages sent.
    #[instrument(skip_all, fields(topic = %self.topic, rows = data.len()))]
    pub async fn publish_predictions(&self, data: &PredictedDataset) -> Result<usize, PublishError> {
        let mut published = 0;

        for row in data.rows() {
            let label = ThreatLabel::from_prediction(row.prediction);
            let message = row.to_message().map_err(|source| PublishError::Serialize {
                row: row.position,
                source,
            })?;
            let attributes = MessageAttributes::from([(PREDICTION_ATTRIBUTE.to_string(), MessageAttribute::string(label.as_str()))]);

            self.publisher.publish(&self.topic, &message, &attributes).await?;
            published += 1;

            debug!(row = row.position, label = %label, "Published prediction notification");
        }

        Ok(published)
    }
}
