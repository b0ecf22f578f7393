//! In-memory doubles for the inference and notification seams.

use std::sync::{
    Arc, Mutex,
    atomic::{AtomicUsize, Ordering},
};

use async_trait::async_trait;
use axum_test::TestServer;
use bytes::Bytes;

use crate::config::Config;
use crate::dataset::Predictions;
use crate::inference::{InferenceClient, InferenceError};
use crate::notifications::{MessageAttributes, PREDICTION_ATTRIBUTE, PredictionPublisher, PublishError, Publisher};
use crate::{AppState, build_router};

pub const TEST_TOPIC: &str = "arn:aws:sns:eu-west-1:123456789012:predictions";

#[derive(Clone)]
enum MockResponse {
    Predictions(Predictions),
    Status { status: u16, body: String },
}

/// Inference client returning a canned response and recording request bodies.
pub struct MockInferenceClient {
    response: MockResponse,
    bodies: Mutex<Vec<Bytes>>,
}

impl MockInferenceClient {
    pub fn with_predictions(predictions: Predictions) -> Self {
        Self {
            response: MockResponse::Predictions(predictions),
            bodies: Mutex::new(Vec::new()),
        }
    }

    pub fn with_status(status: u16, body: impl Into<String>) -> Self {
        Self {
            response: MockResponse::Status {
                status,
                body: body.into(),
            },
            bodies: Mutex::new(Vec::new()),
        }
    }

    pub fn calls(&self) -> usize {
        self.bodies.lock().unwrap().len()
    }

    pub fn bodies(&self) -> Vec<Bytes> {
        self.bodies.lock().unwrap().clone()
    }
}

#[async_trait]
impl InferenceClient for MockInferenceClient {
    async fn invoke(&self, body: Bytes) -> Result<Predictions, InferenceError> {
        self.bodies.lock().unwrap().push(body);
        match &self.response {
            MockResponse::Predictions(predictions) => Ok(predictions.clone()),
            MockResponse::Status { status, body } => Err(InferenceError::status(*status, body.clone())),
        }
    }
}

#[derive(Debug, Clone)]
pub struct PublishedMessage {
    pub topic: String,
    pub message: String,
    pub attributes: MessageAttributes,
}

impl PublishedMessage {
    pub fn label(&self) -> &str {
        self.attributes
            .get(PREDICTION_ATTRIBUTE)
            .map(|a| a.string_value.as_str())
            .unwrap_or_default()
    }
}

/// Publisher that keeps every message it accepts. Can be told to fail at a given attempt.
#[derive(Default)]
pub struct RecordingPublisher {
    calls: Mutex<Vec<PublishedMessage>>,
    attempts: AtomicUsize,
    fail_at: Option<usize>,
}

impl RecordingPublisher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fail the attempt with zero-based index `attempt`, accepting all others.
    pub fn failing_at(attempt: usize) -> Self {
        Self {
            fail_at: Some(attempt),
            ..Self::default()
        }
    }

    pub fn calls(&self) -> Vec<PublishedMessage> {
        self.calls.lock().unwrap().clone()
    }

    pub fn attempts(&self) -> usize {
        self.attempts.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Publisher for RecordingPublisher {
    async fn publish(&self, topic: &str, message: &str, attributes: &MessageAttributes) -> Result<(), PublishError> {
        let attempt = self.attempts.fetch_add(1, Ordering::SeqCst);
        if self.fail_at == Some(attempt) {
            return Err(PublishError::Delivery {
                topic: topic.to_string(),
                message: "simulated delivery failure".to_string(),
            });
        }

        self.calls.lock().unwrap().push(PublishedMessage {
            topic: topic.to_string(),
            message: message.to_string(),
            attributes: attributes.clone(),
        });
        Ok(())
    }
}

pub fn create_test_server(inference: Arc<MockInferenceClient>, publisher: Arc<RecordingPublisher>) -> TestServer {
    let config = Config::default();
    let state = AppState::builder()
        .config(Arc::new(config.clone()))
        .inference(inference)
        .notifier(Arc::new(PredictionPublisher::new(publisher, TEST_TOPIC)))
        .build();

    TestServer::new(build_router(state, config.max_body_size)).expect("Failed to create test server")
}
