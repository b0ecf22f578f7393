//! # predgate: Prediction gateway for an intrusion-detection model
//!
//! `predgate` sits between clients holding batches of network-flow records and a model hosted
//! behind a SageMaker-style inference endpoint. For each batch it:
//!
//! 1. accepts the records as pandas "split" JSON on `POST /api/predictions`
//! 2. forwards the body to the endpoint with a SigV4-signed request ([`signing`], [`inference`])
//! 3. attaches the returned predictions to the batch as a `prediction` column ([`dataset`])
//! 4. publishes one message per row, tagged `attack` or `benign`, to a topic ([`notifications`])
//! 5. answers with the raw predictions in row order
//!
//! Configuration is described in [`config`], logging and trace export in [`telemetry`], and the
//! HTTP error contract in [`errors`].

pub mod api;
pub mod config;
pub mod dataset;
pub mod errors;
pub mod inference;
pub mod notifications;
pub mod signing;
pub mod telemetry;

#[cfg(test)]
mod test_utils;

use std::sync::Arc;

use anyhow::Context;
use axum::{
    Router,
    extract::DefaultBodyLimit,
    routing::{get, post},
};
use bon::Builder;
pub use config::Config;
use tokio::net::TcpListener;
use tower_http::trace::{DefaultMakeSpan, DefaultOnRequest, DefaultOnResponse, TraceLayer};
use tracing::{Level, debug, info};

use inference::{InferenceClient, SigningHttpClient};
use notifications::{PredictionPublisher, SnsPublisher};

/// Shared state handed to every handler.
///
/// ```ignore
/// let state = AppState::builder()
///     .config(Arc::new(config))
///     .inference(Arc::new(client))
///     .notifier(Arc::new(notifier))
///     .build();
/// ```
#[derive(Clone, Builder)]
pub struct AppState {
    pub config: Arc<Config>,
    pub inference: Arc<dyn InferenceClient>,
    pub notifier: Arc<PredictionPublisher>,
}

/// Build the application router. Bodies above `max_body_size` bytes are refused with 413.
pub fn build_router(state: AppState, max_body_size: usize) -> Router {
    Router::new()
        .route("/", get(api::handlers::root))
        .route("/healthz", get(api::handlers::health))
        .route("/api/predictions", post(api::handlers::predictions::create_predictions))
        .layer(DefaultBodyLimit::max(max_body_size))
        .with_state(state)
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
                .on_request(DefaultOnRequest::new().level(Level::INFO))
                .on_response(DefaultOnResponse::new().level(Level::INFO)),
        )
}

/// A configured gateway, ready to bind.
pub struct Application {
    router: Router,
    config: Config,
}

impl Application {
    /// Build the inference and notification clients and the router.
    pub async fn new(config: Config) -> anyhow::Result<Self> {
        debug!("Starting prediction gateway with configuration: {:#?}", config);

        let endpoint = config.inference_endpoint();
        let client = SigningHttpClient::new(config.credentials(), endpoint, config.inference.timeout)
            .context("failed to build inference client")?;
        info!(url = %client.endpoint().url()?, "Inference endpoint configured");

        let sns = SnsPublisher::from_config(&config.aws, &config.notifications).await;
        let notifier = PredictionPublisher::new(Arc::new(sns), config.notifications.topic.clone());

        let state = AppState::builder()
            .config(Arc::new(config.clone()))
            .inference(Arc::new(client))
            .notifier(Arc::new(notifier))
            .build();

        let router = build_router(state, config.max_body_size);

        Ok(Self { router, config })
    }

    /// Start serving the application
    pub async fn serve<F>(self, shutdown: F) -> anyhow::Result<()>
    where
        F: std::future::Future<Output = ()> + Send + 'static,
    {
        let bind_addr = self.config.bind_address();
        let listener = TcpListener::bind(&bind_addr).await?;
        info!(
            "Prediction gateway listening on http://{}, available at http://localhost:{}",
            bind_addr, self.config.port
        );

        axum::serve(listener, self.router.into_make_service())
            .with_graceful_shutdown(shutdown)
            .await?;

        info!("Shutting down telemetry...");
        telemetry::shutdown_telemetry();

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AwsConfig;

    fn config() -> Config {
        let mut config = Config::default();
        config.port = 0;
        config.aws = AwsConfig {
            region: "eu-west-1".to_string(),
            access_key: "ACCESS_KEY".to_string(),
            secret_key: "SECRET_KEY".to_string(),
        };
        config.inference.scheme = "http".to_string();
        config.inference.host = "127.0.0.1:9".to_string();
        config.inference.endpoint = "/endpoints/ml-ids/invocations".to_string();
        config.notifications.topic = "arn:aws:sns:eu-west-1:123456789012:predictions".to_string();
        config
    }

    #[tokio::test]
    async fn test_application_routes_banner() {
        let app = Application::new(config()).await.unwrap();
        let server = axum_test::TestServer::new(app.router).unwrap();

        server.get("/").await.assert_text("ML-IDS API");
    }

    #[tokio::test]
    async fn test_serve_stops_on_shutdown_signal() {
        let app = Application::new(config()).await.unwrap();
        app.serve(async {}).await.unwrap();
    }
}
