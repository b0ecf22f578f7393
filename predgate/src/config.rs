//! Gateway configuration.
//!
//! Configuration is loaded from a YAML file with environment variable overrides. The file path
//! defaults to `config.yaml` and can be changed with `-f` or `PREDGATE_CONFIG`.
//!
//! ## Loading Priority
//!
//! Later sources override earlier ones:
//!
//! 1. **YAML config file**
//! 2. **`PREDGATE_` environment variables**, nested keys separated by `__`
//!    (e.g. `PREDGATE_INFERENCE__TIMEOUT=30s`)
//! 3. **Deployment variables** used by existing deployments, mapped onto their keys:
//!
//! | Variable | Key |
//! | --- | --- |
//! | `AWS_REGION` | `aws.region` |
//! | `AWS_ACCESS_KEY` | `aws.access_key` |
//! | `AWS_SECRET_KEY` | `aws.secret_key` |
//! | `AWS_SAGEMAKER_HOST` | `inference.host` |
//! | `AWS_SAGEMAKER_ENDPOINT` | `inference.endpoint` |
//! | `AWS_SNS_PREDICTIONS_TOPIC` | `notifications.topic` |
//!
//! ## Example
//!
//! ```yaml
//! port: 5000
//! aws:
//!   region: eu-west-1
//! inference:
//!   host: runtime.sagemaker.eu-west-1.amazonaws.com
//!   endpoint: /endpoints/ml-ids/invocations
//!   timeout: 30s
//! notifications:
//!   topic: arn:aws:sns:eu-west-1:123456789012:ml-ids-predictions
//! ```

use std::{fmt, time::Duration};

use clap::Parser;
use figment::{
    Figment,
    providers::{Env, Format, Yaml},
};
use serde::{Deserialize, Serialize};
use url::Url;

use crate::errors::Error;
use crate::inference::InferenceEndpoint;
use crate::signing::Credentials;

/// Deployment variables accepted without the `PREDGATE_` prefix.
const DEPLOYMENT_ENV_KEYS: &[(&str, &str)] = &[
    ("AWS_REGION", "aws.region"),
    ("AWS_ACCESS_KEY", "aws.access_key"),
    ("AWS_SECRET_KEY", "aws.secret_key"),
    ("AWS_SAGEMAKER_HOST", "inference.host"),
    ("AWS_SAGEMAKER_ENDPOINT", "inference.endpoint"),
    ("AWS_SNS_PREDICTIONS_TOPIC", "notifications.topic"),
];

/// Simple CLI args - just for specifying config file
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Path to configuration file
    #[arg(short = 'f', long, env = "PREDGATE_CONFIG", default_value = "config.yaml")]
    pub config: String,

    /// Validate configuration and exit without starting the server.
    #[arg(long)]
    pub validate: bool,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    /// HTTP server host to bind to
    pub host: String,
    /// HTTP server port to bind to
    pub port: u16,
    /// Largest accepted request body, in bytes
    pub max_body_size: usize,
    /// Enable OpenTelemetry OTLP export for distributed tracing
    pub enable_otel_export: bool,
    pub aws: AwsConfig,
    pub inference: InferenceConfig,
    pub notifications: NotificationsConfig,
}

/// Region and static keys shared by the inference endpoint and the notification topic.
#[derive(Clone, Default, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct AwsConfig {
    pub region: String,
    pub access_key: String,
    #[serde(skip_serializing)]
    pub secret_key: String,
}

impl fmt::Debug for AwsConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AwsConfig")
            .field("region", &self.region)
            .field("access_key", &self.access_key)
            .field("secret_key", &"<redacted>")
            .finish()
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct InferenceConfig {
    /// `http` or `https`
    pub scheme: String,
    /// Endpoint host, e.g. `runtime.sagemaker.eu-west-1.amazonaws.com`
    pub host: String,
    /// Invocation path, e.g. `/endpoints/ml-ids/invocations`
    pub endpoint: String,
    /// Service name in the credential scope
    pub service: String,
    /// Per-request timeout
    #[serde(with = "humantime_serde")]
    pub timeout: Duration,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct NotificationsConfig {
    /// Topic ARN receiving one message per predicted row
    pub topic: String,
    /// Override for the SNS endpoint (local emulators)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub endpoint_url: Option<Url>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 5000,
            max_body_size: 10 * 1024 * 1024,
            enable_otel_export: false,
            aws: AwsConfig::default(),
            inference: InferenceConfig::default(),
            notifications: NotificationsConfig::default(),
        }
    }
}

impl Default for InferenceConfig {
    fn default() -> Self {
        Self {
            scheme: "https".to_string(),
            host: String::new(),
            endpoint: String::new(),
            service: "sagemaker".to_string(),
            timeout: Duration::from_secs(60),
        }
    }
}

impl Config {
    #[allow(clippy::result_large_err)]
    pub fn load(args: &Args) -> Result<Self, figment::Error> {
        let config: Self = Self::figment(args).extract()?;
        config.validate().map_err(|e| figment::Error::from(e.to_string()))?;
        Ok(config)
    }

    pub fn figment(args: &Args) -> Figment {
        let mut figment = Figment::new()
            .merge(Yaml::file(&args.config))
            // PREDGATE_CONFIG names the file itself
            .merge(Env::prefixed("PREDGATE_").ignore(&["CONFIG"]).split("__"));

        for &(var, key) in DEPLOYMENT_ENV_KEYS {
            figment = figment.merge(Env::raw().only(&[var]).map(move |_| key.into()));
        }

        figment
    }

    /// Validate the configuration for consistency and required fields
    pub fn validate(&self) -> Result<(), Error> {
        let required = [
            ("aws.region", &self.aws.region),
            ("aws.access_key", &self.aws.access_key),
            ("aws.secret_key", &self.aws.secret_key),
            ("inference.host", &self.inference.host),
            ("inference.endpoint", &self.inference.endpoint),
            ("inference.service", &self.inference.service),
            ("notifications.topic", &self.notifications.topic),
        ];
        for (key, value) in required {
            if value.trim().is_empty() {
                return Err(Error::InvalidConfig {
                    message: format!("{key} must be set"),
                });
            }
        }

        if !matches!(self.inference.scheme.as_str(), "http" | "https") {
            return Err(Error::InvalidConfig {
                message: format!("inference.scheme must be 'http' or 'https', got '{}'", self.inference.scheme),
            });
        }

        if !self.inference.endpoint.starts_with('/') {
            return Err(Error::InvalidConfig {
                message: format!("inference.endpoint must be an absolute path, got '{}'", self.inference.endpoint),
            });
        }

        // The signed path must be exactly the one the URL puts on the wire
        let url = self.inference_endpoint().url().map_err(|e| Error::InvalidConfig {
            message: format!("inference endpoint does not form a valid URL: {e}"),
        })?;
        if url.path() != self.inference.endpoint {
            return Err(Error::InvalidConfig {
                message: format!(
                    "inference.endpoint '{}' is not in normalized form (would be sent as '{}')",
                    self.inference.endpoint,
                    url.path()
                ),
            });
        }

        if self.inference.timeout.is_zero() {
            return Err(Error::InvalidConfig {
                message: "inference.timeout must be greater than zero".to_string(),
            });
        }

        if self.max_body_size == 0 {
            return Err(Error::InvalidConfig {
                message: "max_body_size must be greater than zero".to_string(),
            });
        }

        Ok(())
    }

    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn credentials(&self) -> Credentials {
        Credentials::new(self.aws.access_key.clone(), self.aws.secret_key.clone())
    }

    pub fn inference_endpoint(&self) -> InferenceEndpoint {
        InferenceEndpoint {
            scheme: self.inference.scheme.clone(),
            host: self.inference.host.clone(),
            path: self.inference.endpoint.clone(),
            region: self.aws.region.clone(),
            service: self.inference.service.clone(),
        }
    }
}
