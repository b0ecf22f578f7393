//! Amazon SNS publisher.

use std::collections::HashMap;

use async_trait::async_trait;
use aws_config::BehaviorVersion;
use aws_credential_types::Credentials;
use aws_sdk_sns::Client;
use aws_sdk_sns::config::Region;
use aws_sdk_sns::error::DisplayErrorContext;
use aws_sdk_sns::types::MessageAttributeValue;

use super::{MessageAttribute, MessageAttributes, PublishError, Publisher};
use crate::config::{AwsConfig, NotificationsConfig};

/// [`Publisher`] backed by the SNS `Publish` action.
#[derive(Clone, Debug)]
pub struct SnsPublisher {
    client: Client,
}

impl SnsPublisher {
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    /// Build a client using the static keys and region of the gateway configuration.
    pub async fn from_config(aws: &AwsConfig, notifications: &NotificationsConfig) -> Self {
        let credentials = Credentials::new(aws.access_key.clone(), aws.secret_key.clone(), None, None, "predgate-config");

        let mut loader = aws_config::defaults(BehaviorVersion::latest())
            .region(Region::new(aws.region.clone()))
            .credentials_provider(credentials);

        // Local emulators (e.g. localstack)
        if let Some(endpoint) = &notifications.endpoint_url {
            loader = loader.endpoint_url(endpoint.as_str());
        }

        let sdk_config = loader.load().await;
        Self::new(Client::new(&sdk_config))
    }
}

fn to_sns_attribute(name: &str, attribute: &MessageAttribute) -> Result<MessageAttributeValue, PublishError> {
    MessageAttributeValue::builder()
        .data_type(attribute.data_type.as_str())
        .string_value(attribute.string_value.as_str())
        .build()
        .map_err(|e| PublishError::InvalidAttribute {
            name: name.to_string(),
            message: e.to_string(),
        })
}

#[async_trait]
impl Publisher for SnsPublisher {
    #[tracing::instrument(skip(self, message, attributes), fields(message_len = message.len()))]
    async fn publish(&self, topic: &str, message: &str, attributes: &MessageAttributes) -> Result<(), PublishError> {
        let attributes = attributes
            .iter()
            .map(|(name, attribute)| Ok((name.clone(), to_sns_attribute(name, attribute)?)))
            .collect::<Result<HashMap<_, _>, PublishError>>()?;

        let output = self
            .client
            .publish()
            .topic_arn(topic)
            .message(message)
            .set_message_attributes(Some(attributes))
            .send()
            .await
            .map_err(|e| {
                tracing::error!(topic, error = %DisplayErrorContext(&e), "SNS publish failed");
                PublishError::Delivery {
                    topic: topic.to_string(),
                    message: DisplayErrorContext(&e).to_string(),
                }
            })?;

        tracing::trace!(message_id = ?output.message_id(), "SNS publish succeeded");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_to_sns_attribute() {
        let value = to_sns_attribute("prediction", &MessageAttribute::string("attack")).unwrap();
        assert_eq!(value.data_type(), "String");
        assert_eq!(value.string_value(), Some("attack"));
    }
}
