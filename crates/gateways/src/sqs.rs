//! Queue producer: JSON messages sent to SQS with the flow correlation id
//! attached as a message attribute.

use std::collections::BTreeMap;

use async_trait::async_trait;
use aws_config::retry::RetryConfig;
use aws_config::{BehaviorVersion, Region};
use aws_sdk_sqs::error::DisplayErrorContext;
use aws_sdk_sqs::types::MessageAttributeValue;
use aws_sdk_sqs::Client;
#[cfg(any(test, feature = "test-utils"))]
use mockall::automock;
use serde::Serialize;

use common::{CallContext, GatewayError, SqsGatewaySettings};

use crate::events::GenericAdminEvent;

const MAX_SDK_ATTEMPTS: u32 = 10;

/// One message ready to be sent. Attributes are string-typed.
#[derive(Debug, Clone, PartialEq)]
pub struct QueueMessage {
    pub queue_url: String,
    pub body: String,
    pub attributes: BTreeMap<String, String>,
}

/// Transport used by [`SqsGateway`].
#[cfg_attr(any(test, feature = "test-utils"), automock)]
#[async_trait]
pub trait QueueSender: Send + Sync {
    /// Returns the message id assigned by the queue, if any.
    async fn send(&self, message: QueueMessage) -> Result<Option<String>, GatewayError>;
}

#[async_trait]
impl QueueSender for Client {
    async fn send(&self, message: QueueMessage) -> Result<Option<String>, GatewayError> {
        let mut request = self
            .send_message()
            .queue_url(message.queue_url)
            .message_body(message.body);

        for (name, value) in message.attributes {
            let attribute = MessageAttributeValue::builder()
                .data_type("String")
                .string_value(value)
                .build()
                .map_err(|e| GatewayError::Base(format!("Unknown error: {e}")))?;
            request = request.message_attributes(name, attribute);
        }

        let output = request.send().await.map_err(|e| {
            GatewayError::Base(format!("Unknown error: {}", DisplayErrorContext(&e)))
        })?;
        Ok(output.message_id().map(str::to_owned))
    }
}

/// Gateway publishing to one configured queue.
pub struct SqsGateway<S = Client> {
    settings: SqsGatewaySettings,
    sender: S,
}

impl SqsGateway<Client> {
    /// Build the SDK client from the default credential chain.
    pub async fn connect(settings: SqsGatewaySettings) -> Self {
        let mut loader = aws_config::defaults(BehaviorVersion::latest())
            .retry_config(RetryConfig::adaptive().with_max_attempts(MAX_SDK_ATTEMPTS));
        if let Some(region) = &settings.region {
            loader = loader.region(Region::new(region.clone()));
        }

        let sdk_config = loader.load().await;
        Self::with_sender(settings, Client::new(&sdk_config))
    }
}

impl<S: QueueSender> SqsGateway<S> {
    pub fn with_sender(settings: SqsGatewaySettings, sender: S) -> Self {
        Self { settings, sender }
    }

    pub fn settings(&self) -> &SqsGatewaySettings {
        &self.settings
    }

    /// Send `message` as JSON. `further_attributes` are added next to the
    /// correlation attribute.
    pub async fn send_message<T: Serialize>(
        &self,
        message: &T,
        further_attributes: &[(&str, String)],
    ) -> Result<Option<String>, GatewayError> {
        let body = serde_json::to_string(message)
            .map_err(|e| GatewayError::NotValid(format!("message is not serializable: {e}")))?;

        let mut attributes = BTreeMap::from([(
            self.settings.correlation_id_header.clone(),
            CallContext::get_flow_correlation_id(),
        )]);
        for (name, value) in further_attributes {
            attributes.insert((*name).to_owned(), value.clone());
        }

        tracing::debug!(queue = %self.settings.url, "sending queue message");
        self.sender
            .send(QueueMessage {
                queue_url: self.settings.url.clone(),
                body,
                attributes,
            })
            .await
    }

    pub async fn send_event(
        &self,
        event: &GenericAdminEvent,
    ) -> Result<Option<String>, GatewayError> {
        self.send_message(event, &[]).await
    }
}
