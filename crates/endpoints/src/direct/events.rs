//! Queue and topic event shapes delivered to direct endpoints.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use common::DirectEndpointError;

/// One SQS message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SqsRecord {
    pub body: String,
    #[serde(default)]
    pub attributes: Map<String, Value>,
    #[serde(default, rename = "messageAttributes")]
    pub message_attributes: Map<String, Value>,
}

impl SqsRecord {
    /// Decode the JSON message body.
    pub fn decode_body<T: DeserializeOwned>(&self) -> Result<T, DirectEndpointError> {
        serde_json::from_str(&self.body)
            .map_err(|e| DirectEndpointError::Base(format!("invalid message body: {e}")))
    }

    /// `stringValue` of a message attribute.
    pub fn message_attribute(&self, name: &str) -> Option<&str> {
        self.message_attributes
            .get(name)
            .and_then(|attr| attr.get("stringValue"))
            .and_then(Value::as_str)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SqsEvent {
    #[serde(rename = "Records")]
    pub records: Vec<SqsRecord>,
}

impl SqsEvent {
    pub fn from_value(event: Value) -> Result<Self, DirectEndpointError> {
        serde_json::from_value(event)
            .map_err(|e| DirectEndpointError::Base(format!("invalid SQS event: {e}")))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SnsNotificationBody {
    #[serde(rename = "Message")]
    pub message: String,
    #[serde(default, rename = "MessageAttributes")]
    pub message_attributes: Map<String, Value>,
}

impl SnsNotificationBody {
    pub fn decode_message<T: DeserializeOwned>(&self) -> Result<T, DirectEndpointError> {
        serde_json::from_str(&self.message)
            .map_err(|e| DirectEndpointError::Base(format!("invalid notification message: {e}")))
    }

    /// `Value` of a message attribute.
    pub fn message_attribute(&self, name: &str) -> Option<&str> {
        self.message_attributes
            .get(name)
            .and_then(|attr| attr.get("Value"))
            .and_then(Value::as_str)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SnsNotificationRecord {
    #[serde(rename = "Sns")]
    pub sns: SnsNotificationBody,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SnsNotificationEvent {
    #[serde(rename = "Records")]
    pub records: Vec<SnsNotificationRecord>,
}

impl SnsNotificationEvent {
    pub fn from_value(event: Value) -> Result<Self, DirectEndpointError> {
        serde_json::from_value(event)
            .map_err(|e| DirectEndpointError::Base(format!("invalid SNS event: {e}")))
    }
}

/// Correlation attribute of the first record of an SQS or SNS event.
pub fn flow_id_from_event(event: &Value, attribute: &str) -> Option<String> {
    let first = event.get("Records")?.get(0)?;
    let value = match first.get("Sns") {
        Some(sns) => sns.get("MessageAttributes")?.get(attribute)?.get("Value"),
        None => first.get("messageAttributes")?.get(attribute)?.get("stringValue"),
    };
    value.and_then(Value::as_str).map(str::to_owned)
}
