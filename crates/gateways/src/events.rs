//! Event payloads exchanged through queues.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Administrative event addressed to an account.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenericAdminEvent {
    pub payload: Map<String, Value>,
    pub account_id: String,
}

impl GenericAdminEvent {
    pub fn new(account_id: impl Into<String>, payload: Map<String, Value>) -> Self {
        Self {
            payload,
            account_id: account_id.into(),
        }
    }

    /// String field of the payload.
    pub fn payload_str(&self, key: &str) -> Option<&str> {
        self.payload.get(key).and_then(Value::as_str)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_decodes_queue_body() {
        let body = r#"{"payload": {"example_id": "ex-1"}, "account_id": "acc"}"#;
        let event: GenericAdminEvent = serde_json::from_str(body).unwrap();

        assert_eq!(event.account_id, "acc");
        assert_eq!(event.payload_str("example_id"), Some("ex-1"));
        assert_eq!(event.payload_str("missing"), None);
    }

    #[test]
    fn test_payload_must_be_an_object() {
        let body = json!({"payload": [1], "account_id": "acc"});
        assert!(serde_json::from_value::<GenericAdminEvent>(body).is_err());
    }
}
