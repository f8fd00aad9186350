//! Queue-triggered entry points.

use serde_json::Value;

use common::{AppError, AppResult, DirectEndpointError};
use endpoints::direct::SqsEvent;
use endpoints::{DirectEndpoint, DirectRoute};
use gateways::GenericAdminEvent;
use usecases::Container;

use crate::usecase::{ExampleUsecases, GetExampleReq};

pub const EXAMPLE_EVENTS_ENDPOINT: &str = "endpoint_example_events";

pub struct ExampleDirect {
    container: Container,
}

impl ExampleDirect {
    pub fn new(container: Container) -> Self {
        Self { container }
    }
}

impl DirectEndpoint for ExampleDirect {
    fn endpoints(&self) -> Vec<DirectRoute> {
        let container = self.container.clone();
        vec![DirectRoute::new(EXAMPLE_EVENTS_ENDPOINT, move |event| {
            example_events(container.clone(), event)
        })]
    }
}

/// Run `GetExample` for every admin event of an SQS batch.
async fn example_events(container: Container, event: Value) -> AppResult<Value> {
    let usecases = container.get::<ExampleUsecases>()?;
    let event = SqsEvent::from_value(event)?;

    let mut results = Vec::with_capacity(event.records.len());
    for record in &event.records {
        let message: GenericAdminEvent = record.decode_body()?;
        if message.account_id.is_empty() {
            return Err(DirectEndpointError::InvalidAccountIds("account_id is required".into()).into());
        }
        let example_id = message
            .payload_str("example_id")
            .ok_or_else(|| DirectEndpointError::Base("payload.example_id is required".into()))?;

        tracing::debug!(example_id, account_id = %message.account_id, "example event");
        let dto = usecases
            .get_example
            .execute(GetExampleReq {
                example_id: example_id.to_owned(),
            })
            .await?;
        results.push(serde_json::to_value(dto).map_err(|e| AppError::internal(e.to_string()))?);
    }
    Ok(Value::Array(results))
}
