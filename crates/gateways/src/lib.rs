//! Outbound adapters: HTTP services and queue events sent to other services.

pub mod events;
pub mod http;
pub mod sqs;

pub use events::GenericAdminEvent;
pub use http::{ApiRequest, HttpGateway};
pub use sqs::{QueueMessage, QueueSender, SqsGateway};

#[cfg(any(test, feature = "test-utils"))]
pub use sqs::MockQueueSender;
