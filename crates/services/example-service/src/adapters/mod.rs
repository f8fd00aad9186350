//! Store and gateway adapters of the example service.

pub mod example_gateway;
pub mod example_repo;

pub use example_gateway::{ExampleGateway, ExampleHttpGateway};
pub use example_repo::{ExamplePostgresRepo, ExampleRepository, EXAMPLE_TABLE};

#[cfg(any(test, feature = "test-utils"))]
pub use example_gateway::MockExampleGateway;
#[cfg(any(test, feature = "test-utils"))]
pub use example_repo::MockExampleRepository;
