//! Gateway to the remote example service.

use async_trait::async_trait;
use serde_json::Value;

use common::{AppResult, GatewayError, HttpGatewaySettings};
use gateways::{ApiRequest, HttpGateway};

#[cfg(any(test, feature = "test-utils"))]
use mockall::automock;

#[cfg_attr(any(test, feature = "test-utils"), automock)]
#[async_trait]
pub trait ExampleGateway: Send + Sync {
    /// Locally computed value standing in for the remote lookup.
    fn get_example(&self, example_id: &str) -> String;

    /// `GET /example/{id}` on the remote service.
    async fn fetch_remote(&self, example_id: &str) -> AppResult<Value>;
}

pub struct ExampleHttpGateway {
    http: HttpGateway,
}

impl ExampleHttpGateway {
    pub fn new(settings: HttpGatewaySettings) -> Result<Self, GatewayError> {
        Ok(Self {
            http: HttpGateway::new("ExampleHttpGateway", settings)?,
        })
    }
}

#[async_trait]
impl ExampleGateway for ExampleHttpGateway {
    fn get_example(&self, example_id: &str) -> String {
        format!("example_gateway {example_id}")
    }

    async fn fetch_remote(&self, example_id: &str) -> AppResult<Value> {
        Ok(self.http.call_api(ApiRequest::get(format!("example/{example_id}"))).await?)
    }
}
