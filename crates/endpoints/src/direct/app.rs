//! Queue-triggered endpoints.
//!
//! A [`DirectEndpoint`] exposes named handlers taking the raw event JSON.
//! [`DirectEndpointApp`] collects them and invokes one by name, each call in
//! a fresh [`CallContext`].

use std::collections::BTreeMap;
use std::fmt;
use std::future::Future;
use std::sync::Arc;

use futures::future::BoxFuture;
use serde_json::Value;

#[cfg(any(test, feature = "test-utils"))]
use mockall::automock;

use common::{AppResult, CallContext, DirectEndpointError};

use super::events::flow_id_from_event;
use super::security::PassedAuthenticationBackend;

/// Prefix every direct endpoint name must carry.
pub const ENDPOINT_PREFIX: &str = "endpoint_";

type Handler = Arc<dyn Fn(Value) -> BoxFuture<'static, AppResult<Value>> + Send + Sync>;

/// A named handler.
#[derive(Clone)]
pub struct DirectRoute {
    name: String,
    handler: Handler,
}

impl DirectRoute {
    pub fn new<F, Fut>(name: impl Into<String>, handler: F) -> Self
    where
        F: Fn(Value) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = AppResult<Value>> + Send + 'static,
    {
        Self {
            name: name.into(),
            handler: Arc::new(move |event| Box::pin(handler(event))),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

impl fmt::Debug for DirectRoute {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DirectRoute").field("name", &self.name).finish()
    }
}

/// A group of direct routes, usually one per feature.
#[cfg_attr(any(test, feature = "test-utils"), automock)]
pub trait DirectEndpoint: Send + Sync {
    fn endpoints(&self) -> Vec<DirectRoute>;
}

/// Registry and dispatcher of direct routes.
#[derive(Debug, Clone)]
pub struct DirectEndpointApp {
    routes: BTreeMap<String, DirectRoute>,
    auth: Option<PassedAuthenticationBackend>,
    correlation_attribute: String,
}

impl DirectEndpointApp {
    /// `correlation_attribute` names the message attribute holding the flow id.
    pub fn new(correlation_attribute: impl Into<String>) -> Self {
        Self {
            routes: BTreeMap::new(),
            auth: None,
            correlation_attribute: correlation_attribute.into(),
        }
    }

    pub fn add_endpoints(
        mut self,
        auth: Option<PassedAuthenticationBackend>,
        endpoints: &[Arc<dyn DirectEndpoint>],
    ) -> Result<Self, DirectEndpointError> {
        if auth.is_some() {
            self.auth = auth;
        }

        for route in endpoints.iter().flat_map(|e| e.endpoints()) {
            if !route.name.starts_with(ENDPOINT_PREFIX) {
                return Err(DirectEndpointError::Base(format!(
                    "direct endpoint name must start with {ENDPOINT_PREFIX}: {}",
                    route.name
                )));
            }
            if self.routes.contains_key(&route.name) {
                return Err(DirectEndpointError::Base(format!(
                    "direct endpoint registered twice: {}",
                    route.name
                )));
            }
            tracing::debug!(endpoint = %route.name, "direct endpoint registered");
            self.routes.insert(route.name.clone(), route);
        }
        Ok(self)
    }

    pub fn endpoint_names(&self) -> impl Iterator<Item = &str> {
        self.routes.keys().map(String::as_str)
    }

    /// Run endpoint `name` on `event`.
    pub async fn invoke(&self, name: &str, event: Value) -> AppResult<Value> {
        let route = self
            .routes
            .get(name)
            .ok_or_else(|| DirectEndpointError::Base(format!("unknown direct endpoint: {name}")))?;
        let flow_id = flow_id_from_event(&event, &self.correlation_attribute);
        let handler = route.handler.clone();

        CallContext::scope(async move {
            if let Some(flow_id) = flow_id {
                CallContext::set_flow_correlation_id(flow_id);
            }
            if let Some(auth) = &self.auth {
                auth.force_admin();
            }

            tracing::info!(
                endpoint = name,
                flow_id = %CallContext::get_flow_correlation_id(),
                "invoking direct endpoint"
            );
            let result = handler(event).await;
            if let Err(err) = &result {
                tracing::error!(endpoint = name, error = %err, "direct endpoint failed");
            }
            result
        })
        .await
    }
}
