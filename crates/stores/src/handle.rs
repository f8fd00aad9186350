//! Store selection from settings.

use std::sync::Arc;

use common::{StoreError, StoreSettings};

use crate::dynamodb::{DynamoDbBackend, DynamoDbConnection};
use crate::mongo::{MongoBackend, MongoConnection};
use crate::postgres::{PostgresBackend, PostgresConnection};

/// The configured store connection, shared across the application.
#[derive(Clone)]
pub enum StoreHandle {
    Postgres(Arc<PostgresConnection>),
    Mongo(Arc<MongoConnection>),
    DynamoDb(Arc<DynamoDbConnection>),
}

/// Connect the store selected by `settings`.
pub async fn connect_store(settings: &StoreSettings) -> Result<StoreHandle, StoreError> {
    tracing::info!(store = settings.backend_name(), "connecting store");

    let handle = match settings {
        StoreSettings::Postgres(s) => {
            let conn = PostgresConnection::connected(PostgresBackend::new(s.clone())).await?;
            StoreHandle::Postgres(Arc::new(conn))
        }
        StoreSettings::Mongo(s) => {
            let conn = MongoConnection::connected(MongoBackend::new(s.clone())).await?;
            StoreHandle::Mongo(Arc::new(conn))
        }
        StoreSettings::DynamoDb(s) => {
            let conn = DynamoDbConnection::connected(DynamoDbBackend::new(s.clone())).await?;
            StoreHandle::DynamoDb(Arc::new(conn))
        }
    };
    Ok(handle)
}

impl StoreHandle {
    pub fn name(&self) -> &'static str {
        match self {
            StoreHandle::Postgres(_) => "Postgres",
            StoreHandle::Mongo(_) => "Mongo",
            StoreHandle::DynamoDb(_) => "DynamoDb",
        }
    }

    fn mismatch(&self, wanted: &str) -> StoreError {
        StoreError::base(format!("{wanted} store requested but {} is configured", self.name()))
    }

    pub fn postgres(&self) -> Result<Arc<PostgresConnection>, StoreError> {
        match self {
            StoreHandle::Postgres(conn) => Ok(conn.clone()),
            _ => Err(self.mismatch("Postgres")),
        }
    }

    pub fn mongo(&self) -> Result<Arc<MongoConnection>, StoreError> {
        match self {
            StoreHandle::Mongo(conn) => Ok(conn.clone()),
            _ => Err(self.mismatch("Mongo")),
        }
    }

    pub fn dynamodb(&self) -> Result<Arc<DynamoDbConnection>, StoreError> {
        match self {
            StoreHandle::DynamoDb(conn) => Ok(conn.clone()),
            _ => Err(self.mismatch("DynamoDb")),
        }
    }

    /// Round trip to the store, used by health checks.
    pub async fn ping(&self) -> Result<(), StoreError> {
        match self {
            StoreHandle::Postgres(conn) => conn.ping().await,
            StoreHandle::Mongo(conn) => conn.ping().await,
            StoreHandle::DynamoDb(conn) => conn.ping().await,
        }
    }
}

impl std::fmt::Debug for StoreHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("StoreHandle").field(&self.name()).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use common::{ConnectRetrySettings, DynamoDbSettings};

    fn dynamo_handle() -> StoreHandle {
        let settings = DynamoDbSettings {
            region: "eu-west-1".into(),
            one_table_name: "app".into(),
            endpoint_url: Some("http://localhost:8000".into()),
            retry: ConnectRetrySettings {
                max_timeout_seconds: 1,
                max_total_delay_seconds: 1,
            },
        };
        StoreHandle::DynamoDb(Arc::new(DynamoDbConnection::new(DynamoDbBackend::new(settings))))
    }

    #[test]
    fn test_accessor_mismatch() {
        let handle = dynamo_handle();
        assert!(handle.dynamodb().is_ok());
        assert_eq!(
            handle.postgres().err(),
            Some(StoreError::base("Postgres store requested but DynamoDb is configured"))
        );
        assert!(handle.mongo().is_err());
    }

    #[tokio::test]
    async fn test_dynamodb_ping_needs_no_server() {
        dynamo_handle().ping().await.unwrap();
    }
}
