//! DynamoDB client and cursors.

use async_trait::async_trait;
use aws_config::retry::RetryConfig;
use aws_config::{BehaviorVersion, Region};
use aws_sdk_dynamodb::Client;

use common::{DynamoDbSettings, RetryPolicy, StoreError};

use crate::connection::{StoreBackend, StoreConnection};

/// DynamoDB store connection.
pub type DynamoDbConnection = StoreConnection<DynamoDbBackend>;

const MAX_SDK_ATTEMPTS: u32 = 10;

#[derive(Debug, Clone)]
pub struct DynamoDbBackend {
    settings: DynamoDbSettings,
}

impl DynamoDbBackend {
    pub fn new(settings: DynamoDbSettings) -> Self {
        Self { settings }
    }
}

#[async_trait]
impl StoreBackend for DynamoDbBackend {
    type Client = Client;
    type Cursor = DynamoDbCursor;

    fn name(&self) -> &'static str {
        "DynamoDb"
    }

    fn retry_policy(&self) -> RetryPolicy {
        self.settings.retry.policy()
    }

    async fn connect(&self) -> Result<Client, StoreError> {
        let mut loader = aws_config::defaults(BehaviorVersion::latest())
            .region(Region::new(self.settings.region.clone()))
            .retry_config(RetryConfig::adaptive().with_max_attempts(MAX_SDK_ATTEMPTS));

        if let Some(endpoint) = &self.settings.endpoint_url {
            loader = loader.endpoint_url(endpoint);
        }

        let sdk_config = loader.load().await;
        Ok(Client::new(&sdk_config))
    }

    // The SDK client is thread-safe and reconnects on its own.
    async fn is_connected(&self, _client: &Client) -> bool {
        true
    }

    async fn create_cursor(&self, client: &Client, _autocommit: bool) -> Result<DynamoDbCursor, StoreError> {
        Ok(DynamoDbCursor {
            client: client.clone(),
            table_name: self.settings.one_table_name.clone(),
        })
    }

    async fn commit(&self, _cursor: &mut DynamoDbCursor) -> Result<(), StoreError> {
        Ok(())
    }

    async fn rollback(&self, _cursor: &mut DynamoDbCursor) -> Result<(), StoreError> {
        Ok(())
    }

    async fn close(&self, _cursor: DynamoDbCursor) {}
}

/// SDK client plus the single table every repository writes to.
#[derive(Debug, Clone)]
pub struct DynamoDbCursor {
    client: Client,
    table_name: String,
}

impl DynamoDbCursor {
    pub fn new(client: Client, table_name: impl Into<String>) -> Self {
        Self {
            client,
            table_name: table_name.into(),
        }
    }

    pub fn client(&self) -> &Client {
        &self.client
    }

    pub fn table_name(&self) -> &str {
        &self.table_name
    }
}
