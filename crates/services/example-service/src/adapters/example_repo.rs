//! Example table repository.

use async_trait::async_trait;
use sea_orm::Value;
use serde_json::Value as JsonValue;

use common::AppResult;
use stores::postgres::{PgRecord, PostgresCursor, PostgresRepo};

#[cfg(any(test, feature = "test-utils"))]
use mockall::automock;

pub const EXAMPLE_TABLE: &str = "example";

/// Example rows, stored as a JSON document per row.
#[cfg_attr(any(test, feature = "test-utils"), automock)]
#[async_trait]
pub trait ExampleRepository: Send + Sync {
    /// Insert a row holding `json_data`, returning the stored row.
    async fn save(&self, curs: &PostgresCursor, json_data: JsonValue) -> AppResult<JsonValue>;

    async fn get(&self, curs: &PostgresCursor, example_id: &str) -> AppResult<JsonValue>;
}

#[derive(Debug, Default, Clone)]
pub struct ExamplePostgresRepo;

impl PostgresRepo for ExamplePostgresRepo {}

#[async_trait]
impl ExampleRepository for ExamplePostgresRepo {
    async fn save(&self, curs: &PostgresCursor, json_data: JsonValue) -> AppResult<JsonValue> {
        let mut record = PgRecord::new();
        record.insert("json_data".to_owned(), Value::from(json_data));
        Ok(self.insert(curs, EXAMPLE_TABLE, record).await?)
    }

    async fn get(&self, curs: &PostgresCursor, example_id: &str) -> AppResult<JsonValue> {
        Ok(self.get_by_id(curs, EXAMPLE_TABLE, example_id, false, None).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    use common::{AppError, StoreError};
    use sea_orm::{DatabaseBackend, MockDatabase};

    #[tokio::test]
    async fn test_get_missing_row() {
        let conn = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([Vec::<BTreeMap<String, Value>>::new()])
            .into_connection();
        let curs = PostgresCursor::from_connection(conn, "public");

        let err = ExamplePostgresRepo.get(&curs, "ex-1").await.unwrap_err();

        assert!(matches!(
            err,
            AppError::Store(StoreError::NotFound(detail)) if detail == "element not found for id=ex-1"
        ));
    }
}
