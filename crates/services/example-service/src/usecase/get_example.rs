//! Store an example, read it back and decorate it with gateway data.

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use utoipa::ToSchema;

use common::{AppError, AppResult};
use domain::constants::FIELD_ID;
use stores::postgres::{PostgresBackend, PostgresConnection, PostgresCursor};
use usecases::{Usecase, UsecaseBase};

use crate::adapters::{ExampleGateway, ExampleRepository};
use crate::settings::UseCaseSettings;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GetExampleReq {
    pub example_id: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct ExampleDto {
    pub usecase_value: String,
    #[schema(value_type = Object)]
    pub store_value: Value,
    pub gateway_value: String,
}

pub struct GetExample {
    base: UsecaseBase<PostgresBackend>,
    settings: UseCaseSettings,
    repo: Arc<dyn ExampleRepository>,
    gateway: Arc<dyn ExampleGateway>,
}

impl GetExample {
    pub fn new(
        conn: Arc<PostgresConnection>,
        settings: UseCaseSettings,
        repo: Arc<dyn ExampleRepository>,
        gateway: Arc<dyn ExampleGateway>,
    ) -> Self {
        Self {
            base: UsecaseBase::new("get_example", conn),
            settings,
            repo,
            gateway,
        }
    }

    /// Run inside a cursor the caller already holds.
    pub async fn execute_in(&self, curs: &PostgresCursor, req: &GetExampleReq) -> AppResult<ExampleDto> {
        let saved = self
            .repo
            .save(curs, json!({ "example_id": req.example_id }))
            .await?;
        let id = saved
            .get(FIELD_ID)
            .and_then(Value::as_str)
            .ok_or_else(|| AppError::internal("stored example has no id"))?;

        Ok(ExampleDto {
            usecase_value: self.settings.account_id.clone(),
            store_value: self.repo.get(curs, id).await?,
            gateway_value: self.gateway.get_example(&req.example_id),
        })
    }
}

#[async_trait]
impl Usecase for GetExample {
    type Req = GetExampleReq;
    type Res = ExampleDto;

    async fn execute(&self, req: GetExampleReq) -> AppResult<ExampleDto> {
        let mut session = self.base.begin(&req).await?;
        let result = self.execute_in(session.cursor(), &req).await;
        self.base.finish(session, result).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use common::{AppSettings, EnvReader, StoreError, StoreSettings};
    use sea_orm::{DatabaseBackend, MockDatabase};

    use crate::adapters::{MockExampleGateway, MockExampleRepository};
    use crate::settings::tests::vars;

    fn connection() -> Arc<PostgresConnection> {
        let vars = vars();
        let settings = AppSettings::from_reader(&EnvReader::from_map(&vars)).unwrap();
        let StoreSettings::Postgres(pg) = settings.store else {
            panic!("expected postgres settings");
        };
        Arc::new(PostgresConnection::new(PostgresBackend::new(pg)))
    }

    fn cursor() -> PostgresCursor {
        PostgresCursor::from_connection(MockDatabase::new(DatabaseBackend::Postgres).into_connection(), "public")
    }

    fn gateway() -> MockExampleGateway {
        let mut gateway = MockExampleGateway::new();
        gateway
            .expect_get_example()
            .returning(|id| format!("example_gateway {id}"));
        gateway
    }

    fn usecase(repo: MockExampleRepository, gateway: MockExampleGateway) -> GetExample {
        GetExample::new(
            connection(),
            UseCaseSettings {
                account_id: "acc-1".into(),
            },
            Arc::new(repo),
            Arc::new(gateway),
        )
    }

    #[tokio::test]
    async fn test_saves_then_reads_back() {
        let mut repo = MockExampleRepository::new();
        repo.expect_save()
            .withf(|_, data| data == &json!({"example_id": "ex-1"}))
            .times(1)
            .returning(|_, data| Ok(json!({"id": "row-1", "json_data": data})));
        repo.expect_get()
            .withf(|_, id| id == "row-1")
            .times(1)
            .returning(|_, id| Ok(json!({"id": id, "json_data": {"example_id": "ex-1"}})));

        let dto = usecase(repo, gateway())
            .execute_in(&cursor(), &GetExampleReq { example_id: "ex-1".into() })
            .await
            .unwrap();

        assert_eq!(
            dto,
            ExampleDto {
                usecase_value: "acc-1".into(),
                store_value: json!({"id": "row-1", "json_data": {"example_id": "ex-1"}}),
                gateway_value: "example_gateway ex-1".into(),
            }
        );
    }

    #[tokio::test]
    async fn test_store_errors_propagate() {
        let mut repo = MockExampleRepository::new();
        repo.expect_save()
            .returning(|_, _| Err(StoreError::duplicate_key("unique violation: id").into()));
        repo.expect_get().never();

        let err = usecase(repo, MockExampleGateway::new())
            .execute_in(&cursor(), &GetExampleReq { example_id: "ex-1".into() })
            .await
            .unwrap_err();

        assert!(matches!(err, AppError::Store(StoreError::DuplicateKey(_))));
    }

    #[tokio::test]
    async fn test_saved_row_without_id() {
        let mut repo = MockExampleRepository::new();
        repo.expect_save().returning(|_, _| Ok(json!({"json_data": {}})));

        let err = usecase(repo, MockExampleGateway::new())
            .execute_in(&cursor(), &GetExampleReq { example_id: "ex-1".into() })
            .await
            .unwrap_err();

        assert!(matches!(err, AppError::Internal(_)));
    }
}
