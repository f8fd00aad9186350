//! Example service use cases.

pub mod get_example;

use std::sync::Arc;

use usecases::Usecase;

pub use get_example::{ExampleDto, GetExample, GetExampleReq};

pub type GetExampleUsecase = dyn Usecase<Req = GetExampleReq, Res = ExampleDto>;

/// Use cases shared by the API and direct endpoints, registered in the
/// [`usecases::Container`].
#[derive(Clone)]
pub struct ExampleUsecases {
    pub get_example: Arc<GetExampleUsecase>,
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;

    use async_trait::async_trait;
    use serde_json::json;

    use common::{AppResult, EnvReader, StoreError};
    use stores::postgres::{PostgresBackend, PostgresConnection};
    use stores::StoreHandle;
    use usecases::Container;

    use crate::settings::{tests::vars, ServiceSettings};

    /// Answers without a store; `missing` is not found.
    pub struct StubGetExample;

    #[async_trait]
    impl Usecase for StubGetExample {
        type Req = GetExampleReq;
        type Res = ExampleDto;

        async fn execute(&self, req: GetExampleReq) -> AppResult<ExampleDto> {
            if req.example_id == "missing" {
                return Err(StoreError::not_found("element not found for id=missing").into());
            }
            Ok(ExampleDto {
                usecase_value: "acc-1".into(),
                store_value: json!({"json_data": {"example_id": req.example_id}}),
                gateway_value: format!("example_gateway {}", req.example_id),
            })
        }
    }

    pub fn settings() -> ServiceSettings {
        let vars = vars();
        let settings = ServiceSettings::from_reader(&EnvReader::from_map(&vars)).unwrap();
        settings
    }

    /// Unconnected Postgres handle; nothing is sent until a cursor is opened.
    pub fn store(settings: &ServiceSettings) -> StoreHandle {
        let common::StoreSettings::Postgres(pg) = settings.base.store.clone() else {
            panic!("expected postgres settings");
        };
        StoreHandle::Postgres(Arc::new(PostgresConnection::new(PostgresBackend::new(pg))))
    }

    pub fn container() -> Container {
        let settings = settings();
        let container = Container::new(settings.base.clone(), store(&settings));
        container.register(ExampleUsecases {
            get_example: Arc::new(StubGetExample),
        });
        container
    }
}
