//! Process-wide dependency container.
//!
//! Built once at startup from the loaded settings and the connected store.
//! Services (repositories, gateways, use cases) are registered by type and
//! fetched back by the API and direct endpoints.

use std::any::{type_name, Any, TypeId};
use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use common::{AppError, AppResult, AppSettings};
use stores::StoreHandle;

type Registry = HashMap<TypeId, Arc<dyn Any + Send + Sync>>;

#[derive(Clone)]
pub struct Container {
    settings: Arc<AppSettings>,
    store: StoreHandle,
    singletons: Arc<RwLock<Registry>>,
}

impl Container {
    pub fn new(settings: AppSettings, store: StoreHandle) -> Self {
        Self {
            settings: Arc::new(settings),
            store,
            singletons: Arc::default(),
        }
    }

    pub fn settings(&self) -> &AppSettings {
        &self.settings
    }

    pub fn store(&self) -> &StoreHandle {
        &self.store
    }

    /// Register `value` as the singleton of its type, replacing any previous one.
    pub fn register<T: Send + Sync + 'static>(&self, value: T) -> Arc<T> {
        let value = Arc::new(value);
        match self.singletons.write() {
            Ok(mut registry) => {
                registry.insert(TypeId::of::<T>(), value.clone());
            }
            Err(poisoned) => {
                poisoned.into_inner().insert(TypeId::of::<T>(), value.clone());
            }
        }
        tracing::debug!(singleton = type_name::<T>(), "registered");
        value
    }

    pub fn get<T: Send + Sync + 'static>(&self) -> AppResult<Arc<T>> {
        let found = match self.singletons.read() {
            Ok(registry) => registry.get(&TypeId::of::<T>()).cloned(),
            Err(poisoned) => poisoned.into_inner().get(&TypeId::of::<T>()).cloned(),
        };

        found
            .and_then(|value| value.downcast::<T>().ok())
            .ok_or_else(|| AppError::internal(format!("Singleton {} not found", type_name::<T>())))
    }

    pub fn contains<T: Send + Sync + 'static>(&self) -> bool {
        self.get::<T>().is_ok()
    }
}

impl std::fmt::Debug for Container {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Container")
            .field("service", &self.settings.app.name)
            .field("store", &self.store)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    use common::{EnvReader, StoreSettings};
    use stores::dynamodb::{DynamoDbBackend, DynamoDbConnection};

    fn container() -> Container {
        let vars: HashMap<String, String> = [
            ("SERVICE_NAME", "example"),
            ("ENV", "test"),
            ("SERVICE_VERSION", "1.0.0"),
            ("ADMIN_AUTH_ID", "admin"),
            ("STORE_BACKEND", "dynamodb"),
            ("NAWS_REGION", "eu-west-1"),
            ("DYNAMO_ONE_TABLE_NAME", "app"),
            ("WEBAPP_TITLE", "Example"),
        ]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();
        let settings = AppSettings::from_reader(&EnvReader::from_map(&vars)).unwrap();

        let StoreSettings::DynamoDb(dynamo) = settings.store.clone() else {
            panic!("expected dynamodb settings");
        };
        let store = StoreHandle::DynamoDb(Arc::new(DynamoDbConnection::new(DynamoDbBackend::new(dynamo))));

        Container::new(settings, store)
    }

    #[derive(Debug)]
    struct Greeter(&'static str);

    #[test]
    fn test_register_and_get() {
        let container = container();
        container.register(Greeter("hello"));

        let clone = container.clone();
        assert_eq!(clone.get::<Greeter>().unwrap().0, "hello");
        assert!(clone.contains::<Greeter>());
    }

    #[test]
    fn test_missing_singleton() {
        let err = container().get::<Greeter>().unwrap_err();
        assert!(matches!(err, AppError::Internal(msg) if msg.starts_with("Singleton ") && msg.ends_with("Greeter not found")));
    }

    #[test]
    fn test_settings_and_store() {
        let container = container();
        assert_eq!(container.settings().app.name, "example");
        assert_eq!(container.store().name(), "DynamoDb");
    }
}
