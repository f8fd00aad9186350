//! Postgres connection pool and cursors.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use sea_orm::{
    ConnectOptions, ConnectionTrait, Database, DatabaseConnection, DatabaseTransaction, DbErr,
    ExecResult, QueryResult, Statement, TransactionTrait,
};

use common::{PostgresSettings, RetryPolicy, StoreError};

use crate::connection::{StoreBackend, StoreConnection};

/// Postgres store connection.
pub type PostgresConnection = StoreConnection<PostgresBackend>;

/// Pooled Postgres backend.
#[derive(Debug, Clone)]
pub struct PostgresBackend {
    settings: PostgresSettings,
}

impl PostgresBackend {
    pub fn new(settings: PostgresSettings) -> Self {
        Self { settings }
    }

    fn connect_options(&self) -> ConnectOptions {
        let s = &self.settings;
        let mut opts = ConnectOptions::new(s.url());
        opts.max_connections(s.pool_max_size)
            .min_connections(s.pool_min_size)
            .acquire_timeout(Duration::from_secs(s.pool_client_timeout))
            .connect_timeout(Duration::from_secs(s.pool_reconnect_timeout))
            .idle_timeout(Duration::from_secs(s.pool_max_idle))
            .max_lifetime(Duration::from_secs_f64(s.pool_max_lifetime.max(0.0)))
            .set_schema_search_path(s.schema_name.clone())
            .sqlx_logging(false);
        opts
    }
}

#[async_trait]
impl StoreBackend for PostgresBackend {
    type Client = Arc<DatabaseConnection>;
    type Cursor = PostgresCursor;

    fn name(&self) -> &'static str {
        "Postgres"
    }

    fn retry_policy(&self) -> RetryPolicy {
        self.settings.retry.policy()
    }

    async fn connect(&self) -> Result<Arc<DatabaseConnection>, StoreError> {
        tracing::debug!("PostgresConnection: connecting to database with pool");
        Database::connect(self.connect_options())
            .await
            .map(Arc::new)
            .map_err(|e| StoreError::Connection(e.to_string()))
    }

    async fn is_connected(&self, client: &Arc<DatabaseConnection>) -> bool {
        client.ping().await.is_ok()
    }

    async fn create_cursor(
        &self,
        client: &Arc<DatabaseConnection>,
        autocommit: bool,
    ) -> Result<PostgresCursor, StoreError> {
        let txn = if autocommit {
            None
        } else {
            Some(client.begin().await.map_err(map_db_err)?)
        };

        Ok(PostgresCursor {
            conn: client.clone(),
            txn,
            schema_name: self.settings.schema_name.clone(),
        })
    }

    async fn commit(&self, cursor: &mut PostgresCursor) -> Result<(), StoreError> {
        match cursor.txn.take() {
            Some(txn) => txn.commit().await.map_err(map_db_err),
            None => Ok(()),
        }
    }

    async fn rollback(&self, cursor: &mut PostgresCursor) -> Result<(), StoreError> {
        match cursor.txn.take() {
            Some(txn) => txn.rollback().await.map_err(map_db_err),
            None => Ok(()),
        }
    }

    async fn close(&self, _cursor: PostgresCursor) {}
}

/// A transaction (or the bare pool in autocommit mode) plus the schema name.
pub struct PostgresCursor {
    conn: Arc<DatabaseConnection>,
    txn: Option<DatabaseTransaction>,
    schema_name: String,
}

impl PostgresCursor {
    /// Cursor over an existing connection (tests, tooling).
    pub fn from_connection(conn: DatabaseConnection, schema_name: impl Into<String>) -> Self {
        Self {
            conn: Arc::new(conn),
            txn: None,
            schema_name: schema_name.into(),
        }
    }

    pub fn schema_name(&self) -> &str {
        &self.schema_name
    }

    pub fn in_transaction(&self) -> bool {
        self.txn.is_some()
    }

    pub async fn execute(&self, stmt: Statement) -> Result<ExecResult, DbErr> {
        match &self.txn {
            Some(txn) => txn.execute(stmt).await,
            None => self.conn.execute(stmt).await,
        }
    }

    pub async fn query_one(&self, stmt: Statement) -> Result<Option<QueryResult>, DbErr> {
        match &self.txn {
            Some(txn) => txn.query_one(stmt).await,
            None => self.conn.query_one(stmt).await,
        }
    }

    pub async fn query_all(&self, stmt: Statement) -> Result<Vec<QueryResult>, DbErr> {
        match &self.txn {
            Some(txn) => txn.query_all(stmt).await,
            None => self.conn.query_all(stmt).await,
        }
    }
}

/// Map driver errors to store errors.
pub fn map_db_err(err: DbErr) -> StoreError {
    use sea_orm::SqlErr;

    match err.sql_err() {
        Some(SqlErr::UniqueConstraintViolation(msg)) => {
            StoreError::DuplicateKey(format!("unique violation: {msg}"))
        }
        Some(SqlErr::ForeignKeyConstraintViolation(msg)) => {
            StoreError::ForeignKeyViolation(format!("foreign key violation: {msg}"))
        }
        _ => match err {
            DbErr::Conn(e) => StoreError::Connection(e.to_string()),
            DbErr::ConnectionAcquire(e) => StoreError::Connection(e.to_string()),
            other => StoreError::Base(other.to_string()),
        },
    }
}

#[cfg(test)]
mod tests {
    use std::str::FromStr;

    use sea_orm::sqlx::postgres::PgConnectOptions;

    use common::ConnectRetrySettings;

    use super::*;

    fn settings(user: &str, password: &str) -> PostgresSettings {
        PostgresSettings {
            user: user.into(),
            password: password.into(),
            host: "db.internal".into(),
            port: 5433,
            database: "app".into(),
            schema_name: "tenant".into(),
            retry: ConnectRetrySettings {
                max_timeout_seconds: 1,
                max_total_delay_seconds: 1,
            },
            pool_min_size: 1,
            pool_max_size: 2,
            pool_client_timeout: 5,
            pool_max_lifetime: 60.0,
            pool_max_idle: 10,
            pool_reconnect_timeout: 5,
        }
    }

    #[test]
    fn test_special_characters_in_credentials_keep_host() {
        let backend = PostgresBackend::new(settings("app:svc", "p@ss/w#rd"));
        let opts = backend.connect_options();

        let parsed = PgConnectOptions::from_str(opts.get_url()).unwrap();
        assert_eq!(parsed.get_host(), "db.internal");
        assert_eq!(parsed.get_port(), 5433);
        assert_eq!(parsed.get_username(), "app:svc");
        assert_eq!(parsed.get_database(), Some("app"));
    }
}
