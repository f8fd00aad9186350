//! MongoDB client and session-backed cursors.

use async_trait::async_trait;
use mongodb::bson::doc;
use mongodb::error::{Error as MongoError, ErrorKind, WriteFailure};
use mongodb::options::{
    ReadConcern, ReadPreference, SelectionCriteria, TransactionOptions, WriteConcern,
};
use mongodb::{Client, ClientSession, Database};

use common::{MongoSettings, RetryPolicy, StoreError};

use crate::connection::{StoreBackend, StoreConnection};

/// MongoDB store connection.
pub type MongoConnection = StoreConnection<MongoBackend>;

const DUPLICATE_KEY_CODE: i32 = 11000;

#[derive(Debug, Clone)]
pub struct MongoBackend {
    settings: MongoSettings,
}

impl MongoBackend {
    pub fn new(settings: MongoSettings) -> Self {
        Self { settings }
    }

    fn transaction_options() -> TransactionOptions {
        TransactionOptions::builder()
            .read_concern(ReadConcern::snapshot())
            .write_concern(WriteConcern::MAJORITY)
            .selection_criteria(SelectionCriteria::ReadPreference(ReadPreference::Primary))
            .build()
    }
}

#[async_trait]
impl StoreBackend for MongoBackend {
    type Client = Client;
    type Cursor = MongoCursor;

    fn name(&self) -> &'static str {
        "Mongo"
    }

    fn retry_policy(&self) -> RetryPolicy {
        self.settings.retry.policy()
    }

    async fn connect(&self) -> Result<Client, StoreError> {
        let client = Client::with_uri_str(&self.settings.uri_strings)
            .await
            .map_err(|e| StoreError::Connection(e.to_string()))?;

        // The driver connects lazily; make the first round trip here.
        client
            .database("admin")
            .run_command(doc! { "ping": 1 }, None)
            .await
            .map_err(|e| StoreError::Connection(e.to_string()))?;
        Ok(client)
    }

    async fn is_connected(&self, client: &Client) -> bool {
        client
            .database("admin")
            .run_command(doc! { "ping": 1 }, None)
            .await
            .is_ok()
    }

    async fn create_cursor(&self, client: &Client, autocommit: bool) -> Result<MongoCursor, StoreError> {
        let mut session = client.start_session(None).await.map_err(map_mongo_err)?;
        if !autocommit {
            session
                .start_transaction(Self::transaction_options())
                .await
                .map_err(map_mongo_err)?;
        }

        Ok(MongoCursor {
            session,
            database: client.database(&self.settings.database),
            in_transaction: !autocommit,
        })
    }

    async fn commit(&self, cursor: &mut MongoCursor) -> Result<(), StoreError> {
        if !cursor.in_transaction {
            return Ok(());
        }
        cursor.in_transaction = false;
        cursor.session.commit_transaction().await.map_err(map_mongo_err)
    }

    async fn rollback(&self, cursor: &mut MongoCursor) -> Result<(), StoreError> {
        if !cursor.in_transaction {
            return Ok(());
        }
        cursor.in_transaction = false;
        cursor.session.abort_transaction().await.map_err(map_mongo_err)
    }

    // Dropping the session returns it to the pool and ends it server side.
    async fn close(&self, _cursor: MongoCursor) {}
}

/// A client session bound to the configured database.
pub struct MongoCursor {
    session: ClientSession,
    database: Database,
    in_transaction: bool,
}

impl MongoCursor {
    pub fn database(&self) -> &Database {
        &self.database
    }

    /// Database handle and the session to pass to `*_with_session` calls.
    pub fn parts(&mut self) -> (&Database, &mut ClientSession) {
        (&self.database, &mut self.session)
    }

    pub fn in_transaction(&self) -> bool {
        self.in_transaction
    }
}

pub fn is_duplicate_key(err: &MongoError) -> bool {
    matches!(
        err.kind.as_ref(),
        ErrorKind::Write(WriteFailure::WriteError(we)) if we.code == DUPLICATE_KEY_CODE
    )
}

/// Map driver errors to store errors.
pub fn map_mongo_err(err: MongoError) -> StoreError {
    if is_duplicate_key(&err) {
        return StoreError::DuplicateKey(format!("duplicate key: {err}"));
    }
    match err.kind.as_ref() {
        ErrorKind::ServerSelection { .. } | ErrorKind::Io(_) | ErrorKind::ConnectionPoolCleared { .. } => {
            StoreError::Connection(err.to_string())
        }
        _ => StoreError::Base(err.to_string()),
    }
}
