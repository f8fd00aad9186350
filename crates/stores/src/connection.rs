//! Store connection lifecycle.
//!
//! A backend knows how to connect, open a cursor and finish it. The
//! [`StoreConnection`] wrapper owns the cached client and drives every
//! cursor through the same sequence:
//!
//! 1. reuse the cached client, reconnecting with retries when it is gone
//! 2. open a cursor (a transaction unless `autocommit`)
//! 3. run the caller's work
//! 4. commit on success, roll back on error (skipped in `autocommit` mode)
//! 5. close the cursor

use std::fmt::Display;
use std::future::Future;
use std::pin::Pin;

use async_trait::async_trait;
use tokio::sync::RwLock;

use common::{retry, RetryPolicy, StoreError};

#[cfg(any(test, feature = "test-utils"))]
use mockall::automock;

/// A store technology (Postgres, MongoDB, DynamoDB, ...).
#[cfg_attr(
    any(test, feature = "test-utils"),
    automock(type Client = (); type Cursor = ();)
)]
#[async_trait]
pub trait StoreBackend: Send + Sync + 'static {
    /// Long-lived, cloneable handle (pool, client)
    type Client: Clone + Send + Sync + 'static;
    /// Per-unit-of-work handle (transaction, session)
    type Cursor: Send;

    /// Name used in log lines and connection errors.
    fn name(&self) -> &'static str;

    /// Policy applied while connecting.
    fn retry_policy(&self) -> RetryPolicy;

    /// One connection attempt.
    async fn connect(&self) -> Result<Self::Client, StoreError>;

    async fn is_connected(&self, client: &Self::Client) -> bool;

    async fn create_cursor(
        &self,
        client: &Self::Client,
        autocommit: bool,
    ) -> Result<Self::Cursor, StoreError>;

    async fn commit(&self, cursor: &mut Self::Cursor) -> Result<(), StoreError>;

    async fn rollback(&self, cursor: &mut Self::Cursor) -> Result<(), StoreError>;

    async fn close(&self, cursor: Self::Cursor);
}

/// Boxed future borrowing the cursor for `'c`.
pub type CursorFuture<'c, T> = Pin<Box<dyn Future<Output = T> + Send + 'c>>;

/// Connection wrapper holding the cached client of a backend.
pub struct StoreConnection<B: StoreBackend> {
    backend: B,
    client: RwLock<Option<B::Client>>,
}

impl<B: StoreBackend> StoreConnection<B> {
    /// Wrap a backend without connecting; the first cursor connects.
    pub fn new(backend: B) -> Self {
        Self {
            backend,
            client: RwLock::new(None),
        }
    }

    /// Wrap a backend and connect immediately.
    pub async fn connected(backend: B) -> Result<Self, StoreError> {
        let connection = Self::new(backend);
        connection.client().await?;
        Ok(connection)
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    /// Connected client, reconnecting when the cached one is gone.
    pub async fn client(&self) -> Result<B::Client, StoreError> {
        if let Some(client) = self.client.read().await.clone() {
            if self.backend.is_connected(&client).await {
                return Ok(client);
            }
        }

        let mut guard = self.client.write().await;
        if let Some(client) = guard.clone() {
            if self.backend.is_connected(&client).await {
                return Ok(client);
            }
        }

        let client = self.connect_with_retry().await?;
        *guard = Some(client.clone());
        Ok(client)
    }

    async fn connect_with_retry(&self) -> Result<B::Client, StoreError> {
        let name = self.backend.name();
        tracing::debug!(store = name, "connecting to store");

        retry(&self.backend.retry_policy(), || self.backend.connect(), |_| true)
            .await
            .map_err(|err| {
                StoreError::Connection(format!(
                    "{name}Connection: unable to establish connection. {}",
                    err.detail()
                ))
            })
    }

    /// Check that the store answers.
    pub async fn ping(&self) -> Result<(), StoreError> {
        let client = self.client().await?;
        if self.backend.is_connected(&client).await {
            Ok(())
        } else {
            Err(StoreError::Connection(format!(
                "{}Connection: store is not reachable",
                self.backend.name()
            )))
        }
    }

    /// Open a cursor; finish it with [`StoreSession::finish`].
    pub async fn session(&self, autocommit: bool) -> Result<StoreSession<'_, B>, StoreError> {
        let client = self.client().await?;
        let cursor = self
            .backend
            .create_cursor(&client, autocommit)
            .await
            .inspect_err(|err| tracing::error!("StoreConnection: {}", err))?;

        Ok(StoreSession {
            connection: self,
            cursor,
            autocommit,
        })
    }

    /// Run `f` inside a cursor, committing or rolling back on its outcome.
    ///
    /// The closure's future may only borrow the cursor; move owned values
    /// (or `Arc`s) into it. Use [`StoreConnection::session`] when the work
    /// borrows other state.
    pub async fn cursor<F, T, E>(&self, autocommit: bool, f: F) -> Result<T, E>
    where
        F: for<'c> FnOnce(&'c mut B::Cursor) -> CursorFuture<'c, Result<T, E>> + Send,
        T: Send,
        E: From<StoreError> + Display + Send,
    {
        let mut session = self.session(autocommit).await?;
        let result = f(session.cursor()).await;
        session.finish(result).await
    }
}

/// An open cursor that must be finished with the outcome of the work.
///
/// Dropping a session without finishing it closes the cursor without
/// committing.
pub struct StoreSession<'a, B: StoreBackend> {
    connection: &'a StoreConnection<B>,
    cursor: B::Cursor,
    autocommit: bool,
}

impl<'a, B: StoreBackend> StoreSession<'a, B> {
    pub fn cursor(&mut self) -> &mut B::Cursor {
        &mut self.cursor
    }

    pub fn is_autocommit(&self) -> bool {
        self.autocommit
    }

    /// Commit on `Ok`, roll back on `Err`, then close the cursor.
    pub async fn finish<T, E>(mut self, result: Result<T, E>) -> Result<T, E>
    where
        E: From<StoreError> + Display,
    {
        let backend = &self.connection.backend;

        let outcome = match result {
            Ok(value) => {
                if self.autocommit {
                    Ok(value)
                } else {
                    match backend.commit(&mut self.cursor).await {
                        Ok(()) => Ok(value),
                        Err(err) => {
                            tracing::error!("StoreConnection: commit failed: {}", err);
                            Err(E::from(err))
                        }
                    }
                }
            }
            Err(err) => {
                tracing::error!("StoreConnection: {}", err);
                if !self.autocommit {
                    if let Err(rollback_err) = backend.rollback(&mut self.cursor).await {
                        tracing::error!("StoreConnection: rollback failed: {}", rollback_err);
                    }
                }
                Err(err)
            }
        };

        backend.close(self.cursor).await;
        outcome
    }
}
