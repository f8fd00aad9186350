//! Use case trait and the store-aware base every use case embeds.

use std::fmt::Debug;
use std::sync::Arc;

use async_trait::async_trait;

use common::{AppResult, CallContext};
use stores::{CursorFuture, StoreBackend, StoreConnection, StoreSession};

/// One application operation.
#[async_trait]
pub trait Usecase: Send + Sync {
    type Req: Send;
    type Res;

    async fn execute(&self, req: Self::Req) -> AppResult<Self::Res>;
}

/// Store connection and logging shared by use cases.
///
/// A use case opens one cursor per execution with [`UsecaseBase::begin`]
/// and closes it with [`UsecaseBase::finish`]. Work that runs inside an
/// already open cursor should take `&mut B::Cursor` directly instead.
pub struct UsecaseBase<B: StoreBackend> {
    name: &'static str,
    conn: Arc<StoreConnection<B>>,
}

impl<B: StoreBackend> Clone for UsecaseBase<B> {
    fn clone(&self) -> Self {
        Self {
            name: self.name,
            conn: self.conn.clone(),
        }
    }
}

impl<B: StoreBackend> UsecaseBase<B> {
    pub fn new(name: &'static str, conn: Arc<StoreConnection<B>>) -> Self {
        Self { name, conn }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn connection(&self) -> &Arc<StoreConnection<B>> {
        &self.conn
    }

    /// True when the user of the current call is an administrator.
    pub fn is_admin() -> bool {
        CallContext::get_authenticated_user().is_some_and(|user| user.is_admin())
    }

    /// Log the request and open a transactional cursor.
    pub async fn begin<R: Debug>(&self, req: &R) -> AppResult<StoreSession<'_, B>> {
        tracing::info!(usecase = self.name, req = ?req, "starting usecase");
        Ok(self.conn.session(false).await?)
    }

    /// Commit or roll back on `result`, then log the end of the use case.
    pub async fn finish<T>(&self, session: StoreSession<'_, B>, result: AppResult<T>) -> AppResult<T> {
        let result = session.finish(result).await;
        tracing::info!(usecase = self.name, ok = result.is_ok(), "usecase finished");
        result
    }

    /// [`UsecaseBase::begin`], `f`, [`UsecaseBase::finish`] in one call.
    ///
    /// The closure's future may only borrow the cursor.
    pub async fn with_cursor<R, T, F>(&self, req: &R, f: F) -> AppResult<T>
    where
        R: Debug,
        T: Send,
        F: for<'c> FnOnce(&'c mut B::Cursor) -> CursorFuture<'c, AppResult<T>> + Send,
    {
        let mut session = self.begin(req).await?;
        let result = f(session.cursor()).await;
        self.finish(session, result).await
    }
}
