//! Postgres store: pooled connection, transactional cursors and table helpers.

pub mod backend;
pub mod repo;

pub use backend::{map_db_err, PostgresBackend, PostgresConnection, PostgresCursor};
pub use repo::{AccountScope, PgRecord, PostgresRepo};
