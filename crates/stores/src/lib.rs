//! Store adapters.
//!
//! Every backend plugs into the same connection lifecycle
//! ([`connection::StoreConnection`]) and ships a repository trait with the
//! table-level helpers concrete repositories build on:
//!
//! - [`postgres`]: sea-orm pool, raw parameterised statements
//! - [`mongo`]: driver sessions with snapshot transactions
//! - [`dynamodb`]: single-table repositories over the AWS SDK

pub mod connection;
pub mod dynamodb;
pub mod handle;
pub mod mongo;
pub mod postgres;

#[cfg(any(test, feature = "test-utils"))]
pub mod testing;

pub use connection::{CursorFuture, StoreBackend, StoreConnection, StoreSession};
pub use handle::{connect_store, StoreHandle};

#[cfg(any(test, feature = "test-utils"))]
pub use connection::MockStoreBackend;
