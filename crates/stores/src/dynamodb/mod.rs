//! DynamoDB single-table store.

pub mod backend;
pub mod codec;
pub mod condition;
pub mod error;
pub mod repo;

pub use backend::{DynamoDbBackend, DynamoDbConnection, DynamoDbCursor};
pub use codec::{DirectItem, DirectValue};
pub use condition::{Attr, Condition};
pub use repo::{DynamoDbRepo, Query};
