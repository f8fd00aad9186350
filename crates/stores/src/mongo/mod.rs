//! MongoDB store: session cursors and collection helpers.

pub mod backend;
pub mod repo;

pub use backend::{map_mongo_err, MongoBackend, MongoConnection, MongoCursor};
pub use repo::MongoRepo;
