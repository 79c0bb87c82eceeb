//! Persistent backends: hash sets and update state in SQLite, and hash
//! sets in Redis when built with the `redis` feature.

mod redis_store;
mod schema;
mod state;
mod store;

pub use redis_store::{RedisHashStore, redis_supported};
pub use state::StateStore;
pub use store::SqliteHashStore;
