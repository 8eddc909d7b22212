// Database layer: PostgreSQL pool, Redis pool, and cadence repositories

pub mod pool;
pub mod redis;
pub mod repositories;
pub mod store;

pub use pool::DbPool;
pub use redis::RedisPool;
pub use store::PgCadenceStore;
