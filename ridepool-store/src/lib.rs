pub mod app_config;
pub mod database;
pub mod memory;
pub mod redis_repo;

mod booking_repo;
mod review_repo;
mod trip_repo;

pub use database::{DbClient, PgUnitOfWork, PgUnitOfWorkFactory};
pub use memory::{MemoryCache, MemoryUnitOfWorkFactory};
pub use redis_repo::RedisClient;
