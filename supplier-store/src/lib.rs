pub mod app_config;
pub mod database;
pub mod events;
pub mod memory;
pub mod redis_repo;

pub use database::{DbClient, PostgresSupplierRepository};
pub use events::{EventProducer, KafkaLaneSubscriber};
pub use redis_repo::RedisClient;
