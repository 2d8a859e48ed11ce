pub mod command;
pub mod repository;
pub mod supplier;

pub use command::{CommandError, Lane, MutationCommand};
pub use repository::{
    CommandPublisher, Delivery, DeliveryTag, LaneSubscriber, LaneSubscription, SnapshotCache,
    SupplierQuery, SupplierRepository,
};
pub use supplier::{Supplier, SupplierFields};

/// Well-known cache key holding the serialized "all suppliers" snapshot.
pub const SUPPLIERS_CACHE_KEY: &str = "suppliers";

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Record store unavailable: {0}")]
    Unavailable(String),
}

#[derive(Debug, thiserror::Error)]
pub enum CacheError {
    #[error("Cache unavailable: {0}")]
    Unavailable(String),
}

#[derive(Debug, thiserror::Error)]
pub enum ChannelError {
    #[error("Message channel unavailable: {0}")]
    Unavailable(String),
    #[error("Subscription to lane {0} closed")]
    Closed(Lane),
}

#[derive(Debug, thiserror::Error)]
pub enum QueryError {
    #[error("Query service unavailable: {0}")]
    Unavailable(String),
    #[error("Query service failed: {0}")]
    Remote(String),
}

