use async_trait::async_trait;
use std::time::Duration;

use crate::command::Lane;
use crate::supplier::{Supplier, SupplierFields};
use crate::{CacheError, ChannelError, QueryError, StoreError};

/// Canonical supplier storage. Every mutation is a single atomic statement.
#[async_trait]
pub trait SupplierRepository: Send + Sync {
    /// Full collection in the store's natural scan order.
    async fn list_suppliers(&self) -> Result<Vec<Supplier>, StoreError>;

    /// Insert a row and return its store-assigned id.
    async fn insert_supplier(&self, fields: &SupplierFields) -> Result<i64, StoreError>;

    /// Replace the mutable columns of `id`. Returns the number of rows touched.
    async fn update_supplier(&self, id: i64, fields: &SupplierFields) -> Result<u64, StoreError>;

    /// Physically delete `id`. Returns the number of rows removed.
    async fn delete_supplier(&self, id: i64) -> Result<u64, StoreError>;
}

/// Read-side access to the canonical collection (served over gRPC in production).
#[async_trait]
pub trait SupplierQuery: Send + Sync {
    async fn get_suppliers(&self) -> Result<Vec<Supplier>, QueryError>;
}

/// Key-value cache holding derived, disposable snapshots.
#[async_trait]
pub trait SnapshotCache: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<String>, CacheError>;

    async fn set_with_expiry(&self, key: &str, value: &str, ttl: Duration) -> Result<(), CacheError>;

    /// Idempotent delete; absent keys are not an error.
    async fn invalidate(&self, key: &str) -> Result<(), CacheError>;
}

/// Producer side of the message channel. `publish` returns only once the broker has
/// accepted the payload.
#[async_trait]
pub trait CommandPublisher: Send + Sync {
    async fn publish(&self, lane: Lane, payload: Vec<u8>) -> Result<(), ChannelError>;
}

/// Consumer side of the message channel.
#[async_trait]
pub trait LaneSubscriber: Send + Sync {
    async fn subscribe(&self, lane: Lane) -> Result<Box<dyn LaneSubscription>, ChannelError>;
}

/// Position of a delivered message, used to acknowledge or requeue it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeliveryTag {
    pub partition: i32,
    pub offset: i64,
}

#[derive(Debug, Clone)]
pub struct Delivery {
    pub payload: Vec<u8>,
    pub tag: DeliveryTag,
}

/// FIFO stream of deliveries for a single lane. Messages that are nacked, or still
/// outstanding when the subscription is dropped, are delivered again.
#[async_trait]
pub trait LaneSubscription: Send {
    fn lane(&self) -> Lane;

    /// Wait for the next delivery. Must be cancel-safe.
    async fn next(&mut self) -> Result<Delivery, ChannelError>;

    async fn ack(&mut self, tag: DeliveryTag) -> Result<(), ChannelError>;

    async fn nack(&mut self, tag: DeliveryTag) -> Result<(), ChannelError>;
}
