//! In-process implementations of the channel, cache and record store.
//!
//! They honour the same contracts as the Kafka, Redis and Postgres clients (FIFO lanes
//! with redelivery of unacknowledged messages, expiring keys, store-assigned ids) and add
//! switches for simulating outages. Used by the test suites and for local runs without
//! infrastructure.

use async_trait::async_trait;
use std::collections::{BTreeMap, HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicI64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use supplier_core::{
    CacheError, ChannelError, CommandPublisher, Delivery, DeliveryTag, Lane, LaneSubscriber,
    LaneSubscription, SnapshotCache, StoreError, Supplier, SupplierFields, SupplierRepository,
};
use tokio::sync::Notify;
use tokio::time::Instant;

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

// ============================================================================
// Message channel
// ============================================================================

#[derive(Default)]
struct LaneQueue {
    next_offset: i64,
    ready: VecDeque<(i64, Vec<u8>)>,
    in_flight: BTreeMap<i64, Vec<u8>>,
    published: Vec<Vec<u8>>,
    acked: Vec<i64>,
    deliveries: usize,
}

struct ChannelInner {
    lanes: Mutex<HashMap<Lane, LaneQueue>>,
    notify: HashMap<Lane, Notify>,
    available: AtomicBool,
}

impl ChannelInner {
    fn wake(&self, lane: Lane) {
        if let Some(notify) = self.notify.get(&lane) {
            notify.notify_one();
        }
    }

    /// Put in-flight messages back at the head of the lane, oldest first.
    fn requeue(&self, lane: Lane, offsets: &[i64]) {
        let mut lanes = lock(&self.lanes);
        let queue = lanes.entry(lane).or_default();
        let mut returned: Vec<(i64, Vec<u8>)> = offsets
            .iter()
            .filter_map(|offset| queue.in_flight.remove(offset).map(|p| (*offset, p)))
            .collect();
        returned.sort_by_key(|(offset, _)| *offset);
        for entry in returned.into_iter().rev() {
            queue.ready.push_front(entry);
        }
        drop(lanes);
        self.wake(lane);
    }
}

/// At-least-once, per-lane FIFO channel. Intended for one subscription per lane.
#[derive(Clone)]
pub struct InMemoryChannel {
    inner: Arc<ChannelInner>,
}

impl InMemoryChannel {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(ChannelInner {
                lanes: Mutex::new(HashMap::new()),
                notify: Lane::ALL.into_iter().map(|lane| (lane, Notify::new())).collect(),
                available: AtomicBool::new(true),
            }),
        }
    }

    /// Simulate the broker going away (or coming back).
    pub fn set_available(&self, available: bool) {
        self.inner.available.store(available, Ordering::SeqCst);
    }

    /// Every payload ever accepted on `lane`, in publish order.
    pub fn published(&self, lane: Lane) -> Vec<Vec<u8>> {
        lock(&self.inner.lanes)
            .get(&lane)
            .map(|q| q.published.clone())
            .unwrap_or_default()
    }

    /// Messages not yet acknowledged (waiting or in flight).
    pub fn pending(&self, lane: Lane) -> usize {
        lock(&self.inner.lanes)
            .get(&lane)
            .map(|q| q.ready.len() + q.in_flight.len())
            .unwrap_or(0)
    }

    pub fn acked(&self, lane: Lane) -> usize {
        lock(&self.inner.lanes)
            .get(&lane)
            .map(|q| q.acked.len())
            .unwrap_or(0)
    }

    /// Total deliveries on `lane`, redeliveries included.
    pub fn deliveries(&self, lane: Lane) -> usize {
        lock(&self.inner.lanes)
            .get(&lane)
            .map(|q| q.deliveries)
            .unwrap_or(0)
    }
}

impl Default for InMemoryChannel {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl CommandPublisher for InMemoryChannel {
    async fn publish(&self, lane: Lane, payload: Vec<u8>) -> Result<(), ChannelError> {
        if !self.inner.available.load(Ordering::SeqCst) {
            return Err(ChannelError::Unavailable("broker unreachable".into()));
        }

        {
            let mut lanes = lock(&self.inner.lanes);
            let queue = lanes.entry(lane).or_default();
            let offset = queue.next_offset;
            queue.next_offset += 1;
            queue.published.push(payload.clone());
            queue.ready.push_back((offset, payload));
        }
        self.inner.wake(lane);
        Ok(())
    }
}

#[async_trait]
impl LaneSubscriber for InMemoryChannel {
    async fn subscribe(&self, lane: Lane) -> Result<Box<dyn LaneSubscription>, ChannelError> {
        if !self.inner.available.load(Ordering::SeqCst) {
            return Err(ChannelError::Unavailable("broker unreachable".into()));
        }
        Ok(Box::new(InMemorySubscription {
            inner: self.inner.clone(),
            lane,
            outstanding: Vec::new(),
        }))
    }
}

pub struct InMemorySubscription {
    inner: Arc<ChannelInner>,
    lane: Lane,
    outstanding: Vec<i64>,
}

impl InMemorySubscription {
    fn try_take(&mut self) -> Option<Delivery> {
        let mut lanes = lock(&self.inner.lanes);
        let queue = lanes.entry(self.lane).or_default();
        let (offset, payload) = queue.ready.pop_front()?;
        queue.in_flight.insert(offset, payload.clone());
        queue.deliveries += 1;
        self.outstanding.push(offset);
        Some(Delivery {
            payload,
            tag: DeliveryTag { partition: 0, offset },
        })
    }

    fn settle(&mut self, tag: DeliveryTag) -> Result<(), ChannelError> {
        let before = self.outstanding.len();
        self.outstanding.retain(|offset| *offset != tag.offset);
        if self.outstanding.len() == before {
            return Err(ChannelError::Unavailable(format!(
                "unknown delivery tag {} on lane {}",
                tag.offset, self.lane
            )));
        }
        Ok(())
    }
}

#[async_trait]
impl LaneSubscription for InMemorySubscription {
    fn lane(&self) -> Lane {
        self.lane
    }

    async fn next(&mut self) -> Result<Delivery, ChannelError> {
        loop {
            if let Some(delivery) = self.try_take() {
                return Ok(delivery);
            }
            match self.inner.notify.get(&self.lane) {
                Some(notify) => notify.notified().await,
                None => return Err(ChannelError::Closed(self.lane)),
            }
        }
    }

    async fn ack(&mut self, tag: DeliveryTag) -> Result<(), ChannelError> {
        self.settle(tag)?;
        let mut lanes = lock(&self.inner.lanes);
        let queue = lanes.entry(self.lane).or_default();
        queue.in_flight.remove(&tag.offset);
        queue.acked.push(tag.offset);
        Ok(())
    }

    async fn nack(&mut self, tag: DeliveryTag) -> Result<(), ChannelError> {
        self.settle(tag)?;
        self.inner.requeue(self.lane, &[tag.offset]);
        Ok(())
    }
}

impl Drop for InMemorySubscription {
    fn drop(&mut self) {
        // A consumer that goes away without acking loses its claim on those messages
        if !self.outstanding.is_empty() {
            let outstanding = std::mem::take(&mut self.outstanding);
            self.inner.requeue(self.lane, &outstanding);
        }
    }
}

// ============================================================================
// Cache
// ============================================================================

/// Expiring key-value cache on tokio's clock, so tests can drive expiry with
/// `tokio::time::advance`.
#[derive(Default)]
pub struct InMemoryCache {
    entries: Mutex<HashMap<String, (String, Instant)>>,
    unavailable: AtomicBool,
}

impl InMemoryCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_available(&self, available: bool) {
        self.unavailable.store(!available, Ordering::SeqCst);
    }

    /// Remaining lifetime of a live key.
    pub fn ttl(&self, key: &str) -> Option<Duration> {
        let now = Instant::now();
        lock(&self.entries)
            .get(key)
            .filter(|(_, expires_at)| *expires_at > now)
            .map(|(_, expires_at)| *expires_at - now)
    }

    /// Raw value regardless of availability, for assertions.
    pub fn peek(&self, key: &str) -> Option<String> {
        let now = Instant::now();
        lock(&self.entries)
            .get(key)
            .filter(|(_, expires_at)| *expires_at > now)
            .map(|(value, _)| value.clone())
    }

    fn check(&self) -> Result<(), CacheError> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(CacheError::Unavailable("cache unreachable".into()));
        }
        Ok(())
    }
}

#[async_trait]
impl SnapshotCache for InMemoryCache {
    async fn get(&self, key: &str) -> Result<Option<String>, CacheError> {
        self.check()?;
        let mut entries = lock(&self.entries);
        match entries.get(key) {
            Some((_, expires_at)) if *expires_at <= Instant::now() => {
                entries.remove(key);
                Ok(None)
            }
            Some((value, _)) => Ok(Some(value.clone())),
            None => Ok(None),
        }
    }

    async fn set_with_expiry(&self, key: &str, value: &str, ttl: Duration) -> Result<(), CacheError> {
        self.check()?;
        lock(&self.entries).insert(key.to_string(), (value.to_string(), Instant::now() + ttl));
        Ok(())
    }

    async fn invalidate(&self, key: &str) -> Result<(), CacheError> {
        self.check()?;
        lock(&self.entries).remove(key);
        Ok(())
    }
}

// ============================================================================
// Record store
// ============================================================================

/// Record store with monotonically assigned ids and injectable failures.
pub struct InMemorySupplierRepository {
    rows: Mutex<BTreeMap<i64, Supplier>>,
    next_id: AtomicI64,
    failures: AtomicUsize,
    unavailable: AtomicBool,
}

impl InMemorySupplierRepository {
    pub fn new() -> Self {
        Self {
            rows: Mutex::new(BTreeMap::new()),
            next_id: AtomicI64::new(1),
            failures: AtomicUsize::new(0),
            unavailable: AtomicBool::new(false),
        }
    }

    /// Insert a row directly, bypassing failure injection.
    pub fn seed(&self, fields: SupplierFields) -> i64 {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        lock(&self.rows).insert(id, fields.into_supplier(id));
        id
    }

    pub fn rows(&self) -> Vec<Supplier> {
        lock(&self.rows).values().cloned().collect()
    }

    /// Fail the next `n` operations.
    pub fn fail_next(&self, n: usize) {
        self.failures.store(n, Ordering::SeqCst);
    }

    pub fn set_available(&self, available: bool) {
        self.unavailable.store(!available, Ordering::SeqCst);
    }

    fn check(&self) -> Result<(), StoreError> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("connection refused".into()));
        }
        let consumed = self
            .failures
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1));
        if consumed.is_ok() {
            return Err(StoreError::Unavailable("injected failure".into()));
        }
        Ok(())
    }
}

impl Default for InMemorySupplierRepository {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SupplierRepository for InMemorySupplierRepository {
    async fn list_suppliers(&self) -> Result<Vec<Supplier>, StoreError> {
        self.check()?;
        Ok(self.rows())
    }

    async fn insert_supplier(&self, fields: &SupplierFields) -> Result<i64, StoreError> {
        self.check()?;
        Ok(self.seed(fields.clone()))
    }

    async fn update_supplier(&self, id: i64, fields: &SupplierFields) -> Result<u64, StoreError> {
        self.check()?;
        let mut rows = lock(&self.rows);
        match rows.get_mut(&id) {
            Some(row) => {
                *row = fields.clone().into_supplier(id);
                Ok(1)
            }
            None => Ok(0),
        }
    }

    async fn delete_supplier(&self, id: i64) -> Result<u64, StoreError> {
        self.check()?;
        Ok(lock(&self.rows).remove(&id).map_or(0, |_| 1))
    }
}
