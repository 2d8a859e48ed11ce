use async_trait::async_trait;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use supplier_shared::SupplierEvent;
use supplier_store::EventProducer;
use tokio::sync::mpsc::{self, error::TrySendError};
use tokio::task::JoinHandle;
use tracing::{debug, warn};

/// Destination for structured supplier events.
#[async_trait]
pub trait TelemetrySink: Send + Sync + 'static {
    async fn send(&self, event: &SupplierEvent) -> Result<(), String>;
}

/// Ships events as JSON to a Kafka topic, keyed by event kind.
pub struct KafkaTelemetrySink {
    producer: EventProducer,
    topic: String,
}

impl KafkaTelemetrySink {
    pub fn new(producer: EventProducer, topic: &str) -> Self {
        Self {
            producer,
            topic: topic.to_string(),
        }
    }
}

#[async_trait]
impl TelemetrySink for KafkaTelemetrySink {
    async fn send(&self, event: &SupplierEvent) -> Result<(), String> {
        let json = serde_json::to_vec(event).map_err(|e| e.to_string())?;
        self.producer
            .send(&self.topic, event.event.as_str(), &json)
            .await
            .map_err(|e| e.to_string())
    }
}

/// Fire-and-forget event emitter.
///
/// `emit` only ever does a non-blocking push onto a bounded queue; a background task
/// forwards queued events to the sink. When the queue is full the event is dropped.
/// Sink failures are logged and never reach the request path.
#[derive(Clone)]
pub struct Telemetry {
    tx: Option<mpsc::Sender<SupplierEvent>>,
    dropped: Arc<AtomicU64>,
}

impl Telemetry {
    pub fn spawn(sink: Arc<dyn TelemetrySink>, capacity: usize) -> (Self, JoinHandle<()>) {
        let (tx, mut rx) = mpsc::channel::<SupplierEvent>(capacity.max(1));

        let handle = tokio::spawn(async move {
            while let Some(event) = rx.recv().await {
                if let Err(e) = sink.send(&event).await {
                    warn!("Telemetry sink rejected {} event: {}", event.event.as_str(), e);
                }
            }
            debug!("Telemetry queue closed");
        });

        let telemetry = Self {
            tx: Some(tx),
            dropped: Arc::new(AtomicU64::new(0)),
        };
        (telemetry, handle)
    }

    /// Emitter that discards everything.
    pub fn disabled() -> Self {
        Self {
            tx: None,
            dropped: Arc::new(AtomicU64::new(0)),
        }
    }

    pub fn emit(&self, event: SupplierEvent) {
        let Some(tx) = &self.tx else {
            return;
        };
        match tx.try_send(event) {
            Ok(()) => {}
            Err(TrySendError::Full(event)) => {
                self.dropped.fetch_add(1, Ordering::Relaxed);
                debug!("Telemetry queue full, dropping {} event", event.event.as_str());
            }
            Err(TrySendError::Closed(event)) => {
                self.dropped.fetch_add(1, Ordering::Relaxed);
                debug!("Telemetry worker gone, dropping {} event", event.event.as_str());
            }
        }
    }

    /// Events discarded because the queue was full or closed.
    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }
}
