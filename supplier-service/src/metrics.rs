use prometheus::{Encoder, IntCounterVec, Opts, Registry, TextEncoder};
use supplier_core::Lane;

use crate::worker::Outcome;

/// Per-lane command counters, owned by the consumer rather than a global registry.
#[derive(Clone)]
pub struct ConsumerMetrics {
    registry: Registry,
    commands_total: IntCounterVec,
}

impl ConsumerMetrics {
    pub fn new() -> Result<Self, prometheus::Error> {
        let registry = Registry::new();
        let commands_total = IntCounterVec::new(
            Opts::new("supplier_commands_total", "Mutation commands processed"),
            &["lane", "outcome"],
        )?;
        registry.register(Box::new(commands_total.clone()))?;

        Ok(Self {
            registry,
            commands_total,
        })
    }

    pub fn record(&self, lane: Lane, outcome: Outcome) {
        self.commands_total
            .with_label_values(&[lane.topic(), outcome.as_str()])
            .inc();
    }

    pub fn count(&self, lane: Lane, outcome: Outcome) -> u64 {
        self.commands_total
            .with_label_values(&[lane.topic(), outcome.as_str()])
            .get()
    }

    /// Prometheus text exposition of everything registered.
    pub fn render(&self) -> Result<String, prometheus::Error> {
        let mut buffer = Vec::new();
        TextEncoder::new().encode(&self.registry.gather(), &mut buffer)?;
        String::from_utf8(buffer).map_err(|e| prometheus::Error::Msg(e.to_string()))
    }
}
