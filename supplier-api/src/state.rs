use std::sync::Arc;
use std::time::Duration;
use supplier_core::{CommandPublisher, SnapshotCache, SupplierQuery};

use crate::metrics::HttpMetrics;
use crate::telemetry::Telemetry;

/// Everything a gateway handler needs, injected at construction.
#[derive(Clone)]
pub struct AppState {
    pub publisher: Arc<dyn CommandPublisher>,
    pub cache: Arc<dyn SnapshotCache>,
    pub query: Arc<dyn SupplierQuery>,
    pub telemetry: Telemetry,
    pub metrics: HttpMetrics,
    /// Lifetime of the cached suppliers snapshot.
    pub cache_ttl: Duration,
}
