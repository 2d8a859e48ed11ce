#![allow(dead_code)]

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{Request, Response};
use axum::Router;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use supplier_api::metrics::HttpMetrics;
use supplier_api::telemetry::Telemetry;
use supplier_api::{app, AppState};
use supplier_core::{QueryError, Supplier, SupplierQuery, SupplierRepository};
use supplier_store::memory::{InMemoryCache, InMemoryChannel, InMemorySupplierRepository};

/// Query path served straight from an in-memory store, counting calls.
pub struct RepoQuery {
    repo: Arc<InMemorySupplierRepository>,
    calls: AtomicUsize,
}

impl RepoQuery {
    pub fn new(repo: Arc<InMemorySupplierRepository>) -> Self {
        Self {
            repo,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SupplierQuery for RepoQuery {
    async fn get_suppliers(&self) -> Result<Vec<Supplier>, QueryError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.repo
            .list_suppliers()
            .await
            .map_err(|e| QueryError::Unavailable(e.to_string()))
    }
}

pub struct TestGateway {
    pub app: Router,
    pub channel: InMemoryChannel,
    pub cache: Arc<InMemoryCache>,
    pub repo: Arc<InMemorySupplierRepository>,
    pub query: Arc<RepoQuery>,
}

pub fn gateway() -> TestGateway {
    let channel = InMemoryChannel::new();
    let cache = Arc::new(InMemoryCache::new());
    let repo = Arc::new(InMemorySupplierRepository::new());
    let query = Arc::new(RepoQuery::new(repo.clone()));

    let state = AppState {
        publisher: Arc::new(channel.clone()),
        cache: cache.clone(),
        query: query.clone(),
        telemetry: Telemetry::disabled(),
        metrics: HttpMetrics::new().expect("metrics"),
        cache_ttl: Duration::from_secs(60),
    };

    TestGateway {
        app: app(state),
        channel,
        cache,
        repo,
        query,
    }
}

pub fn json_request(method: &str, uri: &str, body: serde_json::Value) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .expect("request")
}

pub fn empty_request(method: &str, uri: &str) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .body(Body::empty())
        .expect("request")
}

pub async fn read_text(response: Response<Body>) -> String {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("body");
    String::from_utf8(bytes.to_vec()).expect("utf8 body")
}

pub async fn read_json(response: Response<Body>) -> serde_json::Value {
    serde_json::from_str(&read_text(response).await).expect("json body")
}
