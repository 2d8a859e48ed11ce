mod common;

use async_trait::async_trait;
use axum::http::StatusCode;
use common::{empty_request, gateway, json_request, read_json, read_text, RepoQuery};
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use supplier_api::metrics::HttpMetrics;
use supplier_api::telemetry::Telemetry;
use supplier_api::{app, AppState};
use supplier_core::{
    CacheError, Lane, MutationCommand, SnapshotCache, SupplierFields, SUPPLIERS_CACHE_KEY,
};
use supplier_store::memory::{InMemoryCache, InMemoryChannel, InMemorySupplierRepository};
use tower::ServiceExt;

async fn seed_cache(cache: &impl SnapshotCache) {
    cache
        .set_with_expiry(SUPPLIERS_CACHE_KEY, "[]", Duration::from_secs(60))
        .await
        .unwrap();
}

fn published(gw: &common::TestGateway, lane: Lane) -> Vec<MutationCommand> {
    gw.channel
        .published(lane)
        .iter()
        .map(|payload| MutationCommand::decode(payload).unwrap())
        .collect()
}

#[tokio::test]
async fn create_publishes_command_and_invalidates_cache() {
    let gw = gateway();
    seed_cache(gw.cache.as_ref()).await;

    let response = gw
        .app
        .clone()
        .oneshot(json_request(
            "POST",
            "/suppliers",
            json!({ "company_name": "Acme", "contact_person": "Jo", "phone": "555" }),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::ACCEPTED);
    let body = read_json(response).await;
    assert_eq!(body["message"], "Supplier creation request accepted for processing");
    assert!(body.get("id").is_none());

    assert_eq!(
        published(&gw, Lane::Create),
        vec![MutationCommand::create(SupplierFields::new("Acme", "Jo", "555"))]
    );
    assert_eq!(gw.cache.get(SUPPLIERS_CACHE_KEY).await.unwrap(), None);
    // Accepted is not applied
    assert!(gw.repo.rows().is_empty());
}

#[tokio::test]
async fn create_tolerates_partial_input() {
    let gw = gateway();

    let response = gw
        .app
        .clone()
        .oneshot(json_request("POST", "/suppliers", json!({ "contact_person": "Jo" })))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::ACCEPTED);
    assert_eq!(
        published(&gw, Lane::Create),
        vec![MutationCommand::create(SupplierFields::new("", "Jo", ""))]
    );
}

#[tokio::test]
async fn update_and_delete_use_their_own_lanes() {
    let gw = gateway();

    let response = gw
        .app
        .clone()
        .oneshot(json_request(
            "PUT",
            "/suppliers/7",
            json!({ "company_name": "Acme Ltd", "contact_person": "Jo", "phone": "556" }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::ACCEPTED);
    assert_eq!(
        read_json(response).await["message"],
        "Supplier 7 update request accepted for processing"
    );

    seed_cache(gw.cache.as_ref()).await;
    let response = gw
        .app
        .clone()
        .oneshot(empty_request("DELETE", "/suppliers/5"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::ACCEPTED);
    assert_eq!(gw.cache.get(SUPPLIERS_CACHE_KEY).await.unwrap(), None);

    assert_eq!(
        published(&gw, Lane::Update),
        vec![MutationCommand::update(7, SupplierFields::new("Acme Ltd", "Jo", "556"))]
    );
    assert_eq!(published(&gw, Lane::Delete), vec![MutationCommand::delete(5)]);
    assert!(published(&gw, Lane::Create).is_empty());
}

#[tokio::test]
async fn broker_outage_fails_write_without_invalidating() {
    let gw = gateway();
    seed_cache(gw.cache.as_ref()).await;
    gw.channel.set_available(false);

    let response = gw
        .app
        .clone()
        .oneshot(json_request(
            "POST",
            "/suppliers",
            json!({ "company_name": "Acme", "contact_person": "Jo", "phone": "555" }),
        ))
        .await
        .unwrap();

    assert!(response.status().is_server_error());
    assert_eq!(read_json(response).await["error"], "Message channel unavailable");
    assert!(gw.channel.published(Lane::Create).is_empty());
    assert_eq!(gw.cache.peek(SUPPLIERS_CACHE_KEY).as_deref(), Some("[]"));
}

#[tokio::test]
async fn cache_outage_fails_write_but_keeps_command_queued() {
    let gw = gateway();
    gw.cache.set_available(false);

    let response = gw
        .app
        .clone()
        .oneshot(empty_request("DELETE", "/suppliers/3"))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(read_json(response).await["error"], "Supplier cache unavailable");
    assert_eq!(gw.channel.pending(Lane::Delete), 1);
}

/// Reads succeed but deletes of the snapshot key fail.
struct StuckSnapshotCache {
    inner: InMemoryCache,
}

#[async_trait]
impl SnapshotCache for StuckSnapshotCache {
    async fn get(&self, key: &str) -> Result<Option<String>, CacheError> {
        self.inner.get(key).await
    }

    async fn set_with_expiry(&self, key: &str, value: &str, ttl: Duration) -> Result<(), CacheError> {
        self.inner.set_with_expiry(key, value, ttl).await
    }

    async fn invalidate(&self, _key: &str) -> Result<(), CacheError> {
        Err(CacheError::Unavailable("connection reset".into()))
    }
}

#[tokio::test]
async fn failed_invalidation_is_never_reported_as_accepted() {
    let channel = InMemoryChannel::new();
    let cache = Arc::new(StuckSnapshotCache {
        inner: InMemoryCache::new(),
    });
    cache
        .set_with_expiry(SUPPLIERS_CACHE_KEY, r#"["STALE"]"#, Duration::from_secs(60))
        .await
        .unwrap();
    let app = app(AppState {
        publisher: Arc::new(channel.clone()),
        cache: cache.clone(),
        query: Arc::new(RepoQuery::new(Arc::new(InMemorySupplierRepository::new()))),
        telemetry: Telemetry::disabled(),
        metrics: HttpMetrics::new().unwrap(),
        cache_ttl: Duration::from_secs(60),
    });

    for (method, uri) in [("POST", "/suppliers"), ("PUT", "/suppliers/1")] {
        let response = app
            .clone()
            .oneshot(json_request(method, uri, json!({ "company_name": "Acme" })))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    }

    assert_eq!(channel.pending(Lane::Create), 1);
    assert_eq!(channel.pending(Lane::Update), 1);
}

#[tokio::test]
async fn get_on_miss_fetches_and_caches_snapshot() {
    let gw = gateway();
    gw.repo.seed(SupplierFields::new("Acme", "Jo", "555"));
    gw.repo.seed(SupplierFields::new("Globex", "Hank", "556"));

    let response = gw
        .app
        .clone()
        .oneshot(empty_request("GET", "/suppliers"))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()["x-cache"], "miss");
    let body = read_json(response).await;
    let data = body["data"].as_array().unwrap();
    assert_eq!(data.len(), 2);
    let mut names: Vec<&str> = data
        .iter()
        .map(|s| s["company_name"].as_str().unwrap())
        .collect();
    names.sort();
    assert_eq!(names, vec!["Acme", "Globex"]);
    assert!(data.iter().all(|s| s.get("id").is_some() && s.get("phone").is_some()));

    let cached = gw.cache.peek(SUPPLIERS_CACHE_KEY).expect("snapshot cached");
    let cached: serde_json::Value = serde_json::from_str(&cached).unwrap();
    assert_eq!(&cached, &body["data"]);
    let ttl = gw.cache.ttl(SUPPLIERS_CACHE_KEY).unwrap();
    assert!(ttl <= Duration::from_secs(60) && ttl > Duration::from_secs(55));
    assert_eq!(gw.query.calls(), 1);
}

#[tokio::test]
async fn get_on_hit_serves_snapshot_verbatim() {
    let gw = gateway();
    let snapshot = r#"[{"id":9,"company_name":"Cached","contact_person":"","phone":""}]"#;
    gw.cache
        .set_with_expiry(SUPPLIERS_CACHE_KEY, snapshot, Duration::from_secs(60))
        .await
        .unwrap();
    gw.repo.seed(SupplierFields::new("Fresh", "", ""));

    let response = gw
        .app
        .clone()
        .oneshot(empty_request("GET", "/suppliers"))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()["x-cache"], "hit");
    assert_eq!(read_text(response).await, format!("{{\"data\":{}}}", snapshot));
    assert_eq!(gw.query.calls(), 0);
}

#[tokio::test]
async fn get_after_write_is_forced_to_refetch() {
    let gw = gateway();
    let id = gw.repo.seed(SupplierFields::new("Acme", "", ""));

    let first = gw.app.clone().oneshot(empty_request("GET", "/suppliers")).await.unwrap();
    assert_eq!(first.headers()["x-cache"], "miss");

    let write = gw
        .app
        .clone()
        .oneshot(empty_request("DELETE", &format!("/suppliers/{}", id)))
        .await
        .unwrap();
    assert_eq!(write.status(), StatusCode::ACCEPTED);

    // Consumer has not run yet: the refetch sees the old canonical state
    let second = gw.app.clone().oneshot(empty_request("GET", "/suppliers")).await.unwrap();
    assert_eq!(second.headers()["x-cache"], "miss");
    assert_eq!(read_json(second).await["data"].as_array().unwrap().len(), 1);
    assert_eq!(gw.query.calls(), 2);
}

#[tokio::test]
async fn query_failure_returns_server_error_and_caches_nothing() {
    let gw = gateway();
    gw.repo.set_available(false);

    let response = gw
        .app
        .clone()
        .oneshot(empty_request("GET", "/suppliers"))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(read_json(response).await["error"], "Supplier query service unavailable");
    assert_eq!(gw.cache.peek(SUPPLIERS_CACHE_KEY), None);
}

#[tokio::test]
async fn cache_outage_falls_through_to_query() {
    let gw = gateway();
    gw.repo.seed(SupplierFields::new("Acme", "", ""));
    gw.cache.set_available(false);

    let response = gw
        .app
        .clone()
        .oneshot(empty_request("GET", "/suppliers"))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(read_json(response).await["data"][0]["company_name"], "Acme");
    assert_eq!(gw.query.calls(), 1);
}

#[tokio::test]
async fn non_numeric_id_is_rejected() {
    let gw = gateway();

    let response = gw
        .app
        .clone()
        .oneshot(empty_request("DELETE", "/suppliers/abc"))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert!(gw.channel.published(Lane::Delete).is_empty());
}

#[tokio::test]
async fn metrics_count_requests_by_method_and_endpoint() {
    let gw = gateway();
    for _ in 0..2 {
        gw.app.clone().oneshot(empty_request("GET", "/suppliers")).await.unwrap();
    }
    gw.app
        .clone()
        .oneshot(empty_request("DELETE", "/suppliers/1"))
        .await
        .unwrap();

    let response = gw
        .app
        .clone()
        .oneshot(empty_request("GET", "/metrics"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let text = read_text(response).await;

    assert!(text.contains(r#"http_requests_total{endpoint="/suppliers",method="GET"} 2"#));
    assert!(text.contains(r#"http_requests_total{endpoint="/suppliers/{id}",method="DELETE"} 1"#));
}

#[tokio::test]
async fn health_reports_ok() {
    let gw = gateway();

    let response = gw
        .app
        .clone()
        .oneshot(empty_request("GET", "/health"))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(read_json(response).await["status"], "ok");
}
