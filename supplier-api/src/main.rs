use anyhow::Context;
use std::net::SocketAddr;
use std::sync::Arc;
use supplier_api::metrics::HttpMetrics;
use supplier_api::query_client::GrpcSupplierQuery;
use supplier_api::telemetry::{KafkaTelemetrySink, Telemetry};
use supplier_api::{app, AppState};
use supplier_store::app_config::Config;
use supplier_store::{EventProducer, RedisClient};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "supplier_api=debug,tower_http=debug,axum::rejection=trace".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::load().context("Failed to load config")?;
    tracing::info!("Starting supplier gateway on port {}", config.server.port);

    // Redis
    let redis = RedisClient::new(&config.redis).context("Invalid Redis URL")?;

    // Kafka
    let producer = EventProducer::new(&config.kafka).context("Failed to create Kafka producer")?;

    // Query service
    let query = GrpcSupplierQuery::connect_lazy(&config.grpc).context("Invalid query service URL")?;

    let telemetry = if config.telemetry.enabled {
        let sink = Arc::new(KafkaTelemetrySink::new(producer.clone(), &config.telemetry.topic));
        let (telemetry, _worker) = Telemetry::spawn(sink, config.telemetry.queue_capacity);
        telemetry
    } else {
        Telemetry::disabled()
    };

    let app_state = AppState {
        publisher: Arc::new(producer),
        cache: Arc::new(redis),
        query: Arc::new(query),
        telemetry,
        metrics: HttpMetrics::new().context("Failed to register metrics")?,
        cache_ttl: config.redis.cache_ttl(),
    };

    let app = app(app_state);

    let addr = SocketAddr::from(([0, 0, 0, 0], config.server.port));
    tracing::info!("Listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;
    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            tracing::info!("Shutdown signal received");
        })
        .await
        .context("Server error")?;

    Ok(())
}
