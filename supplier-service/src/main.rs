use anyhow::Context;
use axum::{extract::State, http::StatusCode, routing::get, Router};
use std::net::SocketAddr;
use std::sync::Arc;
use supplier_core::SupplierRepository;
use supplier_proto::SupplierServiceServer;
use supplier_service::{ConsumerMetrics, MutationConsumer, QueryService};
use supplier_store::app_config::Config;
use supplier_store::{DbClient, KafkaLaneSubscriber, PostgresSupplierRepository};
use tokio::sync::watch;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "supplier_service=debug,supplier_store=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::load().context("Failed to load config")?;

    // Postgres pool, shared by the query service and all three lanes
    let db = DbClient::new(&config.database)
        .await
        .context("Failed to connect to Postgres")?;
    if config.database.run_migrations {
        db.migrate().await.context("Failed to run migrations")?;
    }
    let repo: Arc<dyn SupplierRepository> = Arc::new(PostgresSupplierRepository::new(&db));

    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    // Mutation consumer
    let metrics = ConsumerMetrics::new().context("Failed to register metrics")?;
    let consumer = Arc::new(
        MutationConsumer::new(
            repo.clone(),
            Arc::new(KafkaLaneSubscriber::new(&config.kafka)),
            config.consumer.retry_backoff(),
        )
        .with_metrics(metrics.clone()),
    );
    let lanes = consumer.spawn(shutdown_rx.clone());

    if let Some(port) = config.consumer.metrics_port {
        tokio::spawn(serve_metrics(port, metrics, shutdown_rx.clone()));
    }

    // Query service
    let addr = SocketAddr::from(([0, 0, 0, 0], config.grpc.port));
    tracing::info!("Query service listening on {}", addr);

    let mut grpc_shutdown = shutdown_rx.clone();
    let server = tonic::transport::Server::builder()
        .concurrency_limit_per_connection(config.grpc.max_concurrency)
        .add_service(SupplierServiceServer::new(QueryService::new(repo)))
        .serve_with_shutdown(addr, async move {
            let _ = grpc_shutdown.changed().await;
        });

    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("Shutdown signal received");
        }
        let _ = shutdown_tx.send(true);
    });

    server.await.context("Query service failed")?;

    for lane in lanes {
        let _ = lane.await;
    }
    tracing::info!("Domain service stopped");
    Ok(())
}

async fn serve_metrics(port: u16, metrics: ConsumerMetrics, mut shutdown: watch::Receiver<bool>) {
    let app = Router::new()
        .route("/metrics", get(render_metrics))
        .with_state(metrics);

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let listener = match tokio::net::TcpListener::bind(addr).await {
        Ok(listener) => listener,
        Err(e) => {
            tracing::error!("Cannot bind metrics listener on {}: {}", addr, e);
            return;
        }
    };
    tracing::info!("Metrics listening on {}", addr);

    let result = axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            let _ = shutdown.changed().await;
        })
        .await;
    if let Err(e) = result {
        tracing::error!("Metrics listener failed: {}", e);
    }
}

async fn render_metrics(State(metrics): State<ConsumerMetrics>) -> Result<String, StatusCode> {
    metrics.render().map_err(|e| {
        tracing::error!("Failed to encode metrics: {}", e);
        StatusCode::INTERNAL_SERVER_ERROR
    })
}
