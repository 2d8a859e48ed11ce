use serde::Deserialize;
use std::env;
use std::time::Duration;
use supplier_shared::Masked;

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub server: ServerConfig,
    pub grpc: GrpcConfig,
    pub database: DatabaseConfig,
    pub redis: RedisConfig,
    pub kafka: KafkaConfig,
    #[serde(default)]
    pub consumer: ConsumerConfig,
    #[serde(default)]
    pub telemetry: TelemetryConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    pub port: u16,
}

#[derive(Debug, Deserialize, Clone)]
pub struct GrpcConfig {
    /// Port the query service listens on.
    #[serde(default = "default_grpc_port")]
    pub port: u16,
    /// Endpoint the gateway dials, e.g. `http://domain-service:50051`.
    pub query_url: String,
    /// Concurrent RPCs served per connection.
    #[serde(default = "default_grpc_concurrency")]
    pub max_concurrency: usize,
    #[serde(default = "default_connect_timeout_ms")]
    pub connect_timeout_ms: u64,
    #[serde(default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DatabaseConfig {
    pub url: Masked<String>,
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
    #[serde(default = "default_acquire_timeout_secs")]
    pub acquire_timeout_secs: u64,
    #[serde(default)]
    pub run_migrations: bool,
}

#[derive(Debug, Deserialize, Clone)]
pub struct RedisConfig {
    pub url: Masked<String>,
    #[serde(default = "default_cache_ttl_seconds")]
    pub cache_ttl_seconds: u64,
    #[serde(default = "default_connect_timeout_ms")]
    pub connect_timeout_ms: u64,
}

#[derive(Debug, Deserialize, Clone)]
pub struct KafkaConfig {
    pub brokers: String,
    #[serde(default = "default_group_id")]
    pub group_id: String,
    #[serde(default = "default_message_timeout_ms")]
    pub message_timeout_ms: u64,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ConsumerConfig {
    /// Pause before a failed message is offered again.
    #[serde(default = "default_retry_backoff_ms")]
    pub retry_backoff_ms: u64,
    /// Serve `/metrics` for the domain service on this port when set.
    #[serde(default)]
    pub metrics_port: Option<u16>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct TelemetryConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_telemetry_topic")]
    pub topic: String,
    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: usize,
}

impl Default for ConsumerConfig {
    fn default() -> Self {
        Self {
            retry_backoff_ms: default_retry_backoff_ms(),
            metrics_port: None,
        }
    }
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            topic: default_telemetry_topic(),
            queue_capacity: default_queue_capacity(),
        }
    }
}

fn default_grpc_port() -> u16 { 50051 }
fn default_grpc_concurrency() -> usize { 10 }
fn default_connect_timeout_ms() -> u64 { 1000 }
fn default_request_timeout_ms() -> u64 { 5000 }
fn default_max_connections() -> u32 { 5 }
fn default_acquire_timeout_secs() -> u64 { 3 }
fn default_cache_ttl_seconds() -> u64 { 60 }
fn default_group_id() -> String { "supplier-consumer".into() }
fn default_message_timeout_ms() -> u64 { 5000 }
fn default_retry_backoff_ms() -> u64 { 1000 }
fn default_true() -> bool { true }
fn default_telemetry_topic() -> String { "supplier_events".into() }
fn default_queue_capacity() -> usize { 1024 }

impl GrpcConfig {
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }
}

impl ConsumerConfig {
    pub fn retry_backoff(&self) -> Duration {
        Duration::from_millis(self.retry_backoff_ms)
    }
}

impl RedisConfig {
    pub fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.cache_ttl_seconds)
    }
}

impl Config {
    pub fn load() -> Result<Self, config::ConfigError> {
        let run_mode = env::var("RUN_MODE").unwrap_or_else(|_| "development".into());

        let s = config::Config::builder()
            .add_source(config::File::with_name("config/default"))
            // Per-environment overrides are optional
            .add_source(config::File::with_name(&format!("config/{}", run_mode)).required(false))
            // Not checked in
            .add_source(config::File::with_name("config/local").required(false))
            // e.g. SUPPLIER__KAFKA__BROKERS=broker:9092
            .add_source(config::Environment::with_prefix("SUPPLIER").separator("__"))
            .build()?;

        s.try_deserialize()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_minimal_config_fills_defaults() {
        let raw = r#"
            [server]
            port = 8080

            [grpc]
            query_url = "http://domain-service:50051"

            [database]
            url = "postgres://postgres:example@db:5432/main_db"

            [redis]
            url = "redis://redis:6379"

            [kafka]
            brokers = "kafka:9092"
        "#;

        let config: Config = config::Config::builder()
            .add_source(config::File::from_str(raw, config::FileFormat::Toml))
            .build()
            .unwrap()
            .try_deserialize()
            .unwrap();

        assert_eq!(config.grpc.port, 50051);
        assert_eq!(config.grpc.max_concurrency, 10);
        assert_eq!(config.redis.cache_ttl(), Duration::from_secs(60));
        assert_eq!(config.database.max_connections, 5);
        assert!(!config.database.run_migrations);
        assert_eq!(config.consumer.retry_backoff_ms, 1000);
        assert!(config.telemetry.enabled);
        assert_eq!(config.telemetry.topic, "supplier_events");
        assert_eq!(format!("{:?}", config.database.url), "********");
    }
}
