pub mod metrics;
pub mod query;
pub mod worker;

pub use metrics::ConsumerMetrics;
pub use query::QueryService;
pub use worker::{MutationConsumer, Outcome};
