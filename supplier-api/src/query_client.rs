use async_trait::async_trait;
use supplier_core::{QueryError, Supplier, SupplierQuery};
use supplier_proto::{Empty, SupplierServiceClient};
use supplier_store::app_config::GrpcConfig;
use tonic::transport::{Channel, Endpoint};
use tonic::Code;

/// gRPC client for the domain service's query endpoint.
///
/// The underlying channel is connected lazily and multiplexes concurrent calls; each
/// call is bounded by the configured request timeout.
#[derive(Clone)]
pub struct GrpcSupplierQuery {
    client: SupplierServiceClient<Channel>,
}

impl GrpcSupplierQuery {
    pub fn connect_lazy(config: &GrpcConfig) -> Result<Self, tonic::transport::Error> {
        let channel = Endpoint::from_shared(config.query_url.clone())?
            .connect_timeout(config.connect_timeout())
            .timeout(config.request_timeout())
            .connect_lazy();

        Ok(Self {
            client: SupplierServiceClient::new(channel),
        })
    }
}

#[async_trait]
impl SupplierQuery for GrpcSupplierQuery {
    async fn get_suppliers(&self) -> Result<Vec<Supplier>, QueryError> {
        let mut client = self.client.clone();
        let response = client.get_suppliers(Empty {}).await.map_err(|status| {
            match status.code() {
                Code::Unavailable | Code::DeadlineExceeded | Code::Cancelled => {
                    QueryError::Unavailable(status.message().to_string())
                }
                _ => QueryError::Remote(status.to_string()),
            }
        })?;

        Ok(response
            .into_inner()
            .suppliers
            .into_iter()
            .map(Supplier::from)
            .collect())
    }
}
