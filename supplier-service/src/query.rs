use std::sync::Arc;
use supplier_core::SupplierRepository;
use supplier_proto::{Empty, SupplierService, SuppliersResponse};
use tonic::{Request, Response, Status};
use tracing::error;

/// gRPC read path: returns the canonical collection straight from the record store.
pub struct QueryService {
    repo: Arc<dyn SupplierRepository>,
}

impl QueryService {
    pub fn new(repo: Arc<dyn SupplierRepository>) -> Self {
        Self { repo }
    }
}

#[tonic::async_trait]
impl SupplierService for QueryService {
    async fn get_suppliers(
        &self,
        _request: Request<Empty>,
    ) -> Result<Response<SuppliersResponse>, Status> {
        let suppliers = self.repo.list_suppliers().await.map_err(|e| {
            error!("GetSuppliers failed: {}", e);
            Status::unavailable(e.to_string())
        })?;

        Ok(Response::new(SuppliersResponse {
            suppliers: suppliers.into_iter().map(Into::into).collect(),
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use supplier_core::SupplierFields;
    use supplier_store::memory::InMemorySupplierRepository;

    #[tokio::test]
    async fn test_get_suppliers_returns_all_rows() {
        let repo = Arc::new(InMemorySupplierRepository::new());
        repo.seed(SupplierFields::new("Acme", "Jo", "555"));
        repo.seed(SupplierFields::new("Globex", "", ""));
        let service = QueryService::new(repo);

        let response = service.get_suppliers(Request::new(Empty {})).await.unwrap();
        let mut names: Vec<String> = response
            .into_inner()
            .suppliers
            .into_iter()
            .map(|s| s.company_name)
            .collect();
        names.sort();
        assert_eq!(names, vec!["Acme", "Globex"]);
    }

    #[tokio::test]
    async fn test_store_failure_maps_to_unavailable() {
        let repo = Arc::new(InMemorySupplierRepository::new());
        repo.set_available(false);
        let service = QueryService::new(repo);

        let status = service.get_suppliers(Request::new(Empty {})).await.unwrap_err();
        assert_eq!(status.code(), tonic::Code::Unavailable);
    }
}
