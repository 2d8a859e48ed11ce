pub mod supplier {
    tonic::include_proto!("supplier");
}

pub use supplier::supplier_service_client::SupplierServiceClient;
pub use supplier::supplier_service_server::{SupplierService, SupplierServiceServer};
pub use supplier::{Empty, SuppliersResponse};

impl From<supplier_core::Supplier> for supplier::Supplier {
    fn from(s: supplier_core::Supplier) -> Self {
        Self {
            id: s.id,
            company_name: s.company_name,
            contact_person: s.contact_person,
            phone: s.phone,
        }
    }
}

impl From<supplier::Supplier> for supplier_core::Supplier {
    fn from(s: supplier::Supplier) -> Self {
        Self {
            id: s.id,
            company_name: s.company_name,
            contact_person: s.contact_person,
            phone: s.phone,
        }
    }
}
