pub mod models;
pub mod pii;

pub use models::events::{SupplierEvent, SupplierEventKind};
pub use pii::Masked;
