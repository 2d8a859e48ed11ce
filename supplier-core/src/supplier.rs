use serde::{Deserialize, Serialize};

/// Canonical supplier row as held by the record store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Supplier {
    pub id: i64,
    pub company_name: String,
    pub contact_person: String,
    pub phone: String,
}

/// The three mutable columns, written together on insert and on full-replace update.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SupplierFields {
    pub company_name: String,
    pub contact_person: String,
    pub phone: String,
}

impl SupplierFields {
    pub fn new(
        company_name: impl Into<String>,
        contact_person: impl Into<String>,
        phone: impl Into<String>,
    ) -> Self {
        Self {
            company_name: company_name.into(),
            contact_person: contact_person.into(),
            phone: phone.into(),
        }
    }

    pub fn into_supplier(self, id: i64) -> Supplier {
        Supplier {
            id,
            company_name: self.company_name,
            contact_person: self.contact_person,
            phone: self.phone,
        }
    }
}
