use serde::{Deserialize, Serialize};

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum SupplierEventKind {
    SupplierCreateRequested,
    SupplierUpdateRequested,
    SupplierDeleteRequested,
    SuppliersListed,
}

impl SupplierEventKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            SupplierEventKind::SupplierCreateRequested => "supplier_create_requested",
            SupplierEventKind::SupplierUpdateRequested => "supplier_update_requested",
            SupplierEventKind::SupplierDeleteRequested => "supplier_delete_requested",
            SupplierEventKind::SuppliersListed => "suppliers_listed",
        }
    }
}

/// Structured telemetry record shipped to the log sink. Best-effort only.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct SupplierEvent {
    pub event: SupplierEventKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub supplier_id: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub company_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cache_hit: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub count: Option<usize>,
    pub timestamp: i64,
}

impl SupplierEvent {
    fn new(event: SupplierEventKind) -> Self {
        Self {
            event,
            supplier_id: None,
            company_name: None,
            cache_hit: None,
            count: None,
            timestamp: chrono::Utc::now().timestamp(),
        }
    }

    pub fn create_requested(company_name: &str) -> Self {
        Self {
            company_name: Some(company_name.to_string()),
            ..Self::new(SupplierEventKind::SupplierCreateRequested)
        }
    }

    pub fn update_requested(id: i64, company_name: &str) -> Self {
        Self {
            supplier_id: Some(id),
            company_name: Some(company_name.to_string()),
            ..Self::new(SupplierEventKind::SupplierUpdateRequested)
        }
    }

    pub fn delete_requested(id: i64) -> Self {
        Self {
            supplier_id: Some(id),
            ..Self::new(SupplierEventKind::SupplierDeleteRequested)
        }
    }

    pub fn listed(cache_hit: bool, count: Option<usize>) -> Self {
        Self {
            cache_hit: Some(cache_hit),
            count,
            ..Self::new(SupplierEventKind::SuppliersListed)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_omits_absent_fields() {
        let json = serde_json::to_value(SupplierEvent::delete_requested(5)).unwrap();
        assert_eq!(json["event"], "supplier_delete_requested");
        assert_eq!(json["supplier_id"], 5);
        assert!(json.get("cache_hit").is_none());
        assert!(json.get("company_name").is_none());
    }
}
