use serde::{Deserialize, Serialize};

use crate::types::UtcInstant;

/// One append-only audit entry for a security-relevant operation.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct AuditRecord {
    pub id: String,
    /// Coarse grouping, e.g. "Consensus", "Shipment", "Validator".
    pub category: String,
    pub action: String,
    pub description: String,
    pub principal_id: Option<String>,
    pub principal_name: Option<String>,
    pub entity_id: Option<String>,
    pub entity_type: Option<String>,
    /// Free-form JSON string with operation-specific detail.
    pub metadata: Option<String>,
    pub ip_address: Option<String>,
    pub is_success: bool,
    pub error_message: Option<String>,
    pub timestamp: UtcInstant,
}

impl AuditRecord {
    /// A successful record with the given coordinates; optional fields start
    /// empty and are filled with the `with_*` helpers.
    pub fn success(category: &str, action: &str, description: impl Into<String>) -> Self {
        use std::sync::atomic::{AtomicU64, Ordering};
        static SEQ: AtomicU64 = AtomicU64::new(0);
        Self {
            id: format!("audit-{}", SEQ.fetch_add(1, Ordering::Relaxed)),
            category: category.to_string(),
            action: action.to_string(),
            description: description.into(),
            principal_id: None,
            principal_name: None,
            entity_id: None,
            entity_type: None,
            metadata: None,
            ip_address: None,
            is_success: true,
            error_message: None,
            timestamp: chrono::Utc::now(),
        }
    }

    pub fn failure(
        category: &str,
        action: &str,
        description: impl Into<String>,
        error: impl Into<String>,
    ) -> Self {
        let mut record = Self::success(category, action, description);
        record.is_success = false;
        record.error_message = Some(error.into());
        record
    }

    pub fn with_principal(mut self, id: &str, name: &str) -> Self {
        self.principal_id = Some(id.to_string());
        self.principal_name = Some(name.to_string());
        self
    }

    pub fn with_entity(mut self, id: &str, entity_type: &str) -> Self {
        self.entity_id = Some(id.to_string());
        self.entity_type = Some(entity_type.to_string());
        self
    }

    pub fn with_metadata(mut self, metadata: impl Into<String>) -> Self {
        self.metadata = Some(metadata.into());
        self
    }
}

/// Filter for the audit query interface. All fields are conjunctive;
/// `None` means "don't care".
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct AuditQuery {
    pub category: Option<String>,
    pub principal_id: Option<String>,
    pub entity_id: Option<String>,
    pub is_success: Option<bool>,
    pub from: Option<UtcInstant>,
    pub to: Option<UtcInstant>,
    pub offset: usize,
    pub limit: Option<usize>,
}

impl AuditQuery {
    pub fn matches(&self, record: &AuditRecord) -> bool {
        if let Some(c) = &self.category {
            if &record.category != c {
                return false;
            }
        }
        if let Some(p) = &self.principal_id {
            if record.principal_id.as_ref() != Some(p) {
                return false;
            }
        }
        if let Some(e) = &self.entity_id {
            if record.entity_id.as_ref() != Some(e) {
                return false;
            }
        }
        if let Some(s) = self.is_success {
            if record.is_success != s {
                return false;
            }
        }
        if let Some(from) = self.from {
            if record.timestamp < from {
                return false;
            }
        }
        if let Some(to) = self.to {
            if record.timestamp > to {
                return false;
            }
        }
        true
    }
}
