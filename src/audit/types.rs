//! Audit log wire types.

use serde::{Deserialize, Serialize};

/// What happened to the entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AuditAction {
    Create,
    Update,
    Delete,
}

/// One audit record as accepted by `POST /v1/audit-logs`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuditLogEntry {
    /// Acting user; `None` for system-initiated changes.
    pub user_id: Option<i64>,
    pub action: AuditAction,
    pub entity_type: String,
    pub entity_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub changes: Option<serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<serde_json::Value>,
}

impl AuditLogEntry {
    pub fn new(action: AuditAction, entity_type: impl Into<String>, entity_id: impl Into<String>) -> Self {
        Self {
            user_id: None,
            action,
            entity_type: entity_type.into(),
            entity_id: entity_id.into(),
            changes: None,
            metadata: None,
        }
    }

    pub fn with_changes(mut self, changes: serde_json::Value) -> Self {
        self.changes = Some(changes);
        self
    }

    pub fn with_metadata(mut self, metadata: serde_json::Value) -> Self {
        self.metadata = Some(metadata);
        self
    }
}
