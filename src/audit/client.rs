//! Audit log delivery.
//!
//! Delivery never fails the caller: [`AuditClient::emit`] spawns the POST
//! and only logs problems.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;

use crate::audit::types::AuditLogEntry;
use crate::config::AuditConfig;
use crate::observability::metrics;

#[derive(Debug, thiserror::Error)]
pub enum AuditError {
    #[error("audit request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("audit service answered {0}")]
    Status(reqwest::StatusCode),
}

struct AuditTarget {
    http: reqwest::Client,
    endpoint: String,
    api_key: String,
}

/// Client for the external audit service. Cheap to clone.
#[derive(Clone, Default)]
pub struct AuditClient {
    target: Option<Arc<AuditTarget>>,
}

impl AuditClient {
    /// A client that drops every entry.
    pub fn disabled() -> Self {
        Self::default()
    }

    /// Build from config; disabled when the URL or key is missing.
    pub fn from_config(config: &AuditConfig) -> Result<Self, AuditError> {
        if !config.is_enabled() {
            return Ok(Self::disabled());
        }

        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self {
            target: Some(Arc::new(AuditTarget {
                http,
                endpoint: format!("{}/v1/audit-logs", config.url.trim_end_matches('/')),
                api_key: config.api_key.clone(),
            })),
        })
    }

    pub fn is_enabled(&self) -> bool {
        self.target.is_some()
    }

    /// Deliver one entry and wait for the answer.
    pub async fn send(&self, entry: &AuditLogEntry) -> Result<(), AuditError> {
        let Some(target) = &self.target else {
            return Ok(());
        };

        let response = target
            .http
            .post(&target.endpoint)
            .header("X-API-Key", &target.api_key)
            .json(entry)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(AuditError::Status(response.status()));
        }
        Ok(())
    }

    /// Fire and forget. Returns the task handle, or `None` when disabled.
    pub fn emit(&self, entry: AuditLogEntry) -> Option<JoinHandle<()>> {
        if !self.is_enabled() {
            metrics::record_audit_event("skipped");
            return None;
        }

        let client = self.clone();
        Some(tokio::spawn(async move {
            match client.send(&entry).await {
                Ok(()) => {
                    metrics::record_audit_event("delivered");
                    tracing::debug!(
                        action = ?entry.action,
                        entity_type = %entry.entity_type,
                        entity_id = %entry.entity_id,
                        "Audit log delivered"
                    );
                }
                Err(e) => {
                    metrics::record_audit_event("failed");
                    tracing::error!(
                        action = ?entry.action,
                        entity_type = %entry.entity_type,
                        entity_id = %entry.entity_id,
                        error = %e,
                        "Could not deliver audit log"
                    );
                }
            }
        }))
    }
}
