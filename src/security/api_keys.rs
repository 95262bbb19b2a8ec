//! API key validation.
//!
//! The gate only needs a lookup from the literal `X-API-Key` value to an
//! identity and quota. [`ApiKeyValidator`] is that seam; [`InMemoryKeyStore`]
//! serves keys from configuration and can be reloaded at runtime.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use arc_swap::ArcSwap;
use async_trait::async_trait;
use serde::Serialize;

use crate::config::ApiKeyConfig;
use crate::security::messages::MessageLanguage;

/// Identity attached to a valid API key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ApiKeyIdentity {
    pub id: String,
    pub name: String,
    /// Requests per window; `None` means the gate default applies.
    pub rate_limit: Option<u32>,
}

impl ApiKeyIdentity {
    /// The key's quota, or `default` when unset or zero.
    pub fn quota_or(&self, default: u32) -> u32 {
        self.rate_limit.filter(|q| *q > 0).unwrap_or(default)
    }
}

impl From<&ApiKeyConfig> for ApiKeyIdentity {
    fn from(entry: &ApiKeyConfig) -> Self {
        Self {
            id: entry.id.clone(),
            name: entry.name.clone(),
            rate_limit: entry.rate_limit,
        }
    }
}

/// Result of looking up a key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KeyValidation {
    Valid(ApiKeyIdentity),
    Invalid { reason: String },
}

/// The key store could not answer.
#[derive(Debug, thiserror::Error)]
pub enum ValidatorError {
    #[error("key store unavailable: {0}")]
    Unavailable(String),
    #[error("key lookup timed out after {0:?}")]
    Timeout(Duration),
}

/// Lookup of API keys against a key store.
#[async_trait]
pub trait ApiKeyValidator: Send + Sync {
    async fn validate(&self, key: &str) -> Result<KeyValidation, ValidatorError>;

    /// Cheap liveness probe of the backing store.
    async fn ping(&self) -> Result<(), ValidatorError> {
        Ok(())
    }
}

/// Which key ids a reload touched.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct KeyChanges {
    pub created: Vec<String>,
    pub updated: Vec<String>,
    pub deleted: Vec<String>,
}

impl KeyChanges {
    pub fn is_empty(&self) -> bool {
        self.created.is_empty() && self.updated.is_empty() && self.deleted.is_empty()
    }
}

/// Key store held in memory, indexed by secret.
#[derive(Debug, Default)]
pub struct InMemoryKeyStore {
    keys: ArcSwap<HashMap<String, ApiKeyIdentity>>,
    language: MessageLanguage,
}

impl InMemoryKeyStore {
    pub fn from_config(entries: &[ApiKeyConfig]) -> Self {
        Self {
            keys: ArcSwap::from_pointee(index(entries)),
            language: MessageLanguage::default(),
        }
    }

    /// Language of the rejection reason for unknown keys.
    pub fn with_language(mut self, language: MessageLanguage) -> Self {
        self.language = language;
        self
    }

    /// Replace the whole key set atomically and report what changed, by id.
    pub fn reload(&self, entries: &[ApiKeyConfig]) -> KeyChanges {
        let next = index(entries);
        let previous = self.keys.swap(Arc::new(next.clone()));

        let by_id = |map: &HashMap<String, ApiKeyIdentity>| -> HashMap<String, (String, ApiKeyIdentity)> {
            map.iter()
                .map(|(secret, identity)| (identity.id.clone(), (secret.clone(), identity.clone())))
                .collect()
        };
        let old = by_id(previous.as_ref());
        let new = by_id(&next);

        let mut changes = KeyChanges::default();
        for (id, entry) in &new {
            match old.get(id) {
                None => changes.created.push(id.clone()),
                Some(prev) if prev != entry => changes.updated.push(id.clone()),
                Some(_) => {}
            }
        }
        changes.deleted = old.keys().filter(|id| !new.contains_key(*id)).cloned().collect();

        changes.created.sort();
        changes.updated.sort();
        changes.deleted.sort();
        changes
    }

    pub fn len(&self) -> usize {
        self.keys.load().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

fn index(entries: &[ApiKeyConfig]) -> HashMap<String, ApiKeyIdentity> {
    entries
        .iter()
        .map(|entry| (entry.key.clone(), ApiKeyIdentity::from(entry)))
        .collect()
}

#[async_trait]
impl ApiKeyValidator for InMemoryKeyStore {
    async fn validate(&self, key: &str) -> Result<KeyValidation, ValidatorError> {
        Ok(match self.keys.load().get(key) {
            Some(identity) => KeyValidation::Valid(identity.clone()),
            None => KeyValidation::Invalid {
                reason: self.language.unknown_key().to_string(),
            },
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(id: &str, key: &str, rate_limit: Option<u32>) -> ApiKeyConfig {
        ApiKeyConfig {
            id: id.to_string(),
            name: format!("client-{id}"),
            key: key.to_string(),
            rate_limit,
        }
    }

    #[test]
    fn quota_defaults_when_unset_or_zero() {
        let mut identity = ApiKeyIdentity::from(&entry("1", "k", None));
        assert_eq!(identity.quota_or(100), 100);
        identity.rate_limit = Some(0);
        assert_eq!(identity.quota_or(100), 100);
        identity.rate_limit = Some(7);
        assert_eq!(identity.quota_or(100), 7);
    }

    #[tokio::test]
    async fn validates_known_keys() {
        let store = InMemoryKeyStore::from_config(&[entry("1", "fk_one", Some(10))]);

        match store.validate("fk_one").await.unwrap() {
            KeyValidation::Valid(identity) => {
                assert_eq!(identity.id, "1");
                assert_eq!(identity.name, "client-1");
                assert_eq!(identity.rate_limit, Some(10));
            }
            other => panic!("expected valid key, got {other:?}"),
        }

        assert!(matches!(
            store.validate("fk_unknown").await.unwrap(),
            KeyValidation::Invalid { .. }
        ));
        assert!(store.ping().await.is_ok());
    }

    #[tokio::test]
    async fn reload_swaps_keys_and_reports_changes() {
        let store = InMemoryKeyStore::from_config(&[
            entry("1", "fk_one", None),
            entry("2", "fk_two", Some(5)),
            entry("3", "fk_three", None),
        ]);

        let changes = store.reload(&[
            entry("1", "fk_one", None),
            entry("2", "fk_two", Some(50)),
            entry("4", "fk_four", None),
        ]);

        assert_eq!(changes.created, vec!["4".to_string()]);
        assert_eq!(changes.updated, vec!["2".to_string()]);
        assert_eq!(changes.deleted, vec!["3".to_string()]);
        assert_eq!(store.len(), 3);
        assert!(matches!(
            store.validate("fk_three").await.unwrap(),
            KeyValidation::Invalid { .. }
        ));
    }

    #[test]
    fn rotating_a_secret_counts_as_update() {
        let store = InMemoryKeyStore::from_config(&[entry("1", "old", None)]);
        let changes = store.reload(&[entry("1", "new", None)]);
        assert_eq!(changes.updated, vec!["1".to_string()]);
        assert!(changes.created.is_empty() && changes.deleted.is_empty());

        assert!(store.reload(&[entry("1", "new", None)]).is_empty());
    }
}
