//! Credential store port.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use domain::PlatformIntegration;

use crate::adapter::Credentials;

/// Resolves an integration's `credentials_ref` into usable secrets.
#[async_trait]
pub trait CredentialStore: Send + Sync {
    async fn get_credentials(&self, integration: &PlatformIntegration) -> Result<Credentials, String>;
}

/// In-memory credential store for tests and the demo server.
#[derive(Debug, Clone, Default)]
pub struct InMemoryCredentialStore {
    entries: Arc<RwLock<HashMap<String, Credentials>>>,
}

impl InMemoryCredentialStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores credentials under the reference integrations carry.
    pub fn insert(&self, credentials_ref: impl Into<String>, credentials: Credentials) {
        self.entries
            .write()
            .unwrap()
            .insert(credentials_ref.into(), credentials);
    }

    pub fn remove(&self, credentials_ref: &str) {
        self.entries.write().unwrap().remove(credentials_ref);
    }
}

#[async_trait]
impl CredentialStore for InMemoryCredentialStore {
    async fn get_credentials(&self, integration: &PlatformIntegration) -> Result<Credentials, String> {
        self.entries
            .read()
            .unwrap()
            .get(&integration.credentials_ref)
            .cloned()
            .ok_or_else(|| format!("no credentials stored under '{}'", integration.credentials_ref))
    }
}
