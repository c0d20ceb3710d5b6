//! Credentials resolved from environment variables.

use std::sync::Arc;

use async_trait::async_trait;
use domain::PlatformIntegration;
use sync::{CredentialStore, Credentials};

type Lookup = Arc<dyn Fn(&str) -> Option<String> + Send + Sync>;

/// Maps a `credentials_ref` to environment variables.
///
/// The reference `trendyol-main` reads `CRED_TRENDYOL_MAIN_API_KEY` and
/// `CRED_TRENDYOL_MAIN_API_SECRET`, plus the optional `..._ACCESS_TOKEN` and
/// `..._SELLER_ID`.
#[derive(Clone)]
pub struct EnvCredentialStore {
    lookup: Lookup,
}

impl EnvCredentialStore {
    pub fn new() -> Self {
        Self::with_lookup(|key| std::env::var(key).ok())
    }

    /// Reads variables through `lookup` instead of the process environment.
    pub fn with_lookup(lookup: impl Fn(&str) -> Option<String> + Send + Sync + 'static) -> Self {
        Self {
            lookup: Arc::new(lookup),
        }
    }

    fn var(&self, credentials_ref: &str, field: &str) -> Option<String> {
        (self.lookup)(&env_key(credentials_ref, field)).filter(|v| !v.is_empty())
    }
}

impl Default for EnvCredentialStore {
    fn default() -> Self {
        Self::new()
    }
}

fn env_key(credentials_ref: &str, field: &str) -> String {
    let reference: String = credentials_ref
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() {
                c.to_ascii_uppercase()
            } else {
                '_'
            }
        })
        .collect();
    format!("CRED_{reference}_{field}")
}

#[async_trait]
impl CredentialStore for EnvCredentialStore {
    async fn get_credentials(&self, integration: &PlatformIntegration) -> Result<Credentials, String> {
        let reference = &integration.credentials_ref;
        let api_key = self
            .var(reference, "API_KEY")
            .ok_or_else(|| format!("{} is not set", env_key(reference, "API_KEY")))?;
        let api_secret = self
            .var(reference, "API_SECRET")
            .ok_or_else(|| format!("{} is not set", env_key(reference, "API_SECRET")))?;

        let mut credentials = Credentials::new(api_key, api_secret);
        credentials.access_token = self.var(reference, "ACCESS_TOKEN");
        credentials.seller_id = self.var(reference, "SELLER_ID");
        Ok(credentials)
    }
}
