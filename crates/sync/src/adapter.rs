//! The platform adapter contract.
//!
//! One implementation exists per marketplace. Adapters normalize the
//! platform's API into the capability set below and classify every failure
//! as [`AdapterError::Transient`] or [`AdapterError::Permanent`].

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use common::Money;
use domain::{OrderStatus, PlatformType, Product, RawOrder};

use crate::error::AdapterError;

/// Secrets needed to talk to one platform account.
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    pub api_key: String,
    pub api_secret: String,
    pub access_token: Option<String>,
    pub seller_id: Option<String>,
}

impl Credentials {
    /// Key and secret only; token and seller id are optional.
    pub fn new(api_key: impl Into<String>, api_secret: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            api_secret: api_secret.into(),
            access_token: None,
            seller_id: None,
        }
    }

    /// Sets the seller account id some platforms scope calls by.
    pub fn with_seller_id(mut self, seller_id: impl Into<String>) -> Self {
        self.seller_id = Some(seller_id.into());
        self
    }
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("api_key", &self.api_key)
            .field("api_secret", &"<redacted>")
            .field("access_token", &self.access_token.as_ref().map(|_| "<redacted>"))
            .field("seller_id", &self.seller_id)
            .finish()
    }
}

/// Capability contract of a marketplace platform.
#[async_trait]
pub trait PlatformAdapter: Send + Sync {
    /// The platform key this adapter serves.
    fn platform_type(&self) -> PlatformType;

    /// Validates credentials. Never mutates remote state.
    async fn test_connection(&self, credentials: &Credentials) -> Result<bool, AdapterError>;

    /// Publishes a product and returns its platform product id.
    ///
    /// Publishing a product that is already listed returns the existing id.
    async fn publish_product(
        &self,
        product: &Product,
        credentials: &Credentials,
    ) -> Result<String, AdapterError>;

    /// Sets the remote price of an already published product.
    async fn update_price(
        &self,
        platform_product_id: &str,
        price: Money,
        credentials: &Credentials,
    ) -> Result<(), AdapterError>;

    /// Sets the remote available quantity of an already published product.
    async fn update_stock(
        &self,
        platform_product_id: &str,
        quantity: u32,
        credentials: &Credentials,
    ) -> Result<(), AdapterError>;

    /// Returns orders modified at or after `since` (inclusive); `None` pulls
    /// everything.
    async fn fetch_orders(
        &self,
        credentials: &Credentials,
        since: Option<DateTime<Utc>>,
    ) -> Result<Vec<RawOrder>, AdapterError>;

    /// Mirrors a local status change onto the platform order.
    async fn update_order_status(
        &self,
        platform_order_id: &str,
        status: OrderStatus,
        credentials: &Credentials,
    ) -> Result<(), AdapterError>;
}

/// Registered adapters, keyed by platform.
#[derive(Clone, Default)]
pub struct AdapterSet {
    adapters: HashMap<PlatformType, Arc<dyn PlatformAdapter>>,
}

impl AdapterSet {
    /// An empty set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers an adapter under its own platform key, replacing any
    /// previous one.
    pub fn register(&mut self, adapter: Arc<dyn PlatformAdapter>) {
        self.adapters.insert(adapter.platform_type(), adapter);
    }

    /// Builder form of [`AdapterSet::register`].
    pub fn with(mut self, adapter: Arc<dyn PlatformAdapter>) -> Self {
        self.register(adapter);
        self
    }

    /// The adapter serving `platform_type`, if one is registered.
    pub fn get(&self, platform_type: &PlatformType) -> Option<Arc<dyn PlatformAdapter>> {
        self.adapters.get(platform_type).cloned()
    }

    /// Registered platform keys, sorted.
    pub fn platforms(&self) -> Vec<PlatformType> {
        let mut keys: Vec<_> = self.adapters.keys().cloned().collect();
        keys.sort();
        keys
    }
}

impl std::fmt::Debug for AdapterSet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AdapterSet")
            .field("platforms", &self.platforms())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn debug_output_hides_secrets() {
        let mut credentials = Credentials::new("key-1", "s3cret");
        credentials.access_token = Some("tok".to_string());
        let printed = format!("{credentials:?}");
        assert!(printed.contains("key-1"));
        assert!(!printed.contains("s3cret"));
        assert!(!printed.contains("\"tok\""));
    }

    #[tokio::test]
    async fn adapter_set_keeps_one_adapter_per_platform() {
        use crate::memory::InMemoryPlatformAdapter;

        let first = InMemoryPlatformAdapter::new("trendyol");
        let replacement = InMemoryPlatformAdapter::new("TRENDYOL");
        replacement.set_connection_ok(false);

        let set = AdapterSet::new()
            .with(Arc::new(InMemoryPlatformAdapter::new("hepsiburada")))
            .with(Arc::new(first))
            .with(Arc::new(replacement));

        assert_eq!(
            set.platforms(),
            vec![PlatformType::from("HEPSIBURADA"), PlatformType::from("TRENDYOL")]
        );
        let trendyol = set.get(&PlatformType::from("trendyol")).unwrap();
        let credentials = Credentials::new("key", "secret");
        assert!(!trendyol.test_connection(&credentials).await.unwrap());
        assert!(set.get(&PlatformType::from("n11")).is_none());
    }
}
