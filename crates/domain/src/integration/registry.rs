//! Integration registry: the configured platform connections of each store.

use chrono::{DateTime, Duration, Utc};
use common::{IntegrationId, StoreId};

use super::{PlatformIntegration, PlatformType, SyncStatus};
use crate::error::{DomainError, Result};
use crate::repository::{IntegrationRepository, StoreRepository, Transaction, UnitOfWork, finish};

/// Input for [`IntegrationRegistry::create`].
#[derive(Debug, Clone)]
pub struct NewIntegration {
    pub store_id: StoreId,
    pub platform_type: PlatformType,
    pub platform_store_name: String,
    pub credentials_ref: String,
    pub sync_interval_minutes: Option<u32>,
}

impl NewIntegration {
    pub fn new(
        store_id: StoreId,
        platform_type: impl Into<PlatformType>,
        credentials_ref: impl Into<String>,
    ) -> Self {
        Self {
            store_id,
            platform_type: platform_type.into(),
            platform_store_name: String::new(),
            credentials_ref: credentials_ref.into(),
            sync_interval_minutes: None,
        }
    }
}

/// Registry of platform integrations.
///
/// At most one active integration exists per (store, platform) pair; the
/// storage layer enforces it and violations surface as `Conflict`.
pub struct IntegrationRegistry<U: UnitOfWork> {
    uow: U,
}

impl<U: UnitOfWork> IntegrationRegistry<U> {
    pub fn new(uow: U) -> Self {
        Self { uow }
    }

    #[tracing::instrument(skip(self, new), fields(store_id = %new.store_id, platform = %new.platform_type))]
    pub async fn create(&self, new: NewIntegration) -> Result<PlatformIntegration> {
        let integration = PlatformIntegration {
            id: IntegrationId::new(),
            store_id: new.store_id,
            platform_type: new.platform_type,
            platform_store_name: new.platform_store_name,
            credentials_ref: new.credentials_ref,
            is_active: true,
            last_sync_date: None,
            last_sync_status: SyncStatus::Pending,
            sync_started_at: None,
            sync_interval_minutes: new.sync_interval_minutes,
            orders_synced_through: None,
            created_at: Utc::now(),
        };
        let mut tx = self.uow.begin().await?;
        let result: Result<PlatformIntegration> = async {
            tx.get_store(integration.store_id)
                .await?
                .ok_or(DomainError::StoreNotFound(integration.store_id))?;
            tx.insert_integration(&integration).await?;
            Ok(integration)
        }
        .await;
        let integration = finish(tx, result).await?;
        tracing::info!(integration_id = %integration.id, "integration created");
        Ok(integration)
    }

    pub async fn get(&self, id: IntegrationId) -> Result<PlatformIntegration> {
        let mut tx = self.uow.begin().await?;
        let result = load(&mut tx, id).await;
        finish(tx, result).await
    }

    pub async fn get_by_store(&self, store_id: StoreId) -> Result<Vec<PlatformIntegration>> {
        let mut tx = self.uow.begin().await?;
        let result = tx
            .integrations_by_store(store_id)
            .await
            .map_err(DomainError::from);
        finish(tx, result).await
    }

    /// Every active integration, across stores.
    pub async fn get_active(&self) -> Result<Vec<PlatformIntegration>> {
        let mut tx = self.uow.begin().await?;
        let result = tx.active_integrations().await.map_err(DomainError::from);
        finish(tx, result).await
    }

    /// Active integrations never synced, or last synced at least one interval
    /// ago. An integration's own interval overrides `default_interval`.
    pub async fn get_due_for_sync(
        &self,
        now: DateTime<Utc>,
        default_interval: Duration,
    ) -> Result<Vec<PlatformIntegration>> {
        Ok(self
            .get_active()
            .await?
            .into_iter()
            .filter(|i| i.is_due(now, default_interval))
            .collect())
    }

    #[tracing::instrument(skip(self, credentials_ref))]
    pub async fn update_credentials(
        &self,
        id: IntegrationId,
        credentials_ref: String,
        platform_store_name: Option<String>,
    ) -> Result<PlatformIntegration> {
        self.modify(id, |i| {
            i.credentials_ref = credentials_ref;
            if let Some(name) = platform_store_name {
                i.platform_store_name = name;
            }
        })
        .await
    }

    /// `None` falls back to the scheduler's default interval.
    pub async fn set_sync_interval(
        &self,
        id: IntegrationId,
        minutes: Option<u32>,
    ) -> Result<PlatformIntegration> {
        self.modify(id, |i| i.sync_interval_minutes = minutes).await
    }

    /// Excludes the integration from scheduled syncs. A run in flight stops
    /// starting new items.
    #[tracing::instrument(skip(self))]
    pub async fn deactivate(&self, id: IntegrationId) -> Result<PlatformIntegration> {
        self.modify(id, |i| i.is_active = false).await
    }

    /// Fails with `Conflict` if another integration is active for the pair.
    #[tracing::instrument(skip(self))]
    pub async fn activate(&self, id: IntegrationId) -> Result<PlatformIntegration> {
        self.modify(id, |i| i.is_active = true).await
    }

    /// Fails with `Conflict` while listings or orders reference it.
    #[tracing::instrument(skip(self))]
    pub async fn delete(&self, id: IntegrationId) -> Result<()> {
        let mut tx = self.uow.begin().await?;
        let result: Result<()> = async {
            load(&mut tx, id).await?;
            tx.delete_integration(id).await?;
            Ok(())
        }
        .await;
        finish(tx, result).await
    }

    async fn modify(
        &self,
        id: IntegrationId,
        change: impl FnOnce(&mut PlatformIntegration) + Send,
    ) -> Result<PlatformIntegration> {
        let mut tx = self.uow.begin().await?;
        let result: Result<PlatformIntegration> = async {
            let mut integration = tx
                .lock_integration(id)
                .await?
                .ok_or(DomainError::IntegrationNotFound(id))?;
            change(&mut integration);
            tx.update_integration(&integration).await?;
            Ok(integration)
        }
        .await;
        finish(tx, result).await
    }
}

async fn load<T: Transaction>(tx: &mut T, id: IntegrationId) -> Result<PlatformIntegration> {
    tx.get_integration(id)
        .await?
        .ok_or(DomainError::IntegrationNotFound(id))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{CatalogService, Product};
    use crate::repository::InMemoryUnitOfWork;
    use crate::store::Category;
    use common::Money;

    async fn setup() -> (InMemoryUnitOfWork, IntegrationRegistry<InMemoryUnitOfWork>, StoreId) {
        let uow = InMemoryUnitOfWork::new();
        let store = CatalogService::new(uow.clone())
            .create_store("Main")
            .await
            .unwrap();
        (uow.clone(), IntegrationRegistry::new(uow), store.id)
    }

    #[tokio::test]
    async fn test_second_active_integration_for_pair_conflicts() {
        let (_, registry, store_id) = setup().await;
        registry
            .create(NewIntegration::new(store_id, "trendyol", "cred-1"))
            .await
            .unwrap();

        let err = registry
            .create(NewIntegration::new(store_id, "TRENDYOL", "cred-2"))
            .await
            .unwrap_err();
        assert!(matches!(err, DomainError::Conflict(_)));

        registry
            .create(NewIntegration::new(store_id, "n11", "cred-3"))
            .await
            .unwrap();
        assert_eq!(registry.get_by_store(store_id).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_deactivated_pair_can_be_recreated_but_not_reactivated() {
        let (_, registry, store_id) = setup().await;
        let first = registry
            .create(NewIntegration::new(store_id, "trendyol", "cred-1"))
            .await
            .unwrap();
        registry.deactivate(first.id).await.unwrap();

        registry
            .create(NewIntegration::new(store_id, "trendyol", "cred-2"))
            .await
            .unwrap();
        let err = registry.activate(first.id).await.unwrap_err();
        assert!(matches!(err, DomainError::Conflict(_)));
        assert!(!registry.get(first.id).await.unwrap().is_active);
    }

    #[tokio::test]
    async fn test_due_for_sync_excludes_inactive() {
        let (_, registry, store_id) = setup().await;
        let a = registry
            .create(NewIntegration::new(store_id, "trendyol", "cred-1"))
            .await
            .unwrap();
        let b = registry
            .create(NewIntegration::new(store_id, "n11", "cred-2"))
            .await
            .unwrap();
        registry.deactivate(b.id).await.unwrap();

        let due = registry
            .get_due_for_sync(Utc::now(), Duration::minutes(15))
            .await
            .unwrap();
        assert_eq!(due.len(), 1);
        assert_eq!(due[0].id, a.id);
    }

    #[tokio::test]
    async fn test_delete_is_restricted_by_listings() {
        let (uow, registry, store_id) = setup().await;
        let catalog = CatalogService::new(uow);
        let category = catalog.create_category(Category::new("Toys")).await.unwrap();
        let product = catalog
            .create_product(Product::new(store_id, category.id, "Widget", Money::from_cents(100)))
            .await
            .unwrap();
        let integration = registry
            .create(NewIntegration::new(store_id, "trendyol", "cred-1"))
            .await
            .unwrap();
        catalog
            .attach_listing(product.id, integration.id, true)
            .await
            .unwrap();

        let err = registry.delete(integration.id).await.unwrap_err();
        assert!(matches!(err, DomainError::Conflict(_)));

        let unused = registry
            .create(NewIntegration::new(store_id, "n11", "cred-2"))
            .await
            .unwrap();
        registry.delete(unused.id).await.unwrap();
        assert!(matches!(
            registry.get(unused.id).await.unwrap_err(),
            DomainError::IntegrationNotFound(_)
        ));
    }

    #[tokio::test]
    async fn test_unknown_store_is_rejected() {
        let (_, registry, _) = setup().await;
        let err = registry
            .create(NewIntegration::new(StoreId::new(), "trendyol", "cred-1"))
            .await
            .unwrap_err();
        assert!(matches!(err, DomainError::StoreNotFound(_)));
    }
}
