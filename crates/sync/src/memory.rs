//! Simulated marketplace for tests and the demo server.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, RwLock};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use common::{Money, ProductId};
use domain::{OrderStatus, PlatformType, Product, RawOrder};

use crate::adapter::{Credentials, PlatformAdapter};
use crate::error::AdapterError;

/// A listing as the simulated platform sees it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteListing {
    pub product_id: ProductId,
    pub platform_product_id: String,
    pub price: Money,
    pub stock: u32,
}

#[derive(Debug)]
struct InMemoryPlatformState {
    listings: HashMap<ProductId, RemoteListing>,
    orders: Vec<RawOrder>,
    mirrored_statuses: HashMap<String, OrderStatus>,
    next_id: u32,
    publish_calls: usize,
    fetch_calls: Vec<Option<DateTime<Utc>>>,
    permanent_failures: HashSet<ProductId>,
    transient_failures: HashMap<ProductId, u32>,
    fail_fetch: Option<AdapterError>,
    fail_status_update: bool,
    connection_ok: bool,
    call_delay: Option<Duration>,
}

impl Default for InMemoryPlatformState {
    fn default() -> Self {
        Self {
            listings: HashMap::new(),
            orders: Vec::new(),
            mirrored_statuses: HashMap::new(),
            next_id: 0,
            publish_calls: 0,
            fetch_calls: Vec::new(),
            permanent_failures: HashSet::new(),
            transient_failures: HashMap::new(),
            fail_fetch: None,
            fail_status_update: false,
            connection_ok: true,
            call_delay: None,
        }
    }
}

impl InMemoryPlatformState {
    fn product_for(&self, platform_product_id: &str) -> Result<ProductId, AdapterError> {
        self.listings
            .values()
            .find(|l| l.platform_product_id == platform_product_id)
            .map(|l| l.product_id)
            .ok_or_else(|| AdapterError::permanent(format!("unknown listing {platform_product_id}")))
    }

    fn injected_fault(&mut self, product_id: ProductId) -> Result<(), AdapterError> {
        if self.permanent_failures.contains(&product_id) {
            return Err(AdapterError::permanent(format!("product {product_id} rejected")));
        }
        if let Some(remaining) = self.transient_failures.get_mut(&product_id) {
            if *remaining > 0 {
                *remaining -= 1;
                return Err(AdapterError::transient("service unavailable"));
            }
        }
        Ok(())
    }
}

/// In-memory platform adapter with fault injection.
#[derive(Debug, Clone)]
pub struct InMemoryPlatformAdapter {
    platform: PlatformType,
    state: Arc<RwLock<InMemoryPlatformState>>,
}

impl InMemoryPlatformAdapter {
    pub fn new(platform: impl Into<PlatformType>) -> Self {
        Self {
            platform: platform.into(),
            state: Arc::default(),
        }
    }

    /// Every call for this product fails with a permanent error.
    pub fn fail_product_permanently(&self, product_id: ProductId) {
        self.state.write().unwrap().permanent_failures.insert(product_id);
    }

    /// The next `times` calls for this product fail with a transient error.
    pub fn fail_product_transiently(&self, product_id: ProductId, times: u32) {
        self.state
            .write()
            .unwrap()
            .transient_failures
            .insert(product_id, times);
    }

    /// Makes `fetch_orders` fail with the given error until cleared.
    pub fn set_fail_fetch(&self, error: Option<AdapterError>) {
        self.state.write().unwrap().fail_fetch = error;
    }

    /// Makes every `update_order_status` call fail permanently.
    pub fn set_fail_status_update(&self, fail: bool) {
        self.state.write().unwrap().fail_status_update = fail;
    }

    /// What `test_connection` reports.
    pub fn set_connection_ok(&self, ok: bool) {
        self.state.write().unwrap().connection_ok = ok;
    }

    /// Delays every call, to simulate a slow platform.
    pub fn set_call_delay(&self, delay: Option<Duration>) {
        self.state.write().unwrap().call_delay = delay;
    }

    /// Adds or replaces an order on the platform.
    pub fn add_order(&self, order: RawOrder) {
        let mut state = self.state.write().unwrap();
        state
            .orders
            .retain(|o| o.platform_order_id != order.platform_order_id);
        state.orders.push(order);
    }

    /// The platform-side copy of a published product.
    pub fn remote_listing(&self, product_id: ProductId) -> Option<RemoteListing> {
        self.state.read().unwrap().listings.get(&product_id).cloned()
    }

    pub fn listing_count(&self) -> usize {
        self.state.read().unwrap().listings.len()
    }

    /// Number of `publish_product` calls, including repeats and failures.
    pub fn publish_calls(&self) -> usize {
        self.state.read().unwrap().publish_calls
    }

    /// The `since` argument of every `fetch_orders` call so far.
    pub fn fetch_calls(&self) -> Vec<Option<DateTime<Utc>>> {
        self.state.read().unwrap().fetch_calls.clone()
    }

    /// Last status mirrored onto a platform order.
    pub fn mirrored_status(&self, platform_order_id: &str) -> Option<OrderStatus> {
        self.state
            .read()
            .unwrap()
            .mirrored_statuses
            .get(platform_order_id)
            .copied()
    }

    async fn simulate_latency(&self) {
        let delay = self.state.read().unwrap().call_delay;
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
    }
}

#[async_trait]
impl PlatformAdapter for InMemoryPlatformAdapter {
    fn platform_type(&self) -> PlatformType {
        self.platform.clone()
    }

    async fn test_connection(&self, _credentials: &Credentials) -> Result<bool, AdapterError> {
        self.simulate_latency().await;
        Ok(self.state.read().unwrap().connection_ok)
    }

    async fn publish_product(
        &self,
        product: &Product,
        _credentials: &Credentials,
    ) -> Result<String, AdapterError> {
        self.simulate_latency().await;
        let mut state = self.state.write().unwrap();
        state.publish_calls += 1;
        state.injected_fault(product.id)?;

        if let Some(existing) = state.listings.get_mut(&product.id) {
            existing.price = product.base_price;
            existing.stock = product.stock_quantity();
            return Ok(existing.platform_product_id.clone());
        }

        state.next_id += 1;
        let platform_product_id = format!("{}-{:05}", self.platform, state.next_id);
        state.listings.insert(
            product.id,
            RemoteListing {
                product_id: product.id,
                platform_product_id: platform_product_id.clone(),
                price: product.base_price,
                stock: product.stock_quantity(),
            },
        );
        Ok(platform_product_id)
    }

    async fn update_price(
        &self,
        platform_product_id: &str,
        price: Money,
        _credentials: &Credentials,
    ) -> Result<(), AdapterError> {
        self.simulate_latency().await;
        let mut state = self.state.write().unwrap();
        let product_id = state.product_for(platform_product_id)?;
        state.injected_fault(product_id)?;
        if let Some(listing) = state.listings.get_mut(&product_id) {
            listing.price = price;
        }
        Ok(())
    }

    async fn update_stock(
        &self,
        platform_product_id: &str,
        quantity: u32,
        _credentials: &Credentials,
    ) -> Result<(), AdapterError> {
        self.simulate_latency().await;
        let mut state = self.state.write().unwrap();
        let product_id = state.product_for(platform_product_id)?;
        state.injected_fault(product_id)?;
        if let Some(listing) = state.listings.get_mut(&product_id) {
            listing.stock = quantity;
        }
        Ok(())
    }

    async fn fetch_orders(
        &self,
        _credentials: &Credentials,
        since: Option<DateTime<Utc>>,
    ) -> Result<Vec<RawOrder>, AdapterError> {
        self.simulate_latency().await;
        let mut state = self.state.write().unwrap();
        state.fetch_calls.push(since);
        if let Some(err) = &state.fail_fetch {
            return Err(err.clone());
        }
        let mut orders: Vec<RawOrder> = state
            .orders
            .iter()
            .filter(|o| since.is_none_or(|since| o.modified_at >= since))
            .cloned()
            .collect();
        orders.sort_by_key(|o| o.modified_at);
        Ok(orders)
    }

    async fn update_order_status(
        &self,
        platform_order_id: &str,
        status: OrderStatus,
        _credentials: &Credentials,
    ) -> Result<(), AdapterError> {
        self.simulate_latency().await;
        let mut state = self.state.write().unwrap();
        if state.fail_status_update {
            return Err(AdapterError::permanent(format!(
                "order {platform_order_id} cannot move to {status}"
            )));
        }
        state
            .mirrored_statuses
            .insert(platform_order_id.to_string(), status);
        Ok(())
    }
}
