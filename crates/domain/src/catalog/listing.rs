//! Per-(product, integration) listing mirror.

use chrono::{DateTime, Utc};
use common::{IntegrationId, ListingId, Money, ProductId};
use serde::{Deserialize, Serialize};

use super::Product;

/// The last known remote state of a product on one platform.
///
/// Divergence between the product's own stock/price and the mirrored values
/// is the signal that a push is due.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductPlatform {
    pub id: ListingId,
    pub product_id: ProductId,
    pub integration_id: IntegrationId,
    pub platform_product_id: Option<String>,
    pub platform_price: Money,
    pub platform_stock_quantity: u32,
    pub is_listed: bool,
    pub auto_sync: bool,
    pub last_sync_date: Option<DateTime<Utc>>,
}

impl ProductPlatform {
    /// Creates an unlisted mirror row with nothing known about the remote side.
    pub fn unlisted(product_id: ProductId, integration_id: IntegrationId, auto_sync: bool) -> Self {
        Self {
            id: ListingId::new(),
            product_id,
            integration_id,
            platform_product_id: None,
            platform_price: Money::zero(),
            platform_stock_quantity: 0,
            is_listed: false,
            auto_sync,
            last_sync_date: None,
        }
    }

    /// The platform shows a price other than the product's base price.
    pub fn price_diverges(&self, product: &Product) -> bool {
        self.platform_price != product.base_price
    }

    /// The platform shows a quantity other than local stock.
    pub fn stock_diverges(&self, product: &Product) -> bool {
        self.platform_stock_quantity != product.stock_quantity()
    }
}

/// What a sync run has to do for one product on one integration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ListingAction {
    /// No remote listing yet: publish the whole product.
    Publish,
    /// Listed, but price and/or stock diverge from the mirror.
    Update { price: bool, stock: bool },
}

/// One product scheduled for a push, with its current mirror (if any).
#[derive(Debug, Clone)]
pub struct ProductSyncItem {
    pub product: Product,
    pub listing: Option<ProductPlatform>,
    pub action: ListingAction,
}

/// Decides which products of a store need a push to an integration.
///
/// Inactive products and listings with `auto_sync` off are skipped. Products
/// with no mirror row, or an unlisted one, are published; listed products are
/// updated only when their price or stock diverges from the mirror.
pub fn plan_product_sync(
    products: Vec<Product>,
    listings: &[ProductPlatform],
) -> Vec<ProductSyncItem> {
    products
        .into_iter()
        .filter(|p| p.is_active)
        .filter_map(|product| {
            let listing = listings
                .iter()
                .find(|l| l.product_id == product.id)
                .cloned();
            let action = match &listing {
                Some(l) if !l.auto_sync => return None,
                Some(l) if l.is_listed && l.platform_product_id.is_some() => {
                    let price = l.price_diverges(&product);
                    let stock = l.stock_diverges(&product);
                    if !price && !stock {
                        return None;
                    }
                    ListingAction::Update { price, stock }
                }
                _ => ListingAction::Publish,
            };
            Some(ProductSyncItem {
                product,
                listing,
                action,
            })
        })
        .collect()
}
