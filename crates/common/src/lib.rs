//! Shared identifiers and value types.
//!
//! Entities reference each other only through these ids; relations are
//! resolved by repository lookups rather than embedded object graphs.

mod money;
mod types;

pub use money::Money;
pub use types::{
    CategoryId, HistoryId, IntegrationId, ListingId, OrderId, OrderItemId, ProductId, StoreId,
};
