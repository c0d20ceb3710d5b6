//! Domain error types.

use common::{CategoryId, IntegrationId, OrderId, ProductId, StoreId};
use thiserror::Error;

use crate::order::OrderStatus;
use crate::repository::PersistenceError;

/// Errors that can occur during domain operations.
#[derive(Debug, Error)]
pub enum DomainError {
    /// A stock change would leave the product with a negative quantity.
    #[error("Insufficient stock for product {product_id}: available {available}, requested {requested}")]
    InsufficientStock {
        product_id: ProductId,
        available: u32,
        requested: u64,
    },

    /// A stock change would overflow the quantity range.
    #[error("Invalid stock quantity for product {product_id}: {quantity}")]
    InvalidQuantity { product_id: ProductId, quantity: i64 },

    /// Prices must be strictly positive.
    #[error("Invalid price: {cents} (must be greater than 0)")]
    InvalidPrice { cents: i64 },

    /// An amount computed from platform data does not fit.
    #[error("Invalid amount: {0}")]
    InvalidAmount(String),

    #[error("Store not found: {0}")]
    StoreNotFound(StoreId),

    #[error("Category not found: {0}")]
    CategoryNotFound(CategoryId),

    #[error("Product not found: {0}")]
    ProductNotFound(ProductId),

    #[error("Order not found: {0}")]
    OrderNotFound(OrderId),

    #[error("Integration not found: {0}")]
    IntegrationNotFound(IntegrationId),

    /// The order status machine does not allow the requested move.
    #[error("Invalid status transition: cannot move order from {from} to {to}")]
    InvalidStatusTransition { from: OrderStatus, to: OrderStatus },

    /// Two related entities belong to different stores.
    #[error("Store mismatch: {entity} belongs to store {actual}, expected {expected}")]
    StoreMismatch {
        entity: &'static str,
        expected: StoreId,
        actual: StoreId,
    },

    /// A uniqueness or reference rule rejected the write.
    #[error("Conflict: {0}")]
    Conflict(String),

    /// An error occurred in the persistence layer.
    #[error("Persistence error: {0}")]
    Persistence(PersistenceError),
}

impl From<PersistenceError> for DomainError {
    fn from(err: PersistenceError) -> Self {
        match err {
            PersistenceError::Conflict { entity, key } => {
                DomainError::Conflict(format!("{entity} already exists for {key}"))
            }
            other => DomainError::Persistence(other),
        }
    }
}

/// Convenience type alias for domain results.
pub type Result<T> = std::result::Result<T, DomainError>;
