//! Platform orders, their status machine and ingest.

mod model;
mod service;
mod state;

pub use model::{Order, OrderItem, RawOrder, RawOrderItem};
pub use service::{IngestOutcome, OrderService, OrderStatusUpdate, upsert_platform_order};
pub use state::OrderStatus;
