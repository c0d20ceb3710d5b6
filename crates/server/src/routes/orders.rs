//! Local order status changes, mirrored to the platform.

use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, State};
use chrono::{DateTime, Utc};
use common::OrderId;
use domain::{OrderStatus, OrderStatusUpdate, UnitOfWork};
use serde::{Deserialize, Serialize};
use sync::CredentialStore;

use crate::AppState;
use crate::error::ApiError;

#[derive(Deserialize)]
pub struct UpdateStatusRequest {
    pub status: String,
    pub tracking_number: Option<String>,
    pub cargo_company: Option<String>,
    pub notes: Option<String>,
}

#[derive(Serialize)]
pub struct OrderStatusResponse {
    pub order_id: String,
    pub order_number: String,
    pub status: OrderStatus,
    pub tracking_number: Option<String>,
    pub shipped_at: Option<DateTime<Utc>>,
    pub delivered_at: Option<DateTime<Utc>>,
    /// Present when the platform did not accept the change.
    pub mirror_error: Option<String>,
}

/// POST /orders/{id}/status
pub async fn update_status<U, C>(
    State(state): State<Arc<AppState<U, C>>>,
    Path(id): Path<String>,
    Json(req): Json<UpdateStatusRequest>,
) -> Result<Json<OrderStatusResponse>, ApiError>
where
    U: UnitOfWork + Clone + 'static,
    C: CredentialStore + 'static,
{
    let order_id: OrderId = id
        .parse()
        .map_err(|_| ApiError::BadRequest(format!("invalid order id: {id}")))?;
    let status: OrderStatus = req.status.parse().map_err(ApiError::BadRequest)?;

    let update = OrderStatusUpdate {
        order_id,
        status,
        tracking_number: req.tracking_number,
        cargo_company: req.cargo_company,
        notes: req.notes,
    };
    let change = state.orchestrator.update_order_status(update).await?;

    Ok(Json(OrderStatusResponse {
        order_id: change.order.id.to_string(),
        order_number: change.order.order_number,
        status: change.order.status,
        tracking_number: change.order.tracking_number,
        shipped_at: change.order.shipped_at,
        delivered_at: change.order.delivered_at,
        mirror_error: change.mirror_error,
    }))
}
