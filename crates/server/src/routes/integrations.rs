//! Integration status, manual sync trigger and connection test.

use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, Query, State};
use common::IntegrationId;
use domain::{PlatformIntegration, UnitOfWork};
use serde::{Deserialize, Serialize};
use sync::{CredentialStore, SyncResult, SyncScope};

use crate::AppState;
use crate::error::ApiError;

#[derive(Deserialize)]
pub struct SyncParams {
    pub scope: Option<String>,
}

#[derive(Serialize)]
pub struct ConnectionResponse {
    pub connected: bool,
}

pub(crate) fn parse_id(raw: &str) -> Result<IntegrationId, ApiError> {
    raw.parse()
        .map_err(|_| ApiError::BadRequest(format!("invalid integration id: {raw}")))
}

/// GET /integrations/{id}: configuration and last-sync bookkeeping.
pub async fn get<U, C>(
    State(state): State<Arc<AppState<U, C>>>,
    Path(id): Path<String>,
) -> Result<Json<PlatformIntegration>, ApiError>
where
    U: UnitOfWork + Clone + 'static,
    C: CredentialStore + 'static,
{
    let integration = state.registry.get(parse_id(&id)?).await?;
    Ok(Json(integration))
}

/// POST /integrations/{id}/sync?scope=products|orders|full
///
/// Runs synchronously and returns the aggregated result; `full` is the default.
pub async fn sync<U, C>(
    State(state): State<Arc<AppState<U, C>>>,
    Path(id): Path<String>,
    Query(params): Query<SyncParams>,
) -> Result<Json<SyncResult>, ApiError>
where
    U: UnitOfWork + Clone + 'static,
    C: CredentialStore + 'static,
{
    let integration_id = parse_id(&id)?;
    let scope = match params.scope.as_deref() {
        None => SyncScope::Full,
        Some(raw) => raw.parse::<SyncScope>().map_err(ApiError::BadRequest)?,
    };
    let result = state.orchestrator.sync(integration_id, scope).await?;
    Ok(Json(result))
}

/// POST /integrations/{id}/test-connection
pub async fn test_connection<U, C>(
    State(state): State<Arc<AppState<U, C>>>,
    Path(id): Path<String>,
) -> Result<Json<ConnectionResponse>, ApiError>
where
    U: UnitOfWork + Clone + 'static,
    C: CredentialStore + 'static,
{
    let connected = state.orchestrator.test_connection(parse_id(&id)?).await?;
    Ok(Json(ConnectionResponse { connected }))
}
