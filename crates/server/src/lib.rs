//! Sync scheduler and HTTP surface for the commerce back office.
//!
//! Exposes health and Prometheus endpoints, manual sync triggers and order
//! status changes, and runs the interval scheduler that syncs every due
//! integration.

pub mod config;
pub mod credentials;
pub mod error;
pub mod routes;
pub mod scheduler;

use std::sync::Arc;

use axum::Router;
use axum::routing::{get, post};
use domain::{IntegrationRegistry, UnitOfWork};
use metrics_exporter_prometheus::PrometheusHandle;
use sync::{AdapterSet, CredentialStore, InMemoryPlatformAdapter, SyncConfig, SyncOrchestrator};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

/// Shared application state accessible from all handlers.
pub struct AppState<U, C>
where
    U: UnitOfWork + Clone,
    C: CredentialStore,
{
    pub orchestrator: SyncOrchestrator<U, C>,
    pub registry: IntegrationRegistry<U>,
}

impl<U, C> AppState<U, C>
where
    U: UnitOfWork + Clone,
    C: CredentialStore,
{
    pub fn new(uow: U, adapters: AdapterSet, credentials: C, config: SyncConfig) -> Self {
        Self {
            registry: IntegrationRegistry::new(uow.clone()),
            orchestrator: SyncOrchestrator::new(uow, adapters, credentials, config),
        }
    }
}

/// Creates the Axum application router with all routes and shared state.
pub fn create_app<U, C>(state: Arc<AppState<U, C>>, metrics_handle: PrometheusHandle) -> Router
where
    U: UnitOfWork + Clone + 'static,
    C: CredentialStore + 'static,
{
    let metrics_router = Router::new()
        .route("/metrics", get(routes::metrics::get))
        .with_state(metrics_handle);

    Router::new()
        .route("/health", get(routes::health::check))
        .route("/integrations/{id}", get(routes::integrations::get::<U, C>))
        .route(
            "/integrations/{id}/sync",
            post(routes::integrations::sync::<U, C>),
        )
        .route(
            "/integrations/{id}/test-connection",
            post(routes::integrations::test_connection::<U, C>),
        )
        .route("/orders/{id}/status", post(routes::orders::update_status::<U, C>))
        .with_state(state)
        .merge(metrics_router)
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(TraceLayer::new_for_http())
}

/// Registers the simulated adapter for each platform key.
pub fn simulated_adapters(platforms: &[String]) -> AdapterSet {
    platforms.iter().fold(AdapterSet::new(), |set, platform| {
        set.with(Arc::new(InMemoryPlatformAdapter::new(platform.as_str())))
    })
}
