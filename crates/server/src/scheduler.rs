//! Interval scheduler for due integrations.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use domain::UnitOfWork;
use sync::{CredentialStore, SyncError};
use tokio::sync::watch;
use tokio::time::MissedTickBehavior;

use crate::AppState;

/// Runs `run_due` on a fixed tick until shutdown.
pub struct Scheduler<U, C>
where
    U: UnitOfWork + Clone,
    C: CredentialStore,
{
    state: Arc<AppState<U, C>>,
    tick: Duration,
    default_interval: chrono::Duration,
}

impl<U, C> Scheduler<U, C>
where
    U: UnitOfWork + Clone + 'static,
    C: CredentialStore + 'static,
{
    /// Integrations without their own interval sync every `default_interval`.
    pub fn new(state: Arc<AppState<U, C>>, tick: Duration, default_interval: chrono::Duration) -> Self {
        Self {
            state,
            tick,
            default_interval,
        }
    }

    /// Ticks until `shutdown` changes. A tick in progress is finished first.
    pub async fn run(self, mut shutdown: watch::Receiver<bool>) {
        let mut ticker = tokio::time::interval(self.tick);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        tracing::info!(tick_secs = self.tick.as_secs(), "scheduler started");

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    self.tick_once(Utc::now()).await;
                }
                _ = shutdown.changed() => {
                    tracing::info!("scheduler stopping");
                    break;
                }
            }
        }
    }

    /// Syncs every integration due at `now`; returns how many runs started.
    pub async fn tick_once(&self, now: DateTime<Utc>) -> usize {
        let runs = match self.state.orchestrator.run_due(now, self.default_interval).await {
            Ok(runs) => runs,
            Err(err) => {
                tracing::error!(error = %err, "could not load due integrations");
                return 0;
            }
        };

        let mut started = 0;
        for (integration_id, outcome) in runs {
            match outcome {
                Ok(result) => {
                    started += 1;
                    tracing::info!(
                        %integration_id,
                        status = %result.status,
                        failed = result.items_failed,
                        "scheduled sync finished"
                    );
                }
                Err(SyncError::AlreadySyncing(_)) => {
                    tracing::debug!(%integration_id, "skipped, a sync is already running");
                }
                Err(err) => {
                    tracing::warn!(%integration_id, error = %err, "scheduled sync failed");
                }
            }
        }
        started
    }
}
