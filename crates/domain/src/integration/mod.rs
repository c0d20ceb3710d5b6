//! Marketplace integrations and their registry.

mod registry;
mod status;

pub use registry::{IntegrationRegistry, NewIntegration};
pub use status::SyncStatus;

use chrono::{DateTime, Duration, Utc};
use common::{IntegrationId, StoreId};
use serde::{Deserialize, Serialize};

/// Key of a marketplace platform, e.g. `"TRENDYOL"`.
///
/// The set of platforms is open; adapters are registered per key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PlatformType(String);

impl PlatformType {
    /// Creates a platform key; keys are normalized to upper case.
    pub fn new(key: impl AsRef<str>) -> Self {
        Self(key.as_ref().trim().to_ascii_uppercase())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for PlatformType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for PlatformType {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

/// One configured connection from a store to a marketplace platform.
///
/// Only the orchestrator changes the sync bookkeeping fields; explicit edits
/// change credentials. Integrations are soft-disabled through `is_active`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlatformIntegration {
    pub id: IntegrationId,
    pub store_id: StoreId,
    pub platform_type: PlatformType,
    pub platform_store_name: String,
    /// Opaque reference into the credential store.
    pub credentials_ref: String,
    pub is_active: bool,
    pub last_sync_date: Option<DateTime<Utc>>,
    pub last_sync_status: SyncStatus,
    /// When the current `InProgress` run was claimed.
    pub sync_started_at: Option<DateTime<Utc>>,
    /// Per-integration override of the scheduler interval, in minutes.
    pub sync_interval_minutes: Option<u32>,
    /// Upper bound of the last order pull that had no failed orders.
    pub orders_synced_through: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl PlatformIntegration {
    /// Returns true if a run is in flight and has not gone stale.
    pub fn is_sync_in_flight(&self, now: DateTime<Utc>, stale_after: Duration) -> bool {
        if self.last_sync_status != SyncStatus::InProgress {
            return false;
        }
        match self.sync_started_at {
            Some(started) => now - started < stale_after,
            None => true,
        }
    }

    /// Returns true if the integration should be picked up by the scheduler.
    pub fn is_due(&self, now: DateTime<Utc>, default_interval: Duration) -> bool {
        if !self.is_active {
            return false;
        }
        let interval = self
            .sync_interval_minutes
            .map(|m| Duration::minutes(m as i64))
            .unwrap_or(default_interval);
        match self.last_sync_date {
            None => true,
            Some(last) => now - last >= interval,
        }
    }

    /// Where the next order pull should start from; `None` means a full pull.
    ///
    /// Only order pulls move this cursor, so a products-only run never
    /// narrows the next order pull.
    pub fn order_cursor(&self) -> Option<DateTime<Utc>> {
        self.orders_synced_through
    }

    /// Claims the integration for a new run.
    pub fn begin_sync(&mut self, now: DateTime<Utc>) {
        self.last_sync_status = SyncStatus::InProgress;
        self.sync_started_at = Some(now);
    }

    /// Records the terminal status of a run.
    pub fn finish_sync(&mut self, status: SyncStatus, now: DateTime<Utc>) {
        self.last_sync_status = status;
        self.last_sync_date = Some(now);
        self.sync_started_at = None;
    }
}
