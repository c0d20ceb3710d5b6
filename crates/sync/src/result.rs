//! The outcome of a sync run.

use chrono::{DateTime, Utc};
use common::{IntegrationId, ProductId};
use domain::SyncStatus;
use serde::{Deserialize, Serialize};

/// Which phases a run covers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SyncScope {
    Products,
    Orders,
    Full,
}

impl SyncScope {
    pub fn as_str(&self) -> &'static str {
        match self {
            SyncScope::Products => "products",
            SyncScope::Orders => "orders",
            SyncScope::Full => "full",
        }
    }
}

impl std::fmt::Display for SyncScope {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for SyncScope {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "products" => Ok(SyncScope::Products),
            "orders" => Ok(SyncScope::Orders),
            "full" => Ok(SyncScope::Full),
            other => Err(format!("unknown sync scope: {other}")),
        }
    }
}

/// What a failed item was.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "id", rename_all = "snake_case")]
pub enum SyncItem {
    Product(ProductId),
    Order(String),
    /// The order pull itself.
    OrderFetch,
}

/// One failed item, with the last error verbatim.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemError {
    pub item: SyncItem,
    pub message: String,
    /// Adapter calls made for the failing operation.
    pub attempts: u32,
}

/// Aggregated outcome of one run. Not persisted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncResult {
    pub integration_id: IntegrationId,
    pub scope: SyncScope,
    pub success: bool,
    pub status: SyncStatus,
    pub items_succeeded: usize,
    pub items_failed: usize,
    /// Items skipped because the run was cancelled.
    pub items_not_attempted: usize,
    pub products_synced: usize,
    pub orders_synced: usize,
    pub errors: Vec<ItemError>,
    pub message: String,
    pub sync_date: DateTime<Utc>,
}

impl SyncResult {
    pub(crate) fn new(integration_id: IntegrationId, scope: SyncScope, sync_date: DateTime<Utc>) -> Self {
        Self {
            integration_id,
            scope,
            success: true,
            status: SyncStatus::InProgress,
            items_succeeded: 0,
            items_failed: 0,
            items_not_attempted: 0,
            products_synced: 0,
            orders_synced: 0,
            errors: Vec::new(),
            message: String::new(),
            sync_date,
        }
    }

    pub(crate) fn record_product(&mut self, outcome: ItemOutcome) {
        if matches!(outcome, ItemOutcome::Succeeded) {
            self.products_synced += 1;
        }
        self.record(outcome);
    }

    pub(crate) fn record_order(&mut self, outcome: ItemOutcome, changed: bool) {
        if changed && matches!(outcome, ItemOutcome::Succeeded) {
            self.orders_synced += 1;
        }
        self.record(outcome);
    }

    pub(crate) fn record(&mut self, outcome: ItemOutcome) {
        match outcome {
            ItemOutcome::Succeeded => self.items_succeeded += 1,
            ItemOutcome::Failed(error) => {
                self.items_failed += 1;
                self.errors.push(error);
            }
            ItemOutcome::NotAttempted => self.items_not_attempted += 1,
        }
    }

    /// Classifies the run from its counts and fills in the summary.
    pub(crate) fn complete(&mut self, sync_date: DateTime<Utc>) {
        self.status = SyncStatus::from_counts(
            self.items_succeeded,
            self.items_failed,
            self.items_not_attempted,
        );
        self.success = self.status == SyncStatus::Success;
        self.sync_date = sync_date;
        self.message = match self.status {
            SyncStatus::Success if self.items_succeeded == 0 => "Nothing to sync".to_string(),
            _ => {
                let mut message = format!(
                    "{} synced: {} products, {} orders; {} failed",
                    self.items_succeeded, self.products_synced, self.orders_synced, self.items_failed
                );
                if self.items_not_attempted > 0 {
                    message.push_str(&format!(
                        "; cancelled with {} not attempted",
                        self.items_not_attempted
                    ));
                }
                message
            }
        };
    }
}

/// Per-item classification before aggregation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum ItemOutcome {
    Succeeded,
    Failed(ItemError),
    NotAttempted,
}
