//! Sync run status machine.

use serde::{Deserialize, Serialize};

/// The status of the most recent sync run of an integration.
///
/// State transitions:
/// ```text
/// Pending ──► InProgress ──┬──► Success
///    ▲                     ├──► PartialFailure
///    │                     └──► Failed
///    └── (terminal states start the next run from InProgress again)
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum SyncStatus {
    /// Never synced.
    #[default]
    Pending,

    /// A run is in flight; a second trigger is rejected.
    InProgress,

    /// Every attempted item succeeded.
    Success,

    /// Nothing succeeded and at least one item failed.
    Failed,

    /// Some items failed, or the run was cancelled part-way.
    PartialFailure,
}

impl SyncStatus {
    /// Classifies a finished run from its item counts.
    pub fn from_counts(succeeded: usize, failed: usize, not_attempted: usize) -> Self {
        if not_attempted > 0 {
            SyncStatus::PartialFailure
        } else if failed == 0 {
            SyncStatus::Success
        } else if succeeded == 0 {
            SyncStatus::Failed
        } else {
            SyncStatus::PartialFailure
        }
    }

    /// Returns true if this is a terminal run state.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            SyncStatus::Success | SyncStatus::Failed | SyncStatus::PartialFailure
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            SyncStatus::Pending => "Pending",
            SyncStatus::InProgress => "InProgress",
            SyncStatus::Success => "Success",
            SyncStatus::Failed => "Failed",
            SyncStatus::PartialFailure => "PartialFailure",
        }
    }
}

impl std::fmt::Display for SyncStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for SyncStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Pending" => Ok(SyncStatus::Pending),
            "InProgress" => Ok(SyncStatus::InProgress),
            "Success" => Ok(SyncStatus::Success),
            "Failed" => Ok(SyncStatus::Failed),
            "PartialFailure" => Ok(SyncStatus::PartialFailure),
            other => Err(format!("unknown sync status: {other}")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_pending() {
        assert_eq!(SyncStatus::default(), SyncStatus::Pending);
    }

    #[test]
    fn test_from_counts() {
        assert_eq!(SyncStatus::from_counts(0, 0, 0), SyncStatus::Success);
        assert_eq!(SyncStatus::from_counts(9, 0, 0), SyncStatus::Success);
        assert_eq!(SyncStatus::from_counts(9, 1, 0), SyncStatus::PartialFailure);
        assert_eq!(SyncStatus::from_counts(0, 3, 0), SyncStatus::Failed);
        assert_eq!(SyncStatus::from_counts(2, 0, 5), SyncStatus::PartialFailure);
    }

    #[test]
    fn test_terminal_states() {
        assert!(!SyncStatus::Pending.is_terminal());
        assert!(!SyncStatus::InProgress.is_terminal());
        assert!(SyncStatus::Success.is_terminal());
        assert!(SyncStatus::Failed.is_terminal());
        assert!(SyncStatus::PartialFailure.is_terminal());
    }

    #[test]
    fn test_parse_round_trip() {
        for s in [
            SyncStatus::Pending,
            SyncStatus::InProgress,
            SyncStatus::Success,
            SyncStatus::Failed,
            SyncStatus::PartialFailure,
        ] {
            assert_eq!(s.to_string().parse::<SyncStatus>().unwrap(), s);
        }
    }
}
