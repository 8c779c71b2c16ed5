use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use super::settings::SchedulerConfig;
use crate::storage::RepositoryError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TriggerSource {
    Scheduled,
    Manual,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunOutcome {
    Success,
    Failure,
}

/// Run-history row before the log assigns an id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewRunLog {
    pub triggered_at: NaiveDateTime,
    pub source: TriggerSource,
    pub outcome: RunOutcome,
    pub alerts_sent: usize,
    pub alerts_failed: usize,
    pub alerts_skipped: usize,
    pub error: Option<String>,
}

/// One scheduler invocation, whether it found zero or many unsent alerts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotificationRunLog {
    pub id: u64,
    pub triggered_at: NaiveDateTime,
    pub source: TriggerSource,
    pub outcome: RunOutcome,
    pub alerts_sent: usize,
    pub alerts_failed: usize,
    pub alerts_skipped: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl NotificationRunLog {
    pub fn from_new(id: u64, entry: NewRunLog) -> Self {
        Self {
            id,
            triggered_at: entry.triggered_at,
            source: entry.source,
            outcome: entry.outcome,
            alerts_sent: entry.alerts_sent,
            alerts_failed: entry.alerts_failed,
            alerts_skipped: entry.alerts_skipped,
            error: entry.error,
        }
    }
}

/// Storage for the scheduler singleton and its append-only run history.
pub trait SchedulerRepository: Send + Sync {
    /// Returns the default (disabled) configuration when nothing was saved yet.
    fn load(&self) -> Result<SchedulerConfig, RepositoryError>;
    fn save(&self, config: SchedulerConfig) -> Result<(), RepositoryError>;
    fn append_log(&self, entry: NewRunLog) -> Result<NotificationRunLog, RepositoryError>;
    /// Newest first.
    fn logs(&self, limit: usize) -> Result<Vec<NotificationRunLog>, RepositoryError>;
}
