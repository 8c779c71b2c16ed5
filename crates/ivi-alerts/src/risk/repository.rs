use super::domain::{
    AlertId, ContractNumber, DeliveryAttempt, NewDeliveryAttempt, NewRiskAlert, RiskAlert,
};
use super::scoring::ClientScore;
use crate::storage::RepositoryError;

/// Current-score storage. `commit` must apply the overwrite and the optional alert append as
/// one unit: either both are visible afterwards or neither is.
pub trait ScoreRepository: Send + Sync {
    fn current(&self, contract: &ContractNumber) -> Result<Option<ClientScore>, RepositoryError>;
    fn commit(
        &self,
        score: ClientScore,
        alert: Option<NewRiskAlert>,
    ) -> Result<Option<RiskAlert>, RepositoryError>;
}

/// Alerts above a client's last seen id together with the log's high-water mark, read from
/// the same snapshot.
#[derive(Debug, Clone, PartialEq)]
pub struct UnseenAlerts {
    /// Newest first.
    pub alerts: Vec<RiskAlert>,
    pub latest_id: AlertId,
}

/// Append-only alert log with the unsent-queue view and the delivery audit trail.
pub trait AlertRepository: Send + Sync {
    /// Newest first by creation time, ties broken by id.
    fn list(&self) -> Result<Vec<RiskAlert>, RepositoryError>;
    fn fetch(&self, id: AlertId) -> Result<Option<RiskAlert>, RepositoryError>;
    /// Oldest first by id.
    fn unsent(&self) -> Result<Vec<RiskAlert>, RepositoryError>;
    fn unseen(&self, last_seen: AlertId) -> Result<UnseenAlerts, RepositoryError>;
    fn count_since(&self, last_seen: AlertId) -> Result<usize, RepositoryError>;
    /// Returns `Ok(true)` when the flag flipped and `Ok(false)` when it was already set.
    fn mark_sent(&self, id: AlertId) -> Result<bool, RepositoryError>;
    fn record_attempt(
        &self,
        attempt: NewDeliveryAttempt,
    ) -> Result<DeliveryAttempt, RepositoryError>;
    /// Newest first.
    fn attempts(&self, limit: usize) -> Result<Vec<DeliveryAttempt>, RepositoryError>;
}
