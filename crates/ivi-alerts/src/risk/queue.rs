use std::sync::Arc;

use serde::Serialize;

use super::domain::{AlertId, DeliveryAttempt, RiskAlert};
use super::repository::{AlertRepository, UnseenAlerts};
use crate::storage::RepositoryError;

/// Polling payload: the newest unseen alerts plus the high-water mark of the whole log.
#[derive(Debug, Clone, Serialize)]
pub struct RecentAlerts {
    pub alerts: Vec<RiskAlert>,
    pub has_new: bool,
    pub latest_id: AlertId,
}

/// Read paths over the alert log consumed by polling clients, plus the sent-flag flip.
pub struct AlertQueue<A> {
    repository: Arc<A>,
}

impl<A> Clone for AlertQueue<A> {
    fn clone(&self) -> Self {
        Self {
            repository: self.repository.clone(),
        }
    }
}

impl<A> AlertQueue<A>
where
    A: AlertRepository + 'static,
{
    pub fn new(repository: Arc<A>) -> Self {
        Self { repository }
    }

    pub fn list(&self) -> Result<Vec<RiskAlert>, RepositoryError> {
        self.repository.list()
    }

    pub fn unsent(&self) -> Result<Vec<RiskAlert>, RepositoryError> {
        self.repository.unsent()
    }

    /// `limit` of `None` returns every unseen alert; `Some(0)` is treated as one.
    pub fn recent_since(
        &self,
        last_seen: AlertId,
        limit: Option<usize>,
    ) -> Result<RecentAlerts, RepositoryError> {
        let UnseenAlerts {
            mut alerts,
            latest_id,
        } = self.repository.unseen(last_seen)?;
        let has_new = !alerts.is_empty();
        if let Some(limit) = limit {
            alerts.truncate(limit.max(1));
        }

        Ok(RecentAlerts {
            alerts,
            has_new,
            latest_id,
        })
    }

    pub fn unread_count(&self, last_seen: AlertId) -> Result<usize, RepositoryError> {
        self.repository.count_since(last_seen)
    }

    /// Delivery audit trail, newest first.
    pub fn delivery_attempts(&self, limit: usize) -> Result<Vec<DeliveryAttempt>, RepositoryError> {
        self.repository.attempts(limit.max(1))
    }

    /// Repeating the call on an already-sent alert is a no-op.
    pub fn mark_sent(&self, id: AlertId) -> Result<(), RepositoryError> {
        self.repository.mark_sent(id).map(|_| ())
    }
}
