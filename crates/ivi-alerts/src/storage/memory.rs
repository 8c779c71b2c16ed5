use std::collections::HashMap;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use super::RepositoryError;
use crate::risk::{
    AlertId, AlertRepository, ClientScore, ContractNumber, DeliveryAttempt, NewDeliveryAttempt,
    NewRiskAlert, RiskAlert, ScoreRepository, UnseenAlerts,
};
use crate::scheduler::{NewRunLog, NotificationRunLog, SchedulerConfig, SchedulerRepository};

/// Process-local store backing scores, the alert log, and scheduler state.
///
/// Every write happens under one write lock, so a score overwrite and its alert append are
/// observed together. Reads clone a snapshot under a short read lock.
#[derive(Debug, Default)]
pub struct InMemoryStore {
    state: RwLock<StoreState>,
}

#[derive(Debug, Default)]
struct StoreState {
    scores: HashMap<ContractNumber, ClientScore>,
    /// Ascending by id; ids are assigned on append.
    alerts: Vec<RiskAlert>,
    last_alert_id: u64,
    deliveries: Vec<DeliveryAttempt>,
    last_delivery_id: u64,
    scheduler: SchedulerConfig,
    run_logs: Vec<NotificationRunLog>,
    last_log_id: u64,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, StoreState>, RepositoryError> {
        self.state
            .read()
            .map_err(|_| RepositoryError::Unavailable("store lock poisoned".to_string()))
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, StoreState>, RepositoryError> {
        self.state
            .write()
            .map_err(|_| RepositoryError::Unavailable("store lock poisoned".to_string()))
    }
}

impl ScoreRepository for InMemoryStore {
    fn current(&self, contract: &ContractNumber) -> Result<Option<ClientScore>, RepositoryError> {
        Ok(self.read()?.scores.get(contract).cloned())
    }

    fn commit(
        &self,
        score: ClientScore,
        alert: Option<NewRiskAlert>,
    ) -> Result<Option<RiskAlert>, RepositoryError> {
        let mut state = self.write()?;
        let stored = alert.map(|alert| {
            state.last_alert_id += 1;
            let alert = RiskAlert::from_new(AlertId(state.last_alert_id), alert);
            state.alerts.push(alert.clone());
            alert
        });
        state.scores.insert(score.contract_number.clone(), score);
        Ok(stored)
    }
}

impl AlertRepository for InMemoryStore {
    fn list(&self) -> Result<Vec<RiskAlert>, RepositoryError> {
        let mut alerts = self.read()?.alerts.clone();
        alerts.sort_by(|a, b| {
            b.created_at
                .cmp(&a.created_at)
                .then_with(|| b.id.cmp(&a.id))
        });
        Ok(alerts)
    }

    fn fetch(&self, id: AlertId) -> Result<Option<RiskAlert>, RepositoryError> {
        let state = self.read()?;
        Ok(state.alerts.iter().find(|alert| alert.id == id).cloned())
    }

    fn unsent(&self) -> Result<Vec<RiskAlert>, RepositoryError> {
        let state = self.read()?;
        Ok(state
            .alerts
            .iter()
            .filter(|alert| !alert.notification_sent)
            .cloned()
            .collect())
    }

    fn unseen(&self, last_seen: AlertId) -> Result<UnseenAlerts, RepositoryError> {
        let state = self.read()?;
        Ok(UnseenAlerts {
            alerts: state
                .alerts
                .iter()
                .rev()
                .filter(|alert| alert.id > last_seen)
                .cloned()
                .collect(),
            latest_id: state
                .alerts
                .last()
                .map(|alert| alert.id)
                .unwrap_or(AlertId::NONE),
        })
    }

    fn count_since(&self, last_seen: AlertId) -> Result<usize, RepositoryError> {
        let state = self.read()?;
        Ok(state
            .alerts
            .iter()
            .filter(|alert| alert.id > last_seen)
            .count())
    }

    fn mark_sent(&self, id: AlertId) -> Result<bool, RepositoryError> {
        let mut state = self.write()?;
        let alert = state
            .alerts
            .iter_mut()
            .find(|alert| alert.id == id)
            .ok_or(RepositoryError::NotFound)?;
        let flipped = !alert.notification_sent;
        alert.notification_sent = true;
        Ok(flipped)
    }

    fn record_attempt(
        &self,
        attempt: NewDeliveryAttempt,
    ) -> Result<DeliveryAttempt, RepositoryError> {
        let mut state = self.write()?;
        state.last_delivery_id += 1;
        let attempt = DeliveryAttempt::from_new(state.last_delivery_id, attempt);
        state.deliveries.push(attempt.clone());
        Ok(attempt)
    }

    fn attempts(&self, limit: usize) -> Result<Vec<DeliveryAttempt>, RepositoryError> {
        let state = self.read()?;
        Ok(state.deliveries.iter().rev().take(limit).cloned().collect())
    }
}

impl SchedulerRepository for InMemoryStore {
    fn load(&self) -> Result<SchedulerConfig, RepositoryError> {
        Ok(self.read()?.scheduler.clone())
    }

    fn save(&self, config: SchedulerConfig) -> Result<(), RepositoryError> {
        self.write()?.scheduler = config;
        Ok(())
    }

    fn append_log(&self, entry: NewRunLog) -> Result<NotificationRunLog, RepositoryError> {
        let mut state = self.write()?;
        state.last_log_id += 1;
        let log = NotificationRunLog::from_new(state.last_log_id, entry);
        state.run_logs.push(log.clone());
        Ok(log)
    }

    fn logs(&self, limit: usize) -> Result<Vec<NotificationRunLog>, RepositoryError> {
        let state = self.read()?;
        Ok(state.run_logs.iter().rev().take(limit).cloned().collect())
    }
}
