use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::response::Response;
use chrono::{NaiveDate, NaiveDateTime};
use serde_json::Value;
use tokio::sync::Notify;

use crate::clock::{Clock, FixedClock};
use crate::risk::{
    AlertApi, AlertId, AlertMessage, AlertQueue, AlertRepository, ClientScore, ContractNumber,
    DeliveryAttempt, DeliveryError, DispatchConfig, Locale, NewDeliveryAttempt, NewRiskAlert,
    NotificationChannel, NotificationDispatcher, RecomputeService, RiskAlert, ScoreInput,
    ScoreRepository, UnseenAlerts,
};
use crate::storage::{InMemoryStore, RepositoryError};

/// Tuesday 2025-09-23 at the given local time.
pub(crate) fn at(hour: u32, minute: u32) -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2025, 9, 23)
        .and_then(|date| date.and_hms_opt(hour, minute, 0))
        .expect("valid timestamp")
}

/// Equal pillar scores so the composite equals `pillar`.
pub(crate) fn score_input(contract: &str, company: Option<&str>, pillar: f64) -> ScoreInput {
    ScoreInput {
        contract_number: contract.to_string(),
        company_name: company.map(str::to_string),
        sector: Some("Manufacturing".to_string()),
        region: Some("Central".to_string()),
        health: pillar,
        experience: pillar,
        utilization: pillar,
    }
}

pub(crate) fn dispatch_config() -> DispatchConfig {
    DispatchConfig {
        locale: Locale::En,
        delivery_timeout: Duration::from_millis(200),
    }
}

pub(crate) struct Harness<C> {
    pub(crate) store: Arc<InMemoryStore>,
    pub(crate) clock: Arc<FixedClock>,
    pub(crate) recompute: RecomputeService<InMemoryStore>,
    pub(crate) queue: AlertQueue<InMemoryStore>,
    pub(crate) channel: Arc<C>,
    pub(crate) dispatcher: Arc<NotificationDispatcher<InMemoryStore, C>>,
}

impl<C> Harness<C>
where
    C: NotificationChannel + 'static,
{
    pub(crate) fn new(channel: C) -> Self {
        Self::with_config(channel, dispatch_config())
    }

    pub(crate) fn with_config(channel: C, config: DispatchConfig) -> Self {
        let store = Arc::new(InMemoryStore::new());
        let clock = Arc::new(FixedClock::new(at(8, 0)));
        let dyn_clock: Arc<dyn Clock> = clock.clone();
        let channel = Arc::new(channel);
        Self {
            recompute: RecomputeService::new(store.clone(), dyn_clock.clone()),
            queue: AlertQueue::new(store.clone()),
            dispatcher: Arc::new(NotificationDispatcher::new(
                store.clone(),
                channel.clone(),
                dyn_clock.clone(),
                config,
            )),
            store,
            clock,
            channel,
        }
    }

    /// Records a Low score and then moves it to `pillar`, producing one alert.
    pub(crate) fn seed_transition(&self, contract: &str, company: Option<&str>, pillar: f64) -> RiskAlert {
        self.recompute
            .recompute(score_input(contract, company, 80.0))
            .expect("initial score");
        self.clock.advance(chrono::Duration::minutes(1));
        self.recompute
            .recompute(score_input(contract, company, pillar))
            .expect("recompute")
            .alert
            .expect("transition recorded")
    }

    pub(crate) fn api(&self) -> Arc<AlertApi<InMemoryStore, InMemoryStore, C>> {
        let dyn_clock: Arc<dyn Clock> = self.clock.clone();
        Arc::new(AlertApi {
            recompute: RecomputeService::new(self.store.clone(), dyn_clock),
            queue: self.queue.clone(),
            dispatcher: self.dispatcher.clone(),
        })
    }
}

#[derive(Default)]
pub(crate) struct RecordingChannel {
    delivered: Mutex<Vec<AlertMessage>>,
}

impl RecordingChannel {
    pub(crate) fn delivered(&self) -> Vec<AlertMessage> {
        self.delivered.lock().expect("channel mutex poisoned").clone()
    }
}

impl NotificationChannel for RecordingChannel {
    async fn deliver(&self, message: AlertMessage) -> Result<(), DeliveryError> {
        self.delivered
            .lock()
            .expect("channel mutex poisoned")
            .push(message);
        Ok(())
    }
}

/// Fails for the listed contracts and records everything else.
#[derive(Default)]
pub(crate) struct FlakyChannel {
    failing: HashSet<String>,
    hanging: HashSet<String>,
    delivered: Mutex<Vec<AlertMessage>>,
}

impl FlakyChannel {
    pub(crate) fn failing(contracts: &[&str]) -> Self {
        Self {
            failing: contracts.iter().map(|c| c.to_string()).collect(),
            ..Self::default()
        }
    }

    pub(crate) fn hanging(contracts: &[&str]) -> Self {
        Self {
            hanging: contracts.iter().map(|c| c.to_string()).collect(),
            ..Self::default()
        }
    }

    pub(crate) fn delivered(&self) -> Vec<AlertMessage> {
        self.delivered.lock().expect("channel mutex poisoned").clone()
    }
}

impl NotificationChannel for FlakyChannel {
    async fn deliver(&self, message: AlertMessage) -> Result<(), DeliveryError> {
        let contract = message.contract_number.0.clone();
        if self.hanging.contains(&contract) {
            std::future::pending::<()>().await;
        }
        if self.failing.contains(&contract) {
            return Err(DeliveryError::Transport("smtp relay refused".to_string()));
        }
        self.delivered
            .lock()
            .expect("channel mutex poisoned")
            .push(message);
        Ok(())
    }
}

/// Blocks every delivery until released, signalling when one starts.
#[derive(Default)]
pub(crate) struct GatedChannel {
    pub(crate) started: Notify,
    pub(crate) release: Notify,
    delivered: AtomicUsize,
}

impl GatedChannel {
    pub(crate) fn delivered(&self) -> usize {
        self.delivered.load(Ordering::SeqCst)
    }
}

impl NotificationChannel for GatedChannel {
    async fn deliver(&self, _message: AlertMessage) -> Result<(), DeliveryError> {
        self.started.notify_one();
        self.release.notified().await;
        self.delivered.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

/// Reads succeed but every write fails, so nothing can be committed.
#[derive(Default)]
pub(crate) struct ReadOnlyStore {
    pub(crate) inner: InMemoryStore,
}

impl ScoreRepository for ReadOnlyStore {
    fn current(&self, contract: &ContractNumber) -> Result<Option<ClientScore>, RepositoryError> {
        self.inner.current(contract)
    }

    fn commit(
        &self,
        _score: ClientScore,
        _alert: Option<NewRiskAlert>,
    ) -> Result<Option<RiskAlert>, RepositoryError> {
        Err(RepositoryError::Unavailable("database offline".to_string()))
    }
}

/// Alert log that cannot be reached at all.
pub(crate) struct UnavailableAlerts;

impl AlertRepository for UnavailableAlerts {
    fn list(&self) -> Result<Vec<RiskAlert>, RepositoryError> {
        Err(RepositoryError::Unavailable("database offline".to_string()))
    }

    fn fetch(&self, _id: AlertId) -> Result<Option<RiskAlert>, RepositoryError> {
        Err(RepositoryError::Unavailable("database offline".to_string()))
    }

    fn unsent(&self) -> Result<Vec<RiskAlert>, RepositoryError> {
        Err(RepositoryError::Unavailable("database offline".to_string()))
    }

    fn unseen(&self, _last_seen: AlertId) -> Result<UnseenAlerts, RepositoryError> {
        Err(RepositoryError::Unavailable("database offline".to_string()))
    }

    fn count_since(&self, _last_seen: AlertId) -> Result<usize, RepositoryError> {
        Err(RepositoryError::Unavailable("database offline".to_string()))
    }

    fn mark_sent(&self, _id: AlertId) -> Result<bool, RepositoryError> {
        Err(RepositoryError::Unavailable("database offline".to_string()))
    }

    fn record_attempt(
        &self,
        _attempt: NewDeliveryAttempt,
    ) -> Result<DeliveryAttempt, RepositoryError> {
        Err(RepositoryError::Unavailable("database offline".to_string()))
    }

    fn attempts(&self, _limit: usize) -> Result<Vec<DeliveryAttempt>, RepositoryError> {
        Err(RepositoryError::Unavailable("database offline".to_string()))
    }
}

pub(crate) async fn read_json_body(response: Response) -> Value {
    let body = axum::body::to_bytes(response.into_body(), 64 * 1024)
        .await
        .expect("read body");
    serde_json::from_slice(&body).expect("json payload")
}
