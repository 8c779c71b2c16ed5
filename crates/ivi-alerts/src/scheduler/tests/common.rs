use std::sync::{Arc, Mutex};

use chrono::{NaiveDate, NaiveDateTime};

use crate::clock::Clock;
use crate::risk::tests::common::Harness;
use crate::risk::NotificationChannel;
use crate::scheduler::{
    NewRunLog, NotificationRunLog, NotificationScheduler, SchedulerConfig, SchedulerRepository,
    SchedulerSettings, SettingsUpdate,
};
use crate::storage::{InMemoryStore, RepositoryError};

pub(crate) fn on(day: u32, hour: u32, minute: u32) -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2025, 9, day)
        .and_then(|date| date.and_hms_opt(hour, minute, 0))
        .expect("valid timestamp")
}

pub(crate) fn update(enabled: bool, time: &str, days: &[u8]) -> SettingsUpdate {
    SettingsUpdate {
        is_enabled: enabled,
        scheduled_time: time.to_string(),
        days_of_week: days.to_vec(),
    }
}

pub(crate) fn settings(enabled: bool, time: &str, days: &[u8]) -> SchedulerSettings {
    update(enabled, time, days)
        .validate()
        .expect("valid settings")
}

pub(crate) fn scheduler_for<C>(
    harness: &Harness<C>,
) -> Arc<NotificationScheduler<InMemoryStore, InMemoryStore, C>>
where
    C: NotificationChannel + 'static,
{
    scheduler_with(harness, harness.store.clone())
}

/// Scheduler over its own state store, draining the harness queue.
pub(crate) fn scheduler_with<S, C>(
    harness: &Harness<C>,
    store: Arc<S>,
) -> Arc<NotificationScheduler<S, InMemoryStore, C>>
where
    S: SchedulerRepository + 'static,
    C: NotificationChannel + 'static,
{
    let clock: Arc<dyn Clock> = harness.clock.clone();
    Arc::new(NotificationScheduler::new(
        store,
        harness.dispatcher.clone(),
        clock,
    ))
}

/// Scheduler state that saves fine but cannot append to the run history.
#[derive(Default)]
pub(crate) struct LoglessStore {
    pub(crate) inner: InMemoryStore,
}

impl SchedulerRepository for LoglessStore {
    fn load(&self) -> Result<SchedulerConfig, RepositoryError> {
        self.inner.load()
    }

    fn save(&self, config: SchedulerConfig) -> Result<(), RepositoryError> {
        self.inner.save(config)
    }

    fn append_log(&self, _entry: NewRunLog) -> Result<NotificationRunLog, RepositoryError> {
        Err(RepositoryError::Unavailable("run log offline".to_string()))
    }

    fn logs(&self, limit: usize) -> Result<Vec<NotificationRunLog>, RepositoryError> {
        self.inner.logs(limit)
    }
}

/// Serves a queued snapshot on the next load, as seen by a caller that read before another
/// run saved.
#[derive(Default)]
pub(crate) struct StaleReadStore {
    pub(crate) inner: InMemoryStore,
    pub(crate) stale: Mutex<Option<SchedulerConfig>>,
}

impl StaleReadStore {
    pub(crate) fn serve_once(&self, config: SchedulerConfig) {
        *self.stale.lock().expect("stale mutex poisoned") = Some(config);
    }
}

impl SchedulerRepository for StaleReadStore {
    fn load(&self) -> Result<SchedulerConfig, RepositoryError> {
        match self.stale.lock().expect("stale mutex poisoned").take() {
            Some(config) => Ok(config),
            None => self.inner.load(),
        }
    }

    fn save(&self, config: SchedulerConfig) -> Result<(), RepositoryError> {
        self.inner.save(config)
    }

    fn append_log(&self, entry: NewRunLog) -> Result<NotificationRunLog, RepositoryError> {
        self.inner.append_log(entry)
    }

    fn logs(&self, limit: usize) -> Result<Vec<NotificationRunLog>, RepositoryError> {
        self.inner.logs(limit)
    }
}
