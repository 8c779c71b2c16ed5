use std::collections::BTreeSet;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use chrono::NaiveDateTime;
use serde::Serialize;
use tracing::{debug, error, info, warn};

use super::repository::{
    NewRunLog, NotificationRunLog, RunOutcome, SchedulerRepository, TriggerSource,
};
use super::schedule::compute_next_run;
use super::settings::{ScheduledTime, SettingsUpdate, SettingsValidationError};
use crate::cancellation::CancellationToken;
use crate::clock::Clock;
use crate::error::ErrorKind;
use crate::risk::{AlertRepository, DrainSummary, NotificationChannel, NotificationDispatcher};
use crate::storage::RepositoryError;

const PHASE_IDLE: u8 = 0;
const PHASE_RUNNING: u8 = 1;
const PHASE_IDLE_AFTER_RUN: u8 = 2;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SchedulerState {
    Disabled,
    Armed,
    Running,
    IdleAfterRun,
}

/// Read-only projection of the scheduler singleton.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SchedulerStatus {
    pub state: SchedulerState,
    pub is_enabled: bool,
    pub is_running: bool,
    pub scheduled_time: ScheduledTime,
    pub days_of_week: BTreeSet<u8>,
    pub last_run_at: Option<NaiveDateTime>,
    pub last_run_status: Option<RunOutcome>,
    pub last_run_count: usize,
    pub next_run_at: Option<NaiveDateTime>,
}

#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub log: NotificationRunLog,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub summary: Option<DrainSummary>,
    pub next_run_at: Option<NaiveDateTime>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum TriggerOutcome {
    Completed(RunReport),
    AlreadyRunning,
    NotDue,
}

/// Drives scheduled and manual drains of the unsent alert queue.
///
/// At most one drain runs at a time; a trigger that arrives while one is in progress is
/// ignored and reported as [`TriggerOutcome::AlreadyRunning`].
pub struct NotificationScheduler<S, A, C> {
    repository: Arc<S>,
    dispatcher: Arc<NotificationDispatcher<A, C>>,
    clock: Arc<dyn Clock>,
    phase: AtomicU8,
    config_lock: Mutex<()>,
}

impl<S, A, C> NotificationScheduler<S, A, C>
where
    S: SchedulerRepository + 'static,
    A: AlertRepository + 'static,
    C: NotificationChannel + 'static,
{
    pub fn new(
        repository: Arc<S>,
        dispatcher: Arc<NotificationDispatcher<A, C>>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            repository,
            dispatcher,
            clock,
            phase: AtomicU8::new(PHASE_IDLE),
            config_lock: Mutex::new(()),
        }
    }

    /// Recompute `next_run_at` from the current time, dropping any slot missed while the
    /// process was down.
    pub fn initialize(&self) -> Result<SchedulerStatus, SchedulerError> {
        let now = self.clock.now();
        {
            let _config = self.config_lock.lock().unwrap_or_else(PoisonError::into_inner);
            let mut config = self.repository.load()?;
            config.next_run_at =
                compute_next_run(&config.settings, now, config.consumed_day(now.date()));
            if let Some(next) = config.next_run_at {
                info!(%next, "notification scheduler armed");
            }
            self.repository.save(config)?;
        }
        self.status()
    }

    pub fn update_settings(
        &self,
        update: &SettingsUpdate,
    ) -> Result<SchedulerStatus, SchedulerError> {
        let settings = update.validate()?;
        let now = self.clock.now();
        {
            let _config = self.config_lock.lock().unwrap_or_else(PoisonError::into_inner);
            let mut config = self.repository.load()?;
            config.next_run_at = compute_next_run(&settings, now, config.consumed_day(now.date()));
            info!(
                enabled = settings.is_enabled,
                time = %settings.scheduled_time,
                days = ?settings.days_of_week,
                next = ?config.next_run_at,
                "scheduler settings updated"
            );
            config.settings = settings;
            self.repository.save(config)?;
        }
        self.status()
    }

    /// Time-based driver entry point. Runs a drain when the scheduler is armed and `now` has
    /// reached `next_run_at`.
    pub async fn tick(&self, now: NaiveDateTime) -> Result<TriggerOutcome, SchedulerError> {
        if self.phase.load(Ordering::Acquire) != PHASE_IDLE {
            return Ok(TriggerOutcome::AlreadyRunning);
        }

        let due = {
            let _config = self.config_lock.lock().unwrap_or_else(PoisonError::into_inner);
            let mut config = self.repository.load()?;
            if !config.settings.is_enabled {
                return Ok(TriggerOutcome::NotDue);
            }
            match config.next_run_at {
                Some(next) => now >= next,
                None => {
                    config.next_run_at =
                        compute_next_run(&config.settings, now, config.consumed_day(now.date()));
                    debug!(next = ?config.next_run_at, "scheduler re-armed on tick");
                    self.repository.save(config)?;
                    false
                }
            }
        };

        if !due {
            return Ok(TriggerOutcome::NotDue);
        }
        self.run(TriggerSource::Scheduled, now, &CancellationToken::new())
            .await
    }

    /// Manual "run now". Leaves the configured window untouched.
    pub async fn trigger_now(
        &self,
        cancel: &CancellationToken,
    ) -> Result<TriggerOutcome, SchedulerError> {
        let now = self.clock.now();
        self.run(TriggerSource::Manual, now, cancel).await
    }

    pub fn status(&self) -> Result<SchedulerStatus, SchedulerError> {
        let config = self.repository.load()?;
        let state = match self.phase.load(Ordering::Acquire) {
            PHASE_RUNNING => SchedulerState::Running,
            PHASE_IDLE_AFTER_RUN => SchedulerState::IdleAfterRun,
            _ if config.settings.is_enabled => SchedulerState::Armed,
            _ => SchedulerState::Disabled,
        };

        Ok(SchedulerStatus {
            state,
            is_enabled: config.settings.is_enabled,
            is_running: state == SchedulerState::Running,
            scheduled_time: config.settings.scheduled_time,
            days_of_week: config.settings.days_of_week,
            last_run_at: config.last_run_at,
            last_run_status: config.last_run_status,
            last_run_count: config.last_run_count,
            next_run_at: config.next_run_at,
        })
    }

    pub fn logs(&self, limit: usize) -> Result<Vec<NotificationRunLog>, SchedulerError> {
        Ok(self.repository.logs(limit.max(1))?)
    }

    async fn run(
        &self,
        source: TriggerSource,
        started_at: NaiveDateTime,
        cancel: &CancellationToken,
    ) -> Result<TriggerOutcome, SchedulerError> {
        let Some(guard) = RunGuard::acquire(&self.phase) else {
            warn!(?source, "notification run already in progress; trigger ignored");
            return Ok(TriggerOutcome::AlreadyRunning);
        };
        // A concurrent tick may have drained this slot between the due check and the claim.
        if source == TriggerSource::Scheduled && !self.slot_due(started_at)? {
            return Ok(TriggerOutcome::NotDue);
        }

        info!(?source, "notification run started");
        let drained = self.dispatcher.send_all_unsent(cancel).await;
        guard.finishing();

        let (entry, summary) = match drained {
            Ok(summary) => (
                NewRunLog {
                    triggered_at: started_at,
                    source,
                    outcome: RunOutcome::Success,
                    alerts_sent: summary.sent,
                    alerts_failed: summary.failed,
                    alerts_skipped: summary.skipped,
                    error: None,
                },
                Some(summary),
            ),
            Err(err) => {
                error!(?source, error = %err, "notification run failed");
                (
                    NewRunLog {
                        triggered_at: started_at,
                        source,
                        outcome: RunOutcome::Failure,
                        alerts_sent: 0,
                        alerts_failed: 0,
                        alerts_skipped: 0,
                        error: Some(err.to_string()),
                    },
                    None,
                )
            }
        };

        let alerts_sent = entry.alerts_sent;
        let appended = self.repository.append_log(entry);
        let outcome = match &appended {
            Ok(log) => log.outcome,
            Err(err) => {
                error!(?source, error = %err, "notification run log could not be written");
                RunOutcome::Failure
            }
        };
        let finished_at = self.clock.now().max(started_at);

        // The window advances even when the run log is unwritable; the slot is never retried.
        let next_run_at = {
            let _config = self.config_lock.lock().unwrap_or_else(PoisonError::into_inner);
            let mut config = self.repository.load()?;
            config.last_run_at = Some(finished_at);
            config.last_run_status = Some(outcome);
            config.last_run_count = alerts_sent;
            if source == TriggerSource::Scheduled {
                config.last_scheduled_run_on = Some(started_at.date());
            }
            config.next_run_at = compute_next_run(
                &config.settings,
                finished_at,
                config.consumed_day(finished_at.date()),
            );
            let next_run_at = config.next_run_at;
            self.repository.save(config)?;
            next_run_at
        };
        let log = appended?;

        info!(
            ?source,
            outcome = ?log.outcome,
            sent = log.alerts_sent,
            next = ?next_run_at,
            "notification run finished"
        );

        Ok(TriggerOutcome::Completed(RunReport {
            log,
            summary,
            next_run_at,
        }))
    }

    fn slot_due(&self, now: NaiveDateTime) -> Result<bool, SchedulerError> {
        let _config = self.config_lock.lock().unwrap_or_else(PoisonError::into_inner);
        let config = self.repository.load()?;
        Ok(config.settings.is_enabled && config.next_run_at.is_some_and(|next| now >= next))
    }
}

/// Exclusive claim on the Running phase; releases back to idle on drop.
struct RunGuard<'a> {
    phase: &'a AtomicU8,
}

impl<'a> RunGuard<'a> {
    fn acquire(phase: &'a AtomicU8) -> Option<Self> {
        phase
            .compare_exchange(
                PHASE_IDLE,
                PHASE_RUNNING,
                Ordering::AcqRel,
                Ordering::Acquire,
            )
            .ok()
            .map(|_| Self { phase })
    }

    fn finishing(&self) {
        self.phase.store(PHASE_IDLE_AFTER_RUN, Ordering::Release);
    }
}

impl Drop for RunGuard<'_> {
    fn drop(&mut self) {
        self.phase.store(PHASE_IDLE, Ordering::Release);
    }
}

/// Error raised by scheduler commands and queries.
#[derive(Debug, thiserror::Error)]
pub enum SchedulerError {
    #[error(transparent)]
    Validation(#[from] SettingsValidationError),
    #[error(transparent)]
    Infrastructure(#[from] RepositoryError),
}

impl SchedulerError {
    pub const fn kind(&self) -> ErrorKind {
        match self {
            SchedulerError::Validation(err) => err.kind(),
            SchedulerError::Infrastructure(err) => err.kind(),
        }
    }
}
