use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{error, info};

use super::service::{NotificationScheduler, TriggerOutcome};
use super::repository::SchedulerRepository;
use crate::clock::Clock;
use crate::risk::{AlertRepository, NotificationChannel};

/// Spawn the polling timer that feeds `tick` with the current wall-clock time.
///
/// `every` should stay well under a minute so a `HH:MM` slot is never stepped over.
pub fn spawn_driver<S, A, C>(
    scheduler: Arc<NotificationScheduler<S, A, C>>,
    clock: Arc<dyn Clock>,
    every: Duration,
) -> JoinHandle<()>
where
    S: SchedulerRepository + 'static,
    A: AlertRepository + 'static,
    C: NotificationChannel + 'static,
{
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(every);
        interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
        info!(?every, "notification scheduler driver started");

        loop {
            interval.tick().await;
            match scheduler.tick(clock.now()).await {
                Ok(TriggerOutcome::Completed(report)) => info!(
                    run_id = report.log.id,
                    sent = report.log.alerts_sent,
                    "scheduled notification run completed"
                ),
                Ok(TriggerOutcome::AlreadyRunning | TriggerOutcome::NotDue) => {}
                Err(err) => error!(error = %err, "scheduler tick failed"),
            }
        }
    })
}
