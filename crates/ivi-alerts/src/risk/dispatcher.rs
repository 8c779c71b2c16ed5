use std::collections::HashSet;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use serde::Serialize;
use tracing::{info, warn};

use super::channel::{AlertMessage, DeliveryError, MessageError, NotificationChannel};
use super::domain::{AlertId, DeliveryStatus, NewDeliveryAttempt, RiskAlert, TransitionKind};
use super::repository::AlertRepository;
use super::scoring::Locale;
use crate::cancellation::CancellationToken;
use crate::clock::Clock;
use crate::error::ErrorKind;
use crate::storage::RepositoryError;

/// Delivery settings for the dispatcher.
#[derive(Debug, Clone)]
pub struct DispatchConfig {
    pub locale: Locale,
    pub delivery_timeout: Duration,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            locale: Locale::En,
            delivery_timeout: Duration::from_secs(10),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SendReceipt {
    pub alert_id: AlertId,
    pub delivered: bool,
}

/// Outcome for one alert visited by a drain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct DeliveryResult {
    pub alert_id: AlertId,
    pub kind: TransitionKind,
    pub status: DeliveryStatus,
}

/// Aggregate of one pass over the unsent queue.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DrainSummary {
    pub sent: usize,
    pub skipped: usize,
    pub failed: usize,
    pub cancelled: bool,
    pub results: Vec<DeliveryResult>,
}

impl DrainSummary {
    fn record(&mut self, alert: &RiskAlert, status: DeliveryStatus) {
        match status {
            DeliveryStatus::Sent => self.sent += 1,
            DeliveryStatus::Failed => self.failed += 1,
            DeliveryStatus::Skipped => self.skipped += 1,
        }
        self.results.push(DeliveryResult {
            alert_id: alert.id,
            kind: alert.transition(),
            status,
        });
    }
}

/// Delivers alert notifications and flips their sent flag.
///
/// An alert is only marked sent after the channel confirmed delivery, and an alert that is
/// in flight (claimed by `send_one` or a drain) is never handed to the channel twice. Every
/// attempt leaves one row in the delivery audit trail.
pub struct NotificationDispatcher<A, C> {
    alerts: Arc<A>,
    channel: Arc<C>,
    clock: Arc<dyn Clock>,
    config: DispatchConfig,
    in_flight: Mutex<HashSet<AlertId>>,
}

impl<A, C> NotificationDispatcher<A, C>
where
    A: AlertRepository + 'static,
    C: NotificationChannel + 'static,
{
    pub fn new(
        alerts: Arc<A>,
        channel: Arc<C>,
        clock: Arc<dyn Clock>,
        config: DispatchConfig,
    ) -> Self {
        Self {
            alerts,
            channel,
            clock,
            config,
            in_flight: Mutex::new(HashSet::new()),
        }
    }

    /// Deliver one explicitly requested alert.
    pub async fn send_one(&self, id: AlertId) -> Result<SendReceipt, DispatchError> {
        let _claim = self.claim(id).ok_or(DispatchError::InFlight(id))?;

        let alert = self
            .alerts
            .fetch(id)?
            .ok_or(DispatchError::NotFound(id))?;
        if alert.notification_sent {
            return Err(DispatchError::AlreadySent(id));
        }

        let attempt = self.attempt(&alert).await;
        self.audit(&alert, &attempt);
        match attempt {
            Attempt::Sent { .. } => {}
            Attempt::Skipped(err) => return Err(err.into()),
            Attempt::Failed { error, .. } => return Err(error.into()),
            Attempt::Unmarked { error, .. } => return Err(error.into()),
        }

        info!(alert_id = %id, contract = %alert.contract_number, "risk alert notification sent");
        Ok(SendReceipt {
            alert_id: id,
            delivered: true,
        })
    }

    /// Attempt delivery for every unsent alert.
    ///
    /// Per-alert failures are logged, audited, and counted; only a failure to read the queue
    /// itself is returned as an error. Cancellation is honored between alerts.
    pub async fn send_all_unsent(
        &self,
        cancel: &CancellationToken,
    ) -> Result<DrainSummary, DispatchError> {
        let pending = self.alerts.unsent()?;
        let mut summary = DrainSummary::default();

        for queued in pending {
            if cancel.is_cancelled() {
                summary.cancelled = true;
                break;
            }

            let Some(_claim) = self.claim(queued.id) else {
                continue;
            };

            // Re-read under the claim: a concurrent send_one may have finished meanwhile.
            let alert = match self.alerts.fetch(queued.id) {
                Ok(Some(alert)) if !alert.notification_sent => alert,
                Ok(_) => continue,
                Err(err) => {
                    warn!(alert_id = %queued.id, error = %err, "unable to reload queued alert");
                    self.record(&queued, None, DeliveryStatus::Failed, Some(err.to_string()));
                    summary.record(&queued, DeliveryStatus::Failed);
                    continue;
                }
            };

            let attempt = self.attempt(&alert).await;
            let status = self.audit(&alert, &attempt);
            summary.record(&alert, status);
        }

        info!(
            sent = summary.sent,
            skipped = summary.skipped,
            failed = summary.failed,
            cancelled = summary.cancelled,
            "unsent alert queue drained"
        );
        Ok(summary)
    }

    /// Compose, deliver, and mark one alert.
    async fn attempt(&self, alert: &RiskAlert) -> Attempt {
        let message = match AlertMessage::compose(alert, self.config.locale) {
            Ok(message) => message,
            Err(err) => {
                warn!(alert_id = %alert.id, error = %err, "skipping alert");
                return Attempt::Skipped(err);
            }
        };

        let title = message.title.clone();
        if let Err(error) = self.deliver(message).await {
            warn!(alert_id = %alert.id, error = %error, "risk alert delivery failed");
            return Attempt::Failed { title, error };
        }

        match self.alerts.mark_sent(alert.id) {
            Ok(_) => Attempt::Sent { title },
            Err(error) => {
                warn!(alert_id = %alert.id, error = %error, "delivered alert could not be marked sent");
                Attempt::Unmarked { title, error }
            }
        }
    }

    fn audit(&self, alert: &RiskAlert, attempt: &Attempt) -> DeliveryStatus {
        let (title, status, error) = match attempt {
            Attempt::Sent { title } => (Some(title), DeliveryStatus::Sent, None),
            Attempt::Skipped(err) => (None, DeliveryStatus::Skipped, Some(err.to_string())),
            Attempt::Failed { title, error } => {
                (Some(title), DeliveryStatus::Failed, Some(error.to_string()))
            }
            Attempt::Unmarked { title, error } => {
                (Some(title), DeliveryStatus::Failed, Some(error.to_string()))
            }
        };
        self.record(alert, title.cloned(), status, error);
        status
    }

    /// Audit write failures are logged and never change the delivery outcome.
    fn record(
        &self,
        alert: &RiskAlert,
        title: Option<String>,
        status: DeliveryStatus,
        error: Option<String>,
    ) {
        let attempt = NewDeliveryAttempt {
            alert_id: alert.id,
            contract_number: alert.contract_number.clone(),
            company_name: alert.company_name.clone(),
            title,
            status,
            error,
            attempted_at: self.clock.now(),
        };
        if let Err(err) = self.alerts.record_attempt(attempt) {
            warn!(alert_id = %alert.id, ?status, error = %err, "delivery attempt not audited");
        }
    }

    async fn deliver(&self, message: AlertMessage) -> Result<(), DeliveryError> {
        let timeout = self.config.delivery_timeout;
        match tokio::time::timeout(timeout, self.channel.deliver(message)).await {
            Ok(result) => result,
            Err(_) => Err(DeliveryError::TimedOut(timeout)),
        }
    }

    fn claim(&self, id: AlertId) -> Option<InFlightClaim<'_>> {
        let mut in_flight = self.in_flight.lock().unwrap_or_else(PoisonError::into_inner);
        if in_flight.insert(id) {
            Some(InFlightClaim {
                registry: &self.in_flight,
                id,
            })
        } else {
            None
        }
    }
}

enum Attempt {
    Sent { title: String },
    Skipped(MessageError),
    Failed { title: String, error: DeliveryError },
    Unmarked { title: String, error: RepositoryError },
}

struct InFlightClaim<'a> {
    registry: &'a Mutex<HashSet<AlertId>>,
    id: AlertId,
}

impl Drop for InFlightClaim<'_> {
    fn drop(&mut self) {
        self.registry
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&self.id);
    }
}

/// Error raised by single-alert dispatch or by a drain that could not read the queue.
#[derive(Debug, thiserror::Error)]
pub enum DispatchError {
    #[error("alert {0} not found")]
    NotFound(AlertId),
    #[error("alert {0} was already sent")]
    AlreadySent(AlertId),
    #[error("alert {0} is being delivered by another request")]
    InFlight(AlertId),
    #[error(transparent)]
    Undeliverable(#[from] MessageError),
    #[error(transparent)]
    Delivery(#[from] DeliveryError),
    #[error(transparent)]
    Infrastructure(#[from] RepositoryError),
}

impl DispatchError {
    pub const fn kind(&self) -> ErrorKind {
        match self {
            DispatchError::NotFound(_) => ErrorKind::NotFound,
            DispatchError::AlreadySent(_) | DispatchError::InFlight(_) => ErrorKind::AlreadySent,
            DispatchError::Undeliverable(_) => ErrorKind::Validation,
            DispatchError::Delivery(err) => err.kind(),
            DispatchError::Infrastructure(err) => err.kind(),
        }
    }
}
