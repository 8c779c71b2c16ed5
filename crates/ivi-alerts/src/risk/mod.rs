//! Risk-category transition detection, the alert log, and notification dispatch.
//!
//! A recompute flows through [`RecomputeService`], which compares the fresh score with the
//! stored snapshot and commits the overwrite together with any [`RiskAlert`] it produced.
//! Alerts wait in the log as unsent until [`NotificationDispatcher`] delivers them through a
//! [`NotificationChannel`], either one at a time or as a drain of the whole queue.

pub mod channel;
pub mod detector;
pub mod dispatcher;
pub mod domain;
pub mod queue;
pub mod replay;
pub mod repository;
pub mod router;
pub mod scoring;

#[cfg(test)]
pub(crate) mod tests;

pub use channel::{AlertMessage, DeliveryError, LoggingChannel, MessageError, NotificationChannel};
pub use detector::{DetectionError, RecomputeOutcome, RecomputeService, RiskAlertDetector};
pub use dispatcher::{
    DeliveryResult, DispatchConfig, DispatchError, DrainSummary, NotificationDispatcher,
    SendReceipt,
};
pub use domain::{
    AlertId, ContractNumber, DeliveryAttempt, DeliveryStatus, NewDeliveryAttempt, NewRiskAlert,
    RiskAlert, TransitionKind,
};
pub use queue::{AlertQueue, RecentAlerts};
pub use replay::{ScoreReplay, ScoreReplayError};
pub use repository::{AlertRepository, ScoreRepository, UnseenAlerts};
pub use router::{alert_router, AlertApi};
pub use scoring::{
    compute_composite, ClientScore, Locale, RiskCategory, ScoreInput, ScoreValidationError,
};
