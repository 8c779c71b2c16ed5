//! Recurring delivery of the unsent alert queue.
//!
//! The persisted [`SchedulerConfig`] singleton holds the delivery window; [`compute_next_run`]
//! derives the next slot from it, and [`NotificationScheduler`] moves through
//! Disabled → Armed → Running → Idle-after-run whenever a tick or a manual trigger arrives.

pub mod driver;
pub mod repository;
pub mod router;
pub mod schedule;
pub mod service;
pub mod settings;

#[cfg(test)]
mod tests;

pub use driver::spawn_driver;
pub use repository::{NewRunLog, NotificationRunLog, RunOutcome, SchedulerRepository, TriggerSource};
pub use router::scheduler_router;
pub use schedule::compute_next_run;
pub use service::{
    NotificationScheduler, RunReport, SchedulerError, SchedulerState, SchedulerStatus,
    TriggerOutcome,
};
pub use settings::{
    ScheduledTime, SchedulerConfig, SchedulerSettings, SettingsUpdate, SettingsValidationError,
};
