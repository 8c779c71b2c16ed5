use chrono::{Days, NaiveDate, NaiveDateTime};

use super::settings::SchedulerSettings;

/// Earliest slot at or after `now` that falls on an enabled weekday at the scheduled time,
/// skipping `consumed_day`. `None` when the scheduler is disabled or has no days.
pub fn compute_next_run(
    settings: &SchedulerSettings,
    now: NaiveDateTime,
    consumed_day: Option<NaiveDate>,
) -> Option<NaiveDateTime> {
    if !settings.is_enabled || settings.days_of_week.is_empty() {
        return None;
    }

    let time = settings.scheduled_time.as_naive();
    // Offsets 0..=7 reach the same weekday next week when today's slot has passed.
    (0..=7u64)
        .filter_map(|offset| now.date().checked_add_days(Days::new(offset)))
        .filter(|date| Some(*date) != consumed_day)
        .filter(|date| settings.runs_on_date(*date))
        .map(|date| date.and_time(time))
        .find(|candidate| *candidate >= now)
}
