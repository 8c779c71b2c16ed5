use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use chrono::{Datelike, NaiveDate, NaiveDateTime, NaiveTime, Weekday};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use super::repository::RunOutcome;
use crate::error::ErrorKind;

/// Time of day in 24-hour `HH:MM` form.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct ScheduledTime(NaiveTime);

impl ScheduledTime {
    pub fn new(hour: u32, minute: u32) -> Option<Self> {
        NaiveTime::from_hms_opt(hour, minute, 0).map(Self)
    }

    pub const fn as_naive(self) -> NaiveTime {
        self.0
    }
}

impl FromStr for ScheduledTime {
    type Err = SettingsValidationError;

    /// Accepts exactly two-digit hours 00-23 and minutes 00-59.
    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        let invalid = || SettingsValidationError::InvalidTime(raw.to_string());
        let bytes = raw.as_bytes();
        if bytes.len() != 5 || bytes[2] != b':' {
            return Err(invalid());
        }
        let digits = [bytes[0], bytes[1], bytes[3], bytes[4]];
        if !digits.iter().all(u8::is_ascii_digit) {
            return Err(invalid());
        }
        let hour = u32::from(digits[0] - b'0') * 10 + u32::from(digits[1] - b'0');
        let minute = u32::from(digits[2] - b'0') * 10 + u32::from(digits[3] - b'0');
        if hour > 23 || minute > 59 {
            return Err(invalid());
        }
        Self::new(hour, minute).ok_or_else(invalid)
    }
}

impl fmt::Display for ScheduledTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.format("%H:%M"))
    }
}

impl Serialize for ScheduledTime {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for ScheduledTime {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

/// Validated delivery window.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchedulerSettings {
    pub is_enabled: bool,
    pub scheduled_time: ScheduledTime,
    /// Weekday numbers, 0 = Sunday through 6 = Saturday.
    pub days_of_week: BTreeSet<u8>,
}

impl SchedulerSettings {
    pub fn runs_on(&self, weekday: Weekday) -> bool {
        // num_days_from_sunday is at most 6
        self.days_of_week
            .contains(&(weekday.num_days_from_sunday() as u8))
    }

    pub fn runs_on_date(&self, date: NaiveDate) -> bool {
        self.runs_on(date.weekday())
    }
}

impl Default for SchedulerSettings {
    /// Disabled, weekdays at 09:00.
    fn default() -> Self {
        Self {
            is_enabled: false,
            scheduled_time: ScheduledTime(NaiveTime::MIN + chrono::Duration::hours(9)),
            days_of_week: (1..=5).collect(),
        }
    }
}

/// Raw settings change as submitted by an administrator.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SettingsUpdate {
    pub is_enabled: bool,
    pub scheduled_time: String,
    pub days_of_week: Vec<u8>,
}

impl SettingsUpdate {
    pub fn validate(&self) -> Result<SchedulerSettings, SettingsValidationError> {
        let scheduled_time = self.scheduled_time.trim().parse::<ScheduledTime>()?;

        if let Some(day) = self.days_of_week.iter().copied().find(|day| *day > 6) {
            return Err(SettingsValidationError::InvalidDay(day));
        }
        let days_of_week: BTreeSet<u8> = self.days_of_week.iter().copied().collect();
        if self.is_enabled && days_of_week.is_empty() {
            return Err(SettingsValidationError::EmptyDays);
        }

        Ok(SchedulerSettings {
            is_enabled: self.is_enabled,
            scheduled_time,
            days_of_week,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SettingsValidationError {
    #[error("scheduled time '{0}' must use 24-hour HH:MM")]
    InvalidTime(String),
    #[error("day {0} is outside 0 (Sunday) to 6 (Saturday)")]
    InvalidDay(u8),
    #[error("at least one day must be selected while the scheduler is enabled")]
    EmptyDays,
}

impl SettingsValidationError {
    pub const fn kind(&self) -> ErrorKind {
        ErrorKind::Validation
    }
}

/// Persisted scheduler singleton.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct SchedulerConfig {
    pub settings: SchedulerSettings,
    pub last_run_at: Option<NaiveDateTime>,
    pub last_run_status: Option<RunOutcome>,
    pub last_run_count: usize,
    pub next_run_at: Option<NaiveDateTime>,
    /// Date of the most recent scheduled run; that day's slot is not eligible again.
    pub last_scheduled_run_on: Option<NaiveDate>,
}

impl SchedulerConfig {
    /// The day whose slot is already used up, if it is `today`.
    pub fn consumed_day(&self, today: NaiveDate) -> Option<NaiveDate> {
        self.last_scheduled_run_on.filter(|date| *date == today)
    }
}
