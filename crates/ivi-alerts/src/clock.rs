//! Wall-clock abstraction so detection timestamps and schedule evaluation can be driven
//! deterministically in tests.

use std::sync::{Mutex, PoisonError};

use chrono::{Duration, Local, NaiveDateTime};

/// Source of local wall-clock time. Scheduled times are interpreted in the same zone.
pub trait Clock: Send + Sync {
    fn now(&self) -> NaiveDateTime;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> NaiveDateTime {
        Local::now().naive_local()
    }
}

/// Manually advanced clock.
#[derive(Debug)]
pub struct FixedClock {
    current: Mutex<NaiveDateTime>,
}

impl FixedClock {
    pub fn new(at: NaiveDateTime) -> Self {
        Self {
            current: Mutex::new(at),
        }
    }

    pub fn set(&self, at: NaiveDateTime) {
        *self.current.lock().unwrap_or_else(PoisonError::into_inner) = at;
    }

    pub fn advance(&self, by: Duration) {
        let mut current = self.current.lock().unwrap_or_else(PoisonError::into_inner);
        *current += by;
    }
}

impl Clock for FixedClock {
    fn now(&self) -> NaiveDateTime {
        *self.current.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
