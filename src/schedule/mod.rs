//! The `Schedule` tagged union and the router that dispatches it to the
//! interval/daily engine or the cron engine.

pub mod interval;
pub mod router;

use serde::{Deserialize, Serialize};
use std::fmt;

/// Time unit for [`Schedule::Interval`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Unit {
    /// Seconds.
    Seconds,
    /// Minutes.
    Minutes,
    /// Hours.
    Hours,
    /// Days.
    Days,
}

impl Unit {
    /// Length of one unit in milliseconds.
    pub fn as_millis(self) -> i64 {
        match self {
            Unit::Seconds => 1_000,
            Unit::Minutes => 60_000,
            Unit::Hours => 3_600_000,
            Unit::Days => 86_400_000,
        }
    }
}

/// A schedule: one of interval, daily-at, or five-field cron.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum Schedule {
    /// `every N unit`, drifting or boundary-aligned.
    Interval {
        /// Must be a positive integer.
        every: u32,
        /// Unit of `every`.
        unit: Unit,
        /// Whether to snap to a boundary multiple of `every`.
        aligned: bool,
    },
    /// Daily at a fixed `H[H]:MM`.
    Daily {
        /// `"H:MM"` or `"HH:MM"`, 0 <= H <= 23, 0 <= MM <= 59.
        at: String,
    },
    /// Five-field cron expression.
    Cron {
        /// Minute hour day-of-month month day-of-week.
        expr: String,
    },
}

impl fmt::Display for Schedule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Schedule::Interval { every, unit, aligned } => {
                write!(f, "every {every} {unit:?} (aligned={aligned})")
            }
            Schedule::Daily { at } => write!(f, "daily at {at}"),
            Schedule::Cron { expr } => write!(f, "cron '{expr}'"),
        }
    }
}
