//! Schedule Router — dispatches a [`Schedule`] to the interval or cron
//! engine behind a single `next_after` function, and picks between UTC and
//! the host's local zone per [`crate::config::CronOptions::utc`].

use crate::cron;
use crate::error::Result;
use crate::schedule::{interval, Schedule};
use chrono::{DateTime, Local, TimeZone, Utc};

/// Compute the next instant after `from` for any [`Schedule`] variant,
/// evaluating calendar components (day boundaries, `at` times, cron
/// fields) in whatever zone `Tz` is.
pub fn next_after<Tz: TimeZone>(schedule: &Schedule, from: DateTime<Tz>) -> Result<DateTime<Tz>> {
    match schedule {
        Schedule::Interval { every, unit, aligned } => {
            interval::next_interval(*every, *unit, *aligned, from)
        }
        Schedule::Daily { at } => interval::next_daily(at, from),
        Schedule::Cron { expr } => cron::parse_and_next_after(expr, from),
    }
}

/// Compute the next instant after `from` (always given in UTC), evaluating
/// calendar components in UTC when `utc` is `true` or in the host's local
/// zone otherwise — the switch [`crate::config::CronOptions::utc`] governs.
/// The result is always converted back to UTC, since every other component
/// (the Timer Engine, the Coordinator, history timestamps) works
/// exclusively in UTC instants.
pub fn next_after_in_zone(schedule: &Schedule, from: DateTime<Utc>, utc: bool) -> Result<DateTime<Utc>> {
    if utc {
        next_after(schedule, from)
    } else {
        let local_from = from.with_timezone(&Local);
        let local_next = next_after(schedule, local_from)?;
        Ok(local_next.with_timezone(&Utc))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schedule::Unit;
    use chrono::TimeZone as _;

    #[test]
    fn routes_each_variant() {
        let from = Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap();

        let interval_sched = Schedule::Interval {
            every: 1,
            unit: Unit::Minutes,
            aligned: false,
        };
        assert!(next_after(&interval_sched, from).is_ok());

        let daily_sched = Schedule::Daily { at: "09:00".into() };
        assert!(next_after(&daily_sched, from).is_ok());

        let cron_sched = Schedule::Cron { expr: "* * * * *".into() };
        assert!(next_after(&cron_sched, from).is_ok());
    }

    #[test]
    fn next_after_in_zone_utc_matches_plain_next_after() {
        let from = Utc.with_ymd_and_hms(2025, 1, 15, 10, 7, 30).unwrap();
        let schedule = Schedule::Interval { every: 15, unit: Unit::Minutes, aligned: true };
        assert_eq!(
            next_after_in_zone(&schedule, from, true).unwrap(),
            next_after(&schedule, from).unwrap()
        );
    }

    #[test]
    fn next_after_in_zone_local_is_strictly_after_from() {
        let from = Utc.with_ymd_and_hms(2025, 1, 15, 10, 7, 30).unwrap();
        let schedule = Schedule::Daily { at: "09:00".into() };
        let next = next_after_in_zone(&schedule, from, false).unwrap();
        assert!(next > from);
    }
}
