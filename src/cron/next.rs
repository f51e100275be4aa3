//! `next_after` search over a parsed [`CronFields`] — a minute-by-minute
//! scan with the day/weekday OR/AND predicate and the `L` last-day-of-month
//! rule.

use crate::cron::fields::CronFields;
use crate::error::{Error, Result};
use chrono::{DateTime, Datelike, Duration, TimeZone, Timelike, Utc};

/// Hard iteration cap: 4 years worth of minutes. Beyond this the expression
/// can never match (e.g. `30 2 *`, February 30th never exists).
const MAX_ITERATIONS: u64 = 4 * 365 * 24 * 60;

/// Compute the next instant after `from` (exclusive) that `fields` matches,
/// evaluating calendar components in whatever zone `Tz` is. Generic over
/// `Tz` so the same search drives both the `utc: true` path (`Tz = Utc`)
/// and the "local" path (`Tz = chrono::Local`) the schedule router picks
/// between — `cronsync` has no reason to carry a full IANA timezone
/// database beyond that distinction.
pub fn next_after<Tz: TimeZone>(fields: &CronFields, from: DateTime<Tz>) -> Result<DateTime<Tz>> {
    let mut candidate = round_up_to_next_minute(from);

    let day_and_weekday_are_or = fields.day_specified() && fields.weekday_specified();

    for _ in 0..MAX_ITERATIONS {
        if matches(fields, &candidate, day_and_weekday_are_or) {
            return Ok(candidate);
        }
        candidate += Duration::minutes(1);
    }

    Err(Error::ImpossibleSchedule(MAX_ITERATIONS))
}

fn round_up_to_next_minute<Tz: TimeZone>(from: DateTime<Tz>) -> DateTime<Tz> {
    let truncated = from
        .with_second(0)
        .and_then(|d| d.with_nanosecond(0))
        .expect("zeroing seconds/nanoseconds on a valid DateTime cannot fail");
    truncated + Duration::minutes(1)
}

fn matches<Tz: TimeZone>(
    fields: &CronFields,
    candidate: &DateTime<Tz>,
    day_and_weekday_are_or: bool,
) -> bool {
    if !fields.minute.matches(candidate.minute()) {
        return false;
    }
    if !fields.hour.matches(candidate.hour()) {
        return false;
    }
    if !fields.month.matches(candidate.month()) {
        return false;
    }

    let day_matches = day_matches(fields, candidate);
    let weekday_matches = fields
        .day_of_week
        .matches(candidate.weekday().num_days_from_sunday());

    if day_and_weekday_are_or {
        day_matches || weekday_matches
    } else {
        day_matches && weekday_matches
    }
}

fn day_matches<Tz: TimeZone>(fields: &CronFields, candidate: &DateTime<Tz>) -> bool {
    if fields.is_last_day_of_month {
        return is_last_day_of_month(candidate);
    }
    if !fields.day_of_month.specified {
        return true;
    }
    fields.day_of_month.matches(candidate.day())
}

fn is_last_day_of_month<Tz: TimeZone>(date: &DateTime<Tz>) -> bool {
    let next_day = date.clone() + Duration::days(1);
    next_day.month() != date.month()
}

/// Compute the next matching instant after `from`, raising
/// [`Error::ImpossibleSchedule`] rather than searching forever.
pub fn parse_and_next_after<Tz: TimeZone>(expr: &str, from: DateTime<Tz>) -> Result<DateTime<Tz>> {
    let fields = CronFields::parse(expr)?;
    next_after(&fields, from)
}
