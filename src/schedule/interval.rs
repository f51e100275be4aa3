//! Interval and daily-at scheduling.
//!
//! Drift mode is a plain offset add. Aligned mode snaps to a boundary
//! multiple of `every` within the unit above it, carrying into the next
//! larger unit exactly once — no cascading re-alignment of the
//! carried-into field. The multi-day aligned case is intentionally NOT
//! calendar-anchored: the anchor drifts with `from` rather than pinning to
//! a fixed epoch.
//!
//! Every function here is generic over `Tz: TimeZone` so the same
//! arithmetic drives both the `utc: true` path (`Tz = Utc`) and the
//! "local" path (`Tz = chrono::Local`) the schedule router picks between —
//! "midnight" and "the current hour" mean whatever the caller's zone says
//! they mean.

use crate::error::{Error, Result};
use crate::schedule::Unit;
use chrono::{DateTime, Datelike, Duration, TimeZone, Timelike};

/// Compute the next instant for `Schedule::Interval`.
pub fn next_interval<Tz: TimeZone>(
    every: u32,
    unit: Unit,
    aligned: bool,
    from: DateTime<Tz>,
) -> Result<DateTime<Tz>> {
    if every == 0 {
        return Err(Error::invalid_schedule("interval 'every' must be positive"));
    }
    Ok(if aligned {
        next_aligned(every, unit, from)
    } else {
        next_drift(every, unit, from)
    })
}

fn next_drift<Tz: TimeZone>(every: u32, unit: Unit, from: DateTime<Tz>) -> DateTime<Tz> {
    from + Duration::milliseconds(every as i64 * unit.as_millis())
}

fn next_aligned<Tz: TimeZone>(every: u32, unit: Unit, from: DateTime<Tz>) -> DateTime<Tz> {
    match unit {
        Unit::Seconds => {
            let base = from.with_nanosecond(0).expect("valid nanosecond reset");
            let next_sec = (base.second() / every + 1) * every;
            if next_sec >= 60 {
                let carried = base.with_second(0).expect("valid second reset") + Duration::minutes(1);
                carried
                    .with_second(next_sec % 60)
                    .expect("modulo keeps value in range")
            } else {
                base.with_second(next_sec).expect("next_sec < 60")
            }
        }
        Unit::Minutes => {
            let base = from
                .with_second(0)
                .and_then(|d| d.with_nanosecond(0))
                .expect("valid reset");
            let next_min = (base.minute() / every + 1) * every;
            if next_min >= 60 {
                let carried = base.with_minute(0).expect("valid minute reset") + Duration::hours(1);
                carried
                    .with_minute(next_min % 60)
                    .expect("modulo keeps value in range")
            } else {
                base.with_minute(next_min).expect("next_min < 60")
            }
        }
        Unit::Hours => {
            let base = from
                .with_minute(0)
                .and_then(|d| d.with_second(0))
                .and_then(|d| d.with_nanosecond(0))
                .expect("valid reset");
            let next_hour = (base.hour() / every + 1) * every;
            if next_hour >= 24 {
                let carried = base.with_hour(0).expect("valid hour reset") + Duration::days(1);
                carried
                    .with_hour(next_hour % 24)
                    .expect("modulo keeps value in range")
            } else {
                base.with_hour(next_hour).expect("next_hour < 24")
            }
        }
        Unit::Days => {
            let midnight = from
                .timezone()
                .with_ymd_and_hms(from.year(), from.month(), from.day(), 0, 0, 0)
                .single()
                .expect("valid calendar date");
            midnight + Duration::days(every as i64)
        }
    }
}

/// Compute the next instant for `Schedule::Daily { at }`.
pub fn next_daily<Tz: TimeZone>(at: &str, from: DateTime<Tz>) -> Result<DateTime<Tz>> {
    let (hour, minute) = parse_at(at)?;
    let candidate = from
        .timezone()
        .with_ymd_and_hms(from.year(), from.month(), from.day(), hour, minute, 0)
        .single()
        .ok_or_else(|| Error::invalid_schedule(format!("could not construct time for '{at}'")))?;

    Ok(if candidate <= from {
        candidate + Duration::days(1)
    } else {
        candidate
    })
}

fn parse_at(at: &str) -> Result<(u32, u32)> {
    let (h, m) = at
        .split_once(':')
        .ok_or_else(|| Error::parse("at", format!("malformed time '{at}', expected H:MM")))?;

    let hour: u32 = h
        .parse()
        .map_err(|_| Error::parse("at", format!("malformed hour in '{at}'")))?;
    let minute: u32 = m
        .parse()
        .map_err(|_| Error::parse("at", format!("malformed minute in '{at}'")))?;

    if hour > 23 {
        return Err(Error::parse("at", format!("hour {hour} out of range [0, 23]")));
    }
    if minute > 59 {
        return Err(Error::parse("at", format!("minute {minute} out of range [0, 59]")));
    }
    if m.len() != 2 {
        return Err(Error::parse("at", format!("minute must be two digits in '{at}'")));
    }

    Ok((hour, minute))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone as _, Utc};

    fn dt(y: i32, mo: u32, d: u32, h: u32, mi: u32, s: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, mo, d, h, mi, s).unwrap()
    }

    #[test]
    fn drift_preserves_subminute_offset() {
        let from = dt(2025, 1, 1, 0, 0, 0) + Duration::milliseconds(500);
        let next = next_interval(30, Unit::Seconds, false, from).unwrap();
        assert_eq!(next, from + Duration::seconds(30));
    }

    #[test]
    fn aligned_quarter_hour_scenario() {
        let from = dt(2025, 1, 15, 10, 7, 30);
        let next = next_interval(15, Unit::Minutes, true, from).unwrap();
        assert_eq!(next, dt(2025, 1, 15, 10, 15, 0));
    }

    #[test]
    fn aligned_minutes_carry_into_hour() {
        let from = dt(2025, 1, 1, 10, 50, 0);
        let next = next_interval(20, Unit::Minutes, true, from).unwrap();
        assert_eq!(next, dt(2025, 1, 1, 11, 0, 0));
    }

    #[test]
    fn aligned_hours_every_one_advances_by_one_hour() {
        let from = dt(2025, 1, 1, 10, 7, 30);
        let next = next_interval(1, Unit::Hours, true, from).unwrap();
        assert_eq!(next, dt(2025, 1, 1, 11, 0, 0));
        assert_eq!(next.minute(), 0);
        assert_eq!(next.second(), 0);
    }

    #[test]
    fn aligned_hours_carry_into_next_day() {
        let from = dt(2025, 1, 1, 23, 10, 0);
        let next = next_interval(1, Unit::Hours, true, from).unwrap();
        assert_eq!(next, dt(2025, 1, 2, 0, 0, 0));
    }

    #[test]
    fn aligned_days_anchors_from_today_midnight() {
        let from = dt(2025, 1, 5, 13, 30, 0);
        let next = next_interval(3, Unit::Days, true, from).unwrap();
        assert_eq!(next, dt(2025, 1, 8, 0, 0, 0));
    }

    #[test]
    fn daily_rollover_scenario() {
        let from = dt(2025, 1, 15, 10, 0, 0);
        let next = next_daily("09:00", from).unwrap();
        assert_eq!(next, dt(2025, 1, 16, 9, 0, 0));
    }

    #[test]
    fn daily_same_day_when_still_ahead() {
        let from = dt(2025, 1, 15, 5, 0, 0);
        let next = next_daily("09:00", from).unwrap();
        assert_eq!(next, dt(2025, 1, 15, 9, 0, 0));
    }

    #[test]
    fn daily_rejects_malformed_at() {
        assert!(next_daily("25:00", dt(2025, 1, 1, 0, 0, 0)).is_err());
        assert!(next_daily("09:60", dt(2025, 1, 1, 0, 0, 0)).is_err());
        assert!(next_daily("garbage", dt(2025, 1, 1, 0, 0, 0)).is_err());
        assert!(next_daily("9:5", dt(2025, 1, 1, 0, 0, 0)).is_err());
    }

    #[test]
    fn zero_every_is_rejected() {
        assert!(next_interval(0, Unit::Minutes, true, dt(2025, 1, 1, 0, 0, 0)).is_err());
    }
}
