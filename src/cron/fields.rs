//! Parsing of individual five-field cron tokens into normalized value sets.
//!
//! Tracks whether a field was written as `*` (the "specified" distinction
//! the day/weekday OR logic in [`crate::cron::next`] needs) alongside the
//! usual step/range/list/named-value grammar.

use crate::error::{Error, Result};
use std::collections::BTreeSet;

const MONTH_NAMES: &[(&str, u32)] = &[
    ("JAN", 1),
    ("FEB", 2),
    ("MAR", 3),
    ("APR", 4),
    ("MAY", 5),
    ("JUN", 6),
    ("JUL", 7),
    ("AUG", 8),
    ("SEP", 9),
    ("OCT", 10),
    ("NOV", 11),
    ("DEC", 12),
];

const WEEKDAY_NAMES: &[(&str, u32)] = &[
    ("SUN", 0),
    ("MON", 1),
    ("TUE", 2),
    ("WED", 3),
    ("THU", 4),
    ("FRI", 5),
    ("SAT", 6),
];

/// A parsed cron field: a normalized, sorted, deduplicated set of values plus
/// whether the user wrote anything other than a bare `*`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Field {
    values: BTreeSet<u32>,
    /// `true` iff the user wrote something other than `*` — used by the
    /// day/weekday OR-vs-AND predicate in [`crate::cron::next`].
    pub specified: bool,
}

impl Field {
    /// Whether `value` is a member of this field's set.
    pub fn matches(&self, value: u32) -> bool {
        self.values.contains(&value)
    }

    /// The underlying sorted value set.
    pub fn values(&self) -> &BTreeSet<u32> {
        &self.values
    }

    fn full_range(min: u32, max: u32) -> Self {
        Field {
            values: (min..=max).collect(),
            specified: false,
        }
    }

    /// Parse a comma-separated field against `[min, max]`, resolving names
    /// against `names` (month or weekday shortcuts) when provided.
    pub fn parse(
        field_name: &'static str,
        token: &str,
        min: u32,
        max: u32,
        names: &[(&str, u32)],
    ) -> Result<Self> {
        if token == "*" {
            return Ok(Self::full_range(min, max));
        }

        let mut values = BTreeSet::new();
        for term in token.split(',') {
            if term.is_empty() {
                return Err(Error::parse(field_name, format!("empty term in '{token}'")));
            }
            values.extend(parse_term(field_name, term, min, max, names)?);
        }

        if values.is_empty() {
            return Err(Error::parse(field_name, format!("no values in '{token}'")));
        }

        Ok(Field {
            values,
            specified: true,
        })
    }
}

fn resolve_value(field_name: &'static str, raw: &str, names: &[(&str, u32)]) -> Result<u32> {
    if let Ok(n) = raw.parse::<u32>() {
        return Ok(n);
    }
    let upper = raw.to_ascii_uppercase();
    for (name, value) in names {
        if *name == upper {
            return Ok(*value);
        }
    }
    Err(Error::parse(
        field_name,
        format!("unrecognized value '{raw}'"),
    ))
}

fn check_range(field_name: &'static str, value: u32, min: u32, max: u32) -> Result<()> {
    if value < min || value > max {
        return Err(Error::parse(
            field_name,
            format!("value {value} out of range [{min}, {max}]"),
        ));
    }
    Ok(())
}

/// Parse one comma-element: a bare value, a name, a range `a-b`, or a step
/// `base/step` where `base` is `*`, a value, or a range.
fn parse_term(
    field_name: &'static str,
    term: &str,
    min: u32,
    max: u32,
    names: &[(&str, u32)],
) -> Result<BTreeSet<u32>> {
    if let Some((base, step_str)) = term.split_once('/') {
        if base.is_empty() || step_str.is_empty() {
            return Err(Error::parse(field_name, format!("malformed step '{term}'")));
        }
        let step: u32 = step_str
            .parse()
            .map_err(|_| Error::parse(field_name, format!("malformed step '{term}'")))?;
        if step == 0 {
            return Err(Error::parse(field_name, format!("step must be positive in '{term}'")));
        }

        let (start, end) = if base == "*" {
            (min, max)
        } else if let Some((a, b)) = base.split_once('-') {
            let a = resolve_value(field_name, a, names)?;
            let b = resolve_value(field_name, b, names)?;
            check_range(field_name, a, min, max)?;
            check_range(field_name, b, min, max)?;
            if a > b {
                return Err(Error::parse(
                    field_name,
                    format!("range start {a} is greater than end {b}"),
                ));
            }
            (a, b)
        } else {
            let a = resolve_value(field_name, base, names)?;
            check_range(field_name, a, min, max)?;
            (a, max)
        };

        let mut out = BTreeSet::new();
        let mut v = start;
        while v <= end {
            out.insert(v);
            v += step;
        }
        return Ok(out);
    }

    if let Some((a, b)) = term.split_once('-') {
        if a.is_empty() || b.is_empty() {
            return Err(Error::parse(field_name, format!("malformed range '{term}'")));
        }
        let a = resolve_value(field_name, a, names)?;
        let b = resolve_value(field_name, b, names)?;
        check_range(field_name, a, min, max)?;
        check_range(field_name, b, min, max)?;
        if a > b {
            return Err(Error::parse(
                field_name,
                format!("range start {a} is greater than end {b}"),
            ));
        }
        return Ok((a..=b).collect());
    }

    let v = resolve_value(field_name, term, names)?;
    check_range(field_name, v, min, max)?;
    let mut out = BTreeSet::new();
    out.insert(v);
    Ok(out)
}

/// Normalizes a weekday set so that `7` (an alternate Sunday spelling) is
/// folded into `0`.
fn normalize_weekday(mut field: Field) -> Field {
    if field.values.remove(&7) {
        field.values.insert(0);
    }
    field
}

/// The five parsed fields of a cron expression, plus the `L` flag.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CronFields {
    /// Minute field, 0-59.
    pub minute: Field,
    /// Hour field, 0-23.
    pub hour: Field,
    /// Day-of-month field, 1-31 (empty when `is_last_day_of_month` is set).
    pub day_of_month: Field,
    /// Month field, 1-12.
    pub month: Field,
    /// Day-of-week field, 0-6 (Sunday = 0).
    pub day_of_week: Field,
    /// Set when the day-of-month token was exactly `L`/`l`.
    pub is_last_day_of_month: bool,
}

impl CronFields {
    /// Parse a five-field cron expression.
    pub fn parse(expr: &str) -> Result<Self> {
        let tokens: Vec<&str> = expr.split_whitespace().collect();
        if tokens.len() != 5 {
            return Err(Error::parse(
                "expression",
                format!("expected 5 fields, got {}", tokens.len()),
            ));
        }

        let minute = Field::parse("minute", tokens[0], 0, 59, &[])?;
        let hour = Field::parse("hour", tokens[1], 0, 23, &[])?;

        let (day_of_month, is_last_day_of_month) = if tokens[2].eq_ignore_ascii_case("l") {
            (
                Field {
                    values: BTreeSet::new(),
                    specified: true,
                },
                true,
            )
        } else {
            (Field::parse("day_of_month", tokens[2], 1, 31, &[])?, false)
        };

        let month = Field::parse("month", tokens[3], 1, 12, MONTH_NAMES)?;
        let day_of_week = normalize_weekday(Field::parse(
            "day_of_week",
            tokens[4],
            0,
            7,
            WEEKDAY_NAMES,
        )?);

        Ok(CronFields {
            minute,
            hour,
            day_of_month,
            month,
            day_of_week,
            is_last_day_of_month,
        })
    }

    /// Whether the day-of-month field carries meaning beyond "any day"
    /// (either an explicit set or the `L` flag).
    pub fn day_specified(&self) -> bool {
        self.is_last_day_of_month || self.day_of_month.specified
    }

    /// Whether the day-of-week field was written as anything but `*`.
    pub fn weekday_specified(&self) -> bool {
        self.day_of_week.specified
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_wildcard() {
        let f = Field::parse("minute", "*", 0, 59, &[]).unwrap();
        assert!(!f.specified);
        assert_eq!(f.values().len(), 60);
    }

    #[test]
    fn parses_list_sorted_deduped() {
        let f = Field::parse("minute", "5,1,5,3", 0, 59, &[]).unwrap();
        assert_eq!(f.values().iter().copied().collect::<Vec<_>>(), vec![1, 3, 5]);
    }

    #[test]
    fn parses_range() {
        let f = Field::parse("hour", "9-17", 0, 23, &[]).unwrap();
        assert!(f.matches(9));
        assert!(f.matches(17));
        assert!(!f.matches(18));
    }

    #[test]
    fn rejects_inverted_range() {
        assert!(Field::parse("hour", "17-9", 0, 23, &[]).is_err());
    }

    #[test]
    fn parses_wildcard_step() {
        let f = Field::parse("minute", "*/15", 0, 59, &[]).unwrap();
        assert_eq!(
            f.values().iter().copied().collect::<Vec<_>>(),
            vec![0, 15, 30, 45]
        );
    }

    #[test]
    fn parses_base_step_capped_at_max() {
        let f = Field::parse("minute", "50/15", 0, 59, &[]).unwrap();
        assert_eq!(f.values().iter().copied().collect::<Vec<_>>(), vec![50]);
    }

    #[test]
    fn parses_range_step() {
        let f = Field::parse("hour", "0-10/3", 0, 23, &[]).unwrap();
        assert_eq!(f.values().iter().copied().collect::<Vec<_>>(), vec![0, 3, 6, 9]);
    }

    #[test]
    fn rejects_zero_step() {
        assert!(Field::parse("minute", "*/0", 0, 59, &[]).is_err());
    }

    #[test]
    fn rejects_malformed_step() {
        assert!(Field::parse("minute", "*/", 0, 59, &[]).is_err());
        assert!(Field::parse("minute", "*/abc", 0, 59, &[]).is_err());
    }

    #[test]
    fn rejects_out_of_range_value() {
        assert!(Field::parse("minute", "60", 0, 59, &[]).is_err());
    }

    #[test]
    fn rejects_empty_endpoints() {
        assert!(Field::parse("minute", "10-", 0, 59, &[]).is_err());
        assert!(Field::parse("minute", "-10", 0, 59, &[]).is_err());
    }

    #[test]
    fn resolves_names_case_insensitively() {
        let f = Field::parse("month", "jan,Mar,DEC", 1, 12, MONTH_NAMES).unwrap();
        assert_eq!(f.values().iter().copied().collect::<Vec<_>>(), vec![1, 3, 12]);
    }

    #[test]
    fn rejects_unknown_name() {
        assert!(Field::parse("month", "FOO", 1, 12, MONTH_NAMES).is_err());
    }

    #[test]
    fn weekday_seven_normalizes_to_zero() {
        let fields = CronFields::parse("0 9 * * 7").unwrap();
        assert!(fields.day_of_week.matches(0));
        assert!(!fields.day_of_week.matches(7));
    }

    #[test]
    fn weekday_range_with_names() {
        let fields = CronFields::parse("0 9 * * MON-FRI").unwrap();
        assert!(fields.day_of_week.matches(1));
        assert!(fields.day_of_week.matches(5));
        assert!(!fields.day_of_week.matches(0));
        assert!(!fields.day_of_week.matches(6));
    }

    #[test]
    fn last_day_of_month_flag() {
        let fields = CronFields::parse("0 0 L * *").unwrap();
        assert!(fields.is_last_day_of_month);
        assert!(fields.day_of_month.values().is_empty());
        assert!(fields.day_specified());
    }

    #[test]
    fn wrong_field_count_rejected() {
        assert!(CronFields::parse("* * * *").is_err());
        assert!(CronFields::parse("* * * * * *").is_err());
    }

    #[test]
    fn day_and_weekday_specified_distinction() {
        let both_wild = CronFields::parse("0 9 * * *").unwrap();
        assert!(!both_wild.day_specified());
        assert!(!both_wild.weekday_specified());

        let day_only = CronFields::parse("0 9 15 * *").unwrap();
        assert!(day_only.day_specified());
        assert!(!day_only.weekday_specified());

        let explicit_full_range_is_specified = CronFields::parse("0 9 1-31 * *").unwrap();
        assert!(explicit_full_range_is_specified.day_specified());
    }
}
