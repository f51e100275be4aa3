//! Cron expression parsing and next-instant computation.
//!
//! Built around an explicit "was this field specified" flag per
//! [`fields::Field`] so the day/weekday OR-vs-AND predicate in [`next`] is
//! correct rather than inferred from set cardinality.

pub mod fields;
pub mod next;

pub use fields::CronFields;
pub use next::{next_after, parse_and_next_after};
