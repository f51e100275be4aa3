//! Error types for cronsync

/// Result type alias for cronsync operations
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for cronsync operations
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// A cron expression or `at` string is ill-formed.
    #[error("parse error in field '{field}': {message}")]
    Parse {
        /// Name of the offending field (e.g. "minute", "day_of_week", "at").
        field: String,
        /// Human-readable description of the violation.
        message: String,
    },

    /// A schedule value matched none of the known variants.
    #[error("invalid schedule: {0}")]
    InvalidSchedule(String),

    /// `nextAfter` could not find a matching instant within the iteration cap.
    #[error("impossible schedule: no matching instant within {0} iterations")]
    ImpossibleSchedule(u64),

    /// `Registry::add` was called with a name already registered.
    #[error("job already exists: {0}")]
    JobAlreadyExists(String),

    /// A registry operation referenced an unknown job name.
    #[error("job not found: {0}")]
    JobNotFound(String),

    /// The record store rejected an insert due to a duplicate `(name, intended_at)` key.
    #[error("duplicate key for job '{name}' at {intended_at}")]
    DuplicateKey {
        /// Job name.
        name: String,
        /// The `intendedAt` instant, truncated to seconds.
        intended_at: chrono::DateTime<chrono::Utc>,
    },

    /// Any other record-store failure.
    #[error("store error: {0}")]
    Store(String),

    /// A job body returned an error.
    #[error("job '{name}' failed: {message}")]
    Job {
        /// Job name.
        name: String,
        /// Error message captured from the job body.
        message: String,
    },

    /// A job body did not complete within its configured timeout.
    #[error("job '{name}' timed out after {timeout_ms}ms")]
    JobTimedOut {
        /// Job name.
        name: String,
        /// Configured timeout, in milliseconds.
        timeout_ms: u64,
    },

    /// The timer loop could not compute or schedule a valid next instant.
    #[error("scheduling failure: {0}")]
    SchedulingFailure(String),

    /// A job's timer tripped its circuit breaker after repeated failures.
    #[error("circuit broken after {failures} consecutive failures: {message}")]
    CircuitBroken {
        /// Number of consecutive failures that tripped the breaker.
        failures: u32,
        /// The error that caused the final failure.
        message: String,
    },

    /// Configuration is invalid (e.g. TTL below the minimum).
    #[error("configuration error: {0}")]
    Config(String),

    /// I/O error from a concrete store backend.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Build a [`Error::Parse`] for a named field.
    pub fn parse<F: Into<String>, M: Into<String>>(field: F, message: M) -> Self {
        Self::Parse {
            field: field.into(),
            message: message.into(),
        }
    }

    /// Build a [`Error::InvalidSchedule`].
    pub fn invalid_schedule<S: Into<String>>(message: S) -> Self {
        Self::InvalidSchedule(message.into())
    }

    /// Build a [`Error::JobAlreadyExists`].
    pub fn job_already_exists<S: Into<String>>(name: S) -> Self {
        Self::JobAlreadyExists(name.into())
    }

    /// Build a [`Error::JobNotFound`].
    pub fn job_not_found<S: Into<String>>(name: S) -> Self {
        Self::JobNotFound(name.into())
    }

    /// Build a [`Error::Store`].
    pub fn store<S: Into<String>>(message: S) -> Self {
        Self::Store(message.into())
    }

    /// Build a [`Error::Job`].
    pub fn job<N: Into<String>, M: Into<String>>(name: N, message: M) -> Self {
        Self::Job {
            name: name.into(),
            message: message.into(),
        }
    }

    /// Build a [`Error::SchedulingFailure`].
    pub fn scheduling_failure<S: Into<String>>(message: S) -> Self {
        Self::SchedulingFailure(message.into())
    }

    /// Build a [`Error::Config`].
    pub fn config<S: Into<String>>(message: S) -> Self {
        Self::Config(message.into())
    }

    /// Whether this error represents a job-body timeout (vs. a normal job error).
    pub fn is_timeout(&self) -> bool {
        matches!(self, Error::JobTimedOut { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_error_display_includes_field_and_token() {
        let err = Error::parse("minute", "value 61 out of range [0, 59]");
        let msg = err.to_string();
        assert!(msg.contains("minute"));
        assert!(msg.contains("61"));
    }

    #[test]
    fn is_timeout_distinguishes_job_errors() {
        let timeout = Error::JobTimedOut {
            name: "job".into(),
            timeout_ms: 100,
        };
        let plain = Error::job("job", "boom");
        assert!(timeout.is_timeout());
        assert!(!plain.is_timeout());
    }
}
