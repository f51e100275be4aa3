//! Cron options — a plain builder struct with sensible defaults for store
//! provisioning and time zone handling.

use tracing::warn;

/// Minimum TTL accepted by a record store's TTL index, in seconds.
pub const MIN_COLLECTION_TTL_SECONDS: u64 = 300;

/// Default name of the history collection/table.
pub const DEFAULT_COLLECTION_NAME: &str = "cronHistory";

/// Default TTL for history rows: 2 days.
pub const DEFAULT_COLLECTION_TTL_SECONDS: u64 = 172_800;

/// Process-wide options governing a [`crate::registry::Registry`]'s store
/// provisioning and time zone handling.
#[derive(Debug, Clone)]
pub struct CronOptions {
    /// Name of the backing collection/table for coordination history.
    pub collection_name: String,
    /// TTL, in seconds, for history rows before they're eligible for sweep.
    pub collection_ttl: u64,
    /// When `true`, schedule computations use UTC; otherwise the host's
    /// local offset is used.
    pub utc: bool,
}

impl Default for CronOptions {
    fn default() -> Self {
        Self {
            collection_name: DEFAULT_COLLECTION_NAME.to_string(),
            collection_ttl: DEFAULT_COLLECTION_TTL_SECONDS,
            utc: false,
        }
    }
}

impl CronOptions {
    /// Start from the defaults.
    pub fn new() -> Self {
        Self::default()
    }

    /// Override the collection/table name.
    pub fn with_collection_name(mut self, name: impl Into<String>) -> Self {
        self.collection_name = name.into();
        self
    }

    /// Override the collection TTL.
    pub fn with_collection_ttl(mut self, ttl_seconds: u64) -> Self {
        self.collection_ttl = ttl_seconds;
        self
    }

    /// Override the time zone mode.
    pub fn with_utc(mut self, utc: bool) -> Self {
        self.utc = utc;
        self
    }

    /// TTL to actually provision, or `None` if it's below the minimum — in
    /// which case a warning is logged and the TTL index is skipped entirely
    /// rather than rejected outright.
    pub fn effective_ttl(&self) -> Option<u64> {
        if self.collection_ttl < MIN_COLLECTION_TTL_SECONDS {
            warn!(
                ttl_seconds = self.collection_ttl,
                minimum = MIN_COLLECTION_TTL_SECONDS,
                "collection TTL below minimum, skipping TTL index"
            );
            None
        } else {
            Some(self.collection_ttl)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_sensible() {
        let opts = CronOptions::default();
        assert_eq!(opts.collection_name, "cronHistory");
        assert_eq!(opts.collection_ttl, 172_800);
        assert!(!opts.utc);
    }

    #[test]
    fn builder_overrides_apply() {
        let opts = CronOptions::new()
            .with_collection_name("jobs")
            .with_collection_ttl(3600)
            .with_utc(true);
        assert_eq!(opts.collection_name, "jobs");
        assert_eq!(opts.collection_ttl, 3600);
        assert!(opts.utc);
    }

    #[test]
    fn ttl_below_minimum_is_skipped_not_rejected() {
        let opts = CronOptions::new().with_collection_ttl(100);
        assert_eq!(opts.effective_ttl(), None);
    }

    #[test]
    fn ttl_at_or_above_minimum_is_kept() {
        let opts = CronOptions::new().with_collection_ttl(300);
        assert_eq!(opts.effective_ttl(), Some(300));
    }
}
