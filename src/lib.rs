//! # cronsync — a distributed cron scheduler core
//!
//! `cronsync` lets a host process register named recurring jobs and
//! guarantees each scheduled firing executes on exactly one of possibly many
//! cooperating instances, coordinated through a shared [`store::RecordStore`]
//! keyed on a unique `(name, intended_at)` pair.
//!
//! ## Modules
//!
//! - [`schedule`] — the `Schedule` tagged union and the interval/cron router
//! - [`cron`] — five-field cron expression parsing and `nextAfter` search
//! - [`timer`] — the recurring timer loop, circuit breaker, and backoff
//! - [`executor`] — runs a job body with an optional timeout
//! - [`coordinator`] — lease acquisition, execution, and outcome recording
//! - [`registry`] — job registration and process lifecycle
//! - [`store`] — the record-store contract and its backends
//! - [`config`] — process-wide options and their defaults
//! - [`collection_cache`] — exactly-once store provisioning per collection
//!
//! ## Example
//!
//! ```no_run
//! use cronsync::config::CronOptions;
//! use cronsync::registry::{JobConfig, Registry};
//! use cronsync::schedule::{Schedule, Unit};
//! use cronsync::store::memory::MemoryStore;
//! use std::sync::Arc;
//!
//! # async fn run() -> cronsync::Result<()> {
//! let options = CronOptions::new().with_collection_name("reportJobs");
//! let registry = Registry::with_options(Arc::new(MemoryStore::new()), options);
//! let schedule = Schedule::Interval { every: 15, unit: Unit::Minutes, aligned: true };
//! let job = Box::new(|_at, _name| {
//!     Box::pin(async { Ok(serde_json::json!({"done": true})) })
//!         as cronsync::executor::JobFuture
//! });
//! registry.add(JobConfig::new("reports", schedule), job).await?;
//! registry.start().await?;
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs, clippy::all)]
#![allow(clippy::module_name_repetitions, clippy::must_use_candidate)]

/// Error types used throughout the library.
pub mod error;

/// The `Schedule` tagged union and the interval/cron router.
pub mod schedule;

/// Cron expression parsing and next-instant computation.
pub mod cron;

/// The recurring timer loop, circuit breaker, and exponential backoff.
pub mod timer;

/// Runs a job body with an optional timeout.
pub mod executor;

/// The record-store contract and its concrete backends.
pub mod store;

/// Process-wide store cache for exactly-once collection provisioning.
pub mod collection_cache;

/// Process-wide options and their defaults.
pub mod config;

/// Lease acquisition, execution, and outcome recording for a single firing.
pub mod coordinator;

/// Job registration and process lifecycle (start/pause/stop/shutdown).
pub mod registry;

/// Re-export commonly used types for convenience.
pub use error::{Error, Result};

/// Version information.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version() {
        assert!(!VERSION.is_empty());
    }
}
