//! Execution Coordinator: acquire the lease for a firing, run the job, and
//! record the outcome — or bypass the lease entirely for non-persisted
//! jobs.
//!
//! Built around the [`RecordStore`] trait's insert/update pair so the lease
//! mechanism is backend-agnostic.

use crate::error::Error;
use crate::executor::{self, JobFn};
use crate::store::{HistoryPatch, InsertOutcome, RecordStore};
use chrono::{DateTime, Utc};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error};

/// Coordinates lease acquisition, execution, and outcome recording for a
/// single job's firings against one [`RecordStore`].
pub struct Coordinator {
    store: Arc<dyn RecordStore>,
}

impl Coordinator {
    /// Build a coordinator over `store`.
    pub fn new(store: Arc<dyn RecordStore>) -> Self {
        Self { store }
    }

    /// Run one firing of `name`, intended for `intended_at`.
    ///
    /// When `persist` is `true` (the default), this first attempts to win
    /// the `(name, intended_at)` lease via `insert_history`; a losing
    /// attempt (another instance already holds it) is a silent no-op. When
    /// `persist` is `false`, the job runs unconditionally with no store
    /// interaction at all — an escape hatch for fire-and-forget,
    /// non-coordinated jobs.
    ///
    /// Errors from `on_error` itself are logged and swallowed — a
    /// misbehaving callback must never break the timer loop calling this.
    pub async fn run_firing(
        &self,
        name: &str,
        intended_at: DateTime<Utc>,
        job: &JobFn,
        timeout: Option<Duration>,
        persist: bool,
        on_error: Option<&(dyn Fn(&Error, DateTime<Utc>) + Send + Sync)>,
    ) -> crate::error::Result<()> {
        if !persist {
            let result = executor::execute(job, intended_at, name, timeout, None).await;
            if !result.success {
                self.report_error(
                    name,
                    intended_at,
                    result.error.as_deref().unwrap_or("unknown error"),
                    on_error,
                );
            }
            return Ok(());
        }

        let started_at = Utc::now();
        let lease = self
            .store
            .insert_history(name, intended_at, started_at)
            .await
            .map_err(|store_err| {
                error!(name, %intended_at, error = %store_err, "lease acquisition failed");
                store_err
            })?;

        let id = match lease {
            InsertOutcome::Duplicate => {
                debug!(name, %intended_at, "skipping firing, lease held elsewhere");
                return Ok(());
            }
            InsertOutcome::Inserted(id) => id,
        };

        let result = executor::execute(job, intended_at, name, timeout, None).await;

        let patch = HistoryPatch {
            finished_at: Utc::now(),
            result: result.result.clone(),
            error: result.error.clone(),
        };

        if let Err(store_err) = self.store.update_history(id, patch).await {
            error!(name, error = %store_err, "failed to record firing outcome");
        }

        if !result.success {
            self.report_error(
                name,
                intended_at,
                result.error.as_deref().unwrap_or("unknown error"),
                on_error,
            );
        }

        Ok(())
    }

    fn report_error(
        &self,
        name: &str,
        intended_at: DateTime<Utc>,
        message: &str,
        on_error: Option<&(dyn Fn(&Error, DateTime<Utc>) + Send + Sync)>,
    ) {
        let err = Error::job(name, message);
        if let Some(hook) = on_error {
            hook(&err, intended_at);
        } else {
            error!(name, error = %err, "job firing failed");
        }
    }
}
