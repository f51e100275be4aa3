//! Registry & Lifecycle: job registration, pause/resume, process-wide
//! start/pause/stop, graceful shutdown, and status/metrics queries.
//!
//! The job map is a `tokio::sync::Mutex<HashMap<..>>` rather than a
//! `RwLock` because `start` and `graceful_shutdown` must hold it across
//! `.await` points while mutating timer handles. Per spec, a job's
//! `scheduled` state (does it have an active timer?) and its `paused` flag
//! are orthogonal: `paused` survives a registry-wide `pause()`/`start()`
//! cycle untouched, so resuming the whole registry does not silently
//! re-arm a job an operator explicitly paused.

use crate::collection_cache;
use crate::config::CronOptions;
use crate::coordinator::Coordinator;
use crate::error::{Error, Result};
use crate::executor::JobFn;
use crate::schedule::{router, Schedule};
use crate::store::{HistoryRecord, RecordStore};
use crate::timer::{self, RecurringOptions, TimerHandle};
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, Notify, OnceCell};
use tracing::{info, warn};

/// A per-job error hook: `(error, intended_at)`, matching spec §3's
/// `onError` callback shape.
pub type OnErrorHook = dyn Fn(&Error, DateTime<Utc>) + Send + Sync;

/// Static configuration for one registered job.
#[derive(Clone)]
pub struct JobConfig {
    /// Unique job name.
    pub name: String,
    /// When this job should fire.
    pub schedule: Schedule,
    /// Optional per-firing execution timeout.
    pub timeout: Option<Duration>,
    /// Whether firings are coordinated through the record store (the
    /// default) or run unconditionally with no lease (`false`).
    pub persist: bool,
    /// Consecutive scheduling failures before this job's timer trips its
    /// circuit breaker.
    pub max_consecutive_failures: u32,
    /// Invoked with `(error, intended_at)` whenever this job's body fails.
    pub on_error: Option<Arc<OnErrorHook>>,
}

impl JobConfig {
    /// A config with `persist: true` and the timer's default failure budget.
    pub fn new(name: impl Into<String>, schedule: Schedule) -> Self {
        Self {
            name: name.into(),
            schedule,
            timeout: None,
            persist: true,
            max_consecutive_failures: timer::DEFAULT_MAX_CONSECUTIVE_FAILURES,
            on_error: None,
        }
    }

    /// Override the per-firing execution timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Override whether firings are coordinated through the record store.
    pub fn with_persist(mut self, persist: bool) -> Self {
        self.persist = persist;
        self
    }

    /// Override the circuit breaker's failure budget.
    pub fn with_max_consecutive_failures(mut self, max: u32) -> Self {
        self.max_consecutive_failures = max;
        self
    }

    /// Attach an error hook, called with `(error, intended_at)` on failure.
    pub fn with_on_error<F>(mut self, hook: F) -> Self
    where
        F: Fn(&Error, DateTime<Utc>) + Send + Sync + 'static,
    {
        self.on_error = Some(Arc::new(hook));
        self
    }
}

struct JobEntry {
    config: JobConfig,
    job: Arc<JobFn>,
    handle: Option<TimerHandle>,
    paused: bool,
}

impl JobEntry {
    fn is_scheduled(&self) -> bool {
        self.handle.as_ref().is_some_and(|h| !h.is_done())
    }
}

/// Per-job run statistics derived from its most recent history rows.
#[derive(Debug, Clone, Default)]
pub struct JobStats {
    /// Number of completed rows considered (capped at 100, newest first).
    pub total_runs: usize,
    /// Completed rows with no recorded error.
    pub success_count: usize,
    /// Completed rows with a recorded error.
    pub error_count: usize,
    /// Mean wall-clock duration across completed rows, in milliseconds.
    pub average_duration_ms: Option<f64>,
}

/// Full status snapshot for one job, per spec §4.G `getJobStatus`.
#[derive(Debug, Clone)]
pub struct JobStatusReport {
    /// Job name.
    pub name: String,
    /// Whether this job's timer is currently armed.
    pub is_scheduled: bool,
    /// Whether this job has been explicitly paused.
    pub is_paused: bool,
    /// The next instant this job would fire, if computable right now.
    pub next_run_at: Option<DateTime<Utc>>,
    /// The most recent history row for this job, if any.
    pub last_run: Option<HistoryRecord>,
    /// Aggregate stats over the most recent history rows.
    pub stats: JobStats,
}

/// Snapshot returned by [`Registry::health_check`].
#[derive(Debug, Clone)]
pub struct HealthStatus {
    /// `false` if any issue was found.
    pub healthy: bool,
    /// Number of jobs currently executing a firing.
    pub running_firings: usize,
    /// Total registered jobs.
    pub total_jobs: usize,
    /// Jobs whose timer has stopped itself (circuit broken).
    pub broken_jobs: Vec<String>,
    /// Human-readable description of each detected issue.
    pub issues: Vec<String>,
}

/// Snapshot returned by [`Registry::get_metrics`].
#[derive(Debug, Clone)]
pub struct Metrics {
    /// Whether the registry is currently running (`start`'d, not `pause`'d).
    pub is_running: bool,
    /// Total registered jobs.
    pub total_jobs: usize,
    /// Jobs with an armed timer.
    pub scheduled_jobs: usize,
    /// Jobs currently paused.
    pub paused_jobs: usize,
    /// Firings currently executing across all jobs.
    pub running_firings: usize,
}

/// Owns every registered job and coordinates their timers against one
/// [`RecordStore`].
pub struct Registry {
    jobs: Arc<Mutex<HashMap<String, JobEntry>>>,
    store: Arc<dyn RecordStore>,
    coordinator: Arc<Coordinator>,
    options: CronOptions,
    running: Arc<AtomicBool>,
    running_firings: Arc<AtomicUsize>,
    idle_notify: Arc<Notify>,
    broken: Arc<Mutex<Vec<String>>>,
    store_initialized: OnceCell<()>,
}

impl Registry {
    /// Build an empty registry backed by `store`, using default
    /// [`CronOptions`].
    pub fn new(store: Arc<dyn RecordStore>) -> Self {
        Self::with_options(store, CronOptions::default())
    }

    /// Build an empty registry backed by `store`, with explicit options
    /// governing the collection name/TTL and UTC-vs-local scheduling.
    pub fn with_options(store: Arc<dyn RecordStore>, options: CronOptions) -> Self {
        Self {
            jobs: Arc::new(Mutex::new(HashMap::new())),
            coordinator: Arc::new(Coordinator::new(store.clone())),
            store,
            options,
            running: Arc::new(AtomicBool::new(false)),
            running_firings: Arc::new(AtomicUsize::new(0)),
            idle_notify: Arc::new(Notify::new()),
            broken: Arc::new(Mutex::new(Vec::new())),
            store_initialized: OnceCell::new(),
        }
    }

    /// Register `job` under `config.name`. Errors if the name is already
    /// registered. If the registry is currently running, the job is
    /// immediately scheduled; otherwise it is armed on the next [`Self::
    /// start`].
    pub async fn add(&self, config: JobConfig, job: Box<JobFn>) -> Result<()> {
        let name = config.name.clone();
        {
            let mut jobs = self.jobs.lock().await;
            if jobs.contains_key(&name) {
                return Err(Error::job_already_exists(name));
            }
            jobs.insert(
                name.clone(),
                JobEntry {
                    config,
                    job: Arc::from(job),
                    handle: None,
                    paused: false,
                },
            );
        }
        if self.running.load(Ordering::SeqCst) {
            self.start_job(&name).await?;
        }
        Ok(())
    }

    /// Unregister `name`, cancelling its timer first if armed.
    pub async fn remove(&self, name: &str) -> Result<()> {
        let mut jobs = self.jobs.lock().await;
        let entry = jobs.remove(name).ok_or_else(|| Error::job_not_found(name))?;
        if let Some(handle) = entry.handle {
            handle.cancel();
        }
        Ok(())
    }

    /// Ensure the backing record store's unique and TTL indexes have been
    /// provisioned exactly once for this process, then arm every
    /// currently-unpaused job's timer. Idempotent.
    pub async fn start(&self) -> Result<()> {
        let collection_name = self.options.collection_name.clone();
        let ttl = self.options.effective_ttl();
        let store = self.store.clone();
        self.store_initialized
            .get_or_try_init(|| async move {
                collection_cache::get_or_init(&collection_name, ttl, || async move { Ok(store) }).await?;
                Ok::<(), Error>(())
            })
            .await?;

        self.running.store(true, Ordering::SeqCst);

        let names: Vec<String> = {
            let jobs = self.jobs.lock().await;
            jobs.iter()
                .filter(|(_, e)| !e.paused && !e.is_scheduled())
                .map(|(name, _)| name.clone())
                .collect()
        };
        for name in names {
            self.start_job(&name).await?;
        }
        Ok(())
    }

    /// Cancel every job's timer without unregistering anything or touching
    /// any job's `paused` flag. Jobs remain registered and can be rearmed
    /// with [`Self::start`].
    pub async fn pause(&self) -> Result<()> {
        self.running.store(false, Ordering::SeqCst);
        let mut jobs = self.jobs.lock().await;
        for entry in jobs.values_mut() {
            if let Some(handle) = entry.handle.take() {
                handle.cancel();
            }
        }
        Ok(())
    }

    /// Cancel every job's timer and discard all registered entries.
    pub async fn stop(&self) -> Result<()> {
        self.pause().await?;
        self.jobs.lock().await.clear();
        Ok(())
    }

    /// Cancel one job's timer and mark it paused, leaving it registered.
    pub async fn pause_job(&self, name: &str) -> Result<()> {
        let mut jobs = self.jobs.lock().await;
        let entry = jobs.get_mut(name).ok_or_else(|| Error::job_not_found(name))?;
        if let Some(handle) = entry.handle.take() {
            handle.cancel();
        }
        entry.paused = true;
        Ok(())
    }

    /// Clear one job's paused flag. Only re-arms its timer if the registry
    /// is currently running; otherwise it is armed on the next
    /// [`Self::start`].
    pub async fn resume_job(&self, name: &str) -> Result<()> {
        {
            let mut jobs = self.jobs.lock().await;
            let entry = jobs.get_mut(name).ok_or_else(|| Error::job_not_found(name))?;
            entry.paused = false;
        }
        if self.running.load(Ordering::SeqCst) {
            self.start_job(name).await?;
        }
        Ok(())
    }

    /// Whether `name` is currently paused. Returns `false` for unknown
    /// names rather than erroring.
    pub async fn is_job_paused(&self, name: &str) -> bool {
        self.jobs.lock().await.get(name).is_some_and(|e| e.paused)
    }

    /// Whether the registry is currently running (`start`'d, not `pause`'d
    /// or `stop`'d).
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Names of every currently-registered job.
    pub async fn get_job_names(&self) -> Vec<String> {
        self.jobs.lock().await.keys().cloned().collect()
    }

    /// Stop accepting new firings and wait for every firing already in
    /// flight to finish, then cancel all timers.
    pub async fn graceful_shutdown(&self, timeout: Duration) -> Result<()> {
        self.pause().await?;
        let wait = async {
            while self.running_firings.load(Ordering::SeqCst) > 0 {
                self.idle_notify.notified().await;
            }
        };
        if tokio::time::timeout(timeout, wait).await.is_err() {
            warn!(
                in_flight = self.running_firings.load(Ordering::SeqCst),
                "graceful shutdown timed out with firings still in flight"
            );
        } else {
            info!("graceful shutdown complete, no firings in flight");
        }
        Ok(())
    }

    /// Compute the next firing instant for `name` without arming anything.
    /// Returns `None`, never an error, both when `name` is not registered
    /// and when its schedule currently cannot produce a next instant (e.g.
    /// an impossible cron expression).
    pub async fn next_scheduled_at(&self, name: &str) -> Option<DateTime<Utc>> {
        let jobs = self.jobs.lock().await;
        let entry = jobs.get(name)?;
        router::next_after_in_zone(&entry.config.schedule, Utc::now(), self.options.utc).ok()
    }

    /// A full status snapshot for `name`, including recent-history stats.
    pub async fn get_job_status(&self, name: &str) -> Result<JobStatusReport> {
        let (schedule, is_scheduled, is_paused) = {
            let jobs = self.jobs.lock().await;
            let entry = jobs.get(name).ok_or_else(|| Error::job_not_found(name))?;
            (entry.config.schedule.clone(), entry.is_scheduled(), entry.paused)
        };

        let next_run_at = router::next_after_in_zone(&schedule, Utc::now(), self.options.utc).ok();
        let recent = self.store.find_recent(name, 100).await?;
        let last_run = recent.first().cloned();
        let stats = compute_stats(&recent);

        Ok(JobStatusReport {
            name: name.to_string(),
            is_scheduled,
            is_paused,
            next_run_at,
            last_run,
            stats,
        })
    }

    /// A status snapshot for every registered job.
    pub async fn get_all_job_statuses(&self) -> Result<Vec<JobStatusReport>> {
        let names = self.get_job_names().await;
        let mut out = Vec::with_capacity(names.len());
        for name in names {
            out.push(self.get_job_status(&name).await?);
        }
        Ok(out)
    }

    /// A point-in-time health snapshot across all registered jobs: jobs
    /// with no active timer while the registry is running, and jobs whose
    /// schedule currently cannot produce a next instant, are both reported
    /// as textual issues.
    pub async fn health_check(&self) -> HealthStatus {
        let running = self.running.load(Ordering::SeqCst);
        let jobs = self.jobs.lock().await;
        let broken = self.broken.lock().await.clone();
        let mut issues = Vec::new();

        for (name, entry) in jobs.iter() {
            if running && !entry.paused && !entry.is_scheduled() {
                issues.push(format!("job '{name}' has no active timer while the registry is running"));
            }
            if router::next_after_in_zone(&entry.config.schedule, Utc::now(), self.options.utc).is_err() {
                issues.push(format!("job '{name}' cannot compute its next scheduled instant"));
            }
        }

        HealthStatus {
            healthy: issues.is_empty(),
            running_firings: self.running_firings.load(Ordering::SeqCst),
            total_jobs: jobs.len(),
            broken_jobs: broken,
            issues,
        }
    }

    /// Aggregate counters across all registered jobs.
    pub async fn get_metrics(&self) -> Metrics {
        let jobs = self.jobs.lock().await;
        let scheduled = jobs.values().filter(|e| e.is_scheduled()).count();
        let paused = jobs.values().filter(|e| e.paused).count();
        Metrics {
            is_running: self.running.load(Ordering::SeqCst),
            total_jobs: jobs.len(),
            scheduled_jobs: scheduled,
            paused_jobs: paused,
            running_firings: self.running_firings.load(Ordering::SeqCst),
        }
    }

    async fn start_job(&self, name: &str) -> Result<()> {
        let (schedule, job, timeout, persist, max_consecutive_failures, on_error) = {
            let jobs = self.jobs.lock().await;
            let entry = jobs.get(name).ok_or_else(|| Error::job_not_found(name))?;
            (
                entry.config.schedule.clone(),
                entry.job.clone(),
                entry.config.timeout,
                entry.config.persist,
                entry.config.max_consecutive_failures,
                entry.config.on_error.clone(),
            )
        };

        let utc = self.options.utc;
        let next_fn_schedule = schedule.clone();
        let next_fn: Box<dyn Fn(DateTime<Utc>) -> Result<DateTime<Utc>> + Send + Sync> =
            Box::new(move |from| router::next_after_in_zone(&next_fn_schedule, from, utc));

        let coordinator = self.coordinator.clone();
        let running_firings = self.running_firings.clone();
        let idle_notify = self.idle_notify.clone();
        let job_name = name.to_string();

        let exec_fn_name = job_name.clone();
        let exec_fn: Box<
            dyn Fn(DateTime<Utc>) -> std::pin::Pin<Box<dyn std::future::Future<Output = Result<()>> + Send>>
                + Send
                + Sync,
        > = Box::new(move |intended_at| {
            let coordinator = coordinator.clone();
            let job = job.clone();
            let running_firings = running_firings.clone();
            let idle_notify = idle_notify.clone();
            let name = exec_fn_name.clone();
            let on_error = on_error.clone();
            Box::pin(async move {
                running_firings.fetch_add(1, Ordering::SeqCst);
                let result = coordinator
                    .run_firing(&name, intended_at, job.as_ref(), timeout, persist, on_error.as_deref())
                    .await;
                if running_firings.fetch_sub(1, Ordering::SeqCst) == 1 {
                    idle_notify.notify_waiters();
                }
                result
            })
        });

        let broken = self.broken.clone();
        let broken_name = job_name.clone();
        let opts = RecurringOptions {
            max_consecutive_failures,
            on_schedule: None,
            on_error: None,
            on_circuit_break: Some(Box::new(move |err| {
                warn!(job = %broken_name, error = %err, "job timer circuit broken");
                let broken = broken.clone();
                let broken_name = broken_name.clone();
                tokio::spawn(async move {
                    broken.lock().await.push(broken_name);
                });
            })),
        };

        let handle = timer::schedule_recurring(next_fn, exec_fn, opts);

        let mut jobs = self.jobs.lock().await;
        if let Some(entry) = jobs.get_mut(name) {
            entry.handle = Some(handle);
        }
        Ok(())
    }
}

fn compute_stats(recent: &[HistoryRecord]) -> JobStats {
    let completed: Vec<&HistoryRecord> = recent.iter().filter(|r| r.finished_at.is_some()).collect();
    let success_count = completed.iter().filter(|r| r.error.is_none()).count();
    let error_count = completed.iter().filter(|r| r.error.is_some()).count();

    let average_duration_ms = if completed.is_empty() {
        None
    } else {
        let total_ms: i64 = completed
            .iter()
            .map(|r| (r.finished_at.unwrap() - r.started_at).num_milliseconds())
            .sum();
        Some(total_ms as f64 / completed.len() as f64)
    };

    JobStats {
        total_runs: completed.len(),
        success_count,
        error_count,
        average_duration_ms,
    }
}
