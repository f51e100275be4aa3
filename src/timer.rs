//! Timer Engine: a self-healing recurring timer with input validation,
//! `MAX_DELAY` clamping, and a circuit breaker.
//!
//! Callbacks are boxed `Fn` trait objects returning futures, so both
//! closures and `async move` blocks work without an extra abstraction
//! layer.

use crate::error::{Error, Result};
use chrono::{DateTime, Timelike, Utc};
use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration as StdDuration;
use tokio::sync::Notify;
use tracing::{debug, error, warn};

/// Hard cap on a single scheduled delay, matching the source's `2^31 - 1` ms
/// (~24.8 days) — the maximum delay a standard timer API accepts.
pub const MAX_DELAY_MS: i64 = 2_147_483_647;

/// Default number of consecutive scheduling failures before the circuit
/// breaker trips.
pub const DEFAULT_MAX_CONSECUTIVE_FAILURES: u32 = 3;

type NextFn = dyn Fn(DateTime<Utc>) -> Result<DateTime<Utc>> + Send + Sync;
type ExecFn = dyn Fn(DateTime<Utc>) -> Pin<Box<dyn Future<Output = Result<()>> + Send>> + Send + Sync;
type ScheduleHook = dyn Fn(DateTime<Utc>) + Send + Sync;
type ErrorHook = dyn Fn(&Error) + Send + Sync;
type CircuitHook = dyn Fn(&Error) + Send + Sync;

/// Options for [`schedule_recurring`].
pub struct RecurringOptions {
    /// Consecutive scheduling failures before the breaker trips.
    pub max_consecutive_failures: u32,
    /// Called with the computed next-run instant whenever scheduling succeeds.
    pub on_schedule: Option<Box<ScheduleHook>>,
    /// Called with the failure whenever a scheduling or execution step errors.
    pub on_error: Option<Box<ErrorHook>>,
    /// Called once, with the final error, when the circuit breaker trips.
    pub on_circuit_break: Option<Box<CircuitHook>>,
}

impl Default for RecurringOptions {
    fn default() -> Self {
        Self {
            max_consecutive_failures: DEFAULT_MAX_CONSECUTIVE_FAILURES,
            on_schedule: None,
            on_error: None,
            on_circuit_break: None,
        }
    }
}

/// A cancellable handle to a running recurring timer or a pending one-shot.
#[derive(Clone)]
pub struct TimerHandle {
    done: Arc<AtomicBool>,
    cancel_notify: Arc<Notify>,
}

impl TimerHandle {
    /// Cancel the timer. Idempotent — cancelling twice is a no-op the second time.
    pub fn cancel(&self) {
        if !self.done.swap(true, Ordering::SeqCst) {
            self.cancel_notify.notify_waiters();
        }
    }

    /// Whether the timer has stopped (cancelled, or circuit-broken).
    pub fn is_done(&self) -> bool {
        self.done.load(Ordering::SeqCst)
    }
}

/// Start a recurring timer: at each iteration, compute the next run instant
/// via `next_fn`, sleep until it (clamping long delays to [`MAX_DELAY_MS`]
/// without executing), then invoke `exec_fn` with the zeroed-milliseconds
/// intended instant.
pub fn schedule_recurring(
    next_fn: Box<NextFn>,
    exec_fn: Box<ExecFn>,
    opts: RecurringOptions,
) -> TimerHandle {
    let done = Arc::new(AtomicBool::new(false));
    let cancel_notify = Arc::new(Notify::new());
    let handle = TimerHandle {
        done: done.clone(),
        cancel_notify: cancel_notify.clone(),
    };

    tokio::spawn(run_recurring_loop(next_fn, exec_fn, opts, done, cancel_notify));

    handle
}

async fn run_recurring_loop(
    next_fn: Box<NextFn>,
    exec_fn: Box<ExecFn>,
    opts: RecurringOptions,
    done: Arc<AtomicBool>,
    cancel_notify: Arc<Notify>,
) {
    let consecutive_failures = AtomicU32::new(0);

    loop {
        if done.load(Ordering::SeqCst) {
            return;
        }

        let step = compute_next_run(next_fn.as_ref());

        let next_run = match step {
            Ok(next_run) => {
                consecutive_failures.store(0, Ordering::SeqCst);
                if let Some(hook) = &opts.on_schedule {
                    hook(next_run);
                }
                next_run
            }
            Err(err) => {
                if let Some(hook) = &opts.on_error {
                    hook(&err);
                }
                let failures = consecutive_failures.fetch_add(1, Ordering::SeqCst) + 1;
                warn!(failures, error = %err, "cron timer scheduling failure");

                if failures >= opts.max_consecutive_failures {
                    done.store(true, Ordering::SeqCst);
                    error!(failures, "cron timer circuit broken");
                    if let Some(hook) = &opts.on_circuit_break {
                        hook(&err);
                    }
                    return;
                }

                let backoff_ms = (10u64.saturating_mul(1u64 << (failures.saturating_sub(1)))).min(60_000);
                if wait_or_cancel(StdDuration::from_millis(backoff_ms), &cancel_notify, &done).await {
                    return;
                }
                continue;
            }
        };

        let delay_ms = (next_run - Utc::now()).num_milliseconds().max(0);

        if delay_ms > MAX_DELAY_MS {
            debug!(delay_ms, "cron timer clamping long delay");
            if wait_or_cancel(StdDuration::from_millis(MAX_DELAY_MS as u64), &cancel_notify, &done).await {
                return;
            }
            continue;
        }

        if wait_or_cancel(StdDuration::from_millis(delay_ms as u64), &cancel_notify, &done).await {
            return;
        }

        let intended_at = next_run
            .with_nanosecond(0)
            .expect("zeroing nanoseconds on a valid DateTime cannot fail");

        if let Err(err) = exec_fn(intended_at).await {
            if let Some(hook) = &opts.on_error {
                hook(&err);
            }
        }
    }
}

fn compute_next_run(next_fn: &NextFn) -> Result<DateTime<Utc>> {
    let now = Utc::now();
    let next_run = next_fn(now)?;
    if next_run <= now {
        return Err(Error::scheduling_failure(
            "next_fn returned an instant not strictly after now",
        ));
    }
    Ok(next_run)
}

/// Sleep for `duration`, returning `true` if cancelled before it elapsed.
async fn wait_or_cancel(duration: StdDuration, cancel_notify: &Notify, done: &AtomicBool) -> bool {
    tokio::select! {
        _ = tokio::time::sleep(duration) => done.load(Ordering::SeqCst),
        _ = cancel_notify.notified() => true,
    }
}

/// Arm a single-shot timer after `delay`.
/// Errors from `fn_` are caught and logged, never propagated.
pub fn schedule_once(
    delay: StdDuration,
    fn_: Box<dyn FnOnce() -> Pin<Box<dyn Future<Output = Result<()>> + Send>> + Send>,
) -> Result<TimerHandle> {
    if delay.as_millis() as i64 > MAX_DELAY_MS {
        return Err(Error::scheduling_failure("delay exceeds MAX_DELAY"));
    }

    let done = Arc::new(AtomicBool::new(false));
    let cancel_notify = Arc::new(Notify::new());
    let handle = TimerHandle {
        done: done.clone(),
        cancel_notify: cancel_notify.clone(),
    };

    let done_task = done.clone();
    let cancel_task = cancel_notify.clone();
    tokio::spawn(async move {
        if wait_or_cancel(delay, &cancel_task, &done_task).await {
            return;
        }
        done_task.store(true, Ordering::SeqCst);
        if let Err(err) = fn_().await {
            error!(error = %err, "scheduleOnce callback failed");
        }
    });

    Ok(handle)
}
