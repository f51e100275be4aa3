//! Executor: run a job body with an optional timeout and report
//! success/error/duration/timeout.

use crate::error::{Error, Result};
use chrono::{DateTime, Utc};
use std::future::Future;
use std::pin::Pin;
use std::time::{Duration, Instant};

/// A job body: takes the intended firing instant and the job name, returns
/// an arbitrary JSON-serializable result or fails.
pub type JobFn = dyn Fn(DateTime<Utc>, String) -> JobFuture + Send + Sync;

/// The future type every job body must return.
pub type JobFuture = Pin<Box<dyn Future<Output = Result<serde_json::Value>> + Send>>;

/// Outcome of a single [`execute`] call.
#[derive(Debug, Clone)]
pub struct ExecutionResult {
    /// Whether the job body completed without error.
    pub success: bool,
    /// The job's return value, when `success` is true.
    pub result: Option<serde_json::Value>,
    /// The stringified error, when `success` is false.
    pub error: Option<String>,
    /// Wall-clock duration of the attempt.
    pub duration: Duration,
    /// `true` iff `error` is the timeout signal (never true for a normal
    /// job error or a plain success).
    pub timed_out: bool,
}

/// Run `job(intended_at, name)`, racing it against `timeout` when `Some` and
/// positive.
pub async fn execute(
    job: &JobFn,
    intended_at: DateTime<Utc>,
    name: &str,
    timeout: Option<Duration>,
    on_timeout: Option<&(dyn Fn(Duration) + Send + Sync)>,
) -> ExecutionResult {
    let start = Instant::now();
    let fut = job(intended_at, name.to_string());

    let outcome: std::result::Result<Result<serde_json::Value>, ()> = match timeout {
        Some(t) if t > Duration::ZERO => {
            tokio::pin!(fut);
            tokio::select! {
                res = &mut fut => Ok(res),
                _ = tokio::time::sleep(t) => Err(()),
            }
        }
        _ => Ok(fut.await),
    };

    let duration = start.elapsed();

    match outcome {
        Ok(Ok(value)) => ExecutionResult {
            success: true,
            result: Some(value),
            error: None,
            duration,
            timed_out: false,
        },
        Ok(Err(err)) => ExecutionResult {
            success: false,
            result: None,
            error: Some(err.to_string()),
            duration,
            timed_out: false,
        },
        Err(()) => {
            if let Some(hook) = on_timeout {
                hook(duration);
            }
            ExecutionResult {
                success: false,
                result: None,
                error: Some(
                    Error::JobTimedOut {
                        name: name.to_string(),
                        timeout_ms: timeout.expect("timeout branch only reached with Some(t)").as_millis() as u64,
                    }
                    .to_string(),
                ),
                duration,
                timed_out: true,
            }
        }
    }
}

/// Wrap `job` so that invoking it enforces `timeout`, rethrowing
/// [`Error::JobTimedOut`] on expiry rather than returning an
/// [`ExecutionResult`] — a convenience for callers that want a plain
/// fallible job function (e.g. the Coordinator's `persist: false` path).
pub fn with_timeout(job: Box<JobFn>, timeout: Duration) -> Box<JobFn> {
    Box::new(move |intended_at, name| {
        let fut = job(intended_at, name.clone());
        Box::pin(async move {
            tokio::pin!(fut);
            tokio::select! {
                res = &mut fut => res,
                _ = tokio::time::sleep(timeout) => Err(Error::JobTimedOut {
                    name,
                    timeout_ms: timeout.as_millis() as u64,
                }),
            }
        })
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use serde_json::json;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap()
    }

    #[tokio::test]
    async fn success_without_timeout() {
        let job: Box<JobFn> = Box::new(|_at, _name| Box::pin(async { Ok(json!({"ok": true})) }));
        let result = execute(job.as_ref(), now(), "j", None, None).await;
        assert!(result.success);
        assert!(!result.timed_out);
        assert_eq!(result.result, Some(json!({"ok": true})));
    }

    #[tokio::test]
    async fn job_error_is_not_a_timeout() {
        let job: Box<JobFn> = Box::new(|_at, name| {
            Box::pin(async move { Err(Error::job(name, "boom")) })
        });
        let result = execute(job.as_ref(), now(), "j", None, None).await;
        assert!(!result.success);
        assert!(!result.timed_out);
        assert!(result.error.unwrap().contains("boom"));
    }

    #[tokio::test(start_paused = true)]
    async fn timeout_fires_on_timeout_hook_and_reports_timed_out() {
        let hook_called = Arc::new(AtomicU32::new(0));
        let hook_called_clone = hook_called.clone();
        let on_timeout: Box<dyn Fn(Duration) + Send + Sync> =
            Box::new(move |_d| {
                hook_called_clone.fetch_add(1, Ordering::SeqCst);
            });

        let job: Box<JobFn> = Box::new(|_at, _name| {
            Box::pin(async {
                tokio::time::sleep(Duration::from_secs(60)).await;
                Ok(json!(null))
            })
        });

        let result = execute(
            job.as_ref(),
            now(),
            "slow-job",
            Some(Duration::from_millis(10)),
            Some(on_timeout.as_ref()),
        )
        .await;

        assert!(!result.success);
        assert!(result.timed_out);
        assert_eq!(hook_called.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn on_timeout_not_called_for_success_or_normal_error() {
        let hook_called = Arc::new(AtomicU32::new(0));
        let hook_called_clone = hook_called.clone();
        let on_timeout: Box<dyn Fn(Duration) + Send + Sync> =
            Box::new(move |_d| {
                hook_called_clone.fetch_add(1, Ordering::SeqCst);
            });

        let job: Box<JobFn> = Box::new(|_at, _name| Box::pin(async { Ok(json!(null)) }));
        let result = execute(
            job.as_ref(),
            now(),
            "fast-job",
            Some(Duration::from_secs(5)),
            Some(on_timeout.as_ref()),
        )
        .await;
        assert!(result.success);
        assert_eq!(hook_called.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn with_timeout_rethrows_on_expiry() {
        let job: Box<JobFn> = Box::new(|_at, _name| {
            Box::pin(async {
                tokio::time::sleep(Duration::from_secs(60)).await;
                Ok(json!(null))
            })
        });
        let wrapped = with_timeout(job, Duration::from_millis(10));
        let err = wrapped(now(), "wrapped".into()).await.unwrap_err();
        assert!(err.is_timeout());
    }
}
