//! End-to-end scenarios spanning schedule routing through to execution.

use chrono::{TimeZone, Utc};
use cronsync::schedule::{router, Schedule, Unit};
use cronsync::store::memory::MemoryStore;
use cronsync::registry::{JobConfig, Registry};
use cronsync::executor::JobFn;
use serde_json::json;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

fn dt(y: i32, mo: u32, d: u32, h: u32, mi: u32, s: u32) -> chrono::DateTime<Utc> {
    Utc.with_ymd_and_hms(y, mo, d, h, mi, s).unwrap()
}

#[test]
fn aligned_quarter_hour_routes_through_schedule() {
    let schedule = Schedule::Interval { every: 15, unit: Unit::Minutes, aligned: true };
    let next = router::next_after(&schedule, dt(2025, 1, 15, 10, 7, 30)).unwrap();
    assert_eq!(next, dt(2025, 1, 15, 10, 15, 0));
}

#[test]
fn daily_rollover_routes_through_schedule() {
    let schedule = Schedule::Daily { at: "09:00".into() };
    let next = router::next_after(&schedule, dt(2025, 1, 15, 10, 0, 0)).unwrap();
    assert_eq!(next, dt(2025, 1, 16, 9, 0, 0));
}

#[test]
fn cron_weekday_hop_routes_through_schedule() {
    let schedule = Schedule::Cron { expr: "0 9 * * MON-FRI".into() };
    let next = router::next_after(&schedule, dt(2025, 1, 18, 10, 0, 0)).unwrap();
    assert_eq!(next, dt(2025, 1, 20, 9, 0, 0));
}

#[test]
fn cron_or_logic_routes_through_schedule() {
    let schedule = Schedule::Cron { expr: "0 9 15 * MON".into() };
    let next = router::next_after(&schedule, dt(2025, 1, 10, 10, 0, 0)).unwrap();
    assert_eq!(next, dt(2025, 1, 13, 9, 0, 0));
}

#[test]
fn impossible_schedule_propagates_through_router() {
    let schedule = Schedule::Cron { expr: "0 9 30 2 *".into() };
    let err = router::next_after(&schedule, dt(2025, 1, 1, 0, 0, 0)).unwrap_err();
    assert!(matches!(err, cronsync::Error::ImpossibleSchedule(_)));
}

#[tokio::test(start_paused = true)]
async fn registered_job_executes_and_is_recorded() {
    let store = Arc::new(MemoryStore::new());
    let registry = Registry::new(store.clone());

    let runs = Arc::new(AtomicU32::new(0));
    let runs_clone = runs.clone();
    let job: Box<JobFn> = Box::new(move |_at, _name| {
        let runs = runs_clone.clone();
        Box::pin(async move {
            runs.fetch_add(1, Ordering::SeqCst);
            Ok(json!({"tick": true}))
        })
    });

    let schedule = Schedule::Interval { every: 1, unit: Unit::Minutes, aligned: false };
    registry.add(JobConfig::new("heartbeat", schedule), job).await.unwrap();
    registry.start().await.unwrap();

    tokio::time::sleep(Duration::from_secs(125)).await;
    tokio::task::yield_now().await;

    assert!(runs.load(Ordering::SeqCst) >= 2);
    let recorded = store.find_recent("heartbeat", 10).await.unwrap();
    assert!(recorded.len() >= 2);

    registry.graceful_shutdown(Duration::from_secs(5)).await.unwrap();
}
