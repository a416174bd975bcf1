//! Scheduler and executor behaviour with scripted fake sites

use crate::common::{create_test_config, fake_registry, fake_site, Behaviour, CallLog};
use chrono::Utc;
use job_harvester::config::{Config, SiteConfig};
use job_harvester::executor::CancelToken;
use job_harvester::state::PersistenceStore;
use job_harvester::storage::SqliteStorage;
use job_harvester::{HarvestError, Scheduler};
use std::collections::HashMap;
use std::time::Duration;
use tempfile::TempDir;

fn build(
    config: Config,
    script: HashMap<String, (Behaviour, Behaviour)>,
    log: &CallLog,
    cancel: &CancelToken,
) -> Scheduler {
    let state = PersistenceStore::open(&config.scheduler.state_path);
    let jobs = SqliteStorage::new_in_memory().unwrap();
    let registry = fake_registry(script, log);
    Scheduler::new(config, state, Box::new(jobs), &registry, cancel.clone()).unwrap()
}

/// Interrupts `times` times, one virtual second apart, after `delay`
fn interrupt_later(cancel: &CancelToken, delay: Duration, times: u32) -> tokio::task::JoinHandle<()> {
    let cancel = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(delay).await;
        for _ in 0..times {
            cancel.interrupt();
            tokio::time::sleep(Duration::from_secs(1)).await;
        }
    })
}

fn names(sites: &[&str]) -> Vec<String> {
    sites.iter().map(|s| s.to_string()).collect()
}

#[tokio::test]
async fn test_explicit_mode_runs_listed_sites_in_order() {
    let dir = TempDir::new().unwrap();
    let config = create_test_config(vec![fake_site("a", 3600), fake_site("b", 3600)], dir.path());
    let log = CallLog::default();
    let cancel = CancelToken::new();
    let mut scheduler = build(config, HashMap::new(), &log, &cancel);

    scheduler
        .run_specified(&names(&["b", "missing", "a"]))
        .await
        .unwrap();

    assert_eq!(log.entries(), vec!["b:preload", "b:crawl", "a:preload", "a:crawl"]);
    assert!(scheduler.state().get_execution("a").is_some());
    assert!(scheduler.state().get_execution("b").is_some());
}

#[tokio::test]
async fn test_preload_failure_skips_execute() {
    let dir = TempDir::new().unwrap();
    let config = create_test_config(vec![fake_site("a", 3600)], dir.path());
    let log = CallLog::default();
    let cancel = CancelToken::new();
    let script = HashMap::from([("a".to_string(), (Behaviour::Fail, Behaviour::Succeed))]);
    let mut scheduler = build(config, script, &log, &cancel);

    scheduler.run_specified(&names(&["a"])).await.unwrap();

    assert_eq!(log.entries(), vec!["a:preload"]);
    let state = scheduler.state().get("a");
    assert!(state.last_error.unwrap().contains("preload failed"));
    assert!(state.last_execution.is_none());
}

#[tokio::test]
async fn test_execute_failure_enters_error_wait() {
    let dir = TempDir::new().unwrap();
    let config = create_test_config(vec![fake_site("a", 60)], dir.path());
    let log = CallLog::default();
    let cancel = CancelToken::new();
    let script = HashMap::from([("a".to_string(), (Behaviour::Succeed, Behaviour::Fail))]);
    let mut scheduler = build(config, script, &log, &cancel);

    scheduler.run_specified(&names(&["a"])).await.unwrap();

    let rows = scheduler.status().unwrap();
    assert_eq!(rows[0].decision.status.to_string(), "Error Wait");
    assert!(rows[0].decision.seconds_remaining > 1700);
}

#[tokio::test(start_paused = true)]
async fn test_single_interrupt_only_skips_current_site() {
    let dir = TempDir::new().unwrap();
    let config = create_test_config(vec![fake_site("a", 3600), fake_site("b", 3600)], dir.path());
    let log = CallLog::default();
    let cancel = CancelToken::new();
    let script = HashMap::from([("a".to_string(), (Behaviour::Succeed, Behaviour::Hang))]);
    let mut scheduler = build(config, script, &log, &cancel);
    let interrupter = interrupt_later(&cancel, Duration::from_secs(5), 1);

    scheduler.run_specified(&names(&["a", "b"])).await.unwrap();
    interrupter.await.unwrap();

    assert_eq!(log.entries(), vec!["a:preload", "a:crawl", "b:preload", "b:crawl"]);
    let a = scheduler.state().get("a");
    assert!(a.last_execution.is_none());
    assert!(a.last_error.is_none(), "an interrupt is not a failure");
}

#[tokio::test(start_paused = true)]
async fn test_double_interrupt_stops_batch() {
    let dir = TempDir::new().unwrap();
    let config = create_test_config(vec![fake_site("a", 3600), fake_site("b", 3600)], dir.path());
    let log = CallLog::default();
    let cancel = CancelToken::new();
    let script = HashMap::from([("a".to_string(), (Behaviour::Hang, Behaviour::Succeed))]);
    let mut scheduler = build(config, script, &log, &cancel);
    let interrupter = interrupt_later(&cancel, Duration::from_secs(5), 2);

    scheduler.run_specified(&names(&["a", "b"])).await.unwrap();
    interrupter.await.unwrap();

    assert_eq!(log.entries(), vec!["a:preload"]);
}

#[tokio::test(start_paused = true)]
async fn test_run_all_runs_due_sites_then_idles() {
    let dir = TempDir::new().unwrap();
    let config = create_test_config(vec![fake_site("a", 3600), fake_site("b", 3600)], dir.path());
    let log = CallLog::default();
    let cancel = CancelToken::new();
    let mut scheduler = build(config, HashMap::new(), &log, &cancel);
    let interrupter = interrupt_later(&cancel, Duration::from_secs(30), 2);

    scheduler.run_all(false, None).await.unwrap();
    interrupter.await.unwrap();

    assert_eq!(log.entries(), vec!["a:preload", "a:crawl", "b:preload", "b:crawl"]);
}

#[tokio::test(start_paused = true)]
async fn test_failed_crawl_is_not_retried_during_cooldown() {
    let dir = TempDir::new().unwrap();
    let config = create_test_config(vec![fake_site("a", 60)], dir.path());
    let log = CallLog::default();
    let cancel = CancelToken::new();
    let script = HashMap::from([("a".to_string(), (Behaviour::Succeed, Behaviour::Fail))]);
    let mut scheduler = build(config, script, &log, &cancel);
    let interrupter = interrupt_later(&cancel, Duration::from_secs(30), 2);

    // the failed crawl puts the site into a 30 minute cooldown
    scheduler.run_all(false, None).await.unwrap();
    interrupter.await.unwrap();

    assert_eq!(log.entries(), vec!["a:preload", "a:crawl"]);
}

#[tokio::test(start_paused = true)]
async fn test_starting_at_runs_target_first() {
    let dir = TempDir::new().unwrap();
    let config = create_test_config(vec![fake_site("a", 3600), fake_site("b", 3600)], dir.path());
    let log = CallLog::default();
    let cancel = CancelToken::new();
    let mut scheduler = build(config, HashMap::new(), &log, &cancel);
    let interrupter = interrupt_later(&cancel, Duration::from_secs(30), 2);

    scheduler.run_all(false, Some("b".to_string())).await.unwrap();
    interrupter.await.unwrap();

    assert_eq!(log.entries(), vec!["b:preload", "b:crawl", "a:preload", "a:crawl"]);
    assert!(scheduler.state().resume_cursor().is_none());
}

#[tokio::test(start_paused = true)]
async fn test_interrupted_target_keeps_others_deferred() {
    let dir = TempDir::new().unwrap();
    let config = create_test_config(vec![fake_site("a", 3600), fake_site("b", 3600)], dir.path());
    let log = CallLog::default();
    let cancel = CancelToken::new();
    let script = HashMap::from([("b".to_string(), (Behaviour::Succeed, Behaviour::Hang))]);
    let mut scheduler = build(config, script, &log, &cancel);
    let single = interrupt_later(&cancel, Duration::from_secs(5), 1);
    let double = interrupt_later(&cancel, Duration::from_secs(20), 2);

    scheduler.run_all(false, Some("b".to_string())).await.unwrap();
    single.await.unwrap();
    double.await.unwrap();

    // b is retried straight away; a never gets a turn
    assert_eq!(log.entries(), vec!["b:preload", "b:crawl", "b:crawl"]);
    assert!(scheduler.state().get_execution("b").is_none());
    let cursor = scheduler.state().resume_cursor().unwrap();
    assert_eq!(cursor.site, "b");
}

#[tokio::test(start_paused = true)]
async fn test_failed_target_lifts_start_override() {
    let dir = TempDir::new().unwrap();
    let config = create_test_config(vec![fake_site("a", 3600), fake_site("b", 3600)], dir.path());
    let log = CallLog::default();
    let cancel = CancelToken::new();
    let script = HashMap::from([("b".to_string(), (Behaviour::Succeed, Behaviour::Fail))]);
    let mut scheduler = build(config, script, &log, &cancel);
    let interrupter = interrupt_later(&cancel, Duration::from_secs(30), 2);

    scheduler.run_all(false, Some("b".to_string())).await.unwrap();
    interrupter.await.unwrap();

    assert_eq!(log.entries(), vec!["b:preload", "b:crawl", "a:preload", "a:crawl"]);
    assert!(scheduler.state().resume_cursor().is_none());
}

#[tokio::test(start_paused = true)]
async fn test_single_idle_interrupt_keeps_scheduler_running() {
    let dir = TempDir::new().unwrap();
    let config = create_test_config(vec![fake_site("a", 3600)], dir.path());
    let log = CallLog::default();
    let cancel = CancelToken::new();
    let mut scheduler = build(config, HashMap::new(), &log, &cancel);
    let single = interrupt_later(&cancel, Duration::from_secs(30), 1);
    let double = interrupt_later(&cancel, Duration::from_secs(100), 2);

    let started = tokio::time::Instant::now();
    scheduler.run_all(false, None).await.unwrap();
    single.await.unwrap();
    double.await.unwrap();

    assert!(started.elapsed() >= Duration::from_secs(100));
    assert_eq!(log.entries(), vec!["a:preload", "a:crawl"]);
}

#[tokio::test]
async fn test_starting_at_unknown_site_is_an_error() {
    let dir = TempDir::new().unwrap();
    let config = create_test_config(vec![fake_site("a", 3600)], dir.path());
    let log = CallLog::default();
    let cancel = CancelToken::new();
    let mut scheduler = build(config, HashMap::new(), &log, &cancel);

    let err = scheduler
        .run_all(false, Some("nope".to_string()))
        .await
        .unwrap_err();
    assert!(matches!(err, HarvestError::UnknownSite(name) if name == "nope"));
    assert!(log.entries().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_wait_before_first_run_defers_new_sites() {
    let dir = TempDir::new().unwrap();
    let config = create_test_config(vec![fake_site("a", 3600), fake_site("b", 3600)], dir.path());
    let log = CallLog::default();
    let cancel = CancelToken::new();
    let mut scheduler = build(config, HashMap::new(), &log, &cancel);
    let interrupter = interrupt_later(&cancel, Duration::from_secs(30), 2);

    scheduler.run_all(true, None).await.unwrap();
    interrupter.await.unwrap();

    assert!(log.entries().is_empty());
    assert!(scheduler.state().get_execution("a").is_some());
    assert!(scheduler.state().get_execution("b").is_some());
}

#[tokio::test(start_paused = true)]
async fn test_site_flag_wait_before_first_run() {
    let dir = TempDir::new().unwrap();
    let mut patient = fake_site("a", 3600);
    patient.wait_before_first_run = true;
    let config = create_test_config(vec![patient, fake_site("b", 3600)], dir.path());
    let log = CallLog::default();
    let cancel = CancelToken::new();
    let mut scheduler = build(config, HashMap::new(), &log, &cancel);
    let interrupter = interrupt_later(&cancel, Duration::from_secs(30), 2);

    scheduler.run_all(false, None).await.unwrap();
    interrupter.await.unwrap();

    assert_eq!(log.entries(), vec!["b:preload", "b:crawl"]);
}

#[tokio::test(start_paused = true)]
async fn test_ignored_sites_are_not_scheduled() {
    let dir = TempDir::new().unwrap();
    let mut manual: SiteConfig = fake_site("manual", 60);
    manual.ignore_autoscheduling = true;
    let config = create_test_config(vec![manual, fake_site("auto", 3600)], dir.path());
    let log = CallLog::default();
    let cancel = CancelToken::new();
    let mut scheduler = build(config, HashMap::new(), &log, &cancel);
    let interrupter = interrupt_later(&cancel, Duration::from_secs(30), 2);

    scheduler.run_all(false, None).await.unwrap();
    interrupter.await.unwrap();

    assert_eq!(log.entries(), vec!["auto:preload", "auto:crawl"]);
}

#[tokio::test]
async fn test_nothing_schedulable_returns() {
    let dir = TempDir::new().unwrap();
    let mut manual = fake_site("manual", 60);
    manual.ignore_autoscheduling = true;
    let config = create_test_config(vec![manual], dir.path());
    let log = CallLog::default();
    let cancel = CancelToken::new();
    let mut scheduler = build(config, HashMap::new(), &log, &cancel);

    scheduler.run_all(false, None).await.unwrap();
    assert!(log.entries().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_close_session_after_run() {
    let dir = TempDir::new().unwrap();
    let mut closing = fake_site("a", 3600);
    closing.close_session_after_run = true;
    let config = create_test_config(vec![closing, fake_site("b", 3600)], dir.path());
    let log = CallLog::default();
    let cancel = CancelToken::new();
    let mut scheduler = build(config, HashMap::new(), &log, &cancel);
    let interrupter = interrupt_later(&cancel, Duration::from_secs(30), 2);

    scheduler.run_all(false, None).await.unwrap();
    interrupter.await.unwrap();

    assert_eq!(
        log.entries(),
        vec!["a:preload", "a:crawl", "a:close", "b:preload", "b:crawl"]
    );
}

#[tokio::test(start_paused = true)]
async fn test_persisted_state_decides_what_is_due() {
    let dir = TempDir::new().unwrap();
    let config = create_test_config(
        vec![fake_site("s1", 7200), fake_site("s2", 3600), fake_site("s3", 3600)],
        dir.path(),
    );
    {
        let mut state = PersistenceStore::open(&config.scheduler.state_path);
        let now = Utc::now();
        state.record_execution("s1", Some(now - chrono::Duration::seconds(8000)));
        state.record_execution("s2", Some(now - chrono::Duration::seconds(1000)));
    }
    let log = CallLog::default();
    let cancel = CancelToken::new();
    let mut scheduler = build(config, HashMap::new(), &log, &cancel);

    let rows = scheduler.status().unwrap();
    assert_eq!(rows[0].decision.status.to_string(), "Ready");
    assert_eq!(rows[1].decision.status.to_string(), "Pending");
    assert!((2590..=2600).contains(&rows[1].decision.seconds_remaining));
    assert_eq!(rows[2].decision.status.to_string(), "Ready");

    let interrupter = interrupt_later(&cancel, Duration::from_secs(30), 2);
    scheduler.run_all(false, None).await.unwrap();
    interrupter.await.unwrap();

    assert_eq!(
        log.entries(),
        vec!["s1:preload", "s1:crawl", "s3:preload", "s3:crawl"]
    );
}

#[test]
fn test_unknown_kind_fails_construction() {
    let dir = TempDir::new().unwrap();
    let mut odd = fake_site("odd", 60);
    odd.kind = Some("browser".to_string());
    let config = create_test_config(vec![odd], dir.path());
    let log = CallLog::default();

    let state = PersistenceStore::open(&config.scheduler.state_path);
    let registry = crate::common::fake_registry(HashMap::new(), &log);
    let result = Scheduler::new(
        config,
        state,
        Box::new(SqliteStorage::new_in_memory().unwrap()),
        &registry,
        CancelToken::new(),
    );
    assert!(matches!(
        result,
        Err(HarvestError::UnknownImplementation { .. })
    ));
}
