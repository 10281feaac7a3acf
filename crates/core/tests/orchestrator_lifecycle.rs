//! Orchestrator lifecycle integration tests.
//!
//! These tests drive jobs through the orchestrator against a scripted
//! provider and real SQLite stores:
//! pending -> running -> (paused -> pending -> running) -> completed / cancelled / failed

use std::sync::Arc;
use std::time::Duration;

use chrono::NaiveDate;
use tempfile::TempDir;

use harvester_core::{
    testing::{fixtures, FailingCheckpointStore, MockProvider, MockResponse},
    ArtifactCache, ArtifactKey, CheckpointStore, CreateJobRequest, DocumentProvider, FetchClient,
    FileSnapshot, ItemOutcome, ItemStatus, JobOrchestrator, JobStatus, JobStore,
    OrchestratorConfig, OrchestratorError, Period, PeriodResolver, ProgressEventKind,
    Provenance, SnapshotBackend, SqliteCheckpointStore, SqliteJobStore,
};

/// Candidates resolve from 2025-05-15: [2025Q1, 2024Q4, 2024Q3, ...].
fn reference_date() -> NaiveDate {
    NaiveDate::from_ymd_opt(2025, 5, 15).unwrap()
}

fn p1() -> Period {
    fixtures::period(2025, 1)
}

fn p2() -> Period {
    fixtures::period(2024, 4)
}

/// Test helper to create all dependencies for orchestrator testing.
struct TestHarness {
    job_store: Arc<SqliteJobStore>,
    checkpoints: Arc<SqliteCheckpointStore>,
    provider: Arc<MockProvider>,
    cache: Arc<ArtifactCache>,
    temp_dir: TempDir,
}

impl TestHarness {
    fn new() -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let db_path = temp_dir.path().join("test.db");

        let job_store =
            Arc::new(SqliteJobStore::new(&db_path).expect("Failed to create job store"));
        let checkpoints = Arc::new(
            SqliteCheckpointStore::new(&db_path).expect("Failed to create checkpoint store"),
        );
        let backend = Arc::new(FileSnapshot::new(temp_dir.path().join("cache.jsonl")));
        let cache = Arc::new(ArtifactCache::load(backend));

        Self {
            job_store,
            checkpoints,
            provider: Arc::new(MockProvider::new()),
            cache,
            temp_dir,
        }
    }

    fn orchestrator(&self, config: OrchestratorConfig) -> JobOrchestrator {
        self.orchestrator_with_checkpoints(
            config,
            Arc::clone(&self.checkpoints) as Arc<dyn CheckpointStore>,
        )
    }

    fn orchestrator_with_checkpoints(
        &self,
        config: OrchestratorConfig,
        checkpoints: Arc<dyn CheckpointStore>,
    ) -> JobOrchestrator {
        let fetch_client = FetchClient::new(
            Arc::clone(&self.provider) as Arc<dyn DocumentProvider>,
            Duration::from_secs(2),
        );
        let horizon = config.horizon;
        JobOrchestrator::new(
            config,
            Arc::clone(&self.job_store) as Arc<dyn JobStore>,
            checkpoints,
            Arc::clone(&self.cache),
            fetch_client,
        )
        .with_resolver(PeriodResolver::new(horizon).with_reference_date(reference_date()))
    }

    fn request(&self, items: &[&str]) -> CreateJobRequest {
        CreateJobRequest::new(items, None, false).expect("valid request")
    }

    fn status(&self, job_id: &str) -> JobStatus {
        self.job_store.get(job_id).unwrap().unwrap().status
    }

    async fn wait_for_status(&self, job_id: &str, expected: JobStatus, timeout: Duration) -> bool {
        let start = std::time::Instant::now();
        while start.elapsed() < timeout {
            if self.status(job_id) == expected {
                return true;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        false
    }
}

fn sorted(mut items: Vec<harvester_core::Item>) -> Vec<harvester_core::Item> {
    items.sort();
    items
}

// =============================================================================
// Scheduling and per-item search
// =============================================================================

#[tokio::test]
async fn test_two_item_scenario_completes() {
    let harness = TestHarness::new();
    let a = fixtures::item("A");
    let b = fixtures::item("B");
    // A@P1 is unscripted, so NotFound
    harness
        .provider
        .script(&a, p2(), vec![MockResponse::document("A for P2")]);
    harness
        .provider
        .script(&b, p1(), vec![MockResponse::document("B for P1")]);

    let orchestrator = harness.orchestrator(fixtures::fast_orchestrator_config());
    let job = orchestrator.create_job(harness.request(&["A", "B"])).unwrap();

    assert_eq!(orchestrator.run_next().await.unwrap(), Some(job.id.clone()));

    let done = orchestrator.get_job(&job.id).unwrap();
    assert_eq!(done.status, JobStatus::Completed);
    assert_eq!(sorted(done.progress.processed.clone()), vec![a.clone(), b.clone()]);
    assert!(done.progress.failed.is_empty());
    assert!(done.progress.skipped.is_empty());
    assert_eq!(done.progress.current, 2);
    assert!(done.completed_at.is_some());

    let outcome_a = done.results.iter().find(|o| o.item == a).unwrap();
    assert_eq!(outcome_a.period, Some(p2()));
    let outcome_b = done.results.iter().find(|o| o.item == b).unwrap();
    assert_eq!(outcome_b.period, Some(p1()));

    assert_eq!(harness.provider.calls_for(&a), vec![p1(), p2()]);
    assert_eq!(harness.provider.calls_for(&b), vec![p1()]);
}

#[tokio::test]
async fn test_cached_items_are_skipped_without_fetching() {
    let harness = TestHarness::new();
    harness
        .cache
        .set(fixtures::live_artifact("A", p2(), "cached body"), false);
    harness
        .provider
        .script(&fixtures::item("B"), p1(), vec![MockResponse::document("B")]);

    let orchestrator = harness.orchestrator(fixtures::fast_orchestrator_config());
    let job = orchestrator.create_job(harness.request(&["A", "B"])).unwrap();
    orchestrator.run_next().await.unwrap();

    let progress = orchestrator.get_progress(&job.id).unwrap();
    assert_eq!(progress.status, JobStatus::Completed);
    assert_eq!(progress.skipped, vec![fixtures::item("A")]);
    assert_eq!(progress.processed, vec![fixtures::item("B")]);
    assert_eq!(progress.current, 1);
    assert!(harness.provider.calls_for(&fixtures::item("A")).is_empty());
}

#[tokio::test]
async fn test_exhausted_item_fails_without_failing_job() {
    let harness = TestHarness::new();
    harness
        .provider
        .script(&fixtures::item("B"), p1(), vec![MockResponse::document("B")]);

    let orchestrator = harness.orchestrator(fixtures::fast_orchestrator_config());
    let job = orchestrator.create_job(harness.request(&["A", "B"])).unwrap();
    orchestrator.run_next().await.unwrap();

    let done = orchestrator.get_job(&job.id).unwrap();
    assert_eq!(done.status, JobStatus::Completed);
    assert!(done.error.is_none());
    assert_eq!(done.progress.failed, vec![fixtures::item("A")]);
    assert_eq!(done.progress.current, 2);

    let failed = done
        .results
        .iter()
        .find(|o| o.status == ItemStatus::Failed)
        .unwrap();
    assert!(failed.error.as_deref().unwrap().contains("not found"));
}

#[tokio::test]
async fn test_explicit_periods_bypass_resolver() {
    let harness = TestHarness::new();
    let a = fixtures::item("A");
    let old = fixtures::period(2019, 3);
    harness
        .provider
        .script(&a, old, vec![MockResponse::document("old filing")]);

    let orchestrator = harness.orchestrator(fixtures::fast_orchestrator_config());
    let request = CreateJobRequest::new(&["a"], Some(vec![old]), false).unwrap();
    let job = orchestrator.create_job(request).unwrap();
    orchestrator.run_next().await.unwrap();

    assert_eq!(harness.status(&job.id), JobStatus::Completed);
    assert_eq!(harness.provider.calls_for(&a), vec![old]);
}

#[tokio::test]
async fn test_concurrent_fetches_never_exceed_worker_bound() {
    let harness = TestHarness::new();
    harness
        .provider
        .set_default_delay(Duration::from_millis(30));
    let names = ["A", "B", "C", "D", "E", "F", "G", "H"];
    for name in names {
        harness.provider.script(
            &fixtures::item(name),
            p1(),
            vec![MockResponse::document(format!("{} body", name))],
        );
    }

    let config = OrchestratorConfig {
        batch_size: 4,
        max_concurrent_fetches: 2,
        ..fixtures::fast_orchestrator_config()
    };
    let orchestrator = harness.orchestrator(config);
    let job = orchestrator.create_job(harness.request(&names)).unwrap();
    orchestrator.run_next().await.unwrap();

    assert_eq!(harness.status(&job.id), JobStatus::Completed);
    assert_eq!(harness.provider.call_count(), 8);
    assert!(harness.provider.max_in_flight() <= 2);
    assert!(harness.provider.max_in_flight() >= 1);
}

#[tokio::test]
async fn test_jobs_run_in_creation_order() {
    let harness = TestHarness::new();
    let orchestrator = harness.orchestrator(fixtures::fast_orchestrator_config());
    let first = orchestrator.create_job(harness.request(&["A"])).unwrap();
    let second = orchestrator.create_job(harness.request(&["B"])).unwrap();

    assert_eq!(orchestrator.run_next().await.unwrap(), Some(first.id));
    assert_eq!(harness.status(&second.id), JobStatus::Pending);
    assert_eq!(orchestrator.run_next().await.unwrap(), Some(second.id));
    assert_eq!(orchestrator.run_next().await.unwrap(), None);
}

// =============================================================================
// Checkpoint and resumability
// =============================================================================

#[tokio::test]
async fn test_restart_after_batch_k_refetches_nothing_done() {
    let harness = TestHarness::new();
    let names = ["A", "B", "C", "D", "E"];
    for name in names {
        harness.provider.script(
            &fixtures::item(name),
            p1(),
            vec![MockResponse::document(format!("{} body", name))],
        );
    }

    // Simulate a process that died after checkpointing the first batch
    let job = harness.job_store.create(harness.request(&names)).unwrap();
    harness
        .job_store
        .transition(&job.id, &[JobStatus::Pending], JobStatus::Running, None)
        .unwrap();
    let first_batch: Vec<ItemOutcome> = ["A", "B"]
        .iter()
        .map(|name| {
            ItemOutcome::success(
                fixtures::item(name),
                p1(),
                Provenance::Live {
                    provider: "mock".to_string(),
                },
                1,
            )
        })
        .collect();
    harness.checkpoints.record_batch(&job.id, &first_batch).unwrap();

    let orchestrator = harness.orchestrator(fixtures::fast_orchestrator_config());
    assert_eq!(orchestrator.recover().unwrap(), vec![job.id.clone()]);
    assert_eq!(harness.status(&job.id), JobStatus::Pending);

    orchestrator.run_next().await.unwrap();

    let done = orchestrator.get_job(&job.id).unwrap();
    assert_eq!(done.status, JobStatus::Completed);
    assert_eq!(done.progress.total, 5);
    assert_eq!(done.progress.current, 5);
    assert_eq!(done.results.len(), 5);
    assert!(harness.provider.calls_for(&fixtures::item("A")).is_empty());
    assert!(harness.provider.calls_for(&fixtures::item("B")).is_empty());
    assert_eq!(harness.provider.call_count(), 3);
}

#[tokio::test]
async fn test_pause_at_batch_boundary_then_resume() {
    let harness = TestHarness::new();
    let names = ["A", "B", "C", "D", "E", "F"];
    for name in names {
        harness.provider.script(
            &fixtures::item(name),
            p1(),
            vec![MockResponse::document(format!("{} body", name))],
        );
    }

    let config = OrchestratorConfig {
        inter_batch_delay_ms: 300,
        ..fixtures::fast_orchestrator_config()
    };
    let orchestrator = Arc::new(harness.orchestrator(config));
    let mut events = orchestrator.subscribe();
    let job = orchestrator.create_job(harness.request(&names)).unwrap();

    let runner = Arc::clone(&orchestrator);
    let run = tokio::spawn(async move { runner.run_next().await });

    // Pause as soon as the first batch is recorded
    loop {
        let event = events.recv().await.unwrap();
        if event.kind == ProgressEventKind::BatchFinished {
            assert_eq!(event.snapshot.current, 2);
            break;
        }
    }
    assert!(orchestrator.pause(&job.id).unwrap());
    assert!(!orchestrator.pause(&job.id).unwrap());
    run.await.unwrap().unwrap();

    let paused = orchestrator.get_progress(&job.id).unwrap();
    assert_eq!(paused.status, JobStatus::Paused);
    assert_eq!(paused.current, 2);
    assert_eq!(harness.provider.call_count(), 2);

    assert!(orchestrator.resume(&job.id).unwrap());
    assert!(!orchestrator.resume(&job.id).unwrap());
    assert_eq!(harness.status(&job.id), JobStatus::Pending);

    orchestrator.run_next().await.unwrap();
    let done = orchestrator.get_progress(&job.id).unwrap();
    assert_eq!(done.status, JobStatus::Completed);
    assert_eq!(done.total, 6);
    assert_eq!(done.current, 6);
    // Every item fetched exactly once across both runs
    assert_eq!(harness.provider.call_count(), 6);
}

#[tokio::test]
async fn test_failed_items_are_not_refetched_after_restart() {
    let harness = TestHarness::new();
    let a = fixtures::item("A");
    let b = fixtures::item("B");

    // A process died after checkpointing A as failed, before B ran
    let job = harness.job_store.create(harness.request(&["A", "B"])).unwrap();
    harness
        .job_store
        .transition(&job.id, &[JobStatus::Pending], JobStatus::Running, None)
        .unwrap();
    harness
        .checkpoints
        .record_batch(&job.id, &[ItemOutcome::failed(a.clone(), "exhausted", 2)])
        .unwrap();
    let checkpoint = harness.checkpoints.load(&job.id).unwrap();
    assert!(checkpoint.done_items.is_empty());
    assert!(checkpoint.is_settled(&a));

    harness
        .provider
        .script(&a, p2(), vec![MockResponse::document("late filing")]);
    harness
        .provider
        .script(&b, p1(), vec![MockResponse::document("B body")]);

    let orchestrator = harness.orchestrator(fixtures::fast_orchestrator_config());
    orchestrator.recover().unwrap();
    orchestrator.run_next().await.unwrap();

    let done = orchestrator.get_job(&job.id).unwrap();
    assert_eq!(done.status, JobStatus::Completed);
    assert_eq!(done.progress.failed, vec![a.clone()]);
    assert_eq!(done.progress.processed, vec![b]);
    assert_eq!(done.progress.current, 2);
    assert!(harness.provider.calls_for(&a).is_empty());
}

#[tokio::test]
async fn test_progress_never_drops_across_pause_and_resume() {
    let harness = TestHarness::new();
    let a = fixtures::item("A");
    // A is never found; the rest resolve on the first candidate
    for name in ["B", "C", "D"] {
        harness.provider.script(
            &fixtures::item(name),
            p1(),
            vec![MockResponse::document(format!("{} body", name))],
        );
    }

    let config = OrchestratorConfig {
        inter_batch_delay_ms: 300,
        ..fixtures::fast_orchestrator_config()
    };
    let orchestrator = Arc::new(harness.orchestrator(config));
    let mut events = orchestrator.subscribe();
    let job = orchestrator
        .create_job(harness.request(&["A", "B", "C", "D"]))
        .unwrap();

    let runner = Arc::clone(&orchestrator);
    let run = tokio::spawn(async move { runner.run_next().await });
    loop {
        if events.recv().await.unwrap().kind == ProgressEventKind::BatchFinished {
            break;
        }
    }
    assert!(orchestrator.pause(&job.id).unwrap());
    run.await.unwrap().unwrap();

    let paused = orchestrator.get_progress(&job.id).unwrap();
    assert_eq!(paused.status, JobStatus::Paused);
    assert_eq!(paused.current, 2);
    assert_eq!(paused.failed, vec![a.clone()]);
    let calls_before_resume = harness.provider.calls_for(&a).len();

    assert!(orchestrator.resume(&job.id).unwrap());
    let runner = Arc::clone(&orchestrator);
    let run = tokio::spawn(async move { runner.run_next().await });

    let mut lowest = usize::MAX;
    while !run.is_finished() {
        let progress = orchestrator.get_progress(&job.id).unwrap();
        lowest = lowest.min(progress.current);
        assert!(progress.failed.contains(&a), "{:?}", progress);
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    run.await.unwrap().unwrap();

    let done = orchestrator.get_progress(&job.id).unwrap();
    assert_eq!(done.status, JobStatus::Completed);
    assert_eq!(done.current, 4);
    assert!(lowest >= paused.current);
    assert_eq!(harness.provider.calls_for(&a).len(), calls_before_resume);
}

#[tokio::test]
async fn test_pause_during_last_batch_completes_job() {
    let harness = TestHarness::new();
    harness
        .provider
        .set_default_delay(Duration::from_millis(150));
    for name in ["A", "B"] {
        harness.provider.script(
            &fixtures::item(name),
            p1(),
            vec![MockResponse::document(format!("{} body", name))],
        );
    }

    let orchestrator = Arc::new(harness.orchestrator(fixtures::fast_orchestrator_config()));
    let job = orchestrator.create_job(harness.request(&["A", "B"])).unwrap();

    let runner = Arc::clone(&orchestrator);
    let run = tokio::spawn(async move { runner.run_next().await });

    // Both items are already on their last fetch when the pause lands
    let start = std::time::Instant::now();
    while harness.provider.call_count() < 2 && start.elapsed() < Duration::from_secs(2) {
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    assert!(orchestrator.pause(&job.id).unwrap());
    run.await.unwrap().unwrap();

    let done = orchestrator.get_progress(&job.id).unwrap();
    assert_eq!(done.status, JobStatus::Completed);
    assert_eq!(done.current, 2);
    assert_eq!(harness.provider.call_count(), 2);
}

// =============================================================================
// Job control
// =============================================================================

#[tokio::test]
async fn test_control_calls_return_false_in_wrong_state() {
    let harness = TestHarness::new();
    let orchestrator = harness.orchestrator(fixtures::fast_orchestrator_config());
    let job = orchestrator.create_job(harness.request(&["A"])).unwrap();

    assert!(!orchestrator.pause(&job.id).unwrap());
    assert!(!orchestrator.resume(&job.id).unwrap());
    assert_eq!(harness.status(&job.id), JobStatus::Pending);

    assert!(orchestrator.cancel(&job.id).unwrap());
    assert!(!orchestrator.cancel(&job.id).unwrap());
    assert!(!orchestrator.resume(&job.id).unwrap());
    assert_eq!(harness.status(&job.id), JobStatus::Cancelled);

    // Cancelled jobs are never scheduled
    assert_eq!(orchestrator.run_next().await.unwrap(), None);

    assert!(matches!(
        orchestrator.pause("missing"),
        Err(OrchestratorError::JobNotFound(_))
    ));
    assert!(matches!(
        orchestrator.get_progress("missing"),
        Err(OrchestratorError::JobNotFound(_))
    ));
}

#[tokio::test]
async fn test_cancel_running_job_lets_inflight_finish() {
    let harness = TestHarness::new();
    harness
        .provider
        .set_default_delay(Duration::from_millis(150));
    let names = ["A", "B", "C", "D"];
    for name in names {
        harness.provider.script(
            &fixtures::item(name),
            p1(),
            vec![MockResponse::document(format!("{} body", name))],
        );
    }

    let orchestrator = Arc::new(harness.orchestrator(fixtures::fast_orchestrator_config()));
    let mut events = orchestrator.subscribe();
    let job = orchestrator.create_job(harness.request(&names)).unwrap();

    let runner = Arc::clone(&orchestrator);
    let run = tokio::spawn(async move { runner.run_next().await });

    loop {
        if events.recv().await.unwrap().kind == ProgressEventKind::Started {
            break;
        }
    }
    // Wait until the first batch is in flight
    let start = std::time::Instant::now();
    while harness.provider.call_count() < 2 && start.elapsed() < Duration::from_secs(2) {
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    assert!(orchestrator.cancel(&job.id).unwrap());
    run.await.unwrap().unwrap();

    let cancelled = orchestrator.get_job(&job.id).unwrap();
    assert_eq!(cancelled.status, JobStatus::Cancelled);
    // First batch was in flight and finished; second batch never started
    assert_eq!(harness.provider.call_count(), 2);
    assert_eq!(cancelled.progress.processed.len(), 2);
    assert!(harness.cache.has(&ArtifactKey::new(fixtures::item("A"), p1())));
}

#[tokio::test]
async fn test_delete_clears_checkpoint() {
    let harness = TestHarness::new();
    harness
        .provider
        .script(&fixtures::item("A"), p1(), vec![MockResponse::document("A")]);
    let orchestrator = harness.orchestrator(fixtures::fast_orchestrator_config());
    let job = orchestrator.create_job(harness.request(&["A"])).unwrap();
    orchestrator.run_next().await.unwrap();
    assert!(!harness.checkpoints.load(&job.id).unwrap().done_items.is_empty());

    orchestrator.delete_job(&job.id).unwrap();
    assert!(harness.job_store.get(&job.id).unwrap().is_none());
    assert!(harness.checkpoints.load(&job.id).unwrap().done_items.is_empty());
    assert!(matches!(
        orchestrator.delete_job(&job.id),
        Err(OrchestratorError::JobNotFound(_))
    ));
}

// =============================================================================
// Faults
// =============================================================================

#[tokio::test]
async fn test_checkpoint_failure_fails_only_current_job() {
    let harness = TestHarness::new();
    harness
        .provider
        .script(&fixtures::item("A"), p1(), vec![MockResponse::document("A")]);

    let failing = Arc::new(FailingCheckpointStore::new().unwrap());
    let orchestrator = harness.orchestrator_with_checkpoints(
        fixtures::fast_orchestrator_config(),
        failing as Arc<dyn CheckpointStore>,
    );
    let doomed = orchestrator.create_job(harness.request(&["A"])).unwrap();
    let waiting = orchestrator.create_job(harness.request(&["B"])).unwrap();

    assert_eq!(orchestrator.run_next().await.unwrap(), Some(doomed.id.clone()));

    let failed = orchestrator.get_job(&doomed.id).unwrap();
    assert_eq!(failed.status, JobStatus::Failed);
    assert!(failed.error.as_deref().unwrap().contains("checkpoint"));
    assert!(failed.completed_at.is_some());

    let untouched = orchestrator.get_job(&waiting.id).unwrap();
    assert_eq!(untouched.status, JobStatus::Pending);
    assert!(untouched.results.is_empty());
}

// =============================================================================
// Background loop, recovery and persistence
// =============================================================================

#[tokio::test]
async fn test_background_loop_picks_up_new_jobs() {
    let harness = TestHarness::new();
    harness
        .provider
        .script(&fixtures::item("A"), p1(), vec![MockResponse::document("A")]);

    let orchestrator = harness.orchestrator(fixtures::fast_orchestrator_config());
    let mut events = orchestrator.subscribe();
    orchestrator.start().await.unwrap();
    assert!(orchestrator.is_running());

    let job = orchestrator.create_job(harness.request(&["A"])).unwrap();
    let reached = harness
        .wait_for_status(&job.id, JobStatus::Completed, Duration::from_secs(5))
        .await;

    orchestrator.stop().await;
    assert!(reached, "Job should complete under the background loop");
    assert!(!orchestrator.is_running());

    let mut kinds = Vec::new();
    while let Ok(event) = events.try_recv() {
        kinds.push(event.kind);
    }
    assert_eq!(kinds.first(), Some(&ProgressEventKind::Created));
    assert!(kinds.contains(&ProgressEventKind::Started));
    assert_eq!(kinds.last(), Some(&ProgressEventKind::Completed));
}

#[tokio::test]
async fn test_start_resets_running_and_paused_jobs() {
    let harness = TestHarness::new();
    let running = harness.job_store.create(harness.request(&["A"])).unwrap();
    let paused = harness.job_store.create(harness.request(&["B"])).unwrap();
    for id in [&running.id, &paused.id] {
        harness
            .job_store
            .transition(id, &[JobStatus::Pending], JobStatus::Running, None)
            .unwrap();
    }
    harness
        .job_store
        .transition(&paused.id, &[JobStatus::Running], JobStatus::Paused, None)
        .unwrap();

    let config = OrchestratorConfig {
        enabled: false,
        ..fixtures::fast_orchestrator_config()
    };
    let orchestrator = harness.orchestrator(config);
    orchestrator.start().await.unwrap();

    assert_eq!(harness.status(&running.id), JobStatus::Pending);
    assert_eq!(harness.status(&paused.id), JobStatus::Pending);
    let status = orchestrator.status();
    assert_eq!(status.pending_count, 2);
    assert_eq!(status.running_count, 0);

    orchestrator.stop().await;
}

#[tokio::test]
async fn test_cache_snapshot_survives_reload() {
    let harness = TestHarness::new();
    harness
        .provider
        .script(&fixtures::item("A"), p1(), vec![MockResponse::document("A body")]);

    let orchestrator = harness.orchestrator(fixtures::fast_orchestrator_config());
    orchestrator
        .create_job(harness.request(&["A"]))
        .unwrap();
    orchestrator.run_next().await.unwrap();

    let backend = FileSnapshot::new(harness.temp_dir.path().join("cache.jsonl"));
    let report = backend.load().unwrap();
    assert_eq!(report.artifacts.len(), 1);
    assert_eq!(report.artifacts[0].payload, "A body");

    let reloaded = ArtifactCache::load(Arc::new(backend));
    assert!(reloaded.has(&ArtifactKey::new(fixtures::item("A"), p1())));
}
