//! Job orchestrator implementation.
//!
//! One job holds the execution slot at a time. Its remaining items are split
//! into batches; each batch fans out to a bounded number of workers, and the
//! checkpoint, progress and subscribers are updated once the whole batch has
//! settled. Pause and cancel are cooperative: they take effect at the next
//! batch boundary or candidate, never in the middle of a fetch.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use futures::stream::{self, StreamExt};
use tokio::sync::{broadcast, Notify};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::cache::{ArtifactCache, ArtifactSink};
use crate::checkpoint::CheckpointStore;
use crate::item::Item;
use crate::job::{
    CreateJobRequest, ItemOutcome, Job, JobError, JobFilter, JobProgress, JobStatus, JobStore,
    ProgressSnapshot,
};
use crate::metrics;
use crate::period::PeriodResolver;
use crate::provider::FetchClient;

use super::config::OrchestratorConfig;
use super::slot::ExecutionSlot;
use super::types::{OrchestratorError, OrchestratorStatus, ProgressEvent, ProgressEventKind};
use super::worker::{ItemWorker, WorkerOutcome};

const EVENT_CHANNEL_CAPACITY: usize = 256;
const STOP_TIMEOUT: Duration = Duration::from_secs(30);

/// The job currently holding the execution slot.
#[derive(Debug, Clone)]
struct ActiveJob {
    id: String,
    /// Set by pause/cancel; workers stop before their next candidate.
    interrupted: Arc<AtomicBool>,
}

/// Everything needed to run jobs, cheap to clone into the scheduling task.
#[derive(Clone)]
struct JobRunner {
    config: OrchestratorConfig,
    job_store: Arc<dyn JobStore>,
    checkpoints: Arc<dyn CheckpointStore>,
    cache: Arc<ArtifactCache>,
    worker: ItemWorker,
    resolver: PeriodResolver,
    slot: ExecutionSlot,
    shutting_down: Arc<AtomicBool>,
    active: Arc<Mutex<Option<ActiveJob>>>,
    events_tx: broadcast::Sender<ProgressEvent>,
}

/// The job orchestrator - schedules bulk acquisition jobs and exposes job control.
pub struct JobOrchestrator {
    config: OrchestratorConfig,
    job_store: Arc<dyn JobStore>,
    checkpoints: Arc<dyn CheckpointStore>,
    cache: Arc<ArtifactCache>,
    fetch_client: FetchClient,
    sink: Option<Arc<dyn ArtifactSink>>,
    resolver: PeriodResolver,

    // Runtime state
    slot: ExecutionSlot,
    running: Arc<AtomicBool>,
    shutting_down: Arc<AtomicBool>,
    active: Arc<Mutex<Option<ActiveJob>>>,
    wake: Arc<Notify>,
    events_tx: broadcast::Sender<ProgressEvent>,
    shutdown_tx: broadcast::Sender<()>,
    loop_handle: Mutex<Option<JoinHandle<()>>>,
}

impl JobOrchestrator {
    /// Create a new orchestrator.
    pub fn new(
        config: OrchestratorConfig,
        job_store: Arc<dyn JobStore>,
        checkpoints: Arc<dyn CheckpointStore>,
        cache: Arc<ArtifactCache>,
        fetch_client: FetchClient,
    ) -> Self {
        let (shutdown_tx, _) = broadcast::channel(1);
        let (events_tx, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        let resolver = PeriodResolver::new(config.horizon);

        Self {
            config,
            job_store,
            checkpoints,
            cache,
            fetch_client,
            sink: None,
            resolver,
            slot: ExecutionSlot::new(),
            running: Arc::new(AtomicBool::new(false)),
            shutting_down: Arc::new(AtomicBool::new(false)),
            active: Arc::new(Mutex::new(None)),
            wake: Arc::new(Notify::new()),
            events_tx,
            shutdown_tx,
            loop_handle: Mutex::new(None),
        }
    }

    /// Also write every newly cached artifact to `sink`.
    pub fn with_sink(mut self, sink: Arc<dyn ArtifactSink>) -> Self {
        self.sink = Some(sink);
        self
    }

    /// Replace the period resolver built from the configured horizon.
    pub fn with_resolver(mut self, resolver: PeriodResolver) -> Self {
        self.resolver = resolver;
        self
    }

    pub fn cache(&self) -> &Arc<ArtifactCache> {
        &self.cache
    }

    fn runner(&self) -> JobRunner {
        JobRunner {
            config: self.config.clone(),
            job_store: Arc::clone(&self.job_store),
            checkpoints: Arc::clone(&self.checkpoints),
            cache: Arc::clone(&self.cache),
            worker: ItemWorker::new(
                self.fetch_client.clone(),
                Arc::clone(&self.cache),
                self.sink.clone(),
                self.config.backoff_policy(),
            ),
            resolver: self.resolver.clone(),
            slot: self.slot.clone(),
            shutting_down: Arc::clone(&self.shutting_down),
            active: Arc::clone(&self.active),
            events_tx: self.events_tx.clone(),
        }
    }

    /// Reset jobs left running or paused by a previous process to pending.
    pub fn recover(&self) -> Result<Vec<String>, OrchestratorError> {
        let reset = self.job_store.reset_interrupted()?;
        for id in &reset {
            info!("Reset interrupted job to pending: {}", id);
        }
        if !reset.is_empty() {
            info!("Recovered {} interrupted jobs", reset.len());
        }
        Ok(reset)
    }

    /// Start the orchestrator (spawns the scheduling loop).
    pub async fn start(&self) -> Result<(), OrchestratorError> {
        if self.running.swap(true, Ordering::SeqCst) {
            warn!("Orchestrator already running");
            return Ok(());
        }

        info!("Starting job orchestrator");
        self.shutting_down.store(false, Ordering::SeqCst);

        if let Err(e) = self.recover() {
            self.running.store(false, Ordering::SeqCst);
            return Err(e);
        }

        let handle = self.spawn_scheduling_loop();
        *self.loop_handle.lock().unwrap() = Some(handle);

        info!("Job orchestrator started");
        Ok(())
    }

    /// Stop the orchestrator gracefully.
    ///
    /// A running job stops at its next batch boundary and stays `running` in
    /// the store; it is reset to pending by the next [`recover`](Self::recover).
    pub async fn stop(&self) {
        if !self.running.swap(false, Ordering::SeqCst) {
            warn!("Orchestrator not running");
            return;
        }

        info!("Stopping job orchestrator");
        self.shutting_down.store(true, Ordering::SeqCst);

        // Signal shutdown to the scheduling loop
        let _ = self.shutdown_tx.send(());

        let handle = self.loop_handle.lock().unwrap().take();
        if let Some(handle) = handle {
            match tokio::time::timeout(STOP_TIMEOUT, handle).await {
                Ok(Ok(())) => {}
                Ok(Err(e)) => warn!("Scheduling loop ended abnormally: {}", e),
                Err(_) => warn!("Scheduling loop did not stop within {:?}", STOP_TIMEOUT),
            }
        }

        info!("Job orchestrator stopped");
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Spawn the scheduling loop task.
    fn spawn_scheduling_loop(&self) -> JoinHandle<()> {
        let runner = self.runner();
        let running = Arc::clone(&self.running);
        let wake = Arc::clone(&self.wake);
        let poll_interval = self.config.poll_interval();
        let enabled = self.config.enabled;
        let mut shutdown_rx = self.shutdown_tx.subscribe();

        tokio::spawn(async move {
            if !enabled {
                info!("Scheduling disabled; jobs will stay pending");
                let _ = shutdown_rx.recv().await;
                return;
            }

            info!("Scheduling loop started");
            loop {
                // Drain the queue before waiting again
                while running.load(Ordering::SeqCst) {
                    match runner.run_next().await {
                        Ok(Some(_)) => continue,
                        Ok(None) => break,
                        Err(e) => {
                            warn!("Scheduling error: {}", e);
                            break;
                        }
                    }
                }

                tokio::select! {
                    _ = shutdown_rx.recv() => {
                        info!("Scheduling loop received shutdown signal");
                        break;
                    }
                    _ = wake.notified() => {}
                    _ = tokio::time::sleep(poll_interval) => {}
                }

                if !running.load(Ordering::SeqCst) {
                    break;
                }
            }
            info!("Scheduling loop stopped");
        })
    }

    /// Run the job at the head of the queue until it stops.
    ///
    /// Waits for the execution slot. Returns the id of the job that ran, or
    /// `None` when nothing was pending.
    pub async fn run_next(&self) -> Result<Option<String>, OrchestratorError> {
        self.runner().run_next().await
    }

    // =========================================================================
    // Job control
    // =========================================================================

    /// Create a pending job and wake the scheduler.
    pub fn create_job(&self, request: CreateJobRequest) -> Result<Job, OrchestratorError> {
        let job = self.job_store.create(request)?;
        info!(
            job_id = %job.id,
            items = job.items.len(),
            force_refresh = job.force_refresh,
            "Job created"
        );
        self.publish(ProgressEventKind::Created, job.snapshot());
        self.wake.notify_one();
        Ok(job)
    }

    /// Pause a running job. Returns false if the job is not running.
    pub fn pause(&self, job_id: &str) -> Result<bool, OrchestratorError> {
        let Some(job) = self.transition_existing(job_id, &[JobStatus::Running], JobStatus::Paused)?
        else {
            return Ok(false);
        };
        self.interrupt_active(job_id);
        info!(job_id, "Job paused");
        self.publish(ProgressEventKind::Paused, job.snapshot());
        Ok(true)
    }

    /// Resume a paused job at the head of the queue. Returns false if the job
    /// is not paused.
    pub fn resume(&self, job_id: &str) -> Result<bool, OrchestratorError> {
        self.ensure_exists(job_id)?;
        if !self.job_store.requeue_front(job_id)? {
            return Ok(false);
        }
        info!(job_id, "Job resumed");
        if let Some(job) = self.job_store.get(job_id)? {
            self.publish(ProgressEventKind::Resumed, job.snapshot());
        }
        self.wake.notify_one();
        Ok(true)
    }

    /// Cancel a pending, running or paused job. Returns false if the job is
    /// already finished.
    ///
    /// Fetches already in flight finish; no further batch or candidate starts.
    pub fn cancel(&self, job_id: &str) -> Result<bool, OrchestratorError> {
        let Some(job) = self.transition_existing(
            job_id,
            &[JobStatus::Pending, JobStatus::Running, JobStatus::Paused],
            JobStatus::Cancelled,
        )?
        else {
            return Ok(false);
        };
        self.interrupt_active(job_id);
        info!(job_id, "Job cancelled");
        metrics::JOBS_FINISHED
            .with_label_values(&[JobStatus::Cancelled.as_str()])
            .inc();
        self.publish(ProgressEventKind::Cancelled, job.snapshot());
        Ok(true)
    }

    /// Read-only progress view of a job.
    pub fn get_progress(&self, job_id: &str) -> Result<ProgressSnapshot, OrchestratorError> {
        Ok(self.get_job(job_id)?.snapshot())
    }

    pub fn get_job(&self, job_id: &str) -> Result<Job, OrchestratorError> {
        self.job_store
            .get(job_id)?
            .ok_or_else(|| OrchestratorError::JobNotFound(job_id.to_string()))
    }

    pub fn list_jobs(&self, filter: &JobFilter) -> Result<(Vec<Job>, i64), OrchestratorError> {
        let jobs = self.job_store.list(filter)?;
        let total = self.job_store.count(filter)?;
        Ok((jobs, total))
    }

    /// Delete a job that is not running, together with its checkpoint.
    pub fn delete_job(&self, job_id: &str) -> Result<Job, OrchestratorError> {
        let job = self.job_store.delete(job_id).map_err(|e| match e {
            JobError::NotFound(id) => OrchestratorError::JobNotFound(id),
            other => OrchestratorError::JobStore(other),
        })?;
        self.checkpoints.clear(job_id)?;
        info!(job_id, "Job deleted");
        Ok(job)
    }

    /// Subscribe to progress notifications.
    pub fn subscribe(&self) -> broadcast::Receiver<ProgressEvent> {
        self.events_tx.subscribe()
    }

    /// Get current orchestrator status.
    pub fn status(&self) -> OrchestratorStatus {
        let count = |status: JobStatus| {
            self.job_store
                .count(&JobFilter::new().with_status(status))
                .unwrap_or(0) as usize
        };

        OrchestratorStatus {
            running: self.running.load(Ordering::Relaxed),
            active_job: self
                .active
                .lock()
                .unwrap()
                .as_ref()
                .map(|active| active.id.clone()),
            pending_count: count(JobStatus::Pending),
            running_count: count(JobStatus::Running),
            paused_count: count(JobStatus::Paused),
        }
    }

    fn ensure_exists(&self, job_id: &str) -> Result<(), OrchestratorError> {
        self.get_job(job_id).map(|_| ())
    }

    fn transition_existing(
        &self,
        job_id: &str,
        from: &[JobStatus],
        to: JobStatus,
    ) -> Result<Option<Job>, OrchestratorError> {
        self.job_store
            .transition(job_id, from, to, None)
            .map_err(|e| match e {
                JobError::NotFound(id) => OrchestratorError::JobNotFound(id),
                other => OrchestratorError::JobStore(other),
            })
    }

    fn interrupt_active(&self, job_id: &str) {
        if let Some(active) = self.active.lock().unwrap().as_ref() {
            if active.id == job_id {
                active.interrupted.store(true, Ordering::SeqCst);
            }
        }
    }

    fn publish(&self, kind: ProgressEventKind, snapshot: ProgressSnapshot) {
        // No subscribers is not an error
        let _ = self.events_tx.send(ProgressEvent { kind, snapshot });
    }
}

impl JobRunner {
    async fn run_next(&self) -> Result<Option<String>, OrchestratorError> {
        let Some(_guard) = self.slot.acquire().await else {
            return Ok(None);
        };

        let Some(pending) = self.job_store.next_pending()? else {
            return Ok(None);
        };

        // Cancelled between the read and the claim
        let Some(job) =
            self.job_store
                .transition(&pending.id, &[JobStatus::Pending], JobStatus::Running, None)?
        else {
            return Ok(Some(pending.id));
        };

        let active = ActiveJob {
            id: job.id.clone(),
            interrupted: Arc::new(AtomicBool::new(false)),
        };
        *self.active.lock().unwrap() = Some(active.clone());

        info!(job_id = %job.id, items = job.items.len(), "Job started");
        self.publish(ProgressEventKind::Started, job.snapshot());

        let job_id = job.id.clone();
        match self.run_job(job, &active).await {
            Ok(status) => {
                debug!(job_id = %job_id, status = %status, "Job run ended");
            }
            Err(e) => self.fail_job(&job_id, &e),
        }

        self.snapshot_cache().await;
        *self.active.lock().unwrap() = None;

        Ok(Some(job_id))
    }

    /// Drive one job batch by batch. Returns the status it stopped in.
    async fn run_job(&self, job: Job, active: &ActiveJob) -> Result<JobStatus, OrchestratorError> {
        let checkpoint = self.checkpoints.load(&job.id)?;

        // Every settled item, failures included, is carried over from the checkpoint
        let mut progress = JobProgress::new(job.items.len());
        let mut results: Vec<ItemOutcome> = Vec::with_capacity(job.items.len());
        for outcome in checkpoint
            .results
            .iter()
            .filter(|outcome| job.items.contains(&outcome.item))
        {
            progress.record(outcome);
            results.push(outcome.clone());
        }
        let remaining = checkpoint.remaining(&job.items);
        self.job_store.save_progress(&job.id, &progress, &results)?;

        if !checkpoint.results.is_empty() {
            info!(
                job_id = %job.id,
                settled = checkpoint.results.len(),
                done = checkpoint.done_items.len(),
                remaining = remaining.len(),
                "Resuming from checkpoint"
            );
        }

        let batch_size = self.config.batch_size.max(1);
        let workers = self.config.worker_bound();
        let batches: Vec<&[Item]> = remaining.chunks(batch_size).collect();
        let batch_count = batches.len();

        for (index, batch) in batches.into_iter().enumerate() {
            let status = self.stored_status(&job.id)?;
            if status != JobStatus::Running {
                info!(job_id = %job.id, status = %status, "Stopping at batch boundary");
                return Ok(status);
            }
            if self.shutting_down.load(Ordering::SeqCst) {
                info!(job_id = %job.id, "Shutdown requested, leaving job for recovery");
                return Ok(JobStatus::Running);
            }

            progress.current_item = batch.first().cloned();
            self.job_store.save_progress(&job.id, &progress, &results)?;

            let started = Instant::now();
            let outcomes: Vec<WorkerOutcome> = stream::iter(batch.iter().cloned())
                .map(|item| {
                    let candidates = match &job.periods {
                        Some(periods) => periods.clone(),
                        None => self.resolver.resolve(&item),
                    };
                    self.worker.process(
                        &job.id,
                        item,
                        candidates,
                        job.force_refresh,
                        &active.interrupted,
                    )
                })
                .buffer_unordered(workers)
                .collect()
                .await;

            let mut finished: Vec<ItemOutcome> = Vec::with_capacity(outcomes.len());
            let mut interrupted = 0usize;
            for outcome in outcomes {
                match outcome {
                    WorkerOutcome::Finished(outcome) => finished.push(outcome),
                    WorkerOutcome::Interrupted(_) => interrupted += 1,
                }
            }

            self.checkpoints.record_batch(&job.id, &finished)?;
            for outcome in &finished {
                progress.record(outcome);
                metrics::ITEMS_TOTAL
                    .with_label_values(&[outcome.status.as_str()])
                    .inc();
            }
            results.extend(finished);
            progress.current_item = None;
            self.job_store.save_progress(&job.id, &progress, &results)?;

            metrics::BATCH_DURATION
                .with_label_values(&[])
                .observe(started.elapsed().as_secs_f64());
            info!(
                job_id = %job.id,
                batch = index + 1,
                batches = batch_count,
                current = progress.current,
                total = progress.total,
                skipped = progress.skipped.len(),
                interrupted,
                "Batch finished"
            );
            self.publish_stored(&job.id, ProgressEventKind::BatchFinished)?;

            let every = self.config.snapshot_every_batches;
            if every > 0 && (index + 1) % every == 0 {
                self.snapshot_cache().await;
            }

            if index + 1 < batch_count {
                tokio::time::sleep(self.config.inter_batch_delay()).await;
            }
        }

        if progress.settled() < progress.total {
            // Interrupted items are left for the next run
            return self.stored_status(&job.id);
        }

        // A pause that landed during the last batch has nothing left to hold
        match self.job_store.transition(
            &job.id,
            &[JobStatus::Running, JobStatus::Paused],
            JobStatus::Completed,
            None,
        )? {
            Some(done) => {
                info!(
                    job_id = %job.id,
                    processed = done.progress.processed.len(),
                    failed = done.progress.failed.len(),
                    skipped = done.progress.skipped.len(),
                    "Job completed"
                );
                metrics::JOBS_FINISHED
                    .with_label_values(&[JobStatus::Completed.as_str()])
                    .inc();
                self.publish(ProgressEventKind::Completed, done.snapshot());
                Ok(JobStatus::Completed)
            }
            None => self.stored_status(&job.id),
        }
    }

    fn stored_status(&self, job_id: &str) -> Result<JobStatus, OrchestratorError> {
        self.job_store
            .get(job_id)?
            .map(|job| job.status)
            .ok_or_else(|| OrchestratorError::JobNotFound(job_id.to_string()))
    }

    /// Move the job to `failed` after an orchestrator-internal fault.
    fn fail_job(&self, job_id: &str, err: &OrchestratorError) {
        error!(job_id, "Job failed: {}", err);
        match self.job_store.transition(
            job_id,
            &[JobStatus::Running],
            JobStatus::Failed,
            Some(err.to_string()),
        ) {
            Ok(Some(job)) => {
                metrics::JOBS_FINISHED
                    .with_label_values(&[JobStatus::Failed.as_str()])
                    .inc();
                self.publish(ProgressEventKind::Failed, job.snapshot());
            }
            Ok(None) => debug!(job_id, "Job left running state before it could be failed"),
            Err(e) => error!(job_id, "Failed to record job failure: {}", e),
        }
    }

    async fn snapshot_cache(&self) {
        let cache = Arc::clone(&self.cache);
        match tokio::task::spawn_blocking(move || cache.snapshot()).await {
            Ok(Ok(true)) => debug!("Artifact cache snapshot written"),
            Ok(Ok(false)) => {}
            Ok(Err(e)) => warn!("Artifact cache snapshot failed: {}", e),
            Err(e) => warn!("Artifact cache snapshot task failed: {}", e),
        }
    }

    fn publish_stored(&self, job_id: &str, kind: ProgressEventKind) -> Result<(), OrchestratorError> {
        if let Some(job) = self.job_store.get(job_id)? {
            self.publish(kind, job.snapshot());
        }
        Ok(())
    }

    fn publish(&self, kind: ProgressEventKind, snapshot: ProgressSnapshot) {
        let _ = self.events_tx.send(ProgressEvent { kind, snapshot });
    }
}
