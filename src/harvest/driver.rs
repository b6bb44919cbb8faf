//! Batch driver
//!
//! Runs every task of a batch through a `RetryOrchestrator` and partitions
//! the outcomes into records and failures. With more than one worker, each
//! worker owns its own fetcher (its own session) and pulls tasks from a
//! shared queue.

use crate::config::HarvestConfig;
use crate::harvest::delay::DelayPolicy;
use crate::harvest::expander::PaginationExpander;
use crate::harvest::extractor::FieldExtractor;
use crate::harvest::fetcher::PageFetcher;
use crate::harvest::orchestrator::{RetryOrchestrator, RetryPolicy, TaskOutcome};
use crate::output::HarvestSink;
use crate::record::{ErrorKind, FailureEntry, Record};
use crate::storage::RunStatus;
use crate::task::Task;
use crate::HarvestError;
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Instant;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinSet;

/// Creates one fetcher per worker
pub trait FetcherFactory: Send + Sync {
    fn create(&self) -> Result<Arc<dyn PageFetcher>, HarvestError>;
}

impl<F> FetcherFactory for F
where
    F: Fn() -> Result<Arc<dyn PageFetcher>, HarvestError> + Send + Sync,
{
    fn create(&self) -> Result<Arc<dyn PageFetcher>, HarvestError> {
        self()
    }
}

/// Snapshot of batch progress
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Progress {
    pub processed: usize,
    pub total: usize,
    pub succeeded: usize,
    pub failed: usize,
}

/// Outcome of a batch
#[derive(Debug, Clone, Default)]
pub struct HarvestReport {
    /// Records in completion order
    pub results: Vec<Record>,

    /// Failure entries in completion order
    pub failures: Vec<FailureEntry>,

    /// Tasks never started because the run was cancelled
    pub unprocessed: Vec<Task>,
}

impl HarvestReport {
    pub fn processed(&self) -> usize {
        self.results.len() + self.failures.len()
    }

    pub fn is_complete(&self) -> bool {
        self.unprocessed.is_empty()
    }

    pub fn status(&self) -> RunStatus {
        if self.is_complete() {
            RunStatus::Completed
        } else {
            RunStatus::Interrupted
        }
    }
}

/// Runs a batch of tasks with a pool of orchestrators
pub struct HarvestDriver {
    factory: Arc<dyn FetcherFactory>,
    extractor: Arc<dyn FieldExtractor>,
    expander: Arc<dyn PaginationExpander>,
    delay: Arc<dyn DelayPolicy>,
    policy: RetryPolicy,
    worker_count: usize,
    progress_interval: usize,
    batch_save_size: usize,
    sink: Option<Arc<dyn HarvestSink>>,
    shutdown: Option<watch::Receiver<bool>>,
    progress: watch::Sender<Progress>,
}

impl HarvestDriver {
    pub fn new(
        factory: Arc<dyn FetcherFactory>,
        extractor: Arc<dyn FieldExtractor>,
        expander: Arc<dyn PaginationExpander>,
        delay: Arc<dyn DelayPolicy>,
        config: &HarvestConfig,
    ) -> Self {
        let (progress, _) = watch::channel(Progress::default());
        Self {
            factory,
            extractor,
            expander,
            delay,
            policy: RetryPolicy::from(config),
            worker_count: (config.worker_count as usize).max(1),
            progress_interval: (config.progress_interval as usize).max(1),
            batch_save_size: 20,
            sink: None,
            shutdown: None,
            progress,
        }
    }

    /// Forwards every outcome to `sink` as it completes
    pub fn with_sink(mut self, sink: Arc<dyn HarvestSink>) -> Self {
        self.sink = Some(sink);
        self
    }

    /// Stops handing out tasks once `shutdown` turns `true`
    pub fn with_shutdown(mut self, shutdown: watch::Receiver<bool>) -> Self {
        self.shutdown = Some(shutdown);
        self
    }

    /// Flushes the sink every `size` completed tasks
    pub fn with_batch_save_size(mut self, size: usize) -> Self {
        self.batch_save_size = size.max(1);
        self
    }

    /// Watches progress of the current (or last) run
    pub fn subscribe_progress(&self) -> watch::Receiver<Progress> {
        self.progress.subscribe()
    }

    /// Runs every task and partitions the outcomes
    ///
    /// A task's exhaustion never aborts the batch. The only errors are the
    /// ones raised while setting up workers, before any task has started.
    pub async fn run(&self, tasks: Vec<Task>) -> Result<HarvestReport, HarvestError> {
        let total = tasks.len();
        let workers = self.worker_count.min(total).max(1);
        self.progress.send_replace(Progress {
            total,
            ..Progress::default()
        });

        let mut fetchers = Vec::with_capacity(workers);
        for _ in 0..workers {
            fetchers.push(self.factory.create()?);
        }

        tracing::info!("Harvesting {} task(s) with {} worker(s)", total, workers);
        let start_time = Instant::now();

        let queue = Arc::new(Mutex::new(VecDeque::from(tasks)));
        let in_flight: Arc<Mutex<HashMap<usize, Task>>> = Arc::new(Mutex::new(HashMap::new()));
        let (tx, mut rx) = mpsc::unbounded_channel::<TaskOutcome>();
        let mut pool = JoinSet::new();

        for (id, fetcher) in fetchers.into_iter().enumerate() {
            let orchestrator = RetryOrchestrator::new(
                fetcher,
                Arc::clone(&self.extractor),
                Arc::clone(&self.expander),
                Arc::clone(&self.delay),
                self.policy.clone(),
            );
            let queue = Arc::clone(&queue);
            let in_flight = Arc::clone(&in_flight);
            let shutdown = self.shutdown.clone();
            let tx = tx.clone();

            pool.spawn(async move {
                loop {
                    if shutdown.as_ref().is_some_and(|s| *s.borrow()) {
                        tracing::debug!("Worker {} stopping on shutdown", id);
                        break;
                    }
                    let Some(task) = next_task(&queue) else {
                        break;
                    };
                    lock_or_recover(&in_flight).insert(id, task.clone());
                    let outcome = orchestrator.run_task(&task).await;
                    lock_or_recover(&in_flight).remove(&id);
                    if tx.send(outcome).is_err() {
                        break;
                    }
                }
            });
        }
        drop(tx);

        let mut report = HarvestReport::default();
        let mut progress = Progress {
            total,
            ..Progress::default()
        };

        while let Some(outcome) = rx.recv().await {
            self.collect(outcome, &mut report, &mut progress);

            if progress.processed % self.progress_interval == 0 {
                let rate = progress.processed as f64 / start_time.elapsed().as_secs_f64().max(0.001);
                tracing::info!(
                    "Progress: {}/{} tasks ({} succeeded, {} failed), {:.2} tasks/sec",
                    progress.processed,
                    progress.total,
                    progress.succeeded,
                    progress.failed,
                    rate
                );
            }
        }

        let mut crashes = Vec::new();
        while let Some(joined) = pool.join_next().await {
            if let Err(e) = joined {
                tracing::error!("Harvest worker ended abnormally: {}", e);
                crashes.push(e.to_string());
            }
        }

        // A crashed worker leaves its task behind without an outcome
        let orphaned: Vec<Task> = lock_or_recover(&in_flight)
            .drain()
            .map(|(_, task)| task)
            .collect();
        for task in orphaned {
            let failure = FailureEntry {
                task,
                last_error: ErrorKind::Transport,
                message: format!("worker crashed: {}", crashes.join("; ")),
                attempts_made: 1,
            };
            self.collect(TaskOutcome::Exhausted(failure), &mut report, &mut progress);
        }

        report.unprocessed = lock_or_recover(&queue).drain(..).collect();

        let status = report.status();
        self.forward(|sink| sink.finalize(status));

        if report.is_complete() {
            tracing::info!(
                "Harvest completed: {} record(s), {} failure(s) in {:?}",
                report.results.len(),
                report.failures.len(),
                start_time.elapsed()
            );
        } else {
            tracing::warn!(
                "Harvest interrupted: {} record(s), {} failure(s), {} task(s) not started",
                report.results.len(),
                report.failures.len(),
                report.unprocessed.len()
            );
        }

        Ok(report)
    }

    /// Appends one outcome to the report and the sink
    fn collect(&self, outcome: TaskOutcome, report: &mut HarvestReport, progress: &mut Progress) {
        match outcome {
            TaskOutcome::Succeeded(record) => {
                self.forward(|sink| sink.record_success(&record));
                progress.succeeded += 1;
                report.results.push(record);
            }
            TaskOutcome::Exhausted(failure) => {
                self.forward(|sink| sink.record_failure(&failure));
                progress.failed += 1;
                report.failures.push(failure);
            }
        }
        progress.processed += 1;
        self.progress.send_replace(*progress);

        if progress.processed % self.batch_save_size == 0 {
            self.forward(|sink| sink.flush());
        }
    }

    /// Calls the sink, if any; sink errors are logged and swallowed
    fn forward(&self, call: impl FnOnce(&dyn HarvestSink) -> crate::output::OutputResult<()>) {
        if let Some(sink) = &self.sink {
            if let Err(e) = call(sink.as_ref()) {
                tracing::error!("Output sink error: {}", e);
            }
        }
    }
}

fn next_task(queue: &Mutex<VecDeque<Task>>) -> Option<Task> {
    lock_or_recover(queue).pop_front()
}

fn lock_or_recover<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}
