//! Concurrent multi-target comparison.
//!
//! The [`Orchestrator`] loads the base snapshot once, then compares every
//! target against it on a bounded pool of worker tasks:
//!
//! - targets are fed to the pool one batch at a time, and a batch is fully
//!   merged before the next one is submitted
//! - at most `workers` targets are loaded and compared at any instant
//! - each target runs in its own spawned task, so a panic or a timeout fails
//!   that target only
//! - the orchestrating task is the single merge point; results are keyed by
//!   target name and reported in the caller's order

use crate::summary::RunSummary;
use crate::{
    ConfigError, DatabaseEndpoint, Difference, EndpointRef, Error, Result, SchemaLoader,
};
use pgcompare_schema::SchemaSnapshot;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{Mutex, mpsc};
use tokio::task::{JoinError, JoinSet};

/// Signature of the function used to compare a target snapshot against the base.
pub type DiffFn = Arc<
    dyn Fn(
            &SchemaSnapshot,
            &SchemaSnapshot,
            &DatabaseEndpoint,
            &DatabaseEndpoint,
        ) -> Vec<Difference>
        + Send
        + Sync,
>;

/// Knobs for a run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunOptions {
    /// Maximum number of targets processed concurrently.
    pub workers: usize,
    /// Number of targets submitted to the pool at a time.
    pub batch_size: usize,
    /// Upper bound on one target's load and diff. `None` waits forever.
    pub target_timeout: Option<Duration>,
    /// How long idle workers get to exit once all batches are merged.
    pub shutdown_grace: Duration,
}

impl Default for RunOptions {
    fn default() -> Self {
        Self {
            workers: 8,
            batch_size: 10,
            target_timeout: Some(Duration::from_secs(300)),
            shutdown_grace: Duration::from_secs(60),
        }
    }
}

impl RunOptions {
    pub fn validate(&self) -> std::result::Result<(), ConfigError> {
        if self.workers == 0 {
            return Err(ConfigError::InvalidOption(
                "workers must be at least 1".to_string(),
            ));
        }
        if self.batch_size == 0 {
            return Err(ConfigError::InvalidOption(
                "batch size must be at least 1".to_string(),
            ));
        }
        if self.target_timeout == Some(Duration::ZERO) {
            return Err(ConfigError::InvalidOption(
                "target timeout must be positive".to_string(),
            ));
        }
        Ok(())
    }
}

/// Outcome of one target.
#[derive(Debug)]
pub struct RunResult {
    pub target: EndpointRef,
    pub success: bool,
    pub difference_count: usize,
    /// Why the target failed. `None` on success.
    pub error: Option<Error>,
    /// Wall time spent on this target, load and diff included.
    pub elapsed: Duration,
}

impl RunResult {
    pub fn succeeded(target: EndpointRef, difference_count: usize, elapsed: Duration) -> Self {
        Self {
            target,
            success: true,
            difference_count,
            error: None,
            elapsed,
        }
    }

    pub fn failed(target: EndpointRef, error: Error, elapsed: Duration) -> Self {
        Self {
            target,
            success: false,
            difference_count: 0,
            error: Some(error),
            elapsed,
        }
    }
}

/// A target, its result, and the differences found on it.
#[derive(Debug)]
pub struct TargetOutcome {
    pub endpoint: DatabaseEndpoint,
    pub result: RunResult,
    /// Empty when the target failed.
    pub differences: Vec<Difference>,
}

/// Everything a run produced.
#[derive(Debug)]
pub struct RunReport {
    pub base: EndpointRef,
    /// Number of tables in the base snapshot.
    pub base_tables: usize,
    /// One outcome per target, in the order targets were given.
    pub outcomes: Vec<TargetOutcome>,
    pub elapsed: Duration,
}

impl RunReport {
    pub fn summary(&self) -> RunSummary {
        RunSummary::from_outcomes(&self.outcomes)
    }

    pub fn has_failures(&self) -> bool {
        self.outcomes.iter().any(|o| !o.result.success)
    }

    /// Look up the outcome of a target by name.
    pub fn outcome(&self, name: &str) -> Option<&TargetOutcome> {
        self.outcomes.iter().find(|o| o.endpoint.name() == name)
    }
}

/// Progress notifications, sent over the channel given to
/// [`Orchestrator::with_events`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunEvent {
    BaseLoaded {
        base: EndpointRef,
        tables: usize,
    },
    BatchStarted {
        /// Zero-based batch number
        index: usize,
        batches: usize,
        size: usize,
    },
    TargetStarted {
        target: EndpointRef,
    },
    TargetFinished {
        target: EndpointRef,
        success: bool,
        difference_count: usize,
        error: Option<String>,
        elapsed: Duration,
    },
    BatchFinished {
        index: usize,
        batches: usize,
    },
    Finished {
        succeeded: usize,
        failed: usize,
        elapsed: Duration,
    },
}

#[derive(Clone, Default)]
struct EventSink(Option<mpsc::UnboundedSender<RunEvent>>);

impl EventSink {
    fn emit(&self, event: RunEvent) {
        if let Some(tx) = &self.0 {
            // A dropped receiver just means nobody is listening any more.
            let _ = tx.send(event);
        }
    }
}

/// Runs one base against many targets.
///
/// # Example
///
/// ```ignore
/// use pgcompare::{Orchestrator, PostgresLoader, RunOptions};
///
/// let report = Orchestrator::new(PostgresLoader::new())
///     .with_options(RunOptions { workers: 4, ..Default::default() })
///     .run(&base, &targets)
///     .await?;
///
/// for problem in report.summary().problem_targets.iter().take(10) {
///     println!("{}: {}", problem.target, problem.difference_count);
/// }
/// ```
pub struct Orchestrator {
    loader: Arc<dyn SchemaLoader>,
    diff_fn: DiffFn,
    options: RunOptions,
    events: EventSink,
}

impl Orchestrator {
    /// Create an orchestrator with default options and the standard diff engine.
    pub fn new(loader: impl SchemaLoader + 'static) -> Self {
        Self {
            loader: Arc::new(loader),
            diff_fn: Arc::new(crate::diff::diff),
            options: RunOptions::default(),
            events: EventSink::default(),
        }
    }

    pub fn with_options(mut self, options: RunOptions) -> Self {
        self.options = options;
        self
    }

    /// Replace the diff function.
    pub fn with_diff_fn<F>(mut self, diff_fn: F) -> Self
    where
        F: Fn(
                &SchemaSnapshot,
                &SchemaSnapshot,
                &DatabaseEndpoint,
                &DatabaseEndpoint,
            ) -> Vec<Difference>
            + Send
            + Sync
            + 'static,
    {
        self.diff_fn = Arc::new(diff_fn);
        self
    }

    /// Send progress events to `tx`. Sending never blocks.
    pub fn with_events(mut self, tx: mpsc::UnboundedSender<RunEvent>) -> Self {
        self.events = EventSink(Some(tx));
        self
    }

    pub fn options(&self) -> &RunOptions {
        &self.options
    }

    /// Compare every target against `base`.
    ///
    /// Fails only if the configuration is invalid or the base cannot be
    /// loaded. Target failures are recorded in the report.
    pub async fn run(
        &self,
        base: &DatabaseEndpoint,
        targets: &[DatabaseEndpoint],
    ) -> Result<RunReport> {
        self.options.validate()?;
        check_targets(targets)?;

        let started = Instant::now();
        let options = &self.options;

        tracing::info!(
            base = %base.display_name(),
            schema = %base.schema(),
            targets = targets.len(),
            workers = options.workers,
            batch_size = options.batch_size,
            "starting comparison run"
        );

        let base_snapshot = self.load_base(base).await?;
        tracing::info!(
            base = %base.display_name(),
            tables = base_snapshot.len(),
            columns = base_snapshot.column_count(),
            indexes = base_snapshot.index_count(),
            "base schema loaded"
        );
        self.events.emit(RunEvent::BaseLoaded {
            base: base.identity(),
            tables: base_snapshot.len(),
        });
        let base_tables = base_snapshot.len();

        let cx = Arc::new(WorkerContext {
            loader: self.loader.clone(),
            diff_fn: self.diff_fn.clone(),
            base_snapshot: Arc::new(base_snapshot),
            base_endpoint: base.clone(),
            timeout: options.target_timeout,
            events: self.events.clone(),
        });

        let (job_tx, job_rx) = mpsc::channel::<Job>(options.batch_size);
        let job_rx = Arc::new(Mutex::new(job_rx));
        let (result_tx, mut result_rx) = mpsc::unbounded_channel::<JobResult>();

        let mut workers = JoinSet::new();
        for id in 0..options.workers.min(targets.len()) {
            workers.spawn(worker(id, job_rx.clone(), result_tx.clone(), cx.clone()));
        }
        drop(result_tx);

        let mut merged: HashMap<String, JobResult> = HashMap::with_capacity(targets.len());
        let batches = targets.len().div_ceil(options.batch_size);

        for (index, batch) in targets.chunks(options.batch_size).enumerate() {
            tracing::info!(
                batch = index + 1,
                batches,
                size = batch.len(),
                "processing batch"
            );
            self.events.emit(RunEvent::BatchStarted {
                index,
                batches,
                size: batch.len(),
            });

            let mut pending: HashSet<&str> = HashSet::with_capacity(batch.len());
            for endpoint in batch {
                let job = Job {
                    endpoint: endpoint.clone(),
                };
                match job_tx.send(job).await {
                    Ok(()) => {
                        pending.insert(endpoint.name());
                    }
                    Err(_) => {
                        let error = Error::TaskFailed {
                            endpoint: endpoint.display_name().to_string(),
                            message: "no worker available".to_string(),
                        };
                        merged.insert(
                            endpoint.name().to_string(),
                            JobResult::failed(endpoint, error),
                        );
                    }
                }
            }

            while !pending.is_empty() {
                let Some(result) = result_rx.recv().await else {
                    break;
                };
                pending.remove(result.result.target.name.as_str());
                merged.insert(result.result.target.name.clone(), result);
            }

            // Only reachable if every worker is gone.
            for name in pending {
                if let Some(endpoint) = batch.iter().find(|e| e.name() == name) {
                    let error = Error::TaskFailed {
                        endpoint: endpoint.display_name().to_string(),
                        message: "worker pool stopped".to_string(),
                    };
                    merged.insert(name.to_string(), JobResult::failed(endpoint, error));
                }
            }

            self.events.emit(RunEvent::BatchFinished { index, batches });
        }

        drop(job_tx);
        shutdown(&mut workers, options.shutdown_grace).await;

        let outcomes: Vec<TargetOutcome> = targets
            .iter()
            .map(|endpoint| {
                let JobResult {
                    result,
                    differences,
                } = merged.remove(endpoint.name()).unwrap_or_else(|| {
                    JobResult::failed(
                        endpoint,
                        Error::TaskFailed {
                            endpoint: endpoint.display_name().to_string(),
                            message: "no result recorded".to_string(),
                        },
                    )
                });
                TargetOutcome {
                    endpoint: endpoint.clone(),
                    result,
                    differences,
                }
            })
            .collect();

        let failed = outcomes.iter().filter(|o| !o.result.success).count();
        let succeeded = outcomes.len() - failed;
        let elapsed = started.elapsed();

        tracing::info!(
            succeeded,
            failed,
            elapsed_ms = elapsed.as_millis() as u64,
            "comparison run finished"
        );
        self.events.emit(RunEvent::Finished {
            succeeded,
            failed,
            elapsed,
        });

        Ok(RunReport {
            base: base.identity(),
            base_tables,
            outcomes,
            elapsed,
        })
    }

    async fn load_base(&self, base: &DatabaseEndpoint) -> Result<SchemaSnapshot> {
        let load = self.loader.load(base);
        match self.options.target_timeout {
            Some(after) => tokio::time::timeout(after, load)
                .await
                .map_err(|_| Error::Timeout {
                    endpoint: base.display_name().to_string(),
                    after,
                })?,
            None => load.await,
        }
    }
}

fn check_targets(targets: &[DatabaseEndpoint]) -> std::result::Result<(), ConfigError> {
    if targets.is_empty() {
        return Err(ConfigError::NoTargets);
    }
    let mut seen = HashSet::with_capacity(targets.len());
    for target in targets {
        if !seen.insert(target.name()) {
            return Err(ConfigError::DuplicateTarget {
                name: target.name().to_string(),
            });
        }
    }
    Ok(())
}

async fn shutdown(workers: &mut JoinSet<()>, grace: Duration) {
    let drained = tokio::time::timeout(grace, async {
        while let Some(joined) = workers.join_next().await {
            if let Err(e) = joined {
                tracing::warn!("worker ended abnormally: {}", e);
            }
        }
    })
    .await;

    if drained.is_err() {
        tracing::warn!(
            remaining = workers.len(),
            "workers did not stop within {}s, aborting",
            grace.as_secs()
        );
        workers.abort_all();
    }
}

struct Job {
    endpoint: DatabaseEndpoint,
}

struct JobResult {
    result: RunResult,
    differences: Vec<Difference>,
}

impl JobResult {
    fn failed(endpoint: &DatabaseEndpoint, error: Error) -> Self {
        Self {
            result: RunResult::failed(endpoint.identity(), error, Duration::ZERO),
            differences: Vec::new(),
        }
    }
}

struct WorkerContext {
    loader: Arc<dyn SchemaLoader>,
    diff_fn: DiffFn,
    base_snapshot: Arc<SchemaSnapshot>,
    base_endpoint: DatabaseEndpoint,
    timeout: Option<Duration>,
    events: EventSink,
}

async fn worker(
    id: usize,
    jobs: Arc<Mutex<mpsc::Receiver<Job>>>,
    results: mpsc::UnboundedSender<JobResult>,
    cx: Arc<WorkerContext>,
) {
    loop {
        let job = jobs.lock().await.recv().await;
        let Some(job) = job else {
            break;
        };
        let result = process(&cx, job.endpoint).await;
        if results.send(result).is_err() {
            break;
        }
    }
    tracing::debug!(worker = id, "worker stopped");
}

/// Load and diff one target, turning every failure mode into a failed result.
async fn process(cx: &Arc<WorkerContext>, endpoint: DatabaseEndpoint) -> JobResult {
    let target = endpoint.identity();
    cx.events.emit(RunEvent::TargetStarted {
        target: target.clone(),
    });
    tracing::debug!(endpoint = %target, schema = %target.schema, "comparing target");

    let started = Instant::now();
    let task_cx = cx.clone();
    let task_endpoint = endpoint.clone();
    let mut handle = tokio::spawn(async move { task_cx.compare(&task_endpoint).await });

    let joined = match cx.timeout {
        Some(after) => match tokio::time::timeout(after, &mut handle).await {
            Ok(joined) => Some(joined),
            Err(_) => {
                handle.abort();
                None
            }
        },
        None => Some(handle.await),
    };

    let outcome = match joined {
        Some(Ok(Ok(differences))) => Ok(differences),
        Some(Ok(Err(e))) => Err(e),
        Some(Err(join_error)) => Err(Error::TaskFailed {
            endpoint: target.display_name.clone(),
            message: describe_join_error(join_error),
        }),
        None => Err(Error::Timeout {
            endpoint: target.display_name.clone(),
            after: cx.timeout.unwrap_or_default(),
        }),
    };
    let elapsed = started.elapsed();

    let job_result = match outcome {
        Ok(differences) => {
            tracing::info!(
                endpoint = %target,
                differences = differences.len(),
                elapsed_ms = elapsed.as_millis() as u64,
                "target compared"
            );
            JobResult {
                result: RunResult::succeeded(target.clone(), differences.len(), elapsed),
                differences,
            }
        }
        Err(error) => {
            tracing::warn!(
                endpoint = %target,
                kind = %error.kind(),
                "target failed: {}",
                error
            );
            JobResult {
                result: RunResult::failed(target.clone(), error, elapsed),
                differences: Vec::new(),
            }
        }
    };

    cx.events.emit(RunEvent::TargetFinished {
        target,
        success: job_result.result.success,
        difference_count: job_result.result.difference_count,
        error: job_result.result.error.as_ref().map(ToString::to_string),
        elapsed,
    });

    job_result
}

impl WorkerContext {
    async fn compare(&self, endpoint: &DatabaseEndpoint) -> Result<Vec<Difference>> {
        let snapshot = self.loader.load(endpoint).await?;
        tracing::debug!(
            endpoint = %endpoint.display_name(),
            tables = snapshot.len(),
            "target schema loaded"
        );
        Ok((self.diff_fn)(
            &self.base_snapshot,
            &snapshot,
            &self.base_endpoint,
            endpoint,
        ))
    }
}

fn describe_join_error(error: JoinError) -> String {
    if error.is_cancelled() {
        return "task was cancelled".to_string();
    }
    match error.try_into_panic() {
        Ok(payload) => {
            if let Some(msg) = payload.downcast_ref::<&str>() {
                format!("panicked: {}", msg)
            } else if let Some(msg) = payload.downcast_ref::<String>() {
                format!("panicked: {}", msg)
            } else {
                "panicked".to_string()
            }
        }
        Err(error) => error.to_string(),
    }
}
