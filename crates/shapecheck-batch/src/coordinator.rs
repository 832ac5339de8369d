//! Fan work units out to a worker pool and merge results back.
//!
//! The coordinator owns the pool and is driven from a single thread.
//! Each unit is encoded before it crosses to a worker, so a worker never
//! shares state with the coordinator; results come back over a channel
//! tagged with their task id. A unit whose worker fails, panics, or takes
//! too long is generated again in process, so every dispatched unit
//! resolves exactly once.

use crate::executor::{GeneratorExecutor, UnitExecutor};
use crate::unit::{TaskId, UnitOutput, WorkResult, WorkUnit, WorkerError, generate_unit};
use rayon::{ThreadPool, ThreadPoolBuilder};
use serde::Serialize;
use shapecheck_cache::SchemaCache;
use shapecheck_config::ParallelConfig;
use shapecheck_gen::GenerateOptions;
use shapecheck_ir::{Diagnostic, DiagnosticKind, TypeArena, TypeId};
use shapecheck_resolver::RuleSet;
use std::any::Any;
use std::collections::HashMap;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::mpsc::{self, Receiver, Sender};
use std::thread;
use std::time::{Duration, Instant};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CoordinatorConfig {
    pub workers: usize,
    /// Declarations per unit when planning.
    pub batch_size: usize,
    pub task_timeout: Duration,
    pub shutdown_timeout: Duration,
}

impl From<&ParallelConfig> for CoordinatorConfig {
    fn from(config: &ParallelConfig) -> Self {
        Self {
            workers: config.worker_count(),
            batch_size: config.batch_size(),
            task_timeout: Duration::from_millis(config.task_timeout_ms),
            shutdown_timeout: Duration::from_millis(config.shutdown_timeout_ms),
        }
    }
}

impl Default for CoordinatorConfig {
    fn default() -> Self {
        Self::from(&ParallelConfig::default())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum BatchError {
    #[error("task {0} was cancelled by shutdown")]
    Cancelled(TaskId),
    #[error("task {0} is unknown or was already collected")]
    UnknownTask(TaskId),
}

/// Handle for one dispatched unit; redeem it with
/// [`BatchCoordinator::wait`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TaskHandle {
    task_id: TaskId,
}

impl TaskHandle {
    pub fn task_id(&self) -> TaskId {
        self.task_id
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CoordinatorStats {
    pub dispatched: u64,
    pub completed_in_worker: u64,
    /// Units generated in process after a worker error, panic or timeout.
    pub fallbacks: u64,
    pub timeouts: u64,
    pub cancelled: u64,
}

/// Outcome of [`BatchCoordinator::shutdown`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ShutdownReport {
    /// Tasks resolved as cancelled.
    pub cancelled: u64,
    /// Worker threads that exited within the timeout.
    pub joined: usize,
    /// Worker threads still running when the timeout ran out.
    pub abandoned: usize,
}

struct PendingTask {
    unit: WorkUnit,
    /// False when the unit never reached a worker and runs in process.
    in_worker: bool,
}

pub struct BatchCoordinator<E: UnitExecutor = GeneratorExecutor> {
    config: CoordinatorConfig,
    executor: Arc<E>,
    pool: Option<ThreadPool>,
    sender: Sender<WorkResult>,
    receiver: Receiver<WorkResult>,
    pending: HashMap<TaskId, PendingTask>,
    resolved: HashMap<TaskId, Result<UnitOutput, BatchError>>,
    next_task: u64,
    cancelled: Arc<AtomicBool>,
    exited: Arc<AtomicUsize>,
    stats: CoordinatorStats,
    diagnostics: Vec<Diagnostic>,
}

impl BatchCoordinator<GeneratorExecutor> {
    pub fn new(config: CoordinatorConfig) -> Self {
        Self::with_executor(config, GeneratorExecutor)
    }
}

impl<E: UnitExecutor> BatchCoordinator<E> {
    pub fn with_executor(config: CoordinatorConfig, executor: E) -> Self {
        let exited = Arc::new(AtomicUsize::new(0));
        let pool = build_pool(config.workers.max(1), Arc::clone(&exited));
        let (sender, receiver) = mpsc::channel();
        Self {
            config,
            executor: Arc::new(executor),
            pool,
            sender,
            receiver,
            pending: HashMap::new(),
            resolved: HashMap::new(),
            next_task: 0,
            cancelled: Arc::new(AtomicBool::new(false)),
            exited,
            stats: CoordinatorStats::default(),
            diagnostics: Vec::new(),
        }
    }

    pub fn config(&self) -> &CoordinatorConfig {
        &self.config
    }

    /// Whether units still go to a worker pool. False once shut down or
    /// if the pool could not be built.
    pub fn is_parallel(&self) -> bool {
        self.pool.is_some()
    }

    pub fn stats(&self) -> CoordinatorStats {
        self.stats
    }

    /// Worker failures seen so far.
    pub fn diagnostics(&self) -> &[Diagnostic] {
        &self.diagnostics
    }

    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    /// Split `ids` into units of at most `batch_size` roots, assigning
    /// fresh task ids.
    pub fn plan(
        &mut self,
        arena: &TypeArena,
        ids: &[TypeId],
        rules: &RuleSet,
        options: &GenerateOptions,
    ) -> Vec<WorkUnit> {
        let size = self.config.batch_size.max(1);
        let mut units = Vec::with_capacity(ids.len().div_ceil(size));
        for chunk in ids.chunks(size) {
            self.next_task += 1;
            units.push(WorkUnit::new(
                TaskId(self.next_task),
                arena,
                chunk.to_vec(),
                rules,
                options.clone(),
            ));
        }
        units
    }

    /// Hand a unit to the pool. Without a pool the unit is kept and
    /// generated in process when waited on.
    pub fn dispatch(&mut self, unit: WorkUnit) -> TaskHandle {
        let task_id = unit.task_id;
        self.stats.dispatched += 1;

        let encoded = self.pool.as_ref().map(|_| unit.encode());
        let in_worker = match encoded {
            Some(Ok(bytes)) => {
                self.spawn(task_id, bytes);
                true
            }
            Some(Err(err)) => {
                self.record_fallback(task_id, &err);
                false
            }
            None => false,
        };
        tracing::debug!(task = %task_id, roots = unit.roots.len(), in_worker, "dispatched unit");
        self.pending.insert(task_id, PendingTask { unit, in_worker });
        TaskHandle { task_id }
    }

    /// Block until the task resolves, merging other results that arrive
    /// meanwhile. Generated schemas are written into `cache`.
    ///
    /// Each handle can be redeemed once.
    pub fn wait(
        &mut self,
        handle: TaskHandle,
        cache: &mut SchemaCache,
    ) -> Result<UnitOutput, BatchError> {
        let task_id = handle.task_id;
        let deadline = Instant::now() + self.config.task_timeout;
        loop {
            if let Some(result) = self.resolved.remove(&task_id) {
                return result;
            }
            let in_worker = match self.pending.get(&task_id) {
                Some(task) => task.in_worker,
                None => return Err(BatchError::UnknownTask(task_id)),
            };
            if !in_worker {
                self.run_in_process(task_id, cache);
                continue;
            }
            let remaining = deadline.saturating_duration_since(Instant::now());
            match self.receiver.recv_timeout(remaining) {
                Ok(result) => self.merge(result, cache),
                Err(_) => {
                    self.stats.timeouts += 1;
                    let err = WorkerError::TimedOut(self.config.task_timeout.as_millis() as u64);
                    self.fall_back(task_id, &err, cache);
                }
            }
        }
    }

    /// Dispatch every unit and wait for all of them. Results are in unit
    /// order regardless of completion order.
    pub fn run(
        &mut self,
        units: Vec<WorkUnit>,
        cache: &mut SchemaCache,
    ) -> Vec<Result<UnitOutput, BatchError>> {
        let handles: Vec<TaskHandle> = units.into_iter().map(|u| self.dispatch(u)).collect();
        handles.into_iter().map(|h| self.wait(h, cache)).collect()
    }

    /// Stop the pool.
    ///
    /// Units not yet started are skipped by their workers. Results that
    /// arrive within the shutdown timeout are merged; every task still
    /// pending after that resolves as [`BatchError::Cancelled`]. Worker
    /// threads then get another timeout to exit before they are
    /// abandoned. Units dispatched afterwards run in process.
    pub fn shutdown(&mut self, cache: &mut SchemaCache) -> ShutdownReport {
        self.cancelled.store(true, Ordering::Release);
        let cancelled_before = self.stats.cancelled;

        let deadline = Instant::now() + self.config.shutdown_timeout;
        while self.pending.values().any(|task| task.in_worker) {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                break;
            }
            match self.receiver.recv_timeout(remaining) {
                Ok(result) => self.merge(result, cache),
                Err(_) => break,
            }
        }

        let mut stranded: Vec<TaskId> = self.pending.keys().copied().collect();
        stranded.sort();
        for task_id in stranded {
            self.pending.remove(&task_id);
            self.cancel(task_id);
        }

        let spawned = match self.pool.take() {
            Some(pool) => {
                drop(pool);
                self.config.workers.max(1)
            }
            None => 0,
        };
        let join_deadline = Instant::now() + self.config.shutdown_timeout;
        while self.exited.load(Ordering::Acquire) < spawned && Instant::now() < join_deadline {
            thread::sleep(Duration::from_millis(5));
        }
        let joined = self.exited.load(Ordering::Acquire).min(spawned);

        let report = ShutdownReport {
            cancelled: self.stats.cancelled - cancelled_before,
            joined,
            abandoned: spawned - joined,
        };
        if report.abandoned > 0 {
            tracing::warn!(
                abandoned = report.abandoned,
                "worker threads did not exit within {} ms",
                self.config.shutdown_timeout.as_millis()
            );
        }
        tracing::debug!(?report, "coordinator shut down");
        report
    }

    fn spawn(&self, task_id: TaskId, bytes: Vec<u8>) {
        let Some(pool) = &self.pool else {
            return;
        };
        let executor = Arc::clone(&self.executor);
        let sender = self.sender.clone();
        let cancelled = Arc::clone(&self.cancelled);
        pool.spawn(move || {
            let outcome = if cancelled.load(Ordering::Acquire) {
                Err(WorkerError::Cancelled)
            } else {
                panic::catch_unwind(AssertUnwindSafe(|| {
                    let unit = WorkUnit::decode(&bytes)?;
                    executor.execute(&unit)
                }))
                .unwrap_or_else(|payload| Err(WorkerError::Panicked(panic_message(&*payload))))
            };
            // the coordinator may be gone already
            let _ = sender.send(WorkResult { task_id, outcome });
        });
    }

    fn merge(&mut self, result: WorkResult, cache: &mut SchemaCache) {
        let WorkResult { task_id, outcome } = result;
        if !self.pending.contains_key(&task_id) {
            tracing::debug!(task = %task_id, "discarding late result");
            return;
        }
        match outcome {
            Ok(output) => {
                self.pending.remove(&task_id);
                self.stats.completed_in_worker += 1;
                self.commit(task_id, output, cache);
            }
            Err(WorkerError::Cancelled) => {
                self.pending.remove(&task_id);
                self.cancel(task_id);
            }
            Err(err) => self.fall_back(task_id, &err, cache),
        }
    }

    fn fall_back(&mut self, task_id: TaskId, err: &WorkerError, cache: &mut SchemaCache) {
        self.record_fallback(task_id, err);
        self.run_in_process(task_id, cache);
    }

    fn record_fallback(&mut self, task_id: TaskId, err: &WorkerError) {
        tracing::warn!(task = %task_id, "{err}; generating in process");
        self.stats.fallbacks += 1;
        self.diagnostics.push(Diagnostic::warning(
            DiagnosticKind::Worker,
            format!("task {task_id}: {err}; generated in process"),
        ));
    }

    fn run_in_process(&mut self, task_id: TaskId, cache: &mut SchemaCache) {
        if let Some(task) = self.pending.remove(&task_id) {
            let output = generate_unit(&task.unit);
            self.commit(task_id, output, cache);
        }
    }

    fn commit(&mut self, task_id: TaskId, output: UnitOutput, cache: &mut SchemaCache) {
        for schema in &output.schemas {
            cache.insert(schema.clone());
        }
        self.resolved.insert(task_id, Ok(output));
    }

    fn cancel(&mut self, task_id: TaskId) {
        self.stats.cancelled += 1;
        self.resolved
            .insert(task_id, Err(BatchError::Cancelled(task_id)));
    }
}

impl<E: UnitExecutor> Drop for BatchCoordinator<E> {
    fn drop(&mut self) {
        // queued units have nobody to report to
        self.cancelled.store(true, Ordering::Release);
    }
}

fn build_pool(workers: usize, exited: Arc<AtomicUsize>) -> Option<ThreadPool> {
    let result = ThreadPoolBuilder::new()
        .num_threads(workers)
        .thread_name(|i| format!("shapecheck-worker-{i}"))
        .panic_handler(|payload| {
            tracing::error!("worker panicked outside a unit: {}", panic_message(&*payload));
        })
        .exit_handler(move |_| {
            exited.fetch_add(1, Ordering::AcqRel);
        })
        .build();
    match result {
        Ok(pool) => Some(pool),
        Err(err) => {
            tracing::warn!("cannot start worker pool: {err}; generating in process");
            None
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic payload".to_string()
    }
}
