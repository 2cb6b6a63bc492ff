//! Multi-thread invoker.
//!
//! A trial spawns K named OS threads against one shared [`ScriptEngine`].
//! Each worker owns its [`ExecutionContext`], loads the mapper module (a
//! code-cache hit after the first load), transforms its own fixture copy and
//! sends the outcome on a per-trial channel. The caller waits on that channel
//! against a single deadline.
//!
//! ```text
//!            ┌── worker-0: context ─ load ─ invoke ─┐
//! run_trial ─┼── worker-1: ...                       ├─▶ channel ─▶ TrialReport
//!            └── worker-K: ...                       ┘     │
//!                                                   deadline ─▶ TrialTimeout
//! ```
//!
//! Workers still running when the deadline passes are left detached; their
//! results are dropped with the channel.

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::mpsc::{self, RecvTimeoutError};
use std::thread;
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use transbench_core::{Decoder, DerivedRecord, Fixture};

use crate::context::ExecutionContext;
use crate::engine::ScriptEngine;
use crate::error::{InvokeError, WorkerError};

/// Default number of worker threads per trial.
pub const DEFAULT_WORKERS: usize = 4;

/// Default time to wait for every worker of a trial.
pub const DEFAULT_DEADLINE: Duration = Duration::from_secs(5);

/// Which invocation style the workers use.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum InvocationMode {
    /// Object maps in, generic result decoded.
    Generic,
    /// Host records in, result projected.
    #[default]
    Typed,
}

/// One worker's successful outcome.
#[derive(Debug, Clone)]
pub struct WorkerReport {
    pub worker: usize,
    pub elapsed: Duration,
    pub records: Vec<DerivedRecord>,
}

/// One worker's failure.
#[derive(Debug)]
pub struct WorkerFailure {
    pub worker: usize,
    pub error: WorkerError,
}

/// Outcome of a trial in which every worker reported.
#[derive(Debug)]
pub struct TrialReport {
    pub workers: Vec<WorkerReport>,
    pub failures: Vec<WorkerFailure>,
}

impl TrialReport {
    pub fn is_success(&self) -> bool {
        self.failures.is_empty()
    }

    /// Sum of per-worker elapsed times.
    pub fn worker_time(&self) -> Duration {
        self.workers.iter().map(|w| w.elapsed).sum()
    }
}

/// Not every worker reported before the deadline.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{pending} of {workers} workers still running after {deadline:?} ({completed} completed)")]
pub struct TrialTimeout {
    pub workers: usize,
    pub completed: usize,
    pub pending: usize,
    pub deadline: Duration,
}

/// Runs a mapper module on several threads at once.
#[derive(Clone)]
pub struct ParallelInvoker {
    engine: Arc<ScriptEngine>,
    script: PathBuf,
    workers: usize,
    deadline: Duration,
    mode: InvocationMode,
    decoder: Decoder,
}

impl ParallelInvoker {
    pub fn new(engine: Arc<ScriptEngine>, script: impl Into<PathBuf>) -> Self {
        Self {
            engine,
            script: script.into(),
            workers: DEFAULT_WORKERS,
            deadline: DEFAULT_DEADLINE,
            mode: InvocationMode::default(),
            decoder: Decoder::default(),
        }
    }

    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers;
        self
    }

    pub fn with_deadline(mut self, deadline: Duration) -> Self {
        self.deadline = deadline;
        self
    }

    pub fn with_mode(mut self, mode: InvocationMode) -> Self {
        self.mode = mode;
        self
    }

    /// Decoder used by workers in [`InvocationMode::Generic`].
    pub fn with_decoder(mut self, decoder: Decoder) -> Self {
        self.decoder = decoder;
        self
    }

    pub fn engine(&self) -> &Arc<ScriptEngine> {
        &self.engine
    }

    pub fn script(&self) -> &Path {
        &self.script
    }

    pub fn workers(&self) -> usize {
        self.workers
    }

    /// Run one trial.
    ///
    /// Returns `Err` only when the deadline elapses. Worker failures,
    /// including panics, spawn errors and workers that exit without
    /// reporting, are reported in
    /// [`TrialReport::failures`].
    pub fn run_trial(&self, fixture: &Fixture) -> Result<TrialReport, TrialTimeout> {
        let started = Instant::now();
        let deadline = started + self.deadline;
        let (tx, rx) = mpsc::channel::<WorkerMessage>();

        let mut failures = Vec::new();
        let mut spawned = Vec::with_capacity(self.workers);

        for worker in 0..self.workers {
            let tx = tx.clone();
            let engine = Arc::clone(&self.engine);
            let script = self.script.clone();
            let fixture = fixture.clone();
            let mode = self.mode;
            let decoder = self.decoder;

            let handle = thread::Builder::new()
                .name(format!("transbench-worker-{worker}"))
                .spawn(move || {
                    let result = panic::catch_unwind(AssertUnwindSafe(|| {
                        run_worker(worker, engine, &script, &fixture, mode, &decoder)
                    }))
                    .unwrap_or_else(|payload| Err(WorkerError::Panicked(panic_message(&*payload))));
                    // The receiver is gone once the trial timed out.
                    let _ = tx.send((worker, result));
                });

            match handle {
                Ok(_) => spawned.push(worker),
                Err(e) => {
                    tracing::warn!(worker, error = %e, "Failed to spawn worker");
                    failures.push(WorkerFailure {
                        worker,
                        error: WorkerError::Spawn(e),
                    });
                }
            }
        }
        drop(tx);

        let mut workers = match collect(&rx, &spawned, deadline, &mut failures) {
            Ok(workers) => workers,
            Err(completed) => {
                let timeout = TrialTimeout {
                    workers: self.workers,
                    completed,
                    pending: spawned.len() - completed,
                    deadline: self.deadline,
                };
                tracing::warn!(%timeout, "Trial timed out");
                return Err(timeout);
            }
        };

        workers.sort_by_key(|w| w.worker);
        failures.sort_by_key(|f| f.worker);

        tracing::debug!(
            workers = workers.len(),
            failures = failures.len(),
            wall_time_us = started.elapsed().as_micros() as u64,
            "Trial finished"
        );

        Ok(TrialReport { workers, failures })
    }
}

type WorkerMessage = (usize, Result<WorkerReport, WorkerError>);

/// Wait for every spawned worker until `deadline`.
///
/// Failures are appended to `failures`. A worker whose sender is dropped
/// without a message is recorded as [`WorkerError::Disconnected`]. Returns
/// the number of workers that reported when the deadline passes.
fn collect(
    rx: &mpsc::Receiver<WorkerMessage>,
    spawned: &[usize],
    deadline: Instant,
    failures: &mut Vec<WorkerFailure>,
) -> Result<Vec<WorkerReport>, usize> {
    let mut pending: Vec<usize> = spawned.to_vec();
    let mut workers = Vec::with_capacity(spawned.len());

    while !pending.is_empty() {
        let remaining = deadline.saturating_duration_since(Instant::now());
        match rx.recv_timeout(remaining) {
            Ok((worker, result)) => {
                pending.retain(|&w| w != worker);
                match result {
                    Ok(report) => workers.push(report),
                    Err(error) => {
                        tracing::warn!(worker, error = %error, "Worker failed");
                        failures.push(WorkerFailure { worker, error });
                    }
                }
            }
            Err(RecvTimeoutError::Timeout) => return Err(spawned.len() - pending.len()),
            Err(RecvTimeoutError::Disconnected) => {
                for worker in pending.drain(..) {
                    tracing::warn!(worker, "Worker exited without reporting");
                    failures.push(WorkerFailure {
                        worker,
                        error: WorkerError::Disconnected,
                    });
                }
            }
        }
    }

    Ok(workers)
}

fn run_worker(
    worker: usize,
    engine: Arc<ScriptEngine>,
    script: &Path,
    fixture: &Fixture,
    mode: InvocationMode,
    decoder: &Decoder,
) -> Result<WorkerReport, WorkerError> {
    let started = Instant::now();
    let mut context = ExecutionContext::new(engine);
    let module = context.load_module(script)?;

    let records = match mode {
        InvocationMode::Typed => context.invoke_typed(&module, fixture)?,
        InvocationMode::Generic => context
            .invoke_generic(&module, fixture)?
            .decode(decoder)
            .map_err(InvokeError::from)?,
    };

    Ok(WorkerReport {
        worker,
        elapsed: started.elapsed(),
        records,
    })
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
