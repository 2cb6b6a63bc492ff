//! Timing driver.
//!
//! Runs one variant at a time: prepare, warm-up calls (outputs optionally
//! checked against the mapping laws), then measured calls whose elapsed times
//! are truncated to whole units and summed.

use std::fmt;
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use transbench_core::{DerivedRecord, Fixture, MappingViolation, verify};
use transbench_script::{InvokeError, LoadError, TrialTimeout, WorkerFailure};

/// Unit in which per-call elapsed times are truncated and summed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TimeUnit {
    Millis,
    #[default]
    Micros,
    Nanos,
}

impl TimeUnit {
    /// Whole units in `duration`, fractions dropped.
    pub fn whole(self, duration: Duration) -> u128 {
        match self {
            Self::Millis => duration.as_millis(),
            Self::Micros => duration.as_micros(),
            Self::Nanos => duration.as_nanos(),
        }
    }

    pub fn symbol(self) -> &'static str {
        match self {
            Self::Millis => "ms",
            Self::Micros => "µs",
            Self::Nanos => "ns",
        }
    }
}

/// Output of one successful call.
#[derive(Debug, Clone, Default)]
pub struct CallOutput {
    /// One record sequence per produced output (one per worker for
    /// parallel trials).
    pub outputs: Vec<Vec<DerivedRecord>>,
    /// Time spent converting the engine result into records, when the
    /// variant has a separate conversion step.
    pub decode: Option<Duration>,
    /// Sum of the elapsed times the workers measured themselves, for
    /// variants that run several workers per call.
    pub workers: Option<Duration>,
}

impl CallOutput {
    pub fn single(records: Vec<DerivedRecord>) -> Self {
        Self {
            outputs: vec![records],
            ..Default::default()
        }
    }

    pub fn with_decode(mut self, decode: Duration) -> Self {
        self.decode = Some(decode);
        self
    }

    pub fn with_workers(mut self, workers: Duration) -> Self {
        self.workers = Some(workers);
        self
    }
}

/// A single call failed. Counted and excluded from the sum.
#[derive(Error, Debug)]
pub enum CallError {
    #[error(transparent)]
    Declarative(#[from] transbench_declarative::Error),

    #[error(transparent)]
    Invoke(#[from] InvokeError),

    #[error("{} of {total} workers failed, first: {}", .failures.len(), first_failure(.failures))]
    Workers {
        total: usize,
        failures: Vec<WorkerFailure>,
    },

    #[error(transparent)]
    Timeout(#[from] TrialTimeout),
}

fn first_failure(failures: &[WorkerFailure]) -> String {
    failures
        .first()
        .map(|f| format!("worker {}: {}", f.worker, f.error))
        .unwrap_or_default()
}

/// A variant could not be run at all.
#[derive(Error, Debug)]
pub enum VariantError {
    #[error(transparent)]
    Compile(#[from] transbench_declarative::Error),

    #[error(transparent)]
    Load(#[from] LoadError),

    #[error("warm-up output violates the mapping: {0}")]
    Verification(#[from] MappingViolation),
}

/// A benchmark variant before preparation.
pub trait Variant {
    /// Name printed in the summary line.
    fn name(&self) -> String;

    /// Compile or load the transformation and generate the fixture.
    fn prepare(&self) -> Result<Box<dyn PreparedVariant>, VariantError>;
}

/// A variant ready to be called repeatedly.
pub trait PreparedVariant {
    /// Fixture every call transforms.
    fn fixture(&self) -> &Fixture;

    fn call(&mut self) -> Result<CallOutput, CallError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Warmup,
    Measured,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Warmup => write!(f, "warmup"),
            Self::Measured => write!(f, "measured"),
        }
    }
}

/// Aggregates of a completed variant run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Totals {
    /// Sum of whole-unit elapsed times of successful measured calls.
    pub total: u128,
    /// Sum of whole-unit decode times, for variants that decode.
    pub decode: Option<u128>,
    /// Sum of whole-unit per-worker times, for multi-worker variants.
    pub workers: Option<u128>,
    pub succeeded: usize,
    pub failed: usize,
    pub timed_out: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Completed(Totals),
    Aborted(String),
}

/// Result of running one variant.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VariantReport {
    pub name: String,
    pub unit: TimeUnit,
    pub outcome: Outcome,
}

impl VariantReport {
    pub fn is_aborted(&self) -> bool {
        matches!(self.outcome, Outcome::Aborted(_))
    }
}

impl fmt::Display for VariantReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let unit = self.unit.symbol();
        match &self.outcome {
            Outcome::Aborted(reason) => write!(f, "{}: aborted: {reason}", self.name),
            Outcome::Completed(totals) => {
                write!(f, "{}: {} {unit}", self.name, totals.total)?;
                if let Some(decode) = totals.decode {
                    write!(f, " (decode {decode} {unit})")?;
                }
                if let Some(workers) = totals.workers {
                    write!(f, " (workers {workers} {unit})")?;
                }
                if totals.failed > 0 {
                    write!(f, " [{} failed]", totals.failed)?;
                }
                if totals.timed_out > 0 {
                    write!(f, " [{} timed out]", totals.timed_out)?;
                }
                Ok(())
            }
        }
    }
}

/// Runs variants with fixed warm-up and measured call counts.
#[derive(Debug, Clone)]
pub struct Driver {
    pub warmup: usize,
    pub iterations: usize,
    pub unit: TimeUnit,
    pub verify: bool,
}

impl Default for Driver {
    fn default() -> Self {
        Self {
            warmup: 100,
            iterations: 1000,
            unit: TimeUnit::default(),
            verify: true,
        }
    }
}

impl Driver {
    pub fn run(&self, variant: &dyn Variant) -> VariantReport {
        let name = variant.name();
        let outcome = match self.run_phases(&name, variant) {
            Ok(totals) => Outcome::Completed(totals),
            Err(e) => {
                tracing::error!(variant = %name, error = %e, "Variant aborted");
                Outcome::Aborted(e.to_string())
            }
        };

        VariantReport {
            name,
            unit: self.unit,
            outcome,
        }
    }

    fn run_phases(&self, name: &str, variant: &dyn Variant) -> Result<Totals, VariantError> {
        let mut prepared = variant.prepare()?;
        tracing::info!(variant = %name, records = prepared.fixture().len(), "Variant prepared");

        for _ in 0..self.warmup {
            match prepared.call() {
                Ok(output) if self.verify => {
                    for records in &output.outputs {
                        verify::check(prepared.fixture(), records)?;
                    }
                }
                Ok(_) => {}
                Err(e) => log_call_error(name, Phase::Warmup, &e),
            }
        }
        tracing::info!(variant = %name, calls = self.warmup, "Warm-up finished");

        let mut totals = Totals::default();
        for _ in 0..self.iterations {
            let started = Instant::now();
            let result = prepared.call();
            let elapsed = started.elapsed();

            match result {
                Ok(output) => {
                    totals.succeeded += 1;
                    totals.total += self.unit.whole(elapsed);
                    if let Some(decode) = output.decode {
                        *totals.decode.get_or_insert(0) += self.unit.whole(decode);
                    }
                    if let Some(workers) = output.workers {
                        *totals.workers.get_or_insert(0) += self.unit.whole(workers);
                    }
                }
                Err(CallError::Timeout(timeout)) => {
                    totals.timed_out += 1;
                    tracing::warn!(variant = %name, %timeout, "Trial timed out, excluded from total");
                }
                Err(e) => {
                    totals.failed += 1;
                    log_call_error(name, Phase::Measured, &e);
                }
            }
        }

        tracing::info!(
            variant = %name,
            succeeded = totals.succeeded,
            failed = totals.failed,
            timed_out = totals.timed_out,
            "Measured calls finished"
        );
        Ok(totals)
    }
}

fn log_call_error(name: &str, phase: Phase, error: &CallError) {
    tracing::warn!(variant = %name, %phase, error = %error, "Call failed");
}
