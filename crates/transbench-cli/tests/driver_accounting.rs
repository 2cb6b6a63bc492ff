//! Driver accounting with scripted fake variants.

use std::cell::Cell;
use std::rc::Rc;
use std::time::Duration;

use transbench_core::{DerivedRecord, Fixture, SourceRecord};
use transbench_cli::driver::{
    CallError, CallOutput, Driver, Outcome, PreparedVariant, TimeUnit, Variant, VariantError,
};
use transbench_script::TrialTimeout;

#[derive(Clone, Copy)]
enum Step {
    Ok,
    Workers,
    Wrong,
    Timeout,
    Fail,
}

/// Replays `steps` in order, then keeps returning correct output.
struct Fake {
    steps: Vec<Step>,
    calls: Rc<Cell<usize>>,
    prepare_fails: bool,
}

struct PreparedFake {
    steps: Vec<Step>,
    calls: Rc<Cell<usize>>,
    fixture: Fixture,
}

fn fixture() -> Fixture {
    Fixture::from(vec![
        SourceRecord::new("el1", "el2", -5),
        SourceRecord::new("el1", "el2", 7),
    ])
}

impl Variant for Fake {
    fn name(&self) -> String {
        "fake".to_string()
    }

    fn prepare(&self) -> Result<Box<dyn PreparedVariant>, VariantError> {
        if self.prepare_fails {
            return Err(VariantError::Compile(
                transbench_declarative::Error::Compile("bad program".into()),
            ));
        }
        Ok(Box::new(PreparedFake {
            steps: self.steps.clone(),
            calls: Rc::clone(&self.calls),
            fixture: fixture(),
        }))
    }
}

impl PreparedVariant for PreparedFake {
    fn fixture(&self) -> &Fixture {
        &self.fixture
    }

    fn call(&mut self) -> Result<CallOutput, CallError> {
        let n = self.calls.get();
        self.calls.set(n + 1);

        let correct: Vec<DerivedRecord> = self
            .fixture
            .iter()
            .map(DerivedRecord::expected_from)
            .collect();

        match self.steps.get(n).copied().unwrap_or(Step::Ok) {
            Step::Ok => Ok(CallOutput::single(correct).with_decode(Duration::from_micros(1))),
            Step::Workers => Ok(CallOutput::single(correct).with_workers(Duration::from_micros(3))),
            Step::Wrong => Ok(CallOutput::single(vec![DerivedRecord::new("x", "y", -1.0)])),
            Step::Timeout => Err(CallError::Timeout(TrialTimeout {
                workers: 4,
                completed: 3,
                pending: 1,
                deadline: Duration::from_secs(5),
            })),
            Step::Fail => Err(CallError::Declarative(
                transbench_declarative::Error::Cardinality(0),
            )),
        }
    }
}

fn fake(steps: Vec<Step>) -> (Fake, Rc<Cell<usize>>) {
    let calls = Rc::new(Cell::new(0));
    let variant = Fake {
        steps,
        calls: Rc::clone(&calls),
        prepare_fails: false,
    };
    (variant, calls)
}

fn driver(warmup: usize, iterations: usize) -> Driver {
    Driver {
        warmup,
        iterations,
        unit: TimeUnit::Nanos,
        verify: true,
    }
}

#[test]
fn test_runs_warmup_then_measured_calls() {
    let (variant, calls) = fake(vec![]);
    let report = driver(3, 5).run(&variant);

    assert_eq!(calls.get(), 8);
    match report.outcome {
        Outcome::Completed(totals) => {
            assert_eq!(totals.succeeded, 5);
            assert_eq!(totals.decode, Some(5_000));
        }
        Outcome::Aborted(reason) => panic!("aborted: {reason}"),
    }
}

#[test]
fn test_timeouts_and_failures_are_excluded() {
    // No warm-up: steps index measured calls directly.
    let (variant, _) = fake(vec![Step::Ok, Step::Timeout, Step::Fail, Step::Ok]);
    let report = driver(0, 4).run(&variant);

    let Outcome::Completed(totals) = report.outcome.clone() else {
        panic!("variant aborted");
    };
    assert_eq!(totals.succeeded, 2);
    assert_eq!(totals.failed, 1);
    assert_eq!(totals.timed_out, 1);
    assert_eq!(totals.decode, Some(2_000));
    assert!(report.to_string().ends_with("[1 failed] [1 timed out]"));
}

#[test]
fn test_worker_share_sums_successful_calls() {
    let (variant, _) = fake(vec![Step::Workers, Step::Fail, Step::Workers, Step::Ok]);
    let report = driver(0, 4).run(&variant);

    let Outcome::Completed(totals) = report.outcome.clone() else {
        panic!("variant aborted");
    };
    assert_eq!(totals.workers, Some(6_000));
    assert_eq!(totals.decode, Some(1_000));
    assert!(report.to_string().contains("(workers 6000 ns)"));
}

#[test]
fn test_no_worker_share_without_workers() {
    let (variant, _) = fake(vec![]);
    let report = driver(0, 2).run(&variant);

    assert!(matches!(report.outcome, Outcome::Completed(ref t) if t.workers.is_none()));
    assert!(!report.to_string().contains("workers"));
}

#[test]
fn test_wrong_warmup_output_aborts() {
    let (variant, calls) = fake(vec![Step::Ok, Step::Wrong]);
    let report = driver(5, 10).run(&variant);

    assert!(report.is_aborted());
    assert_eq!(calls.get(), 2);
    assert!(report.to_string().starts_with("fake: aborted: warm-up output violates"));
}

#[test]
fn test_wrong_output_is_not_checked_without_verify() {
    let (variant, _) = fake(vec![Step::Wrong]);
    let mut driver = driver(1, 1);
    driver.verify = false;

    assert!(!driver.run(&variant).is_aborted());
}

#[test]
fn test_failed_warmup_call_does_not_abort() {
    let (variant, _) = fake(vec![Step::Fail, Step::Timeout]);
    let report = driver(2, 2).run(&variant);

    assert!(matches!(report.outcome, Outcome::Completed(ref t) if t.succeeded == 2 && t.failed == 0));
}

#[test]
fn test_prepare_failure_aborts_without_calls() {
    let calls = Rc::new(Cell::new(0));
    let variant = Fake {
        steps: vec![],
        calls: Rc::clone(&calls),
        prepare_fails: true,
    };

    let report = driver(1, 1).run(&variant);
    assert!(report.is_aborted());
    assert_eq!(calls.get(), 0);
    assert_eq!(report.to_string(), "fake: aborted: program does not compile: bad program");
}
