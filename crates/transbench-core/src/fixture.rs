//! Fixture generation.
//!
//! A fixture is the ordered input sequence handed to every transformation.
//! The text fields are constants; only `i` varies between records.

use std::ops::Deref;

use serde::Serialize;

use crate::record::SourceRecord;

/// Number of records per fixture unless configured otherwise.
pub const DEFAULT_FIXTURE_SIZE: usize = 100;

const EL1: &str = "el1";
const EL2: &str = "el2";

/// Ordered sequence of source records.
///
/// Cloning a fixture materializes an independent copy, which is what each
/// worker thread of the parallel invoker receives.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
#[serde(transparent)]
pub struct Fixture {
    records: Vec<SourceRecord>,
}

impl Fixture {
    pub fn records(&self) -> &[SourceRecord] {
        &self.records
    }

    /// Generic tree view of the fixture: an array of `{el1, el2, i}` objects.
    pub fn to_json(&self) -> serde_json::Value {
        serde_json::Value::Array(
            self.records
                .iter()
                .map(|r| {
                    serde_json::json!({
                        "el1": r.el1(),
                        "el2": r.el2(),
                        "i": r.i(),
                    })
                })
                .collect(),
        )
    }
}

impl Deref for Fixture {
    type Target = [SourceRecord];

    fn deref(&self) -> &Self::Target {
        &self.records
    }
}

impl From<Vec<SourceRecord>> for Fixture {
    fn from(records: Vec<SourceRecord>) -> Self {
        Self { records }
    }
}

impl FromIterator<SourceRecord> for Fixture {
    fn from_iter<T: IntoIterator<Item = SourceRecord>>(iter: T) -> Self {
        Self {
            records: iter.into_iter().collect(),
        }
    }
}

/// Produces fixtures of a fixed size.
///
/// Unseeded generators draw from the thread-local `fastrand` generator, so
/// they can be used from any number of threads without coordination. A
/// seeded generator yields the same fixture on every call.
#[derive(Debug, Clone)]
pub struct FixtureGenerator {
    count: usize,
    seed: Option<u64>,
}

impl FixtureGenerator {
    pub fn new(count: usize) -> Self {
        Self { count, seed: None }
    }

    pub fn seeded(count: usize, seed: u64) -> Self {
        Self {
            count,
            seed: Some(seed),
        }
    }

    pub fn count(&self) -> usize {
        self.count
    }

    pub fn generate(&self) -> Fixture {
        match self.seed {
            Some(seed) => {
                let mut rng = fastrand::Rng::with_seed(seed);
                (0..self.count)
                    .map(|_| SourceRecord::new(EL1, EL2, rng.i32(..)))
                    .collect()
            }
            None => (0..self.count)
                .map(|_| SourceRecord::new(EL1, EL2, fastrand::i32(..)))
                .collect(),
        }
    }
}

impl Default for FixtureGenerator {
    fn default() -> Self {
        Self::new(DEFAULT_FIXTURE_SIZE)
    }
}
