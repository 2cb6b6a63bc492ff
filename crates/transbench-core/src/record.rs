//! Input and output rows.

use serde::{Deserialize, Serialize};

/// A single input row.
///
/// Fields are private so a record cannot change after construction.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SourceRecord {
    el1: String,
    el2: String,
    i: i32,
}

impl SourceRecord {
    pub fn new(el1: impl Into<String>, el2: impl Into<String>, i: i32) -> Self {
        Self {
            el1: el1.into(),
            el2: el2.into(),
            i,
        }
    }

    pub fn el1(&self) -> &str {
        &self.el1
    }

    pub fn el2(&self) -> &str {
        &self.el2
    }

    pub fn i(&self) -> i32 {
        self.i
    }
}

/// A single output row produced by a transformation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DerivedRecord {
    map1: String,
    map2: String,
    max: f64,
}

impl DerivedRecord {
    pub fn new(map1: impl Into<String>, map2: impl Into<String>, max: f64) -> Self {
        Self {
            map1: map1.into(),
            map2: map2.into(),
            max,
        }
    }

    /// The reference mapping every engine must reproduce.
    #[must_use]
    pub fn expected_from(source: &SourceRecord) -> Self {
        Self::new(
            source.el1.clone(),
            source.el2.clone(),
            f64::from(source.i.max(0)),
        )
    }

    pub fn map1(&self) -> &str {
        &self.map1
    }

    pub fn map2(&self) -> &str {
        &self.map2
    }

    pub fn max(&self) -> f64 {
        self.max
    }
}
