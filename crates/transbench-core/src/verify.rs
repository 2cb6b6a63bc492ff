//! Mapping-law checks.
//!
//! An output is correct when it has one record per input record, in order,
//! with `map1 == el1`, `map2 == el2` and `max == max(i, 0)`.

use crate::record::{DerivedRecord, SourceRecord};

/// First deviation found between an output and the mapping laws.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum MappingViolation {
    #[error("expected {expected} derived records, got {actual}")]
    Length { expected: usize, actual: usize },

    #[error("record {index}: `{field}` is {actual}, expected {expected}")]
    Field {
        index: usize,
        field: &'static str,
        expected: String,
        actual: String,
    },
}

/// Check `derived` against the reference mapping of `sources`.
pub fn check(sources: &[SourceRecord], derived: &[DerivedRecord]) -> Result<(), MappingViolation> {
    if sources.len() != derived.len() {
        return Err(MappingViolation::Length {
            expected: sources.len(),
            actual: derived.len(),
        });
    }

    for (index, (source, out)) in sources.iter().zip(derived).enumerate() {
        let expected = DerivedRecord::expected_from(source);

        if out.map1() != expected.map1() {
            return Err(field(index, "map1", expected.map1(), out.map1()));
        }
        if out.map2() != expected.map2() {
            return Err(field(index, "map2", expected.map2(), out.map2()));
        }
        if out.max() != expected.max() {
            return Err(field(index, "max", expected.max(), out.max()));
        }
    }

    Ok(())
}

fn field(
    index: usize,
    field: &'static str,
    expected: impl ToString,
    actual: impl ToString,
) -> MappingViolation {
    MappingViolation::Field {
        index,
        field,
        expected: expected.to_string(),
        actual: actual.to_string(),
    }
}
