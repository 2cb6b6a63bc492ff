//! Core data model for the transbench harness.
//!
//! Every benchmark variant transforms the same kind of input into the same
//! kind of output, so the shared pieces live here:
//!
//! - [`SourceRecord`] / [`DerivedRecord`] - the immutable input and output rows
//! - [`Fixture`] / [`FixtureGenerator`] - the ordered input sequence
//! - [`Decoder`] - typed decoding of a generic JSON tree into derived records
//! - [`verify`] - checks that an output obeys the mapping laws
//!
//! # Mapping rule
//!
//! ```text
//! SourceRecord { el1, el2, i }  ──▶  DerivedRecord { map1: el1, map2: el2, max: max(i, 0) }
//! ```
//!
//! # Example
//!
//! ```
//! use transbench_core::{Decoder, DerivedRecord, Fixture, SourceRecord};
//! use serde_json::json;
//!
//! let fixture = Fixture::from(vec![SourceRecord::new("el1", "el2", -5)]);
//! let decoded = Decoder::tolerant()
//!     .decode_records(json!([{"map1": "el1", "map2": "el2", "max": 0, "extra": true}]))
//!     .unwrap();
//!
//! assert_eq!(decoded, vec![DerivedRecord::new("el1", "el2", 0.0)]);
//! assert!(transbench_core::verify::check(&fixture, &decoded).is_ok());
//! ```

pub mod decode;
pub mod fixture;
pub mod record;
pub mod verify;

pub use decode::{DecodeError, Decoder, UnknownFields};
pub use fixture::{DEFAULT_FIXTURE_SIZE, Fixture, FixtureGenerator};
pub use record::{DerivedRecord, SourceRecord};
pub use verify::MappingViolation;
