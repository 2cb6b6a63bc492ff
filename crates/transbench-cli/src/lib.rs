//! Benchmark harness comparing a declarative jq program with Rhai scripts on
//! generic values and on host types.
//!
//! The binary (`transbench`) loads [`config::BenchConfig`], builds each
//! enabled variant with [`variants::build`] and runs it through a
//! [`driver::Driver`], printing one summary line per variant.

pub mod config;
pub mod driver;
pub mod observability;
pub mod variants;

pub use config::{BenchConfig, VariantKind};
pub use driver::{Driver, Outcome, VariantReport};
