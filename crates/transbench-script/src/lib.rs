//! Rhai scripting invokers for transbench.
//!
//! This crate hosts the two scripting variants and the multi-thread invoker:
//!
//! - **Generic values** - records go in as object maps, the result comes back
//!   as a generic value and is decoded into `DerivedRecord`s.
//! - **Host types** - `SourceRecord` and `DerivedRecord` are registered with
//!   the engine; the result is projected directly.
//! - **Parallel** - K threads share one engine and its compiled-code cache,
//!   each with its own execution context.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────┐
//! │ Arc<ScriptEngine>                                        │
//! │   rhai::Engine (sync) + RwLock<HashMap<key, Arc<AST>>>   │
//! └──────────────────────────────────────────────────────────┘
//!        ▲                      ▲                      ▲
//!        │                      │                      │
//! ExecutionContext      ExecutionContext      ExecutionContext
//! (thread A, Scope)     (thread B, Scope)     (thread C, Scope)
//!        │
//!        ├── load_module(path)      ─▶ ScriptModule
//!        ├── invoke_generic(m, fx)  ─▶ GenericResult ─decode─▶ Vec<DerivedRecord>
//!        └── invoke_typed(m, fx)    ─▶ Vec<DerivedRecord>
//! ```
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use transbench_core::FixtureGenerator;
//! use transbench_script::{ExecutionContext, ScriptEngine, ScriptOptions};
//!
//! let engine = Arc::new(ScriptEngine::new(ScriptOptions::default()));
//! let mut context = ExecutionContext::new(engine);
//! let module = context.load_module("scripts/mapper_typed.rhai")?;
//!
//! let fixture = FixtureGenerator::default().generate();
//! let records = context.invoke_typed(&module, &fixture)?;
//! assert_eq!(records.len(), fixture.len());
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

pub mod config;
pub mod context;
pub mod engine;
pub mod error;
mod host;
pub mod modules;
pub mod parallel;

pub use config::ScriptOptions;
pub use context::{ExecutionContext, GenericResult, ScriptModule};
pub use engine::{CodeCacheStats, ScriptEngine};
pub use error::{InvokeError, LoadError, ProjectionError, WorkerError};
pub use modules::evaluate_entry_module;
pub use parallel::{
    DEFAULT_DEADLINE, DEFAULT_WORKERS, InvocationMode, ParallelInvoker, TrialReport,
    TrialTimeout, WorkerFailure, WorkerReport,
};
