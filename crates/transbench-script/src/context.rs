//! Execution contexts and the two invocation styles.
//!
//! An [`ExecutionContext`] is the per-thread half of the engine: its own
//! variable scope bound to the shared [`ScriptEngine`]. It is `Send` but not
//! `Sync`, and every operation takes `&mut self`, so a context is driven by
//! exactly one thread at a time.
//!
//! Two ways to call a mapper module:
//!
//! - [`invoke_generic`](ExecutionContext::invoke_generic) passes records as
//!   object maps and returns a [`GenericResult`] that must be decoded.
//! - [`invoke_typed`](ExecutionContext::invoke_typed) passes host
//!   `SourceRecord` values and projects the return value straight into
//!   `DerivedRecord`s.

use std::cell::Cell;
use std::marker::PhantomData;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use rhai::{AST, Array, CallFnOptions, Dynamic, Scope};
use transbench_core::{DecodeError, Decoder, DerivedRecord, Fixture};

use crate::engine::ScriptEngine;
use crate::error::{InvokeError, LoadError, ProjectionError};
use crate::host;

/// A loaded mapper module.
#[derive(Debug, Clone)]
pub struct ScriptModule {
    path: PathBuf,
    ast: Arc<AST>,
    entry: String,
}

impl ScriptModule {
    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn entry(&self) -> &str {
        &self.entry
    }
}

/// Value returned by a generic invocation, still in the engine's
/// representation.
#[derive(Debug, Clone)]
pub struct GenericResult(Dynamic);

impl GenericResult {
    /// Convert into a JSON tree.
    pub fn into_json(self) -> Result<serde_json::Value, DecodeError> {
        host::dynamic_to_json(self.0)
    }

    /// Convert and decode into derived records.
    pub fn decode(self, decoder: &Decoder) -> Result<Vec<DerivedRecord>, DecodeError> {
        decoder.decode_records(self.into_json()?)
    }
}

/// Per-thread evaluation state bound to a shared engine.
pub struct ExecutionContext {
    engine: Arc<ScriptEngine>,
    scope: Scope<'static>,
    _not_sync: PhantomData<Cell<()>>,
}

impl ExecutionContext {
    pub fn new(engine: Arc<ScriptEngine>) -> Self {
        Self {
            engine,
            scope: Scope::new(),
            _not_sync: PhantomData,
        }
    }

    pub fn engine(&self) -> &Arc<ScriptEngine> {
        &self.engine
    }

    /// Load a mapper module: compile (through the engine cache), check the
    /// entry point, then run its top-level statements in this context.
    ///
    /// The context's scope is rewound first, so it only ever holds the
    /// top-level variables of the most recently loaded module.
    pub fn load_module(&mut self, path: impl AsRef<Path>) -> Result<ScriptModule, LoadError> {
        let path = path.as_ref();
        let ast = self.engine.compile_file(path)?;
        let entry = &self.engine.options().entry_point;

        let has_entry = ast
            .iter_functions()
            .any(|f| f.name == entry.as_str() && f.params.len() == 1);
        if !has_entry {
            return Err(LoadError::MissingEntryPoint {
                path: path.to_path_buf(),
                entry: entry.clone(),
            });
        }

        self.scope.rewind(0);
        self.engine
            .rhai()
            .run_ast_with_scope(&mut self.scope, &ast)
            .map_err(|e| LoadError::Evaluation {
                path: path.to_path_buf(),
                message: e.to_string(),
            })?;

        Ok(ScriptModule {
            path: path.to_path_buf(),
            ast,
            entry: entry.clone(),
        })
    }

    /// Call the entry point with records as object maps.
    pub fn invoke_generic(
        &mut self,
        module: &ScriptModule,
        fixture: &Fixture,
    ) -> Result<GenericResult, InvokeError> {
        let argument = if self.engine.options().native_sequences {
            let records: Array = fixture
                .iter()
                .map(|r| Dynamic::from(host::source_to_map(r)))
                .collect();
            Dynamic::from(records)
        } else {
            Dynamic::from(fixture.records().to_vec())
        };

        self.call(module, argument).map(GenericResult)
    }

    /// Call the entry point with host records and project the result.
    pub fn invoke_typed(
        &mut self,
        module: &ScriptModule,
        fixture: &Fixture,
    ) -> Result<Vec<DerivedRecord>, InvokeError> {
        let argument = if self.engine.options().native_sequences {
            let records: Array = fixture.iter().cloned().map(Dynamic::from).collect();
            Dynamic::from(records)
        } else {
            Dynamic::from(fixture.records().to_vec())
        };

        let value = self.call(module, argument)?;
        Ok(self.project(value)?)
    }

    fn call(&mut self, module: &ScriptModule, argument: Dynamic) -> Result<Dynamic, InvokeError> {
        let options = CallFnOptions::new().eval_ast(false);

        self.engine
            .rhai()
            .call_fn_with_options::<Dynamic>(
                options,
                &mut self.scope,
                &module.ast,
                &module.entry,
                (argument,),
            )
            .map_err(|e| InvokeError::Evaluation {
                entry: module.entry.clone(),
                message: e.to_string(),
            })
    }

    fn project(&self, value: Dynamic) -> Result<Vec<DerivedRecord>, ProjectionError> {
        let found = self.type_name(&value);
        let Some(items) = value.try_cast::<Array>() else {
            return Err(ProjectionError::NotASequence { found });
        };

        items
            .into_iter()
            .enumerate()
            .map(|(index, item)| {
                let found = self.type_name(&item);
                item.try_cast::<DerivedRecord>()
                    .ok_or(ProjectionError::NotARecord { index, found })
            })
            .collect()
    }

    fn type_name(&self, value: &Dynamic) -> String {
        self.engine.rhai().map_type_name(value.type_name()).to_string()
    }
}
