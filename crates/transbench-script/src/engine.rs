//! Shared script engine with a compiled-code cache.
//!
//! One [`ScriptEngine`] is meant to be created per process and shared
//! (`Arc`) between every [`ExecutionContext`](crate::ExecutionContext),
//! including contexts owned by different threads. Scripts are compiled to an
//! AST once per source identity (canonical path + content hash) and reused by every
//! later load.
//!
//! ```text
//! ┌──────────────────────────────────────────────┐
//! │ ScriptEngine (Arc, shared across threads)    │
//! │   ├── engine: rhai::Engine (configured once) │
//! │   └── code_cache: RwLock<HashMap<key, AST>>  │
//! └──────────────────────────────────────────────┘
//!              │ compile_file(path)
//!              ▼
//!   read source ─▶ cache hit? ─yes─▶ Arc<AST>
//!                      │no
//!                      ▼
//!              compile ─ok─▶ insert ─▶ Arc<AST>
//!                      └err─▶ LoadError (cache untouched)
//! ```

use std::collections::HashMap;
use std::hash::{DefaultHasher, Hash, Hasher};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::RwLock;
use rhai::module_resolvers::{DummyModuleResolver, FileModuleResolver};
use rhai::{AST, Engine, EvalAltResult, Scope};

use crate::config::ScriptOptions;
use crate::error::LoadError;
use crate::host;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct CacheKey {
    path: PathBuf,
    content_hash: u64,
}

/// Configured script engine plus the compiled-code cache.
pub struct ScriptEngine {
    engine: Engine,
    options: ScriptOptions,
    code_cache: RwLock<HashMap<CacheKey, Arc<AST>>>,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl ScriptEngine {
    /// Create an engine with module imports disabled.
    #[must_use]
    pub fn new(options: ScriptOptions) -> Self {
        Self::build(options, None)
    }

    /// Create an engine that resolves `import` statements from `root`.
    #[must_use]
    pub fn with_module_root(options: ScriptOptions, root: impl AsRef<Path>) -> Self {
        Self::build(options, Some(root.as_ref()))
    }

    fn build(options: ScriptOptions, module_root: Option<&Path>) -> Self {
        let mut engine = Engine::new();

        engine.set_strict_variables(options.strict_variables);
        engine.set_max_operations(options.max_operations);
        engine.set_max_call_levels(options.max_call_levels);
        engine.disable_symbol("eval");

        if options.host_type_lookup {
            host::register_host_types(&mut engine);
        }

        match module_root {
            Some(root) => {
                engine.set_module_resolver(FileModuleResolver::new_with_path(root));
            }
            None => {
                engine.set_module_resolver(DummyModuleResolver::new());
            }
        }

        tracing::debug!(
            host_types = options.host_type_lookup,
            native_sequences = options.native_sequences,
            module_root = ?module_root,
            "Script engine created"
        );

        Self {
            engine,
            options,
            code_cache: RwLock::new(HashMap::new()),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        }
    }

    pub fn options(&self) -> &ScriptOptions {
        &self.options
    }

    pub(crate) fn rhai(&self) -> &Engine {
        &self.engine
    }

    /// Read and compile a script, reusing a cached AST when the same source
    /// was compiled before.
    ///
    /// A failed load leaves the cache untouched.
    pub fn compile_file(&self, path: impl AsRef<Path>) -> Result<Arc<AST>, LoadError> {
        let path = path.as_ref();
        let source = read_source(path)?;
        let key = CacheKey {
            path: std::fs::canonicalize(path).unwrap_or_else(|_| path.to_path_buf()),
            content_hash: hash_source(&source),
        };

        if let Some(ast) = self.code_cache.read().get(&key) {
            self.hits.fetch_add(1, Ordering::Relaxed);
            return Ok(Arc::clone(ast));
        }

        let ast = self.engine.compile(&source).map_err(|e| LoadError::Parse {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;
        self.misses.fetch_add(1, Ordering::Relaxed);
        tracing::debug!(path = %path.display(), "Compiled script");

        // Another thread may have compiled the same source meanwhile; keep the first.
        let mut cache = self.code_cache.write();
        Ok(Arc::clone(cache.entry(key).or_insert_with(|| Arc::new(ast))))
    }

    /// Compile a module with every `import` resolved up front, then run it.
    ///
    /// Missing or broken imports fail here, before any statement executes.
    pub fn evaluate_self_contained(&self, path: impl AsRef<Path>) -> Result<(), LoadError> {
        let path = path.as_ref();
        let source = read_source(path)?;

        let ast = self
            .engine
            .compile_into_self_contained(&Scope::new(), &source)
            .map_err(|e| classify(path, &e))?;

        self.engine
            .run_ast(&ast)
            .map_err(|e| LoadError::Evaluation {
                path: path.to_path_buf(),
                message: e.to_string(),
            })?;

        tracing::debug!(path = %path.display(), "Evaluated self-contained module");
        Ok(())
    }

    /// Get cache statistics.
    #[must_use]
    pub fn cache_stats(&self) -> CodeCacheStats {
        CodeCacheStats {
            entries: self.code_cache.read().len(),
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
        }
    }
}

/// Statistics about the compiled-code cache.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CodeCacheStats {
    /// Number of cached ASTs.
    pub entries: usize,

    /// Loads served from the cache.
    pub hits: u64,

    /// Loads that compiled.
    pub misses: u64,
}

fn read_source(path: &Path) -> Result<String, LoadError> {
    std::fs::read_to_string(path).map_err(|source| LoadError::Read {
        path: path.to_path_buf(),
        source,
    })
}

fn hash_source(source: &str) -> u64 {
    let mut hasher = DefaultHasher::new();
    source.hash(&mut hasher);
    hasher.finish()
}

fn classify(path: &Path, error: &EvalAltResult) -> LoadError {
    if is_parse_error(error) {
        LoadError::Parse {
            path: path.to_path_buf(),
            message: error.to_string(),
        }
    } else {
        LoadError::Evaluation {
            path: path.to_path_buf(),
            message: error.to_string(),
        }
    }
}

/// Syntax errors surface wrapped in `ErrorInModule` when they sit in an
/// imported module.
fn is_parse_error(error: &EvalAltResult) -> bool {
    match error {
        EvalAltResult::ErrorParsing(..) => true,
        EvalAltResult::ErrorInModule(_, inner, _) => is_parse_error(inner),
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn script_file(source: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::Builder::new().suffix(".rhai").tempfile().unwrap();
        file.write_all(source.as_bytes()).unwrap();
        file
    }

    #[test]
    fn test_engine_is_send_and_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<ScriptEngine>();
    }

    #[test]
    fn test_compile_file_caches() {
        let engine = ScriptEngine::new(ScriptOptions::default());
        let file = script_file("fn map_array(objs) { objs }");

        let first = engine.compile_file(file.path()).unwrap();
        let second = engine.compile_file(file.path()).unwrap();

        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(
            engine.cache_stats(),
            CodeCacheStats {
                entries: 1,
                hits: 1,
                misses: 1
            }
        );
    }

    #[test]
    fn test_changed_source_recompiles() {
        let engine = ScriptEngine::new(ScriptOptions::default());
        let mut file = script_file("fn map_array(objs) { objs }");
        engine.compile_file(file.path()).unwrap();

        file.write_all(b"\nfn other() { 1 }").unwrap();
        file.flush().unwrap();
        engine.compile_file(file.path()).unwrap();

        assert_eq!(engine.cache_stats().entries, 2);
        assert_eq!(engine.cache_stats().misses, 2);
    }

    #[test]
    fn test_missing_file_leaves_cache_usable() {
        let engine = ScriptEngine::new(ScriptOptions::default());
        let file = script_file("fn map_array(objs) { objs }");
        engine.compile_file(file.path()).unwrap();

        let err = engine.compile_file("/no/such/script.rhai").unwrap_err();
        assert!(matches!(err, LoadError::Read { .. }));
        assert_eq!(engine.cache_stats().entries, 1);

        engine.compile_file(file.path()).unwrap();
        assert_eq!(engine.cache_stats().hits, 1);
    }

    #[test]
    fn test_parse_error_is_not_cached() {
        let engine = ScriptEngine::new(ScriptOptions::default());
        let file = script_file("fn map_array(objs) { objs ");

        let err = engine.compile_file(file.path()).unwrap_err();
        assert!(matches!(err, LoadError::Parse { .. }));
        assert_eq!(engine.cache_stats().entries, 0);
    }

    #[test]
    fn test_strict_variables_rejects_undeclared() {
        let engine = ScriptEngine::new(ScriptOptions::default());
        let file = script_file("fn map_array(objs) { undeclared }");
        assert!(matches!(
            engine.compile_file(file.path()),
            Err(LoadError::Parse { .. })
        ));
    }
}
