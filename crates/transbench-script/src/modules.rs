//! Module loader demonstration.

use std::path::Path;

use crate::config::ScriptOptions;
use crate::engine::ScriptEngine;
use crate::error::LoadError;

/// Evaluate an entry module whose `import` statements resolve relative to
/// the module's own directory.
///
/// Imports are resolved when the module is compiled, so a missing import is
/// reported before any top-level statement runs.
pub fn evaluate_entry_module(
    options: &ScriptOptions,
    path: impl AsRef<Path>,
) -> Result<(), LoadError> {
    let path = path.as_ref();
    let root = path.parent().unwrap_or_else(|| Path::new("."));

    let engine = ScriptEngine::with_module_root(options.clone(), root);
    engine.evaluate_self_contained(path)?;

    tracing::debug!(path = %path.display(), "Entry module evaluated");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn write(dir: &Path, name: &str, source: &str) -> std::path::PathBuf {
        let path = dir.join(name);
        fs::write(&path, source).unwrap();
        path
    }

    #[test]
    fn test_entry_module_with_import() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "helper.rhai", "fn double(x) { x * 2 }");
        let entry = write(
            dir.path(),
            "main.rhai",
            r#"
            import "helper" as helper;
            let y = helper::double(21);
            if y != 42 { throw "wrong"; }
        "#,
        );

        evaluate_entry_module(&ScriptOptions::default(), &entry).unwrap();
    }

    #[test]
    fn test_missing_import_fails_before_execution() {
        let dir = tempfile::tempdir().unwrap();
        let entry = write(
            dir.path(),
            "main.rhai",
            r#"
            import "absent" as absent;
            let y = absent::anything(1);
        "#,
        );

        let err = evaluate_entry_module(&ScriptOptions::default(), &entry).unwrap_err();
        assert!(matches!(err, LoadError::Evaluation { .. }));
    }

    #[test]
    fn test_entry_module_parse_error() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "helper.rhai", "fn double(x) { x * 2 }");
        let entry = write(
            dir.path(),
            "main.rhai",
            r#"
            import "helper" as helper;
            let y = ;
        "#,
        );

        let err = evaluate_entry_module(&ScriptOptions::default(), &entry).unwrap_err();
        assert!(matches!(err, LoadError::Parse { .. }), "{err}");
    }

    #[test]
    fn test_imported_module_parse_error() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "helper.rhai", "fn double(x) { let = x * 2 }");
        let entry = write(
            dir.path(),
            "main.rhai",
            r#"
            import "helper" as helper;
            let y = helper::double(21);
        "#,
        );

        let err = evaluate_entry_module(&ScriptOptions::default(), &entry).unwrap_err();
        match err {
            LoadError::Parse { path, message } => {
                assert_eq!(path, entry);
                assert!(message.contains("helper"), "{message}");
            }
            other => panic!("expected a parse error, got {other}"),
        }
    }

    #[test]
    fn test_missing_entry_file() {
        let dir = tempfile::tempdir().unwrap();
        let err =
            evaluate_entry_module(&ScriptOptions::default(), dir.path().join("none.rhai"))
                .unwrap_err();
        assert!(matches!(err, LoadError::Read { .. }));
    }

    #[test]
    fn test_runtime_failure_in_entry_module() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "helper.rhai", "fn double(x) { x * 2 }");
        let entry = write(
            dir.path(),
            "main.rhai",
            r#"
            import "helper" as helper;
            if helper::double(1) != 3 { throw "mismatch"; }
        "#,
        );

        let err = evaluate_entry_module(&ScriptOptions::default(), &entry).unwrap_err();
        assert!(matches!(err, LoadError::Evaluation { .. }));
    }
}
