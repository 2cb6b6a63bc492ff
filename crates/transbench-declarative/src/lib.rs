//! Declarative transformation invoker.
//!
//! Programs are written in the jq language and interpreted by `jaq`. A
//! program is compiled once and then applied any number of times to a
//! prepared input [`Tree`]; the output tree is decoded into typed records by
//! a [`Decoder`](transbench_core::Decoder).
//!
//! ```text
//! program text ──compile──▶ Program (immutable, reused)
//! Fixture ──Tree::from_fixture──▶ Tree (built once)
//! Program.apply(&Tree) ──▶ serde_json::Value ──Decoder──▶ Vec<DerivedRecord>
//! ```
//!
//! # Example
//!
//! ```
//! use transbench_core::{Decoder, Fixture, SourceRecord};
//! use transbench_declarative::{Program, Tree};
//!
//! let program = Program::compile("[.[] | {map1: .el1, map2: .el2, max: (if .i > 0 then .i else 0 end)}]")?;
//! let fixture = Fixture::from(vec![SourceRecord::new("el1", "el2", 7)]);
//! let records = program.apply_and_decode(&Tree::from_fixture(&fixture), &Decoder::tolerant())?;
//! assert_eq!(records[0].max(), 7.0);
//! # Ok::<(), transbench_declarative::Error>(())
//! ```

use std::path::{Path, PathBuf};

use jaq_interpret::{Ctx, Filter, FilterT, ParseCtx, RcIter, Val};
use transbench_core::{DecodeError, Decoder, DerivedRecord, Fixture};

/// Errors raised by the declarative invoker.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The program file could not be read.
    #[error("failed to read program {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The program text is not a valid program.
    #[error("program does not compile: {0}")]
    Compile(String),

    /// The program failed while running.
    #[error("program evaluation failed: {0}")]
    Evaluation(String),

    /// The program did not yield exactly one value.
    #[error("program yielded {0} values, expected exactly one")]
    Cardinality(usize),

    #[error(transparent)]
    Decode(#[from] DecodeError),
}

/// Result type alias using the crate's Error type.
pub type Result<T> = std::result::Result<T, Error>;

/// A compiled declarative program.
pub struct Program {
    filter: Filter,
}

impl Program {
    /// Parse and compile program text.
    ///
    /// The jq core natives and the standard library definitions are in scope.
    pub fn compile(text: &str) -> Result<Self> {
        let mut defs = ParseCtx::new(Vec::new());
        defs.insert_natives(jaq_core::core());
        defs.insert_defs(jaq_std::std());

        let (main, errs) = jaq_parse::parse(text, jaq_parse::main());
        if let Some(first) = errs.first() {
            return Err(Error::Compile(format!(
                "{} syntax error(s), first: {first:?}",
                errs.len()
            )));
        }
        let Some(main) = main else {
            return Err(Error::Compile("empty program".to_string()));
        };

        let filter = defs.compile(main);
        if !defs.errs.is_empty() {
            return Err(Error::Compile(format!(
                "{} undefined symbol(s)",
                defs.errs.len()
            )));
        }

        tracing::debug!(bytes = text.len(), "Compiled declarative program");
        Ok(Self { filter })
    }

    /// Read and compile a program file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| Error::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::compile(&text)
    }

    /// Apply the program to an input tree.
    ///
    /// Evaluation is pure: the input is not modified and the same input
    /// always yields the same output.
    pub fn apply(&self, input: &Tree) -> Result<serde_json::Value> {
        let inputs = RcIter::new(core::iter::empty());
        let mut outputs = self.filter.run((Ctx::new([], &inputs), input.0.clone()));

        let first = match outputs.next() {
            Some(Ok(value)) => value,
            Some(Err(e)) => return Err(Error::Evaluation(e.to_string())),
            None => return Err(Error::Cardinality(0)),
        };
        let extra = outputs.count();
        if extra > 0 {
            return Err(Error::Cardinality(extra + 1));
        }

        Ok(serde_json::Value::from(first))
    }

    /// Apply the program and decode the output into derived records.
    pub fn apply_and_decode(&self, input: &Tree, decoder: &Decoder) -> Result<Vec<DerivedRecord>> {
        let output = self.apply(input)?;
        Ok(decoder.decode_records(output)?)
    }
}

/// Input tree in the interpreter's native value representation.
///
/// Building it is a one-off conversion; applying a program only clones a
/// reference-counted handle.
#[derive(Clone)]
pub struct Tree(Val);

impl Tree {
    pub fn from_json(value: serde_json::Value) -> Self {
        Self(Val::from(value))
    }

    pub fn from_fixture(fixture: &Fixture) -> Self {
        Self::from_json(fixture.to_json())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use transbench_core::{FixtureGenerator, SourceRecord, verify};

    const MAPPING: &str = r#"
        def max(a; b): if a > b then a else b end;
        [ .[] | { "map1": .el1, "map2": .el2, "max": max(.i; 0) } ]
    "#;

    #[test]
    fn test_compile_error() {
        let err = Program::compile("[ .[] | {").err().unwrap();
        assert!(matches!(err, Error::Compile(_)));
    }

    #[test]
    fn test_undefined_function_is_compile_error() {
        let err = Program::compile("[ .[] | no_such_function(.i) ]").err().unwrap();
        assert!(matches!(err, Error::Compile(_)));
    }

    #[test]
    fn test_concrete_examples() {
        let program = Program::compile(MAPPING).unwrap();
        let fixture = Fixture::from(vec![
            SourceRecord::new("el1", "el2", -5),
            SourceRecord::new("el1", "el2", 7),
        ]);

        let output = program.apply(&Tree::from_fixture(&fixture)).unwrap();
        assert_eq!(
            output,
            json!([
                {"map1": "el1", "map2": "el2", "max": 0},
                {"map1": "el1", "map2": "el2", "max": 7}
            ])
        );
    }

    #[test]
    fn test_laws_hold_on_random_fixture() {
        let program = Program::compile(MAPPING).unwrap();
        let fixture = FixtureGenerator::new(100).generate();

        let records = program
            .apply_and_decode(&Tree::from_fixture(&fixture), &Decoder::strict())
            .unwrap();
        verify::check(&fixture, &records).unwrap();
    }

    #[test]
    fn test_apply_is_idempotent() {
        let program = Program::compile(MAPPING).unwrap();
        let tree = Tree::from_fixture(&FixtureGenerator::new(10).generate());

        let first = program.apply(&tree).unwrap();
        let second = program.apply(&tree).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_empty_fixture() {
        let program = Program::compile(MAPPING).unwrap();
        let output = program.apply(&Tree::from_fixture(&Fixture::default())).unwrap();
        assert_eq!(output, json!([]));
    }

    #[test]
    fn test_cardinality() {
        let program = Program::compile(".[]").unwrap();
        let tree = Tree::from_json(json!([1, 2, 3]));
        assert!(matches!(program.apply(&tree), Err(Error::Cardinality(3))));

        let program = Program::compile("empty").unwrap();
        assert!(matches!(program.apply(&tree), Err(Error::Cardinality(0))));
    }

    #[test]
    fn test_evaluation_error() {
        let program = Program::compile(".[] + 1").unwrap();
        let tree = Tree::from_json(json!([{"a": 1}]));
        assert!(matches!(program.apply(&tree), Err(Error::Evaluation(_))));
    }

    #[test]
    fn test_unknown_output_fields_follow_decoder_policy() {
        let program =
            Program::compile(r#"[ .[] | {"map1": .el1, "map2": .el2, "max": 1, "extra": true} ]"#)
                .unwrap();
        let tree = Tree::from_fixture(&FixtureGenerator::new(2).generate());

        assert!(program.apply_and_decode(&tree, &Decoder::tolerant()).is_ok());
        assert!(matches!(
            program.apply_and_decode(&tree, &Decoder::strict()),
            Err(Error::Decode(DecodeError::UnknownField { .. }))
        ));
    }
}
