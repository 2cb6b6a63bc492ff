//! Error types for transbench-script

use std::path::PathBuf;

use thiserror::Error;
use transbench_core::DecodeError;

/// A script or module could not be loaded.
#[derive(Error, Debug)]
pub enum LoadError {
    #[error("failed to read script {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("script {path} does not parse: {message}")]
    Parse { path: PathBuf, message: String },

    /// Top-level statements failed, or an imported module could not be
    /// resolved or failed while running. Syntax errors in an imported module
    /// are reported as [`LoadError::Parse`].
    #[error("script {path} failed during evaluation: {message}")]
    Evaluation { path: PathBuf, message: String },

    #[error("script {path} does not define `{entry}` taking one argument")]
    MissingEntryPoint { path: PathBuf, entry: String },
}

/// A returned value does not fit the host `DerivedRecord` type.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProjectionError {
    #[error("expected an array of DerivedRecord, found {found}")]
    NotASequence { found: String },

    #[error("element {index}: expected DerivedRecord, found {found}")]
    NotARecord { index: usize, found: String },
}

/// A call into a loaded module failed.
#[derive(Error, Debug)]
pub enum InvokeError {
    #[error("calling `{entry}` failed: {message}")]
    Evaluation { entry: String, message: String },

    #[error(transparent)]
    Decode(#[from] DecodeError),

    #[error(transparent)]
    Projection(#[from] ProjectionError),
}

/// Failure of one worker of a parallel trial.
#[derive(Error, Debug)]
pub enum WorkerError {
    #[error(transparent)]
    Load(#[from] LoadError),

    #[error(transparent)]
    Invoke(#[from] InvokeError),

    #[error("worker thread could not be spawned: {0}")]
    Spawn(#[source] std::io::Error),

    #[error("worker panicked: {0}")]
    Panicked(String),

    #[error("worker exited without reporting")]
    Disconnected,
}
