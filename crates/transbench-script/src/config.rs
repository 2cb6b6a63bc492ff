//! Script engine configuration.

use serde::{Deserialize, Serialize};

/// Options applied when a [`ScriptEngine`](crate::ScriptEngine) is built.
///
/// `native_sequences` and `host_type_lookup` change what scripts can do, not
/// only how fast they run: without the first, a host sequence is an opaque
/// value with no array operations; without the second, scripts cannot name
/// `SourceRecord` / `DerivedRecord`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct ScriptOptions {
    /// Name of the one-argument function every mapper module must define.
    pub entry_point: String,

    /// Hand host sequences to scripts as native arrays.
    pub native_sequences: bool,

    /// Register host record types so scripts can read and construct them.
    pub host_type_lookup: bool,

    /// Reject references to undeclared variables at compile time.
    pub strict_variables: bool,

    /// Maximum operations per call. Zero means unlimited.
    pub max_operations: u64,

    /// Maximum function call depth.
    pub max_call_levels: usize,
}

impl Default for ScriptOptions {
    fn default() -> Self {
        Self {
            entry_point: "map_array".to_string(),
            native_sequences: true,
            host_type_lookup: true,
            strict_variables: true,
            max_operations: 0,
            max_call_levels: 64,
        }
    }
}
