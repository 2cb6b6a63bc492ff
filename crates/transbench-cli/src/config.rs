use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use transbench_core::{DEFAULT_FIXTURE_SIZE, Decoder, FixtureGenerator, UnknownFields};
use transbench_script::{DEFAULT_DEADLINE, DEFAULT_WORKERS, InvocationMode, ScriptOptions};

use crate::driver::TimeUnit;

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct BenchConfig {
    #[serde(default)]
    pub fixture: FixtureConfig,
    #[serde(default)]
    pub driver: DriverConfig,
    #[serde(default)]
    pub scripts: ScriptsConfig,
    /// Script engine options shared by every scripting variant
    #[serde(default)]
    pub engine: ScriptOptions,
    #[serde(default)]
    pub parallel: ParallelConfig,
    #[serde(default)]
    pub decode: DecodeConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl BenchConfig {
    pub fn validate(&self) -> Result<(), String> {
        if self.fixture.count == 0 {
            return Err("fixture.count must be > 0".into());
        }
        if self.driver.iterations == 0 {
            return Err("driver.iterations must be > 0".into());
        }
        if self.driver.variants.is_empty() {
            return Err("driver.variants must name at least one variant".into());
        }
        if self.engine.entry_point.trim().is_empty() {
            return Err("engine.entry_point must not be empty".into());
        }
        if self.engine.max_call_levels == 0 {
            return Err("engine.max_call_levels must be > 0".into());
        }
        if self.parallel.workers == 0 {
            return Err("parallel.workers must be > 0".into());
        }
        if self.parallel.deadline.is_zero() {
            return Err("parallel.deadline must be > 0".into());
        }
        if let Err(e) = tracing_subscriber::EnvFilter::try_new(&self.logging.level) {
            return Err(format!("logging.level is not a valid filter: {e}"));
        }
        Ok(())
    }

    pub fn fixture_generator(&self) -> FixtureGenerator {
        match self.fixture.seed {
            Some(seed) => FixtureGenerator::seeded(self.fixture.count, seed),
            None => FixtureGenerator::new(self.fixture.count),
        }
    }

    pub fn decoder(&self) -> Decoder {
        Decoder::new(self.decode.unknown_fields)
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct FixtureConfig {
    #[serde(default = "default_fixture_count")]
    pub count: usize,
    /// Fixed seed for reproducible fixtures; random when unset
    #[serde(default)]
    pub seed: Option<u64>,
}

fn default_fixture_count() -> usize {
    DEFAULT_FIXTURE_SIZE
}

impl Default for FixtureConfig {
    fn default() -> Self {
        Self {
            count: default_fixture_count(),
            seed: None,
        }
    }
}

/// Benchmark variants the driver can run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum VariantKind {
    Declarative,
    Generic,
    Typed,
    Parallel,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DriverConfig {
    #[serde(default = "default_warmup")]
    pub warmup: usize,
    #[serde(default = "default_iterations")]
    pub iterations: usize,
    #[serde(default)]
    pub unit: TimeUnit,
    /// Check warm-up outputs against the mapping laws
    #[serde(default = "default_true")]
    pub verify: bool,
    #[serde(default = "default_variants")]
    pub variants: Vec<VariantKind>,
}

fn default_warmup() -> usize {
    100
}

fn default_iterations() -> usize {
    1000
}

fn default_true() -> bool {
    true
}

fn default_variants() -> Vec<VariantKind> {
    vec![
        VariantKind::Declarative,
        VariantKind::Generic,
        VariantKind::Typed,
        VariantKind::Parallel,
    ]
}

impl Default for DriverConfig {
    fn default() -> Self {
        Self {
            warmup: default_warmup(),
            iterations: default_iterations(),
            unit: TimeUnit::default(),
            verify: default_true(),
            variants: default_variants(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ScriptsConfig {
    #[serde(default = "default_declarative_program")]
    pub declarative: PathBuf,
    #[serde(default = "default_generic_mapper")]
    pub generic: PathBuf,
    #[serde(default = "default_typed_mapper")]
    pub typed: PathBuf,
    #[serde(default = "default_entry_module")]
    pub entry_module: PathBuf,
    /// Evaluate `entry_module` after the variants have run
    #[serde(default = "default_true")]
    pub module_demo: bool,
}

fn default_declarative_program() -> PathBuf {
    "scripts/map_array.jq".into()
}

fn default_generic_mapper() -> PathBuf {
    "scripts/mapper.rhai".into()
}

fn default_typed_mapper() -> PathBuf {
    "scripts/mapper_typed.rhai".into()
}

fn default_entry_module() -> PathBuf {
    "scripts/modules/main.rhai".into()
}

impl Default for ScriptsConfig {
    fn default() -> Self {
        Self {
            declarative: default_declarative_program(),
            generic: default_generic_mapper(),
            typed: default_typed_mapper(),
            entry_module: default_entry_module(),
            module_demo: default_true(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ParallelConfig {
    #[serde(default = "default_workers")]
    pub workers: usize,
    /// How long a trial waits for all of its workers
    #[serde(default = "default_deadline", with = "humantime_serde")]
    pub deadline: Duration,
    #[serde(default)]
    pub mode: InvocationMode,
}

fn default_workers() -> usize {
    DEFAULT_WORKERS
}

fn default_deadline() -> Duration {
    DEFAULT_DEADLINE
}

impl Default for ParallelConfig {
    fn default() -> Self {
        Self {
            workers: default_workers(),
            deadline: default_deadline(),
            mode: InvocationMode::default(),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct DecodeConfig {
    #[serde(default)]
    pub unknown_fields: UnknownFields,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
}

fn default_log_level() -> String {
    "info".into()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

pub mod loader {
    use super::BenchConfig;
    use config::{Config, Environment, File};
    use std::path::{Path, PathBuf};

    /// Prefix of environment overrides, e.g. `TRANSBENCH__DRIVER__ITERATIONS=50`.
    pub const ENV_PREFIX: &str = "TRANSBENCH";

    /// Configuration file used when no path is given.
    pub const DEFAULT_CONFIG_FILE: &str = "transbench.toml";

    /// Load configuration from an optional file plus environment overrides.
    ///
    /// An explicit `path` must exist. Without one, `transbench.toml` is used
    /// when present and built-in defaults otherwise.
    pub fn load_config(path: Option<&Path>) -> Result<BenchConfig, String> {
        load_config_with_env(path, environment())
    }

    fn environment() -> Environment {
        Environment::with_prefix(ENV_PREFIX)
            .try_parsing(true)
            .separator("__")
            .list_separator(",")
            .with_list_parse_key("driver.variants")
    }

    pub(crate) fn load_config_with_env(
        path: Option<&Path>,
        env: Environment,
    ) -> Result<BenchConfig, String> {
        let mut builder = Config::builder();
        match path {
            Some(p) => {
                if !p.exists() {
                    return Err(format!("config file {} does not exist", p.display()));
                }
                builder = builder.add_source(File::from(p.to_path_buf()));
            }
            None => {
                let default_path = PathBuf::from(DEFAULT_CONFIG_FILE);
                if default_path.exists() {
                    builder = builder.add_source(File::from(default_path));
                }
            }
        }
        builder = builder.add_source(env);

        let cfg = builder
            .build()
            .map_err(|e| format!("config build error: {e}"))?;
        let merged: BenchConfig = cfg
            .try_deserialize()
            .map_err(|e| format!("config deserialize error: {e}"))?;
        merged.validate()?;
        Ok(merged)
    }
}
