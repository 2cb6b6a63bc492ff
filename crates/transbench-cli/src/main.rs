use std::{env, path::PathBuf};

use anyhow::Context;
use transbench_cli::config::BenchConfig;
use transbench_cli::config::loader::{DEFAULT_CONFIG_FILE, load_config};
use transbench_cli::driver::Driver;
use transbench_cli::{observability, variants};

/// How the configuration path was determined.
#[derive(Debug, Clone, Copy)]
enum ConfigSource {
    /// From --config CLI argument
    CliArgument,
    /// From TRANSBENCH_CONFIG environment variable
    EnvironmentVariable,
    /// Default path (transbench.toml) or built-in defaults
    Default,
}

impl std::fmt::Display for ConfigSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::CliArgument => write!(f, "CLI argument (--config)"),
            Self::EnvironmentVariable => write!(f, "environment variable (TRANSBENCH_CONFIG)"),
            Self::Default => write!(f, "default"),
        }
    }
}

fn main() {
    observability::init_tracing();

    let (config_path, source) = resolve_config_path();

    let cfg = match load_config(config_path.as_deref()) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Configuration error: {e}");
            std::process::exit(2);
        }
    };

    tracing::info!(
        path = %config_path
            .as_deref()
            .map_or_else(|| DEFAULT_CONFIG_FILE.to_string(), |p| p.display().to_string()),
        source = %source,
        "Configuration loaded"
    );

    observability::apply_logging_level(&cfg.logging.level);

    let mut ok = run_variants(&cfg);

    if cfg.scripts.module_demo {
        if let Err(e) = run_module_demo(&cfg) {
            tracing::error!(error = %format!("{e:#}"), "Module demo failed");
            eprintln!("Module demo failed: {e:#}");
            ok = false;
        }
    }

    if !ok {
        std::process::exit(1);
    }
}

/// Run every enabled variant and print its summary line.
///
/// Returns `false` if any variant aborted.
fn run_variants(cfg: &BenchConfig) -> bool {
    let driver = Driver {
        warmup: cfg.driver.warmup,
        iterations: cfg.driver.iterations,
        unit: cfg.driver.unit,
        verify: cfg.driver.verify,
    };
    let engine = variants::shared_engine(&cfg.engine);

    let mut ok = true;
    for kind in &cfg.driver.variants {
        let variant = variants::build(*kind, cfg, &engine);
        let report = driver.run(variant.as_ref());
        println!("{report}");
        ok &= !report.is_aborted();
    }

    let stats = engine.cache_stats();
    tracing::debug!(
        entries = stats.entries,
        hits = stats.hits,
        misses = stats.misses,
        "Script code cache"
    );
    ok
}

fn run_module_demo(cfg: &BenchConfig) -> anyhow::Result<()> {
    let path = &cfg.scripts.entry_module;
    transbench_script::evaluate_entry_module(&cfg.engine, path)
        .with_context(|| format!("evaluating entry module {}", path.display()))
}

/// Resolve the configuration file path.
///
/// Priority order:
/// 1. CLI argument: --config <path>
/// 2. Environment variable: TRANSBENCH_CONFIG
/// 3. Default: transbench.toml if present, built-in defaults otherwise
fn resolve_config_path() -> (Option<PathBuf>, ConfigSource) {
    let mut args = env::args().skip(1);
    while let Some(arg) = args.next() {
        if arg == "--config" {
            if let Some(path) = args.next() {
                return (Some(PathBuf::from(path)), ConfigSource::CliArgument);
            }
        }
    }

    if let Ok(path) = env::var("TRANSBENCH_CONFIG") {
        if !path.is_empty() {
            return (Some(PathBuf::from(path)), ConfigSource::EnvironmentVariable);
        }
    }

    (None, ConfigSource::Default)
}
