//! The four benchmark variants wired to the driver.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use transbench_core::{Decoder, Fixture, FixtureGenerator};
use transbench_declarative::{Program, Tree};
use transbench_script::{
    ExecutionContext, InvocationMode, ParallelInvoker, ScriptEngine, ScriptModule, ScriptOptions,
};

use crate::config::{BenchConfig, VariantKind};
use crate::driver::{CallError, CallOutput, PreparedVariant, Variant, VariantError};

/// Build the variant named by `kind` from configuration.
///
/// Scripting variants share `engine`, so repeated loads of a script hit its
/// compiled-code cache.
pub fn build(kind: VariantKind, cfg: &BenchConfig, engine: &Arc<ScriptEngine>) -> Box<dyn Variant> {
    let fixtures = cfg.fixture_generator();
    match kind {
        VariantKind::Declarative => Box::new(DeclarativeVariant {
            program: cfg.scripts.declarative.clone(),
            fixtures,
            decoder: cfg.decoder(),
        }),
        VariantKind::Generic => Box::new(GenericScriptVariant {
            engine: Arc::clone(engine),
            script: cfg.scripts.generic.clone(),
            fixtures,
            decoder: cfg.decoder(),
        }),
        VariantKind::Typed => Box::new(TypedScriptVariant {
            engine: Arc::clone(engine),
            script: cfg.scripts.typed.clone(),
            fixtures,
        }),
        VariantKind::Parallel => {
            let script = match cfg.parallel.mode {
                InvocationMode::Typed => cfg.scripts.typed.clone(),
                InvocationMode::Generic => cfg.scripts.generic.clone(),
            };
            Box::new(ParallelVariant {
                invoker: ParallelInvoker::new(Arc::clone(engine), script)
                    .with_workers(cfg.parallel.workers)
                    .with_deadline(cfg.parallel.deadline)
                    .with_mode(cfg.parallel.mode)
                    .with_decoder(cfg.decoder()),
                fixtures,
            })
        }
    }
}

/// Shared engine for the scripting variants of one run.
pub fn shared_engine(options: &ScriptOptions) -> Arc<ScriptEngine> {
    Arc::new(ScriptEngine::new(options.clone()))
}

pub struct DeclarativeVariant {
    pub program: PathBuf,
    pub fixtures: FixtureGenerator,
    pub decoder: Decoder,
}

struct PreparedDeclarative {
    program: Program,
    tree: Tree,
    fixture: Fixture,
    decoder: Decoder,
}

impl Variant for DeclarativeVariant {
    fn name(&self) -> String {
        "declarative (jq)".to_string()
    }

    fn prepare(&self) -> Result<Box<dyn PreparedVariant>, VariantError> {
        let program = Program::from_file(&self.program)?;
        let fixture = self.fixtures.generate();
        let tree = Tree::from_fixture(&fixture);

        Ok(Box::new(PreparedDeclarative {
            program,
            tree,
            fixture,
            decoder: self.decoder,
        }))
    }
}

impl PreparedVariant for PreparedDeclarative {
    fn fixture(&self) -> &Fixture {
        &self.fixture
    }

    fn call(&mut self) -> Result<CallOutput, CallError> {
        let output = self.program.apply(&self.tree)?;

        let started = Instant::now();
        let records = self
            .decoder
            .decode_records(output)
            .map_err(transbench_declarative::Error::from)?;
        Ok(CallOutput::single(records).with_decode(started.elapsed()))
    }
}

pub struct GenericScriptVariant {
    pub engine: Arc<ScriptEngine>,
    pub script: PathBuf,
    pub fixtures: FixtureGenerator,
    pub decoder: Decoder,
}

struct PreparedGeneric {
    context: ExecutionContext,
    module: ScriptModule,
    fixture: Fixture,
    decoder: Decoder,
}

impl Variant for GenericScriptVariant {
    fn name(&self) -> String {
        "script generic (rhai)".to_string()
    }

    fn prepare(&self) -> Result<Box<dyn PreparedVariant>, VariantError> {
        let mut context = ExecutionContext::new(Arc::clone(&self.engine));
        let module = context.load_module(&self.script)?;

        Ok(Box::new(PreparedGeneric {
            context,
            module,
            fixture: self.fixtures.generate(),
            decoder: self.decoder,
        }))
    }
}

impl PreparedVariant for PreparedGeneric {
    fn fixture(&self) -> &Fixture {
        &self.fixture
    }

    fn call(&mut self) -> Result<CallOutput, CallError> {
        let result = self.context.invoke_generic(&self.module, &self.fixture)?;

        let started = Instant::now();
        let records = result
            .decode(&self.decoder)
            .map_err(transbench_script::InvokeError::from)?;
        Ok(CallOutput::single(records).with_decode(started.elapsed()))
    }
}

pub struct TypedScriptVariant {
    pub engine: Arc<ScriptEngine>,
    pub script: PathBuf,
    pub fixtures: FixtureGenerator,
}

struct PreparedTyped {
    context: ExecutionContext,
    module: ScriptModule,
    fixture: Fixture,
}

impl Variant for TypedScriptVariant {
    fn name(&self) -> String {
        "script typed (rhai)".to_string()
    }

    fn prepare(&self) -> Result<Box<dyn PreparedVariant>, VariantError> {
        let mut context = ExecutionContext::new(Arc::clone(&self.engine));
        let module = context.load_module(&self.script)?;

        Ok(Box::new(PreparedTyped {
            context,
            module,
            fixture: self.fixtures.generate(),
        }))
    }
}

impl PreparedVariant for PreparedTyped {
    fn fixture(&self) -> &Fixture {
        &self.fixture
    }

    fn call(&mut self) -> Result<CallOutput, CallError> {
        let records = self.context.invoke_typed(&self.module, &self.fixture)?;
        Ok(CallOutput::single(records))
    }
}

pub struct ParallelVariant {
    pub invoker: ParallelInvoker,
    pub fixtures: FixtureGenerator,
}

struct PreparedParallel {
    invoker: ParallelInvoker,
    fixture: Fixture,
}

impl Variant for ParallelVariant {
    fn name(&self) -> String {
        format!("parallel (rhai, {} threads)", self.invoker.workers())
    }

    fn prepare(&self) -> Result<Box<dyn PreparedVariant>, VariantError> {
        // A broken script aborts the variant here rather than failing every trial.
        let mut probe = ExecutionContext::new(Arc::clone(self.invoker.engine()));
        probe.load_module(self.invoker.script())?;

        Ok(Box::new(PreparedParallel {
            invoker: self.invoker.clone(),
            fixture: self.fixtures.generate(),
        }))
    }
}

impl PreparedVariant for PreparedParallel {
    fn fixture(&self) -> &Fixture {
        &self.fixture
    }

    fn call(&mut self) -> Result<CallOutput, CallError> {
        let report = self.invoker.run_trial(&self.fixture)?;
        if !report.is_success() {
            return Err(CallError::Workers {
                total: self.invoker.workers(),
                failures: report.failures,
            });
        }

        let worker_time = report.worker_time();
        Ok(CallOutput {
            outputs: report.workers.into_iter().map(|w| w.records).collect(),
            ..Default::default()
        }
        .with_workers(worker_time))
    }
}
