//! # Orchestration Engine
//!
//! Coordinates the two plugin lifecycle phases: a one-time bootstrap pass
//! that populates the persisted context store, and a repeatable transform
//! pass that folds a fresh data bag through every bootstrapped plugin and
//! hands the result to the output reconciler.
//!
//! ## Sequencing guarantees
//!
//! - Bootstrap hooks run in declared plugin order, exactly once each.
//! - Transform hooks run in declared order within a run, never concurrently.
//! - Transform runs are single-flight: a `refresh` arriving while a run is
//!   in flight queues exactly one follow-up run, no matter how many
//!   refreshes arrive. A refresh during bootstrap is a no-op.
//!
//! The engine is a cheap-to-clone handle around shared state; hooks execute
//! on whichever thread triggered the run. No hook has a timeout — a hung
//! plugin stalls the engine by contract.

pub mod diff;
pub mod options;

use std::path::PathBuf;
use std::sync::{Arc, Mutex, Weak};

use anyhow::{Context as _, Result};
use serde_json::{Map, Value};

use crate::domain::DataBag;
use crate::log::{LogStyle, Logger};
use crate::output::OutputReconciler;
use crate::plugin::{BootstrapContext, HookContext, Plugin, PluginEntry, TransformContext};
use crate::storage::ContextStore;

use self::diff::diff_bags;
use self::options::{resolve_options, OptionSchema, RuntimeParameters};

/// Default cache file, relative to the working directory
pub const DEFAULT_CACHE_FILE: &str = ".tributary-cache.json";

/// Namespace for the engine's own lines on the diagnostic channel
const CORE_NAMESPACE: &str = "engine";

/// Construction-time engine settings
#[derive(Debug, Clone)]
pub struct EngineOptions {
    /// Location of the context cache file
    pub cache_path: PathBuf,

    /// Base directory against which relative output paths are resolved
    pub output_dir: PathBuf,

    /// Runtime parameters (cache toggle, quiet flag, option overrides)
    pub runtime: RuntimeParameters,
}

impl Default for EngineOptions {
    fn default() -> Self {
        Self {
            cache_path: PathBuf::from(DEFAULT_CACHE_FILE),
            output_dir: PathBuf::from("."),
            runtime: RuntimeParameters::default(),
        }
    }
}

/// Callback invoked once per transform run with the run's outcome
pub type TransformCallback =
    Box<dyn Fn(Result<&DataBag, &anyhow::Error>) + Send + Sync>;

/// Lifecycle phase of the engine
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Idle,
    Bootstrapping,
    Transforming,
}

/// A normalized plugin list entry; order is fixed for the engine's lifetime
struct PluginDescriptor {
    /// Context namespace: declared name or a generated placeholder
    name: String,

    module: Arc<dyn Plugin>,

    /// Option schema, captured once at load time
    schema: OptionSchema,

    /// The user's configuration block for this plugin
    config_options: Map<String, Value>,
}

impl PluginDescriptor {
    fn resolved_options(&self, runtime: &RuntimeParameters) -> Map<String, Value> {
        resolve_options(&self.schema, &self.config_options, runtime)
    }
}

/// Per-plugin run state, indexed like the descriptor list
#[derive(Default)]
struct PluginRunState {
    /// Set true, irreversibly, once the bootstrap hook has completed
    bootstrapped: bool,

    /// The bag this plugin returned on the previous completed run; diff
    /// baseline for its next invocation
    recorded: Option<DataBag>,
}

/// The two-flag transform state machine plus per-plugin run state
struct RunState {
    phase: Phase,
    queued: bool,
    plugins: Vec<PluginRunState>,
}

struct EngineInner {
    logger: Logger,
    runtime: RuntimeParameters,
    context: Arc<ContextStore>,
    reconciler: OutputReconciler,
    descriptors: Mutex<Vec<PluginDescriptor>>,
    run: Mutex<RunState>,
    on_transform: Mutex<Option<TransformCallback>>,
}

/// The orchestration engine; a cheap-to-clone, thread-safe handle
#[derive(Clone)]
pub struct Engine {
    inner: Arc<EngineInner>,
}

impl Engine {
    pub fn new(options: EngineOptions) -> Self {
        Self {
            inner: Arc::new(EngineInner {
                logger: Logger::new(options.runtime.quiet),
                context: Arc::new(ContextStore::new(options.cache_path)),
                reconciler: OutputReconciler::new(options.output_dir),
                runtime: options.runtime,
                descriptors: Mutex::new(Vec::new()),
                run: Mutex::new(RunState {
                    phase: Phase::Idle,
                    queued: false,
                    plugins: Vec::new(),
                }),
                on_transform: Mutex::new(None),
            }),
        }
    }

    /// The engine-wide log channel
    pub fn logger(&self) -> Logger {
        self.inner.logger
    }

    /// Normalizes and installs the declared plugin list, replacing any
    /// previously loaded one. Fails while a bootstrap or transform is in
    /// flight.
    pub fn load_plugins(&self, entries: Vec<PluginEntry>) -> Result<()> {
        let mut run = self.lock_run();
        if run.phase != Phase::Idle {
            anyhow::bail!("Cannot load plugins while the engine is busy");
        }

        let descriptors: Vec<PluginDescriptor> = entries
            .into_iter()
            .enumerate()
            .map(|(index, entry)| {
                let name = entry
                    .module
                    .name()
                    .map(str::to_string)
                    .unwrap_or_else(|| format!("plugin-{}", index));
                let schema = entry.module.options();

                PluginDescriptor {
                    name,
                    module: entry.module,
                    schema,
                    config_options: entry.options,
                }
            })
            .collect();

        run.plugins = descriptors
            .iter()
            .map(|_| PluginRunState::default())
            .collect();
        run.queued = false;

        *self.lock_descriptors() = descriptors;
        Ok(())
    }

    /// Namespace of the plugin at `index` in the declared list
    pub fn plugin_name_at(&self, index: usize) -> Option<String> {
        self.lock_descriptors()
            .get(index)
            .map(|descriptor| descriptor.name.clone())
    }

    /// Replaces the configuration block of the plugin at `index`; the hook
    /// a setup wizard uses after loading the list
    pub fn set_options(&self, index: usize, options: Map<String, Value>) -> Result<()> {
        let mut descriptors = self.lock_descriptors();
        let descriptor = descriptors
            .get_mut(index)
            .with_context(|| format!("No plugin at index {}", index))?;
        descriptor.config_options = options;
        Ok(())
    }

    /// Installs the reporting callback, invoked once per transform run
    pub fn set_on_transform(&self, callback: TransformCallback) {
        *self
            .inner
            .on_transform
            .lock()
            .expect("callback lock poisoned") = Some(callback);
    }

    /// Deep copy of the entire context mapping
    pub fn context(&self) -> Map<String, Value> {
        self.inner.context.snapshot()
    }

    /// A refresh handle bound to this engine; holds only a weak reference,
    /// so plugins retaining one cannot keep the engine alive
    pub fn refresh_handle(&self) -> Refresh {
        Refresh {
            inner: Arc::downgrade(&self.inner),
        }
    }

    /// Runs every plugin's bootstrap hook, strictly in declaration order.
    ///
    /// Hydrates the context store on entry and persists it after the full
    /// pass completes. A hook failure aborts the remaining pass; plugins
    /// bootstrapped before the failure stay bootstrapped, and the engine
    /// returns to idle either way.
    pub fn bootstrap_all(&self) -> Result<()> {
        {
            let mut run = self.lock_run();
            if run.phase != Phase::Idle {
                anyhow::bail!("Cannot bootstrap while the engine is busy");
            }
            run.phase = Phase::Bootstrapping;
        }

        let result = self.bootstrap_pass();

        self.lock_run().phase = Phase::Idle;

        if result.is_ok() && self.inner.runtime.cache {
            self.inner.context.persist();
        }

        result
    }

    fn bootstrap_pass(&self) -> Result<()> {
        if self.inner.runtime.cache {
            self.inner.context.hydrate();
        }

        let count = self.lock_descriptors().len();

        for index in 0..count {
            // Descriptors are re-read per iteration so option edits made by
            // earlier hooks (via set_options) are visible downstream.
            let (name, module, options) = {
                let descriptors = self.lock_descriptors();
                let descriptor = &descriptors[index];
                (
                    descriptor.name.clone(),
                    Arc::clone(&descriptor.module),
                    descriptor.resolved_options(&self.inner.runtime),
                )
            };

            tracing::debug!(plugin = %name, "running bootstrap hook");

            let ctx = BootstrapContext {
                options,
                log: self.inner.logger.namespaced(name.clone()),
                store: Arc::clone(&self.inner.context),
                namespace: name.clone(),
                refresh: self.refresh_handle(),
            };

            module
                .bootstrap(&ctx)
                .with_context(|| format!("Bootstrap hook of `{}` failed", name))?;

            self.lock_run().plugins[index].bootstrapped = true;
        }

        Ok(())
    }

    /// Triggers a transform run.
    ///
    /// Returns `Ok(None)` without starting work when the engine is
    /// bootstrapping, or when a run is already in flight (in which case
    /// exactly one follow-up run is queued, however many calls arrive).
    /// Otherwise runs to completion and returns the final bag; a queued
    /// follow-up is executed before returning, with its outcome delivered
    /// through the reporting callback only.
    pub fn transform(&self) -> Result<Option<DataBag>> {
        {
            let mut run = self.lock_run();
            match run.phase {
                Phase::Bootstrapping => return Ok(None),
                Phase::Transforming => {
                    run.queued = true;
                    return Ok(None);
                }
                Phase::Idle => run.phase = Phase::Transforming,
            }
        }

        let mut first_result = None;

        loop {
            let result = self.run_transform_once();
            self.report(&result);

            if first_result.is_none() {
                first_result = Some(result);
            }

            let run_again = {
                let mut run = self.lock_run();
                if run.queued {
                    run.queued = false;
                    true
                } else {
                    run.phase = Phase::Idle;
                    false
                }
            };

            if !run_again {
                break;
            }
        }

        first_result.expect("transform loop ran at least once").map(Some)
    }

    /// One complete transform pass: snapshot, fold, reconcile, notify
    fn run_transform_once(&self) -> Result<DataBag> {
        let snapshot = Arc::new(self.inner.context.snapshot());

        let descriptors: Vec<(String, Arc<dyn Plugin>, Map<String, Value>)> = self
            .lock_descriptors()
            .iter()
            .map(|descriptor| {
                (
                    descriptor.name.clone(),
                    Arc::clone(&descriptor.module),
                    descriptor.resolved_options(&self.inner.runtime),
                )
            })
            .collect();

        let (flags, mut pending): (Vec<bool>, Vec<Option<DataBag>>) = {
            let run = self.lock_run();
            run.plugins
                .iter()
                .map(|state| (state.bootstrapped, state.recorded.clone()))
                .unzip()
        };

        for ((name, module, options), bootstrapped) in descriptors.iter().zip(flags.iter().copied()) {
            if !bootstrapped {
                continue;
            }
            module.on_transform_start(&HookContext {
                options: options.clone(),
                log: self.inner.logger.namespaced(name.clone()),
                snapshot: Arc::clone(&snapshot),
                namespace: name.clone(),
            });
        }

        let mut bag = DataBag::new();

        for (index, (name, module, options)) in descriptors.iter().enumerate() {
            if !flags[index] {
                // Never bootstrapped: the bag passes through untouched.
                continue;
            }

            let previous = pending[index].clone().unwrap_or_default();
            let diff = diff_bags(&previous, &bag);

            tracing::debug!(
                plugin = %name,
                changed_buckets = diff.len(),
                "running transform hook"
            );

            let ctx = TransformContext {
                options: options.clone(),
                log: self.inner.logger.namespaced(name.clone()),
                diff,
                snapshot: Arc::clone(&snapshot),
                namespace: name.clone(),
            };

            bag = module
                .transform(&ctx, bag)
                .with_context(|| format!("Transform hook of `{}` failed", name))?;

            pending[index] = Some(bag.clone());
        }

        // Diff baselines only advance on completed runs; a failed fold
        // above returns before this commit.
        {
            let mut run = self.lock_run();
            for (state, recorded) in run.plugins.iter_mut().zip(pending) {
                state.recorded = recorded;
            }
        }

        self.inner
            .reconciler
            .reconcile(&bag.files, &self.inner.logger);

        for ((name, module, options), bootstrapped) in descriptors.iter().zip(flags.iter().copied()) {
            if !bootstrapped {
                continue;
            }
            module.on_transform_end(
                &HookContext {
                    options: options.clone(),
                    log: self.inner.logger.namespaced(name.clone()),
                    snapshot: Arc::clone(&snapshot),
                    namespace: name.clone(),
                },
                &bag,
            );
        }

        Ok(bag)
    }

    fn report(&self, result: &Result<DataBag>) {
        if let Err(error) = result {
            self.inner.logger.log(
                CORE_NAMESPACE,
                &format!("Transform run failed: {:#}", error),
                LogStyle::Failure,
            );
        }

        let callback = self
            .inner
            .on_transform
            .lock()
            .expect("callback lock poisoned");
        if let Some(callback) = callback.as_ref() {
            callback(result.as_ref());
        }
    }

    fn lock_run(&self) -> std::sync::MutexGuard<'_, RunState> {
        self.inner.run.lock().expect("run state lock poisoned")
    }

    fn lock_descriptors(&self) -> std::sync::MutexGuard<'_, Vec<PluginDescriptor>> {
        self.inner
            .descriptors
            .lock()
            .expect("descriptor lock poisoned")
    }
}

/// Capability handed to bootstrap hooks (and available to hosts) that
/// triggers a transform run from any thread.
///
/// Holds a weak engine reference: a plugin stashing the handle in a timer
/// thread cannot leak the engine, and a refresh after the engine is gone is
/// a silent no-op.
#[derive(Clone)]
pub struct Refresh {
    inner: Weak<EngineInner>,
}

impl Refresh {
    /// Requests a transform run; outcome is delivered through the engine's
    /// reporting callback
    pub fn trigger(&self) {
        if let Some(inner) = self.inner.upgrade() {
            let engine = Engine { inner };
            if let Err(error) = engine.transform() {
                tracing::debug!("refresh-triggered transform failed: {:#}", error);
            }
        }
    }
}
