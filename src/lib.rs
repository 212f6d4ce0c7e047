//! Tributary - a plugin-driven content orchestration engine
//!
//! Tributary runs an ordered list of plugins through two lifecycle phases:
//! a one-time bootstrap that populates a persisted, namespaced context
//! store, and a repeatable transform that folds a shared data bag through
//! each plugin to produce files on disk. The engine owns sequencing, state
//! isolation, caching, change detection and output reconciliation; fetching
//! and shaping content is the plugins' business.
//!
//! ```no_run
//! use tributary::{DataBag, Engine, EngineOptions, FileDescriptor, FileFormat, PluginEntry};
//!
//! # fn main() -> anyhow::Result<()> {
//! let engine = Engine::new(EngineOptions::default());
//!
//! engine.load_plugins(vec![PluginEntry::new(tributary::transform_fn(
//!     |_ctx, mut data: DataBag| {
//!         data.files.push(FileDescriptor::new(
//!             "out.json",
//!             FileFormat::Json,
//!             serde_json::json!({ "hello": "world" }),
//!         ));
//!         Ok(data)
//!     },
//! ))])?;
//!
//! engine.bootstrap_all()?;
//! engine.transform()?;
//! # Ok(())
//! # }
//! ```

pub mod domain;
pub mod engine;
pub mod log;
pub mod output;
pub mod plugin;
pub mod storage;
pub mod watch;

pub use domain::{DataBag, FileDescriptor, FileFormat};
pub use engine::diff::{BagDiff, Change, ChangeKind};
pub use engine::options::{OptionSchema, OptionSpec, RuntimeParameters};
pub use engine::{Engine, EngineOptions, Refresh, TransformCallback, DEFAULT_CACHE_FILE};
pub use log::{LogStyle, Logger, NamespacedLogger};
pub use plugin::{
    transform_fn, BootstrapContext, HookContext, Plugin, PluginEntry, TransformContext,
};
