//! # Storage Layer
//!
//! Persistence for the engine's cross-run state.
//!
//! The only thing the engine persists is the plugin context: one JSON
//! document holding every plugin's namespaced state, written after a
//! successful bootstrap and read back at engine start. Output files are not
//! storage — they are produced by the output reconciler and tracked only
//! in memory.
//!
//! ```text
//! .tributary-cache.json     # Entire context, one namespace per plugin
//! ```
//!
//! A missing or corrupt cache is never an error; the context simply starts
//! empty.

mod context;

pub use context::{ContextError, ContextStore};
