//! Option resolution for plugin invocations
//!
//! Effective options are computed on every hook invocation by merging, in
//! ascending precedence: the schema default (optionally sourced from an
//! environment variable), the user's plugin configuration block, and a
//! runtime-parameter override. This is a merge, not a validating parse;
//! unknown keys pass through untouched.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// How a single option's default is derived and which runtime parameter, if
/// any, overrides it
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct OptionSpec {
    /// Value used when neither the environment, the config block, nor a
    /// runtime parameter provides one
    pub default: Option<Value>,

    /// Environment variable consulted for the default; when the variable is
    /// defined it takes precedence over `default`
    pub env: Option<String>,

    /// Name of the runtime parameter that overrides everything else
    pub runtime_parameter: Option<String>,
}

impl OptionSpec {
    pub fn with_default(value: Value) -> Self {
        Self {
            default: Some(value),
            ..Self::default()
        }
    }
}

/// Per-plugin option declarations, keyed by option name
pub type OptionSchema = BTreeMap<String, OptionSpec>;

/// Engine-wide parameters supplied by the host at construction time
#[derive(Debug, Clone)]
pub struct RuntimeParameters {
    /// Whether the context cache file is read and written
    pub cache: bool,

    /// Suppresses the styled log channel (the debug channel is unaffected)
    pub quiet: bool,

    /// Named parameters that plugins can declare as option overrides
    pub params: Map<String, Value>,
}

impl Default for RuntimeParameters {
    fn default() -> Self {
        Self {
            cache: true,
            quiet: false,
            params: Map::new(),
        }
    }
}

impl RuntimeParameters {
    /// Looks up a named runtime parameter
    pub fn param(&self, name: &str) -> Option<&Value> {
        self.params.get(name)
    }
}

/// Computes the effective options for one plugin invocation.
///
/// For each declared key: environment value if `env` is set and defined,
/// else the schema default, else absent; overridden by the config block's
/// value; overridden again by the declared runtime parameter when present.
/// Config keys not declared in the schema pass through unchanged.
pub fn resolve_options(
    schema: &OptionSchema,
    config_options: &Map<String, Value>,
    runtime: &RuntimeParameters,
) -> Map<String, Value> {
    let mut effective = Map::new();

    for (key, spec) in schema {
        let env_value = spec
            .env
            .as_deref()
            .and_then(|name| std::env::var(name).ok())
            .map(Value::String);

        let mut value = env_value.or_else(|| spec.default.clone());

        if let Some(configured) = config_options.get(key) {
            value = Some(configured.clone());
        }

        if let Some(parameter) = spec.runtime_parameter.as_deref() {
            if let Some(override_value) = runtime.param(parameter) {
                value = Some(override_value.clone());
            }
        }

        if let Some(value) = value {
            effective.insert(key.clone(), value);
        }
    }

    for (key, value) in config_options {
        if !schema.contains_key(key) {
            effective.insert(key.clone(), value.clone());
        }
    }

    effective
}
