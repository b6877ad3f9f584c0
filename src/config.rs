//! Engine settings, read with the `config` crate from an optional TOML file
//! layered under `SCG__*` environment variables, e.g.
//! `SCG__COVERING=exhaustive_minimal` or `SCG__PRECOMPUTE__ALLOW_SELF_PAIRING=true`.

use std::path::Path;

use config::{Config, Environment, File, FileFormat};
use serde::{Deserialize, Serialize};

use crate::error::Result;

/// How many coverings a tick looks for once its seed partial is chosen.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CoveringPolicy {
    /// Stop at the first covering found.
    #[default]
    FirstFound,
    /// Exhaust the search and keep every covering not subsumed by an earlier one.
    ExhaustiveMinimal,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PrecomputeConfig {
    /// Pair a construction's merge side with its own match side.
    pub allow_self_pairing: bool,
    /// Precomps kept per producer/consumer pair and touched match-triple set.
    pub max_precomps_per_touched_set: usize,
}

impl Default for PrecomputeConfig {
    fn default() -> Self {
        Self { allow_self_pairing: false, max_precomps_per_touched_set: 1 }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub covering: CoveringPolicy,
    pub precompute: PrecomputeConfig,
    /// Upper limit on ticks spent in one `run_until_quiescent` call.
    pub max_ticks: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self { covering: CoveringPolicy::default(), precompute: PrecomputeConfig::default(), max_ticks: 10_000 }
    }
}

impl EngineConfig {
    /// Loads settings from `path`, when given, and the environment.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut builder = Config::builder();
        if let Some(path) = path {
            builder = builder.add_source(File::from(path).required(true));
        }
        let settings = builder
            .add_source(Environment::with_prefix("SCG").separator("__"))
            .build()?;
        Ok(settings.try_deserialize()?)
    }
    pub fn from_toml(toml: &str) -> Result<Self> {
        let settings = Config::builder().add_source(File::from_str(toml, FileFormat::Toml)).build()?;
        Ok(settings.try_deserialize()?)
    }
}
