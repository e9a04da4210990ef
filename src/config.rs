//! Engine configuration.
use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{Error, IoContext, Result};

/// How the shuffle distributes the merged stream over reducers.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum Partitioning {
    /// Roll over to the next partition once the current one exceeds
    /// `total / reducers` bytes and the key changes. Never more than
    /// `reducers` partitions.
    #[default]
    SizeTarget,
    /// Measure every key group first, then cut the stream into exactly
    /// `min(reducers, groups)` partitions of similar size.
    Balanced,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct EngineConfig {
    pub mappers: usize,
    pub reducers: usize,
    pub combine: bool,
    pub partitioning: Partitioning,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            mappers: 4,
            reducers: 2,
            combine: true,
            partitioning: Partitioning::SizeTarget,
        }
    }
}

impl EngineConfig {
    /// Loads a JSON config file. Missing fields take their defaults.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let raw = fs::read_to_string(path).with_path(path)?;
        let config: EngineConfig = serde_json::from_str(&raw)
            .map_err(|e| Error::InvalidConfig(format!("{}: {e}", path.display())))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.mappers == 0 {
            return Err(Error::InvalidConfig("mappers must be positive".into()));
        }
        if self.reducers == 0 {
            return Err(Error::InvalidConfig("reducers must be positive".into()));
        }
        Ok(())
    }
}
