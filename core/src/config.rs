use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

use crate::error::{Error, Result};

/// Sizing of the worker pool and of the shuffle.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub workers: usize,
    /// Number of reduce partitions, i.e. `part-*` files per stage output.
    pub partitions: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        let workers = std::thread::available_parallelism().map(|n| n.get()).unwrap_or(1);
        Self { workers, partitions: 1 }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    #[serde(flatten)]
    pub engine: EngineConfig,
    /// Discover documents in subdirectories of the corpus too.
    pub recursive: bool,
    /// Replace existing stage outputs instead of refusing to run.
    pub overwrite: bool,
    pub top_k: Option<usize>,
}

impl PipelineConfig {
    /// Reads a JSON config file. Missing fields take their defaults.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let text = fs::read_to_string(path)?;
        let config: PipelineConfig = serde_json::from_str(&text)
            .map_err(|e| Error::Config(format!("{}: {e}", path.display())))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.engine.workers == 0 {
            return Err(Error::Config("workers must be at least 1".into()));
        }
        if self.engine.partitions == 0 {
            return Err(Error::Config("partitions must be at least 1".into()));
        }
        if self.top_k == Some(0) {
            return Err(Error::Config("top_k must be at least 1".into()));
        }
        Ok(())
    }
}
