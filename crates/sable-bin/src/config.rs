//! Configuration loading: `sable.toml` in the working directory, falling
//! back to the platform config dir. Unknown fields are ignored so the
//! file can grow without breaking older binaries.

use std::{fs, path::PathBuf};

use anyhow::Result;
use serde::Deserialize;
use tracing::info;

/// Floor for the configured block size; below this the paging overhead
/// dominates and tiny blocks only make sense in tests.
const MIN_BLOCK_SIZE: usize = 16;

#[derive(Debug, Deserialize, Clone)]
pub struct BufferConfig {
    #[serde(default = "BufferConfig::default_block_size")]
    pub block_size: usize,
}

impl Default for BufferConfig {
    fn default() -> Self {
        Self {
            block_size: Self::default_block_size(),
        }
    }
}

impl BufferConfig {
    const fn default_block_size() -> usize {
        core_runes::DEFAULT_BLOCK_SIZE
    }
}

#[derive(Debug, Deserialize, Default, Clone)]
pub struct Config {
    #[serde(default)]
    pub buffer: BufferConfig,
}

impl Config {
    /// Block size with the floor applied.
    pub fn effective_block_size(&self) -> usize {
        self.buffer.block_size.max(MIN_BLOCK_SIZE)
    }
}

/// Best-effort config path: prefer a local `sable.toml`, then the
/// platform config dir.
pub fn discover() -> PathBuf {
    let local = PathBuf::from("sable.toml");
    if local.exists() {
        return local;
    }
    if let Some(dir) = dirs::config_dir() {
        return dir.join("sable").join("sable.toml");
    }
    PathBuf::from("sable.toml")
}

pub fn load_from(path: Option<PathBuf>) -> Result<Config> {
    let path = path.unwrap_or_else(discover);
    match fs::read_to_string(&path) {
        Ok(content) => {
            let cfg: Config = toml::from_str(&content)?;
            info!(target: "config", path = %path.display(), block_size = cfg.buffer.block_size, "config loaded");
            Ok(cfg)
        }
        Err(_) => {
            info!(target: "config", path = %path.display(), "no config file; using defaults");
            Ok(Config::default())
        }
    }
}
