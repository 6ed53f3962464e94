//! Configuration file parsing for .cpg.toml

use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::debug;

use crate::graph::query::DEFAULT_MAX_PATHS;

/// Name of the configuration file looked up by [`CpgConfig::find_and_load`]
pub const CONFIG_FILE_NAME: &str = ".cpg.toml";

/// Main configuration structure for .cpg.toml
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CpgConfig {
    #[serde(default)]
    pub build: BuildConfig,

    #[serde(default)]
    pub query: QueryConfig,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuildConfig {
    /// Glob patterns (relative to the build root) selecting source files
    #[serde(default = "default_include")]
    pub include: Vec<String>,

    /// Extra directory names skipped anywhere in the tree, on top of
    /// [`crate::discovery::ALWAYS_EXCLUDED`]
    #[serde(default = "default_exclude_dirs")]
    pub exclude_dirs: Vec<String>,

    /// Build per-file graphs on the rayon pool
    #[serde(default = "default_true")]
    pub parallel: bool,

    /// Honour .gitignore / .ignore files while walking
    #[serde(default = "default_true")]
    pub respect_gitignore: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueryConfig {
    /// Upper bound on paths collected by one bounded-depth query
    #[serde(default = "default_max_paths")]
    pub max_paths: usize,
}

// Default functions
fn default_include() -> Vec<String> {
    ["**/*.ts", "**/*.tsx", "**/*.mts", "**/*.cts"]
        .into_iter()
        .map(String::from)
        .collect()
}

fn default_exclude_dirs() -> Vec<String> {
    Vec::new()
}

fn default_true() -> bool {
    true
}

fn default_max_paths() -> usize {
    DEFAULT_MAX_PATHS
}

impl Default for BuildConfig {
    fn default() -> Self {
        Self {
            include: default_include(),
            exclude_dirs: default_exclude_dirs(),
            parallel: true,
            respect_gitignore: true,
        }
    }
}

impl Default for QueryConfig {
    fn default() -> Self {
        Self {
            max_paths: default_max_paths(),
        }
    }
}

impl CpgConfig {
    /// Load configuration from a file
    pub fn from_file(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        let config: CpgConfig = toml::from_str(&contents)?;
        Ok(config)
    }

    /// Find and load .cpg.toml from `start_dir` or its ancestors
    pub fn find_and_load(start_dir: &Path) -> Result<Self> {
        let mut current = start_dir;

        loop {
            let config_path = current.join(CONFIG_FILE_NAME);
            if config_path.exists() {
                debug!(path = %config_path.display(), "Loading configuration");
                return Self::from_file(&config_path);
            }

            match current.parent() {
                Some(parent) => current = parent,
                None => break,
            }
        }

        // No config found, use defaults
        Ok(Self::default())
    }

    /// Save configuration to a file
    pub fn save(&self, path: &Path) -> Result<()> {
        let contents = toml::to_string_pretty(self)?;
        std::fs::write(path, contents)?;
        Ok(())
    }
}
