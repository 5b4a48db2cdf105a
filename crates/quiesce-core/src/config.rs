//! Configuration loading for convergence checks.
//!
//! Configuration lives in a `quiesce.toml` at the directory the check runs
//! from. Every field has a default so a missing file still yields a
//! working setup, apart from the driver list which has to come from the
//! file or the command line.

use crate::error::ErrorCode;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Config file name expected in the working directory.
pub const CONFIG_FILE: &str = "quiesce.toml";

/// Top-level configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    #[serde(default)]
    pub provider: ProviderConfig,
    #[serde(default)]
    pub check: CheckConfig,
    #[serde(default)]
    pub state: StateConfig,
}

/// How cache snapshots are obtained.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ProviderConfig {
    /// Command template for the cache dump tool. `{driver}` and `{file}`
    /// are substituted on every fetch.
    #[serde(default = "default_command")]
    pub command: Vec<String>,
    /// Directory dump files are written to. Defaults to the system temp
    /// directory.
    #[serde(default)]
    pub work_dir: Option<PathBuf>,
}

/// What a bare `check` invocation samples.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CheckConfig {
    /// Drivers sampled when none are named on the command line.
    #[serde(default)]
    pub drivers: Vec<String>,
}

/// Where tracker state lives between invocations.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct StateConfig {
    #[serde(default = "default_state_path")]
    pub path: PathBuf,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            command: default_command(),
            work_dir: None,
        }
    }
}

impl Default for StateConfig {
    fn default() -> Self {
        Self {
            path: default_state_path(),
        }
    }
}

fn default_command() -> Vec<String> {
    vec![
        "dxcmd".to_string(),
        "-dumpcache".to_string(),
        "{driver}".to_string(),
        "{file}".to_string(),
    ]
}

fn default_state_path() -> PathBuf {
    PathBuf::from(".quiesce/state.json")
}

impl ProviderConfig {
    /// Final command template after the executable override, if any.
    ///
    /// # Errors
    ///
    /// Fails when the template is empty.
    pub fn resolved_command(&self, tool_override: Option<&str>) -> Result<Vec<String>> {
        anyhow::ensure!(
            !self.command.is_empty(),
            "{}: [provider].command is empty in {CONFIG_FILE}",
            ErrorCode::ProviderCommandEmpty
        );
        let mut command = self.command.clone();
        if let Some(tool) = tool_override {
            command[0] = tool.to_string();
        }
        Ok(command)
    }

    /// Dump directory, falling back to the system temp directory.
    #[must_use]
    pub fn work_dir_path(&self) -> PathBuf {
        self.work_dir.clone().unwrap_or_else(std::env::temp_dir)
    }
}

/// Load configuration from `path`. A missing file yields defaults.
///
/// # Errors
///
/// Fails when the file exists but cannot be read or parsed.
pub fn load_config(path: &Path) -> Result<Config> {
    if !path.exists() {
        return Ok(Config::default());
    }

    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;

    toml::from_str(&content).with_context(|| {
        format!(
            "{}: Failed to parse {}",
            ErrorCode::ConfigParseError,
            path.display()
        )
    })
}
