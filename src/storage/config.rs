//! Configuration handling for tasktimer
//!
//! Configuration is stored in `.tasktimer/config.toml` (workspace) and
//! `~/.config/tasktimer/config.toml` (global).

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Name of the workspace directory
pub const WORKSPACE_DIR: &str = ".tasktimer";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to parse configuration: {0}")]
    Parse(String),

    #[error("Could not determine a data directory for tasktimer")]
    NoDataDir,
}

/// Export settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ExportConfig {
    /// Template file, relative paths resolve against the workspace directory
    pub template: PathBuf,

    /// Directory for exports without an explicit destination
    pub output_dir: PathBuf,
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            template: PathBuf::from("template_report.html"),
            output_dir: PathBuf::from("."),
        }
    }
}

/// Interactive shell settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ShellConfig {
    /// Event poll interval in milliseconds
    pub tick_ms: u64,

    /// Number of commands kept in the history
    pub history_limit: usize,
}

impl Default for ShellConfig {
    fn default() -> Self {
        Self {
            tick_ms: 250,
            history_limit: 200,
        }
    }
}

/// Workspace-level configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct WorkspaceConfig {
    pub export: ExportConfig,
    pub shell: ShellConfig,
}

/// Global user configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct GlobalConfig {
    /// Default output format (text or json)
    pub default_format: OutputFormat,

    /// Overrides the data directory used outside any workspace
    pub data_dir: Option<PathBuf>,
}

/// Output format for commands
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default, PartialEq, Eq, clap::ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
}

/// Combined configuration (global + workspace)
#[derive(Debug, Clone, Default)]
pub struct Config {
    pub workspace: WorkspaceConfig,
    pub global: GlobalConfig,
}

impl Config {
    /// Loads configuration for a workspace directory
    pub fn for_workspace(workspace_dir: &Path) -> Result<Self> {
        let global = Self::load_global()?;
        let workspace = Self::load_workspace_config(workspace_dir)?;

        Ok(Self { workspace, global })
    }

    fn project_dirs() -> Option<ProjectDirs> {
        ProjectDirs::from("dev", "tasktimer", "tasktimer")
    }

    /// Returns the global config directory
    pub fn global_config_dir() -> Option<PathBuf> {
        Self::project_dirs().map(|dirs| dirs.config_dir().to_path_buf())
    }

    /// Returns the data directory used when no workspace is found
    pub fn global_data_dir(&self) -> Result<PathBuf> {
        if let Some(ref dir) = self.global.data_dir {
            return Ok(dir.clone());
        }

        Self::project_dirs()
            .map(|dirs| dirs.data_dir().to_path_buf())
            .ok_or_else(|| ConfigError::NoDataDir.into())
    }

    /// Loads global configuration
    pub fn load_global() -> Result<GlobalConfig> {
        let config_dir = match Self::global_config_dir() {
            Some(dir) => dir,
            None => return Ok(GlobalConfig::default()),
        };

        let config_path = config_dir.join("config.toml");
        if !config_path.exists() {
            return Ok(GlobalConfig::default());
        }

        let content = fs::read_to_string(&config_path)
            .with_context(|| format!("Failed to read global config: {}", config_path.display()))?;

        toml::from_str(&content)
            .map_err(|e| ConfigError::Parse(e.to_string()))
            .context("Failed to parse global config")
    }

    /// Loads workspace configuration from a workspace directory
    fn load_workspace_config(workspace_dir: &Path) -> Result<WorkspaceConfig> {
        let config_path = workspace_dir.join("config.toml");

        if !config_path.exists() {
            return Ok(WorkspaceConfig::default());
        }

        let content = fs::read_to_string(&config_path).with_context(|| {
            format!("Failed to read workspace config: {}", config_path.display())
        })?;

        toml::from_str(&content)
            .map_err(|e| ConfigError::Parse(e.to_string()))
            .context("Failed to parse workspace config")
    }

    /// Finds the nearest `.tasktimer/` directory walking up from `start`
    pub fn find_workspace_dir(start: &Path) -> Option<PathBuf> {
        let mut current = start.to_path_buf();

        loop {
            let candidate = current.join(WORKSPACE_DIR);
            if candidate.is_dir() {
                return Some(candidate);
            }

            if !current.pop() {
                return None;
            }
        }
    }
}
