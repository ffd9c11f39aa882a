//! Workspace management
//!
//! A workspace is the directory holding the task database, its
//! configuration and the export template. It is resolved in this order:
//!
//! 1. an explicit directory (`--dir` / `TASKTIMER_DIR`),
//! 2. the nearest `.tasktimer/` above the current directory,
//! 3. the per-user data directory.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

use super::config::{Config, WORKSPACE_DIR};
use super::Store;

/// File name of the task database inside a workspace
pub const DATABASE_FILE: &str = "tasks.db";

/// Template written by `tasktimer init`
pub const DEFAULT_TEMPLATE: &str = include_str!("../../templates/template_report.html");

const DEFAULT_CONFIG: &str = r#"# tasktimer configuration

[export]
# Template for `export`, relative to this directory
template = "template_report.html"
# Where exports without an explicit path are written
output_dir = "."

[shell]
# Event poll interval of the interactive shell (ms)
tick_ms = 250
# Commands kept in the shell history
history_limit = 200
"#;

const GITIGNORE: &str = r#"# Local task database
tasks.db
tasks.db-wal
tasks.db-shm
"#;

/// A tasktimer workspace
#[derive(Debug)]
pub struct Workspace {
    dir: PathBuf,
    config: Config,
}

impl Workspace {
    /// Opens a workspace rooted at `dir`, creating the directory if needed
    pub fn open(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();

        fs::create_dir_all(&dir)
            .with_context(|| format!("Failed to create data directory: {}", dir.display()))?;

        let config = Config::for_workspace(&dir)?;

        Ok(Self { dir, config })
    }

    /// Resolves the workspace for this invocation
    pub fn resolve(explicit: Option<&Path>) -> Result<Self> {
        if let Some(dir) = explicit {
            return Self::open(dir);
        }

        let cwd = std::env::current_dir().context("Failed to read current directory")?;
        if let Some(dir) = Config::find_workspace_dir(&cwd) {
            return Self::open(dir);
        }

        let global = Config {
            global: Config::load_global()?,
            ..Default::default()
        };
        Self::open(global.global_data_dir()?)
    }

    /// Initializes a new workspace under `root/.tasktimer`
    ///
    /// Existing files are left untouched, so running it twice is harmless.
    pub fn init(root: impl AsRef<Path>) -> Result<Self> {
        let dir = root.as_ref().join(WORKSPACE_DIR);

        fs::create_dir_all(&dir)
            .with_context(|| format!("Failed to create workspace: {}", dir.display()))?;

        write_if_missing(&dir.join("config.toml"), DEFAULT_CONFIG)?;
        write_if_missing(&dir.join("template_report.html"), DEFAULT_TEMPLATE)?;
        write_if_missing(&dir.join(".gitignore"), GITIGNORE)?;

        let workspace = Self::open(dir)?;
        workspace.store()?;

        Ok(workspace)
    }

    /// Returns the workspace directory
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Returns the configuration
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Returns the database path
    pub fn database_path(&self) -> PathBuf {
        self.dir.join(DATABASE_FILE)
    }

    /// Opens the task store, creating the schema if needed
    pub fn store(&self) -> Result<Store> {
        let path = self.database_path();
        Store::open(&path)
            .with_context(|| format!("Failed to open task database: {}", path.display()))
    }

    /// Resolves the export template path
    pub fn template_path(&self) -> PathBuf {
        self.resolve_path(&self.config.workspace.export.template)
    }

    /// Resolves the default export directory
    ///
    /// Relative paths are taken from the current directory, like an
    /// explicit export destination would be.
    pub fn export_dir(&self) -> PathBuf {
        self.config.workspace.export.output_dir.clone()
    }

    fn resolve_path(&self, path: &Path) -> PathBuf {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.dir.join(path)
        }
    }
}

fn write_if_missing(path: &Path, content: &str) -> Result<()> {
    if path.exists() {
        return Ok(());
    }

    fs::write(path, content).with_context(|| format!("Failed to write {}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn init_creates_structure() {
        let dir = TempDir::new().unwrap();
        let workspace = Workspace::init(dir.path()).unwrap();

        assert!(workspace.dir().is_dir());
        assert!(workspace.dir().join("config.toml").is_file());
        assert!(workspace.dir().join("template_report.html").is_file());
        assert!(workspace.dir().join(".gitignore").is_file());
        assert!(workspace.database_path().is_file());
    }

    #[test]
    fn init_is_idempotent() {
        let dir = TempDir::new().unwrap();

        Workspace::init(dir.path()).unwrap();
        fs::write(dir.path().join(WORKSPACE_DIR).join("template_report.html"), "custom").unwrap();
        Workspace::init(dir.path()).unwrap();

        let template =
            fs::read_to_string(dir.path().join(WORKSPACE_DIR).join("template_report.html"))
                .unwrap();
        assert_eq!(template, "custom");
    }

    #[test]
    fn default_config_parses() {
        let dir = TempDir::new().unwrap();
        let workspace = Workspace::init(dir.path()).unwrap();

        assert_eq!(workspace.config().workspace.shell.history_limit, 200);
        assert_eq!(
            workspace.template_path(),
            workspace.dir().join("template_report.html")
        );
    }

    #[test]
    fn explicit_dir_is_used() {
        let dir = TempDir::new().unwrap();
        let target = dir.path().join("data");

        let workspace = Workspace::resolve(Some(&target)).unwrap();
        assert_eq!(workspace.dir(), target.as_path());
        assert!(target.is_dir());
    }

    #[test]
    fn absolute_template_path_kept() {
        let dir = TempDir::new().unwrap();
        let template = dir.path().join("elsewhere.html");
        fs::create_dir_all(dir.path().join("ws")).unwrap();
        fs::write(
            dir.path().join("ws").join("config.toml"),
            format!("[export]\ntemplate = {:?}\n", template.display().to_string()),
        )
        .unwrap();

        let workspace = Workspace::open(dir.path().join("ws")).unwrap();
        assert_eq!(workspace.template_path(), template);
    }
}
