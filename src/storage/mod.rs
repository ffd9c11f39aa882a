//! # Storage Layer
//!
//! Persistence for tasktimer.
//!
//! ## Storage Formats
//!
//! | Data | Format | Location |
//! |------|--------|----------|
//! | Tasks + sessions | SQLite | `.tasktimer/tasks.db` |
//! | Config | TOML | `.tasktimer/config.toml` |
//! | Export template | HTML | `.tasktimer/template_report.html` |
//!
//! ## Concurrency Safety
//!
//! - Every mutation runs in one `BEGIN IMMEDIATE` transaction
//! - The connection waits up to 5s for a competing writer (busy timeout)
//! - WAL journal mode keeps readers unblocked while the shell writes
//!
//! ## Key Types
//!
//! - [`Workspace`] - Entry point: resolves the data directory
//! - [`Store`] - Reads tasks and sessions, hands out [`Writer`]s
//! - [`Config`] - Workspace and global configuration

mod config;
mod store;
mod workspace;

pub use config::{
    Config, ConfigError, ExportConfig, GlobalConfig, OutputFormat, ShellConfig, WorkspaceConfig,
    WORKSPACE_DIR,
};
pub use store::{Store, StoreError, Writer};
pub use workspace::{Workspace, DATABASE_FILE, DEFAULT_TEMPLATE};
