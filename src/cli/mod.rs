//! # Command-Line Interface
//!
//! User-facing commands, the interactive shell and output formatting.
//!
//! ## Commands
//!
//! | Command | Purpose |
//! |---------|---------|
//! | `init [path]` | Create a `.tasktimer/` workspace |
//! | `add <name> [minutes]` | Create a task, optionally with a minimum per session |
//! | `start`, `stop`, `toggle <name>` | Drive a task's timer |
//! | `delete <name> [--yes]` | Remove a task and its sessions after confirmation |
//! | `list` | Show all tasks |
//! | `report [filters]` | Sessions grouped by task with totals |
//! | `export [path] [filters]` | Render the report through the HTML template |
//! | `shell` (`gui`) | Interactive shell; also the default without a command |
//!
//! Filters are `start=<ts>`, `end=<ts>` and `task=<name>`.
//!
//! ## Output Formats
//!
//! All commands support `--format`:
//! - `text` (default) - Human-readable output
//! - `json` - Machine-parseable JSON
//!
//! ## Verbose Mode
//!
//! Use `--verbose` (or `-v`) for debug output on stderr:
//! ```bash
//! tasktimer --verbose report task=writing
//! ```
//!
//! ## Entry Point
//!
//! Call [`run()`] to parse arguments and execute the appropriate command.

mod app;
mod dispatch;
mod output;
mod shell;

pub use app::{run, Cli, Commands};
pub use dispatch::{Command, CommandError, Dispatcher, Reply};
pub use output::{Output, OutputFormat, Sink};
