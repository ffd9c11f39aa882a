//! Interactive shell
//!
//! A terminal window with an output pane, a command line and a task panel.
//! Commands typed here go through the same dispatcher as the CLI.

mod app;
mod event;
mod ui;
mod view;

use std::panic::{self, AssertUnwindSafe};

use anyhow::{anyhow, Result};

use super::dispatch::Dispatcher;
use super::Output;
use crate::storage::Workspace;
use app::App;
use event::EventHandler;

/// Launch the shell
pub fn run(output: &Output, workspace: &Workspace) -> Result<()> {
    output.verbose_ctx("shell", "Opening task store");
    let dispatcher = Dispatcher::open(workspace)?;
    let settings = &workspace.config().workspace.shell;
    let mut app = App::new(dispatcher, settings.history_limit);

    output.verbose_ctx("shell", "Initializing terminal");
    let mut terminal = ui::init_terminal()?;
    let events = EventHandler::new(settings.tick_ms);

    // The terminal must be restored even if drawing panics
    let result = panic::catch_unwind(AssertUnwindSafe(|| app.run(&mut terminal, events)));
    let restore_result = ui::restore_terminal();

    match result {
        Ok(inner_result) => {
            restore_result?;
            inner_result
        }
        Err(panic_payload) => {
            let _ = restore_result;
            if let Some(s) = panic_payload.downcast_ref::<&str>() {
                Err(anyhow!("Shell panicked: {}", s))
            } else if let Some(s) = panic_payload.downcast_ref::<String>() {
                Err(anyhow!("Shell panicked: {}", s))
            } else {
                Err(anyhow!("Shell panicked with unknown error"))
            }
        }
    }
}
