//! Main CLI application structure

use std::io::{self, BufRead, Write};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};

use super::dispatch::{delete_prompt, Command, Dispatcher, Reply};
use super::output::{Output, OutputFormat, Sink};
use super::shell;
use crate::storage::{Config, Workspace};

#[derive(Parser)]
#[command(name = "tasktimer")]
#[command(author, version, about = "Track the time you spend on named tasks")]
#[command(propagate_version = true)]
pub struct Cli {
    /// Output format (defaults to `default_format` from the global config)
    #[arg(long, short = 'f', global = true)]
    pub format: Option<OutputFormat>,

    /// Enable verbose output for debugging
    #[arg(long, short = 'v', global = true)]
    pub verbose: bool,

    /// Data directory to use instead of the discovered workspace
    #[arg(long, global = true, env = "TASKTIMER_DIR")]
    pub dir: Option<PathBuf>,

    /// Command to run; without one the interactive shell starts
    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Initialize a tasktimer workspace
    Init {
        /// Path to initialize (defaults to current directory)
        #[arg(default_value = ".")]
        path: PathBuf,
    },

    /// Create a task
    Add {
        /// Task name
        name: String,

        /// Minimum minutes credited per session (1-60, anything else records to the second)
        #[arg(allow_negative_numbers = true)]
        minutes: Option<String>,
    },

    /// Start the timer of a task
    Start {
        #[arg(required = true)]
        name: Vec<String>,
    },

    /// Stop a running task and record the session
    Stop {
        #[arg(required = true)]
        name: Vec<String>,
    },

    /// Start an idle task or stop a running one
    Toggle {
        #[arg(required = true)]
        name: Vec<String>,
    },

    /// Delete a task and all of its sessions
    Delete {
        #[arg(required = true)]
        name: Vec<String>,

        /// Do not ask for confirmation
        #[arg(long, short = 'y')]
        yes: bool,
    },

    /// List all tasks
    List,

    /// Show recorded sessions grouped by task
    Report {
        /// Filters: start=<date|timestamp> end=<date|timestamp> task=<name>
        filters: Vec<String>,
    },

    /// Export the report as HTML
    Export {
        /// Optional destination followed by filters (see `report`)
        args: Vec<String>,
    },

    /// Start the interactive shell
    #[command(visible_alias = "gui")]
    Shell,
}

/// Main entry point for the CLI
pub fn run() -> Result<()> {
    let cli = Cli::parse();
    let global = Config::load_global()?;
    let output = Output::new(cli.format.unwrap_or(global.default_format), cli.verbose);

    output.verbose("tasktimer starting");

    let command = match cli.command.unwrap_or(Commands::Shell) {
        Commands::Init { path } => return init(&output, &path),
        Commands::Shell => {
            let workspace = open_workspace(&output, cli.dir.as_deref())?;
            return shell::run(&output, &workspace);
        }
        Commands::Delete { name, yes } => {
            let workspace = open_workspace(&output, cli.dir.as_deref())?;
            return delete(&output, &workspace, &name.join(" "), yes);
        }
        Commands::Add { name, minutes } => Command::Add { name, minutes },
        Commands::Start { name } => Command::Start(name.join(" ")),
        Commands::Stop { name } => Command::Stop(name.join(" ")),
        Commands::Toggle { name } => Command::Toggle(name.join(" ")),
        Commands::List => Command::List,
        Commands::Report { filters } => Command::report(&filters)?,
        Commands::Export { args } => Command::export(&args)?,
    };

    let workspace = open_workspace(&output, cli.dir.as_deref())?;
    execute(&output, &workspace, command)
}

fn init(output: &Output, path: &Path) -> Result<()> {
    output.verbose_ctx("init", &format!("Initializing workspace at: {}", path.display()));
    let workspace = Workspace::init(path)?;
    output.verbose_ctx("init", &format!("Database: {}", workspace.database_path().display()));
    output.success(&format!(
        "Initialized tasktimer workspace at {}",
        workspace.dir().display()
    ));
    Ok(())
}

fn open_workspace(output: &Output, explicit: Option<&Path>) -> Result<Workspace> {
    let workspace = Workspace::resolve(explicit)?;
    output.verbose_ctx(
        "workspace",
        &format!("Using data directory: {}", workspace.dir().display()),
    );
    Ok(workspace)
}

fn execute(output: &Output, workspace: &Workspace, command: Command) -> Result<()> {
    for arg in command.unknown_args() {
        output.warn(&format!("Unknown argument: {}", arg));
    }

    output.verbose_ctx("command", &format!("{:?}", command));
    let mut dispatcher = Dispatcher::open(workspace)?;
    let reply = dispatcher.execute(command)?;
    print_reply(output, &reply);
    Ok(())
}

fn delete(output: &Output, workspace: &Workspace, name: &str, yes: bool) -> Result<()> {
    let mut dispatcher = Dispatcher::open(workspace)?;
    let token = dispatcher.tracker().request_delete(name)?;
    output.verbose_ctx(
        "delete",
        &format!("'{}' has {} sessions", token.name(), token.sessions()),
    );

    let approved = yes || confirm(&delete_prompt(&token))?;
    let reply = dispatcher.confirm_delete(token, approved)?;
    print_reply(output, &reply);
    Ok(())
}

/// Asks on stderr and reads the answer from stdin; end of input declines
fn confirm(prompt: &str) -> Result<bool> {
    let stdin = io::stdin();
    let mut lines = stdin.lock().lines();

    loop {
        eprint!("{} ", prompt);
        io::stderr().flush().context("Failed to write prompt")?;

        let Some(answer) = lines.next() else {
            return Ok(false);
        };
        match answer.context("Failed to read answer")?.trim().to_lowercase().as_str() {
            "y" | "yes" => return Ok(true),
            "n" | "no" => return Ok(false),
            _ => eprintln!("Please answer 'y' (yes) or 'n' (no)."),
        }
    }
}

fn print_reply(output: &Output, reply: &Reply) {
    output.data(reply);

    let mut sink = output;
    for line in reply.lines() {
        sink.line(&line);
    }
}
