//! tasktimer - time tracking for named tasks

use std::process::ExitCode;

fn main() -> ExitCode {
    if let Err(e) = tasktimer::cli::run() {
        eprintln!("Error: {:#}", e);
        ExitCode::FAILURE
    } else {
        ExitCode::SUCCESS
    }
}
