//! Main entry point for the `agate` CLI.

use agent_gate::cli;
use console::style;
use std::process::ExitCode;

fn main() -> ExitCode {
    match cli::run() {
        Ok(code) => code,
        Err(e) => {
            eprintln!("{} {e}", style("Error:").red().bold());
            ExitCode::from(u8::try_from(e.exit_code()).unwrap_or(1))
        },
    }
}
