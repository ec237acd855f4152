//! Subcommand implementations and dispatch.

pub mod check;
pub mod completions;
pub mod status;

use crate::cli::args::{CheckArgs, Cli, Commands};
use crate::error::Result;

/// Dispatch the parsed CLI to its command, returning the exit code.
///
/// With no subcommand, `check` runs — the tool's whole purpose.
pub fn dispatch(cli: &Cli) -> Result<i32> {
    match &cli.command {
        Some(Commands::Check(args)) => check::run(args, cli),
        Some(Commands::Status(args)) => status::run(args, cli),
        Some(Commands::Completions(args)) => completions::run(args),
        None => check::run(&CheckArgs::default(), cli),
    }
}
