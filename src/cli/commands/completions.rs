//! The `completions` command: generate shell completion scripts.

use clap::CommandFactory;
use clap_complete::generate;

use crate::cli::args::{Cli, CompletionsArgs};
use crate::error::Result;

pub fn run(args: &CompletionsArgs) -> Result<i32> {
    let mut command = Cli::command();
    generate(args.shell, &mut command, "sherpa", &mut std::io::stdout());
    Ok(0)
}
