//! Command-line interface.
//!
//! # Modules
//!
//! - [`args`] - argument definitions (clap derive)
//! - [`commands`] - subcommand implementations and dispatch

pub mod args;
pub mod commands;

pub use args::{CheckArgs, Cli, Commands, CompletionsArgs, StatusArgs};
pub use commands::dispatch;
