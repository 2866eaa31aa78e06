//! CLI module for the `gpu-cloud` tool.
//!
//! This module provides the command-line interface for searching offers and
//! managing instances across providers.

mod commands;
mod output;

pub use commands::{Cli, Commands, CreateArgs, OutputFormat, SearchArgs};
pub use output::OutputFormatter;
