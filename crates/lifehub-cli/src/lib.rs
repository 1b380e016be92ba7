//! CLI, command implementations, output rendering
//!
//! This crate provides the `lifehub` command-line interface.

pub mod cli;
pub mod commands;
pub mod error;
pub mod output;
pub mod pending;

pub use cli::Cli;
pub use error::{CliError, CliResult};
