//! CLI Adapter
//!
//! Command-line interface for coinrelay.
//! Uses clap derive macros for argument parsing.

mod commands;

pub use commands::{CliApp, Command, ConvertCmd, PriceCmd, RunCmd, StatusCmd};
