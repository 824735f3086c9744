//! Command-line interface definitions and helpers.
//!
//! This module contains the CLI argument parsing and subcommand handlers.

mod args;
mod commands;

pub use args::{Args, Command, ConfigAction};
pub use commands::{handle_config_action, load_config, run_generate};
