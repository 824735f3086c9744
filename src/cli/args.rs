//! CLI argument parsing with clap.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Cinematic before/after timelapse generation with Veo
#[derive(Parser, Debug)]
#[command(name = "temporal-architect")]
#[command(version, about = "Cinematic AI-driven timelapse from Before to After", long_about = None)]
pub struct Args {
    #[command(subcommand)]
    pub command: Command,

    /// Config file path
    #[arg(long, short, global = true)]
    pub config: Option<PathBuf>,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Generate a timelapse video from a before and an after image
    Generate {
        /// Initial state of the room (first frame)
        #[arg(long, short)]
        before: PathBuf,

        /// Final completed project (last frame)
        #[arg(long, short)]
        after: PathBuf,

        /// Describe the transformation
        #[arg(long, short, default_value = "")]
        prompt: String,

        /// Where to save the video (file or directory)
        #[arg(long, short)]
        output: Option<PathBuf>,
    },
    /// Configuration management
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand, Debug, Clone)]
pub enum ConfigAction {
    /// Show current configuration
    Show,
    /// Create default config file
    Init,
}
