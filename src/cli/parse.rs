//! CLI parse: clap types for geest. No behavior; definitions only.

use crate::queue::{Phase, RunMode};
use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// geest - tiled, weighted 0-5 scoring of a study area
#[derive(Parser, Debug)]
#[command(name = "geest")]
#[command(about = "Tiled, weighted multi-criteria scoring of a study area")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Workspace root directory
    #[arg(long, default_value = ".")]
    pub workspace: PathBuf,

    /// Configuration file path (overrides layered config loading)
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Debug logging, and every node attribute logged before its workflow runs
    #[arg(long, default_value = "false")]
    pub verbose: bool,

    /// Log level (trace, debug, info, warn, error, off)
    #[arg(long)]
    pub log_level: Option<String>,

    /// Log format (json, text)
    #[arg(long)]
    pub log_format: Option<String>,

    /// Log output (stdout, stderr, file)
    #[arg(long)]
    pub log_output: Option<String>,

    /// Log file path (when output is "file")
    #[arg(long)]
    pub log_file: Option<PathBuf>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run workflows phase by phase and save the model
    Run {
        /// all: clear results and rerun; incomplete: only nodes without a result
        #[arg(long, value_enum, default_value_t = RunMode::All)]
        mode: RunMode,
        /// Restrict to these phases (repeatable)
        #[arg(long = "phase", value_enum)]
        phases: Vec<Phase>,
        /// Model document (default: <working>/model.json)
        #[arg(long)]
        model: Option<PathBuf>,
        /// Run inline on this thread, one workflow at a time
        #[arg(long)]
        foreground: bool,
    },
    /// Show every node's status
    Status {
        /// Output format (text or json)
        #[arg(long, default_value = "text")]
        format: String,
        #[arg(long)]
        model: Option<PathBuf>,
    },
    /// Report weight sums that are off and nodes no workflow can run
    Validate {
        #[arg(long)]
        model: Option<PathBuf>,
    },
    /// List the study-area tiles
    Tiles,
    /// Build the study-area store from a feature file of polygons
    Prepare {
        /// FeatureSet JSON; each polygon feature becomes one part
        #[arg(long)]
        areas: PathBuf,
        /// Override the configured cell size
        #[arg(long)]
        cell_size: Option<f64>,
        /// Replace an existing store
        #[arg(long)]
        force: bool,
    },
}

impl Commands {
    pub fn name(&self) -> &'static str {
        match self {
            Commands::Run { .. } => "run",
            Commands::Status { .. } => "status",
            Commands::Validate { .. } => "validate",
            Commands::Tiles => "tiles",
            Commands::Prepare { .. } => "prepare",
        }
    }
}
