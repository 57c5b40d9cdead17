//! Command-line argument definitions.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use crate::commands::{
    chart::ChartArgs, import::ImportArgs, record::RecordArgs, scan::ScanArgs,
    summary::SummaryArgs,
};

/// Gas cylinder level tracker.
///
/// Converts scale readings into fuel levels, keeps a measurement history per
/// cylinder and reports consumption over time.
#[derive(Debug, Parser)]
#[command(name = "gauge", version, about, long_about = None)]
pub struct Cli {
    /// Enable verbose output.
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Path to config file.
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

/// Available subcommands.
#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Manage cylinders.
    #[command(subcommand)]
    Cylinder(CylinderAction),

    /// Record a live weight reading for the active cylinder.
    Record(RecordArgs),

    /// Import offline weight samples (JSONL on stdin) for a cylinder.
    Import(ImportArgs),

    /// Replay weight samples (JSONL on stdin) through a sensor session.
    Replay,

    /// Summarize fuel consumption.
    Summary(SummaryArgs),

    /// Show daily fuel consumption.
    Chart(ChartArgs),

    /// Filter sensor advertisements (JSONL on stdin).
    Scan(ScanArgs),

    /// Show the active cylinder and latest reading.
    Status,
}

/// Cylinder management actions.
#[derive(Debug, Subcommand)]
pub enum CylinderAction {
    /// Add a cylinder.
    Add {
        /// Display name.
        name: String,

        /// Empty cylinder weight in kilograms.
        #[arg(long, allow_negative_numbers = true)]
        tare: f64,

        /// Fuel capacity in kilograms.
        #[arg(long, allow_negative_numbers = true)]
        capacity: f64,

        /// Make it the active cylinder.
        #[arg(long)]
        activate: bool,
    },

    /// List cylinders.
    List {
        /// Output as JSON.
        #[arg(long)]
        json: bool,
    },

    /// Make a cylinder the active one.
    Activate {
        /// Cylinder ID.
        id: i64,
    },

    /// Change a cylinder's name, tare or capacity.
    Update {
        /// Cylinder ID.
        id: i64,

        #[arg(long)]
        name: Option<String>,

        #[arg(long, allow_negative_numbers = true)]
        tare: Option<f64>,

        #[arg(long, allow_negative_numbers = true)]
        capacity: Option<f64>,
    },

    /// Delete every inactive cylinder and its history.
    Prune,
}
