//! Command-line argument definitions.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use crate::commands::{edit, log, new, rm, start, stop, usage};

/// Billable time tracker.
///
/// Runs one stopwatch at a time, logs manual hours on a 15-minute grid, and
/// values work against project budgets.
#[derive(Debug, Parser)]
#[command(name = "bt", version, about, long_about = None)]
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
    /// Start the timer on an existing entry, stopping any other timer.
    Start(start::StartArgs),

    /// Create a new entry and start its timer.
    New(new::NewArgs),

    /// Stop a timer and commit its hours.
    Stop(stop::StopArgs),

    /// Log hours manually (e.g. `1:30`, `1.5`, `1,5`).
    Log(log::LogArgs),

    /// Edit an entry's hours or note.
    Edit(edit::EditArgs),

    /// Remove an entry.
    Rm(rm::RmArgs),

    /// Show the running timer and all entries.
    Status,

    /// Keep the running timer's elapsed time synced until it stops.
    Watch,

    /// Show budget usage for a project.
    Usage(usage::UsageArgs),

    /// Manage projects and rate tables.
    #[command(subcommand)]
    Catalog(CatalogAction),
}

/// Catalog maintenance.
#[derive(Debug, Subcommand)]
pub enum CatalogAction {
    /// Import projects and price items as JSON from stdin.
    Import,
}
