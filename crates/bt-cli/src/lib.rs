//! Billable time CLI library.
//!
//! This crate provides the CLI interface for the timer and budget engine.

mod cli;
pub mod commands;
mod config;

pub use cli::{CatalogAction, Cli, Commands};
pub use config::Config;
