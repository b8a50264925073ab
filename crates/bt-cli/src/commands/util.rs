//! Shared utilities for CLI commands.

use anyhow::{Context, Result, bail};
use bt_core::{
    EntryId, NewEntry, PriceItemId, ProjectId, TaskId, TimeEntry, TimerEngine, UserId,
    format_for_display, parse_and_quantize,
};
use bt_db::Database;
use chrono::{Local, NaiveDate};
use clap::Args;
use rust_decimal::Decimal;

use crate::Config;

/// Fields shared by commands that create an entry.
#[derive(Debug, Clone, Args)]
pub struct EntryArgs {
    /// Project to book against.
    #[arg(long)]
    pub project: String,

    /// Task within the project.
    #[arg(long)]
    pub task: String,

    /// Price item that sets the hourly rate.
    #[arg(long)]
    pub price_item: String,

    /// Free-form note.
    #[arg(long, default_value = "")]
    pub note: String,

    /// Billing date as YYYY-MM-DD (defaults to today).
    #[arg(long)]
    pub date: Option<String>,
}

impl EntryArgs {
    /// Builds a manual draft with `hours` for `user_id`.
    pub fn draft(&self, user_id: UserId, hours: Decimal) -> Result<NewEntry> {
        let date = parse_date(self.date.as_deref())?;
        Ok(NewEntry::manual(
            user_id,
            ProjectId::new(self.project.as_str())?,
            TaskId::new(self.task.as_str())?,
            PriceItemId::new(self.price_item.as_str())?,
            date,
            hours,
        )
        .with_note(self.note.trim()))
    }
}

/// Opens the configured database, ensuring the parent directory exists.
pub fn open_database(config: &Config) -> Result<Database> {
    if let Some(parent) = config.database_path.parent() {
        std::fs::create_dir_all(parent).context("failed to create database directory")?;
    }
    Database::open(&config.database_path)
        .with_context(|| format!("failed to open {}", config.database_path.display()))
}

/// Opens the database and wraps it in a timer engine for the configured user.
pub fn open_engine(config: &Config) -> Result<TimerEngine<Database>> {
    let user_id = config.user_id().context("invalid user in configuration")?;
    let db = open_database(config)?;
    Ok(TimerEngine::with_system_clock(user_id, db))
}

pub fn parse_entry_id(raw: &str) -> Result<EntryId> {
    EntryId::new(raw).context("invalid entry id")
}

/// Parses user duration text onto the billing grid.
///
/// Text that parses to nothing (e.g. `abc` or `-2`) is rejected; an explicit
/// zero such as `0` or `0:00` is allowed.
pub fn parse_hours(text: &str) -> Result<Decimal> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        bail!("hours cannot be empty");
    }
    let hours = parse_and_quantize(trimmed);
    let explicit_zero = trimmed
        .chars()
        .all(|c| matches!(c, '0' | ':' | '.' | ','));
    if hours.is_zero() && !explicit_zero {
        bail!("invalid duration: {trimmed}");
    }
    Ok(hours)
}

/// Parses a billing date, defaulting to today in local time.
pub fn parse_date(raw: Option<&str>) -> Result<NaiveDate> {
    raw.map_or_else(
        || Ok(Local::now().date_naive()),
        |raw| {
            NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d")
                .with_context(|| format!("invalid date: {raw} (expected YYYY-MM-DD)"))
        },
    )
}

/// One-line summary of an entry.
pub fn describe(entry: &TimeEntry, hours: Decimal) -> String {
    let marker = if entry.is_active { "*" } else { " " };
    let mut line = format!(
        "{marker} {} {} {}/{} [{}] {}",
        entry.date,
        entry.id,
        entry.project_id,
        entry.task_id,
        entry.price_item_id,
        format_for_display(hours),
    );
    if !entry.note.is_empty() {
        line.push_str(" - ");
        line.push_str(&entry.note);
    }
    line
}
