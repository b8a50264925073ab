//! Status command for showing the running timer and logged entries.

use std::io::Write;

use anyhow::Result;
use bt_core::{EntryRepository, TimerState, format_for_display, live_hours};
use rust_decimal::Decimal;

use super::util::{describe, open_engine};
use crate::Config;

pub async fn run<W: Write>(writer: &mut W, config: &Config) -> Result<()> {
    let engine = open_engine(config)?;
    let state = engine.refresh().await?;
    let entries = engine.repository().entries(engine.user_id()).await?;
    let now = engine.now();

    writeln!(writer, "Billable time status")?;
    writeln!(writer, "Database: {}", config.database_path.display())?;
    writeln!(writer, "User: {}", engine.user_id())?;

    match &state {
        TimerState::Idle => writeln!(writer, "No timer running.")?,
        TimerState::Running { entry_id, .. } => {
            let hours = entries
                .iter()
                .find(|entry| &entry.id == entry_id)
                .map(|entry| live_hours(entry, now))
                .unwrap_or_default();
            writeln!(writer, "Running: {entry_id} ({})", format_for_display(hours))?;
        }
    }

    if entries.is_empty() {
        writeln!(writer, "No entries recorded.")?;
        return Ok(());
    }

    writeln!(writer, "Entries:")?;
    let mut total = Decimal::ZERO;
    for entry in &entries {
        let hours = live_hours(entry, now);
        total += hours;
        writeln!(writer, "{}", describe(entry, hours))?;
    }
    writeln!(writer, "Total: {}", format_for_display(total))?;
    Ok(())
}
