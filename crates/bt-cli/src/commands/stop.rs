//! Stop command: commit a running timer onto the billing grid.

use std::io::Write;

use anyhow::Result;
use bt_core::format_for_display;
use clap::Args;

use super::util::{open_engine, parse_entry_id};
use crate::Config;

#[derive(Debug, Args)]
pub struct StopArgs {
    /// Entry to stop. Stops whatever is running when omitted.
    pub entry_id: Option<String>,
}

pub async fn run<W: Write>(writer: &mut W, args: &StopArgs, config: &Config) -> Result<()> {
    let engine = open_engine(config)?;

    let stopped = match args.entry_id.as_deref() {
        Some(raw) => {
            let entry_id = parse_entry_id(raw)?;
            let hours = engine.stop(&entry_id).await?;
            if hours.is_none() {
                writeln!(writer, "{entry_id} is not running")?;
            }
            hours.map(|hours| (entry_id, hours))
        }
        None => {
            let stopped = engine.stop_running().await?;
            if stopped.is_none() {
                writeln!(writer, "No timer running")?;
            }
            stopped
        }
    };

    if let Some((entry_id, hours)) = stopped {
        writeln!(
            writer,
            "Stopped {entry_id} at {} ({hours} h)",
            format_for_display(hours)
        )?;
    }
    Ok(())
}
