//! Start command: resume the timer on an existing entry.

use std::io::Write;

use anyhow::{Result, bail};
use bt_core::EntryRepository;
use clap::Args;

use super::util::{open_engine, parse_entry_id};
use crate::Config;

#[derive(Debug, Args)]
pub struct StartArgs {
    /// Entry to start timing.
    pub entry_id: String,
}

pub async fn run<W: Write>(writer: &mut W, args: &StartArgs, config: &Config) -> Result<()> {
    let entry_id = parse_entry_id(&args.entry_id)?;
    let engine = open_engine(config)?;

    let entries = engine.repository().entries(engine.user_id()).await?;
    if !entries.iter().any(|entry| entry.id == entry_id) {
        bail!("entry not found: {entry_id}");
    }

    let previous = engine.refresh().await?;
    let state = engine.start(&entry_id).await?;
    if let Some(stopped) = previous.entry_id().filter(|&stopped| stopped != &entry_id) {
        writeln!(writer, "Stopped {stopped}")?;
    }
    if state.entry_id() == Some(&entry_id) {
        writeln!(writer, "Started {entry_id}")?;
    }
    Ok(())
}
