//! Edit command: change an entry's committed hours or note.

use std::io::Write;

use anyhow::{Result, bail};
use bt_core::{EntryPatch, format_for_display};
use clap::Args;

use super::util::{open_engine, parse_entry_id, parse_hours};
use crate::Config;

#[derive(Debug, Args)]
pub struct EditArgs {
    /// Entry to edit.
    pub entry_id: String,

    /// New duration; rounded up to 15 minutes.
    #[arg(long)]
    pub hours: Option<String>,

    /// New note.
    #[arg(long)]
    pub note: Option<String>,
}

pub async fn run<W: Write>(writer: &mut W, args: &EditArgs, config: &Config) -> Result<()> {
    let entry_id = parse_entry_id(&args.entry_id)?;
    let patch = EntryPatch {
        hours: args.hours.as_deref().map(parse_hours).transpose()?,
        note: args.note.as_ref().map(|note| note.trim().to_string()),
        ..EntryPatch::default()
    };
    if patch.is_empty() {
        bail!("nothing to edit: pass --hours or --note");
    }

    let engine = open_engine(config)?;
    engine.update(&entry_id, patch.clone()).await?;

    match patch.hours {
        Some(hours) => writeln!(writer, "Updated {entry_id}: {}", format_for_display(hours))?,
        None => writeln!(writer, "Updated {entry_id}")?,
    }
    Ok(())
}
