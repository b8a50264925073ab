//! New command: create an entry with a running timer.

use std::io::Write;

use anyhow::Result;
use clap::Args;
use rust_decimal::Decimal;

use super::util::{EntryArgs, open_engine};
use crate::Config;

#[derive(Debug, Args)]
pub struct NewArgs {
    #[command(flatten)]
    pub entry: EntryArgs,
}

pub async fn run<W: Write>(writer: &mut W, args: &NewArgs, config: &Config) -> Result<()> {
    let engine = open_engine(config)?;
    let draft = args.entry.draft(engine.user_id().clone(), Decimal::ZERO)?;

    let previous = engine.refresh().await?;
    let entry_id = engine.create_and_start(draft).await?;
    if let Some(stopped) = previous.entry_id() {
        writeln!(writer, "Stopped {stopped}")?;
    }
    writeln!(
        writer,
        "Started {entry_id} on {}/{}",
        args.entry.project.trim(),
        args.entry.task.trim()
    )?;
    Ok(())
}
