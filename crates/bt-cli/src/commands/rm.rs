//! Remove command.

use std::io::Write;

use anyhow::Result;
use clap::Args;

use super::util::{open_engine, parse_entry_id};
use crate::Config;

#[derive(Debug, Args)]
pub struct RmArgs {
    /// Entry to remove.
    pub entry_id: String,
}

pub async fn run<W: Write>(writer: &mut W, args: &RmArgs, config: &Config) -> Result<()> {
    let entry_id = parse_entry_id(&args.entry_id)?;
    let engine = open_engine(config)?;
    engine.remove(&entry_id).await?;
    writeln!(writer, "Removed {entry_id}")?;
    Ok(())
}
