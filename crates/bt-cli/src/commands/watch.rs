//! Watch command: tick the running timer until it is stopped elsewhere.

use std::io::Write;

use anyhow::Result;
use bt_core::run_ticker;

use super::util::open_engine;
use crate::Config;

pub async fn run<W: Write>(writer: &mut W, config: &Config) -> Result<()> {
    let engine = open_engine(config)?;
    let state = engine.refresh().await?;
    let Some(entry_id) = state.entry_id() else {
        writeln!(writer, "No timer running")?;
        return Ok(());
    };

    writeln!(writer, "Watching {entry_id}")?;
    writer.flush()?;
    let ticks = run_ticker(&engine, config.tick_interval()).await?;
    writeln!(writer, "Timer stopped after {ticks} ticks")?;
    Ok(())
}
