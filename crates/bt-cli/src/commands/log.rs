//! Log command: record manually entered hours.

use std::io::Write;

use anyhow::{Context, Result};
use bt_core::{EntryRepository, format_for_display};
use clap::Args;
use rust_decimal::Decimal;

use super::util::{EntryArgs, open_engine, parse_hours};
use crate::Config;

#[derive(Debug, Args)]
pub struct LogArgs {
    #[command(flatten)]
    pub entry: EntryArgs,

    /// Duration as `H:MM` or decimal hours; rounded up to 15 minutes.
    #[arg(long)]
    pub hours: String,

    /// Explicit hourly rate overriding the rate table.
    #[arg(long)]
    pub rate: Option<String>,
}

pub async fn run<W: Write>(writer: &mut W, args: &LogArgs, config: &Config) -> Result<()> {
    let hours = parse_hours(&args.hours)?;
    let rate = args
        .rate
        .as_deref()
        .map(|raw| {
            raw.trim()
                .replace(',', ".")
                .parse::<Decimal>()
                .with_context(|| format!("invalid rate: {raw}"))
        })
        .transpose()?;

    let engine = open_engine(config)?;
    let draft = args
        .entry
        .draft(engine.user_id().clone(), hours)?
        .with_hourly_rate(rate);
    let entry_id = engine.repository().create(draft).await?;
    tracing::debug!(%entry_id, %hours, "manual entry logged");

    writeln!(
        writer,
        "Logged {} on {}/{} as {entry_id}",
        format_for_display(hours),
        args.entry.project.trim(),
        args.entry.task.trim()
    )?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    use bt_core::UserId;
    use bt_db::Database;
    use insta::assert_snapshot;

    use crate::commands::util::test_support::{config_for, redact_ids};

    fn args(hours: &str, rate: Option<&str>) -> LogArgs {
        LogArgs {
            entry: EntryArgs {
                project: "acme".to_string(),
                task: "design".to_string(),
                price_item: "senior".to_string(),
                note: String::new(),
                date: Some("2025-03-03".to_string()),
            },
            hours: hours.to_string(),
            rate: rate.map(str::to_string),
        }
    }

    #[tokio::test]
    async fn log_quantizes_hours() {
        let temp = tempfile::tempdir().unwrap();
        let db_path = temp.path().join("bt.db");
        let config = config_for(&db_path);

        let mut output = Vec::new();
        run(&mut output, &args("0:50", None), &config).await.unwrap();
        let mut next_day = args("1,5", Some("99,50"));
        next_day.entry.date = Some("2025-03-04".to_string());
        run(&mut output, &next_day, &config).await.unwrap();

        let db = Database::open(&db_path).unwrap();
        let entries = db.list_entries(&UserId::new("sami").unwrap()).unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].hours, Decimal::ONE);
        assert_eq!(entries[0].hourly_rate, None);
        assert_eq!(entries[1].hours, Decimal::new(15, 1));
        assert_eq!(entries[1].hourly_rate, Some(Decimal::new(9950, 2)));
        assert!(entries.iter().all(|entry| !entry.is_active));

        let output = String::from_utf8(output).unwrap();
        let output = redact_ids(&output, &[entries[0].id.as_str(), entries[1].id.as_str()]);
        assert_snapshot!(output, @r"
        Logged 1:00 on acme/design as [ID1]
        Logged 1:30 on acme/design as [ID2]
        ");
    }

    #[tokio::test]
    async fn log_rejects_unparseable_hours() {
        let temp = tempfile::tempdir().unwrap();
        let config = config_for(&temp.path().join("bt.db"));

        let mut output = Vec::new();
        let err = run(&mut output, &args("a while", None), &config)
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "invalid duration: a while");
    }

    #[tokio::test]
    async fn log_rejects_bad_rate() {
        let temp = tempfile::tempdir().unwrap();
        let config = config_for(&temp.path().join("bt.db"));

        let mut output = Vec::new();
        let err = run(&mut output, &args("1", Some("cheap")), &config)
            .await
            .unwrap_err();
        assert!(err.to_string().contains("invalid rate: cheap"));
    }
}
