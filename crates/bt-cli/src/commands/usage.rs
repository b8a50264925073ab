//! Usage command: value a project's entries against its budget.

use std::io::Write;

use anyhow::{Context, Result, bail};
use bt_core::{
    CatalogPort, ProjectId, TaskId, compute_usage, format_for_display, resolve_for_customer,
    total_hours,
};
use clap::Args;
use rust_decimal::Decimal;

use super::util::open_database;
use crate::Config;

#[derive(Debug, Args)]
pub struct UsageArgs {
    /// Project to report on.
    #[arg(long)]
    pub project: String,

    /// Only count entries for this task.
    #[arg(long)]
    pub task: Option<String>,

    /// Budget overriding the project's own.
    #[arg(long)]
    pub budget: Option<String>,

    /// Output JSON instead of text.
    #[arg(long)]
    pub json: bool,
}

pub async fn run<W: Write>(writer: &mut W, args: &UsageArgs, config: &Config) -> Result<()> {
    let project_id = ProjectId::new(args.project.as_str())?;
    let task_id = args.task.as_deref().map(TaskId::new).transpose()?;
    let budget_override = args
        .budget
        .as_deref()
        .map(|raw| {
            raw.trim()
                .replace(',', ".")
                .parse::<Decimal>()
                .with_context(|| format!("invalid budget: {raw}"))
        })
        .transpose()?;

    let db = open_database(config)?;
    let Some(project) = db.project(&project_id).await? else {
        bail!("project not found: {project_id}");
    };
    let table = resolve_for_customer(&db, &project.customer_id).await?;

    let entries: Vec<_> = db
        .list_project_entries(&project_id)?
        .into_iter()
        .filter(|entry| task_id.as_ref().is_none_or(|task| &entry.task_id == task))
        .collect();
    let budget = budget_override.unwrap_or(project.budget);
    let usage = compute_usage(&entries, &table, budget);
    tracing::debug!(%project_id, entries = entries.len(), ?usage, "usage computed");

    if args.json {
        writeln!(writer, "{}", serde_json::to_string_pretty(&usage)?)?;
        return Ok(());
    }

    writeln!(writer, "Project: {} ({})", project.name, project.id)?;
    if let Some(task_id) = &task_id {
        writeln!(writer, "Task: {task_id}")?;
    }
    writeln!(writer, "Hours: {}", format_for_display(total_hours(&entries)))?;
    writeln!(writer, "Value: {:.2}", usage.total_value)?;
    writeln!(writer, "Budget: {}", usage.budget)?;
    writeln!(writer, "Used: {:.1}%", usage.percentage)?;
    if usage.is_over_budget {
        writeln!(writer, "Over budget")?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    use bt_core::{CustomerId, NewEntry, PriceItem, PriceItemId, Project, UserId};
    use bt_db::Database;
    use chrono::NaiveDate;
    use insta::assert_snapshot;

    use crate::commands::util::test_support::config_for;

    fn d(s: &str) -> Decimal {
        s.parse().unwrap()
    }

    fn seed(db: &Database) {
        db.upsert_project(&Project {
            id: ProjectId::new("acme-web").unwrap(),
            name: "Acme Web".to_string(),
            customer_id: CustomerId::new("acme").unwrap(),
            budget: d("1000"),
        })
        .unwrap();
        db.upsert_price_item(
            None,
            &PriceItem {
                id: PriceItemId::new("senior").unwrap(),
                name: "Senior".to_string(),
                hourly_rate: d("150"),
                daily_rate: Decimal::ZERO,
                ordernum: 1,
            },
        )
        .unwrap();
        db.upsert_price_item(
            Some(&CustomerId::new("acme").unwrap()),
            &PriceItem {
                id: PriceItemId::new("senior").unwrap(),
                name: "Senior".to_string(),
                hourly_rate: d("120"),
                daily_rate: Decimal::ZERO,
                ordernum: 1,
            },
        )
        .unwrap();

        for (user, task, hours) in [
            ("sami", "design", "2.5"),
            ("alex", "design", "1"),
            ("sami", "review", "0.25"),
        ] {
            let draft = NewEntry::manual(
                UserId::new(user).unwrap(),
                ProjectId::new("acme-web").unwrap(),
                TaskId::new(task).unwrap(),
                PriceItemId::new("senior").unwrap(),
                NaiveDate::from_ymd_opt(2025, 3, 3).unwrap(),
                d(hours),
            );
            db.insert_entry(&draft).unwrap();
        }
    }

    fn args(task: Option<&str>, budget: Option<&str>, json: bool) -> UsageArgs {
        UsageArgs {
            project: "acme-web".to_string(),
            task: task.map(str::to_string),
            budget: budget.map(str::to_string),
            json,
        }
    }

    #[tokio::test]
    async fn usage_values_entries_with_customer_rates() {
        let temp = tempfile::tempdir().unwrap();
        let db_path = temp.path().join("bt.db");
        seed(&Database::open(&db_path).unwrap());
        let config = config_for(&db_path);

        let mut output = Vec::new();
        run(&mut output, &args(None, None, false), &config)
            .await
            .unwrap();

        let output = String::from_utf8(output).unwrap();
        assert_snapshot!(output, @r"
        Project: Acme Web (acme-web)
        Hours: 3:45
        Value: 450.00
        Budget: 1000
        Used: 45.0%
        ");
    }

    #[tokio::test]
    async fn usage_reports_over_budget_for_task() {
        let temp = tempfile::tempdir().unwrap();
        let db_path = temp.path().join("bt.db");
        seed(&Database::open(&db_path).unwrap());
        let config = config_for(&db_path);

        let mut output = Vec::new();
        run(&mut output, &args(Some("design"), Some("300"), false), &config)
            .await
            .unwrap();

        let output = String::from_utf8(output).unwrap();
        assert_snapshot!(output, @r"
        Project: Acme Web (acme-web)
        Task: design
        Hours: 3:30
        Value: 420.00
        Budget: 300
        Used: 100.0%
        Over budget
        ");
    }

    #[tokio::test]
    async fn usage_json_output() {
        let temp = tempfile::tempdir().unwrap();
        let db_path = temp.path().join("bt.db");
        seed(&Database::open(&db_path).unwrap());
        let config = config_for(&db_path);

        let mut output = Vec::new();
        run(&mut output, &args(Some("review"), Some("0"), true), &config)
            .await
            .unwrap();

        let parsed: serde_json::Value = serde_json::from_slice(&output).unwrap();
        assert_eq!(parsed["is_over_budget"], serde_json::Value::Bool(true));
        assert_eq!(parsed["percentage"], serde_json::Value::from("100"));
    }

    #[tokio::test]
    async fn usage_rejects_unknown_project() {
        let temp = tempfile::tempdir().unwrap();
        let config = config_for(&temp.path().join("bt.db"));

        let mut output = Vec::new();
        let err = run(&mut output, &args(None, None, false), &config)
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "project not found: acme-web");
    }
}
