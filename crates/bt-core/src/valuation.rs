//! Effort valuation against a budget.

use rust_decimal::Decimal;
use serde::Serialize;

use crate::entry::TimeEntry;
use crate::pricing::{RateTable, effective_rate};

/// Accumulated effort value compared to a budget. Derived, never stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct UsageResult {
    pub total_value: Decimal,
    pub budget: Decimal,
    /// Share of the budget used, capped at 100.
    pub percentage: Decimal,
    pub is_over_budget: bool,
}

/// Monetary value of one entry.
///
/// Running entries contribute their live, unquantized elapsed time.
pub fn entry_value(entry: &TimeEntry, table: &RateTable) -> Decimal {
    entry.valued_hours() * effective_rate(entry, table)
}

/// Sum of valued hours across entries, including live timer time.
pub fn total_hours<'a, I>(entries: I) -> Decimal
where
    I: IntoIterator<Item = &'a TimeEntry>,
{
    entries.into_iter().map(TimeEntry::valued_hours).sum()
}

/// Values every given entry and compares the total against `budget`.
///
/// Callers filter entries beforehand; nothing is filtered here. Any spend
/// against a zero budget is fully over budget.
pub fn compute_usage<'a, I>(entries: I, table: &RateTable, budget: Decimal) -> UsageResult
where
    I: IntoIterator<Item = &'a TimeEntry>,
{
    let total_value: Decimal = entries
        .into_iter()
        .map(|entry| entry_value(entry, table))
        .sum();

    let (percentage, is_over_budget) = if budget > Decimal::ZERO {
        let percentage = (total_value * Decimal::ONE_HUNDRED / budget).min(Decimal::ONE_HUNDRED);
        (percentage, total_value > budget)
    } else if total_value > Decimal::ZERO {
        (Decimal::ONE_HUNDRED, true)
    } else {
        (Decimal::ZERO, false)
    };

    UsageResult {
        total_value,
        budget,
        percentage,
        is_over_budget,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use chrono::{DateTime, NaiveDate, TimeZone, Utc};

    use crate::entry::NewEntry;
    use crate::pricing::PriceItem;
    use crate::types::{EntryId, PriceItemId, ProjectId, TaskId, UserId};

    fn d(s: &str) -> Decimal {
        s.parse().unwrap()
    }

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 3, 3, 9, 0, 0).unwrap()
    }

    fn table() -> RateTable {
        RateTable::new(vec![
            PriceItem {
                id: PriceItemId::new("senior").unwrap(),
                name: "Senior".to_string(),
                hourly_rate: d("100"),
                daily_rate: d("800"),
                ordernum: 1,
            },
            PriceItem {
                id: PriceItemId::new("pro-bono").unwrap(),
                name: "Pro bono".to_string(),
                hourly_rate: Decimal::ZERO,
                daily_rate: Decimal::ZERO,
                ordernum: 2,
            },
        ])
    }

    fn entry(id: &str, price_item: &str, hours: &str) -> TimeEntry {
        NewEntry::manual(
            UserId::new("sami").unwrap(),
            ProjectId::new("acme").unwrap(),
            TaskId::new("design").unwrap(),
            PriceItemId::new(price_item).unwrap(),
            NaiveDate::from_ymd_opt(2025, 3, 3).unwrap(),
            d(hours),
        )
        .into_entry(EntryId::new(id).unwrap(), now())
    }

    #[test]
    fn sums_hours_times_rate() {
        let entries = [entry("a", "senior", "1.5"), entry("b", "senior", "0.25")];
        let usage = compute_usage(&entries, &table(), d("1000"));
        assert_eq!(usage.total_value, d("175"));
        assert_eq!(usage.percentage, d("17.5"));
        assert!(!usage.is_over_budget);
    }

    #[test]
    fn unknown_and_zero_rate_items_add_nothing() {
        let entries = [entry("a", "ghost", "3"), entry("b", "pro-bono", "2")];
        let usage = compute_usage(&entries, &table(), d("100"));
        assert_eq!(usage.total_value, Decimal::ZERO);
        assert_eq!(usage.percentage, Decimal::ZERO);
    }

    #[test]
    fn explicit_rate_overrides_table() {
        let mut special = entry("a", "senior", "2");
        special.hourly_rate = Some(d("60"));
        let usage = compute_usage([&special], &table(), d("1000"));
        assert_eq!(usage.total_value, d("120"));
    }

    #[test]
    fn percentage_caps_at_hundred_when_over() {
        let entries = [entry("a", "senior", "3")];
        let usage = compute_usage(&entries, &table(), d("250"));
        assert_eq!(usage.total_value, d("300"));
        assert_eq!(usage.percentage, d("100"));
        assert!(usage.is_over_budget);
    }

    #[test]
    fn exactly_on_budget_is_not_over() {
        let entries = [entry("a", "senior", "2.5")];
        let usage = compute_usage(&entries, &table(), d("250"));
        assert_eq!(usage.percentage, d("100"));
        assert!(!usage.is_over_budget);
    }

    #[test]
    fn zero_budget_without_spend_is_not_over() {
        let entries: Vec<TimeEntry> = Vec::new();
        let usage = compute_usage(&entries, &table(), Decimal::ZERO);
        assert_eq!(usage.percentage, Decimal::ZERO);
        assert!(!usage.is_over_budget);
    }

    #[test]
    fn zero_budget_with_spend_is_fully_over() {
        let entries = [entry("a", "senior", "0.05")];
        let usage = compute_usage(&entries, &table(), Decimal::ZERO);
        assert_eq!(usage.total_value, d("5"));
        assert_eq!(usage.percentage, d("100"));
        assert!(usage.is_over_budget);
    }

    #[test]
    fn running_entry_counts_live_seconds_unquantized() {
        let mut running = entry("a", "senior", "1");
        running.is_active = true;
        running.timer_started_at = Some(now());
        running.timer_seconds = 360;
        let usage = compute_usage([&running], &table(), d("1000"));
        assert_eq!(usage.total_value, d("110"));
        assert_eq!(total_hours([&running]), d("1.1"));
    }

    #[test]
    fn idle_entry_ignores_stale_seconds() {
        let mut idle = entry("a", "senior", "1");
        idle.timer_seconds = 3600;
        assert_eq!(entry_value(&idle, &table()), d("100"));
    }
}
