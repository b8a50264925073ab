//! Rate tables and price resolution.
//!
//! A project belongs to one customer. The customer's own rate table wins if
//! it exists and has items; otherwise the global default table applies.
//! Missing references never fail: an unknown price item has rate 0.

use std::collections::HashMap;

use async_trait::async_trait;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::entry::TimeEntry;
use crate::types::{CustomerId, PriceItemId, ProjectId};

/// A billable line-item type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PriceItem {
    pub id: PriceItemId,
    pub name: String,
    pub hourly_rate: Decimal,
    #[serde(default)]
    pub daily_rate: Decimal,
    /// Fixed display and priority order.
    #[serde(default)]
    pub ordernum: u32,
}

/// An ordered set of price items, sorted by `ordernum`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "Vec<PriceItem>", into = "Vec<PriceItem>")]
pub struct RateTable {
    items: Vec<PriceItem>,
}

impl RateTable {
    /// Builds a table, ordering items by `ordernum` (stable for ties).
    pub fn new(mut items: Vec<PriceItem>) -> Self {
        items.sort_by_key(|item| item.ordernum);
        Self { items }
    }

    pub fn items(&self) -> &[PriceItem] {
        &self.items
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn get(&self, id: &PriceItemId) -> Option<&PriceItem> {
        self.items.iter().find(|item| &item.id == id)
    }
}

impl From<Vec<PriceItem>> for RateTable {
    fn from(items: Vec<PriceItem>) -> Self {
        Self::new(items)
    }
}

impl From<RateTable> for Vec<PriceItem> {
    fn from(table: RateTable) -> Self {
        table.items
    }
}

/// A project entries are booked against. Read-only to the engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Project {
    pub id: ProjectId,
    pub name: String,
    pub customer_id: CustomerId,
    #[serde(default)]
    pub budget: Decimal,
}

/// Outcome of looking up a price item's hourly rate.
///
/// Distinguishes "no such item" from "item with a zero rate", which
/// [`lookup_rate`] deliberately conflates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RateLookup {
    Found(Decimal),
    NotFound,
}

impl RateLookup {
    /// The rate, with a missing item counting as 0.
    pub const fn unwrap_or_zero(self) -> Decimal {
        match self {
            Self::Found(rate) => rate,
            Self::NotFound => Decimal::ZERO,
        }
    }

    pub const fn is_found(self) -> bool {
        matches!(self, Self::Found(_))
    }
}

/// Picks the customer's rate table when present and non-empty, else the default.
pub fn resolve_rate_table<'a>(
    customer_id: &CustomerId,
    default_table: &'a RateTable,
    customer_tables: &'a HashMap<CustomerId, RateTable>,
) -> &'a RateTable {
    match customer_tables.get(customer_id) {
        Some(table) if !table.is_empty() => table,
        _ => default_table,
    }
}

/// Looks up the hourly rate of a price item.
pub fn find_rate(price_item_id: &PriceItemId, table: &RateTable) -> RateLookup {
    table
        .get(price_item_id)
        .map_or(RateLookup::NotFound, |item| RateLookup::Found(item.hourly_rate))
}

/// Hourly rate of a price item, or 0 when the item is not in the table.
///
/// A 0 result is ambiguous: it is also the rate of non-billable items.
/// Use [`find_rate`] when the difference matters.
pub fn lookup_rate(price_item_id: &PriceItemId, table: &RateTable) -> Decimal {
    find_rate(price_item_id, table).unwrap_or_zero()
}

/// Rate applied to an entry: its explicit rate if it has one, else the
/// table rate of its price item.
pub fn effective_rate(entry: &TimeEntry, table: &RateTable) -> Decimal {
    if let Some(rate) = entry.hourly_rate {
        return rate;
    }
    match find_rate(&entry.price_item_id, table) {
        RateLookup::Found(rate) => rate,
        RateLookup::NotFound => {
            tracing::debug!(
                entry_id = %entry.id,
                price_item_id = %entry.price_item_id,
                "price item not in rate table, valuing at 0"
            );
            Decimal::ZERO
        }
    }
}

/// Catalog errors.
#[derive(Debug, Error)]
pub enum CatalogError {
    /// The backing store failed.
    #[error("catalog unavailable: {0}")]
    Unavailable(String),
}

/// Read-only access to rate tables and projects.
#[async_trait]
pub trait CatalogPort: Send + Sync {
    /// The global default rate table, ordered by `ordernum`.
    async fn default_rate_table(&self) -> Result<RateTable, CatalogError>;

    /// The customer's own rate table, if one exists.
    async fn customer_rate_table(
        &self,
        customer_id: &CustomerId,
    ) -> Result<Option<RateTable>, CatalogError>;

    async fn project(&self, project_id: &ProjectId) -> Result<Option<Project>, CatalogError>;
}

/// Fetches and resolves the effective rate table for a customer.
pub async fn resolve_for_customer<C: CatalogPort + ?Sized>(
    catalog: &C,
    customer_id: &CustomerId,
) -> Result<RateTable, CatalogError> {
    let default_table = catalog.default_rate_table().await?;
    match catalog.customer_rate_table(customer_id).await? {
        Some(table) if !table.is_empty() => {
            tracing::debug!(%customer_id, items = table.items().len(), "using customer rate table");
            Ok(table)
        }
        _ => Ok(default_table),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use chrono::{NaiveDate, TimeZone, Utc};

    use crate::entry::NewEntry;
    use crate::types::{EntryId, TaskId, UserId};

    fn d(s: &str) -> Decimal {
        s.parse().unwrap()
    }

    fn item(id: &str, rate: &str, ordernum: u32) -> PriceItem {
        PriceItem {
            id: PriceItemId::new(id).unwrap(),
            name: id.to_uppercase(),
            hourly_rate: d(rate),
            daily_rate: d(rate) * d("8"),
            ordernum,
        }
    }

    fn entry(price_item: &str, rate: Option<&str>) -> TimeEntry {
        NewEntry::manual(
            UserId::new("sami").unwrap(),
            ProjectId::new("acme").unwrap(),
            TaskId::new("design").unwrap(),
            PriceItemId::new(price_item).unwrap(),
            NaiveDate::from_ymd_opt(2025, 3, 3).unwrap(),
            Decimal::ONE,
        )
        .with_hourly_rate(rate.map(d))
        .into_entry(
            EntryId::new("e1").unwrap(),
            Utc.with_ymd_and_hms(2025, 3, 3, 9, 0, 0).unwrap(),
        )
    }

    fn cust() -> CustomerId {
        CustomerId::new("cust-1").unwrap()
    }

    #[test]
    fn table_orders_items_by_ordernum() {
        let table = RateTable::new(vec![item("b", "80", 2), item("a", "100", 1)]);
        let ids: Vec<_> = table.items().iter().map(|i| i.id.as_str()).collect();
        assert_eq!(ids, vec!["a", "b"]);
    }

    #[test]
    fn empty_customer_table_falls_back_to_default() {
        let default_table = RateTable::new(vec![item("senior", "100", 1)]);
        let customer_tables = HashMap::from([(cust(), RateTable::default())]);
        let resolved = resolve_rate_table(&cust(), &default_table, &customer_tables);
        assert_eq!(resolved, &default_table);
    }

    #[test]
    fn missing_customer_table_falls_back_to_default() {
        let default_table = RateTable::new(vec![item("senior", "100", 1)]);
        let customer_tables = HashMap::new();
        let resolved = resolve_rate_table(&cust(), &default_table, &customer_tables);
        assert_eq!(resolved, &default_table);
    }

    #[test]
    fn non_empty_customer_table_wins() {
        let default_table = RateTable::new(vec![item("senior", "100", 1)]);
        let custom = RateTable::new(vec![item("senior", "90", 1)]);
        let customer_tables = HashMap::from([(cust(), custom.clone())]);
        let resolved = resolve_rate_table(&cust(), &default_table, &customer_tables);
        assert_eq!(resolved, &custom);
    }

    #[test]
    fn unknown_price_item_rates_zero() {
        let table = RateTable::new(vec![item("senior", "100", 1)]);
        let unknown = PriceItemId::new("ghost").unwrap();
        assert_eq!(lookup_rate(&unknown, &table), Decimal::ZERO);
        assert_eq!(find_rate(&unknown, &table), RateLookup::NotFound);
    }

    #[test]
    fn zero_rate_item_is_found_but_rates_zero() {
        let table = RateTable::new(vec![item("internal", "0", 1)]);
        let id = PriceItemId::new("internal").unwrap();
        assert_eq!(lookup_rate(&id, &table), Decimal::ZERO);
        assert!(find_rate(&id, &table).is_found());
    }

    #[test]
    fn explicit_entry_rate_wins_over_table() {
        let table = RateTable::new(vec![item("senior", "100", 1)]);
        assert_eq!(effective_rate(&entry("senior", Some("75")), &table), d("75"));
        assert_eq!(effective_rate(&entry("senior", None), &table), d("100"));
    }

    #[test]
    fn explicit_zero_rate_still_wins() {
        let table = RateTable::new(vec![item("senior", "100", 1)]);
        assert_eq!(effective_rate(&entry("senior", Some("0")), &table), Decimal::ZERO);
    }

    #[test]
    fn rate_table_deserializes_from_item_list() {
        let json = r#"[
            {"id": "junior", "name": "Junior", "hourly_rate": 60, "ordernum": 2},
            {"id": "senior", "name": "Senior", "hourly_rate": "95.50", "daily_rate": 700, "ordernum": 1}
        ]"#;
        let table: RateTable = serde_json::from_str(json).unwrap();
        assert_eq!(table.items()[0].id.as_str(), "senior");
        assert_eq!(table.items()[0].hourly_rate, d("95.50"));
        assert_eq!(table.items()[1].daily_rate, Decimal::ZERO);
    }

    struct FixedCatalog {
        default_table: RateTable,
        customer_tables: HashMap<CustomerId, RateTable>,
    }

    #[async_trait]
    impl CatalogPort for FixedCatalog {
        async fn default_rate_table(&self) -> Result<RateTable, CatalogError> {
            Ok(self.default_table.clone())
        }

        async fn customer_rate_table(
            &self,
            customer_id: &CustomerId,
        ) -> Result<Option<RateTable>, CatalogError> {
            Ok(self.customer_tables.get(customer_id).cloned())
        }

        async fn project(&self, _project_id: &ProjectId) -> Result<Option<Project>, CatalogError> {
            Ok(None)
        }
    }

    #[tokio::test]
    async fn resolve_for_customer_matches_pure_resolution() {
        let catalog = FixedCatalog {
            default_table: RateTable::new(vec![item("senior", "100", 1)]),
            customer_tables: HashMap::from([
                (cust(), RateTable::new(vec![item("senior", "90", 1)])),
                (CustomerId::new("cust-2").unwrap(), RateTable::default()),
            ]),
        };

        let resolved = resolve_for_customer(&catalog, &cust()).await.unwrap();
        assert_eq!(lookup_rate(&PriceItemId::new("senior").unwrap(), &resolved), d("90"));

        let other = CustomerId::new("cust-2").unwrap();
        let resolved = resolve_for_customer(&catalog, &other).await.unwrap();
        assert_eq!(resolved, catalog.default_table);
    }
}
