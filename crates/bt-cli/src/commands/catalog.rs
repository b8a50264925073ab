//! Catalog import: load projects and rate tables from JSON.
//!
//! Input shape:
//!
//! ```json
//! {
//!   "projects": [{"id": "acme-web", "name": "Acme Web", "customer_id": "acme", "budget": "5000"}],
//!   "price_items": [{"id": "senior", "name": "Senior", "hourly_rate": "150", "ordernum": 1}],
//!   "customer_rates": {"acme": [{"id": "senior", "name": "Senior", "hourly_rate": "120"}]}
//! }
//! ```
//!
//! `price_items` populate the default rate table. Existing records with the
//! same IDs are replaced.

use std::collections::BTreeMap;
use std::io::{Read, Write};

use anyhow::{Context, Result};
use bt_core::{CustomerId, PriceItem, Project};
use serde::Deserialize;

use super::util::open_database;
use crate::Config;

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct CatalogFile {
    #[serde(default)]
    projects: Vec<Project>,
    #[serde(default)]
    price_items: Vec<PriceItem>,
    #[serde(default)]
    customer_rates: BTreeMap<CustomerId, Vec<PriceItem>>,
}

pub fn import<R: Read, W: Write>(reader: R, writer: &mut W, config: &Config) -> Result<()> {
    let catalog: CatalogFile =
        serde_json::from_reader(reader).context("invalid catalog JSON")?;

    let db = open_database(config)?;
    for project in &catalog.projects {
        db.upsert_project(project)
            .with_context(|| format!("failed to import project {}", project.id))?;
    }
    for item in &catalog.price_items {
        db.upsert_price_item(None, item)
            .with_context(|| format!("failed to import price item {}", item.id))?;
    }
    let mut customer_items = 0;
    for (customer_id, items) in &catalog.customer_rates {
        for item in items {
            db.upsert_price_item(Some(customer_id), item)
                .with_context(|| format!("failed to import price item {} for {customer_id}", item.id))?;
        }
        customer_items += items.len();
    }
    tracing::debug!(
        projects = catalog.projects.len(),
        price_items = catalog.price_items.len(),
        customer_items,
        "catalog imported"
    );

    writeln!(
        writer,
        "Imported {} projects, {} default price items, {} customer price items",
        catalog.projects.len(),
        catalog.price_items.len(),
        customer_items
    )?;
    Ok(())
}
