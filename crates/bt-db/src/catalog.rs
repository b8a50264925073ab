//! Projects and rate tables.

use async_trait::async_trait;
use bt_core::{CatalogError, CatalogPort, CustomerId, PriceItem, Project, ProjectId, RateTable};
use rusqlite::{OptionalExtension, params};

use crate::{Database, DbError, parse_decimal};

/// Rows with an empty `customer_id` form the default rate table.
const DEFAULT_TABLE: &str = "";

impl From<DbError> for CatalogError {
    fn from(err: DbError) -> Self {
        Self::Unavailable(err.to_string())
    }
}

struct ProjectRow {
    id: String,
    name: String,
    customer_id: String,
    budget: String,
}

impl ProjectRow {
    fn into_project(self) -> Result<Project, DbError> {
        Ok(Project {
            id: ProjectId::new(self.id)?,
            name: self.name,
            customer_id: CustomerId::new(self.customer_id)?,
            budget: parse_decimal(&self.budget, "budget")?,
        })
    }
}

impl Database {
    /// Inserts or replaces a project.
    pub fn upsert_project(&self, project: &Project) -> Result<(), DbError> {
        self.conn().execute(
            "
            INSERT INTO projects (id, name, customer_id, budget)
            VALUES (?, ?, ?, ?)
            ON CONFLICT(id) DO UPDATE SET
                name = excluded.name,
                customer_id = excluded.customer_id,
                budget = excluded.budget
            ",
            params![
                project.id.as_str(),
                project.name,
                project.customer_id.as_str(),
                project.budget.to_string(),
            ],
        )?;
        Ok(())
    }

    pub fn get_project(&self, id: &ProjectId) -> Result<Option<Project>, DbError> {
        let row = self
            .conn()
            .query_row(
                "SELECT id, name, customer_id, budget FROM projects WHERE id = ?",
                [id.as_str()],
                |row| {
                    Ok(ProjectRow {
                        id: row.get(0)?,
                        name: row.get(1)?,
                        customer_id: row.get(2)?,
                        budget: row.get(3)?,
                    })
                },
            )
            .optional()?;
        row.map(ProjectRow::into_project).transpose()
    }

    /// Inserts or replaces a price item.
    ///
    /// `customer_id` of `None` writes to the default rate table.
    pub fn upsert_price_item(
        &self,
        customer_id: Option<&CustomerId>,
        item: &PriceItem,
    ) -> Result<(), DbError> {
        let owner = customer_id.map_or(DEFAULT_TABLE, CustomerId::as_str);
        self.conn().execute(
            "
            INSERT INTO price_items (customer_id, id, name, hourly_rate, daily_rate, ordernum)
            VALUES (?, ?, ?, ?, ?, ?)
            ON CONFLICT(customer_id, id) DO UPDATE SET
                name = excluded.name,
                hourly_rate = excluded.hourly_rate,
                daily_rate = excluded.daily_rate,
                ordernum = excluded.ordernum
            ",
            params![
                owner,
                item.id.as_str(),
                item.name,
                item.hourly_rate.to_string(),
                item.daily_rate.to_string(),
                item.ordernum,
            ],
        )?;
        Ok(())
    }

    /// Reads a rate table; `None` reads the default table.
    pub fn rate_table(&self, customer_id: Option<&CustomerId>) -> Result<RateTable, DbError> {
        let owner = customer_id.map_or(DEFAULT_TABLE, CustomerId::as_str);
        let rows = {
            let conn = self.conn();
            let mut stmt = conn.prepare(
                "
                SELECT id, name, hourly_rate, daily_rate, ordernum
                FROM price_items
                WHERE customer_id = ?
                ORDER BY ordernum, id
                ",
            )?;
            let rows = stmt.query_map([owner], |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, String>(2)?,
                    row.get::<_, String>(3)?,
                    row.get::<_, u32>(4)?,
                ))
            })?;
            rows.collect::<Result<Vec<_>, _>>()?
        };

        let items = rows
            .into_iter()
            .map(|(id, name, hourly_rate, daily_rate, ordernum)| {
                Ok(PriceItem {
                    id: id.parse()?,
                    name,
                    hourly_rate: parse_decimal(&hourly_rate, "hourly_rate")?,
                    daily_rate: parse_decimal(&daily_rate, "daily_rate")?,
                    ordernum,
                })
            })
            .collect::<Result<Vec<_>, DbError>>()?;
        Ok(RateTable::new(items))
    }
}

#[async_trait]
impl CatalogPort for Database {
    async fn default_rate_table(&self) -> Result<RateTable, CatalogError> {
        Ok(self.rate_table(None)?)
    }

    async fn customer_rate_table(
        &self,
        customer_id: &CustomerId,
    ) -> Result<Option<RateTable>, CatalogError> {
        let table = self.rate_table(Some(customer_id))?;
        Ok((!table.is_empty()).then_some(table))
    }

    async fn project(&self, project_id: &ProjectId) -> Result<Option<Project>, CatalogError> {
        Ok(self.get_project(project_id)?)
    }
}
