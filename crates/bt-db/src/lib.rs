//! Storage layer for billable time.
//!
//! Provides persistence for time entries, projects, and rate tables using
//! `rusqlite`, and implements the [`EntryRepository`] and [`CatalogPort`]
//! ports of `bt-core` on top of it.
//!
//! # Thread Safety
//!
//! The connection sits behind a `Mutex`, so a [`Database`] can be shared
//! between tasks. Calls block briefly on `SQLite`; the engine issues at most
//! one write at a time per user.
//!
//! # Schema
//!
//! ## Exact numbers
//!
//! Hours, rates, and budgets are stored as TEXT holding a decimal literal
//! (e.g. `1.75`) so values read back exactly as written.
//!
//! ## Timestamp Format
//!
//! Timestamps are stored as TEXT in ISO 8601 format
//! (e.g. `2025-01-15T10:30:00.000Z`); billing dates as `YYYY-MM-DD`.
//!
//! ## Live queries
//!
//! [`Database::watch_entries`] hands out a `watch` receiver per user. After every
//! write, the affected user's entries are re-read and pushed to it.

mod catalog;

use std::collections::HashMap;
use std::collections::hash_map::Entry;
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use bt_core::{
    Clock, EntryId, EntryPatch, EntryRepository, NewEntry, ProjectId, RepositoryError,
    SystemClock, TimeEntry, TimerStart, UserId, ValidationError,
};
use chrono::{DateTime, NaiveDate, SecondsFormat, Utc};
use rusqlite::types::Value;
use rusqlite::{Connection, OptionalExtension, params, params_from_iter};
use rust_decimal::Decimal;
use thiserror::Error;
use tokio::sync::watch;
use uuid::Uuid;

/// Database errors.
#[derive(Debug, Error)]
pub enum DbError {
    /// An error from the underlying database.
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    /// A stored identifier failed validation.
    #[error("invalid identifier: {0}")]
    InvalidId(#[from] ValidationError),
    /// A stored decimal column could not be parsed.
    #[error("invalid decimal in {column}: {value}")]
    InvalidDecimal {
        column: &'static str,
        value: String,
        #[source]
        source: rust_decimal::Error,
    },
    /// A stored timestamp or date could not be parsed.
    #[error("invalid {column} for entry {entry_id}: {value}")]
    TimestampParse {
        entry_id: String,
        column: &'static str,
        value: String,
        #[source]
        source: chrono::ParseError,
    },
    /// No entry with the given ID exists.
    #[error("entry not found: {0}")]
    EntryNotFound(EntryId),
    /// A patch guarded on a running timer found the entry idle.
    #[error("entry not running: {0}")]
    EntryNotRunning(EntryId),
}

impl From<DbError> for RepositoryError {
    fn from(err: DbError) -> Self {
        match err {
            DbError::EntryNotFound(id) => Self::NotFound { id },
            DbError::EntryNotRunning(id) => Self::NotRunning { id },
            other => Self::Storage(Box::new(other)),
        }
    }
}

/// Database connection wrapper.
///
/// See the [module documentation](self) for thread safety considerations.
pub struct Database {
    conn: Mutex<Connection>,
    clock: Arc<dyn Clock>,
    subscriptions: Mutex<HashMap<UserId, watch::Sender<Vec<TimeEntry>>>>,
}

/// A time entry row as stored, before parsing.
#[derive(Debug, Clone, PartialEq, Eq)]
struct EntryRow {
    id: String,
    user_id: String,
    project_id: String,
    task_id: String,
    price_item_id: String,
    hourly_rate: Option<String>,
    hours: String,
    note: String,
    date: String,
    is_active: bool,
    timer_started_at: Option<String>,
    timer_seconds: i64,
    created_at: String,
    updated_at: String,
}

const ENTRY_COLUMNS: &str = "id, user_id, project_id, task_id, price_item_id, hourly_rate, hours, \
     note, date, is_active, timer_started_at, timer_seconds, created_at, updated_at";

impl EntryRow {
    fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            user_id: row.get(1)?,
            project_id: row.get(2)?,
            task_id: row.get(3)?,
            price_item_id: row.get(4)?,
            hourly_rate: row.get(5)?,
            hours: row.get(6)?,
            note: row.get(7)?,
            date: row.get(8)?,
            is_active: row.get(9)?,
            timer_started_at: row.get(10)?,
            timer_seconds: row.get(11)?,
            created_at: row.get(12)?,
            updated_at: row.get(13)?,
        })
    }

    fn into_entry(self) -> Result<TimeEntry, DbError> {
        let timer_started_at = self
            .timer_started_at
            .as_deref()
            .map(|ts| parse_timestamp(ts, &self.id, "timer_started_at"))
            .transpose()?;
        let created_at = parse_timestamp(&self.created_at, &self.id, "created_at")?;
        let updated_at = parse_timestamp(&self.updated_at, &self.id, "updated_at")?;
        let date = NaiveDate::parse_from_str(&self.date, "%Y-%m-%d").map_err(|source| {
            DbError::TimestampParse {
                entry_id: self.id.clone(),
                column: "date",
                value: self.date.clone(),
                source,
            }
        })?;

        Ok(TimeEntry {
            id: EntryId::new(self.id)?,
            user_id: UserId::new(self.user_id)?,
            project_id: self.project_id.parse()?,
            task_id: self.task_id.parse()?,
            price_item_id: self.price_item_id.parse()?,
            hourly_rate: self
                .hourly_rate
                .as_deref()
                .map(|rate| parse_decimal(rate, "hourly_rate"))
                .transpose()?,
            hours: parse_decimal(&self.hours, "hours")?,
            note: self.note,
            date,
            is_active: self.is_active,
            timer_started_at,
            timer_seconds: u64::try_from(self.timer_seconds).unwrap_or(0),
            created_at,
            updated_at,
        })
    }
}

impl Database {
    /// Opens a database at the given path, creating it if necessary.
    ///
    /// The database schema is automatically initialized on first open.
    pub fn open(path: &Path) -> Result<Self, DbError> {
        Self::from_connection(Connection::open(path)?)
    }

    /// Opens an in-memory database.
    ///
    /// Useful for testing. The database is destroyed when the connection closes.
    pub fn open_in_memory() -> Result<Self, DbError> {
        Self::from_connection(Connection::open_in_memory()?)
    }

    fn from_connection(conn: Connection) -> Result<Self, DbError> {
        let db = Self {
            conn: Mutex::new(conn),
            clock: Arc::new(SystemClock),
            subscriptions: Mutex::new(HashMap::new()),
        };
        db.init()?;
        Ok(db)
    }

    /// Replaces the clock used to stamp `created_at`/`updated_at`.
    #[must_use]
    pub fn with_clock(mut self, clock: impl Clock + 'static) -> Self {
        self.clock = Arc::new(clock);
        self
    }

    fn conn(&self) -> MutexGuard<'_, Connection> {
        self.conn.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Initializes the database schema.
    ///
    /// This is idempotent - safe to call on an already-initialized database.
    fn init(&self) -> Result<(), DbError> {
        self.conn().execute_batch(
            "
            -- Projects: read-only reference data for valuation
            CREATE TABLE IF NOT EXISTS projects (
                id TEXT PRIMARY KEY,
                name TEXT NOT NULL,
                customer_id TEXT NOT NULL,
                budget TEXT NOT NULL DEFAULT '0'
            );

            -- Price items: customer_id '' is the default rate table
            CREATE TABLE IF NOT EXISTS price_items (
                customer_id TEXT NOT NULL DEFAULT '',
                id TEXT NOT NULL,
                name TEXT NOT NULL,
                hourly_rate TEXT NOT NULL,
                daily_rate TEXT NOT NULL DEFAULT '0',
                ordernum INTEGER NOT NULL DEFAULT 0,
                PRIMARY KEY (customer_id, id)
            );

            -- Time entries: hours is the committed, quantized duration
            -- timer_started_at: set only while is_active = 1
            CREATE TABLE IF NOT EXISTS entries (
                id TEXT PRIMARY KEY,
                user_id TEXT NOT NULL,
                project_id TEXT NOT NULL,
                task_id TEXT NOT NULL,
                price_item_id TEXT NOT NULL,
                hourly_rate TEXT,
                hours TEXT NOT NULL DEFAULT '0',
                note TEXT NOT NULL DEFAULT '',
                date TEXT NOT NULL,
                is_active INTEGER NOT NULL DEFAULT 0,
                timer_started_at TEXT,
                timer_seconds INTEGER NOT NULL DEFAULT 0,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_entries_user ON entries(user_id, date);
            CREATE INDEX IF NOT EXISTS idx_entries_project ON entries(project_id);
            CREATE INDEX IF NOT EXISTS idx_entries_active ON entries(user_id, is_active);
            ",
        )?;
        Ok(())
    }

    /// Inserts a new entry and returns its generated ID.
    pub fn insert_entry(&self, entry: &NewEntry) -> Result<EntryId, DbError> {
        let id = EntryId::new(Uuid::new_v4().to_string())?;
        let now = format_timestamp(self.clock.now());
        self.conn().execute(
            &format!(
                "INSERT INTO entries ({ENTRY_COLUMNS}) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)"
            ),
            params![
                id.as_str(),
                entry.user_id.as_str(),
                entry.project_id.as_str(),
                entry.task_id.as_str(),
                entry.price_item_id.as_str(),
                entry.hourly_rate.map(|rate| rate.to_string()),
                entry.hours.to_string(),
                entry.note,
                format_date(entry.date),
                entry.is_active,
                entry.timer_started_at.map(format_timestamp),
                clamp_seconds(entry.timer_seconds),
                now,
                now,
            ],
        )?;
        tracing::debug!(entry_id = %id, user_id = %entry.user_id, "entry inserted");
        self.notify(&entry.user_id)?;
        Ok(id)
    }

    /// Fetches one entry.
    pub fn get_entry(&self, id: &EntryId) -> Result<Option<TimeEntry>, DbError> {
        let row = self
            .conn()
            .query_row(
                &format!("SELECT {ENTRY_COLUMNS} FROM entries WHERE id = ?"),
                [id.as_str()],
                EntryRow::from_row,
            )
            .optional()?;
        row.map(EntryRow::into_entry).transpose()
    }

    /// Lists a user's entries ordered by billing date, then creation time.
    pub fn list_entries(&self, user_id: &UserId) -> Result<Vec<TimeEntry>, DbError> {
        let rows = {
            let conn = self.conn();
            let mut stmt = conn.prepare(&format!(
                "
                SELECT {ENTRY_COLUMNS}
                FROM entries
                WHERE user_id = ?
                ORDER BY date ASC, created_at ASC, id ASC
                "
            ))?;
            let rows = stmt.query_map([user_id.as_str()], EntryRow::from_row)?;
            let mut collected = Vec::new();
            for row in rows {
                collected.push(row?);
            }
            collected
        };
        rows.into_iter().map(EntryRow::into_entry).collect()
    }

    /// Lists every user's entries booked against a project.
    pub fn list_project_entries(&self, project_id: &ProjectId) -> Result<Vec<TimeEntry>, DbError> {
        let rows = {
            let conn = self.conn();
            let mut stmt = conn.prepare(&format!(
                "SELECT {ENTRY_COLUMNS} FROM entries WHERE project_id = ? ORDER BY date, created_at, id"
            ))?;
            let rows = stmt.query_map([project_id.as_str()], EntryRow::from_row)?;
            rows.collect::<Result<Vec<_>, _>>()?
        };
        rows.into_iter().map(EntryRow::into_entry).collect()
    }

    /// Applies a partial update, always stamping `updated_at`.
    ///
    /// With `require_active` set, the update is conditional on the stored
    /// row still being active.
    pub fn patch_entry(&self, id: &EntryId, patch: &EntryPatch) -> Result<(), DbError> {
        let user_id = self.entry_owner(id)?.ok_or_else(|| DbError::EntryNotFound(id.clone()))?;

        let mut sets: Vec<&str> = Vec::new();
        let mut values: Vec<Value> = Vec::new();
        if let Some(project_id) = &patch.project_id {
            sets.push("project_id = ?");
            values.push(Value::Text(project_id.to_string()));
        }
        if let Some(task_id) = &patch.task_id {
            sets.push("task_id = ?");
            values.push(Value::Text(task_id.to_string()));
        }
        if let Some(price_item_id) = &patch.price_item_id {
            sets.push("price_item_id = ?");
            values.push(Value::Text(price_item_id.to_string()));
        }
        if let Some(hours) = patch.hours {
            sets.push("hours = ?");
            values.push(Value::Text(hours.to_string()));
        }
        if let Some(note) = &patch.note {
            sets.push("note = ?");
            values.push(Value::Text(note.clone()));
        }
        if let Some(date) = patch.date {
            sets.push("date = ?");
            values.push(Value::Text(format_date(date)));
        }
        if let Some(is_active) = patch.is_active {
            sets.push("is_active = ?");
            values.push(Value::Integer(i64::from(is_active)));
        }
        match patch.timer_started_at {
            TimerStart::Unchanged => {}
            TimerStart::Set(at) => {
                sets.push("timer_started_at = ?");
                values.push(Value::Text(format_timestamp(at)));
            }
            TimerStart::Cleared => {
                sets.push("timer_started_at = ?");
                values.push(Value::Null);
            }
        }
        if let Some(seconds) = patch.timer_seconds {
            sets.push("timer_seconds = ?");
            values.push(Value::Integer(clamp_seconds(seconds)));
        }
        sets.push("updated_at = ?");
        values.push(Value::Text(format_timestamp(self.clock.now())));
        values.push(Value::Text(id.to_string()));

        let guard = if patch.require_active { " AND is_active = 1" } else { "" };
        let query = format!("UPDATE entries SET {} WHERE id = ?{guard}", sets.join(", "));
        let changed = self.conn().execute(&query, params_from_iter(values))?;
        if changed == 0 {
            if patch.require_active && self.entry_owner(id)?.is_some() {
                tracing::debug!(entry_id = %id, "guarded patch skipped, entry idle");
                return Err(DbError::EntryNotRunning(id.clone()));
            }
            return Err(DbError::EntryNotFound(id.clone()));
        }
        self.notify(&user_id)
    }

    /// Deletes an entry.
    pub fn delete_entry(&self, id: &EntryId) -> Result<(), DbError> {
        let user_id = self.entry_owner(id)?.ok_or_else(|| DbError::EntryNotFound(id.clone()))?;
        self.conn()
            .execute("DELETE FROM entries WHERE id = ?", [id.as_str()])?;
        tracing::debug!(entry_id = %id, "entry deleted");
        self.notify(&user_id)
    }

    /// Starts a live query over a user's entries.
    pub fn watch_entries(&self, user_id: &UserId) -> Result<watch::Receiver<Vec<TimeEntry>>, DbError> {
        let snapshot = self.list_entries(user_id)?;
        let mut subscriptions = self.subscriptions();
        match subscriptions.entry(user_id.clone()) {
            Entry::Occupied(sender) => {
                sender.get().send_replace(snapshot);
                Ok(sender.get().subscribe())
            }
            Entry::Vacant(slot) => {
                let (sender, receiver) = watch::channel(snapshot);
                slot.insert(sender);
                Ok(receiver)
            }
        }
    }

    fn subscriptions(&self) -> MutexGuard<'_, HashMap<UserId, watch::Sender<Vec<TimeEntry>>>> {
        self.subscriptions
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    fn entry_owner(&self, id: &EntryId) -> Result<Option<UserId>, DbError> {
        let owner: Option<String> = self
            .conn()
            .query_row(
                "SELECT user_id FROM entries WHERE id = ?",
                [id.as_str()],
                |row| row.get(0),
            )
            .optional()?;
        Ok(owner.map(UserId::new).transpose()?)
    }

    /// Pushes a fresh snapshot to the user's live query, if anyone listens.
    fn notify(&self, user_id: &UserId) -> Result<(), DbError> {
        let mut subscriptions = self.subscriptions();
        let Some(sender) = subscriptions.get(user_id) else {
            return Ok(());
        };
        if sender.receiver_count() == 0 {
            subscriptions.remove(user_id);
            return Ok(());
        }
        let snapshot = self.list_entries(user_id)?;
        sender.send_replace(snapshot);
        Ok(())
    }
}

#[async_trait]
impl EntryRepository for Database {
    async fn subscribe(
        &self,
        user_id: &UserId,
    ) -> Result<watch::Receiver<Vec<TimeEntry>>, RepositoryError> {
        Ok(self.watch_entries(user_id)?)
    }

    async fn create(&self, entry: NewEntry) -> Result<EntryId, RepositoryError> {
        Ok(self.insert_entry(&entry)?)
    }

    async fn patch(&self, id: &EntryId, patch: EntryPatch) -> Result<(), RepositoryError> {
        Ok(self.patch_entry(id, &patch)?)
    }

    async fn remove(&self, id: &EntryId) -> Result<(), RepositoryError> {
        Ok(self.delete_entry(id)?)
    }

    async fn entries(&self, user_id: &UserId) -> Result<Vec<TimeEntry>, RepositoryError> {
        Ok(self.list_entries(user_id)?)
    }
}

fn parse_timestamp(value: &str, entry_id: &str, column: &'static str) -> Result<DateTime<Utc>, DbError> {
    DateTime::parse_from_rfc3339(value)
        .map(|parsed| parsed.with_timezone(&Utc))
        .map_err(|source| DbError::TimestampParse {
            entry_id: entry_id.to_string(),
            column,
            value: value.to_string(),
            source,
        })
}

fn format_timestamp(timestamp: DateTime<Utc>) -> String {
    timestamp.to_rfc3339_opts(SecondsFormat::Millis, true)
}

fn format_date(date: NaiveDate) -> String {
    date.format("%Y-%m-%d").to_string()
}

fn parse_decimal(value: &str, column: &'static str) -> Result<Decimal, DbError> {
    value
        .parse::<Decimal>()
        .map_err(|source| DbError::InvalidDecimal {
            column,
            value: value.to_string(),
            source,
        })
}

fn clamp_seconds(seconds: u64) -> i64 {
    i64::try_from(seconds).unwrap_or(i64::MAX)
}
