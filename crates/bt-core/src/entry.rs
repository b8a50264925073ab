//! Time entries: the single record type for manual and timer-driven work.

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::quantize::seconds_to_hours;
use crate::types::{EntryId, PriceItemId, ProjectId, TaskId, UserId};

/// One logged or in-progress unit of billable work.
///
/// Manual and timer entries share this type; `is_active` is the
/// discriminant. For a given user at most one entry is active. An active
/// entry always carries `timer_started_at`; an idle one never does and has
/// `timer_seconds == 0`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeEntry {
    pub id: EntryId,
    pub user_id: UserId,
    pub project_id: ProjectId,
    pub task_id: TaskId,
    pub price_item_id: PriceItemId,

    /// Explicit hourly rate, taking precedence over the rate table.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hourly_rate: Option<Decimal>,

    /// Committed, quantized duration. Only `stop` folds timer time into it.
    pub hours: Decimal,

    #[serde(default)]
    pub note: String,

    /// Billing day, independent of when the timer ran.
    pub date: NaiveDate,

    #[serde(default)]
    pub is_active: bool,

    /// Authoritative timer start whenever present.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timer_started_at: Option<DateTime<Utc>>,

    /// Last synchronized elapsed seconds; a best-effort cache of
    /// `now - timer_started_at`.
    #[serde(default)]
    pub timer_seconds: u64,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl TimeEntry {
    /// Seconds elapsed on the running timer at `now`.
    ///
    /// Prefers the start timestamp, falling back to the last synchronized
    /// `timer_seconds`. Idle entries have no elapsed time.
    pub fn elapsed_seconds(&self, now: DateTime<Utc>) -> u64 {
        if !self.is_active {
            return 0;
        }
        self.timer_started_at.map_or(self.timer_seconds, |started| {
            u64::try_from((now - started).num_seconds()).unwrap_or(0)
        })
    }

    /// Hours used for valuation: committed hours plus the last synchronized
    /// timer seconds while running, unquantized.
    pub fn valued_hours(&self) -> Decimal {
        if self.is_active {
            self.hours + seconds_to_hours(self.timer_seconds)
        } else {
            self.hours
        }
    }

    /// Checks the timer-field invariants of a single record.
    pub fn timer_fields_consistent(&self) -> bool {
        if self.is_active {
            self.timer_started_at.is_some()
        } else {
            self.timer_started_at.is_none() && self.timer_seconds == 0
        }
    }
}

/// A time entry before the repository has assigned an ID.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewEntry {
    pub user_id: UserId,
    pub project_id: ProjectId,
    pub task_id: TaskId,
    pub price_item_id: PriceItemId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hourly_rate: Option<Decimal>,
    pub hours: Decimal,
    #[serde(default)]
    pub note: String,
    pub date: NaiveDate,
    #[serde(default)]
    pub is_active: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timer_started_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub timer_seconds: u64,
}

impl NewEntry {
    /// A manual entry with final hours and no timer.
    pub fn manual(
        user_id: UserId,
        project_id: ProjectId,
        task_id: TaskId,
        price_item_id: PriceItemId,
        date: NaiveDate,
        hours: Decimal,
    ) -> Self {
        Self {
            user_id,
            project_id,
            task_id,
            price_item_id,
            hourly_rate: None,
            hours,
            note: String::new(),
            date,
            is_active: false,
            timer_started_at: None,
            timer_seconds: 0,
        }
    }

    #[must_use]
    pub fn with_note(mut self, note: impl Into<String>) -> Self {
        self.note = note.into();
        self
    }

    #[must_use]
    pub fn with_hourly_rate(mut self, rate: Option<Decimal>) -> Self {
        self.hourly_rate = rate;
        self
    }

    /// Materializes the draft with repository-assigned identity and timestamps.
    pub fn into_entry(self, id: EntryId, now: DateTime<Utc>) -> TimeEntry {
        TimeEntry {
            id,
            user_id: self.user_id,
            project_id: self.project_id,
            task_id: self.task_id,
            price_item_id: self.price_item_id,
            hourly_rate: self.hourly_rate,
            hours: self.hours,
            note: self.note,
            date: self.date,
            is_active: self.is_active,
            timer_started_at: self.timer_started_at,
            timer_seconds: self.timer_seconds,
            created_at: now,
            updated_at: now,
        }
    }
}

/// Change to the timer start timestamp in a patch.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum TimerStart {
    #[default]
    Unchanged,
    Set(DateTime<Utc>),
    Cleared,
}

/// Partial update of a time entry. `None` fields are left untouched.
///
/// The repository stamps `updated_at` on every patch.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EntryPatch {
    pub project_id: Option<ProjectId>,
    pub task_id: Option<TaskId>,
    pub price_item_id: Option<PriceItemId>,
    pub hours: Option<Decimal>,
    pub note: Option<String>,
    pub date: Option<NaiveDate>,
    pub is_active: Option<bool>,
    pub timer_started_at: TimerStart,
    pub timer_seconds: Option<u64>,
    /// Apply only while the entry is still running. A store that finds the
    /// entry idle rejects the patch with [`RepositoryError::NotRunning`].
    ///
    /// [`RepositoryError::NotRunning`]: crate::repository::RepositoryError::NotRunning
    pub require_active: bool,
}

impl EntryPatch {
    /// Patch that turns an entry into the running timer.
    pub fn start_timer(now: DateTime<Utc>) -> Self {
        Self {
            is_active: Some(true),
            timer_started_at: TimerStart::Set(now),
            timer_seconds: Some(0),
            ..Self::default()
        }
    }

    /// Patch that commits `hours` and clears every timer field.
    pub fn stop_timer(hours: Decimal) -> Self {
        Self {
            hours: Some(hours),
            is_active: Some(false),
            timer_started_at: TimerStart::Cleared,
            timer_seconds: Some(0),
            ..Self::default()
        }
    }

    /// Patch that only syncs the elapsed-seconds cache of a running entry.
    pub fn sync_seconds(seconds: u64) -> Self {
        Self {
            timer_seconds: Some(seconds),
            require_active: true,
            ..Self::default()
        }
    }

    /// Whether the patch may be applied to `entry` in its current state.
    pub const fn applies_to(&self, entry: &TimeEntry) -> bool {
        !self.require_active || entry.is_active
    }

    /// Returns true if the patch changes nothing.
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    /// Applies the patch in memory, stamping `updated_at`.
    pub fn apply(&self, entry: &mut TimeEntry, now: DateTime<Utc>) {
        if let Some(project_id) = &self.project_id {
            entry.project_id = project_id.clone();
        }
        if let Some(task_id) = &self.task_id {
            entry.task_id = task_id.clone();
        }
        if let Some(price_item_id) = &self.price_item_id {
            entry.price_item_id = price_item_id.clone();
        }
        if let Some(hours) = self.hours {
            entry.hours = hours;
        }
        if let Some(note) = &self.note {
            entry.note.clone_from(note);
        }
        if let Some(date) = self.date {
            entry.date = date;
        }
        if let Some(is_active) = self.is_active {
            entry.is_active = is_active;
        }
        match self.timer_started_at {
            TimerStart::Unchanged => {}
            TimerStart::Set(at) => entry.timer_started_at = Some(at),
            TimerStart::Cleared => entry.timer_started_at = None,
        }
        if let Some(seconds) = self.timer_seconds {
            entry.timer_seconds = seconds;
        }
        entry.updated_at = now;
    }
}
