//! Active timer state machine.
//!
//! Each user has at most one running stopwatch. A [`TimerEngine`] owns the
//! `Idle`/`Running` state for one user and drives every transition through
//! the [`EntryRepository`] port:
//!
//! - `start` and `create_and_start` first stop whatever else is running
//! - `tick` persists elapsed seconds while running
//! - `stop` folds elapsed time into `hours`, rounded up onto the billing grid
//!
//! The store has no multi-record transactions, so the implicit stop and the
//! start are two awaited writes. Another process may briefly observe two
//! active entries; [`TimerState::from_entries`] resolves that to the most
//! recently started one and the next start stops the rest.

use std::fmt;
use std::time::Duration;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use thiserror::Error;
use tokio::sync::Mutex;
use tokio::time::MissedTickBehavior;

use crate::clock::{Clock, SystemClock};
use crate::entry::{EntryPatch, NewEntry, TimeEntry, TimerStart};
use crate::quantize::{round_up, seconds_to_hours};
use crate::repository::{EntryRepository, RepositoryError};
use crate::types::{EntryId, UserId};

/// Default period between ticks.
pub const DEFAULT_TICK_INTERVAL: Duration = Duration::from_secs(1);

const MIN_TICK_INTERVAL: Duration = Duration::from_millis(10);

/// The user-facing operation a failure happened in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    Start,
    Stop,
    Create,
    Update,
    Tick,
    Remove,
    Load,
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Start => "start",
            Self::Stop => "stop",
            Self::Create => "create",
            Self::Update => "update",
            Self::Tick => "tick",
            Self::Remove => "remove",
            Self::Load => "load",
        };
        write!(f, "{s}")
    }
}

/// Timer errors. Only persistence failures surface; every state/input
/// combination is otherwise a defined transition or a no-op.
#[derive(Debug, Error)]
pub enum TimerError {
    #[error("{operation} failed: {source}")]
    OperationFailed {
        operation: Operation,
        #[source]
        source: RepositoryError,
    },
}

impl TimerError {
    pub const fn operation(&self) -> Operation {
        match self {
            Self::OperationFailed { operation, .. } => *operation,
        }
    }
}

fn failed(operation: Operation) -> impl FnOnce(RepositoryError) -> TimerError {
    move |source| TimerError::OperationFailed { operation, source }
}

/// Whether a user's stopwatch is running.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum TimerState {
    #[default]
    Idle,
    Running {
        entry_id: EntryId,
        started_at: Option<DateTime<Utc>>,
    },
}

impl TimerState {
    /// Derives the state from a snapshot of entries.
    ///
    /// If several entries of the user are active (a transient window between
    /// an implicit stop and a start landing), the most recently started one
    /// is considered running.
    pub fn from_entries<'a, I>(user_id: &UserId, entries: I) -> Self
    where
        I: IntoIterator<Item = &'a TimeEntry>,
    {
        entries
            .into_iter()
            .filter(|entry| &entry.user_id == user_id && entry.is_active)
            .max_by_key(|entry| (entry.timer_started_at, entry.updated_at))
            .map_or(Self::Idle, |entry| Self::Running {
                entry_id: entry.id.clone(),
                started_at: entry.timer_started_at,
            })
    }

    pub const fn is_running(&self) -> bool {
        matches!(self, Self::Running { .. })
    }

    pub const fn entry_id(&self) -> Option<&EntryId> {
        match self {
            Self::Idle => None,
            Self::Running { entry_id, .. } => Some(entry_id),
        }
    }
}

/// Whether any timer of the user is active in this snapshot.
pub fn is_any_active<'a, I>(user_id: &UserId, entries: I) -> bool
where
    I: IntoIterator<Item = &'a TimeEntry>,
{
    TimerState::from_entries(user_id, entries).is_running()
}

/// Hours to display for an entry at `now`.
///
/// Idle entries show their committed hours. Running entries add the live
/// elapsed time, computed from the start timestamp when present and from the
/// last synchronized seconds otherwise. Not quantized.
pub fn live_hours(entry: &TimeEntry, now: DateTime<Utc>) -> Decimal {
    if entry.is_active {
        entry.hours + seconds_to_hours(entry.elapsed_seconds(now))
    } else {
        entry.hours
    }
}

/// Drives one user's stopwatch.
pub struct TimerEngine<R, C = SystemClock> {
    user_id: UserId,
    repo: R,
    clock: C,
    /// Held across the implicit-stop and start writes so that in-process
    /// transitions never interleave.
    state: Mutex<TimerState>,
}

impl<R, C> fmt::Debug for TimerEngine<R, C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TimerEngine")
            .field("user_id", &self.user_id)
            .finish_non_exhaustive()
    }
}

impl<R: EntryRepository> TimerEngine<R> {
    /// Creates an engine on the system clock.
    pub fn with_system_clock(user_id: UserId, repo: R) -> Self {
        Self::new(user_id, repo, SystemClock)
    }
}

impl<R: EntryRepository, C: Clock> TimerEngine<R, C> {
    pub fn new(user_id: UserId, repo: R, clock: C) -> Self {
        Self {
            user_id,
            repo,
            clock,
            state: Mutex::new(TimerState::Idle),
        }
    }

    pub const fn user_id(&self) -> &UserId {
        &self.user_id
    }

    pub const fn repository(&self) -> &R {
        &self.repo
    }

    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    /// The last known state, without reading the store.
    pub async fn state(&self) -> TimerState {
        self.state.lock().await.clone()
    }

    /// Re-derives the state from the store.
    pub async fn refresh(&self) -> Result<TimerState, TimerError> {
        let mut state = self.state.lock().await;
        let entries = self.load(Operation::Load).await?;
        *state = TimerState::from_entries(&self.user_id, &entries);
        Ok(state.clone())
    }

    /// The running entry, if any.
    pub async fn running(&self) -> Result<Option<TimeEntry>, TimerError> {
        let mut state = self.state.lock().await;
        let entries = self.load(Operation::Load).await?;
        *state = TimerState::from_entries(&self.user_id, &entries);
        let running = state.entry_id().cloned();
        Ok(running.and_then(|id| entries.into_iter().find(|entry| entry.id == id)))
    }

    /// Starts the timer on an existing entry.
    ///
    /// The entry must belong to this engine's user; anything else fails with
    /// `NotFound` before any write. Any other running entry of the user is
    /// stopped first. Starting the entry that is already running changes
    /// nothing.
    pub async fn start(&self, entry_id: &EntryId) -> Result<TimerState, TimerError> {
        let mut state = self.state.lock().await;
        let entries = self.load(Operation::Start).await?;
        *state = TimerState::from_entries(&self.user_id, &entries);

        let Some(target) = entries.iter().find(|entry| &entry.id == entry_id) else {
            tracing::debug!(%entry_id, user_id = %self.user_id, "start on unknown entry");
            return Err(TimerError::OperationFailed {
                operation: Operation::Start,
                source: RepositoryError::NotFound {
                    id: entry_id.clone(),
                },
            });
        };
        let already_running = target.is_active;

        for entry in entries
            .iter()
            .filter(|entry| entry.is_active && &entry.id != entry_id)
        {
            tracing::debug!(superseded = %entry.id, started = %entry_id, "implicit stop");
            self.commit_stop(entry, Operation::Start).await?;
        }

        if already_running {
            tracing::debug!(%entry_id, "timer already running");
            *state = TimerState::from_entries(
                &self.user_id,
                entries.iter().filter(|entry| &entry.id == entry_id),
            );
            return Ok(state.clone());
        }

        let now = self.clock.now();
        self.repo
            .patch(entry_id, EntryPatch::start_timer(now))
            .await
            .map_err(failed(Operation::Start))?;
        tracing::debug!(%entry_id, user_id = %self.user_id, "timer started");

        *state = TimerState::Running {
            entry_id: entry_id.clone(),
            started_at: Some(now),
        };
        Ok(state.clone())
    }

    /// Stops any running timer, then creates a new running entry from `draft`.
    ///
    /// The draft's hours and timer fields are replaced; the entry belongs to
    /// this engine's user.
    pub async fn create_and_start(&self, mut draft: NewEntry) -> Result<EntryId, TimerError> {
        let mut state = self.state.lock().await;
        let entries = self.load(Operation::Create).await?;
        for entry in entries.iter().filter(|entry| entry.is_active) {
            tracing::debug!(superseded = %entry.id, "implicit stop before create");
            self.commit_stop(entry, Operation::Create).await?;
        }

        let now = self.clock.now();
        if draft.user_id != self.user_id {
            tracing::warn!(
                draft_user = %draft.user_id,
                user_id = %self.user_id,
                "draft owner replaced by timer owner"
            );
            draft.user_id = self.user_id.clone();
        }
        draft.hours = Decimal::ZERO;
        draft.is_active = true;
        draft.timer_started_at = Some(now);
        draft.timer_seconds = 0;

        let entry_id = self
            .repo
            .create(draft)
            .await
            .map_err(failed(Operation::Create))?;
        tracing::debug!(%entry_id, user_id = %self.user_id, "timer entry created");

        *state = TimerState::Running {
            entry_id: entry_id.clone(),
            started_at: Some(now),
        };
        Ok(entry_id)
    }

    /// Persists the running timer's elapsed seconds.
    ///
    /// Returns the synced seconds, or `None` when nothing is running. The
    /// write only lands while the entry is still active, so a stop from
    /// another process between the read and the write also yields `None`.
    pub async fn tick(&self) -> Result<Option<u64>, TimerError> {
        let mut state = self.state.lock().await;
        let entries = self.load(Operation::Tick).await?;
        *state = TimerState::from_entries(&self.user_id, &entries);

        let Some(entry_id) = state.entry_id().cloned() else {
            return Ok(None);
        };
        let Some(entry) = entries.iter().find(|entry| entry.id == entry_id) else {
            return Ok(None);
        };
        if entries.iter().filter(|entry| entry.is_active).count() > 1 {
            tracing::warn!(running = %entry_id, "more than one active entry, awaiting reconciliation");
        }

        let elapsed = entry.elapsed_seconds(self.clock.now());
        match self
            .repo
            .patch(&entry_id, EntryPatch::sync_seconds(elapsed))
            .await
        {
            Ok(()) => {}
            Err(RepositoryError::NotRunning { .. }) => {
                tracing::debug!(%entry_id, "timer stopped before tick landed");
                *state = TimerState::Idle;
                return Ok(None);
            }
            Err(source) => return Err(failed(Operation::Tick)(source)),
        }
        tracing::trace!(%entry_id, elapsed, "timer tick");
        Ok(Some(elapsed))
    }

    /// Stops the timer on `entry_id`, committing quantized hours.
    ///
    /// Returns the committed hours, or `None` when the entry was not running.
    pub async fn stop(&self, entry_id: &EntryId) -> Result<Option<Decimal>, TimerError> {
        let mut state = self.state.lock().await;
        let entries = self.load(Operation::Stop).await?;

        let Some(entry) = entries
            .iter()
            .find(|entry| &entry.id == entry_id && entry.is_active)
        else {
            tracing::debug!(%entry_id, "stop on idle entry ignored");
            return Ok(None);
        };

        let hours = self.commit_stop(entry, Operation::Stop).await?;
        *state = TimerState::from_entries(
            &self.user_id,
            entries.iter().filter(|entry| &entry.id != entry_id),
        );
        Ok(Some(hours))
    }

    /// Stops whatever is running.
    ///
    /// Every active entry of the user is stopped; the one considered running
    /// is returned with its committed hours.
    pub async fn stop_running(&self) -> Result<Option<(EntryId, Decimal)>, TimerError> {
        let mut state = self.state.lock().await;
        let entries = self.load(Operation::Stop).await?;
        let running = TimerState::from_entries(&self.user_id, &entries);

        let mut stopped = None;
        for entry in entries.iter().filter(|entry| entry.is_active) {
            let hours = self.commit_stop(entry, Operation::Stop).await?;
            if running.entry_id() == Some(&entry.id) {
                stopped = Some((entry.id.clone(), hours));
            }
        }

        *state = TimerState::Idle;
        Ok(stopped)
    }

    /// Applies a manual edit.
    ///
    /// Timer fields are owned by the state machine and are dropped from the
    /// patch. Hours are stored as given; callers quantize user input first.
    pub async fn update(&self, entry_id: &EntryId, mut patch: EntryPatch) -> Result<(), TimerError> {
        let _state = self.state.lock().await;
        patch.is_active = None;
        patch.timer_started_at = TimerStart::Unchanged;
        patch.timer_seconds = None;
        self.repo
            .patch(entry_id, patch)
            .await
            .map_err(failed(Operation::Update))?;
        tracing::debug!(%entry_id, "entry updated");
        Ok(())
    }

    /// Deletes an entry. Removing the running entry leaves the timer idle.
    pub async fn remove(&self, entry_id: &EntryId) -> Result<(), TimerError> {
        let mut state = self.state.lock().await;
        self.repo
            .remove(entry_id)
            .await
            .map_err(failed(Operation::Remove))?;
        if state.entry_id() == Some(entry_id) {
            *state = TimerState::Idle;
        }
        tracing::debug!(%entry_id, "entry removed");
        Ok(())
    }

    /// Loads the user's entries.
    async fn load(&self, operation: Operation) -> Result<Vec<TimeEntry>, TimerError> {
        let mut entries = self
            .repo
            .entries(&self.user_id)
            .await
            .map_err(failed(operation))?;
        entries.retain(|entry| entry.user_id == self.user_id);
        Ok(entries)
    }

    /// Folds elapsed time into hours and clears the timer fields.
    async fn commit_stop(
        &self,
        entry: &TimeEntry,
        operation: Operation,
    ) -> Result<Decimal, TimerError> {
        let elapsed = entry.elapsed_seconds(self.clock.now());
        let hours = round_up(entry.hours + seconds_to_hours(elapsed));
        self.repo
            .patch(&entry.id, EntryPatch::stop_timer(hours))
            .await
            .map_err(failed(operation))?;
        tracing::info!(entry_id = %entry.id, elapsed, %hours, "timer stopped");
        Ok(hours)
    }
}

/// Ticks the engine on a fixed period while a timer is running.
///
/// Returns the number of ticks as soon as the user has no running timer.
pub async fn run_ticker<R: EntryRepository, C: Clock>(
    engine: &TimerEngine<R, C>,
    period: Duration,
) -> Result<u64, TimerError> {
    let mut interval = tokio::time::interval(period.max(MIN_TICK_INTERVAL));
    interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

    let mut ticks = 0;
    loop {
        interval.tick().await;
        if engine.tick().await?.is_none() {
            tracing::debug!(ticks, "no running timer, ticker stopped");
            return Ok(ticks);
        }
        ticks += 1;
    }
}
