//! Core domain logic for billable time.
//!
//! This crate contains the engine behind timers and budgets:
//! - Quantization: parsing duration input and rounding up onto the billing grid
//! - Pricing: resolving customer or default rate tables and looking up rates
//! - Valuation: turning entries into money and comparing against a budget
//! - Timer: the one-running-stopwatch-per-user state machine
//!
//! Storage is reached only through the [`EntryRepository`] and
//! [`CatalogPort`] traits.

mod clock;
pub mod entry;
pub mod pricing;
pub mod quantize;
mod repository;
pub mod timer;
pub mod types;
pub mod valuation;

pub use clock::{Clock, ManualClock, SystemClock};
pub use entry::{EntryPatch, NewEntry, TimeEntry, TimerStart};
pub use pricing::{
    CatalogError, CatalogPort, PriceItem, Project, RateLookup, RateTable, effective_rate,
    find_rate, lookup_rate, resolve_for_customer, resolve_rate_table,
};
pub use quantize::{
    GRID_MINUTES, format_for_display, parse_and_quantize, parse_duration, round_up,
    round_up_to_grid,
};
pub use repository::{EntryRepository, RepositoryError};
pub use timer::{
    DEFAULT_TICK_INTERVAL, Operation, TimerEngine, TimerError, TimerState, is_any_active,
    live_hours, run_ticker,
};
pub use types::{
    CustomerId, EntryId, PriceItemId, ProjectId, TaskId, UserId, ValidationError,
};
pub use valuation::{UsageResult, compute_usage, entry_value, total_hours};
