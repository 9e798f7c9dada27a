//! # TaskSetu recurring tasks
//!
//! Scheduling core for recurring tasks: given a recurrence rule and an anchor date it
//! computes the next occurrence, and given a completed occurrence it builds the next
//! one with per-instance state reset.
//!
//! ## Key Features
//!
//! - **Typed Rules**: daily, weekly (optionally on set weekdays), monthly (optionally on
//!   a fixed day, clamped to short months), yearly, every-N-days, and 1st-and-15th
//! - **End Dates**: a series stops producing occurrences on or after its end date
//! - **Anchoring**: next dates count from the scheduled date or from actual completion
//! - **Idempotent Generation**: completion and the generation job never create two
//!   occurrences for the same period of a series
//! - **Local File Storage**: tasks live in a JSON file, settings in a JSON config
//!
//! ## Quick Start
//!
//! ```bash
//! # A task due every other Monday and Thursday
//! tasksetu add "Payroll review" --repeat weekly --interval 2 --on mon,thu --due 2025-10-16
//!
//! # Preview a rule without storing anything
//! tasksetu next --repeat monthly --day-of-month 31 --from 2025-01-31
//!
//! # Complete an occurrence; the next one is scheduled automatically
//! tasksetu complete "Payroll review"
//! ```
//!
//! All date arithmetic happens on UTC calendar dates.

pub mod cli;
pub mod cmd;
pub mod config;
pub mod db;
pub mod fields;
pub mod occurrence;
pub mod recurrence;
pub mod series;
pub mod task;

pub use occurrence::create_next_recurring_occurrence;
pub use recurrence::{calculate_next_due_date, RecurrenceError, RecurrenceRule};
