//! Series bookkeeping on top of the occurrence constructor.
//!
//! These functions mutate an in-memory `Database` only; the command layer decides
//! when to save. Generation is idempotent: a series never gets two occurrences
//! for the same period, however often completion or generation runs.

use chrono::{DateTime, Duration, Utc};
use thiserror::Error;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::config::Config;
use crate::db::{Database, StoreError};
use crate::fields::{AnchorField, Status};
use crate::occurrence::{create_next_recurring_occurrence, spawn_occurrence};
use crate::recurrence::RecurrenceError;

#[derive(Debug, Error)]
pub enum SeriesError {
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error(transparent)]
    Recurrence(#[from] RecurrenceError),
    #[error("task {0} is not open")]
    NotOpen(Uuid),
}

/// What completing a task did to its series.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CompletionOutcome {
    /// The task was not part of an active series.
    Completed,
    /// A new occurrence was added.
    Scheduled { id: Uuid, due: DateTime<Utc> },
    /// The following occurrence already existed, nothing was added.
    AlreadyScheduled,
    /// The end date was reached and the series was closed.
    SeriesEnded,
}

/// What skipping an occurrence did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipOutcome {
    Rescheduled(DateTime<Utc>),
    /// The following date was already taken by another occurrence.
    Cancelled,
    SeriesEnded,
}

fn not_found(id: Uuid) -> StoreError {
    StoreError::NotFound(format!("Task {id} not found"))
}

/// Mark a task done and, for a recurring task, add its successor.
///
/// Completing an already completed task keeps its original completion time and only
/// makes sure the successor exists.
pub fn complete_task(
    db: &mut Database,
    id: Uuid,
    at: DateTime<Utc>,
    config: &Config,
) -> Result<CompletionOutcome, SeriesError> {
    let task = db.get_mut(id).ok_or_else(|| not_found(id))?;
    if task.status != Status::Done {
        task.status = Status::Done;
        task.completed_at = Some(at);
        task.updated_at_utc = at.timestamp();
    }
    let completed_at = task.completed_at.unwrap_or(at);
    let source = task.clone();

    if source.active_rule().is_none() {
        return Ok(CompletionOutcome::Completed);
    }
    let root = source.series_root();
    if db.has_successor(&source) {
        debug!(task = %id, series = %root, "successor already generated");
        return Ok(CompletionOutcome::AlreadyScheduled);
    }

    match create_next_recurring_occurrence(&source, completed_at, config)? {
        None => {
            let closed = db.close_series(root, at);
            info!(series = %root, closed, "recurring series reached its end date");
            Ok(CompletionOutcome::SeriesEnded)
        }
        Some(next) => {
            let due = next.due.unwrap_or(completed_at);
            if db.has_occurrence_on(root, due) {
                debug!(series = %root, %due, "occurrence for this date already exists");
                return Ok(CompletionOutcome::AlreadyScheduled);
            }
            let next_id = next.id;
            info!(series = %root, task = %next_id, %due, "scheduled next occurrence");
            db.tasks.push(next);
            Ok(CompletionOutcome::Scheduled { id: next_id, due })
        }
    }
}

/// Materialise occurrences of every active series due within `horizon_days` of `now`.
///
/// Series anchored on completion are left alone, since their next date depends on
/// when the current occurrence gets done. Returns the ids of created occurrences.
pub fn generate_upcoming(
    db: &mut Database,
    now: DateTime<Utc>,
    horizon_days: u32,
    config: &Config,
) -> Result<Vec<Uuid>, SeriesError> {
    let horizon = Duration::try_days(horizon_days.into())
        .and_then(|span| now.checked_add_signed(span))
        .ok_or(RecurrenceError::DateOutOfRange(now.date_naive()))?;
    let mut created = Vec::new();

    for root in db.active_series() {
        let Some(mut latest) = db.latest_in_series(root).cloned() else {
            continue;
        };
        let Some(rule) = latest.active_rule().cloned() else {
            continue;
        };
        if rule.anchor == AnchorField::CompletionDate {
            debug!(series = %root, "skipping completion-anchored series");
            continue;
        }
        let Some(mut cursor) = latest.scheduled_date() else {
            warn!(series = %root, "latest occurrence has no date to anchor on");
            continue;
        };

        while let Some(due) = rule.next_after(cursor)? {
            if due > horizon {
                break;
            }
            if !db.has_occurrence_on(root, due) {
                let next = spawn_occurrence(&latest, due, now, config);
                debug!(series = %root, task = %next.id, %due, "generated occurrence");
                created.push(next.id);
                latest = next.clone();
                db.tasks.push(next);
            }
            cursor = due;
        }
    }

    if !created.is_empty() {
        info!(count = created.len(), "generated upcoming occurrences");
    }
    Ok(created)
}

/// Push an open occurrence to the following date of its series.
pub fn skip_occurrence(
    db: &mut Database,
    id: Uuid,
    now: DateTime<Utc>,
) -> Result<SkipOutcome, SeriesError> {
    let task = db.get(id).ok_or_else(|| not_found(id))?;
    if !task.status.is_open() {
        return Err(SeriesError::NotOpen(id));
    }
    let rule = task.active_rule().ok_or(RecurrenceError::NotRecurring(id))?;
    let reference = task.scheduled_date().ok_or(RecurrenceError::MissingAnchor(id))?;
    let root = task.series_root();
    let next = rule.next_after(reference)?;

    let outcome = match next {
        Some(due) if !db.has_occurrence_on(root, due) => SkipOutcome::Rescheduled(due),
        Some(_) => SkipOutcome::Cancelled,
        None => SkipOutcome::SeriesEnded,
    };

    let task = db.get_mut(id).ok_or_else(|| not_found(id))?;
    task.updated_at_utc = now.timestamp();
    match outcome {
        SkipOutcome::Rescheduled(due) => task.due = Some(due),
        SkipOutcome::Cancelled => task.status = Status::Cancelled,
        SkipOutcome::SeriesEnded => {
            task.status = Status::Cancelled;
            db.close_series(root, now);
            info!(series = %root, "skipped the final occurrence, series closed");
        }
    }
    Ok(outcome)
}

/// Stop a series from producing further occurrences. Returns how many tasks changed.
pub fn stop_series(db: &mut Database, id: Uuid, now: DateTime<Utc>) -> Result<usize, SeriesError> {
    let task = db.get(id).ok_or_else(|| not_found(id))?;
    if task.recurrence.is_none() && task.series_id.is_none() {
        return Err(RecurrenceError::NotRecurring(id).into());
    }
    let root = task.series_root();
    let changed = db.close_series(root, now);
    info!(series = %root, changed, "stopped recurring series");
    Ok(changed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::num::NonZeroU32;

    use chrono::{NaiveDate, TimeZone};

    use crate::recurrence::{Frequency, RecurrenceRule};
    use crate::task::{Comment, Task};

    fn at(y: i32, m: u32, d: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, m, d, 10, 0, 0).unwrap()
    }

    fn db_with(rule: RecurrenceRule, due: DateTime<Utc>) -> (Database, Uuid) {
        let mut task = Task::new("Backup check", at(2025, 10, 1)).with_recurrence(rule);
        task.due = Some(due);
        let id = task.id;
        (Database { tasks: vec![task] }, id)
    }

    fn weekly() -> RecurrenceRule {
        RecurrenceRule::new(Frequency::Weekly { interval: NonZeroU32::MIN, days: None })
    }

    #[test]
    fn test_complete_schedules_successor() {
        let (mut db, id) = db_with(weekly(), at(2025, 10, 15));
        db.get_mut(id).unwrap().comments.push(Comment {
            author: None,
            body: "checked".into(),
            created_at: at(2025, 10, 15),
        });

        let outcome = complete_task(&mut db, id, at(2025, 10, 15), &Config::default()).unwrap();
        let CompletionOutcome::Scheduled { id: next_id, due } = outcome else {
            panic!("expected a scheduled occurrence, got {outcome:?}");
        };
        assert_eq!(due, at(2025, 10, 22));

        let source = db.get(id).unwrap();
        assert_eq!(source.status, Status::Done);
        assert_eq!(source.completed_at, Some(at(2025, 10, 15)));
        assert_eq!(source.comments.len(), 1);

        let next = db.get(next_id).unwrap();
        assert_eq!(next.status, Status::Open);
        assert!(next.comments.is_empty());
        assert_eq!(next.series_id, Some(id));
    }

    #[test]
    fn test_repeated_completion_does_not_duplicate() {
        let (mut db, id) = db_with(weekly(), at(2025, 10, 15));
        let config = Config::default();
        complete_task(&mut db, id, at(2025, 10, 15), &config).unwrap();

        let again = complete_task(&mut db, id, at(2025, 10, 16), &config).unwrap();
        assert_eq!(again, CompletionOutcome::AlreadyScheduled);
        assert_eq!(db.tasks.len(), 2);
        assert_eq!(db.get(id).unwrap().completed_at, Some(at(2025, 10, 15)));
    }

    #[test]
    fn test_completion_at_end_closes_series() {
        let rule = weekly().until(NaiveDate::from_ymd_opt(2025, 10, 20).unwrap());
        let (mut db, id) = db_with(rule, at(2025, 10, 15));

        let outcome = complete_task(&mut db, id, at(2025, 10, 15), &Config::default()).unwrap();
        assert_eq!(outcome, CompletionOutcome::SeriesEnded);
        assert_eq!(db.tasks.len(), 1);
        assert!(!db.get(id).unwrap().is_recurring);
        assert!(db.active_series().is_empty());
    }

    #[test]
    fn test_completing_plain_task() {
        let mut task = Task::new("Call vendor", at(2025, 10, 1));
        task.due = Some(at(2025, 10, 2));
        let id = task.id;
        let mut db = Database { tasks: vec![task] };

        let outcome = complete_task(&mut db, id, at(2025, 10, 2), &Config::default()).unwrap();
        assert_eq!(outcome, CompletionOutcome::Completed);
        assert_eq!(db.tasks.len(), 1);
    }

    #[test]
    fn test_generate_fills_horizon_once() {
        let (mut db, root) = db_with(weekly(), at(2025, 10, 15));
        let config = Config::default();

        let created = generate_upcoming(&mut db, at(2025, 10, 15), 21, &config).unwrap();
        let dues: Vec<_> = created.iter().map(|id| db.get(*id).unwrap().due.unwrap()).collect();
        assert_eq!(dues, vec![at(2025, 10, 22), at(2025, 10, 29), at(2025, 11, 5)]);
        let indices: Vec<u32> = db.series(root).iter().map(|t| t.occurrence).collect();
        assert_eq!(indices, vec![0, 1, 2, 3]);

        let again = generate_upcoming(&mut db, at(2025, 10, 15), 21, &config).unwrap();
        assert!(again.is_empty());
        assert_eq!(db.tasks.len(), 4);

        // completing the root must not add a duplicate of the pre-generated occurrence
        let outcome = complete_task(&mut db, root, at(2025, 10, 15), &config).unwrap();
        assert_eq!(outcome, CompletionOutcome::AlreadyScheduled);
        assert_eq!(db.tasks.len(), 4);
    }

    #[test]
    fn test_generate_rejects_horizon_past_calendar_range() {
        let rule = RecurrenceRule::new(Frequency::Yearly { interval: NonZeroU32::MIN });
        let (mut db, _) = db_with(rule, at(2025, 10, 15));

        let err = generate_upcoming(&mut db, at(2025, 10, 15), u32::MAX, &Config::default()).unwrap_err();
        assert!(matches!(err, SeriesError::Recurrence(RecurrenceError::DateOutOfRange(_))));
        assert_eq!(db.tasks.len(), 1);
    }

    #[test]
    fn test_generate_skips_completion_anchored_series() {
        let rule = weekly().anchored_on(AnchorField::CompletionDate);
        let (mut db, _) = db_with(rule, at(2025, 10, 15));
        let created = generate_upcoming(&mut db, at(2025, 10, 15), 30, &Config::default()).unwrap();
        assert!(created.is_empty());
    }

    #[test]
    fn test_skip_moves_due_date() {
        let (mut db, id) = db_with(weekly(), at(2025, 10, 15));
        let outcome = skip_occurrence(&mut db, id, at(2025, 10, 14)).unwrap();
        assert_eq!(outcome, SkipOutcome::Rescheduled(at(2025, 10, 22)));
        assert_eq!(db.get(id).unwrap().due, Some(at(2025, 10, 22)));
    }

    #[test]
    fn test_skip_final_occurrence_ends_series() {
        let rule = weekly().until(NaiveDate::from_ymd_opt(2025, 10, 20).unwrap());
        let (mut db, id) = db_with(rule, at(2025, 10, 15));
        let outcome = skip_occurrence(&mut db, id, at(2025, 10, 14)).unwrap();
        assert_eq!(outcome, SkipOutcome::SeriesEnded);
        let task = db.get(id).unwrap();
        assert_eq!(task.status, Status::Cancelled);
        assert!(!task.is_recurring);
    }

    #[test]
    fn test_skip_rejects_completed_occurrence() {
        let (mut db, id) = db_with(weekly(), at(2025, 10, 15));
        db.get_mut(id).unwrap().status = Status::Done;
        assert!(matches!(
            skip_occurrence(&mut db, id, at(2025, 10, 14)),
            Err(SeriesError::NotOpen(_))
        ));
    }

    #[test]
    fn test_stop_series_closes_all_occurrences() {
        let (mut db, root) = db_with(weekly(), at(2025, 10, 15));
        generate_upcoming(&mut db, at(2025, 10, 15), 14, &Config::default()).unwrap();
        let last = db.latest_in_series(root).unwrap().id;

        assert_eq!(stop_series(&mut db, last, at(2025, 10, 16)).unwrap(), 3);
        assert!(db.active_series().is_empty());
        let outcome = complete_task(&mut db, last, at(2025, 10, 30), &Config::default()).unwrap();
        assert_eq!(outcome, CompletionOutcome::Completed);
    }

    #[test]
    fn test_stop_rejects_plain_task() {
        let task = Task::new("One-off", at(2025, 10, 1));
        let id = task.id;
        let mut db = Database { tasks: vec![task] };
        assert!(matches!(
            stop_series(&mut db, id, at(2025, 10, 1)),
            Err(SeriesError::Recurrence(RecurrenceError::NotRecurring(_)))
        ));
    }
}
