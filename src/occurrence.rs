//! Construction of the next occurrence of a recurring series.
//!
//! Nothing in here persists anything: callers decide whether the returned task is
//! stored, and are responsible for closing out a series once `None` comes back.

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::config::Config;
use crate::fields::AnchorField;
use crate::recurrence::{calculate_next_due_date, RecurrenceError};
use crate::task::Task;

/// Build the occurrence that follows `source` once it has been completed at `completed_at`.
///
/// Returns `Ok(None)` when the series has reached its end date.
pub fn create_next_recurring_occurrence(
    source: &Task,
    completed_at: DateTime<Utc>,
    config: &Config,
) -> Result<Option<Task>, RecurrenceError> {
    let rule = source
        .active_rule()
        .ok_or(RecurrenceError::NotRecurring(source.id))?;

    let reference = match rule.anchor {
        AnchorField::StartDate => source
            .scheduled_date()
            .ok_or(RecurrenceError::MissingAnchor(source.id))?,
        AnchorField::CompletionDate => completed_at,
    };

    let Some(due) = calculate_next_due_date(rule, reference, None, Some(completed_at))? else {
        return Ok(None);
    };
    Ok(Some(spawn_occurrence(source, due, completed_at, config)))
}

/// Copy the descriptive fields of `source` into a fresh occurrence due at `due`.
pub fn spawn_occurrence(
    source: &Task,
    due: DateTime<Utc>,
    created_at: DateTime<Utc>,
    config: &Config,
) -> Task {
    Task {
        id: Uuid::new_v4(),
        title: source.title.clone(),
        description: source.description.clone(),
        assignee: source.assignee.clone(),
        tags: source.tags.clone(),
        kind: source.kind,
        priority: source.priority,
        status: config.default_open_status,
        start_date: None,
        due: Some(due),
        completed_at: None,
        comments: Vec::new(),
        is_recurring: source.is_recurring,
        recurrence: source.recurrence.clone(),
        series_id: Some(source.series_root()),
        occurrence: source.occurrence + 1,
        created_at_utc: created_at.timestamp(),
        updated_at_utc: created_at.timestamp(),
    }
}
