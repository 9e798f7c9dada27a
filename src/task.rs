//! Task data structure and related functionality.
//!
//! This module defines the core `Task` struct that represents a single work item
//! with its descriptive fields, per-instance state, and the recurrence metadata
//! that ties occurrences of a series together.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::fields::*;
use crate::recurrence::RecurrenceRule;

/// A comment left on a single task occurrence.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Comment {
    pub author: Option<String>,
    pub body: String,
    pub created_at: DateTime<Utc>,
}

/// A work item, optionally one occurrence of a recurring series.
///
/// The first occurrence of a series is its root and has no `series_id`; every
/// later occurrence points back at the root rather than at its predecessor.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Task {
    pub id: Uuid,
    pub title: String,
    pub description: Option<String>,
    pub assignee: Option<String>,
    pub tags: Vec<String>,
    #[serde(default)]
    pub kind: Kind,
    pub priority: Option<Priority>,
    pub status: Status,
    pub start_date: Option<DateTime<Utc>>,
    pub due: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub comments: Vec<Comment>,
    #[serde(default)]
    pub is_recurring: bool,
    #[serde(default, rename = "recurrencePattern")]
    pub recurrence: Option<RecurrenceRule>,
    #[serde(default)]
    pub series_id: Option<Uuid>,
    #[serde(default)]
    pub occurrence: u32,
    pub created_at_utc: i64,
    pub updated_at_utc: i64,
}

impl Task {
    /// A fresh open task with only a title.
    pub fn new(title: impl Into<String>, now: DateTime<Utc>) -> Self {
        Task {
            id: Uuid::new_v4(),
            title: title.into(),
            description: None,
            assignee: None,
            tags: Vec::new(),
            kind: Kind::Regular,
            priority: None,
            status: Status::Open,
            start_date: None,
            due: None,
            completed_at: None,
            comments: Vec::new(),
            is_recurring: false,
            recurrence: None,
            series_id: None,
            occurrence: 0,
            created_at_utc: now.timestamp(),
            updated_at_utc: now.timestamp(),
        }
    }

    /// Turn this task into the root of a recurring series.
    pub fn with_recurrence(mut self, rule: RecurrenceRule) -> Self {
        self.kind = Kind::Recurring;
        self.is_recurring = true;
        self.recurrence = Some(rule);
        self
    }

    /// Identifier of the series this task belongs to (its own id for a root).
    pub fn series_root(&self) -> Uuid {
        self.series_id.unwrap_or(self.id)
    }

    pub fn belongs_to_series(&self, root: Uuid) -> bool {
        self.series_root() == root && (self.recurrence.is_some() || self.series_id.is_some())
    }

    /// Rule of a still-active series, if any.
    pub fn active_rule(&self) -> Option<&RecurrenceRule> {
        if self.is_recurring {
            self.recurrence.as_ref()
        } else {
            None
        }
    }

    /// Date the next occurrence is anchored on when using the scheduled date.
    pub fn scheduled_date(&self) -> Option<DateTime<Utc>> {
        self.due.or(self.start_date)
    }

    pub fn short_id(&self) -> String {
        self.id.simple().to_string()[..8].to_string()
    }
}
