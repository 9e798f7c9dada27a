//! Database operations and utility functions for task management.
//!
//! This module provides the `Database` struct for storing tasks and looking up the
//! occurrences of a recurring series, along with helpers for date parsing,
//! formatting, and identifier resolution.

use std::fs::{self, File};
use std::io::Write;
use std::path::Path;

use chrono::{DateTime, Duration, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;
use uuid::Uuid;

use crate::fields::*;
use crate::task::Task;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("failed to access {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse {path}: {source}")]
    Parse {
        path: String,
        #[source]
        source: serde_json::Error,
    },
    #[error("{0}")]
    NotFound(String),
    #[error("{0}")]
    Ambiguous(String),
}

impl StoreError {
    fn io(path: &Path, source: std::io::Error) -> Self {
        StoreError::Io { path: path.display().to_string(), source }
    }
}

/// In-memory database for storing and managing tasks.
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct Database {
    pub tasks: Vec<Task>,
}

impl Database {
    /// Load database from JSON file, creating a new empty database if the file doesn't exist.
    ///
    /// An unreadable or malformed file is an error rather than a fresh start, so a
    /// bad recurrence rule never silently wipes the store.
    pub fn load(path: &Path) -> Result<Self, StoreError> {
        if !path.exists() {
            debug!(path = %path.display(), "no database yet, starting empty");
            return Ok(Database::default());
        }
        let buf = fs::read_to_string(path).map_err(|e| StoreError::io(path, e))?;
        serde_json::from_str(&buf).map_err(|source| StoreError::Parse {
            path: path.display().to_string(),
            source,
        })
    }

    /// Save database to JSON file using atomic write (temp file + rename).
    pub fn save(&self, path: &Path) -> Result<(), StoreError> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|e| StoreError::io(parent, e))?;
        }
        let tmp = path.with_extension("json.tmp");
        let data = serde_json::to_string_pretty(self).map_err(|source| StoreError::Parse {
            path: path.display().to_string(),
            source,
        })?;
        let mut f = File::create(&tmp).map_err(|e| StoreError::io(&tmp, e))?;
        f.write_all(data.as_bytes()).map_err(|e| StoreError::io(&tmp, e))?;
        f.flush().map_err(|e| StoreError::io(&tmp, e))?;
        fs::rename(&tmp, path).map_err(|e| StoreError::io(path, e))?;
        Ok(())
    }

    /// Get a task by ID.
    pub fn get(&self, id: Uuid) -> Option<&Task> {
        self.tasks.iter().find(|t| t.id == id)
    }

    /// Get a mutable reference to a task by ID.
    pub fn get_mut(&mut self, id: Uuid) -> Option<&mut Task> {
        self.tasks.iter_mut().find(|t| t.id == id)
    }

    /// All occurrences of a series, ordered by occurrence index.
    pub fn series(&self, root: Uuid) -> Vec<&Task> {
        let mut tasks: Vec<&Task> = self.tasks.iter().filter(|t| t.belongs_to_series(root)).collect();
        tasks.sort_by_key(|t| t.occurrence);
        tasks
    }

    /// Most recent occurrence of a series.
    pub fn latest_in_series(&self, root: Uuid) -> Option<&Task> {
        self.tasks
            .iter()
            .filter(|t| t.belongs_to_series(root))
            .max_by_key(|t| t.occurrence)
    }

    /// Roots of every series that is still generating occurrences.
    pub fn active_series(&self) -> Vec<Uuid> {
        let mut roots: Vec<Uuid> = self
            .tasks
            .iter()
            .filter(|t| t.active_rule().is_some())
            .map(|t| t.series_root())
            .collect();
        roots.sort();
        roots.dedup();
        roots
    }

    /// Whether an occurrence after `task` already exists in its series.
    pub fn has_successor(&self, task: &Task) -> bool {
        let root = task.series_root();
        self.tasks
            .iter()
            .any(|t| t.belongs_to_series(root) && t.occurrence > task.occurrence)
    }

    /// Whether the series already has an occurrence due on the same calendar day.
    pub fn has_occurrence_on(&self, root: Uuid, due: DateTime<Utc>) -> bool {
        let day = due.date_naive();
        self.tasks
            .iter()
            .any(|t| t.belongs_to_series(root) && t.due.is_some_and(|d| d.date_naive() == day))
    }

    /// Mark every occurrence of a series as no longer recurring. Returns how many changed.
    pub fn close_series(&mut self, root: Uuid, now: DateTime<Utc>) -> usize {
        let mut changed = 0;
        for t in self.tasks.iter_mut().filter(|t| t.belongs_to_series(root)) {
            if t.is_recurring {
                t.is_recurring = false;
                t.updated_at_utc = now.timestamp();
                changed += 1;
            }
        }
        changed
    }
}

/// Normalize a tag string by trimming, lowercasing, and replacing spaces with hyphens.
pub fn normalise_tag(s: &str) -> String {
    s.trim().to_lowercase().replace(' ', "-")
}

/// Split comma-separated tag strings and normalize each tag.
pub fn split_and_normalise_tags(inputs: &[String]) -> Vec<String> {
    let mut tags = Vec::new();
    for raw in inputs {
        for part in raw.split(',') {
            let tag = normalise_tag(part);
            if !tag.is_empty() {
                tags.push(tag);
            }
        }
    }
    tags.sort();
    tags.dedup();
    tags
}

/// Parse human-readable date input relative to `now`, in UTC.
///
/// Supports:
/// - "today", "tomorrow", "yesterday"
/// - "in 3d", "in 2w"
/// - "YYYY-MM-DD" (midnight UTC)
/// - RFC 3339 timestamps
pub fn parse_due_input(s: &str, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
    let s = s.trim();
    let lower = s.to_lowercase();
    let today = start_of_day(now.date_naive());

    match lower.as_str() {
        "today" => return Some(today),
        "tomorrow" => return Some(today + Duration::days(1)),
        "yesterday" => return Some(today - Duration::days(1)),
        _ => {}
    }

    if let Some(rest) = lower.strip_prefix("in ") {
        if let Some(nd) = rest.strip_suffix('d') {
            if let Ok(days) = nd.trim().parse::<i64>() {
                return Duration::try_days(days).and_then(|d| today.checked_add_signed(d));
            }
        }
        if let Some(nw) = rest.strip_suffix('w') {
            if let Ok(weeks) = nw.trim().parse::<i64>() {
                return Duration::try_weeks(weeks).and_then(|d| today.checked_add_signed(d));
            }
        }
    }

    if let Ok(date) = NaiveDate::parse_from_str(s, "%Y-%m-%d") {
        return Some(start_of_day(date));
    }
    DateTime::parse_from_rfc3339(s).ok().map(|d| d.with_timezone(&Utc))
}

/// Parse a plain calendar date (`YYYY-MM-DD`).
pub fn parse_date_input(s: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(s.trim(), "%Y-%m-%d").ok()
}

pub fn start_of_day(date: NaiveDate) -> DateTime<Utc> {
    date.and_time(chrono::NaiveTime::default()).and_utc()
}

/// Format a due date relative to today ("today", "tomorrow", "in 3d", "2d late").
pub fn format_due_relative(due: Option<DateTime<Utc>>, today: NaiveDate) -> String {
    match due {
        None => "-".into(),
        Some(d) => {
            let delta = d.date_naive() - today;
            if delta.num_days() == 0 {
                "today".into()
            } else if delta.num_days() == 1 {
                "tomorrow".into()
            } else if delta.num_days() > 1 {
                format!("in {}d", delta.num_days())
            } else {
                format!("{}d late", -delta.num_days())
            }
        }
    }
}

/// Format a task kind for display.
pub fn format_kind(k: Kind) -> &'static str {
    match k {
        Kind::Regular => "Regular",
        Kind::Recurring => "Recurring",
        Kind::Milestone => "Milestone",
        Kind::Approval => "Approval",
    }
}

/// Format a priority level for display.
pub fn format_priority(p: Option<Priority>) -> &'static str {
    match p {
        Some(Priority::Low) => "Low",
        Some(Priority::Medium) => "Medium",
        Some(Priority::High) => "High",
        Some(Priority::Urgent) => "Urgent",
        None => "-",
    }
}

/// Format a task status for display.
pub fn format_status(s: Status) -> &'static str {
    match s {
        Status::Open => "Open",
        Status::InProgress => "InProgress",
        Status::InReview => "InReview",
        Status::Done => "Done",
        Status::Cancelled => "Cancelled",
    }
}

/// Print tasks in a formatted table.
pub fn print_table(tasks: &[&Task], today: NaiveDate) {
    println!(
        "{:<9} {:<10} {:<11} {:<7} {:<10} {:<6} {}",
        "ID", "Kind", "Status", "Pri", "Due", "Occ", "Title [tags]"
    );
    for t in tasks {
        let tags = if t.tags.is_empty() {
            String::new()
        } else {
            format!(" [{}]", t.tags.join(","))
        };
        let occurrence = if t.recurrence.is_some() {
            format!("#{}", t.occurrence + 1)
        } else {
            "-".into()
        };
        println!(
            "{:<9} {:<10} {:<11} {:<7} {:<10} {:<6} {}{}",
            t.short_id(),
            format_kind(t.kind),
            format_status(t.status),
            format_priority(t.priority),
            format_due_relative(t.due, today),
            occurrence,
            truncate(&t.title, 48),
            tags
        );
    }
}

/// Truncate a string to a maximum width, adding ellipsis if needed.
pub fn truncate(s: &str, width: usize) -> String {
    if s.chars().count() <= width {
        s.to_string()
    } else {
        let mut out = String::new();
        for (i, ch) in s.chars().enumerate() {
            if i + 1 >= width {
                out.push('…');
                break;
            }
            out.push(ch);
        }
        out
    }
}

/// Resolve a task identifier (full id, unique id prefix, or title) to a task ID.
/// Returns an error if the identifier matches several tasks.
pub fn resolve_task_identifier(identifier: &str, db: &Database) -> Result<Uuid, StoreError> {
    let identifier = identifier.trim();
    if let Ok(id) = Uuid::parse_str(identifier) {
        return db
            .get(id)
            .map(|t| t.id)
            .ok_or_else(|| StoreError::NotFound(format!("Task with ID {id} not found")));
    }

    let prefix = identifier.to_lowercase().replace('-', "");
    let by_prefix: Vec<&Task> = if prefix.len() >= 4 && prefix.chars().all(|c| c.is_ascii_hexdigit()) {
        db.tasks
            .iter()
            .filter(|t| t.id.simple().to_string().starts_with(&prefix))
            .collect()
    } else {
        Vec::new()
    };
    let matches = if by_prefix.is_empty() {
        db.tasks
            .iter()
            .filter(|t| t.title.to_lowercase() == identifier.to_lowercase())
            .collect()
    } else {
        by_prefix
    };

    match matches.len() {
        0 => Err(StoreError::NotFound(format!("No task found matching '{identifier}'"))),
        1 => Ok(matches[0].id),
        _ => {
            let mut error_msg = format!("Multiple tasks match '{identifier}':\n");
            for task in matches {
                error_msg.push_str(&format!(
                    "  {}: {} ({}, {})\n",
                    task.short_id(),
                    task.title,
                    format_kind(task.kind),
                    format_status(task.status)
                ));
            }
            error_msg.push_str("Please use the specific ID instead.");
            Err(StoreError::Ambiguous(error_msg))
        }
    }
}
