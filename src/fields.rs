//! Enumerations and field types for task management.
//!
//! This module defines the structured data types used to categorise tasks and to
//! describe how a recurring series repeats: task kinds, priorities, status values,
//! the anchor a recurrence is computed from, and the repeat modes offered on the CLI.

use clap::ValueEnum;
use serde::{Deserialize, Serialize};

/// Task variants supported by an organisation's workspace.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, ValueEnum, PartialEq, Eq, Default)]
#[serde(rename_all = "kebab-case")]
pub enum Kind {
    #[default]
    #[serde(alias = "Regular")]
    Regular,
    #[serde(alias = "Recurring")]
    Recurring,
    #[serde(alias = "Milestone")]
    Milestone,
    #[serde(alias = "Approval")]
    Approval,
}

/// Priority classification for task importance.
#[derive(
    Debug, Clone, Copy, Serialize, Deserialize, ValueEnum, PartialEq, Eq, PartialOrd, Ord, Hash,
)]
#[serde(rename_all = "kebab-case")]
pub enum Priority {
    Low,
    Medium,
    High,
    Urgent,
}

/// Task lifecycle status.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, ValueEnum, PartialEq, Eq, Default)]
#[serde(rename_all = "kebab-case")]
pub enum Status {
    #[default]
    #[serde(alias = "Open")]
    Open,
    #[serde(alias = "InProgress")]
    InProgress,
    #[serde(alias = "InReview")]
    InReview,
    #[serde(alias = "Done")]
    Done,
    #[serde(alias = "Cancelled")]
    Cancelled,
}

impl Status {
    /// Whether the task still counts as outstanding work.
    pub fn is_open(self) -> bool {
        matches!(self, Status::Open | Status::InProgress | Status::InReview)
    }
}

/// Which date the next occurrence of a series is computed from.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, ValueEnum, PartialEq, Eq, Default)]
#[serde(rename_all = "camelCase")]
pub enum AnchorField {
    /// The occurrence's scheduled due (or start) date.
    #[default]
    StartDate,
    /// The moment the occurrence was actually completed.
    CompletionDate,
}

/// Repeat modes accepted by `--repeat`.
#[derive(Debug, Clone, Copy, ValueEnum, PartialEq, Eq)]
pub enum RepeatKind {
    Daily,
    Weekly,
    Monthly,
    Yearly,
    EveryNDays,
    FirstAndFifteenth,
}

/// Available sorting options for task lists.
#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum SortKey {
    Due,
    Priority,
    Created,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_open_states() {
        assert!(Status::Open.is_open());
        assert!(Status::InReview.is_open());
        assert!(!Status::Done.is_open());
        assert!(!Status::Cancelled.is_open());
    }

    #[test]
    fn test_anchor_field_wire_names() {
        assert_eq!(serde_json::to_string(&AnchorField::StartDate).unwrap(), "\"startDate\"");
        let parsed: AnchorField = serde_json::from_str("\"completionDate\"").unwrap();
        assert_eq!(parsed, AnchorField::CompletionDate);
    }

    #[test]
    fn test_priority_ordering() {
        assert!(Priority::Urgent > Priority::High);
        assert!(Priority::Low < Priority::Medium);
    }
}
