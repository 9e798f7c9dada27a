//! Command implementations for the CLI interface.
//!
//! Each handler loads nothing itself: it receives the database and configuration,
//! delegates scheduling decisions to the `series` module, saves when something
//! changed, and prints a short report.

use std::path::Path;
use std::str::FromStr;

use chrono::{DateTime, TimeZone, Utc, Weekday};
use clap::{Args, Subcommand};
use clap_complete::{generate, Shell};
use thiserror::Error;

use crate::config::{Config, ConfigError};
use crate::db::*;
use crate::fields::*;
use crate::recurrence::{CustomPatternSpec, RecurrenceError, RecurrencePattern, RecurrenceRule};
use crate::series::{self, CompletionOutcome, SeriesError, SkipOutcome};
use crate::task::{Comment, Task};

#[derive(Debug, Error)]
pub enum CmdError {
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error(transparent)]
    Series(#[from] SeriesError),
    #[error(transparent)]
    Recurrence(#[from] RecurrenceError),
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("{0}")]
    Input(String),
}

#[derive(Subcommand)]
pub enum Commands {
    /// Add a new task, optionally recurring.
    Add {
        /// Short title for the task.
        title: String,
        /// Optional longer description.
        #[arg(long)]
        desc: Option<String>,
        /// Person responsible for the task.
        #[arg(long)]
        assignee: Option<String>,
        /// Comma-separated tags. May be repeated.
        #[arg(long = "tag")]
        tags: Vec<String>,
        /// Priority: low | medium | high | urgent.
        #[arg(long, value_enum)]
        priority: Option<Priority>,
        /// Item kind: regular | milestone | approval (recurring is implied by --repeat).
        #[arg(long, value_enum, default_value_t = Kind::Regular)]
        kind: Kind,
        /// Start date: YYYY-MM-DD, RFC 3339, "today", "tomorrow", or "in Nd".
        #[arg(long)]
        start: Option<String>,
        /// Due date, same formats as --start. Defaults from the priority if omitted.
        #[arg(long)]
        due: Option<String>,
        #[command(flatten)]
        repeat: RepeatArgs,
    },

    /// List tasks with optional filters.
    List {
        /// Include completed and cancelled tasks.
        #[arg(long)]
        all: bool,
        /// Only recurring tasks.
        #[arg(long)]
        recurring: bool,
        /// Show every occurrence of the series this task belongs to.
        #[arg(long)]
        series: Option<String>,
        /// Sort key.
        #[arg(long, value_enum, default_value_t = SortKey::Due)]
        sort: SortKey,
        /// Limit number of rows printed.
        #[arg(long)]
        limit: Option<usize>,
    },

    /// View a single task by ID, ID prefix, or title.
    View {
        id: String,
    },

    /// Add a comment to a task.
    Comment {
        id: String,
        text: String,
        #[arg(long)]
        author: Option<String>,
    },

    /// Mark a task done and schedule the next occurrence of its series.
    Complete {
        id: String,
        /// Completion time (defaults to now).
        #[arg(long)]
        at: Option<String>,
    },

    /// Preview upcoming dates for a recurrence without storing anything.
    Next {
        /// Reference date (defaults to today).
        #[arg(long)]
        from: Option<String>,
        /// Number of dates to show.
        #[arg(long, default_value_t = 5)]
        count: usize,
        #[command(flatten)]
        repeat: RepeatArgs,
    },

    /// Materialise upcoming occurrences of all active series.
    Generate {
        /// How many days ahead to generate (defaults to the configured horizon).
        #[arg(long)]
        horizon_days: Option<u32>,
    },

    /// Skip an open occurrence, moving it to the following date.
    Skip {
        id: String,
    },

    /// Stop a recurring series from producing further occurrences.
    Stop {
        id: String,
    },

    /// Generate shell completion scripts.
    Completions {
        #[arg(value_enum)]
        shell: Shell,
    },
}

/// Recurrence options shared by `add` and `next`.
#[derive(Args, Debug, Clone)]
pub struct RepeatArgs {
    /// Repeat mode: daily | weekly | monthly | yearly | every-n-days | first-and-fifteenth.
    #[arg(long, value_enum)]
    pub repeat: Option<RepeatKind>,
    /// Repeat every N days/weeks/months/years.
    #[arg(long, default_value_t = 1)]
    pub interval: i64,
    /// Weekdays for weekly repeats, names or 0=Sunday..6=Saturday. Accepts comma-separated.
    #[arg(long = "on")]
    pub on: Vec<String>,
    /// Day of month (1-31) for monthly repeats.
    #[arg(long)]
    pub day_of_month: Option<i64>,
    /// Day count for every-n-days repeats.
    #[arg(long)]
    pub every: Option<i64>,
    /// No occurrence on or after this date (YYYY-MM-DD).
    #[arg(long)]
    pub until: Option<String>,
    /// Compute the next date from the scheduled date or the completion time.
    #[arg(long, value_enum, default_value_t = AnchorField::StartDate)]
    pub anchor: AnchorField,
}

impl RepeatArgs {
    /// Build a validated rule, or `None` when `--repeat` wasn't given.
    pub fn to_rule(&self) -> Result<Option<RecurrenceRule>, CmdError> {
        let Some(kind) = self.repeat else {
            if !self.on.is_empty()
                || self.day_of_month.is_some()
                || self.every.is_some()
                || self.until.is_some()
            {
                return Err(CmdError::Input("recurrence options require --repeat".into()));
            }
            return Ok(None);
        };

        let mut pattern = match kind {
            RepeatKind::Daily => RecurrencePattern::new("daily"),
            RepeatKind::Weekly => RecurrencePattern::new("weekly"),
            RepeatKind::Monthly => RecurrencePattern::new("monthly"),
            RepeatKind::Yearly => RecurrencePattern::new("yearly"),
            RepeatKind::EveryNDays => {
                let days = self
                    .every
                    .ok_or_else(|| CmdError::Input("--repeat every-n-days requires --every".into()))?;
                let mut p = RecurrencePattern::new("custom");
                p.custom_pattern = Some(CustomPatternSpec::EveryNDays { days });
                p
            }
            RepeatKind::FirstAndFifteenth => {
                let mut p = RecurrencePattern::new("custom");
                p.custom_pattern = Some(CustomPatternSpec::FirstAndFifteenth);
                p
            }
        };
        pattern.interval = self.interval;
        if !self.on.is_empty() {
            pattern.days_of_week = Some(parse_weekdays(&self.on)?);
        }
        pattern.day_of_month = self.day_of_month;
        if let Some(until) = &self.until {
            let end = parse_date_input(until)
                .ok_or_else(|| CmdError::Input(format!("Could not parse --until '{until}'")))?;
            pattern.end_date = Some(end);
        }
        pattern.anchor_field = self.anchor;
        Ok(Some(RecurrenceRule::try_from(pattern)?))
    }
}

/// Parse weekday names ("mon", "Friday") or indices (0 = Sunday).
pub fn parse_weekdays(inputs: &[String]) -> Result<Vec<i64>, CmdError> {
    let mut days = Vec::new();
    for raw in inputs {
        for part in raw.split(',').map(str::trim).filter(|p| !p.is_empty()) {
            let day = match part.parse::<i64>() {
                Ok(idx) => idx,
                Err(_) => Weekday::from_str(part)
                    .map(|w| i64::from(w.num_days_from_sunday()))
                    .map_err(|_| CmdError::Input(format!("Unknown weekday '{part}'")))?,
            };
            days.push(day);
        }
    }
    Ok(days)
}

fn parse_when(input: &str, now: DateTime<Utc>, flag: &str) -> Result<DateTime<Utc>, CmdError> {
    parse_due_input(input, now)
        .ok_or_else(|| CmdError::Input(format!("Could not parse {flag} '{input}'")))
}

fn format_instant(d: Option<DateTime<Utc>>) -> String {
    d.map(|d| d.format("%Y-%m-%d %H:%M UTC").to_string())
        .unwrap_or_else(|| "-".into())
}

pub fn cmd_add(
    db: &mut Database,
    db_path: &Path,
    config: &Config,
    title: String,
    desc: Option<String>,
    assignee: Option<String>,
    tags: Vec<String>,
    priority: Option<Priority>,
    kind: Kind,
    start: Option<String>,
    due: Option<String>,
    repeat: RepeatArgs,
) -> Result<(), CmdError> {
    let now = Utc::now();
    let rule = repeat.to_rule()?;
    if kind == Kind::Recurring && rule.is_none() {
        return Err(CmdError::Input("--kind recurring requires --repeat".into()));
    }
    let start = start.map(|s| parse_when(&s, now, "--start")).transpose()?;
    let mut due = due.map(|s| parse_when(&s, now, "--due")).transpose()?;

    if due.is_none() {
        if let Some(days) = priority.and_then(|p| config.due_days_for(p)) {
            due = parse_due_input(&format!("in {days}d"), now);
        }
    }
    if rule.is_some() && due.is_none() && start.is_none() {
        due = Some(start_of_day(now.date_naive()));
    }

    let mut task = Task::new(title, now);
    task.description = desc;
    task.assignee = assignee;
    task.tags = split_and_normalise_tags(&tags);
    task.priority = priority;
    task.kind = kind;
    task.start_date = start;
    task.due = due;
    task.status = config.default_open_status;
    if let Some(rule) = rule {
        task = task.with_recurrence(rule);
    }

    let id = task.id;
    let summary = task.recurrence.as_ref().map(|r| r.to_string());
    db.tasks.push(task);
    db.save(db_path)?;
    match summary {
        Some(summary) => println!("Added recurring task {id} ({summary})"),
        None => println!("Added task {id}"),
    }
    Ok(())
}

pub fn cmd_list(
    db: &Database,
    all: bool,
    recurring: bool,
    series: Option<String>,
    sort: SortKey,
    limit: Option<usize>,
) -> Result<(), CmdError> {
    let mut rows: Vec<&Task> = match series {
        Some(identifier) => {
            let id = resolve_task_identifier(&identifier, db)?;
            let root = db.get(id).map(|t| t.series_root()).unwrap_or(id);
            db.series(root)
        }
        None => db
            .tasks
            .iter()
            .filter(|t| all || t.status.is_open())
            .filter(|t| !recurring || t.recurrence.is_some())
            .collect(),
    };

    match sort {
        SortKey::Due => rows.sort_by_key(|t| (t.due.is_none(), t.due)),
        SortKey::Priority => rows.sort_by_key(|t| std::cmp::Reverse(t.priority)),
        SortKey::Created => rows.sort_by_key(|t| t.created_at_utc),
    }
    if let Some(n) = limit {
        rows.truncate(n);
    }

    if rows.is_empty() {
        println!("No tasks.");
        return Ok(());
    }
    print_table(&rows, Utc::now().date_naive());
    Ok(())
}

pub fn cmd_view(db: &Database, id: String) -> Result<(), CmdError> {
    let task_id = resolve_task_identifier(&id, db)?;
    let Some(task) = db.get(task_id) else {
        return Err(StoreError::NotFound(format!("Task {task_id} not found")).into());
    };
    let today = Utc::now().date_naive();
    let created = Utc
        .timestamp_opt(task.created_at_utc, 0)
        .single()
        .map(|d| d.to_rfc3339())
        .unwrap_or_else(|| "-".into());

    println!("ID:           {}", task.id);
    println!("Title:        {}", task.title);
    println!("Kind:         {}", format_kind(task.kind));
    println!("Status:       {}", format_status(task.status));
    println!("Priority:     {}", format_priority(task.priority));
    println!("Assignee:     {}", task.assignee.as_deref().unwrap_or("-"));
    println!("Start:        {}", format_instant(task.start_date));
    println!(
        "Due:          {}",
        match task.due {
            Some(d) => format!("{} ({})", format_instant(Some(d)), format_due_relative(Some(d), today)),
            None => "-".into(),
        }
    );
    println!("Completed:    {}", format_instant(task.completed_at));
    println!("Tags:         {}", if task.tags.is_empty() { "-".into() } else { task.tags.join(",") });
    println!("Created UTC:  {created}");

    if let Some(rule) = &task.recurrence {
        let root = task.series_root();
        let total = db.series(root).len();
        println!(
            "Repeats:      {rule}{}",
            if task.is_recurring { "" } else { " [stopped]" }
        );
        println!("Series:       {} (occurrence {} of {total})", root, task.occurrence + 1);
        if task.is_recurring {
            if let Some(reference) = task.scheduled_date() {
                let upcoming = rule.upcoming(reference, 3)?;
                let dates: Vec<String> = upcoming.iter().map(|d| d.date_naive().to_string()).collect();
                println!("Following:    {}", if dates.is_empty() { "-".into() } else { dates.join(", ") });
            }
        }
    }

    println!("Description:\n{}\n", task.description.as_deref().unwrap_or("-"));
    if !task.comments.is_empty() {
        println!("Comments:");
        for c in &task.comments {
            println!(
                "  [{}] {}: {}",
                c.created_at.format("%Y-%m-%d %H:%M"),
                c.author.as_deref().unwrap_or("anonymous"),
                c.body
            );
        }
    }
    Ok(())
}

pub fn cmd_comment(
    db: &mut Database,
    db_path: &Path,
    id: String,
    text: String,
    author: Option<String>,
) -> Result<(), CmdError> {
    let task_id = resolve_task_identifier(&id, db)?;
    let now = Utc::now();
    let Some(task) = db.get_mut(task_id) else {
        return Err(StoreError::NotFound(format!("Task {task_id} not found")).into());
    };
    task.comments.push(Comment { author, body: text, created_at: now });
    task.updated_at_utc = now.timestamp();
    db.save(db_path)?;
    println!("Commented on {task_id}");
    Ok(())
}

pub fn cmd_complete(
    db: &mut Database,
    db_path: &Path,
    config: &Config,
    id: String,
    at: Option<String>,
) -> Result<(), CmdError> {
    let task_id = resolve_task_identifier(&id, db)?;
    let now = Utc::now();
    let at = at.map(|s| parse_when(&s, now, "--at")).transpose()?.unwrap_or(now);

    let outcome = series::complete_task(db, task_id, at, config)?;
    db.save(db_path)?;
    match outcome {
        CompletionOutcome::Completed => println!("Marked done."),
        CompletionOutcome::Scheduled { id, due } => {
            println!("Marked done. Next occurrence {id} due {}", format_instant(Some(due)))
        }
        CompletionOutcome::AlreadyScheduled => {
            println!("Marked done. Next occurrence was already scheduled.")
        }
        CompletionOutcome::SeriesEnded => println!("Marked done. The series has ended."),
    }
    Ok(())
}

pub fn cmd_next(from: Option<String>, count: usize, repeat: RepeatArgs) -> Result<(), CmdError> {
    let now = Utc::now();
    let rule = repeat
        .to_rule()?
        .ok_or_else(|| CmdError::Input("next requires --repeat".into()))?;
    let from = from.map(|s| parse_when(&s, now, "--from")).transpose()?.unwrap_or(now);

    let dates = rule.upcoming(from, count)?;
    println!("{rule}, from {}:", from.date_naive());
    for d in &dates {
        println!("  {} ({})", d.date_naive(), d.format("%a"));
    }
    if dates.len() < count {
        println!("  (series ends)");
    }
    Ok(())
}

pub fn cmd_generate(
    db: &mut Database,
    db_path: &Path,
    config: &Config,
    horizon_days: Option<u32>,
) -> Result<(), CmdError> {
    let horizon = horizon_days.unwrap_or(config.generate_horizon_days);
    let created = series::generate_upcoming(db, Utc::now(), horizon, config)?;
    if created.is_empty() {
        println!("Nothing to generate within {horizon} days.");
        return Ok(());
    }
    db.save(db_path)?;
    println!("Generated {} occurrence(s):", created.len());
    for id in created {
        if let Some(t) = db.get(id) {
            println!("  {} - {} due {}", t.short_id(), t.title, format_instant(t.due));
        }
    }
    Ok(())
}

pub fn cmd_skip(db: &mut Database, db_path: &Path, id: String) -> Result<(), CmdError> {
    let task_id = resolve_task_identifier(&id, db)?;
    let outcome = series::skip_occurrence(db, task_id, Utc::now())?;
    db.save(db_path)?;
    match outcome {
        SkipOutcome::Rescheduled(due) => println!("Skipped. Now due {}", format_instant(Some(due))),
        SkipOutcome::Cancelled => println!("Skipped. The following occurrence already exists, this one was cancelled."),
        SkipOutcome::SeriesEnded => println!("Skipped the final occurrence. The series has ended."),
    }
    Ok(())
}

pub fn cmd_stop(db: &mut Database, db_path: &Path, id: String) -> Result<(), CmdError> {
    let task_id = resolve_task_identifier(&id, db)?;
    let changed = series::stop_series(db, task_id, Utc::now())?;
    db.save(db_path)?;
    println!("Stopped series ({changed} task(s) updated).");
    Ok(())
}

pub fn cmd_completions(shell: Shell) {
    use clap::CommandFactory;
    use crate::cli::Cli;

    let mut app = Cli::command();
    let app_name = app.get_name().to_string();
    generate(shell, &mut app, app_name, &mut std::io::stdout());
}
