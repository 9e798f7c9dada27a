//! Recurrence rules and next-due-date calculation.
//!
//! A `RecurrenceRule` is a closed tagged union over the supported frequencies, so a
//! rule that names `custom` without a pattern (or a weekly rule with no weekdays)
//! cannot be constructed. Loosely shaped rules coming from storage or the CLI arrive
//! as a `RecurrencePattern` and are validated once, on conversion.
//!
//! All calendar arithmetic happens on UTC dates. The time of day of the reference
//! instant is carried over unchanged onto the computed occurrence.

use std::fmt;
use std::num::NonZeroU32;

use chrono::{DateTime, Datelike, Days, Months, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::fields::AnchorField;

const WEEKDAY_NAMES: [&str; 7] = ["Sun", "Mon", "Tue", "Wed", "Thu", "Fri", "Sat"];

/// Errors raised while validating rules or computing occurrences.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RecurrenceError {
    #[error("invalid recurrence rule: {0}")]
    InvalidRecurrenceRule(String),
    #[error("next occurrence after {0} is outside the supported calendar range")]
    DateOutOfRange(NaiveDate),
    #[error("task {0} is not an active recurring task")]
    NotRecurring(Uuid),
    #[error("task {0} has neither a due date nor a start date to anchor on")]
    MissingAnchor(Uuid),
}

fn invalid(reason: impl Into<String>) -> RecurrenceError {
    RecurrenceError::InvalidRecurrenceRule(reason.into())
}

/// A non-empty set of weekday indices, 0 = Sunday through 6 = Saturday.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WeekdaySet(u8);

impl WeekdaySet {
    /// Build a set from weekday indices. Duplicates are folded.
    pub fn new(days: impl IntoIterator<Item = u8>) -> Result<Self, RecurrenceError> {
        let mut mask = 0u8;
        for day in days {
            if day > 6 {
                return Err(invalid(format!("weekday index {day} is outside 0..=6")));
            }
            mask |= 1 << day;
        }
        if mask == 0 {
            return Err(invalid("daysOfWeek must not be empty"));
        }
        Ok(WeekdaySet(mask))
    }

    pub fn contains(self, day: u8) -> bool {
        day < 7 && self.0 & (1 << day) != 0
    }

    /// Earliest configured weekday in a Sunday-first week.
    pub fn first(self) -> u8 {
        self.0.trailing_zeros() as u8
    }

    /// Nearest configured weekday strictly later in the same week.
    pub fn next_after(self, day: u8) -> Option<u8> {
        (day.saturating_add(1)..7).find(|d| self.contains(*d))
    }

    pub fn indices(self) -> impl Iterator<Item = u8> {
        (0..7).filter(move |d| self.contains(*d))
    }
}

/// Day of month in 1..=31, clamped to the month's length when applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DayOfMonth(u8);

impl DayOfMonth {
    pub fn new(day: u32) -> Result<Self, RecurrenceError> {
        if (1..=31).contains(&day) {
            Ok(DayOfMonth(day as u8))
        } else {
            Err(invalid(format!("dayOfMonth {day} is outside 1..=31")))
        }
    }

    pub fn get(self) -> u32 {
        u32::from(self.0)
    }
}

/// Patterns that don't fit the interval-based frequencies.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CustomPattern {
    EveryNDays(NonZeroU32),
    FirstAndFifteenth,
}

/// How often a series repeats.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Frequency {
    Daily { interval: NonZeroU32 },
    Weekly { interval: NonZeroU32, days: Option<WeekdaySet> },
    Monthly { interval: NonZeroU32, day_of_month: Option<DayOfMonth> },
    Yearly { interval: NonZeroU32 },
    Custom(CustomPattern),
}

/// A validated recurrence rule as embedded in a recurring task.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RecurrencePattern", into = "RecurrencePattern")]
pub struct RecurrenceRule {
    pub frequency: Frequency,
    /// No occurrence is produced on or after this date.
    pub end_date: Option<NaiveDate>,
    pub anchor: AnchorField,
}

impl RecurrenceRule {
    pub fn new(frequency: Frequency) -> Self {
        RecurrenceRule {
            frequency,
            end_date: None,
            anchor: AnchorField::StartDate,
        }
    }

    pub fn until(mut self, end_date: NaiveDate) -> Self {
        self.end_date = Some(end_date);
        self
    }

    pub fn anchored_on(mut self, anchor: AnchorField) -> Self {
        self.anchor = anchor;
        self
    }

    /// Next occurrence strictly after `reference`, or `None` once the series has ended.
    pub fn next_after(
        &self,
        reference: DateTime<Utc>,
    ) -> Result<Option<DateTime<Utc>>, RecurrenceError> {
        let date = self.next_date(reference.date_naive())?;
        if self.end_date.is_some_and(|end| date >= end) {
            return Ok(None);
        }
        Ok(Some(date.and_time(reference.time()).and_utc()))
    }

    /// Up to `limit` successive occurrences after `from`, stopping early at the series end.
    pub fn upcoming(
        &self,
        from: DateTime<Utc>,
        limit: usize,
    ) -> Result<Vec<DateTime<Utc>>, RecurrenceError> {
        let mut out = Vec::new();
        let mut cursor = from;
        while out.len() < limit {
            let Some(next) = self.next_after(cursor)? else {
                break;
            };
            out.push(next);
            cursor = next;
        }
        Ok(out)
    }

    fn next_date(&self, date: NaiveDate) -> Result<NaiveDate, RecurrenceError> {
        let out_of_range = || RecurrenceError::DateOutOfRange(date);
        match self.frequency {
            Frequency::Daily { interval } => add_days(date, interval.get().into()),
            Frequency::Weekly { interval, days: None } => {
                add_days(date, 7 * u64::from(interval.get()))
            }
            Frequency::Weekly { interval, days: Some(days) } => {
                let today = date.weekday().num_days_from_sunday() as u8;
                match days.next_after(today) {
                    Some(day) => add_days(date, u64::from(day - today)),
                    None => {
                        let week_start = date
                            .checked_sub_days(Days::new(today.into()))
                            .ok_or_else(out_of_range)?;
                        let offset = 7 * u64::from(interval.get()) + u64::from(days.first());
                        add_days(week_start, offset)
                    }
                }
            }
            Frequency::Monthly { interval, day_of_month: None } => add_months(date, interval.get()),
            Frequency::Monthly { interval, day_of_month: Some(dom) } => {
                let this_month = clamp_to_month(date.year(), date.month(), dom.get())
                    .ok_or_else(out_of_range)?;
                if this_month > date {
                    return Ok(this_month);
                }
                let target = add_months(first_of_month(date)?, interval.get())?;
                clamp_to_month(target.year(), target.month(), dom.get()).ok_or_else(out_of_range)
            }
            Frequency::Yearly { interval } => {
                let months = interval.get().checked_mul(12).ok_or_else(out_of_range)?;
                add_months(date, months)
            }
            Frequency::Custom(CustomPattern::EveryNDays(days)) => add_days(date, days.get().into()),
            Frequency::Custom(CustomPattern::FirstAndFifteenth) => {
                if date.day() < 15 {
                    date.with_day(15).ok_or_else(out_of_range)
                } else {
                    add_months(first_of_month(date)?, 1)
                }
            }
        }
    }
}

/// Compute the next due date for a series.
///
/// The reference is normally the occurrence's scheduled date. When the effective
/// anchor (`anchor_override`, else the rule's own) is `CompletionDate`, the
/// `completed_at` instant is used instead; without one the scheduled date is kept.
/// `Ok(None)` means the series has reached its end date.
pub fn calculate_next_due_date(
    rule: &RecurrenceRule,
    reference: DateTime<Utc>,
    anchor_override: Option<AnchorField>,
    completed_at: Option<DateTime<Utc>>,
) -> Result<Option<DateTime<Utc>>, RecurrenceError> {
    let base = match anchor_override.unwrap_or(rule.anchor) {
        AnchorField::StartDate => reference,
        AnchorField::CompletionDate => completed_at.unwrap_or(reference),
    };
    rule.next_after(base)
}

/// Number of days in the given month, or `None` if the month isn't representable.
pub fn days_in_month(year: i32, month: u32) -> Option<u32> {
    (28..=31)
        .rev()
        .find(|&day| NaiveDate::from_ymd_opt(year, month, day).is_some())
}

fn clamp_to_month(year: i32, month: u32, day: u32) -> Option<NaiveDate> {
    NaiveDate::from_ymd_opt(year, month, day.min(days_in_month(year, month)?))
}

fn first_of_month(date: NaiveDate) -> Result<NaiveDate, RecurrenceError> {
    date.with_day(1).ok_or(RecurrenceError::DateOutOfRange(date))
}

fn add_days(date: NaiveDate, days: u64) -> Result<NaiveDate, RecurrenceError> {
    date.checked_add_days(Days::new(days))
        .ok_or(RecurrenceError::DateOutOfRange(date))
}

// chrono clamps to the last day of a shorter target month.
fn add_months(date: NaiveDate, months: u32) -> Result<NaiveDate, RecurrenceError> {
    date.checked_add_months(Months::new(months))
        .ok_or(RecurrenceError::DateOutOfRange(date))
}

impl fmt::Display for RecurrenceRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fn every(f: &mut fmt::Formatter<'_>, n: NonZeroU32, unit: &str) -> fmt::Result {
            if n.get() == 1 {
                write!(f, "every {unit}")
            } else {
                write!(f, "every {n} {unit}s")
            }
        }
        match self.frequency {
            Frequency::Daily { interval } => every(f, interval, "day")?,
            Frequency::Weekly { interval, days } => {
                every(f, interval, "week")?;
                if let Some(days) = days {
                    let names: Vec<&str> = days.indices().map(|d| WEEKDAY_NAMES[d as usize]).collect();
                    write!(f, " on {}", names.join(", "))?;
                }
            }
            Frequency::Monthly { interval, day_of_month } => {
                every(f, interval, "month")?;
                if let Some(dom) = day_of_month {
                    write!(f, " on day {}", dom.get())?;
                }
            }
            Frequency::Yearly { interval } => every(f, interval, "year")?,
            Frequency::Custom(CustomPattern::EveryNDays(days)) => every(f, days, "day")?,
            Frequency::Custom(CustomPattern::FirstAndFifteenth) => {
                write!(f, "on the 1st and 15th")?
            }
        }
        if let Some(end) = self.end_date {
            write!(f, " until {end}")?;
        }
        if self.anchor == AnchorField::CompletionDate {
            write!(f, " (from completion)")?;
        }
        Ok(())
    }
}

/// Loose wire form of a recurrence rule, as stored with a task.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecurrencePattern {
    pub frequency: String,
    #[serde(default = "default_interval")]
    pub interval: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub days_of_week: Option<Vec<i64>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub day_of_month: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub custom_pattern: Option<CustomPatternSpec>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_date: Option<NaiveDate>,
    #[serde(default)]
    pub anchor_field: AnchorField,
}

fn default_interval() -> i64 {
    1
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum CustomPatternSpec {
    EveryNDays { days: i64 },
    FirstAndFifteenth,
}

impl RecurrencePattern {
    pub fn new(frequency: &str) -> Self {
        RecurrencePattern {
            frequency: frequency.to_string(),
            interval: default_interval(),
            days_of_week: None,
            day_of_month: None,
            custom_pattern: None,
            end_date: None,
            anchor_field: AnchorField::StartDate,
        }
    }
}

fn positive(value: i64, field: &str) -> Result<NonZeroU32, RecurrenceError> {
    u32::try_from(value)
        .ok()
        .and_then(NonZeroU32::new)
        .ok_or_else(|| invalid(format!("{field} must be a positive integer, got {value}")))
}

impl TryFrom<RecurrencePattern> for RecurrenceRule {
    type Error = RecurrenceError;

    fn try_from(p: RecurrencePattern) -> Result<Self, Self::Error> {
        let interval = positive(p.interval, "interval")?;
        let frequency = p.frequency.trim().to_lowercase();

        if p.custom_pattern.is_some() && frequency != "custom" {
            return Err(invalid(format!("customPattern given for {frequency} frequency")));
        }
        if p.days_of_week.is_some() && frequency != "weekly" {
            return Err(invalid(format!("daysOfWeek given for {frequency} frequency")));
        }
        if p.day_of_month.is_some() && frequency != "monthly" {
            return Err(invalid(format!("dayOfMonth given for {frequency} frequency")));
        }

        let frequency = match frequency.as_str() {
            "daily" => Frequency::Daily { interval },
            "weekly" => {
                let days = match p.days_of_week {
                    None => None,
                    Some(raw) => {
                        let mut indices = Vec::with_capacity(raw.len());
                        for d in raw {
                            let d = u8::try_from(d)
                                .map_err(|_| invalid(format!("weekday index {d} is outside 0..=6")))?;
                            indices.push(d);
                        }
                        Some(WeekdaySet::new(indices)?)
                    }
                };
                Frequency::Weekly { interval, days }
            }
            "monthly" => {
                let day_of_month = match p.day_of_month {
                    None => None,
                    Some(d) => {
                        let d = u32::try_from(d)
                            .map_err(|_| invalid(format!("dayOfMonth {d} is outside 1..=31")))?;
                        Some(DayOfMonth::new(d)?)
                    }
                };
                Frequency::Monthly { interval, day_of_month }
            }
            "yearly" => Frequency::Yearly { interval },
            "custom" => match p.custom_pattern {
                Some(CustomPatternSpec::EveryNDays { days }) => {
                    Frequency::Custom(CustomPattern::EveryNDays(positive(days, "customPattern.days")?))
                }
                Some(CustomPatternSpec::FirstAndFifteenth) => {
                    Frequency::Custom(CustomPattern::FirstAndFifteenth)
                }
                None => return Err(invalid("custom frequency requires a customPattern")),
            },
            other => return Err(invalid(format!("unknown frequency '{other}'"))),
        };

        Ok(RecurrenceRule {
            frequency,
            end_date: p.end_date,
            anchor: p.anchor_field,
        })
    }
}

impl From<RecurrenceRule> for RecurrencePattern {
    fn from(rule: RecurrenceRule) -> Self {
        let (name, interval) = match rule.frequency {
            Frequency::Daily { interval } => ("daily", interval),
            Frequency::Weekly { interval, .. } => ("weekly", interval),
            Frequency::Monthly { interval, .. } => ("monthly", interval),
            Frequency::Yearly { interval } => ("yearly", interval),
            Frequency::Custom(_) => ("custom", NonZeroU32::MIN),
        };
        let mut pattern = RecurrencePattern::new(name);
        pattern.interval = interval.get().into();
        pattern.end_date = rule.end_date;
        pattern.anchor_field = rule.anchor;
        match rule.frequency {
            Frequency::Weekly { days: Some(days), .. } => {
                pattern.days_of_week = Some(days.indices().map(i64::from).collect());
            }
            Frequency::Monthly { day_of_month: Some(dom), .. } => {
                pattern.day_of_month = Some(dom.get().into());
            }
            Frequency::Custom(CustomPattern::EveryNDays(days)) => {
                pattern.custom_pattern = Some(CustomPatternSpec::EveryNDays { days: days.get().into() });
            }
            Frequency::Custom(CustomPattern::FirstAndFifteenth) => {
                pattern.custom_pattern = Some(CustomPatternSpec::FirstAndFifteenth);
            }
            _ => {}
        }
        pattern
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Weekday};

    fn n(v: u32) -> NonZeroU32 {
        NonZeroU32::new(v).unwrap()
    }

    fn at(y: i32, m: u32, d: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, m, d, 9, 30, 0).unwrap()
    }

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn next(rule: &RecurrenceRule, reference: DateTime<Utc>) -> Option<NaiveDate> {
        rule.next_after(reference).unwrap().map(|d| d.date_naive())
    }

    #[test]
    fn test_daily_every_two_days() {
        let rule = RecurrenceRule::new(Frequency::Daily { interval: n(2) });
        assert_eq!(next(&rule, at(2025, 10, 15)), Some(date(2025, 10, 17)));
    }

    #[test]
    fn test_daily_adds_exact_interval_across_month_end() {
        for interval in [1, 3, 17, 45] {
            let rule = RecurrenceRule::new(Frequency::Daily { interval: n(interval) });
            let expected = date(2025, 12, 20) + chrono::Duration::days(interval.into());
            assert_eq!(next(&rule, at(2025, 12, 20)), Some(expected));
        }
    }

    #[test]
    fn test_weekly_without_days_adds_a_week() {
        let rule = RecurrenceRule::new(Frequency::Weekly { interval: n(1), days: None });
        assert_eq!(next(&rule, at(2025, 10, 15)), Some(date(2025, 10, 22)));
    }

    #[test]
    fn test_weekly_picks_nearest_later_weekday_in_same_week() {
        let days = WeekdaySet::new([1, 3, 5]).unwrap();
        let rule = RecurrenceRule::new(Frequency::Weekly { interval: n(1), days: Some(days) });

        // Nearest later weekday wins: Tuesday 2025-10-14 -> Wednesday 2025-10-15,
        // not the Friday at the end of the set.
        assert_eq!(at(2025, 10, 14).weekday(), Weekday::Tue);
        assert_eq!(next(&rule, at(2025, 10, 14)), Some(date(2025, 10, 15)));
        // Thursday -> Friday of the same week
        assert_eq!(next(&rule, at(2025, 10, 16)), Some(date(2025, 10, 17)));
    }

    #[test]
    fn test_weekly_wraps_to_first_day_interval_weeks_later() {
        let days = WeekdaySet::new([1, 5]).unwrap();
        let weekly = RecurrenceRule::new(Frequency::Weekly { interval: n(1), days: Some(days) });
        let biweekly = RecurrenceRule::new(Frequency::Weekly { interval: n(2), days: Some(days) });

        // Friday 2025-10-17: no later configured day this week.
        assert_eq!(next(&weekly, at(2025, 10, 17)), Some(date(2025, 10, 20)));
        assert_eq!(next(&biweekly, at(2025, 10, 17)), Some(date(2025, 10, 27)));
    }

    #[test]
    fn test_monthly_day_of_month_moves_to_next_month() {
        let rule = RecurrenceRule::new(Frequency::Monthly {
            interval: n(1),
            day_of_month: Some(DayOfMonth::new(15).unwrap()),
        });
        assert_eq!(next(&rule, at(2025, 10, 15)), Some(date(2025, 11, 15)));
    }

    #[test]
    fn test_monthly_day_of_month_not_yet_reached_stays_in_month() {
        let rule = RecurrenceRule::new(Frequency::Monthly {
            interval: n(3),
            day_of_month: Some(DayOfMonth::new(20).unwrap()),
        });
        assert_eq!(next(&rule, at(2025, 10, 15)), Some(date(2025, 10, 20)));
        assert_eq!(next(&rule, at(2025, 10, 20)), Some(date(2026, 1, 20)));
    }

    #[test]
    fn test_monthly_clamps_to_short_month() {
        let rule = RecurrenceRule::new(Frequency::Monthly { interval: n(1), day_of_month: None });
        assert_eq!(next(&rule, at(2025, 1, 31)), Some(date(2025, 2, 28)));
        assert_eq!(next(&rule, at(2024, 1, 31)), Some(date(2024, 2, 29)));

        let on_31st = RecurrenceRule::new(Frequency::Monthly {
            interval: n(1),
            day_of_month: Some(DayOfMonth::new(31).unwrap()),
        });
        assert_eq!(next(&on_31st, at(2025, 3, 31)), Some(date(2025, 4, 30)));
        assert_eq!(next(&on_31st, at(2025, 4, 30)), Some(date(2025, 5, 31)));
    }

    #[test]
    fn test_yearly_leap_day_clamps_to_feb_28() {
        let rule = RecurrenceRule::new(Frequency::Yearly { interval: n(1) });
        assert_eq!(next(&rule, at(2024, 2, 29)), Some(date(2025, 2, 28)));

        let every_four = RecurrenceRule::new(Frequency::Yearly { interval: n(4) });
        assert_eq!(next(&every_four, at(2024, 2, 29)), Some(date(2028, 2, 29)));
    }

    #[test]
    fn test_custom_every_n_days() {
        let rule = RecurrenceRule::new(Frequency::Custom(CustomPattern::EveryNDays(n(10))));
        assert_eq!(next(&rule, at(2025, 10, 15)), Some(date(2025, 10, 25)));
    }

    #[test]
    fn test_first_and_fifteenth() {
        let rule = RecurrenceRule::new(Frequency::Custom(CustomPattern::FirstAndFifteenth));
        assert_eq!(next(&rule, at(2025, 10, 1)), Some(date(2025, 10, 15)));
        assert_eq!(next(&rule, at(2025, 10, 14)), Some(date(2025, 10, 15)));
        assert_eq!(next(&rule, at(2025, 10, 15)), Some(date(2025, 11, 1)));
        assert_eq!(next(&rule, at(2025, 12, 31)), Some(date(2026, 1, 1)));
    }

    #[test]
    fn test_end_date_terminates_series() {
        let rule = RecurrenceRule::new(Frequency::Daily { interval: n(1) }).until(date(2025, 10, 20));
        assert_eq!(next(&rule, at(2025, 10, 21)), None);
        // candidate equal to the end date is excluded too
        assert_eq!(next(&rule, at(2025, 10, 19)), None);
        assert_eq!(next(&rule, at(2025, 10, 18)), Some(date(2025, 10, 19)));
    }

    #[test]
    fn test_time_of_day_is_preserved() {
        let rule = RecurrenceRule::new(Frequency::Daily { interval: n(1) });
        let result = rule.next_after(at(2025, 10, 15)).unwrap().unwrap();
        assert_eq!(result, Utc.with_ymd_and_hms(2025, 10, 16, 9, 30, 0).unwrap());
    }

    #[test]
    fn test_repeated_application_is_strictly_increasing() {
        let rules = [
            RecurrenceRule::new(Frequency::Monthly { interval: n(1), day_of_month: None }),
            RecurrenceRule::new(Frequency::Monthly {
                interval: n(1),
                day_of_month: Some(DayOfMonth::new(31).unwrap()),
            }),
            RecurrenceRule::new(Frequency::Weekly {
                interval: n(2),
                days: Some(WeekdaySet::new([0, 3, 6]).unwrap()),
            }),
            RecurrenceRule::new(Frequency::Custom(CustomPattern::FirstAndFifteenth)),
        ];
        for rule in rules {
            let rule = rule.until(date(2027, 1, 1));
            let dates = rule.upcoming(at(2025, 1, 31), 500).unwrap();
            assert!(!dates.is_empty());
            assert!(dates.len() < 500, "series should end before the limit: {rule}");
            assert!(dates.windows(2).all(|w| w[0] < w[1]), "not increasing for {rule}");
            assert!(dates.iter().all(|d| d.date_naive() < date(2027, 1, 1)));
        }
    }

    #[test]
    fn test_completion_anchor_uses_completion_timestamp() {
        let rule = RecurrenceRule::new(Frequency::Daily { interval: n(3) })
            .anchored_on(AnchorField::CompletionDate);
        let completed = at(2025, 10, 20);

        let anchored = calculate_next_due_date(&rule, at(2025, 10, 15), None, Some(completed)).unwrap();
        assert_eq!(anchored.map(|d| d.date_naive()), Some(date(2025, 10, 23)));

        let overridden = calculate_next_due_date(
            &rule,
            at(2025, 10, 15),
            Some(AnchorField::StartDate),
            Some(completed),
        )
        .unwrap();
        assert_eq!(overridden.map(|d| d.date_naive()), Some(date(2025, 10, 18)));

        let no_completion = calculate_next_due_date(&rule, at(2025, 10, 15), None, None).unwrap();
        assert_eq!(no_completion.map(|d| d.date_naive()), Some(date(2025, 10, 18)));
    }

    #[test]
    fn test_upcoming_ignores_huge_limit_when_series_ends() {
        let rule = RecurrenceRule::new(Frequency::Daily { interval: n(1) }).until(date(2025, 10, 20));
        let dates = rule.upcoming(at(2025, 10, 15), usize::MAX).unwrap();
        let days: Vec<NaiveDate> = dates.iter().map(|d| d.date_naive()).collect();
        assert_eq!(
            days,
            vec![date(2025, 10, 16), date(2025, 10, 17), date(2025, 10, 18), date(2025, 10, 19)]
        );
    }

    #[test]
    fn test_days_in_month() {
        assert_eq!(days_in_month(2025, 2), Some(28));
        assert_eq!(days_in_month(2024, 2), Some(29));
        assert_eq!(days_in_month(2025, 4), Some(30));
        assert_eq!(days_in_month(2025, 13), None);
        // last representable month still reports its real length
        assert_eq!(days_in_month(NaiveDate::MAX.year(), 12), Some(31));
        assert_eq!(days_in_month(NaiveDate::MAX.year() + 1, 1), None);
    }

    #[test]
    fn test_monthly_past_calendar_range_is_an_error() {
        let rule = RecurrenceRule::new(Frequency::Monthly {
            interval: n(1),
            day_of_month: Some(DayOfMonth::new(31).unwrap()),
        });
        let last_month = NaiveDate::from_ymd_opt(NaiveDate::MAX.year(), 12, 31).unwrap();
        let reference = last_month.and_time(chrono::NaiveTime::default()).and_utc();
        assert!(matches!(rule.next_after(reference), Err(RecurrenceError::DateOutOfRange(_))));
    }

    #[test]
    fn test_date_out_of_range_is_an_error() {
        let rule = RecurrenceRule::new(Frequency::Yearly { interval: n(u32::MAX / 12) });
        let err = rule.next_after(at(2025, 1, 1)).unwrap_err();
        assert!(matches!(err, RecurrenceError::DateOutOfRange(_)));
    }

    #[test]
    fn test_pattern_validation_rejects_malformed_rules() {
        let cases = [
            (RecurrencePattern::new("fortnightly"), "unknown frequency"),
            (RecurrencePattern::new("custom"), "requires a customPattern"),
            (RecurrencePattern { interval: 0, ..RecurrencePattern::new("daily") }, "interval"),
            (
                RecurrencePattern { days_of_week: Some(vec![]), ..RecurrencePattern::new("weekly") },
                "must not be empty",
            ),
            (
                RecurrencePattern { days_of_week: Some(vec![1, 7]), ..RecurrencePattern::new("weekly") },
                "outside 0..=6",
            ),
            (
                RecurrencePattern { day_of_month: Some(32), ..RecurrencePattern::new("monthly") },
                "outside 1..=31",
            ),
            (
                RecurrencePattern { day_of_month: Some(5), ..RecurrencePattern::new("daily") },
                "dayOfMonth given",
            ),
            (
                RecurrencePattern {
                    custom_pattern: Some(CustomPatternSpec::EveryNDays { days: 0 }),
                    ..RecurrencePattern::new("custom")
                },
                "customPattern.days",
            ),
            (
                RecurrencePattern {
                    custom_pattern: Some(CustomPatternSpec::FirstAndFifteenth),
                    ..RecurrencePattern::new("monthly")
                },
                "customPattern given",
            ),
        ];
        for (pattern, needle) in cases {
            let err = RecurrenceRule::try_from(pattern.clone()).unwrap_err();
            assert!(
                matches!(&err, RecurrenceError::InvalidRecurrenceRule(msg) if msg.contains(needle)),
                "{pattern:?} gave {err}"
            );
        }
    }

    #[test]
    fn test_rule_reads_camel_case_wire_form() {
        let json = r#"{
            "frequency": "custom",
            "customPattern": { "type": "every_n_days", "days": 10 },
            "endDate": "2026-01-01",
            "anchorField": "completionDate"
        }"#;
        let rule: RecurrenceRule = serde_json::from_str(json).unwrap();
        assert_eq!(rule.frequency, Frequency::Custom(CustomPattern::EveryNDays(n(10))));
        assert_eq!(rule.end_date, Some(date(2026, 1, 1)));
        assert_eq!(rule.anchor, AnchorField::CompletionDate);

        let back: RecurrenceRule = serde_json::from_str(&serde_json::to_string(&rule).unwrap()).unwrap();
        assert_eq!(back, rule);

        let bad = serde_json::from_str::<RecurrenceRule>(r#"{"frequency": "custom"}"#);
        assert!(bad.is_err());
    }

    #[test]
    fn test_display_summarises_rule() {
        let rule = RecurrenceRule::new(Frequency::Weekly {
            interval: n(2),
            days: Some(WeekdaySet::new([5, 1]).unwrap()),
        })
        .until(date(2026, 3, 1));
        assert_eq!(rule.to_string(), "every 2 weeks on Mon, Fri until 2026-03-01");
    }
}
