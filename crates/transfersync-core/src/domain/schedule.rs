//! Trigger schedules
//!
//! A [`Schedule`] is either one of the named presets (`@daily`, `@hourly`,
//! `@monday`, ...) or a six-field cron expression in the
//! `minute hour day-of-month month day-of-week year` layout.
//!
//! Supported field syntax: `*`, `?` (day fields only), single values, lists
//! (`1,15`), ranges (`MON-FRI`), and steps (`0/10`, `*/5`, `10-40/10`).
//! Day-of-week runs from 1 (Sunday) to 7 (Saturday); month and weekday names
//! are accepted as three-letter abbreviations. All evaluation is in UTC.

use std::collections::BTreeSet;
use std::fmt::{self, Display, Formatter};
use std::str::FromStr;

use chrono::{DateTime, Datelike, Duration, TimeZone, Timelike, Utc};
use serde::{Deserialize, Serialize};

use super::errors::DomainError;

/// Named schedule presets and their cron equivalents
pub const PRESETS: &[(&str, &str)] = &[
    ("@monthly", "0 0 1 * ? *"),
    ("@daily", "0 0 * * ? *"),
    ("@hourly", "0 * * * ? *"),
    ("@minutely", "* * * * ? *"),
    ("@sunday", "0 0 ? * 1 *"),
    ("@monday", "0 0 ? * 2 *"),
    ("@tuesday", "0 0 ? * 3 *"),
    ("@wednesday", "0 0 ? * 4 *"),
    ("@thursday", "0 0 ? * 5 *"),
    ("@friday", "0 0 ? * 6 *"),
    ("@saturday", "0 0 ? * 7 *"),
    ("@every10min", "0/10 * * * ? *"),
];

const MIN_YEAR: i32 = 1970;
const MAX_YEAR: i32 = 2199;

const MONTH_NAMES: &[&str] = &[
    "JAN", "FEB", "MAR", "APR", "MAY", "JUN", "JUL", "AUG", "SEP", "OCT", "NOV", "DEC",
];
const WEEKDAY_NAMES: &[&str] = &["SUN", "MON", "TUE", "WED", "THU", "FRI", "SAT"];

// ============================================================================
// Field sets
// ============================================================================

/// Set of allowed values for one of the five bounded cron fields
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct FieldSet {
    bits: u64,
    /// `*` or `?`: every value allowed
    any: bool,
}

impl FieldSet {
    fn contains(&self, value: u32) -> bool {
        self.bits & (1u64 << value) != 0
    }
}

#[derive(Debug, Clone, Copy)]
struct FieldSpec {
    name: &'static str,
    min: u32,
    max: u32,
    names: &'static [&'static str],
    allow_question: bool,
}

const MINUTE: FieldSpec = FieldSpec {
    name: "minute",
    min: 0,
    max: 59,
    names: &[],
    allow_question: false,
};
const HOUR: FieldSpec = FieldSpec {
    name: "hour",
    min: 0,
    max: 23,
    names: &[],
    allow_question: false,
};
const DAY_OF_MONTH: FieldSpec = FieldSpec {
    name: "day-of-month",
    min: 1,
    max: 31,
    names: &[],
    allow_question: true,
};
const MONTH: FieldSpec = FieldSpec {
    name: "month",
    min: 1,
    max: 12,
    names: MONTH_NAMES,
    allow_question: false,
};
const DAY_OF_WEEK: FieldSpec = FieldSpec {
    name: "day-of-week",
    min: 1,
    max: 7,
    names: WEEKDAY_NAMES,
    allow_question: true,
};

fn invalid(spec: &FieldSpec, part: &str, reason: &str) -> DomainError {
    DomainError::InvalidSchedule(format!("{} field {part:?}: {reason}", spec.name))
}

fn parse_value(spec: &FieldSpec, token: &str, min: u32, max: u32) -> Result<u32, DomainError> {
    let upper = token.to_ascii_uppercase();
    let value = if let Some(idx) = spec.names.iter().position(|n| *n == upper) {
        idx as u32 + spec.min
    } else {
        token
            .parse::<u32>()
            .map_err(|_| invalid(spec, token, "not a number"))?
    };
    if value < min || value > max {
        return Err(invalid(spec, token, "out of range"));
    }
    Ok(value)
}

/// Parses one comma-separated element into `(start, end, step)`
fn parse_element(
    spec: &FieldSpec,
    part: &str,
    min: u32,
    max: u32,
) -> Result<(u32, u32, u32), DomainError> {
    let (base, step) = match part.split_once('/') {
        Some((base, step)) => {
            let step: u32 = step
                .parse()
                .map_err(|_| invalid(spec, part, "step is not a number"))?;
            if step == 0 {
                return Err(invalid(spec, part, "step must be positive"));
            }
            (base, Some(step))
        }
        None => (part, None),
    };

    let (start, end) = if base == "*" {
        (min, max)
    } else if let Some((lo, hi)) = base.split_once('-') {
        let lo = parse_value(spec, lo, min, max)?;
        let hi = parse_value(spec, hi, min, max)?;
        if lo > hi {
            return Err(invalid(spec, part, "range start exceeds end"));
        }
        (lo, hi)
    } else {
        let value = parse_value(spec, base, min, max)?;
        // `5/15` means "from 5 to the end, every 15"
        if step.is_some() {
            (value, max)
        } else {
            (value, value)
        }
    };

    Ok((start, end, step.unwrap_or(1)))
}

fn parse_field(spec: &FieldSpec, field: &str) -> Result<FieldSet, DomainError> {
    if field == "?" {
        if !spec.allow_question {
            return Err(invalid(spec, field, "'?' is only allowed in day fields"));
        }
        return Ok(full_set(spec));
    }
    if field == "*" {
        return Ok(full_set(spec));
    }

    let mut bits = 0u64;
    for part in field.split(',') {
        let (start, end, step) = parse_element(spec, part, spec.min, spec.max)?;
        let mut value = start;
        while value <= end {
            bits |= 1u64 << value;
            value += step;
        }
    }
    Ok(FieldSet { bits, any: false })
}

fn full_set(spec: &FieldSpec) -> FieldSet {
    let mut bits = 0u64;
    for value in spec.min..=spec.max {
        bits |= 1u64 << value;
    }
    FieldSet { bits, any: true }
}

fn parse_years(field: &str) -> Result<Option<BTreeSet<i32>>, DomainError> {
    if field == "*" {
        return Ok(None);
    }
    let spec = FieldSpec {
        name: "year",
        min: MIN_YEAR as u32,
        max: MAX_YEAR as u32,
        names: &[],
        allow_question: false,
    };
    let mut years = BTreeSet::new();
    for part in field.split(',') {
        let (start, end, step) = parse_element(&spec, part, spec.min, spec.max)?;
        let mut value = start;
        while value <= end {
            years.insert(value as i32);
            value += step;
        }
    }
    Ok(Some(years))
}

// ============================================================================
// Schedule
// ============================================================================

/// A parsed trigger schedule
///
/// Keeps the original expression for display and serialisation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Schedule {
    expression: String,
    minutes: FieldSet,
    hours: FieldSet,
    days_of_month: FieldSet,
    months: FieldSet,
    days_of_week: FieldSet,
    years: Option<BTreeSet<i32>>,
}

impl Schedule {
    /// Parses a preset name or a six-field cron expression
    pub fn parse(expression: &str) -> Result<Self, DomainError> {
        let trimmed = expression.trim();
        let cron = if trimmed.starts_with('@') {
            PRESETS
                .iter()
                .find(|(name, _)| *name == trimmed)
                .map(|(_, cron)| *cron)
                .ok_or_else(|| DomainError::InvalidSchedule(format!("unknown preset {trimmed}")))?
        } else {
            trimmed
        };

        let fields: Vec<&str> = cron.split_whitespace().collect();
        if fields.len() != 6 {
            return Err(DomainError::InvalidSchedule(format!(
                "expected 6 fields, found {}: {trimmed}",
                fields.len()
            )));
        }

        Ok(Self {
            expression: trimmed.to_string(),
            minutes: parse_field(&MINUTE, fields[0])?,
            hours: parse_field(&HOUR, fields[1])?,
            days_of_month: parse_field(&DAY_OF_MONTH, fields[2])?,
            months: parse_field(&MONTH, fields[3])?,
            days_of_week: parse_field(&DAY_OF_WEEK, fields[4])?,
            years: parse_years(fields[5])?,
        })
    }

    /// The expression as written in configuration
    pub fn expression(&self) -> &str {
        &self.expression
    }

    fn year_matches(&self, year: i32) -> bool {
        self.years.as_ref().map_or(true, |years| years.contains(&year))
    }

    fn day_matches(&self, instant: DateTime<Utc>) -> bool {
        let dom = self.days_of_month.contains(instant.day());
        // chrono: Sunday = 0; cron: Sunday = 1
        let dow = self
            .days_of_week
            .contains(instant.weekday().num_days_from_sunday() + 1);
        match (self.days_of_month.any, self.days_of_week.any) {
            (true, true) => true,
            (true, false) => dow,
            (false, true) => dom,
            (false, false) => dom || dow,
        }
    }

    /// Returns true if `instant` (truncated to the minute) is a firing time
    pub fn matches(&self, instant: DateTime<Utc>) -> bool {
        self.year_matches(instant.year())
            && self.months.contains(instant.month())
            && self.day_matches(instant)
            && self.hours.contains(instant.hour())
            && self.minutes.contains(instant.minute())
    }

    /// First firing strictly after `after`, or `None` if the schedule never fires again
    pub fn next_after(&self, after: DateTime<Utc>) -> Option<DateTime<Utc>> {
        let mut candidate = truncate_to_minute(after) + Duration::minutes(1);
        loop {
            let year = candidate.year();
            if year > MAX_YEAR {
                return None;
            }
            if !self.year_matches(year) {
                candidate = Utc.with_ymd_and_hms(year + 1, 1, 1, 0, 0, 0).single()?;
                continue;
            }
            if !self.months.contains(candidate.month()) {
                candidate = start_of_next_month(candidate)?;
                continue;
            }
            if !self.day_matches(candidate) {
                candidate = start_of_day(candidate)? + Duration::days(1);
                continue;
            }
            if !self.hours.contains(candidate.hour()) {
                candidate = start_of_hour(candidate)? + Duration::hours(1);
                continue;
            }
            if !self.minutes.contains(candidate.minute()) {
                candidate += Duration::minutes(1);
                continue;
            }
            return Some(candidate);
        }
    }

    /// Last firing strictly before `before`, or `None` if there is none
    pub fn previous_before(&self, before: DateTime<Utc>) -> Option<DateTime<Utc>> {
        let mut candidate = truncate_to_minute(before);
        if candidate >= before {
            candidate -= Duration::minutes(1);
        }
        loop {
            let year = candidate.year();
            if year < MIN_YEAR {
                return None;
            }
            if !self.year_matches(year) {
                candidate = Utc.with_ymd_and_hms(year, 1, 1, 0, 0, 0).single()?
                    - Duration::minutes(1);
                continue;
            }
            if !self.months.contains(candidate.month()) {
                candidate = Utc
                    .with_ymd_and_hms(year, candidate.month(), 1, 0, 0, 0)
                    .single()?
                    - Duration::minutes(1);
                continue;
            }
            if !self.day_matches(candidate) {
                candidate = start_of_day(candidate)? - Duration::minutes(1);
                continue;
            }
            if !self.hours.contains(candidate.hour()) {
                candidate = start_of_hour(candidate)? - Duration::minutes(1);
                continue;
            }
            if !self.minutes.contains(candidate.minute()) {
                candidate -= Duration::minutes(1);
                continue;
            }
            return Some(candidate);
        }
    }
}

fn truncate_to_minute(instant: DateTime<Utc>) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(
        instant.year(),
        instant.month(),
        instant.day(),
        instant.hour(),
        instant.minute(),
        0,
    )
    .single()
    .unwrap_or(instant)
}

fn start_of_hour(instant: DateTime<Utc>) -> Option<DateTime<Utc>> {
    Utc.with_ymd_and_hms(
        instant.year(),
        instant.month(),
        instant.day(),
        instant.hour(),
        0,
        0,
    )
    .single()
}

fn start_of_day(instant: DateTime<Utc>) -> Option<DateTime<Utc>> {
    Utc.with_ymd_and_hms(instant.year(), instant.month(), instant.day(), 0, 0, 0)
        .single()
}

fn start_of_next_month(instant: DateTime<Utc>) -> Option<DateTime<Utc>> {
    let (year, month) = if instant.month() == 12 {
        (instant.year() + 1, 1)
    } else {
        (instant.year(), instant.month() + 1)
    };
    Utc.with_ymd_and_hms(year, month, 1, 0, 0, 0).single()
}

impl Display for Schedule {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(&self.expression)
    }
}

impl FromStr for Schedule {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for Schedule {
    type Error = DomainError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<Schedule> for String {
    fn from(schedule: Schedule) -> Self {
        schedule.expression
    }
}
