use std::fmt;
use std::str::FromStr;

use chrono::{NaiveDate, Utc};

use crate::error::VdbError;

const WILDCARD: char = 'X';
const OPEN_START: &str = "0000-00-00";

/// One component of a partial date. `Unknown` orders after every known
/// value, the same way `XX` sorts after digits in a plain string comparison.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum DateComponent {
    Known(u16),
    Unknown,
}

impl DateComponent {
    pub fn is_unknown(self) -> bool {
        matches!(self, DateComponent::Unknown)
    }

    fn parse(raw: &str, width: usize) -> Option<Self> {
        if raw.len() != width {
            return None;
        }
        if raw.chars().all(|ch| ch == WILDCARD) {
            return Some(DateComponent::Unknown);
        }
        if !raw.chars().all(|ch| ch.is_ascii_digit()) {
            return None;
        }
        raw.parse().ok().map(DateComponent::Known)
    }

    fn write(self, f: &mut fmt::Formatter<'_>, width: usize) -> fmt::Result {
        match self {
            DateComponent::Known(value) => write!(f, "{value:0width$}"),
            DateComponent::Unknown => write!(f, "{}", "X".repeat(width)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PartialDate {
    pub year: DateComponent,
    pub month: DateComponent,
    pub day: DateComponent,
}

impl PartialDate {
    pub fn is_fully_unknown(&self) -> bool {
        self.year.is_unknown() && self.month.is_unknown() && self.day.is_unknown()
    }
}

impl FromStr for PartialDate {
    type Err = VdbError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let upper = value.trim().to_uppercase();
        let parts = upper.split('-').collect::<Vec<_>>();
        let invalid = || VdbError::InvalidDateFormat(value.to_string());
        let [year, month, day] = parts.as_slice() else {
            return Err(invalid());
        };
        Ok(Self {
            year: DateComponent::parse(year, 4).ok_or_else(invalid)?,
            month: DateComponent::parse(month, 2).ok_or_else(invalid)?,
            day: DateComponent::parse(day, 2).ok_or_else(invalid)?,
        })
    }
}

impl fmt::Display for PartialDate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.year.write(f, 4)?;
        f.write_str("-")?;
        self.month.write(f, 2)?;
        f.write_str("-")?;
        self.day.write(f, 2)
    }
}

/// `a >= b`, compared year, then month, then day.
///
/// A wildcard month or day on either side ends the comparison and returns
/// `relaxed` as-is. When no component decides (equal dates, or an earlier
/// component already greater), the answer is `true`.
pub fn greater_or_equal(a: &PartialDate, b: &PartialDate, relaxed: bool) -> bool {
    if a.year < b.year {
        return false;
    }
    if a.year == b.year {
        if a.month.is_unknown() || b.month.is_unknown() {
            return relaxed;
        }
        if a.month < b.month {
            return false;
        }
        if a.month == b.month {
            if a.day.is_unknown() || b.day.is_unknown() {
                return relaxed;
            }
            if a.day < b.day {
                return false;
            }
        }
    }
    true
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DateInterval {
    pub start: PartialDate,
    pub end: PartialDate,
}

impl DateInterval {
    pub fn parse(start: &str, end: &str) -> Result<Self, VdbError> {
        Self::parse_at(start, end, Utc::now().date_naive())
    }

    /// Parses an interval relative to `today`. An empty or all-wildcard bound
    /// is open: the start becomes `0000-00-00`, the end becomes `today`.
    pub fn parse_at(start: &str, end: &str, today: NaiveDate) -> Result<Self, VdbError> {
        let end = if is_open_bound(end) {
            today.format("%Y-%m-%d").to_string()
        } else {
            end.trim().to_uppercase()
        };
        let start = if is_open_bound(start) {
            OPEN_START.to_string()
        } else {
            start.trim().to_uppercase()
        };

        let parsed_start: PartialDate = start.parse()?;
        let parsed_end: PartialDate = end.parse()?;
        if start > end {
            return Err(VdbError::InvalidInterval { start, end });
        }
        Ok(Self {
            start: parsed_start,
            end: parsed_end,
        })
    }

    pub fn contains(&self, date: &PartialDate, relaxed: bool) -> bool {
        greater_or_equal(date, &self.start, relaxed) && greater_or_equal(&self.end, date, relaxed)
    }
}

impl fmt::Display for DateInterval {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} - {}", self.start, self.end)
    }
}

fn is_open_bound(raw: &str) -> bool {
    let trimmed = raw.trim();
    trimmed.is_empty()
        || raw
            .parse::<PartialDate>()
            .map(|date| date.is_fully_unknown())
            .unwrap_or(false)
}
