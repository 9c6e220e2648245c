//! Time-based listing prefixes for the `yyyy/MM/dd/HH` log layout.
//!
//! Logs for an hour live under `<service>/yyyy/MM/dd/HH/`. Enumeration lists
//! the first hour precisely and then widens: the rest of the first day is
//! listed hour by hour, the following days of that month one day at a time,
//! the following months of that year one month at a time, and every later
//! year in a single call.

use chrono::{DateTime, Datelike, Duration, Months, TimeZone, Timelike, Utc};

pub const HOUR_FORMAT: &str = "%Y/%m/%d/%H";
pub const DAY_FORMAT: &str = "%Y/%m/%d";
pub const MONTH_FORMAT: &str = "%Y/%m";
pub const YEAR_FORMAT: &str = "%Y";

/// Width of a listing cursor, ordered from narrowest to widest.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Granularity {
    Hour,
    Day,
    Month,
    Year,
}

/// Position of a log enumeration in the widening prefix sequence.
///
/// Timestamps are aligned to the start of the unit they name.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PrefixCursor {
    /// No listing issued yet
    Unset,
    /// No start bound: the whole service directory, listed once
    Unbounded,
    Hour(DateTime<Utc>),
    Day(DateTime<Utc>),
    Month(DateTime<Utc>),
    Year(DateTime<Utc>),
}

impl PrefixCursor {
    /// The cursor following this one, or `None` when enumeration is over.
    ///
    /// `start` is the window start; it only matters when leaving `Unset`.
    pub fn advance(self, start: Option<DateTime<Utc>>) -> Option<Self> {
        match self {
            PrefixCursor::Unset => Some(match start {
                Some(start) => PrefixCursor::Hour(floor_hour(start)?),
                None => PrefixCursor::Unbounded,
            }),
            PrefixCursor::Unbounded => None,
            PrefixCursor::Hour(hour) => {
                let next = hour.checked_add_signed(Duration::hours(1))?;
                Some(if next.hour() == 0 {
                    PrefixCursor::Day(next)
                } else {
                    PrefixCursor::Hour(next)
                })
            }
            PrefixCursor::Day(day) => {
                let next = day.checked_add_signed(Duration::days(1))?;
                Some(if next.day() == 1 {
                    PrefixCursor::Month(next)
                } else {
                    PrefixCursor::Day(next)
                })
            }
            PrefixCursor::Month(month) => {
                let next = month.checked_add_months(Months::new(1))?;
                Some(if next.month() == 1 {
                    PrefixCursor::Year(next)
                } else {
                    PrefixCursor::Month(next)
                })
            }
            PrefixCursor::Year(year) => {
                let next = Utc
                    .with_ymd_and_hms(year.year().checked_add(1)?, 1, 1, 0, 0, 0)
                    .single()?;
                Some(PrefixCursor::Year(next))
            }
        }
    }

    /// Start of the time span the cursor lists, if it is time-bounded.
    pub fn start(&self) -> Option<DateTime<Utc>> {
        match *self {
            PrefixCursor::Hour(t)
            | PrefixCursor::Day(t)
            | PrefixCursor::Month(t)
            | PrefixCursor::Year(t) => Some(t),
            PrefixCursor::Unset | PrefixCursor::Unbounded => None,
        }
    }

    pub fn granularity(&self) -> Option<Granularity> {
        match self {
            PrefixCursor::Hour(_) => Some(Granularity::Hour),
            PrefixCursor::Day(_) => Some(Granularity::Day),
            PrefixCursor::Month(_) => Some(Granularity::Month),
            PrefixCursor::Year(_) => Some(Granularity::Year),
            PrefixCursor::Unset | PrefixCursor::Unbounded => None,
        }
    }

    /// Path segment appended to the service directory; empty when unbounded.
    pub fn path(&self) -> String {
        match self {
            PrefixCursor::Hour(t) => t.format(HOUR_FORMAT).to_string(),
            PrefixCursor::Day(t) => t.format(DAY_FORMAT).to_string(),
            PrefixCursor::Month(t) => t.format(MONTH_FORMAT).to_string(),
            PrefixCursor::Year(t) => t.format(YEAR_FORMAT).to_string(),
            PrefixCursor::Unset | PrefixCursor::Unbounded => String::new(),
        }
    }
}

pub fn floor_hour(time: DateTime<Utc>) -> Option<DateTime<Utc>> {
    Utc.with_ymd_and_hms(time.year(), time.month(), time.day(), time.hour(), 0, 0)
        .single()
}

/// Hour a log blob belongs to, read from its parent prefix.
///
/// The prefix must be `<directory>yyyy/MM/dd/HH/` with fixed-width,
/// zero-padded numeric components. An `HHmm` hour segment is also accepted.
pub fn parse_hour_prefix(directory: &str, parent_prefix: &str) -> Option<DateTime<Utc>> {
    let path = parent_prefix.strip_prefix(directory)?.strip_suffix('/')?;
    let mut segments = path.split('/');
    let year = fixed_width_number(segments.next()?, 4)?;
    let month = fixed_width_number(segments.next()?, 2)?;
    let day = fixed_width_number(segments.next()?, 2)?;
    let hour_segment = segments.next()?;
    if segments.next().is_some() {
        return None;
    }
    let hour = match hour_segment.len() {
        2 => fixed_width_number(hour_segment, 2)?,
        4 => {
            fixed_width_number(hour_segment, 4)?;
            fixed_width_number(&hour_segment[..2], 2)?
        }
        _ => return None,
    };
    Utc.with_ymd_and_hms(year as i32, month, day, hour, 0, 0)
        .single()
}

fn fixed_width_number(segment: &str, width: usize) -> Option<u32> {
    if segment.len() != width || !segment.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    segment.parse().ok()
}
