use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Datelike, NaiveDate, Utc};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};

use crate::calendar::{day_span, local_date, start_of_day};
use crate::engine::EngineError;

/// One contiguous run of availability, `[start, end)`, with a seat count.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeSlot {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub seats: u32,
}

impl TimeSlot {
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>, seats: u32) -> Self {
        debug_assert!(start < end, "TimeSlot start must be before end");
        Self { start, end, seats }
    }

    pub fn overlaps(&self, other: &TimeSlot) -> bool {
        self.start < other.end && other.start < self.end
    }

    /// Back-to-back: `self` ends exactly where `other` starts.
    pub fn is_adjacent_to(&self, other: &TimeSlot) -> bool {
        self.end == other.start
    }

    pub fn contains_instant(&self, t: DateTime<Utc>) -> bool {
        self.start <= t && t < self.end
    }

    /// True if the slot overlaps any part of the local day `day` in `tz`.
    pub fn overlaps_day(&self, day: NaiveDate, tz: Tz) -> bool {
        let (day_start, day_end) = day_span(day, tz);
        self.start < day_end && day_start < self.end
    }

    pub fn has_seats(&self) -> bool {
        self.seats > 0
    }
}

/// Calendar month identifier, `YYYY-MM`. Which instants a month covers
/// depends on the zone it is resolved in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct MonthId {
    pub year: i32,
    pub month: u32,
}

impl MonthId {
    pub fn new(year: i32, month: u32) -> Option<Self> {
        NaiveDate::from_ymd_opt(year, month, 1).map(|_| Self { year, month })
    }

    /// The month `instant` falls in, as seen in `tz`.
    pub fn of(instant: DateTime<Utc>, tz: Tz) -> Self {
        Self::containing(local_date(instant, tz))
    }

    pub fn containing(date: NaiveDate) -> Self {
        Self {
            year: date.year(),
            month: date.month(),
        }
    }

    pub fn next(self) -> Self {
        if self.month == 12 {
            Self {
                year: self.year + 1,
                month: 1,
            }
        } else {
            Self {
                year: self.year,
                month: self.month + 1,
            }
        }
    }

    pub fn first_day(self) -> NaiveDate {
        NaiveDate::from_ymd_opt(self.year, self.month, 1).unwrap_or(NaiveDate::MIN)
    }

    /// First instant of this month in `tz`.
    pub fn start_in(self, tz: Tz) -> DateTime<Utc> {
        start_of_day(self.first_day(), tz)
    }
}

impl fmt::Display for MonthId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04}-{:02}", self.year, self.month)
    }
}

impl FromStr for MonthId {
    type Err = EngineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = |what: &str| EngineError::InvalidMonth(format!("{what} in {s:?}"));
        let (year, month) = s.split_once('-').ok_or_else(|| invalid("expected YYYY-MM"))?;
        let year: i32 = year.parse().map_err(|_| invalid("bad year"))?;
        let month: u32 = month.parse().map_err(|_| invalid("bad month"))?;
        Self::new(year, month).ok_or_else(|| invalid("month out of range"))
    }
}

/// Why the latest fetch of a month failed. Stored on the month entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchError {
    pub message: String,
}

impl FetchError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

impl fmt::Display for FetchError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

impl std::error::Error for FetchError {}

/// Fetch state of one month of a listing's slots.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MonthlySlotEntry {
    /// `None` until fetched. `Some(vec![])` means fetched, nothing available.
    pub time_slots: Option<Vec<TimeSlot>>,
    pub fetch_in_progress: bool,
    pub fetch_error: Option<FetchError>,
}

impl MonthlySlotEntry {
    pub fn fetched(time_slots: Vec<TimeSlot>) -> Self {
        Self {
            time_slots: Some(time_slots),
            fetch_in_progress: false,
            fetch_error: None,
        }
    }

    /// Slots usable for queries. A month whose latest fetch failed counts
    /// as unfetched even if it still carries older data.
    pub fn fetched_slots(&self) -> Option<&[TimeSlot]> {
        if self.fetch_error.is_some() {
            return None;
        }
        self.time_slots.as_deref()
    }

    pub fn is_fetched(&self) -> bool {
        self.fetched_slots().is_some()
    }
}

/// A listing's slot cache, keyed by month. Key order is chronological.
pub type MonthlySlots = BTreeMap<MonthId, MonthlySlotEntry>;

/// Half-open instant window `[start, end)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FetchedRange {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl FetchedRange {
    /// True if the whole local day lies inside the window.
    pub fn covers_day(&self, day: NaiveDate, tz: Tz) -> bool {
        let (day_start, day_end) = day_span(day, tz);
        self.start <= day_start && day_end <= self.end
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UnitType {
    /// Exclusive end date; the end day itself is not booked.
    Daily,
    #[default]
    Nightly,
}

impl UnitType {
    pub fn is_daily(self) -> bool {
        matches!(self, UnitType::Daily)
    }
}

impl FromStr for UnitType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "daily" | "day" => Ok(UnitType::Daily),
            "nightly" | "night" => Ok(UnitType::Nightly),
            other => Err(format!("unknown unit type: {other}")),
        }
    }
}

/// Dates picked so far in a date-range picker, as local days in the
/// listing's zone.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Selection {
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
}

impl Selection {
    pub fn new(start_date: Option<NaiveDate>, end_date: Option<NaiveDate>) -> Self {
        Self {
            start_date,
            end_date,
        }
    }

    /// The chosen boundary when exactly one of start/end is set.
    pub fn single_boundary(&self) -> Option<NaiveDate> {
        match (self.start_date, self.end_date) {
            (Some(d), None) | (None, Some(d)) => Some(d),
            _ => None,
        }
    }

    /// Start picked, end still open.
    pub fn is_start_only(&self) -> bool {
        self.start_date.is_some() && self.end_date.is_none()
    }

    /// Both dates as the instants their local days begin in `tz`.
    pub fn bounds_in(&self, tz: Tz) -> (Option<DateTime<Utc>>, Option<DateTime<Utc>>) {
        (
            self.start_date.map(|d| start_of_day(d, tz)),
            self.end_date.map(|d| start_of_day(d, tz)),
        )
    }
}

/// What the day index knows about one local calendar day.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DayIndexEntry {
    pub has_availability: bool,
    pub time_slots: Vec<TimeSlot>,
}

/// Events broadcast to listeners of a listing's slot cache.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SlotEvent {
    MonthFetched { month: MonthId, slot_count: usize },
    MonthFailed { month: MonthId, error: FetchError },
}
