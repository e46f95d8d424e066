mod day_index;
mod error;
mod merge;
mod predicates;
mod seats;
mod window;

pub use day_index::{index_by_date, DayIndex};
pub use error::EngineError;
pub use merge::{combine_around_selected_start, flatten_and_merge, merge_adjacent};
pub use predicates::{
    block_on_day, is_blocked_between, is_day_blocked, is_outside_range, slot_on_day,
    DayBlockedOracle, DayBlockedParams, OutsideRangeParams,
};
pub use seats::min_seats_options;
pub use window::{fetch_window, fetched_range, horizon_end, months_to_fetch};

use chrono::{DateTime, NaiveDate, Utc};
use chrono_tz::Tz;

use crate::config::CalendarConfig;
use crate::model::*;

/// One listing's availability as of a cache snapshot: merged slots plus the
/// window they are known for. Queries never touch the cache again.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListingCalendar {
    pub time_slots: Vec<TimeSlot>,
    pub fetched_range: Option<FetchedRange>,
    pub time_zone: Tz,
}

impl ListingCalendar {
    pub fn from_monthly(monthly: &MonthlySlots, time_zone: Tz) -> Self {
        Self {
            time_slots: flatten_and_merge(monthly),
            fetched_range: fetched_range(monthly, time_zone),
            time_zone,
        }
    }

    /// True when `day` is fully inside the fetched window. Days outside it
    /// need another fetch before they can be classified.
    pub fn covers_day(&self, day: NaiveDate) -> bool {
        self.fetched_range
            .is_some_and(|r| r.covers_day(day, self.time_zone))
    }

    pub fn day_index(&self) -> DayIndex {
        match self.fetched_range {
            Some(r) => index_by_date(r.start, r.end, &self.time_slots, self.time_zone),
            None => DayIndex::default(),
        }
    }

    pub fn day_blocked_oracle(&self, unit_type: UnitType, selection: Selection) -> DayBlockedOracle {
        DayBlockedOracle::new(&DayBlockedParams {
            time_slots: &self.time_slots,
            fetched_range: self.fetched_range,
            unit_type,
            selection,
            time_zone: self.time_zone,
        })
    }

    pub fn is_outside_range(
        &self,
        day: NaiveDate,
        config: &CalendarConfig,
        selection: Selection,
        now: DateTime<Utc>,
    ) -> bool {
        is_outside_range(
            day,
            &OutsideRangeParams {
                time_slots: &self.time_slots,
                unit_type: config.unit_type,
                selection,
                time_zone: self.time_zone,
                day_count_available_for_booking: config.day_count_available_for_booking,
                now,
            },
        )
    }

    pub fn is_blocked_between(&self) -> impl Fn(NaiveDate, NaiveDate) -> bool + '_ {
        is_blocked_between(&self.time_slots, self.time_zone)
    }

    /// Block a selection starting on `day` may extend across, as the day
    /// oracle sees it.
    pub fn block_on_day(&self, day: NaiveDate) -> Option<TimeSlot> {
        block_on_day(&self.time_slots, day, self.time_zone)
    }

    /// Contiguous run of adjacent slots around `start`, seats ignored.
    pub fn block_around(&self, start: DateTime<Utc>) -> Option<TimeSlot> {
        combine_around_selected_start(&self.time_slots, start)
            .into_iter()
            .next()
    }

    pub fn seat_options(&self, selection: Selection) -> Vec<u32> {
        let (start, end) = selection.bounds_in(self.time_zone);
        min_seats_options(&self.time_slots, start, end)
    }
}
