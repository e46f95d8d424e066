//! Day oracles handed to a date-range picker.
//!
//! Every function takes the listing's zone explicitly. Days are `NaiveDate`
//! values already expressed in that zone; convert picker input with
//! [`crate::calendar::local_date`] first.

use chrono::{DateTime, NaiveDate, Utc};
use chrono_tz::Tz;

use crate::calendar::{add_days, day_span, local_date, slot_end_day, sub_days};
use crate::model::*;

use super::day_index::{index_by_date, DayIndex};
use super::merge::combine_around_selected_start;

/// First slot with seats that overlaps the local day `day`.
pub fn slot_on_day(slots: &[TimeSlot], day: NaiveDate, tz: Tz) -> Option<&TimeSlot> {
    slots.iter().find(|s| s.has_seats() && s.overlaps_day(day, tz))
}

/// The contiguous block a selection starting on `day` may extend across.
///
/// Seat counts may change inside the block, but a sold-out slot ends it.
pub fn block_on_day(slots: &[TimeSlot], day: NaiveDate, tz: Tz) -> Option<TimeSlot> {
    let idx = slots
        .iter()
        .position(|s| s.has_seats() && s.overlaps_day(day, tz))?;
    let first = slots[..idx]
        .iter()
        .rposition(|s| !s.has_seats())
        .map_or(0, |i| i + 1);
    let last = slots[idx..]
        .iter()
        .position(|s| !s.has_seats())
        .map_or(slots.len(), |i| idx + i);
    let (day_start, _) = day_span(day, tz);
    combine_around_selected_start(&slots[first..last], slots[idx].start.max(day_start))
        .into_iter()
        .next()
}

/// Day within the slot, or exactly the day the slot ends on.
fn within_or_ending_on(slot: &TimeSlot, day: NaiveDate, tz: Tz) -> bool {
    slot.overlaps_day(day, tz) || day == slot_end_day(slot.end, tz)
}

#[derive(Debug, Clone, Copy)]
pub struct DayBlockedParams<'a> {
    /// Flattened, merged slots for the listing.
    pub time_slots: &'a [TimeSlot],
    /// Window the slots are known for; see [`super::fetched_range`].
    pub fetched_range: Option<FetchedRange>,
    pub unit_type: UnitType,
    pub selection: Selection,
    pub time_zone: Tz,
}

/// `is_day_blocked` with the day index built once, for repeated calls from
/// a picker rendering a month grid.
#[derive(Debug, Clone)]
pub struct DayBlockedOracle {
    index: DayIndex,
    start_block: Option<TimeSlot>,
    nightly_start_only: bool,
    time_zone: Tz,
}

impl DayBlockedOracle {
    pub fn new(params: &DayBlockedParams<'_>) -> Self {
        let tz = params.time_zone;
        let index = match params.fetched_range {
            Some(range) => index_by_date(range.start, range.end, params.time_slots, tz),
            None => DayIndex::default(),
        };
        let nightly_start_only =
            !params.unit_type.is_daily() && params.selection.is_start_only();
        let start_block = if nightly_start_only {
            params
                .selection
                .start_date
                .and_then(|d| block_on_day(params.time_slots, d, tz))
        } else {
            None
        };
        Self {
            index,
            start_block,
            nightly_start_only,
            time_zone: tz,
        }
    }

    /// True when the picker must disable `day`.
    ///
    /// Nightly bookings with only a start picked are limited to the block
    /// around the start, plus the block's end day as checkout. Otherwise the
    /// day's own availability decides.
    pub fn is_day_blocked(&self, day: NaiveDate) -> bool {
        if self.nightly_start_only
            && let Some(block) = &self.start_block
        {
            return !within_or_ending_on(block, day, self.time_zone);
        }
        !self.index.has_availability(day)
    }

    pub fn index(&self) -> &DayIndex {
        &self.index
    }
}

pub fn is_day_blocked(day: NaiveDate, params: &DayBlockedParams<'_>) -> bool {
    DayBlockedOracle::new(params).is_day_blocked(day)
}

#[derive(Debug, Clone, Copy)]
pub struct OutsideRangeParams<'a> {
    pub time_slots: &'a [TimeSlot],
    pub unit_type: UnitType,
    pub selection: Selection,
    pub time_zone: Tz,
    pub day_count_available_for_booking: u32,
    pub now: DateTime<Utc>,
}

/// True when `day` lies outside the selectable horizon.
///
/// The horizon is `[today, today + day_count)`. With exactly one boundary
/// picked it narrows to the block around that boundary: from the block's
/// first day to its end day, minus one day for daily bookings whose end
/// date is exclusive.
pub fn is_outside_range(day: NaiveDate, params: &OutsideRangeParams<'_>) -> bool {
    let tz = params.time_zone;
    let today = local_date(params.now, tz);
    let horizon_end = add_days(today, params.day_count_available_for_booking.into());

    let block = params
        .selection
        .single_boundary()
        .and_then(|d| block_on_day(params.time_slots, d, tz));
    let Some(block) = block else {
        return day < today || day >= horizon_end;
    };

    let lower = today.max(local_date(block.start, tz));
    let upper = horizon_end.min(slot_end_day(block.end, tz));
    let last = if params.unit_type.is_daily() {
        sub_days(upper, 1)
    } else {
        upper
    };
    day < lower || day > last
}

/// Oracle for a candidate `[start, end]` range: blocked unless the slot on
/// the start day also covers the end day or ends on it. A single booking
/// cannot cross into a different slot.
pub fn is_blocked_between(
    slots: &[TimeSlot],
    tz: Tz,
) -> impl Fn(NaiveDate, NaiveDate) -> bool + '_ {
    move |start: NaiveDate, end: NaiveDate| match slot_on_day(slots, start, tz) {
        Some(slot) => !within_or_ending_on(slot, end, tz),
        None => true,
    }
}
