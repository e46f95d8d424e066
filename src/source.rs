use std::path::Path;

use async_trait::async_trait;
use chrono_tz::Tz;
use ulid::Ulid;

use crate::engine::EngineError;
use crate::model::*;

/// Where time slots come from: the booking backend in production.
///
/// Implementations return the slots overlapping `window`, sorted by start and
/// disjoint. Slots may be clipped to the window.
#[async_trait]
pub trait TimeSlotSource: Send + Sync {
    async fn fetch_time_slots(
        &self,
        listing_id: Ulid,
        window: FetchedRange,
        time_zone: Tz,
    ) -> Result<Vec<TimeSlot>, FetchError>;
}

/// Serves one listing's slots from a JSON array of
/// `{"start": RFC 3339, "end": RFC 3339, "seats": n}` objects.
#[derive(Debug, Clone, Default)]
pub struct JsonFileSource {
    slots: Vec<TimeSlot>,
}

impl JsonFileSource {
    pub fn load(path: &Path) -> Result<Self, EngineError> {
        let raw = std::fs::read_to_string(path)?;
        Self::from_json(&raw)
    }

    pub fn from_json(json: &str) -> Result<Self, EngineError> {
        let slots: Vec<TimeSlot> = serde_json::from_str(json)
            .map_err(|e| EngineError::InvalidConfig(format!("time slot file: {e}")))?;
        if let Some(bad) = slots.iter().find(|s| s.start >= s.end) {
            return Err(EngineError::InvalidConfig(format!(
                "time slot ends before it starts: {} .. {}",
                bad.start, bad.end
            )));
        }
        Ok(Self::from_slots(slots))
    }

    pub fn from_slots(mut slots: Vec<TimeSlot>) -> Self {
        slots.sort_by_key(|s| s.start);
        Self { slots }
    }

    pub fn slots(&self) -> &[TimeSlot] {
        &self.slots
    }
}

#[async_trait]
impl TimeSlotSource for JsonFileSource {
    async fn fetch_time_slots(
        &self,
        _listing_id: Ulid,
        window: FetchedRange,
        _time_zone: Tz,
    ) -> Result<Vec<TimeSlot>, FetchError> {
        // Everything at index >= right_bound starts at or after window.end.
        let right_bound = self.slots.partition_point(|s| s.start < window.end);
        Ok(self.slots[..right_bound]
            .iter()
            .filter(|s| s.end > window.start)
            .map(|s| TimeSlot::new(s.start.max(window.start), s.end.min(window.end), s.seats))
            .collect())
    }
}
