use chrono_tz::Tz;
use serde::Deserialize;

use crate::engine::EngineError;
use crate::limits::*;
use crate::model::UnitType;

pub const ENV_TIME_ZONE: &str = "BOOKABLE_TIME_ZONE";
pub const ENV_DAY_COUNT_AVAILABLE: &str = "BOOKABLE_DAY_COUNT_AVAILABLE";
pub const ENV_UNIT_TYPE: &str = "BOOKABLE_UNIT_TYPE";

/// Per-listing calendar settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct CalendarConfig {
    /// IANA zone the listing's days are counted in.
    pub time_zone: Tz,
    /// How many days ahead of today bookings may be made.
    pub day_count_available_for_booking: u32,
    pub unit_type: UnitType,
}

impl Default for CalendarConfig {
    fn default() -> Self {
        Self {
            time_zone: chrono_tz::Etc::UTC,
            day_count_available_for_booking: DEFAULT_DAY_COUNT_AVAILABLE_FOR_BOOKING,
            unit_type: UnitType::Nightly,
        }
    }
}

impl CalendarConfig {
    pub fn from_env() -> Result<Self, EngineError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Read settings through `lookup`, falling back to defaults for unset keys.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, EngineError> {
        let mut config = Self::default();
        if let Some(tz) = lookup(ENV_TIME_ZONE) {
            config.time_zone = parse_time_zone(&tz)?;
        }
        if let Some(days) = lookup(ENV_DAY_COUNT_AVAILABLE) {
            config.day_count_available_for_booking = days.trim().parse().map_err(|_| {
                EngineError::InvalidConfig(format!("{ENV_DAY_COUNT_AVAILABLE}: not a number: {days:?}"))
            })?;
        }
        if let Some(unit) = lookup(ENV_UNIT_TYPE) {
            config.unit_type = unit
                .trim()
                .parse()
                .map_err(|e| EngineError::InvalidConfig(format!("{ENV_UNIT_TYPE}: {e}")))?;
        }
        config.validate()?;
        Ok(config)
    }

    pub fn from_json(json: &str) -> Result<Self, EngineError> {
        let config: Self =
            serde_json::from_str(json).map_err(|e| EngineError::InvalidConfig(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), EngineError> {
        if self.day_count_available_for_booking == 0 {
            return Err(EngineError::InvalidConfig(
                "day_count_available_for_booking must be at least 1".into(),
            ));
        }
        if self.day_count_available_for_booking > MAX_DAY_COUNT_AVAILABLE_FOR_BOOKING {
            return Err(EngineError::LimitExceeded("booking horizon too long"));
        }
        Ok(())
    }
}

pub fn parse_time_zone(name: &str) -> Result<Tz, EngineError> {
    name.trim()
        .parse::<Tz>()
        .map_err(|_| EngineError::InvalidTimeZone(name.to_string()))
}
