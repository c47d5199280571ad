use std::fmt;

use time::{OffsetDateTime, UtcOffset};
use time_tz::{timezones, OffsetDateTimeExt, Tz};

/// Converts UTC instants into the configured local time of the installation.
pub trait LocationContext: Send + Sync {
    fn convert_to_local(&self, utc: OffsetDateTime) -> OffsetDateTime;
}

#[derive(thiserror::Error, Debug)]
pub enum LocationError {
    #[error("unknown time zone '{0}'")]
    UnknownTimeZone(String),
    #[error("invalid utc offset: {0}")]
    InvalidOffset(#[from] time::error::ComponentRange),
    #[error("utc offset of {0} minutes is out of range")]
    OffsetOutOfRange(i32),
}

/// IANA time zone, DST-aware.
#[derive(Clone, Copy)]
pub struct TimeZoneLocation {
    tz: &'static Tz,
}

impl TimeZoneLocation {
    pub fn from_name(name: &str) -> Result<Self, LocationError> {
        timezones::get_by_name(name)
            .map(|tz| Self { tz })
            .ok_or_else(|| LocationError::UnknownTimeZone(name.to_string()))
    }
}

impl fmt::Debug for TimeZoneLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        use time_tz::TimeZone;
        f.debug_struct("TimeZoneLocation")
            .field("tz", &self.tz.name())
            .finish()
    }
}

impl LocationContext for TimeZoneLocation {
    fn convert_to_local(&self, utc: OffsetDateTime) -> OffsetDateTime {
        utc.to_timezone(self.tz)
    }
}

/// Constant offset from UTC, for zones without daylight saving.
#[derive(Debug, Clone, Copy)]
pub struct FixedOffsetLocation {
    offset: UtcOffset,
}

impl FixedOffsetLocation {
    pub fn new(offset: UtcOffset) -> Self {
        Self { offset }
    }

    pub fn from_minutes(minutes: i32) -> Result<Self, LocationError> {
        let seconds = minutes
            .checked_mul(60)
            .ok_or(LocationError::OffsetOutOfRange(minutes))?;
        Ok(Self::new(UtcOffset::from_whole_seconds(seconds)?))
    }

    pub fn utc() -> Self {
        Self::new(UtcOffset::UTC)
    }
}

impl LocationContext for FixedOffsetLocation {
    fn convert_to_local(&self, utc: OffsetDateTime) -> OffsetDateTime {
        utc.to_offset(self.offset)
    }
}
