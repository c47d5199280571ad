use std::sync::Arc;

use meter_client::domain::Resolution;
use time::{Date, Month, OffsetDateTime, PrimitiveDateTime, UtcOffset};

use super::ContractError;
use crate::location::LocationContext;

/// Maps UTC instants onto local calendar periods of a rollup resolution.
///
/// Coarse timestamps are local period starts without an offset: they are
/// calendar keys, not instants.
#[derive(Clone)]
pub struct TemporalReducer {
    location: Arc<dyn LocationContext>,
}

impl TemporalReducer {
    pub fn new(location: Arc<dyn LocationContext>) -> Self {
        Self { location }
    }

    /// Local start of the day, month or year containing `timestamp`.
    pub fn reduce(
        &self,
        timestamp: OffsetDateTime,
        resolution: Resolution,
    ) -> Result<PrimitiveDateTime, ContractError> {
        let local = self.to_local(timestamp)?;
        period_start(local.date(), resolution)
    }

    /// Whether `timestamp` lies far enough into its local period for that
    /// period to be treated as finished.
    pub fn is_past_completeness_threshold(
        &self,
        timestamp: OffsetDateTime,
        resolution: Resolution,
    ) -> Result<bool, ContractError> {
        let threshold = resolution
            .policy()
            .completeness_threshold
            .ok_or(ContractError::UnsupportedResolution(resolution))?;

        let local = self.to_local(timestamp)?;
        let wall_clock = PrimitiveDateTime::new(local.date(), local.time());
        let start = period_start(local.date(), resolution)?;
        let end = next_period_start(start.date(), resolution)?;

        let elapsed = (wall_clock - start).as_seconds_f64();
        let length = (end - start).as_seconds_f64();

        Ok(elapsed / length > threshold)
    }

    fn to_local(&self, timestamp: OffsetDateTime) -> Result<OffsetDateTime, ContractError> {
        if timestamp.offset() != UtcOffset::UTC {
            return Err(ContractError::NonUtcTimestamp(timestamp));
        }
        Ok(self.location.convert_to_local(timestamp))
    }
}

fn period_start(date: Date, resolution: Resolution) -> Result<PrimitiveDateTime, ContractError> {
    let start = match resolution {
        Resolution::Day => date,
        Resolution::Month => Date::from_calendar_date(date.year(), date.month(), 1)?,
        Resolution::Year => Date::from_calendar_date(date.year(), Month::January, 1)?,
        Resolution::Live => return Err(ContractError::UnsupportedResolution(resolution)),
    };
    Ok(start.midnight())
}

fn next_period_start(
    start: Date,
    resolution: Resolution,
) -> Result<PrimitiveDateTime, ContractError> {
    let next = match resolution {
        Resolution::Day => Date::from_julian_day(start.to_julian_day() + 1)?,
        Resolution::Month if start.month() == Month::December => {
            Date::from_calendar_date(start.year() + 1, Month::January, 1)?
        }
        Resolution::Month => Date::from_calendar_date(start.year(), start.month().next(), 1)?,
        Resolution::Year => Date::from_calendar_date(start.year() + 1, Month::January, 1)?,
        Resolution::Live => return Err(ContractError::UnsupportedResolution(resolution)),
    };
    Ok(next.midnight())
}
