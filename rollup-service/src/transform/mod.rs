//! Pure reductions from a source window to the readings worth rolling up.

pub mod bucket;
pub mod continuity;
pub mod temporal;

use meter_client::domain::Resolution;
use time::OffsetDateTime;

pub use bucket::{BucketReducer, CoarseBounds, CoarseBucket, ReducedWindow};
pub use continuity::exchange_boundary;
pub use temporal::TemporalReducer;

/// Caller errors; never retried.
#[derive(thiserror::Error, Debug)]
pub enum ContractError {
    #[error("timestamp {0} is not in UTC")]
    NonUtcTimestamp(OffsetDateTime),
    #[error("resolution '{0}' is not a rollup target")]
    UnsupportedResolution(Resolution),
    #[error("calendar period out of range: {0}")]
    OutOfRange(#[from] time::error::ComponentRange),
}
