pub mod cursor;
pub mod reading;
pub mod register;
pub mod resolution;
pub mod unit;

pub use cursor::Cursor;
pub use reading::{Reading, ReadingRecord};
pub use register::{Register, RegisterRow};
pub use resolution::{ParseResolutionError, Resolution, ResolutionPolicy, RollupTransition};
pub use unit::{ParseUnitError, Unit};
