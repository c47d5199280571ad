use std::{fmt, str::FromStr};

/// Physical unit of a register value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Unit {
    WattHour,
    Watt,
    CubicMetre,
    CubicMetrePerHour,
    Joule,
    DegreeCelsius,
    Kelvin,
    Volt,
    Ampere,
    NoUnit,
}

impl Unit {
    /// Symbol used in persisted register rows.
    pub const fn symbol(self) -> &'static str {
        match self {
            Unit::WattHour => "Wh",
            Unit::Watt => "W",
            Unit::CubicMetre => "m3",
            Unit::CubicMetrePerHour => "m3/h",
            Unit::Joule => "J",
            Unit::DegreeCelsius => "C",
            Unit::Kelvin => "K",
            Unit::Volt => "V",
            Unit::Ampere => "A",
            Unit::NoUnit => "NoUnit",
        }
    }
}

impl fmt::Display for Unit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.symbol())
    }
}

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
#[error("unknown unit symbol '{0}'")]
pub struct ParseUnitError(pub String);

impl FromStr for Unit {
    type Err = ParseUnitError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Wh" => Ok(Unit::WattHour),
            "W" => Ok(Unit::Watt),
            "m3" => Ok(Unit::CubicMetre),
            "m3/h" => Ok(Unit::CubicMetrePerHour),
            "J" => Ok(Unit::Joule),
            "C" => Ok(Unit::DegreeCelsius),
            "K" => Ok(Unit::Kelvin),
            "V" => Ok(Unit::Volt),
            "A" => Ok(Unit::Ampere),
            "NoUnit" => Ok(Unit::NoUnit),
            other => Err(ParseUnitError(other.to_string())),
        }
    }
}
