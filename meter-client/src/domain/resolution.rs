use std::{fmt, str::FromStr};

/// Fraction of a local day after which the newest day bucket is trusted (15:00).
pub const DAY_COMPLETENESS_THRESHOLD: f64 = 0.625;
/// Fraction of a local month after which the newest month bucket is trusted.
pub const MONTH_COMPLETENESS_THRESHOLD: f64 = 0.98;
/// Fraction of a local year after which the newest year bucket is trusted.
pub const YEAR_COMPLETENESS_THRESHOLD: f64 = 0.83;

/// Granularity of a stored reading stream, finest first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(
    feature = "serde",
    derive(serde::Serialize, serde::Deserialize),
    serde(rename_all = "lowercase")
)]
pub enum Resolution {
    Live,
    Day,
    Month,
    Year,
}

/// Static per-resolution storage and rollup parameters.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ResolutionPolicy {
    pub stream_name: &'static str,
    pub reading_table: &'static str,
    pub register_table: &'static str,
    /// `None` for resolutions that are never a rollup target.
    pub completeness_threshold: Option<f64>,
}

const LIVE: ResolutionPolicy = ResolutionPolicy {
    stream_name: "live",
    reading_table: "live_reading",
    register_table: "live_register",
    completeness_threshold: None,
};

const DAY: ResolutionPolicy = ResolutionPolicy {
    stream_name: "day",
    reading_table: "day_reading",
    register_table: "day_register",
    completeness_threshold: Some(DAY_COMPLETENESS_THRESHOLD),
};

const MONTH: ResolutionPolicy = ResolutionPolicy {
    stream_name: "month",
    reading_table: "month_reading",
    register_table: "month_register",
    completeness_threshold: Some(MONTH_COMPLETENESS_THRESHOLD),
};

const YEAR: ResolutionPolicy = ResolutionPolicy {
    stream_name: "year",
    reading_table: "year_reading",
    register_table: "year_register",
    completeness_threshold: Some(YEAR_COMPLETENESS_THRESHOLD),
};

impl Resolution {
    pub const ALL: [Resolution; 4] = [
        Resolution::Live,
        Resolution::Day,
        Resolution::Month,
        Resolution::Year,
    ];

    pub fn policy(self) -> &'static ResolutionPolicy {
        match self {
            Resolution::Live => &LIVE,
            Resolution::Day => &DAY,
            Resolution::Month => &MONTH,
            Resolution::Year => &YEAR,
        }
    }

    /// Stream name, also used as the cursor key for a destination resolution.
    pub fn name(self) -> &'static str {
        self.policy().stream_name
    }

    pub const fn coarser(self) -> Option<Resolution> {
        match self {
            Resolution::Live => Some(Resolution::Day),
            Resolution::Day => Some(Resolution::Month),
            Resolution::Month => Some(Resolution::Year),
            Resolution::Year => None,
        }
    }
}

impl fmt::Display for Resolution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
#[error("unknown resolution '{0}'")]
pub struct ParseResolutionError(pub String);

impl FromStr for Resolution {
    type Err = ParseResolutionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Resolution::ALL
            .into_iter()
            .find(|r| r.name().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| ParseResolutionError(s.to_string()))
    }
}

/// One step of the rollup chain, from a resolution into the next coarser one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RollupTransition {
    LiveToDay,
    DayToMonth,
    MonthToYear,
}

impl RollupTransition {
    /// All transitions in dependency order.
    pub const ALL: [RollupTransition; 3] = [
        RollupTransition::LiveToDay,
        RollupTransition::DayToMonth,
        RollupTransition::MonthToYear,
    ];

    pub const fn source(self) -> Resolution {
        match self {
            RollupTransition::LiveToDay => Resolution::Live,
            RollupTransition::DayToMonth => Resolution::Day,
            RollupTransition::MonthToYear => Resolution::Month,
        }
    }

    pub const fn destination(self) -> Resolution {
        match self {
            RollupTransition::LiveToDay => Resolution::Day,
            RollupTransition::DayToMonth => Resolution::Month,
            RollupTransition::MonthToYear => Resolution::Year,
        }
    }
}

impl fmt::Display for RollupTransition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}->{}", self.source(), self.destination())
    }
}
