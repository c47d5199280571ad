use std::{fs, sync::Arc};

use anyhow::{bail, Context};
use serde::Deserialize;

use crate::{
    location::{FixedOffsetLocation, LocationContext, TimeZoneLocation},
    pipeline::{RollupSettings, DEFAULT_READINGS_PER_LABEL, DEFAULT_STALENESS_DAYS},
    scheduler::ScheduleSettings,
};

#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    pub uri: String,
    pub max_connections: u32,
}

/// Local time of the installation: an IANA zone or a fixed offset.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct LocationConfig {
    pub time_zone: Option<String>,
    pub utc_offset_minutes: Option<i32>,
}

impl LocationConfig {
    pub fn build(&self) -> anyhow::Result<Arc<dyn LocationContext>> {
        match (&self.time_zone, self.utc_offset_minutes) {
            (Some(name), None) => Ok(Arc::new(TimeZoneLocation::from_name(name)?)),
            (None, Some(minutes)) => Ok(Arc::new(FixedOffsetLocation::from_minutes(minutes)?)),
            (Some(_), Some(_)) => {
                bail!("location: set either time_zone or utc_offset_minutes, not both")
            }
            (None, None) => bail!("location: one of time_zone or utc_offset_minutes is required"),
        }
    }
}

fn default_readings_per_label() -> usize {
    DEFAULT_READINGS_PER_LABEL
}

fn default_staleness_days() -> i64 {
    DEFAULT_STALENESS_DAYS
}

fn default_safety_margin_secs() -> i64 {
    900
}

fn default_poll_interval_secs() -> u64 {
    300
}

fn default_max_passes_per_stage() -> u32 {
    100
}

#[derive(Debug, Clone, Deserialize)]
pub struct RollupConfig {
    #[serde(default = "default_readings_per_label")]
    pub readings_per_label: usize,
    #[serde(default = "default_staleness_days")]
    pub staleness_days: i64,
    #[serde(default = "default_safety_margin_secs")]
    pub safety_margin_secs: i64,
    #[serde(default = "default_poll_interval_secs")]
    pub poll_interval_secs: u64,
    #[serde(default = "default_max_passes_per_stage")]
    pub max_passes_per_stage: u32,
}

impl Default for RollupConfig {
    fn default() -> Self {
        Self {
            readings_per_label: default_readings_per_label(),
            staleness_days: default_staleness_days(),
            safety_margin_secs: default_safety_margin_secs(),
            poll_interval_secs: default_poll_interval_secs(),
            max_passes_per_stage: default_max_passes_per_stage(),
        }
    }
}

impl RollupConfig {
    pub fn settings(&self) -> RollupSettings {
        RollupSettings {
            readings_per_label: self.readings_per_label,
            staleness: time::Duration::days(self.staleness_days),
        }
    }

    pub fn schedule(&self) -> ScheduleSettings {
        ScheduleSettings {
            safety_margin: time::Duration::seconds(self.safety_margin_secs),
            poll_interval: std::time::Duration::from_secs(self.poll_interval_secs),
            max_passes_per_stage: self.max_passes_per_stage,
        }
    }

    fn validate(&self) -> anyhow::Result<()> {
        if self.readings_per_label == 0 {
            bail!("rollup.readings_per_label must be > 0");
        }
        if self.max_passes_per_stage == 0 {
            bail!("rollup.max_passes_per_stage must be > 0");
        }
        if self.staleness_days <= 0 {
            bail!("rollup.staleness_days must be > 0");
        }
        if self.safety_margin_secs < 0 {
            bail!("rollup.safety_margin_secs must not be negative");
        }
        if self.poll_interval_secs == 0 {
            bail!("rollup.poll_interval_secs must be > 0");
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct MetricsConfig {
    pub bind_addr: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub database: DatabaseConfig,
    pub location: LocationConfig,
    #[serde(default)]
    pub rollup: RollupConfig,
    pub metrics: Option<MetricsConfig>,
}

impl AppConfig {
    pub fn load() -> anyhow::Result<Self> {
        use std::env;

        let path = env::var("ROLLUP_CONFIG").unwrap_or_else(|_| "rollup-config.toml".to_string());
        let contents =
            fs::read_to_string(&path).with_context(|| format!("reading config file {path}"))?;
        Self::from_toml_str(&contents).with_context(|| format!("loading config file {path}"))
    }

    pub fn from_toml_str(contents: &str) -> anyhow::Result<Self> {
        let cfg: AppConfig = toml::from_str(contents)?;
        cfg.rollup.validate()?;
        cfg.location.build()?;
        Ok(cfg)
    }
}
