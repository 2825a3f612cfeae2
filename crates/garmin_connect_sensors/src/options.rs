//! Integration options, kept apart from the account credentials.
//!
//! Options come from an optional JSON file (`GARMIN_CONNECT_OPTIONS_PATH`);
//! individual environment variables override the file. Changes apply on
//! restart.

use std::collections::HashMap;
use std::time::Duration;

use chrono_tz::Tz;
use serde::Deserialize;

use crate::coordinator::DEFAULT_UPDATE_INTERVAL;
use crate::error::{IntegrationError, IntegrationResult};
use crate::groups::{SensorGroup, categories_for_groups};
use crate::snapshot::FetchPlan;

#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct IntegrationOptions {
    /// Enabled groups. `None` means the default selection.
    pub sensor_groups: Option<Vec<SensorGroup>>,
    /// Per-entity enable/disable overrides keyed by entity id.
    pub entity_overrides: HashMap<String, bool>,
    /// IANA zone name used for the account's local day.
    pub time_zone: Option<String>,
    pub update_interval_secs: Option<u64>,
}

fn config_err(msg: impl Into<String>) -> IntegrationError {
    IntegrationError::Config(msg.into())
}

impl IntegrationOptions {
    pub fn from_env() -> IntegrationResult<Self> {
        Self::from_env_with(|k| std::env::var(k).ok())
    }

    /// Testable variant reading values through `get` instead of the process
    /// environment.
    pub fn from_env_with<F>(mut get: F) -> IntegrationResult<Self>
    where
        F: FnMut(&str) -> Option<String>,
    {
        let mut options = match get("GARMIN_CONNECT_OPTIONS_PATH").filter(|p| !p.trim().is_empty()) {
            Some(path) => {
                let text = std::fs::read_to_string(&path)
                    .map_err(|e| config_err(format!("reading options file {path}: {e}")))?;
                serde_json::from_str(&text)
                    .map_err(|e| config_err(format!("parsing options file {path}: {e}")))?
            }
            None => IntegrationOptions::default(),
        };

        if let Some(list) = get("GARMIN_CONNECT_SENSOR_GROUPS") {
            let groups = list
                .split(',')
                .filter(|s| !s.trim().is_empty())
                .map(str::parse::<SensorGroup>)
                .collect::<Result<Vec<_>, _>>()
                .map_err(|e| config_err(format!("GARMIN_CONNECT_SENSOR_GROUPS: {e}")))?;
            options.sensor_groups = Some(groups);
        }
        if let Some(tz) = get("GARMIN_CONNECT_TIME_ZONE").filter(|s| !s.trim().is_empty()) {
            options.time_zone = Some(tz.trim().to_string());
        }
        if let Some(v) = get("GARMIN_CONNECT_UPDATE_INTERVAL_SECS") {
            let secs = v
                .trim()
                .parse::<u64>()
                .map_err(|_| config_err(format!("GARMIN_CONNECT_UPDATE_INTERVAL_SECS: invalid value {v}")))?;
            options.update_interval_secs = Some(secs);
        }

        if options.update_interval_secs == Some(0) {
            return Err(config_err("update interval must be positive"));
        }
        options.time_zone()?;
        Ok(options)
    }

    pub fn time_zone(&self) -> IntegrationResult<Tz> {
        match &self.time_zone {
            None => Ok(Tz::UTC),
            Some(name) => name
                .parse::<Tz>()
                .map_err(|_| config_err(format!("unknown time zone '{name}'"))),
        }
    }

    pub fn update_interval(&self) -> Duration {
        self.update_interval_secs
            .map(Duration::from_secs)
            .unwrap_or(DEFAULT_UPDATE_INTERVAL)
    }

    pub fn groups(&self) -> Vec<SensorGroup> {
        self.sensor_groups
            .clone()
            .unwrap_or_else(SensorGroup::default_groups)
    }

    /// Categories the configured groups need.
    pub fn fetch_plan(&self) -> FetchPlan {
        FetchPlan::from_categories(categories_for_groups(&self.groups()))
    }
}
