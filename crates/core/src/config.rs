//! Warning rule configuration and its typed partial-update patch.

use serde::{Deserialize, Serialize};

use crate::error::CoreError;

/// Default event-burst count threshold.
pub const DEFAULT_EVENT_CLUSTER_THRESHOLD: usize = 5;
/// Default event-burst window in hours.
pub const DEFAULT_EVENT_CLUSTER_TIME_WINDOW_HOURS: f64 = 1.0;
/// Default consecutive-abnormal count for sensor streaks.
pub const DEFAULT_SENSOR_CONSECUTIVE_COUNT: usize = 3;
/// Default auto-check period in milliseconds.
pub const DEFAULT_CHECK_INTERVAL_MS: u64 = 60_000;

/// Tunable parameters for the detection rules and the auto-check
/// scheduler. Persisted as a single camelCase JSON document; missing
/// fields fall back to defaults on load.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct WarningConfig {
    /// Rule 1: events of one type in one district within the window
    /// before a cluster warning fires.
    pub event_cluster_threshold: usize,
    /// Rule 1: sliding window size in hours.
    pub event_cluster_time_window_hours: f64,
    /// Rule 2: consecutive abnormal readings before a streak warning fires.
    pub sensor_consecutive_count: usize,
    /// Whether the periodic re-check scheduler should run.
    pub auto_check_enabled: bool,
    /// Period of the re-check scheduler.
    pub check_interval_ms: u64,
}

impl Default for WarningConfig {
    fn default() -> Self {
        Self {
            event_cluster_threshold: DEFAULT_EVENT_CLUSTER_THRESHOLD,
            event_cluster_time_window_hours: DEFAULT_EVENT_CLUSTER_TIME_WINDOW_HOURS,
            sensor_consecutive_count: DEFAULT_SENSOR_CONSECUTIVE_COUNT,
            auto_check_enabled: true,
            check_interval_ms: DEFAULT_CHECK_INTERVAL_MS,
        }
    }
}

impl WarningConfig {
    /// Validate parameter ranges.
    pub fn validate(&self) -> Result<(), CoreError> {
        if self.event_cluster_threshold < 1 {
            return Err(CoreError::Validation(
                "eventClusterThreshold must be at least 1".into(),
            ));
        }
        if !self.event_cluster_time_window_hours.is_finite()
            || self.event_cluster_time_window_hours <= 0.0
        {
            return Err(CoreError::Validation(
                "eventClusterTimeWindowHours must be greater than 0".into(),
            ));
        }
        if self.sensor_consecutive_count < 1 {
            return Err(CoreError::Validation(
                "sensorConsecutiveCount must be at least 1".into(),
            ));
        }
        if self.check_interval_ms == 0 {
            return Err(CoreError::Validation(
                "checkIntervalMs must be greater than 0".into(),
            ));
        }
        Ok(())
    }
}

/// Typed partial update for [`WarningConfig`].
///
/// Only the five recognized fields can be patched; unknown fields in a
/// JSON patch document are dropped by the typed decode instead of being
/// merged silently.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ConfigPatch {
    pub event_cluster_threshold: Option<usize>,
    pub event_cluster_time_window_hours: Option<f64>,
    pub sensor_consecutive_count: Option<usize>,
    pub auto_check_enabled: Option<bool>,
    pub check_interval_ms: Option<u64>,
}

impl ConfigPatch {
    /// Merge this patch over `base`, leaving unset fields unchanged.
    pub fn apply(&self, base: &WarningConfig) -> WarningConfig {
        WarningConfig {
            event_cluster_threshold: self
                .event_cluster_threshold
                .unwrap_or(base.event_cluster_threshold),
            event_cluster_time_window_hours: self
                .event_cluster_time_window_hours
                .unwrap_or(base.event_cluster_time_window_hours),
            sensor_consecutive_count: self
                .sensor_consecutive_count
                .unwrap_or(base.sensor_consecutive_count),
            auto_check_enabled: self.auto_check_enabled.unwrap_or(base.auto_check_enabled),
            check_interval_ms: self.check_interval_ms.unwrap_or(base.check_interval_ms),
        }
    }
}
