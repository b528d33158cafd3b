//! Rule 2: sensor streak detection.
//!
//! Flags sensors whose abnormal readings persist across consecutive
//! samples. A single abnormal spike is noise; the rule only fires when
//! the abnormal run is long enough, with adjacent samples close enough
//! in time to count as one episode.

use std::collections::BTreeMap;

use chrono::{Duration, Utc};
use uuid::Uuid;

use crate::time::parse_timestamp;
use crate::types::{
    SensorReading, SensorStatus, Timestamp, Warning, WarningKind, WarningLevel, WarningStatus,
};

/// Adjacent abnormal readings further apart than this break the run.
const MAX_GAP_HOURS: i64 = 2;

/// Representative value beyond this multiple of the threshold makes the
/// warning `high` instead of `medium`.
const HIGH_LEVEL_FACTOR: f64 = 1.5;

/// Scan `readings` for sensors with at least `consecutive_count`
/// closely-spaced abnormal samples.
///
/// Readings with unparseable timestamps are skipped, never fatal.
pub fn detect_sensor_streaks(
    readings: &[SensorReading],
    consecutive_count: usize,
) -> Vec<Warning> {
    let max_gap = Duration::hours(MAX_GAP_HOURS);

    // Abnormal readings per sensor; BTreeMap keeps output order
    // deterministic across runs.
    let mut groups: BTreeMap<&str, Vec<(Timestamp, &SensorReading)>> = BTreeMap::new();
    for reading in readings {
        if reading.status != SensorStatus::Abnormal {
            continue;
        }
        let Some(sampled_at) = parse_timestamp(&reading.timestamp) else {
            tracing::warn!(
                sensor_id = %reading.sensor_id,
                raw = %reading.timestamp,
                "Skipping reading with unparseable timestamp"
            );
            continue;
        };
        groups
            .entry(reading.sensor_id.as_str())
            .or_default()
            .push((sampled_at, reading));
    }

    let mut warnings = Vec::new();

    for (sensor_id, mut abnormal) in groups {
        // Too few abnormal samples overall: skip without scanning.
        if abnormal.len() < consecutive_count {
            continue;
        }
        abnormal.sort_by_key(|(sampled_at, _)| *sampled_at);

        let mut consecutive = 1usize;
        let mut max_consecutive = 1usize;
        let mut start_index = 0usize;

        for i in 1..abnormal.len() {
            let gap = abnormal[i].0 - abnormal[i - 1].0;
            if gap < max_gap {
                consecutive += 1;
                max_consecutive = max_consecutive.max(consecutive);
            } else {
                consecutive = 1;
                start_index = i;
            }
        }

        if max_consecutive >= consecutive_count {
            let representative = abnormal[start_index].1;
            let level = if representative.value > representative.threshold * HIGH_LEVEL_FACTOR {
                WarningLevel::High
            } else {
                WarningLevel::Medium
            };
            warnings.push(Warning {
                id: format!("warning-sensor-{}", Uuid::new_v4()),
                kind: WarningKind::Sensor,
                level,
                title: format!("{}持续异常", representative.sensor_type),
                description: format!(
                    "传感器{sensor_id}连续{max_consecutive}次超过阈值，当前值：{}{}，阈值：{}{}",
                    representative.value,
                    representative.unit,
                    representative.threshold,
                    representative.unit,
                ),
                location: representative.location.clone(),
                related_event_ids: None,
                related_sensor_ids: Some(vec![sensor_id.to_string()]),
                created_at: Utc::now(),
                status: WarningStatus::Pending,
                ai_suggestion: None,
            });
        }
    }

    warnings
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Location;

    fn reading(
        sensor_id: &str,
        value: f64,
        threshold: f64,
        timestamp: &str,
        status: SensorStatus,
    ) -> SensorReading {
        SensorReading {
            sensor_id: sensor_id.into(),
            sensor_type: "积水监测".into(),
            location: Location {
                district: "朝阳区".into(),
                street: "建国路".into(),
                lat: 39.9087,
                lng: 116.4075,
            },
            value,
            unit: "cm".into(),
            threshold,
            timestamp: timestamp.into(),
            status,
        }
    }

    fn abnormal(sensor_id: &str, value: f64, timestamp: &str) -> SensorReading {
        reading(sensor_id, value, 30.0, timestamp, SensorStatus::Abnormal)
    }

    #[test]
    fn hourly_abnormal_run_fires_with_run_start_as_representative() {
        // Abnormal at t=0,1,2,3h; consecutive count 3.
        let readings = vec![
            abnormal("S1", 35.0, "2025-11-12T00:00:00"),
            abnormal("S1", 38.0, "2025-11-12T01:00:00"),
            abnormal("S1", 40.0, "2025-11-12T02:00:00"),
            abnormal("S1", 42.0, "2025-11-12T03:00:00"),
        ];

        let warnings = detect_sensor_streaks(&readings, 3);

        assert_eq!(warnings.len(), 1);
        let warning = &warnings[0];
        assert_eq!(warning.kind, WarningKind::Sensor);
        assert_eq!(warning.title, "积水监测持续异常");
        assert_eq!(warning.related_sensor_ids.as_deref(), Some(&["S1".to_string()][..]));
        // Representative is the run start: 35.0 ≤ 1.5 × 30.0, so medium.
        assert_eq!(warning.level, WarningLevel::Medium);
        assert!(warning.description.contains("连续4次"));
        assert!(warning.description.contains("当前值：35cm"));
    }

    #[test]
    fn representative_value_beyond_factor_is_high_level() {
        let readings = vec![
            abnormal("S1", 50.0, "2025-11-12T00:00:00"), // 50 > 45 = 1.5 × 30
            abnormal("S1", 48.0, "2025-11-12T01:00:00"),
            abnormal("S1", 46.0, "2025-11-12T02:00:00"),
        ];
        let warnings = detect_sensor_streaks(&readings, 3);
        assert_eq!(warnings.len(), 1);
        assert_eq!(warnings[0].level, WarningLevel::High);
    }

    #[test]
    fn gap_of_two_hours_breaks_the_run() {
        // Two runs of length 2, split by an exactly-2h gap: never merges.
        let readings = vec![
            abnormal("S1", 35.0, "2025-11-12T00:00:00"),
            abnormal("S1", 36.0, "2025-11-12T01:00:00"),
            abnormal("S1", 37.0, "2025-11-12T03:00:00"),
            abnormal("S1", 38.0, "2025-11-12T04:00:00"),
        ];
        assert!(detect_sensor_streaks(&readings, 3).is_empty());
    }

    #[test]
    fn gap_just_under_two_hours_keeps_the_run() {
        let readings = vec![
            abnormal("S1", 35.0, "2025-11-12T00:00:00"),
            abnormal("S1", 36.0, "2025-11-12T01:59:00"),
            abnormal("S1", 37.0, "2025-11-12T03:58:00"),
        ];
        assert_eq!(detect_sensor_streaks(&readings, 3).len(), 1);
    }

    #[test]
    fn normal_readings_do_not_count() {
        let readings = vec![
            abnormal("S1", 35.0, "2025-11-12T00:00:00"),
            reading("S1", 20.0, 30.0, "2025-11-12T01:00:00", SensorStatus::Normal),
            abnormal("S1", 36.0, "2025-11-12T01:30:00"),
            abnormal("S1", 37.0, "2025-11-12T02:30:00"),
        ];
        // Abnormal samples at 0:00, 1:30, 2:30 form a run of 3 (the normal
        // sample in between is invisible to the rule).
        assert_eq!(detect_sensor_streaks(&readings, 3).len(), 1);
    }

    #[test]
    fn sensors_are_scanned_independently() {
        let readings = vec![
            abnormal("S1", 35.0, "2025-11-12T00:00:00"),
            abnormal("S2", 36.0, "2025-11-12T00:30:00"),
            abnormal("S1", 37.0, "2025-11-12T01:00:00"),
            abnormal("S2", 38.0, "2025-11-12T01:30:00"),
        ];
        // Each sensor only has a run of 2.
        assert!(detect_sensor_streaks(&readings, 3).is_empty());
    }

    #[test]
    fn too_few_abnormal_readings_is_skipped() {
        let readings = vec![
            abnormal("S1", 35.0, "2025-11-12T00:00:00"),
            abnormal("S1", 36.0, "2025-11-12T01:00:00"),
        ];
        assert!(detect_sensor_streaks(&readings, 3).is_empty());
    }

    #[test]
    fn unparseable_timestamps_are_excluded_not_fatal() {
        let readings = vec![
            abnormal("S1", 35.0, "2025-11-12T00:00:00"),
            abnormal("S1", 36.0, "not-a-time"),
            abnormal("S1", 37.0, "2025-11-12T01:00:00"),
        ];
        // Only two usable samples.
        assert!(detect_sensor_streaks(&readings, 3).is_empty());
    }
}
