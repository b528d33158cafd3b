//! Rule 3: event/sensor correlation detection.
//!
//! Flags grid cells (~0.01°, see [`crate::geo::grid_cell`]) that contain
//! both a reported event and an abnormal sensor reading, with at least
//! one event recent enough to matter. The description quotes the first
//! recent event and the first abnormal reading; the related-id lists
//! carry everything in the cell.

use std::collections::BTreeMap;

use chrono::Duration;
use uuid::Uuid;

use crate::geo::grid_cell;
use crate::time::parse_timestamp;
use crate::types::{
    CityEvent, SensorReading, SensorStatus, Timestamp, Warning, WarningKind, WarningLevel,
    WarningStatus,
};

/// Events older than this (relative to `now`) do not qualify a cell.
const RECENT_EVENT_HOURS: i64 = 24;

#[derive(Default)]
struct Cell<'a> {
    events: Vec<&'a CityEvent>,
    readings: Vec<&'a SensorReading>,
}

/// Scan for cells holding both an event and an abnormal reading.
///
/// `now` is passed in so detection is deterministic under test; the
/// lifecycle manager passes the wall clock.
pub fn detect_correlations(
    events: &[CityEvent],
    readings: &[SensorReading],
    now: Timestamp,
) -> Vec<Warning> {
    // BTreeMap keeps cell order deterministic across runs.
    let mut cells: BTreeMap<(i64, i64), Cell<'_>> = BTreeMap::new();

    for event in events {
        cells
            .entry(grid_cell(event.location.lat, event.location.lng))
            .or_default()
            .events
            .push(event);
    }
    for reading in readings {
        if reading.status != SensorStatus::Abnormal {
            continue;
        }
        cells
            .entry(grid_cell(reading.location.lat, reading.location.lng))
            .or_default()
            .readings
            .push(reading);
    }

    let mut warnings = Vec::new();

    for cell in cells.into_values() {
        if cell.events.is_empty() || cell.readings.is_empty() {
            continue;
        }

        // At least one event must be recent. Unparseable report times
        // fail the recency check but the event still rides along in the
        // related-id list.
        let recent: Vec<&CityEvent> = cell
            .events
            .iter()
            .copied()
            .filter(|event| {
                parse_timestamp(&event.report_time)
                    .map(|at| now - at < Duration::hours(RECENT_EVENT_HOURS))
                    .unwrap_or(false)
            })
            .collect();

        let Some(event) = recent.first() else {
            continue;
        };
        let reading = cell.readings[0];

        warnings.push(Warning {
            id: format!("warning-correlation-{}", Uuid::new_v4()),
            kind: WarningKind::Correlation,
            level: WarningLevel::High,
            title: format!(
                "{}{}异常集中",
                event.location.district, event.location.street
            ),
            description: format!(
                "该位置同时发生{}事件和{}传感器异常，可能存在关联问题",
                event.event_type, reading.sensor_type
            ),
            location: event.location.clone(),
            related_event_ids: Some(cell.events.iter().map(|e| e.id.clone()).collect()),
            related_sensor_ids: Some(
                cell.readings.iter().map(|r| r.sensor_id.clone()).collect(),
            ),
            created_at: now,
            status: WarningStatus::Pending,
            ai_suggestion: None,
        });
    }

    warnings
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Location;
    use chrono::{TimeZone, Utc};

    fn loc(lat: f64, lng: f64) -> Location {
        Location {
            district: "朝阳区".into(),
            street: "建国路".into(),
            lat,
            lng,
        }
    }

    fn event(id: &str, lat: f64, lng: f64, report_time: &str) -> CityEvent {
        CityEvent {
            id: id.into(),
            event_type: "道路积水".into(),
            description: "test".into(),
            location: loc(lat, lng),
            report_time: report_time.into(),
            reporter_type: "市民APP".into(),
            status: "未处理".into(),
        }
    }

    fn reading(sensor_id: &str, lat: f64, lng: f64, status: SensorStatus) -> SensorReading {
        SensorReading {
            sensor_id: sensor_id.into(),
            sensor_type: "积水监测".into(),
            location: loc(lat, lng),
            value: 42.0,
            unit: "cm".into(),
            threshold: 30.0,
            timestamp: "2025-11-12T08:00:00".into(),
            status,
        }
    }

    fn at_noon() -> Timestamp {
        Utc.with_ymd_and_hms(2025, 11, 12, 12, 0, 0).unwrap()
    }

    #[test]
    fn co_located_event_and_abnormal_reading_fire_high_warning() {
        let events = vec![event("e1", 39.9087, 116.4075, "2025-11-12T08:00:00")];
        let readings = vec![reading("S1", 39.9090, 116.4078, SensorStatus::Abnormal)];

        let warnings = detect_correlations(&events, &readings, at_noon());

        assert_eq!(warnings.len(), 1);
        let warning = &warnings[0];
        assert_eq!(warning.kind, WarningKind::Correlation);
        assert_eq!(warning.level, WarningLevel::High);
        assert_eq!(warning.title, "朝阳区建国路异常集中");
        assert_eq!(warning.related_event_ids.as_deref(), Some(&["e1".to_string()][..]));
        assert_eq!(warning.related_sensor_ids.as_deref(), Some(&["S1".to_string()][..]));
    }

    #[test]
    fn normal_reading_does_not_qualify_a_cell() {
        let events = vec![event("e1", 39.9087, 116.4075, "2025-11-12T08:00:00")];
        let readings = vec![reading("S1", 39.9090, 116.4078, SensorStatus::Normal)];
        assert!(detect_correlations(&events, &readings, at_noon()).is_empty());
    }

    #[test]
    fn different_cells_do_not_correlate() {
        let events = vec![event("e1", 39.9087, 116.4075, "2025-11-12T08:00:00")];
        // ~0.05° away: a different cell.
        let readings = vec![reading("S1", 39.9587, 116.4075, SensorStatus::Abnormal)];
        assert!(detect_correlations(&events, &readings, at_noon()).is_empty());
    }

    #[test]
    fn stale_events_do_not_qualify_a_cell() {
        // Reported more than 24h before detection time.
        let events = vec![event("e1", 39.9087, 116.4075, "2025-11-10T08:00:00")];
        let readings = vec![reading("S1", 39.9090, 116.4078, SensorStatus::Abnormal)];
        assert!(detect_correlations(&events, &readings, at_noon()).is_empty());
    }

    #[test]
    fn all_cell_members_are_attached_even_stale_ones() {
        // One recent event qualifies the cell; the stale one still rides
        // along in relatedEvents, and both abnormal sensors are attached.
        let events = vec![
            event("old", 39.9087, 116.4075, "2025-11-01T08:00:00"),
            event("new", 39.9090, 116.4076, "2025-11-12T08:00:00"),
        ];
        let readings = vec![
            reading("S1", 39.9088, 116.4077, SensorStatus::Abnormal),
            reading("S2", 39.9091, 116.4078, SensorStatus::Abnormal),
        ];

        let warnings = detect_correlations(&events, &readings, at_noon());

        assert_eq!(warnings.len(), 1);
        let warning = &warnings[0];
        assert_eq!(
            warning.related_event_ids.as_deref(),
            Some(&["old".to_string(), "new".to_string()][..])
        );
        assert_eq!(
            warning.related_sensor_ids.as_deref(),
            Some(&["S1".to_string(), "S2".to_string()][..])
        );
        // Description and location come from the first recent event.
        assert_eq!(warning.location, events[1].location);
    }

    #[test]
    fn one_warning_per_qualifying_cell() {
        let events = vec![
            event("e1", 39.9087, 116.4075, "2025-11-12T08:00:00"),
            event("e2", 39.9587, 116.4575, "2025-11-12T09:00:00"),
        ];
        let readings = vec![
            reading("S1", 39.9090, 116.4078, SensorStatus::Abnormal),
            reading("S2", 39.9590, 116.4578, SensorStatus::Abnormal),
        ];
        assert_eq!(detect_correlations(&events, &readings, at_noon()).len(), 2);
    }
}
