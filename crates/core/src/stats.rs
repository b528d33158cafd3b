//! Dataset statistics for dashboards.
//!
//! Aggregates the current snapshot into counts and distributions. The
//! time series covers the 7 days ending at the latest parseable report
//! time, or at `now` when there are no events.

use std::collections::BTreeMap;

use chrono::{Duration, NaiveDate};
use serde::Serialize;

use crate::time::parse_timestamp;
use crate::types::{CityEvent, SensorReading, SensorStatus, Timestamp};

/// Number of days covered by the event time series.
const TIME_SERIES_DAYS: i64 = 7;

/// One day of the event time series.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TimeSeriesPoint {
    /// Day as `YYYY-MM-DD`.
    pub time: String,
    /// Number of events reported that day.
    pub value: usize,
}

/// Aggregated view of a data snapshot.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Statistics {
    pub total_events: usize,
    pub total_sensors: usize,
    pub abnormal_sensors: usize,
    pub event_type_distribution: BTreeMap<String, usize>,
    pub sensor_type_distribution: BTreeMap<String, usize>,
    /// District counts, merging events and sensor readings.
    pub district_distribution: BTreeMap<String, usize>,
    pub time_series: Vec<TimeSeriesPoint>,
}

/// Compute statistics over the snapshot.
pub fn compute(events: &[CityEvent], readings: &[SensorReading], now: Timestamp) -> Statistics {
    let mut event_type_distribution: BTreeMap<String, usize> = BTreeMap::new();
    let mut sensor_type_distribution: BTreeMap<String, usize> = BTreeMap::new();
    let mut district_distribution: BTreeMap<String, usize> = BTreeMap::new();

    for event in events {
        *event_type_distribution
            .entry(event.event_type.clone())
            .or_default() += 1;
        *district_distribution
            .entry(event.location.district.clone())
            .or_default() += 1;
    }
    for reading in readings {
        *sensor_type_distribution
            .entry(reading.sensor_type.clone())
            .or_default() += 1;
        *district_distribution
            .entry(reading.location.district.clone())
            .or_default() += 1;
    }

    let abnormal_sensors = readings
        .iter()
        .filter(|r| r.status == SensorStatus::Abnormal)
        .count();

    Statistics {
        total_events: events.len(),
        total_sensors: readings.len(),
        abnormal_sensors,
        event_type_distribution,
        sensor_type_distribution,
        district_distribution,
        time_series: event_time_series(events, now),
    }
}

/// Per-day event counts for the 7 days ending at the newest report time
/// in the data (so a historical upload charts its own week, not an
/// empty current one).
fn event_time_series(events: &[CityEvent], now: Timestamp) -> Vec<TimeSeriesPoint> {
    let mut per_day: BTreeMap<NaiveDate, usize> = BTreeMap::new();
    let mut latest: Option<NaiveDate> = None;

    for event in events {
        if let Some(reported_at) = parse_timestamp(&event.report_time) {
            let day = reported_at.date_naive();
            *per_day.entry(day).or_default() += 1;
            latest = Some(latest.map_or(day, |l| l.max(day)));
        }
    }

    let anchor = latest.unwrap_or_else(|| now.date_naive());

    (0..TIME_SERIES_DAYS)
        .map(|offset| {
            let day = anchor - Duration::days(TIME_SERIES_DAYS - 1 - offset);
            TimeSeriesPoint {
                time: day.format("%Y-%m-%d").to_string(),
                value: per_day.get(&day).copied().unwrap_or(0),
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Location;
    use chrono::{TimeZone, Utc};

    fn loc(district: &str) -> Location {
        Location {
            district: district.into(),
            street: "建国路".into(),
            lat: 39.9087,
            lng: 116.4075,
        }
    }

    fn event(event_type: &str, district: &str, report_time: &str) -> CityEvent {
        CityEvent {
            id: "e".into(),
            event_type: event_type.into(),
            description: "test".into(),
            location: loc(district),
            report_time: report_time.into(),
            reporter_type: "市民APP".into(),
            status: "未处理".into(),
        }
    }

    fn reading(sensor_type: &str, district: &str, status: SensorStatus) -> SensorReading {
        SensorReading {
            sensor_id: "S1".into(),
            sensor_type: sensor_type.into(),
            location: loc(district),
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
    fn distributions_count_mixed_snapshot() {
        let events = vec![
            event("道路积水", "朝阳区", "2025-11-12T08:00:00"),
            event("道路积水", "朝阳区", "2025-11-12T09:00:00"),
            event("路灯故障", "东城区", "2025-11-12T10:00:00"),
        ];
        let readings = vec![
            reading("积水监测", "朝阳区", SensorStatus::Abnormal),
            reading("PM2.5监测", "西城区", SensorStatus::Normal),
        ];

        let stats = compute(&events, &readings, at_noon());

        assert_eq!(stats.total_events, 3);
        assert_eq!(stats.total_sensors, 2);
        assert_eq!(stats.abnormal_sensors, 1);
        assert_eq!(stats.event_type_distribution["道路积水"], 2);
        assert_eq!(stats.event_type_distribution["路灯故障"], 1);
        assert_eq!(stats.sensor_type_distribution["积水监测"], 1);
        // Districts merge events and readings.
        assert_eq!(stats.district_distribution["朝阳区"], 3);
        assert_eq!(stats.district_distribution["东城区"], 1);
        assert_eq!(stats.district_distribution["西城区"], 1);
    }

    #[test]
    fn time_series_anchors_at_latest_report_day() {
        let events = vec![
            event("道路积水", "朝阳区", "2025-11-10T08:00:00"),
            event("道路积水", "朝阳区", "2025-11-10T09:00:00"),
            event("道路积水", "朝阳区", "2025-11-12T08:00:00"),
        ];

        let stats = compute(&events, &[], at_noon());
        let series = &stats.time_series;

        assert_eq!(series.len(), 7);
        assert_eq!(series[6].time, "2025-11-12");
        assert_eq!(series[6].value, 1);
        assert_eq!(series[4].time, "2025-11-10");
        assert_eq!(series[4].value, 2);
        assert_eq!(series[0].time, "2025-11-06");
        assert_eq!(series[0].value, 0);
    }

    #[test]
    fn empty_events_yield_a_zeroed_week_ending_now() {
        let stats = compute(&[], &[], at_noon());
        assert_eq!(stats.time_series.len(), 7);
        assert!(stats.time_series.iter().all(|p| p.value == 0));
        assert_eq!(stats.time_series[6].time, "2025-11-12");
    }
}
