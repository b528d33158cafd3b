//! Rule 1: event cluster detection.
//!
//! Flags a same-district, same-type event burst: when the number of
//! events inside a sliding time window reaches the configured threshold,
//! one warning is emitted for that (district, type) group and the scan
//! moves on. One warning per group per detection pass, so a burst that
//! stays hot does not re-fire every cycle (the lifecycle manager's
//! identity check drops the repeat anyway).

use std::collections::BTreeMap;

use chrono::{DateTime, Duration, Utc};
use uuid::Uuid;

use crate::time::parse_timestamp;
use crate::types::{CityEvent, Timestamp, Warning, WarningKind, WarningLevel, WarningStatus};

/// In-window event count at or above which a cluster warning is `high`
/// instead of `medium`.
const HIGH_LEVEL_EVENT_COUNT: usize = 10;

const MILLIS_PER_HOUR: f64 = 3_600_000.0;

/// Scan `events` for same-district, same-type bursts.
///
/// The window is half-open `[t, t + window_hours)` anchored at each
/// event of a group in report-time order; the anchor itself counts.
/// Events with unparseable report times are skipped, never fatal.
pub fn detect_event_clusters(
    events: &[CityEvent],
    window_hours: f64,
    threshold: usize,
) -> Vec<Warning> {
    let window = Duration::milliseconds((window_hours * MILLIS_PER_HOUR) as i64);

    // BTreeMap keeps group order deterministic across runs.
    let mut groups: BTreeMap<(String, String), Vec<(Timestamp, &CityEvent)>> = BTreeMap::new();
    for event in events {
        let Some(reported_at) = parse_timestamp(&event.report_time) else {
            tracing::warn!(
                event_id = %event.id,
                raw = %event.report_time,
                "Skipping event with unparseable report time"
            );
            continue;
        };
        groups
            .entry((event.location.district.clone(), event.event_type.clone()))
            .or_default()
            .push((reported_at, event));
    }

    let mut warnings = Vec::new();

    for ((district, event_type), mut group) in groups {
        group.sort_by_key(|(reported_at, _)| *reported_at);

        for (anchor_time, anchor) in &group {
            let window_start = *anchor_time;
            // An oversized window saturates past the representable time
            // range; clamp so it simply covers everything after the
            // anchor instead of overflowing.
            let window_end = window_start
                .checked_add_signed(window)
                .unwrap_or(DateTime::<Utc>::MAX_UTC);

            let in_window: Vec<&CityEvent> = group
                .iter()
                .filter(|(t, _)| *t >= window_start && *t < window_end)
                .map(|(_, event)| *event)
                .collect();

            if in_window.len() >= threshold {
                let level = if in_window.len() >= HIGH_LEVEL_EVENT_COUNT {
                    WarningLevel::High
                } else {
                    WarningLevel::Medium
                };
                warnings.push(Warning {
                    id: format!("warning-event-{}", Uuid::new_v4()),
                    kind: WarningKind::Event,
                    level,
                    title: format!("{district}{event_type}集中爆发"),
                    description: format!(
                        "{}至{}期间，{district}发生{}起{event_type}事件，超过阈值{threshold}次",
                        window_start.format("%Y-%m-%d %H:%M"),
                        window_end.format("%H:%M"),
                        in_window.len(),
                    ),
                    location: anchor.location.clone(),
                    related_event_ids: Some(in_window.iter().map(|e| e.id.clone()).collect()),
                    related_sensor_ids: None,
                    created_at: Utc::now(),
                    status: WarningStatus::Pending,
                    ai_suggestion: None,
                });
                // One warning per group: stop at the first qualifying window.
                break;
            }
        }
    }

    warnings
}
