//! Shared data model: events, sensor readings, and warnings.
//!
//! Serialized field names stay camelCase so documents written by earlier
//! deployments load unchanged (`Warning.kind` serializes as `"type"`,
//! `created_at` as `"timestamp"`).

use serde::{Deserialize, Serialize};

/// All timestamps handled internally are UTC.
pub type Timestamp = chrono::DateTime<chrono::Utc>;

/// A geographic position attached to an event or sensor reading.
/// Immutable once attached.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Location {
    /// District name, e.g. 朝阳区.
    pub district: String,
    /// Street name, e.g. 建国路.
    pub street: String,
    /// Latitude (WGS84).
    pub lat: f64,
    /// Longitude (WGS84).
    pub lng: f64,
}

/// A discrete city event reported by a citizen, inspector, or hotline.
/// Created by the upload pipeline; read-only to this engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CityEvent {
    pub id: String,
    /// Event category, e.g. 道路积水, 路灯故障.
    #[serde(rename = "type")]
    pub event_type: String,
    pub description: String,
    pub location: Location,
    /// Raw report time as uploaded. Parsed leniently by the detectors;
    /// an unparseable value excludes the event from time-based rules.
    pub report_time: String,
    /// Report source, e.g. 市民APP, 网格员.
    pub reporter_type: String,
    /// Handling status of the underlying report (free-form).
    pub status: String,
}

/// Health state reported with each sensor sample.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SensorStatus {
    /// Value within threshold. Legacy documents use the literal 正常.
    #[serde(alias = "正常")]
    Normal,
    /// Value beyond threshold. Legacy documents use the literal 异常.
    #[serde(alias = "异常")]
    Abnormal,
}

/// One sample from an IoT sensor. Multiple readings share a `sensor_id`
/// over time. Read-only to this engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SensorReading {
    pub sensor_id: String,
    /// Sensor category, e.g. 积水监测, PM2.5监测.
    #[serde(rename = "type")]
    pub sensor_type: String,
    pub location: Location,
    pub value: f64,
    /// Unit of `value`, e.g. cm, μg/m³.
    pub unit: String,
    /// Values beyond this are considered abnormal.
    pub threshold: f64,
    /// Raw sample time as uploaded; parsed leniently by the detectors.
    pub timestamp: String,
    pub status: SensorStatus,
}

/// Which detection rule produced a warning.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WarningKind {
    /// Same-district, same-type event burst.
    Event,
    /// Sensor with persistent consecutive abnormal readings.
    Sensor,
    /// Co-located event + sensor anomaly.
    Correlation,
}

impl WarningKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            WarningKind::Event => "event",
            WarningKind::Sensor => "sensor",
            WarningKind::Correlation => "correlation",
        }
    }
}

/// Operational severity of a warning.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WarningLevel {
    High,
    Medium,
    Low,
}

impl WarningLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            WarningLevel::High => "high",
            WarningLevel::Medium => "medium",
            WarningLevel::Low => "low",
        }
    }
}

/// Operator-driven handling state of a warning.
///
/// Transitions are caller-driven: the engine accepts any of the three
/// states in any order (see DESIGN.md).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WarningStatus {
    Pending,
    Processing,
    Resolved,
}

impl WarningStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            WarningStatus::Pending => "pending",
            WarningStatus::Processing => "processing",
            WarningStatus::Resolved => "resolved",
        }
    }
}

/// A detected anomaly surfaced to operators.
///
/// Created by a detector during a check cycle, appended to the live list
/// and history, then mutated in place (`status`, `ai_suggestion`) by
/// explicit operator actions. The id is stable for the warning's lifetime.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Warning {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: WarningKind,
    pub level: WarningLevel,
    pub title: String,
    pub description: String,
    pub location: Location,
    /// Ids of the events that triggered this warning, if any.
    #[serde(rename = "relatedEvents", skip_serializing_if = "Option::is_none")]
    pub related_event_ids: Option<Vec<String>>,
    /// Ids of the sensors that triggered this warning, if any.
    #[serde(rename = "relatedSensors", skip_serializing_if = "Option::is_none")]
    pub related_sensor_ids: Option<Vec<String>>,
    #[serde(rename = "timestamp")]
    pub created_at: Timestamp,
    pub status: WarningStatus,
    /// Operator-requested AI suggestion, attached after the fact.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ai_suggestion: Option<String>,
}

impl Warning {
    /// Deduplication identity: same place, same rule, same title.
    ///
    /// Detector titles are derived deterministically from the triggering
    /// data, so repeated detection of the same anomaly yields the same key.
    pub fn identity_key(&self) -> String {
        format!(
            "{}_{}_{}_{}",
            self.location.district,
            self.location.street,
            self.kind.as_str(),
            self.title
        )
    }

    /// Whether `other` describes the same anomaly as `self`.
    pub fn matches_identity(&self, other: &Warning) -> bool {
        self.location.district == other.location.district
            && self.location.street == other.location.street
            && self.kind == other.kind
            && self.title == other.title
    }
}
