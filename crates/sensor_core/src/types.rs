//! Type definitions for `sensor_core`.
//!
//! Records exchanged with the store: sensors (input), readings and alerts
//! (output), plus the ID newtypes that correlate them.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// ID newtypes
// ---------------------------------------------------------------------------

macro_rules! string_id {
    ($name:ident) => {
        #[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
        pub struct $name(pub String);

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(&self.0)
            }
        }
    };
}

string_id!(SensorId);
string_id!(MachineryId);

// ---------------------------------------------------------------------------
// Core enums
// ---------------------------------------------------------------------------

/// Severity band of a generated reading.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReadingStatus {
    Normal,
    Warning,
    Critical,
}

impl ReadingStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            ReadingStatus::Normal => "normal",
            ReadingStatus::Warning => "warning",
            ReadingStatus::Critical => "critical",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AlertSeverity {
    Info,
    Warning,
    Critical,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AlertStatus {
    Active,
    Acknowledged,
    Resolved,
}

impl AlertStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            AlertStatus::Active => "active",
            AlertStatus::Acknowledged => "acknowledged",
            AlertStatus::Resolved => "resolved",
        }
    }
}

// ---------------------------------------------------------------------------
// Records
// ---------------------------------------------------------------------------

pub const SENSOR_STATUS_ACTIVE: &str = "active";

/// A sensor row as stored in the `sensors` collection. Read-only here.
///
/// Columns the simulator does not use (timestamps, joined machinery) are
/// ignored on decode.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Sensor {
    pub id: SensorId,
    pub machinery_id: MachineryId,
    pub name: String,
    pub sensor_type: String,
    pub unit: String,
    /// `None` falls back to [`crate::DEFAULT_THRESHOLD_MIN`].
    #[serde(default)]
    pub threshold_min: Option<f64>,
    /// `None` falls back to [`crate::DEFAULT_THRESHOLD_MAX`].
    #[serde(default)]
    pub threshold_max: Option<f64>,
    #[serde(default = "default_sensor_status")]
    pub status: String,
}

fn default_sensor_status() -> String {
    SENSOR_STATUS_ACTIVE.to_string()
}

/// One synthetic reading. `status` is the band that produced `value`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Reading {
    pub sensor_id: SensorId,
    pub value: f64,
    pub status: ReadingStatus,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Alert {
    pub sensor_id: SensorId,
    pub machinery_id: MachineryId,
    pub alert_type: String,
    pub severity: AlertSeverity,
    pub message: String,
    pub status: AlertStatus,
}
