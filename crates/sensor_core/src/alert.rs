//! Alert deduplication: at most one active alert per sensor.
//!
//! Check-then-act against the store. Nothing spans the query and the insert,
//! so two simulators racing on one sensor can both insert. A store that
//! enforces uniqueness answers the loser with `Conflict`, which is treated
//! the same as finding an active alert.

use crate::reading::ThresholdRange;
use crate::store::{has_active_alert, to_record, Collection, Store, StoreError};
use crate::{Alert, AlertSeverity, AlertStatus, Reading, ReadingStatus, Sensor};

/// Emit a `critical` alert for `sensor` if `reading` is critical and no alert
/// is active for it yet. Returns whether an alert was inserted.
pub fn maybe_create_alert<S: Store + ?Sized>(
    store: &mut S,
    sensor: &Sensor,
    reading: &Reading,
) -> Result<bool, StoreError> {
    if reading.status != ReadingStatus::Critical {
        return Ok(false);
    }

    if has_active_alert(store, &sensor.id)? {
        tracing::debug!(sensor_id = %sensor.id, "active alert already open, skipping");
        return Ok(false);
    }

    let alert = build_alert(sensor, reading);
    match store.insert_one(Collection::Alerts, to_record(Collection::Alerts, &alert)?) {
        Ok(()) => Ok(true),
        Err(StoreError::Conflict { detail, .. }) => {
            tracing::debug!(sensor_id = %sensor.id, %detail, "alert insert lost to an existing active alert");
            Ok(false)
        }
        Err(err) => Err(err),
    }
}

pub fn build_alert(sensor: &Sensor, reading: &Reading) -> Alert {
    let range = ThresholdRange::from_sensor(sensor);
    let unit = &sensor.unit;
    Alert {
        sensor_id: sensor.id.clone(),
        machinery_id: sensor.machinery_id.clone(),
        alert_type: format!("{} Fuera de Rango", capitalize(&sensor.sensor_type)),
        severity: AlertSeverity::Critical,
        message: format!(
            "El sensor {} registró un valor de {} {unit}, fuera del rango permitido ({}-{} {unit})",
            sensor.name, reading.value, range.min, range.max,
        ),
        status: AlertStatus::Active,
    }
}

/// First character upper-cased, the rest lower-cased.
pub fn capitalize(text: &str) -> String {
    let mut chars = text.chars();
    match chars.next() {
        Some(first) => first
            .to_uppercase()
            .chain(chars.flat_map(char::to_lowercase))
            .collect(),
        None => String::new(),
    }
}
