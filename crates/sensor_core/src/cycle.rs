//! One simulation cycle: read the active fleet, generate a reading per sensor,
//! raise deduplicated alerts, then persist the readings in a single batch.

use chrono::{DateTime, Utc};
use rand::Rng;
use serde::Serialize;

use crate::alert::maybe_create_alert;
use crate::reading::{generate_reading, ThresholdRange};
use crate::store::{fetch_active_sensors, persist_readings, Store, StoreError};
use crate::{Reading, ReadingStatus, SensorId};

/// Outcome of one simulation cycle.
#[derive(Debug, Clone, Default, Serialize)]
pub struct CycleReport {
    /// Every reading generated this cycle, in sensor order.
    pub readings: Vec<Reading>,
    pub alerts_created: Vec<AlertCreated>,
    pub skipped: Vec<SkippedSensor>,
    /// Sensors whose alert check or insert failed; their readings still persist.
    pub alert_failures: Vec<AlertFailure>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AlertCreated {
    pub sensor_id: SensorId,
    pub sensor_name: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct SkippedSensor {
    pub sensor_id: SensorId,
    pub reason: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct AlertFailure {
    pub sensor_id: SensorId,
    pub error: String,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct BandCounts {
    pub normal: u32,
    pub warning: u32,
    pub critical: u32,
}

impl CycleReport {
    pub fn band_counts(&self) -> BandCounts {
        let mut counts = BandCounts::default();
        for reading in &self.readings {
            match reading.status {
                ReadingStatus::Normal => counts.normal += 1,
                ReadingStatus::Warning => counts.warning += 1,
                ReadingStatus::Critical => counts.critical += 1,
            }
        }
        counts
    }

    pub fn sensors_seen(&self) -> usize {
        self.readings.len() + self.skipped.len()
    }
}

/// Run one simulation cycle against `store`.
///
/// Order of operations:
/// 1. Fetch active sensors.
/// 2. Per sensor, in store order: skip unusable threshold ranges, generate a
///    reading, run alert dedup.
/// 3. Persist all readings in one batch.
///
/// Failures in steps 1 and 3 abort the cycle. A failure in one sensor's alert
/// path is recorded and the cycle moves on.
pub fn run_cycle<S: Store + ?Sized>(
    store: &mut S,
    rng: &mut impl Rng,
    now: DateTime<Utc>,
) -> Result<CycleReport, StoreError> {
    let sensors = fetch_active_sensors(store)?;
    tracing::info!(count = sensors.len(), "active sensors fetched");

    let mut report = CycleReport::default();
    for sensor in &sensors {
        if let Err(reason) = ThresholdRange::from_sensor(sensor).validate() {
            tracing::warn!(sensor_id = %sensor.id, %reason, "skipping sensor with unusable thresholds");
            report.skipped.push(SkippedSensor {
                sensor_id: sensor.id.clone(),
                reason: reason.to_string(),
            });
            continue;
        }

        let reading = generate_reading(sensor, rng, now);
        match maybe_create_alert(store, sensor, &reading) {
            Ok(true) => {
                tracing::info!(sensor_id = %sensor.id, name = %sensor.name, "alert created");
                report.alerts_created.push(AlertCreated {
                    sensor_id: sensor.id.clone(),
                    sensor_name: sensor.name.clone(),
                });
            }
            Ok(false) => {}
            Err(err) => {
                tracing::error!(sensor_id = %sensor.id, error = %err, "alert path failed");
                report.alert_failures.push(AlertFailure {
                    sensor_id: sensor.id.clone(),
                    error: err.to_string(),
                });
            }
        }
        report.readings.push(reading);
    }

    persist_readings(store, &report.readings)?;
    tracing::info!(count = report.readings.len(), "readings persisted");
    Ok(report)
}
