//! The seam between the simulator and whatever persists its records.
//!
//! A store exposes three collections of JSON-object records and three
//! operations over them. Typed helpers below are the only way the rest of the
//! crate talks to it.

use serde::{de::DeserializeOwned, Serialize};
use serde_json::Value;

use crate::{AlertStatus, Reading, Sensor, SensorId, SENSOR_STATUS_ACTIVE};

pub type Record = serde_json::Map<String, Value>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Collection {
    Sensors,
    SensorReadings,
    Alerts,
}

impl Collection {
    pub fn table_name(self) -> &'static str {
        match self {
            Collection::Sensors => "sensors",
            Collection::SensorReadings => "sensor_readings",
            Collection::Alerts => "alerts",
        }
    }
}

impl std::fmt::Display for Collection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.table_name())
    }
}

/// Equality filter on one field.
#[derive(Debug, Clone, PartialEq)]
pub struct Filter {
    pub field: String,
    pub value: Value,
}

impl Filter {
    pub fn eq(field: &str, value: impl Into<Value>) -> Self {
        Self {
            field: field.to_string(),
            value: value.into(),
        }
    }

    pub fn matches(&self, record: &Record) -> bool {
        record.get(&self.field) == Some(&self.value)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// The store could not be reached (network, DNS, TLS, closed handle).
    #[error("store connection failed: {0}")]
    Connection(String),

    /// The store answered with a failure status.
    #[error("store returned status {status} for {collection}: {body}")]
    Api {
        collection: Collection,
        status: u16,
        body: String,
    },

    /// An insert violated a uniqueness constraint.
    #[error("conflict inserting into {collection}: {detail}")]
    Conflict {
        collection: Collection,
        detail: String,
    },

    /// A record could not be encoded or decoded.
    #[error("malformed {collection} record: {detail}")]
    Malformed {
        collection: Collection,
        detail: String,
    },
}

pub trait Store {
    fn query(
        &mut self,
        collection: Collection,
        filters: &[Filter],
    ) -> Result<Vec<Record>, StoreError>;

    fn insert_one(&mut self, collection: Collection, record: Record) -> Result<(), StoreError>;

    fn insert_batch(
        &mut self,
        collection: Collection,
        records: Vec<Record>,
    ) -> Result<(), StoreError>;
}

impl<S: Store + ?Sized> Store for Box<S> {
    fn query(
        &mut self,
        collection: Collection,
        filters: &[Filter],
    ) -> Result<Vec<Record>, StoreError> {
        (**self).query(collection, filters)
    }

    fn insert_one(&mut self, collection: Collection, record: Record) -> Result<(), StoreError> {
        (**self).insert_one(collection, record)
    }

    fn insert_batch(
        &mut self,
        collection: Collection,
        records: Vec<Record>,
    ) -> Result<(), StoreError> {
        (**self).insert_batch(collection, records)
    }
}

// ---------------------------------------------------------------------------
// Record codec
// ---------------------------------------------------------------------------

pub fn to_record<T: Serialize>(collection: Collection, value: &T) -> Result<Record, StoreError> {
    match serde_json::to_value(value) {
        Ok(Value::Object(map)) => Ok(map),
        Ok(other) => Err(StoreError::Malformed {
            collection,
            detail: format!("expected an object, got {other}"),
        }),
        Err(err) => Err(StoreError::Malformed {
            collection,
            detail: err.to_string(),
        }),
    }
}

pub fn from_record<T: DeserializeOwned>(
    collection: Collection,
    record: Record,
) -> Result<T, StoreError> {
    serde_json::from_value(Value::Object(record)).map_err(|err| StoreError::Malformed {
        collection,
        detail: err.to_string(),
    })
}

// ---------------------------------------------------------------------------
// Typed operations
// ---------------------------------------------------------------------------

pub fn fetch_active_sensors<S: Store + ?Sized>(store: &mut S) -> Result<Vec<Sensor>, StoreError> {
    store
        .query(
            Collection::Sensors,
            &[Filter::eq("status", SENSOR_STATUS_ACTIVE)],
        )?
        .into_iter()
        .map(|record| from_record(Collection::Sensors, record))
        .collect()
}

pub fn active_alert_filters(sensor_id: &SensorId) -> [Filter; 2] {
    [
        Filter::eq("sensor_id", sensor_id.0.as_str()),
        Filter::eq("status", AlertStatus::Active.as_str()),
    ]
}

pub fn has_active_alert<S: Store + ?Sized>(
    store: &mut S,
    sensor_id: &SensorId,
) -> Result<bool, StoreError> {
    let existing = store.query(Collection::Alerts, &active_alert_filters(sensor_id))?;
    Ok(!existing.is_empty())
}

/// All readings in one batch call. Empty input makes no call.
pub fn persist_readings<S: Store + ?Sized>(
    store: &mut S,
    readings: &[Reading],
) -> Result<(), StoreError> {
    if readings.is_empty() {
        return Ok(());
    }
    let records = readings
        .iter()
        .map(|reading| to_record(Collection::SensorReadings, reading))
        .collect::<Result<Vec<_>, _>>()?;
    store.insert_batch(Collection::SensorReadings, records)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_fixtures::{fixed_now, sensor};
    use crate::{MemoryStore, ReadingStatus};

    #[test]
    fn filter_matches_exact_json_value() {
        let mut record = Record::new();
        record.insert("status".to_string(), Value::from("active"));
        assert!(Filter::eq("status", "active").matches(&record));
        assert!(!Filter::eq("status", "resolved").matches(&record));
        assert!(!Filter::eq("sensor_id", "s1").matches(&record));
    }

    #[test]
    fn fetch_active_sensors_skips_inactive_rows() {
        let mut inactive = sensor("s2", 0.0, 1.0);
        inactive.status = "inactive".to_string();
        let mut store = MemoryStore::from_sensors(&[sensor("s1", 0.0, 1.0), inactive]).unwrap();
        let sensors = fetch_active_sensors(&mut store).unwrap();
        assert_eq!(sensors.len(), 1);
        assert_eq!(sensors[0].id.0, "s1");
    }

    #[test]
    fn fetch_active_sensors_reports_undecodable_rows() {
        let mut store = MemoryStore::new();
        let mut bad = Record::new();
        bad.insert("status".to_string(), Value::from("active"));
        store.seed(Collection::Sensors, vec![bad]);
        let err = fetch_active_sensors(&mut store).unwrap_err();
        assert!(matches!(
            err,
            StoreError::Malformed {
                collection: Collection::Sensors,
                ..
            }
        ));
    }

    #[test]
    fn persist_readings_is_one_batch_and_skips_empty() {
        let mut store = MemoryStore::new();
        persist_readings(&mut store, &[]).unwrap();
        assert_eq!(store.batch_calls(Collection::SensorReadings), 0);

        let reading = Reading {
            sensor_id: SensorId("s1".to_string()),
            value: 12.5,
            status: ReadingStatus::Normal,
            timestamp: fixed_now(),
        };
        persist_readings(&mut store, &[reading.clone(), reading]).unwrap();
        assert_eq!(store.batch_calls(Collection::SensorReadings), 1);
        assert_eq!(store.records(Collection::SensorReadings).len(), 2);
        assert_eq!(
            store.records(Collection::SensorReadings)[0]["timestamp"],
            Value::from("2024-05-01T12:00:00Z")
        );
    }
}
