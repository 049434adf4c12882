//! In-memory [`Store`] for tests, demos and offline runs.

use std::collections::HashMap;

use serde_json::Value;

use crate::store::{to_record, Collection, Filter, Record, Store, StoreError};
use crate::{AlertStatus, Sensor};

#[derive(Debug, Default)]
pub struct MemoryStore {
    tables: HashMap<Collection, Vec<Record>>,
    unique_active_alerts: bool,
    queries: HashMap<Collection, usize>,
    batches: HashMap<Collection, usize>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_sensors(sensors: &[Sensor]) -> Result<Self, StoreError> {
        let mut store = Self::new();
        let records = sensors
            .iter()
            .map(|sensor| to_record(Collection::Sensors, sensor))
            .collect::<Result<Vec<_>, _>>()?;
        store.seed(Collection::Sensors, records);
        Ok(store)
    }

    /// Reject a second active alert for the same sensor with
    /// [`StoreError::Conflict`], like a partial unique index on
    /// `alerts(sensor_id) where status = 'active'`.
    #[must_use]
    pub fn with_unique_active_alerts(mut self) -> Self {
        self.unique_active_alerts = true;
        self
    }

    /// Append records without going through the insert path or counters.
    pub fn seed(&mut self, collection: Collection, records: Vec<Record>) {
        self.tables.entry(collection).or_default().extend(records);
    }

    pub fn records(&self, collection: Collection) -> &[Record] {
        self.tables
            .get(&collection)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn query_count(&self, collection: Collection) -> usize {
        self.queries.get(&collection).copied().unwrap_or(0)
    }

    pub fn batch_calls(&self, collection: Collection) -> usize {
        self.batches.get(&collection).copied().unwrap_or(0)
    }

    fn check_unique(&self, collection: Collection, record: &Record) -> Result<(), StoreError> {
        if !self.unique_active_alerts || collection != Collection::Alerts {
            return Ok(());
        }
        let active = Value::from(AlertStatus::Active.as_str());
        if record.get("status") != Some(&active) {
            return Ok(());
        }
        let Some(sensor_id) = record.get("sensor_id") else {
            return Ok(());
        };
        let clash = self.records(collection).iter().any(|existing| {
            existing.get("status") == Some(&active) && existing.get("sensor_id") == Some(sensor_id)
        });
        if clash {
            return Err(StoreError::Conflict {
                collection,
                detail: format!("active alert already exists for sensor {sensor_id}"),
            });
        }
        Ok(())
    }
}

impl Store for MemoryStore {
    fn query(
        &mut self,
        collection: Collection,
        filters: &[Filter],
    ) -> Result<Vec<Record>, StoreError> {
        *self.queries.entry(collection).or_default() += 1;
        Ok(self
            .records(collection)
            .iter()
            .filter(|record| filters.iter().all(|filter| filter.matches(record)))
            .cloned()
            .collect())
    }

    fn insert_one(&mut self, collection: Collection, record: Record) -> Result<(), StoreError> {
        self.check_unique(collection, &record)?;
        self.tables.entry(collection).or_default().push(record);
        Ok(())
    }

    fn insert_batch(
        &mut self,
        collection: Collection,
        records: Vec<Record>,
    ) -> Result<(), StoreError> {
        *self.batches.entry(collection).or_default() += 1;
        for record in &records {
            self.check_unique(collection, record)?;
        }
        self.tables.entry(collection).or_default().extend(records);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn alert_record(sensor_id: &str, status: &str) -> Record {
        match json!({"sensor_id": sensor_id, "status": status}) {
            Value::Object(map) => map,
            _ => unreachable!(),
        }
    }

    #[test]
    fn query_applies_every_filter() {
        let mut store = MemoryStore::new();
        store.seed(
            Collection::Alerts,
            vec![
                alert_record("s1", "active"),
                alert_record("s1", "resolved"),
                alert_record("s2", "active"),
            ],
        );
        let rows = store
            .query(
                Collection::Alerts,
                &[Filter::eq("sensor_id", "s1"), Filter::eq("status", "active")],
            )
            .unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(store.query_count(Collection::Alerts), 1);
        assert_eq!(store.query_count(Collection::Sensors), 0);
    }

    #[test]
    fn unique_index_rejects_second_active_alert_only() {
        let mut store = MemoryStore::new().with_unique_active_alerts();
        store
            .insert_one(Collection::Alerts, alert_record("s1", "active"))
            .unwrap();
        store
            .insert_one(Collection::Alerts, alert_record("s1", "resolved"))
            .unwrap();
        store
            .insert_one(Collection::Alerts, alert_record("s2", "active"))
            .unwrap();
        let err = store
            .insert_one(Collection::Alerts, alert_record("s1", "active"))
            .unwrap_err();
        assert!(matches!(err, StoreError::Conflict { .. }));
        assert_eq!(store.records(Collection::Alerts).len(), 3);
    }

    #[test]
    fn without_unique_index_duplicates_are_accepted() {
        let mut store = MemoryStore::new();
        store
            .insert_one(Collection::Alerts, alert_record("s1", "active"))
            .unwrap();
        store
            .insert_one(Collection::Alerts, alert_record("s1", "active"))
            .unwrap();
        assert_eq!(store.records(Collection::Alerts).len(), 2);
    }
}
