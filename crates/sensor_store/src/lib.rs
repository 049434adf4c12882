//! REST client for a PostgREST-style backing store.
//!
//! Implements [`sensor_core::Store`] over `{endpoint}/rest/v1/{table}` using a
//! blocking [`reqwest`] client. The access key is sent both as `apikey` and as
//! a bearer token.

use reqwest::blocking::{Client, RequestBuilder, Response};
use reqwest::StatusCode;
use sensor_core::{Collection, Filter, Record, Store, StoreError};
use serde_json::Value;

/// HTTP store for one project endpoint.
pub struct RestStore {
    client: Client,
    endpoint: String,
    access_key: String,
}

impl RestStore {
    /// * `endpoint` - Base URL, e.g. `https://project.supabase.co`.
    /// * `access_key` - API key with read/insert rights on the three tables.
    pub fn new(endpoint: impl Into<String>, access_key: impl Into<String>) -> Self {
        Self::with_client(Client::new(), endpoint, access_key)
    }

    /// Reuse an existing [`Client`] (connection pooling, custom TLS).
    pub fn with_client(
        client: Client,
        endpoint: impl Into<String>,
        access_key: impl Into<String>,
    ) -> Self {
        Self {
            client,
            endpoint: endpoint.into().trim_end_matches('/').to_string(),
            access_key: access_key.into(),
        }
    }

    pub fn table_url(&self, collection: Collection) -> String {
        format!("{}/rest/v1/{}", self.endpoint, collection.table_name())
    }

    fn authorized(&self, request: RequestBuilder) -> RequestBuilder {
        request
            .header("apikey", &self.access_key)
            .bearer_auth(&self.access_key)
    }

    fn insert(&self, collection: Collection, body: &Value) -> Result<(), StoreError> {
        let response = self
            .authorized(self.client.post(self.table_url(collection)))
            .header("Prefer", "return=minimal")
            .json(body)
            .send()
            .map_err(transport_error)?;
        ensure_success(collection, response)?;
        Ok(())
    }
}

impl Store for RestStore {
    fn query(
        &mut self,
        collection: Collection,
        filters: &[Filter],
    ) -> Result<Vec<Record>, StoreError> {
        tracing::debug!(table = collection.table_name(), filters = filters.len(), "query");
        let response = self
            .authorized(self.client.get(self.table_url(collection)))
            .query(&query_params(filters))
            .send()
            .map_err(transport_error)?;
        let response = ensure_success(collection, response)?;
        response
            .json::<Vec<Record>>()
            .map_err(|err| StoreError::Malformed {
                collection,
                detail: err.to_string(),
            })
    }

    fn insert_one(&mut self, collection: Collection, record: Record) -> Result<(), StoreError> {
        self.insert(collection, &Value::Object(record))
    }

    fn insert_batch(
        &mut self,
        collection: Collection,
        records: Vec<Record>,
    ) -> Result<(), StoreError> {
        let rows = records.into_iter().map(Value::Object).collect();
        self.insert(collection, &Value::Array(rows))
    }
}

// ---- helpers ----

/// `select=*` followed by one `field=eq.value` pair per filter.
pub fn query_params(filters: &[Filter]) -> Vec<(String, String)> {
    let mut params = vec![("select".to_string(), "*".to_string())];
    params.extend(
        filters
            .iter()
            .map(|filter| (filter.field.clone(), format!("eq.{}", filter_text(&filter.value)))),
    );
    params
}

fn filter_text(value: &Value) -> String {
    match value {
        Value::String(text) => text.clone(),
        other => other.to_string(),
    }
}

/// Map a non-2xx status to a store error. `409 Conflict` is a uniqueness
/// violation; everything else is reported verbatim.
pub fn status_error(collection: Collection, status: u16, body: String) -> StoreError {
    if status == StatusCode::CONFLICT.as_u16() {
        StoreError::Conflict {
            collection,
            detail: body,
        }
    } else {
        StoreError::Api {
            collection,
            status,
            body,
        }
    }
}

fn ensure_success(collection: Collection, response: Response) -> Result<Response, StoreError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response
        .text()
        .unwrap_or_else(|_| "<unreadable body>".to_string());
    Err(status_error(collection, status.as_u16(), body))
}

fn transport_error(err: reqwest::Error) -> StoreError {
    StoreError::Connection(err.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn table_url_trims_trailing_slash() {
        let store = RestStore::new("https://example.supabase.co/", "key");
        assert_eq!(
            store.table_url(Collection::SensorReadings),
            "https://example.supabase.co/rest/v1/sensor_readings"
        );
    }

    #[test]
    fn query_params_render_postgrest_equality() {
        let params = query_params(&[
            Filter::eq("sensor_id", "abc-123"),
            Filter::eq("status", "active"),
            Filter::eq("priority", 3),
        ]);
        let expected = [
            ("select", "*"),
            ("sensor_id", "eq.abc-123"),
            ("status", "eq.active"),
            ("priority", "eq.3"),
        ];
        assert_eq!(params.len(), expected.len());
        for ((key, value), (want_key, want_value)) in params.iter().zip(expected) {
            assert_eq!(key, want_key);
            assert_eq!(value, want_value);
        }
    }

    #[test]
    fn conflict_status_maps_to_conflict() {
        let err = status_error(Collection::Alerts, 409, "duplicate key".to_string());
        assert!(matches!(
            err,
            StoreError::Conflict {
                collection: Collection::Alerts,
                ..
            }
        ));
    }

    #[test]
    fn other_statuses_map_to_api_error() {
        let err = status_error(Collection::Sensors, 401, "bad key".to_string());
        match err {
            StoreError::Api { status, body, .. } => {
                assert_eq!(status, 401);
                assert_eq!(body, "bad key");
            }
            other => panic!("unexpected error: {other}"),
        }
    }
}
