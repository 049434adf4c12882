//! Drives `RestStore` against a one-shot HTTP responder on localhost.

use sensor_core::store::fetch_active_sensors;
use sensor_core::test_fixtures::sensor;
use sensor_core::{Collection, Filter, Record, Store, StoreError};
use sensor_store::RestStore;
use std::io::{BufRead, BufReader, Read, Write};
use std::net::TcpListener;
use std::sync::mpsc;
use std::thread;

struct Captured {
    request_line: String,
    headers: Vec<String>,
    body: String,
}

/// Serve exactly one request with `status` and `body`, returning what was sent.
fn serve_once(status: &'static str, body: String) -> (String, mpsc::Receiver<Captured>) {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let endpoint = format!("http://{}", listener.local_addr().unwrap());
    let (tx, rx) = mpsc::channel();

    thread::spawn(move || {
        let (stream, _) = listener.accept().unwrap();
        let mut reader = BufReader::new(stream.try_clone().unwrap());

        let mut request_line = String::new();
        reader.read_line(&mut request_line).unwrap();
        let mut headers = Vec::new();
        let mut content_length = 0;
        loop {
            let mut line = String::new();
            reader.read_line(&mut line).unwrap();
            let line = line.trim_end().to_string();
            if line.is_empty() {
                break;
            }
            if let Some(value) = line.to_ascii_lowercase().strip_prefix("content-length:") {
                content_length = value.trim().parse().unwrap();
            }
            headers.push(line);
        }
        let mut body_bytes = vec![0; content_length];
        reader.read_exact(&mut body_bytes).unwrap();

        let mut stream = stream;
        write!(
            stream,
            "HTTP/1.1 {status}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
            body.len()
        )
        .unwrap();
        stream.flush().unwrap();

        tx.send(Captured {
            request_line: request_line.trim_end().to_string(),
            headers,
            body: String::from_utf8(body_bytes).unwrap(),
        })
        .unwrap();
    });

    (endpoint, rx)
}

fn has_header(captured: &Captured, expected: &str) -> bool {
    captured
        .headers
        .iter()
        .any(|h| h.eq_ignore_ascii_case(expected))
}

#[test]
fn query_sends_filters_and_key_headers() {
    let rows = serde_json::json!([sensor("s1", 10.0, 20.0)]).to_string();
    let (endpoint, rx) = serve_once("200 OK", rows);
    let mut store = RestStore::new(endpoint, "secret-key");

    let sensors = fetch_active_sensors(&mut store).unwrap();
    assert_eq!(sensors.len(), 1);
    assert_eq!(sensors[0].id.0, "s1");

    let captured = rx.recv().unwrap();
    assert!(
        captured.request_line.starts_with("GET /rest/v1/sensors?select="),
        "{}",
        captured.request_line
    );
    assert!(captured.request_line.contains("&status=eq.active "));
    assert!(has_header(&captured, "apikey: secret-key"));
    assert!(has_header(&captured, "authorization: Bearer secret-key"));
}

#[test]
fn batch_insert_posts_a_json_array() {
    let (endpoint, rx) = serve_once("201 Created", String::new());
    let mut store = RestStore::new(endpoint, "k");

    let mut first = Record::new();
    first.insert("value".to_string(), serde_json::Value::from(1.5));
    let second = first.clone();
    store
        .insert_batch(Collection::SensorReadings, vec![first, second])
        .unwrap();

    let captured = rx.recv().unwrap();
    assert_eq!(captured.request_line, "POST /rest/v1/sensor_readings HTTP/1.1");
    assert!(has_header(&captured, "prefer: return=minimal"));
    let body: serde_json::Value = serde_json::from_str(&captured.body).unwrap();
    assert_eq!(body.as_array().map(Vec::len), Some(2));
}

#[test]
fn conflict_response_surfaces_as_conflict() {
    let (endpoint, _rx) = serve_once("409 Conflict", r#"{"code":"23505"}"#.to_string());
    let mut store = RestStore::new(endpoint, "k");

    let err = store
        .insert_one(Collection::Alerts, Record::new())
        .unwrap_err();
    assert!(matches!(err, StoreError::Conflict { .. }), "{err}");
}

#[test]
fn non_array_body_is_malformed() {
    let (endpoint, _rx) = serve_once("200 OK", r#"{"oops":true}"#.to_string());
    let mut store = RestStore::new(endpoint, "k");

    let err = store
        .query(Collection::Alerts, &[Filter::eq("status", "active")])
        .unwrap_err();
    assert!(matches!(err, StoreError::Malformed { .. }), "{err}");
}

#[test]
fn unreachable_endpoint_is_a_connection_error() {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let endpoint = format!("http://{}", listener.local_addr().unwrap());
    drop(listener);
    let mut store = RestStore::new(endpoint, "k");

    let err = store.query(Collection::Sensors, &[]).unwrap_err();
    assert!(matches!(err, StoreError::Connection(_)), "{err}");
}
