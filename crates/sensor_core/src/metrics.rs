//! Per-cycle metrics computed from a `CycleReport`.
//!
//! `compute_metrics(cycle, &CycleReport) -> CycleMetrics` samples one cycle for
//! time-series analysis; `MetricsFileWriter` appends snapshots to rotating CSV
//! files in a run directory.

use crate::CycleReport;
use serde::Serialize;
use std::io::Write;

/// Current schema version. Bump when fields are added/removed/reordered.
const METRICS_VERSION: u32 = 1;

#[derive(Debug, Clone, Serialize)]
pub struct CycleMetrics {
    pub cycle: u64,
    pub metrics_version: u32,

    // Fleet
    pub sensors_active: u32,
    pub sensors_skipped: u32,

    // Bands
    pub readings_normal: u32,
    pub readings_warning: u32,
    pub readings_critical: u32,
    pub critical_pct: f64,

    // Alerts
    pub alerts_created: u32,
    pub alert_failures: u32,
}

#[allow(clippy::cast_possible_truncation)]
pub fn compute_metrics(cycle: u64, report: &CycleReport) -> CycleMetrics {
    let bands = report.band_counts();
    let total = bands.normal + bands.warning + bands.critical;
    let critical_pct = if total == 0 {
        0.0
    } else {
        f64::from(bands.critical) / f64::from(total)
    };

    CycleMetrics {
        cycle,
        metrics_version: METRICS_VERSION,
        sensors_active: report.sensors_seen() as u32,
        sensors_skipped: report.skipped.len() as u32,
        readings_normal: bands.normal,
        readings_warning: bands.warning,
        readings_critical: bands.critical,
        critical_pct,
        alerts_created: report.alerts_created.len() as u32,
        alert_failures: report.alert_failures.len() as u32,
    }
}

pub fn write_metrics_header(writer: &mut impl std::io::Write) -> std::io::Result<()> {
    writeln!(
        writer,
        "cycle,metrics_version,\
         sensors_active,sensors_skipped,\
         readings_normal,readings_warning,readings_critical,critical_pct,\
         alerts_created,alert_failures"
    )
}

pub fn append_metrics_row(
    writer: &mut impl std::io::Write,
    snapshot: &CycleMetrics,
) -> std::io::Result<()> {
    writeln!(
        writer,
        "{},{},{},{},{},{},{},{:.4},{},{}",
        snapshot.cycle,
        snapshot.metrics_version,
        snapshot.sensors_active,
        snapshot.sensors_skipped,
        snapshot.readings_normal,
        snapshot.readings_warning,
        snapshot.readings_critical,
        snapshot.critical_pct,
        snapshot.alerts_created,
        snapshot.alert_failures,
    )
}

/// Maximum data rows per CSV file before rotating to a new file.
const MAX_ROWS_PER_FILE: usize = 50_000;

/// Rotating metrics CSV writer. Splits into numbered files
/// (`metrics_000.csv`, `metrics_001.csv`, ...) after a fixed row count each.
pub struct MetricsFileWriter {
    run_dir: std::path::PathBuf,
    max_rows: usize,
    file_index: u32,
    rows_in_current_file: usize,
    writer: std::io::BufWriter<std::fs::File>,
}

impl MetricsFileWriter {
    /// Create a new writer, opening the first CSV file with a header row.
    pub fn new(run_dir: std::path::PathBuf) -> std::io::Result<Self> {
        Self::with_max_rows(run_dir, MAX_ROWS_PER_FILE)
    }

    pub fn with_max_rows(run_dir: std::path::PathBuf, max_rows: usize) -> std::io::Result<Self> {
        let writer = open_csv_file(&run_dir, 0)?;
        Ok(Self {
            run_dir,
            max_rows: max_rows.max(1),
            file_index: 0,
            rows_in_current_file: 0,
            writer,
        })
    }

    /// Append one snapshot row, rotating to a new file if the current one is full.
    pub fn write_row(&mut self, snapshot: &CycleMetrics) -> std::io::Result<()> {
        if self.rows_in_current_file >= self.max_rows {
            self.writer.flush()?;
            self.file_index += 1;
            self.writer = open_csv_file(&self.run_dir, self.file_index)?;
            self.rows_in_current_file = 0;
        }
        append_metrics_row(&mut self.writer, snapshot)?;
        self.writer.flush()?;
        self.rows_in_current_file += 1;
        Ok(())
    }

    pub fn flush(&mut self) -> std::io::Result<()> {
        self.writer.flush()
    }
}

fn open_csv_file(
    run_dir: &std::path::Path,
    index: u32,
) -> std::io::Result<std::io::BufWriter<std::fs::File>> {
    let path = run_dir.join(format!("metrics_{index:03}.csv"));
    let file = std::fs::File::create(path)?;
    let mut writer = std::io::BufWriter::new(file);
    write_metrics_header(&mut writer)?;
    Ok(writer)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cycle::{AlertCreated, AlertFailure, SkippedSensor};
    use crate::test_fixtures::fixed_now;
    use crate::{Reading, ReadingStatus, SensorId};

    fn reading(id: &str, status: ReadingStatus) -> Reading {
        Reading {
            sensor_id: SensorId(id.to_string()),
            value: 1.0,
            status,
            timestamp: fixed_now(),
        }
    }

    fn sample_report() -> CycleReport {
        CycleReport {
            readings: vec![
                reading("a", ReadingStatus::Normal),
                reading("b", ReadingStatus::Normal),
                reading("c", ReadingStatus::Warning),
                reading("d", ReadingStatus::Critical),
            ],
            alerts_created: vec![AlertCreated {
                sensor_id: SensorId("d".to_string()),
                sensor_name: "Sensor d".to_string(),
            }],
            skipped: vec![SkippedSensor {
                sensor_id: SensorId("e".to_string()),
                reason: "threshold_min equals threshold_max (5)".to_string(),
            }],
            alert_failures: vec![AlertFailure {
                sensor_id: SensorId("d".to_string()),
                error: "store connection failed".to_string(),
            }],
        }
    }

    #[test]
    fn metrics_count_bands_and_outcomes() {
        let snapshot = compute_metrics(7, &sample_report());
        assert_eq!(snapshot.cycle, 7);
        assert_eq!(snapshot.metrics_version, METRICS_VERSION);
        assert_eq!(snapshot.sensors_active, 5);
        assert_eq!(snapshot.sensors_skipped, 1);
        assert_eq!(
            (
                snapshot.readings_normal,
                snapshot.readings_warning,
                snapshot.readings_critical
            ),
            (2, 1, 1)
        );
        assert!((snapshot.critical_pct - 0.25).abs() < 1e-12);
        assert_eq!(snapshot.alerts_created, 1);
        assert_eq!(snapshot.alert_failures, 1);
    }

    #[test]
    fn empty_report_has_zero_critical_pct() {
        let snapshot = compute_metrics(0, &CycleReport::default());
        assert!(snapshot.critical_pct.abs() < f64::EPSILON);
        assert_eq!(snapshot.sensors_active, 0);
    }

    #[test]
    fn header_and_row_have_matching_column_counts() {
        let mut buf = Vec::new();
        write_metrics_header(&mut buf).unwrap();
        append_metrics_row(&mut buf, &compute_metrics(1, &sample_report())).unwrap();
        let text = String::from_utf8(buf).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0].split(',').count(), lines[1].split(',').count());
        assert!(lines[1].starts_with("1,1,5,1,2,1,1,0.2500,"));
    }

    #[test]
    fn writer_rotates_after_max_rows() {
        let dir = tempfile::tempdir().unwrap();
        let mut writer = MetricsFileWriter::with_max_rows(dir.path().to_path_buf(), 2).unwrap();
        for cycle in 0..5 {
            writer
                .write_row(&compute_metrics(cycle, &sample_report()))
                .unwrap();
        }
        writer.flush().unwrap();

        for (index, expected_rows) in [(0, 2), (1, 2), (2, 1)] {
            let path = dir.path().join(format!("metrics_{index:03}.csv"));
            let text = std::fs::read_to_string(&path).unwrap();
            assert_eq!(text.lines().count(), expected_rows + 1, "{}", path.display());
        }
    }
}
