//! Store setup and fleet loading shared between `sensor_cli` and `sensor_daemon`.

mod config;

pub use config::{ConfigError, StoreConfig, ACCESS_KEY_VAR, ENDPOINT_VAR};

use anyhow::{ensure, Context, Result};
use sensor_core::store::to_record;
use sensor_core::{Alert, Collection, MemoryStore, Sensor, Store};
use sensor_store::RestStore;
use serde::Deserialize;
use std::collections::HashSet;
use std::path::{Path, PathBuf};

/// A fleet fixture: the `sensors` table plus any alerts already open.
#[derive(Debug, Clone, Deserialize)]
pub struct FleetFile {
    pub sensors: Vec<Sensor>,
    #[serde(default)]
    pub alerts: Vec<Alert>,
}

/// Where a run reads sensors from and writes readings and alerts to.
#[derive(Debug, Clone)]
pub enum StoreSource {
    /// Offline: an in-memory store seeded from a fleet JSON file.
    Fleet(PathBuf),
    Remote(StoreConfig),
}

impl StoreSource {
    /// `--fleet <path>` wins; otherwise the remote store from the environment.
    pub fn resolve(fleet: Option<&str>) -> Result<Self> {
        match fleet {
            Some(path) => Ok(Self::Fleet(PathBuf::from(path))),
            None => Ok(Self::Remote(
                StoreConfig::from_env().context("configuring remote store")?,
            )),
        }
    }

    pub fn describe(&self) -> String {
        match self {
            Self::Fleet(path) => format!("fleet file {}", path.display()),
            Self::Remote(config) => format!("remote store {}", config.endpoint),
        }
    }
}

pub fn open_store(source: &StoreSource) -> Result<Box<dyn Store + Send>> {
    match source {
        StoreSource::Fleet(path) => {
            let fleet = load_fleet(path)?;
            Ok(Box::new(build_memory_store(&fleet)?))
        }
        StoreSource::Remote(config) => Ok(Box::new(RestStore::new(
            config.endpoint.clone(),
            config.access_key.clone(),
        ))),
    }
}

pub fn load_fleet(path: &Path) -> Result<FleetFile> {
    let json = std::fs::read_to_string(path)
        .with_context(|| format!("reading fleet file: {}", path.display()))?;
    let fleet: FleetFile = serde_json::from_str(&json)
        .with_context(|| format!("parsing fleet file: {}", path.display()))?;
    validate_fleet(&fleet).with_context(|| format!("validating {}", path.display()))?;
    Ok(fleet)
}

/// Checks cross-references in a fleet fixture.
///
/// Catches mistakes like duplicate sensor ids or an alert pointing at a
/// sensor that isn't in the file. Threshold problems are left to the cycle,
/// which skips such sensors at run time.
pub fn validate_fleet(fleet: &FleetFile) -> Result<()> {
    let mut ids = HashSet::new();
    for sensor in &fleet.sensors {
        ensure!(!sensor.id.0.is_empty(), "sensor '{}' has an empty id", sensor.name);
        ensure!(
            ids.insert(&sensor.id),
            "sensor id '{}' appears more than once",
            sensor.id
        );
    }
    for alert in &fleet.alerts {
        ensure!(
            ids.contains(&alert.sensor_id),
            "alert '{}' references unknown sensor '{}'",
            alert.alert_type,
            alert.sensor_id
        );
    }
    Ok(())
}

pub fn build_memory_store(fleet: &FleetFile) -> Result<MemoryStore> {
    let mut store = MemoryStore::from_sensors(&fleet.sensors).context("encoding sensors")?;
    let alerts = fleet
        .alerts
        .iter()
        .map(|alert| to_record(Collection::Alerts, alert))
        .collect::<Result<Vec<_>, _>>()
        .context("encoding alerts")?;
    store.seed(Collection::Alerts, alerts);
    Ok(store)
}

// ---------------------------------------------------------------------------
// Run directories
// ---------------------------------------------------------------------------

pub fn generate_run_id(seed: u64) -> String {
    let timestamp = chrono::Utc::now().format("%Y%m%d_%H%M%S");
    format!("{timestamp}_seed{seed}")
}

pub fn create_run_dir(base: &Path, run_id: &str) -> Result<PathBuf> {
    let dir = base.join(run_id);
    std::fs::create_dir_all(&dir)
        .with_context(|| format!("creating run directory: {}", dir.display()))?;
    Ok(dir)
}

pub fn write_run_info(
    dir: &Path,
    run_id: &str,
    seed: u64,
    metrics_every: u64,
    args: serde_json::Value,
) -> Result<()> {
    let info = serde_json::json!({
        "run_id": run_id,
        "seed": seed,
        "metrics_every": metrics_every,
        "args": args,
    });
    let path = dir.join("run_info.json");
    let file =
        std::fs::File::create(&path).with_context(|| format!("creating {}", path.display()))?;
    serde_json::to_writer_pretty(file, &info)
        .with_context(|| format!("writing {}", path.display()))?;
    Ok(())
}
