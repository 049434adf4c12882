use parking_lot::Mutex;
use rand_chacha::ChaCha8Rng;
use sensor_core::{CycleReport, Store};
use serde::Serialize;
use std::sync::Arc;
use tokio::sync::broadcast;

/// What a cycle needs exclusively. Held for the whole cycle, which may be
/// several store round-trips; only blocking threads take this lock.
pub struct Engine {
    pub store: Box<dyn Store + Send>,
    pub rng: ChaCha8Rng,
}

/// What handlers read. Only ever held for a field copy or clone.
pub struct SimStatus {
    pub seed: u64,
    /// Cycles started so far, failed ones included.
    pub cycle: u64,
    pub last_report: Option<CycleReport>,
}

pub struct SimState {
    pub engine: Mutex<Engine>,
    pub status: Mutex<SimStatus>,
}

impl SimState {
    pub fn new(store: Box<dyn Store + Send>, rng: ChaCha8Rng, seed: u64) -> Self {
        Self {
            engine: Mutex::new(Engine { store, rng }),
            status: Mutex::new(SimStatus {
                seed,
                cycle: 0,
                last_report: None,
            }),
        }
    }
}

/// Broadcast to SSE subscribers after every successful cycle.
#[derive(Debug, Clone, Serialize)]
pub struct CycleEvent {
    pub cycle: u64,
    pub report: CycleReport,
}

pub type SharedSim = Arc<SimState>;
pub type EventTx = broadcast::Sender<CycleEvent>;

#[derive(Clone)]
pub struct AppState {
    pub sim: SharedSim,
    pub event_tx: EventTx,
    pub run_id: String,
    pub interval_secs: f64,
}
