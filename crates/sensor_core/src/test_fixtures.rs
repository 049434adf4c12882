//! Shared test fixtures for `sensor_core` and downstream crates.
//!
//! `ScriptedRng` replays chosen `[0, 1)` draws so a test can force a band and
//! a position inside it; `make_rng()` is the seeded generator for
//! statistical tests.

use chrono::{DateTime, TimeZone, Utc};
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use std::collections::VecDeque;

use crate::{MachineryId, Sensor, SensorId};

pub fn make_rng() -> ChaCha8Rng {
    ChaCha8Rng::seed_from_u64(42)
}

pub fn fixed_now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0)
        .single()
        .expect("valid fixture timestamp")
}

/// A `temperature` sensor on machinery `m-<id>` with the given bounds.
pub fn sensor(id: &str, min: f64, max: f64) -> Sensor {
    Sensor {
        id: SensorId(id.to_string()),
        machinery_id: MachineryId(format!("m-{id}")),
        name: format!("Sensor {id}"),
        sensor_type: "temperature".to_string(),
        unit: "°C".to_string(),
        threshold_min: Some(min),
        threshold_max: Some(max),
        status: "active".to_string(),
    }
}

/// Replays a fixed sequence of `f64` draws through `Rng::gen::<f64>()`.
///
/// `rand` builds an `f64` sample from the top 53 bits of `next_u64`, so each
/// scripted value is encoded back into those bits. Panics when exhausted.
pub struct ScriptedRng {
    draws: VecDeque<u64>,
}

impl ScriptedRng {
    pub fn new(values: &[f64]) -> Self {
        let draws = values
            .iter()
            .map(|&value| {
                assert!((0.0..1.0).contains(&value), "draw {value} outside [0, 1)");
                #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
                let bits = (value * (1u64 << 53) as f64) as u64;
                bits << 11
            })
            .collect();
        Self { draws }
    }

    pub fn remaining(&self) -> usize {
        self.draws.len()
    }
}

impl rand::RngCore for ScriptedRng {
    fn next_u32(&mut self) -> u32 {
        #[allow(clippy::cast_possible_truncation)]
        let high = (self.next_u64() >> 32) as u32;
        high
    }

    fn next_u64(&mut self) -> u64 {
        self.draws.pop_front().expect("scripted draws exhausted")
    }

    fn fill_bytes(&mut self, dest: &mut [u8]) {
        for chunk in dest.chunks_mut(8) {
            let bytes = self.next_u64().to_le_bytes();
            chunk.copy_from_slice(&bytes[..chunk.len()]);
        }
    }

    fn try_fill_bytes(&mut self, dest: &mut [u8]) -> Result<(), rand::Error> {
        self.fill_bytes(dest);
        Ok(())
    }
}
