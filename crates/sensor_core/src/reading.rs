//! Reading generation: a three-band stochastic classifier over a sensor's
//! threshold range.
//!
//! One uniform draw picks the band (80% normal, 15% warning, 5% critical);
//! warning and critical bands take a second draw to pick a side; a final draw
//! places the value inside the chosen interval.

use chrono::{DateTime, Utc};
use rand::Rng;

use crate::{Reading, ReadingStatus, Sensor};

pub const DEFAULT_THRESHOLD_MIN: f64 = 0.0;
pub const DEFAULT_THRESHOLD_MAX: f64 = 100.0;

const NORMAL_CUTOFF: f64 = 0.80;
const WARNING_CUTOFF: f64 = 0.95;
const NORMAL_MARGIN: f64 = 0.2;
const WARNING_SHOULDER: f64 = 0.15;
const CRITICAL_OVERSHOOT: f64 = 0.1;

/// Effective `[min, max]` of a sensor after defaulting absent bounds.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ThresholdRange {
    pub min: f64,
    pub max: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, thiserror::Error)]
pub enum ThresholdError {
    #[error("threshold bounds are not finite ({min}, {max})")]
    NonFinite { min: f64, max: f64 },
    #[error("threshold_min equals threshold_max ({0})")]
    Degenerate(f64),
    #[error("threshold_min {min} exceeds threshold_max {max}")]
    Inverted { min: f64, max: f64 },
}

/// Which side of the range a warning or critical value lands on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Side {
    Low,
    High,
}

impl ThresholdRange {
    pub fn new(min: f64, max: f64) -> Self {
        Self { min, max }
    }

    pub fn from_sensor(sensor: &Sensor) -> Self {
        Self {
            min: sensor.threshold_min.unwrap_or(DEFAULT_THRESHOLD_MIN),
            max: sensor.threshold_max.unwrap_or(DEFAULT_THRESHOLD_MAX),
        }
    }

    pub fn span(self) -> f64 {
        self.max - self.min
    }

    /// Rejects ranges that make the band intervals empty or inverted.
    /// Generation itself does not call this.
    pub fn validate(self) -> Result<(), ThresholdError> {
        let Self { min, max } = self;
        if !min.is_finite() || !max.is_finite() {
            return Err(ThresholdError::NonFinite { min, max });
        }
        if min > max {
            return Err(ThresholdError::Inverted { min, max });
        }
        if self.span() == 0.0 {
            return Err(ThresholdError::Degenerate(min));
        }
        Ok(())
    }

    /// Inner 60% of the range.
    pub fn normal_band(self) -> (f64, f64) {
        let margin = self.span() * NORMAL_MARGIN;
        (self.min + margin, self.max - margin)
    }

    /// Outer 15% shoulder on one side, still inside the range.
    pub fn warning_band(self, side: Side) -> (f64, f64) {
        let shoulder = self.span() * WARNING_SHOULDER;
        match side {
            Side::Low => (self.min, self.min + shoulder),
            Side::High => (self.max - shoulder, self.max),
        }
    }

    /// 10% beyond the range on one side.
    pub fn critical_band(self, side: Side) -> (f64, f64) {
        let overshoot = self.span() * CRITICAL_OVERSHOOT;
        match side {
            Side::Low => (self.min - overshoot, self.min),
            Side::High => (self.max, self.max + overshoot),
        }
    }
}

impl ReadingStatus {
    /// Band that `value` falls in for `range`.
    ///
    /// Anything outside `[min, max]` is critical, the inner 60% is normal and
    /// the rest of the range is warning. Bounds themselves are warning.
    pub fn classify(value: f64, range: ThresholdRange) -> Self {
        let (low, high) = range.normal_band();
        if !(range.min..=range.max).contains(&value) {
            ReadingStatus::Critical
        } else if (low..=high).contains(&value) {
            ReadingStatus::Normal
        } else {
            ReadingStatus::Warning
        }
    }
}

/// Produce one classified reading for `sensor`.
///
/// Total over any threshold pair: inverted or degenerate ranges still yield a
/// value, they just stop meaning anything. Callers that care should check
/// [`ThresholdRange::validate`] first.
pub fn generate_reading(sensor: &Sensor, rng: &mut impl Rng, now: DateTime<Utc>) -> Reading {
    let range = ThresholdRange::from_sensor(sensor);
    let (status, (low, high)) = pick_band(range, rng);
    Reading {
        sensor_id: sensor.id.clone(),
        value: round_to_cents(uniform(rng, low, high)),
        status,
        timestamp: now,
    }
}

fn pick_band(range: ThresholdRange, rng: &mut impl Rng) -> (ReadingStatus, (f64, f64)) {
    let roll: f64 = rng.gen();
    if roll < NORMAL_CUTOFF {
        (ReadingStatus::Normal, range.normal_band())
    } else if roll < WARNING_CUTOFF {
        (ReadingStatus::Warning, range.warning_band(flip_side(rng)))
    } else {
        (ReadingStatus::Critical, range.critical_band(flip_side(rng)))
    }
}

fn flip_side(rng: &mut impl Rng) -> Side {
    if rng.gen::<f64>() < 0.5 {
        Side::Low
    } else {
        Side::High
    }
}

/// `a + (b - a) * u` for `u` in `[0, 1)`. Defined for any ordering of `a`, `b`.
fn uniform(rng: &mut impl Rng, a: f64, b: f64) -> f64 {
    a + (b - a) * rng.gen::<f64>()
}

pub fn round_to_cents(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}
