pub mod scenario;
pub mod seq;

pub use scenario::{presets, Scenario, ScenarioBuilder, ScenarioConfig};

use serde::{Deserialize, Serialize};

use crate::error::{PropagationError, Result};
use crate::proploss::SumMode;

/// Each angular axis needs this many rays for 3-point stencils.
pub const MIN_FAN_RAYS: usize = 3;

// ---------------------------------------------------------------------------
// Ray fan: launch angles and carrier frequencies
// ---------------------------------------------------------------------------

/// Launch grid fixed for a run.
#[derive(Debug, Clone, PartialEq)]
pub struct RayFan {
    de: Vec<f64>,          // deg, positive up
    az: Vec<f64>,          // deg, clockwise from north
    frequencies: Vec<f64>, // Hz
    de_rad: Vec<f64>,
    az_rad: Vec<f64>,
}

impl RayFan {
    /// Validate and build a fan. Angle axes must be finite and strictly
    /// monotonic with at least [`MIN_FAN_RAYS`] entries; frequencies must
    /// be positive and strictly increasing.
    pub fn new(de: Vec<f64>, az: Vec<f64>, frequencies: Vec<f64>) -> Result<Self> {
        check_axis("DE", &de)?;
        check_axis("AZ", &az)?;

        if frequencies.is_empty() {
            return Err(PropagationError::InvalidFrequency("no frequencies given".into()));
        }
        if let Some(f) = frequencies.iter().find(|f| !(f.is_finite() && **f > 0.0)) {
            return Err(PropagationError::InvalidFrequency(format!("{f} Hz is not a positive frequency")));
        }
        if let Some(i) = frequencies.windows(2).position(|w| w[1] <= w[0]) {
            return Err(PropagationError::NotMonotonic { axis: "frequency", index: i + 1 });
        }
        let de_rad = de.iter().map(|d| d.to_radians()).collect();
        let az_rad = az.iter().map(|a| a.to_radians()).collect();
        Ok(Self { de, az, frequencies, de_rad, az_rad })
    }

    pub fn de(&self) -> &[f64] {
        &self.de
    }

    pub fn az(&self) -> &[f64] {
        &self.az
    }

    pub fn de_radians(&self) -> &[f64] {
        &self.de_rad
    }

    pub fn az_radians(&self) -> &[f64] {
        &self.az_rad
    }

    pub fn frequencies(&self) -> &[f64] {
        &self.frequencies
    }

    /// (DE rays, AZ rays)
    pub fn shape(&self) -> (usize, usize) {
        (self.de.len(), self.az.len())
    }

    pub fn len(&self) -> usize {
        self.de.len() * self.az.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Widest DE spacing adjacent to ray `i` (deg).
    pub fn de_cell(&self, i: usize) -> f64 {
        cell_width(&self.de, i)
    }

    /// Widest AZ spacing adjacent to ray `j` (deg).
    pub fn az_cell(&self, j: usize) -> f64 {
        cell_width(&self.az, j)
    }
}

fn check_axis(axis: &'static str, values: &[f64]) -> Result<()> {
    if values.len() < MIN_FAN_RAYS {
        return Err(PropagationError::FanTooSmall { axis, len: values.len(), min: MIN_FAN_RAYS });
    }
    if let Some(index) = values.iter().position(|v| !v.is_finite()) {
        return Err(PropagationError::NonFiniteValue { axis, index });
    }
    let rising = values[1] > values[0];
    let bad = values
        .windows(2)
        .position(|w| if rising { w[1] <= w[0] } else { w[1] >= w[0] });
    match bad {
        Some(i) => Err(PropagationError::NotMonotonic { axis, index: i + 1 }),
        None => Ok(()),
    }
}

fn cell_width(axis: &[f64], k: usize) -> f64 {
    let below = if k > 0 { (axis[k] - axis[k - 1]).abs() } else { 0.0 };
    let above = if k + 1 < axis.len() { (axis[k + 1] - axis[k]).abs() } else { 0.0 };
    below.max(above)
}

// ---------------------------------------------------------------------------
// Run limits
// ---------------------------------------------------------------------------

/// Time stepping and stop conditions for one run.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PropagationConfig {
    pub time_step: f64,           // s
    pub max_time: f64,            // s of simulated travel time
    pub max_steps: Option<usize>, // optional hard cap
    pub sum_mode: SumMode,
}

impl Default for PropagationConfig {
    fn default() -> Self {
        Self { time_step: 0.1, max_time: 60.0, max_steps: None, sum_mode: SumMode::Coherent }
    }
}

impl PropagationConfig {
    pub fn validate(&self) -> Result<()> {
        if !(self.time_step.is_finite() && self.time_step > 0.0) {
            return Err(PropagationError::InvalidTimeStep(self.time_step));
        }
        if !(self.max_time.is_finite() && self.max_time > 0.0) {
            return Err(PropagationError::InvalidLimit(format!("max_time = {}", self.max_time)));
        }
        if self.max_steps == Some(0) {
            return Err(PropagationError::InvalidLimit("max_steps = 0".into()));
        }
        Ok(())
    }

    /// Number of steps the run will take.
    pub fn step_count(&self) -> usize {
        let by_time = (self.max_time / self.time_step - 1e-9).ceil().max(0.0) as usize;
        match self.max_steps {
            Some(n) => n.min(by_time),
            None => by_time,
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn freqs() -> Vec<f64> {
        vec![1000.0]
    }

    #[test]
    fn valid_fan() {
        let fan = RayFan::new(seq::linear(-60.0, 5.0, 60.0), seq::linear(-4.0, 1.0, 4.0), freqs()).unwrap();
        assert_eq!(fan.shape(), (25, 9));
        assert_eq!(fan.len(), 225);
        assert_eq!(fan.de_cell(0), 5.0);
    }

    #[test]
    fn descending_axis_is_accepted() {
        assert!(RayFan::new(vec![10.0, 0.0, -10.0], vec![-1.0, 0.0, 1.0], freqs()).is_ok());
    }

    #[test]
    fn rejects_short_axis() {
        let err = RayFan::new(vec![-1.0, 1.0], vec![-1.0, 0.0, 1.0], freqs()).unwrap_err();
        assert_eq!(err, PropagationError::FanTooSmall { axis: "DE", len: 2, min: 3 });
    }

    #[test]
    fn rejects_non_monotonic_axis() {
        let err = RayFan::new(vec![0.0, 1.0, 2.0], vec![0.0, 1.0, 1.0, 2.0], freqs()).unwrap_err();
        assert_eq!(err, PropagationError::NotMonotonic { axis: "AZ", index: 2 });
    }

    #[test]
    fn rejects_nan_angle() {
        let err = RayFan::new(vec![0.0, f64::NAN, 2.0], vec![0.0, 1.0, 2.0], freqs()).unwrap_err();
        assert_eq!(err, PropagationError::NonFiniteValue { axis: "DE", index: 1 });
    }

    #[test]
    fn rejects_bad_frequencies() {
        let de = vec![0.0, 1.0, 2.0];
        assert!(matches!(
            RayFan::new(de.clone(), de.clone(), vec![]),
            Err(PropagationError::InvalidFrequency(_))
        ));
        assert!(matches!(
            RayFan::new(de.clone(), de.clone(), vec![-5.0]),
            Err(PropagationError::InvalidFrequency(_))
        ));
        assert!(matches!(
            RayFan::new(de.clone(), de, vec![2000.0, 1000.0]),
            Err(PropagationError::NotMonotonic { axis: "frequency", .. })
        ));
    }

    #[test]
    fn default_limits() {
        let cfg = PropagationConfig::default();
        assert!(cfg.validate().is_ok());
        assert_eq!(cfg.step_count(), 600);
        let capped = PropagationConfig { max_steps: Some(10), ..cfg };
        assert_eq!(capped.step_count(), 10);
    }

    #[test]
    fn invalid_limits() {
        let cfg = PropagationConfig { time_step: 0.0, ..Default::default() };
        assert_eq!(cfg.validate(), Err(PropagationError::InvalidTimeStep(0.0)));
        let cfg = PropagationConfig { max_steps: Some(0), ..Default::default() };
        assert!(matches!(cfg.validate(), Err(PropagationError::InvalidLimit(_))));
    }
}
