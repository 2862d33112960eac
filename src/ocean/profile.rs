use std::fmt::Debug;

use nalgebra::Vector3;

use crate::error::{PropagationError, Result};
use crate::geo::GeoPosition;

// ---------------------------------------------------------------------------
// Sound speed profile capability
// ---------------------------------------------------------------------------

/// Sound speed as a function of position and time.
pub trait SoundSpeedProfile: Send + Sync + Debug {
    /// Sound speed, m/s.
    fn sound_speed(&self, pos: &GeoPosition, time: f64) -> f64;

    /// Gradient of sound speed in local (east, north, up) components, 1/s.
    fn sound_speed_gradient(&self, pos: &GeoPosition, time: f64) -> Vector3<f64>;
}

// ---------------------------------------------------------------------------
// Linear in depth (isovelocity when gradient = 0)
// ---------------------------------------------------------------------------

/// c(z) = c0 + g * depth
#[derive(Debug, Clone, Copy)]
pub struct LinearProfile {
    pub surface_speed: f64, // m/s at 0 m
    pub gradient: f64,      // (m/s)/m, positive = faster with depth
}

impl LinearProfile {
    pub fn new(surface_speed: f64, gradient: f64) -> Self {
        Self { surface_speed, gradient }
    }

    /// Isovelocity water.
    pub fn constant(speed: f64) -> Self {
        Self { surface_speed: speed, gradient: 0.0 }
    }
}

impl SoundSpeedProfile for LinearProfile {
    fn sound_speed(&self, pos: &GeoPosition, _time: f64) -> f64 {
        self.surface_speed + self.gradient * pos.depth()
    }

    fn sound_speed_gradient(&self, _pos: &GeoPosition, _time: f64) -> Vector3<f64> {
        Vector3::new(0.0, 0.0, -self.gradient)
    }
}

// ---------------------------------------------------------------------------
// Munk canonical profile
// ---------------------------------------------------------------------------

/// c(z) = c1 [1 + eps (eta - 1 + exp(-eta))], eta = 2 (z - z1) / B
#[derive(Debug, Clone, Copy)]
pub struct MunkProfile {
    pub axis_speed: f64, // c1, m/s
    pub axis_depth: f64, // z1, m
    pub scale: f64,      // B, m
    pub epsilon: f64,
}

impl Default for MunkProfile {
    fn default() -> Self {
        Self {
            axis_speed: 1500.0,
            axis_depth: 1300.0,
            scale: 1300.0,
            epsilon: 0.00737,
        }
    }
}

impl SoundSpeedProfile for MunkProfile {
    fn sound_speed(&self, pos: &GeoPosition, _time: f64) -> f64 {
        let eta = 2.0 * (pos.depth() - self.axis_depth) / self.scale;
        self.axis_speed * (1.0 + self.epsilon * (eta - 1.0 + (-eta).exp()))
    }

    fn sound_speed_gradient(&self, pos: &GeoPosition, _time: f64) -> Vector3<f64> {
        let eta = 2.0 * (pos.depth() - self.axis_depth) / self.scale;
        let dc_ddepth = self.axis_speed * self.epsilon * (2.0 / self.scale) * (1.0 - (-eta).exp());
        Vector3::new(0.0, 0.0, -dc_ddepth)
    }
}

// ---------------------------------------------------------------------------
// Tabulated profile
// ---------------------------------------------------------------------------

/// Piecewise-linear sound speed between tabulated depths.
/// Values beyond the table ends are held constant.
#[derive(Debug, Clone)]
pub struct TableProfile {
    depths: Vec<f64>, // m, strictly increasing
    speeds: Vec<f64>, // m/s
}

impl TableProfile {
    pub fn new(depths: Vec<f64>, speeds: Vec<f64>) -> Result<Self> {
        if depths.len() < 2 || depths.len() != speeds.len() {
            return Err(PropagationError::InvalidModel(format!(
                "profile table needs >= 2 matching depth/speed pairs, got {} and {}",
                depths.len(),
                speeds.len()
            )));
        }
        if let Some(i) = depths.windows(2).position(|w| w[1] <= w[0]) {
            return Err(PropagationError::NotMonotonic { axis: "profile depth", index: i + 1 });
        }
        Ok(Self { depths, speeds })
    }

    /// Index of the layer holding `depth`, or None outside the table.
    fn layer(&self, depth: f64) -> Option<usize> {
        if depth < self.depths[0] || depth >= self.depths[self.depths.len() - 1] {
            return None;
        }
        let i = self.depths.partition_point(|&d| d <= depth);
        Some(i - 1)
    }
}

impl SoundSpeedProfile for TableProfile {
    fn sound_speed(&self, pos: &GeoPosition, _time: f64) -> f64 {
        let z = pos.depth();
        match self.layer(z) {
            Some(i) => {
                let u = (z - self.depths[i]) / (self.depths[i + 1] - self.depths[i]);
                self.speeds[i] + u * (self.speeds[i + 1] - self.speeds[i])
            }
            None if z < self.depths[0] => self.speeds[0],
            None => self.speeds[self.speeds.len() - 1],
        }
    }

    fn sound_speed_gradient(&self, pos: &GeoPosition, _time: f64) -> Vector3<f64> {
        match self.layer(pos.depth()) {
            Some(i) => {
                let g = (self.speeds[i + 1] - self.speeds[i]) / (self.depths[i + 1] - self.depths[i]);
                Vector3::new(0.0, 0.0, -g)
            }
            None => Vector3::zeros(),
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
