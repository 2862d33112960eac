pub mod fit;
pub mod search;
pub mod target;

pub use search::{find_eigenrays, Detection, SearchLayers};
pub use target::{Target, TargetGrid};

use serde::Serialize;

// ---------------------------------------------------------------------------
// Eigenray record
// ---------------------------------------------------------------------------

/// One source-to-target path. Never mutated after it is emitted.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Eigenray {
    pub time: f64,           // s, travel time
    pub intensity: Vec<f64>, // dB per frequency, spreading + absorption + boundary loss
    pub phase: Vec<f64>,     // rad per frequency
    pub source_de: f64,      // deg, launch angle, positive up
    pub source_az: f64,      // deg, launch azimuth, clockwise from north
    pub target_de: f64,      // deg, direction of travel at the target
    pub target_az: f64,      // deg
    pub surface: u32,
    pub bottom: u32,
    pub caustic: u32,
}

impl Eigenray {
    /// True when this and `other` are the same physical path found twice.
    pub fn duplicates(&self, other: &Eigenray, tolerance: &DuplicateTolerance) -> bool {
        self.surface == other.surface
            && self.bottom == other.bottom
            && (self.time - other.time).abs() < tolerance.time
            && (self.source_de - other.source_de).abs() < tolerance.de
            && (self.source_az - other.source_az).abs() < tolerance.az
    }
}

/// Fan node a detection was fitted around and the wavefront step it was
/// found on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Bracket {
    pub step: usize,
    pub de: usize,
    pub az: usize,
}

impl Bracket {
    /// True when both detections can come from one crossing: the same node
    /// on one step, or the same or a neighboring node one step apart.
    ///
    /// Adjacent nodes on the same step never share a local minimum, so
    /// their roots are distinct paths.
    pub fn same_crossing(&self, other: &Bracket) -> bool {
        match self.step.abs_diff(other.step) {
            0 => self.de == other.de && self.az == other.az,
            1 => self.de.abs_diff(other.de) <= 1 && self.az.abs_diff(other.az) <= 1,
            _ => false,
        }
    }
}

/// How close two eigenrays must be to count as the same path.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DuplicateTolerance {
    pub time: f64, // s
    pub de: f64,   // deg
    pub az: f64,   // deg
}
