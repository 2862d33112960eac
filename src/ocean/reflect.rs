use std::f64::consts::PI;

use num_complex::Complex64;
use serde::{Deserialize, Serialize};

/// Amplitude loss and phase change of one boundary interaction.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Reflection {
    pub loss_db: f64, // dB, >= 0 for passive boundaries
    pub phase: f64,   // rad
}

/// Reflection coefficient model attached to a boundary.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ReflectLoss {
    /// Same loss and phase at every angle and frequency.
    Constant { loss_db: f64, phase: f64 },
    /// Fluid half-space below the water (Rayleigh reflection coefficient).
    Rayleigh {
        density_ratio: f64, // sediment / water
        speed_ratio: f64,   // sediment / water
    },
}

impl ReflectLoss {
    /// Pressure-release sea surface: no loss, phase reversal.
    pub fn pressure_release() -> Self {
        ReflectLoss::Constant { loss_db: 0.0, phase: -PI }
    }

    /// Perfectly rigid bottom: no loss, no phase change.
    pub fn rigid() -> Self {
        ReflectLoss::Constant { loss_db: 0.0, phase: 0.0 }
    }

    /// Loss and phase for a grazing angle (rad).
    pub fn reflect(&self, _frequency: f64, grazing: f64) -> Reflection {
        match *self {
            ReflectLoss::Constant { loss_db, phase } => Reflection { loss_db, phase },
            ReflectLoss::Rayleigh { density_ratio, speed_ratio } => {
                let r = rayleigh_coefficient(density_ratio, speed_ratio, grazing);
                Reflection {
                    loss_db: -20.0 * r.norm().max(1e-300).log10(),
                    phase: r.arg(),
                }
            }
        }
    }
}

/// Complex plane-wave reflection coefficient of a fluid half-space.
fn rayleigh_coefficient(density_ratio: f64, speed_ratio: f64, grazing: f64) -> Complex64 {
    let n = 1.0 / speed_ratio; // water / sediment speed
    let (sin_g, cos_g) = grazing.sin_cos();
    let root = Complex64::new(n * n - cos_g * cos_g, 0.0).sqrt();
    let m_sin = Complex64::new(density_ratio * sin_g, 0.0);
    (m_sin - root) / (m_sin + root)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
