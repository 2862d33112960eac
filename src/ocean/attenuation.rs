use std::fmt::Debug;

use crate::geo::GeoPosition;

/// Volume absorption of sound in sea water.
pub trait Attenuation: Send + Sync + Debug {
    /// Absorption in dB per meter at `frequency` (Hz).
    fn attenuation(&self, pos: &GeoPosition, frequency: f64, time: f64) -> f64;
}

/// Frequency-independent absorption.
#[derive(Debug, Clone, Copy, Default)]
pub struct ConstantAttenuation {
    pub db_per_km: f64,
}

impl ConstantAttenuation {
    pub fn new(db_per_km: f64) -> Self {
        Self { db_per_km }
    }
}

impl Attenuation for ConstantAttenuation {
    fn attenuation(&self, _pos: &GeoPosition, _frequency: f64, _time: f64) -> f64 {
        self.db_per_km * 1e-3
    }
}

/// Thorp's empirical absorption formula (valid roughly 100 Hz to 50 kHz).
#[derive(Debug, Clone, Copy, Default)]
pub struct ThorpAttenuation;

impl ThorpAttenuation {
    /// Absorption in dB/km for a frequency in Hz.
    pub fn db_per_km(frequency: f64) -> f64 {
        let f2 = (frequency * 1e-3).powi(2); // kHz^2
        0.11 * f2 / (1.0 + f2) + 44.0 * f2 / (4100.0 + f2) + 2.75e-4 * f2 + 0.003
    }
}

impl Attenuation for ThorpAttenuation {
    fn attenuation(&self, _pos: &GeoPosition, frequency: f64, _time: f64) -> f64 {
        Self::db_per_km(frequency) * 1e-3
    }
}
