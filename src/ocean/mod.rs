pub mod attenuation;
pub mod boundary;
pub mod profile;
pub mod reflect;

pub use attenuation::{Attenuation, ConstantAttenuation, ThorpAttenuation};
pub use boundary::{Boundary, BoundaryHeight, FlatBoundary, SlopedBoundary};
pub use profile::{LinearProfile, MunkProfile, SoundSpeedProfile, TableProfile};
pub use reflect::{ReflectLoss, Reflection};

use nalgebra::Vector3;

use crate::error::{PropagationError, Result};
use crate::geo::EarthModel;

// ---------------------------------------------------------------------------
// Ocean environment
// ---------------------------------------------------------------------------

/// Which reflecting boundary a ray interacted with.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BoundaryKind {
    Surface,
    Bottom,
}

impl BoundaryKind {
    pub fn name(&self) -> &'static str {
        match self {
            BoundaryKind::Surface => "surface",
            BoundaryKind::Bottom => "bottom",
        }
    }
}

/// Local sound speed and its gradient in earth-centered coordinates.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SoundSpeed {
    pub speed: f64,             // m/s
    pub gradient: Vector3<f64>, // 1/s, earth-centered
}

/// Water column between two reflecting boundaries.
#[derive(Debug)]
pub struct Ocean {
    pub surface: Box<dyn Boundary>,
    pub bottom: Box<dyn Boundary>,
    pub profile: Box<dyn SoundSpeedProfile>,
    pub attenuation: Box<dyn Attenuation>,
}

impl Ocean {
    /// Ocean without volume absorption.
    pub fn new(
        surface: Box<dyn Boundary>,
        bottom: Box<dyn Boundary>,
        profile: Box<dyn SoundSpeedProfile>,
    ) -> Self {
        Self {
            surface,
            bottom,
            profile,
            attenuation: Box::new(ConstantAttenuation::default()),
        }
    }

    pub fn with_attenuation(mut self, attenuation: Box<dyn Attenuation>) -> Self {
        self.attenuation = attenuation;
        self
    }

    /// Flat surface, flat rigid bottom, constant sound speed.
    pub fn isovelocity(speed: f64, depth: f64) -> Self {
        Self::new(
            Box::new(FlatBoundary::surface()),
            Box::new(FlatBoundary::bottom(depth)),
            Box::new(LinearProfile::constant(speed)),
        )
    }

    pub fn boundary(&self, kind: BoundaryKind) -> &dyn Boundary {
        match kind {
            BoundaryKind::Surface => self.surface.as_ref(),
            BoundaryKind::Bottom => self.bottom.as_ref(),
        }
    }

    /// Sound speed and gradient at an earth-centered point.
    ///
    /// Fails when the profile returns a non-physical speed or gradient;
    /// the propagation cannot continue past such a point.
    pub fn sound_speed(&self, x: &Vector3<f64>, time: f64, earth: &EarthModel) -> Result<SoundSpeed> {
        let pos = earth.to_geo(x);
        let speed = self.profile.sound_speed(&pos, time);
        if !(speed.is_finite() && speed > 0.0) {
            return Err(PropagationError::NonPhysicalSoundSpeed { speed, position: pos });
        }
        let grad_enu = self.profile.sound_speed_gradient(&pos, time);
        if !grad_enu.iter().all(|g| g.is_finite()) {
            return Err(PropagationError::NonPhysicalSoundSpeed { speed, position: pos });
        }
        let gradient = earth.frame_at(x).to_ecef(&grad_enu);
        Ok(SoundSpeed { speed, gradient })
    }

    /// Volume absorption in dB/m at an earth-centered point.
    pub fn attenuation(&self, x: &Vector3<f64>, frequency: f64, time: f64, earth: &EarthModel) -> f64 {
        self.attenuation.attenuation(&earth.to_geo(x), frequency, time)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
