use std::fmt::Debug;

use nalgebra::Vector3;

use super::reflect::{ReflectLoss, Reflection};
use crate::geo::{EarthModel, GeoPosition};

// ---------------------------------------------------------------------------
// Reflecting boundary capability
// ---------------------------------------------------------------------------

/// Boundary altitude and orientation below/above a horizontal position.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoundaryHeight {
    pub altitude: f64,          // m, relative to mean sea level
    pub normal: Vector3<f64>,   // unit, local ENU, pointing up
}

/// Sea surface or sea floor.
pub trait Boundary: Send + Sync + Debug {
    /// Boundary altitude and normal at the horizontal location of `pos`.
    /// The altitude of `pos` itself is ignored.
    fn height(&self, pos: &GeoPosition, time: f64) -> BoundaryHeight;

    /// Loss and phase change for a ray hitting the boundary at `grazing` (rad).
    fn reflect_loss(&self, pos: &GeoPosition, frequency: f64, grazing: f64) -> Reflection;
}

// ---------------------------------------------------------------------------
// Flat boundary
// ---------------------------------------------------------------------------

/// Boundary at a constant depth everywhere.
#[derive(Debug, Clone, Copy)]
pub struct FlatBoundary {
    pub depth: f64, // m, 0 for the sea surface
    pub reflect: ReflectLoss,
}

impl FlatBoundary {
    /// Sea surface at mean sea level, pressure release.
    pub fn surface() -> Self {
        Self { depth: 0.0, reflect: ReflectLoss::pressure_release() }
    }

    /// Rigid sea floor at `depth` meters.
    pub fn bottom(depth: f64) -> Self {
        Self { depth, reflect: ReflectLoss::rigid() }
    }

    pub fn with_reflect_loss(mut self, reflect: ReflectLoss) -> Self {
        self.reflect = reflect;
        self
    }
}

impl Boundary for FlatBoundary {
    fn height(&self, _pos: &GeoPosition, _time: f64) -> BoundaryHeight {
        BoundaryHeight { altitude: -self.depth, normal: Vector3::z() }
    }

    fn reflect_loss(&self, _pos: &GeoPosition, frequency: f64, grazing: f64) -> Reflection {
        self.reflect.reflect(frequency, grazing)
    }
}

// ---------------------------------------------------------------------------
// Planar slope
// ---------------------------------------------------------------------------

/// Boundary whose depth changes linearly with horizontal distance
/// along a down-slope azimuth.
#[derive(Debug, Clone, Copy)]
pub struct SlopedBoundary {
    earth: EarthModel,
    origin: GeoPosition,
    depth: f64,     // m at origin
    tan_slope: f64,
    azimuth: f64,   // rad, down-slope direction clockwise from north
    reflect: ReflectLoss,
}

impl SlopedBoundary {
    pub fn new(
        earth: EarthModel,
        origin: GeoPosition,
        depth: f64,
        slope_deg: f64,
        azimuth_deg: f64,
        reflect: ReflectLoss,
    ) -> Self {
        Self {
            earth,
            origin,
            depth,
            tan_slope: slope_deg.to_radians().tan(),
            azimuth: azimuth_deg.to_radians(),
            reflect,
        }
    }

    /// Depth at a horizontal position, never above mean sea level.
    pub fn depth_at(&self, pos: &GeoPosition) -> f64 {
        let (east, north) = self.earth.horizontal_offset(&self.origin, pos);
        let along = east * self.azimuth.sin() + north * self.azimuth.cos();
        (self.depth + self.tan_slope * along).max(0.0)
    }
}

impl Boundary for SlopedBoundary {
    fn height(&self, pos: &GeoPosition, _time: f64) -> BoundaryHeight {
        let (sa, ca) = self.azimuth.sin_cos();
        let normal = Vector3::new(self.tan_slope * sa, self.tan_slope * ca, 1.0).normalize();
        BoundaryHeight { altitude: -self.depth_at(pos), normal }
    }

    fn reflect_loss(&self, _pos: &GeoPosition, frequency: f64, grazing: f64) -> Reflection {
        self.reflect.reflect(frequency, grazing)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
