use std::fmt;

use nalgebra::Vector3;
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// WGS-84 constants
// ---------------------------------------------------------------------------

pub const WGS84_A: f64 = 6_378_137.0; // equatorial radius, m
pub const WGS84_E2: f64 = 0.006_694_379_990_14; // first eccentricity squared

// ---------------------------------------------------------------------------
// Geodetic position
// ---------------------------------------------------------------------------

/// Point on or below the sea surface.
/// Altitude is relative to mean sea level, negative below it.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoPosition {
    pub latitude: f64,  // deg, positive north
    pub longitude: f64, // deg, positive east
    pub altitude: f64,  // m
}

impl GeoPosition {
    pub fn new(latitude: f64, longitude: f64, altitude: f64) -> Self {
        Self { latitude, longitude, altitude }
    }

    /// Depth below mean sea level (positive down).
    pub fn depth(&self) -> f64 {
        -self.altitude
    }

    pub fn is_finite(&self) -> bool {
        self.latitude.is_finite() && self.longitude.is_finite() && self.altitude.is_finite()
    }
}

impl fmt::Display for GeoPosition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "({:.6}°, {:.6}°, {:.2} m)",
            self.latitude, self.longitude, self.altitude
        )
    }
}

// ---------------------------------------------------------------------------
// Local tangent frame
// ---------------------------------------------------------------------------

/// East-North-Up unit vectors at a point, in earth-centered coordinates.
#[derive(Debug, Clone, Copy)]
pub struct LocalFrame {
    pub east: Vector3<f64>,
    pub north: Vector3<f64>,
    pub up: Vector3<f64>,
}

impl LocalFrame {
    /// Rotate an ENU vector into earth-centered coordinates.
    pub fn to_ecef(&self, enu: &Vector3<f64>) -> Vector3<f64> {
        self.east * enu.x + self.north * enu.y + self.up * enu.z
    }

    /// Rotate an earth-centered vector into ENU components.
    pub fn to_enu(&self, v: &Vector3<f64>) -> Vector3<f64> {
        Vector3::new(v.dot(&self.east), v.dot(&self.north), v.dot(&self.up))
    }

    /// Unit direction for a depression/elevation and azimuth pair (rad).
    /// Azimuth is clockwise from north, DE positive up.
    pub fn direction(&self, de: f64, az: f64) -> Vector3<f64> {
        let (sd, cd) = de.sin_cos();
        let (sa, ca) = az.sin_cos();
        self.east * (cd * sa) + self.north * (cd * ca) + self.up * sd
    }

    /// Inverse of [`LocalFrame::direction`]: (de, az) in radians.
    pub fn angles(&self, dir: &Vector3<f64>) -> (f64, f64) {
        let enu = self.to_enu(&dir.normalize());
        let de = enu.z.clamp(-1.0, 1.0).asin();
        let az = enu.x.atan2(enu.y);
        (de, az)
    }
}

// ---------------------------------------------------------------------------
// Earth model
// ---------------------------------------------------------------------------

/// Spherical earth whose radius is fixed by the area-of-operations latitude.
///
/// Built once per run and passed by reference to every geometry
/// computation, so two runs at different latitudes never interfere.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EarthModel {
    radius: f64, // m
}

impl EarthModel {
    /// Gaussian mean radius of curvature of the WGS-84 ellipsoid at `latitude` (deg).
    pub fn from_latitude(latitude: f64) -> Self {
        let s = latitude.to_radians().sin();
        let radius = WGS84_A * (1.0 - WGS84_E2).sqrt() / (1.0 - WGS84_E2 * s * s);
        Self { radius }
    }

    pub fn with_radius(radius: f64) -> Self {
        Self { radius }
    }

    pub fn radius(&self) -> f64 {
        self.radius
    }

    /// Geodetic position to earth-centered Cartesian coordinates (m).
    pub fn to_ecef(&self, p: &GeoPosition) -> Vector3<f64> {
        let r = self.radius + p.altitude;
        let (slat, clat) = p.latitude.to_radians().sin_cos();
        let (slon, clon) = p.longitude.to_radians().sin_cos();
        Vector3::new(r * clat * clon, r * clat * slon, r * slat)
    }

    /// Earth-centered Cartesian coordinates back to a geodetic position.
    pub fn to_geo(&self, x: &Vector3<f64>) -> GeoPosition {
        let r = x.norm();
        let latitude = (x.z / r).clamp(-1.0, 1.0).asin().to_degrees();
        let longitude = x.y.atan2(x.x).to_degrees();
        GeoPosition { latitude, longitude, altitude: r - self.radius }
    }

    /// Altitude of an earth-centered point.
    pub fn altitude(&self, x: &Vector3<f64>) -> f64 {
        x.norm() - self.radius
    }

    /// Local East-North-Up frame at a geodetic position.
    pub fn frame(&self, p: &GeoPosition) -> LocalFrame {
        let (slat, clat) = p.latitude.to_radians().sin_cos();
        let (slon, clon) = p.longitude.to_radians().sin_cos();
        LocalFrame {
            east: Vector3::new(-slon, clon, 0.0),
            north: Vector3::new(-slat * clon, -slat * slon, clat),
            up: Vector3::new(clat * clon, clat * slon, slat),
        }
    }

    /// Local East-North-Up frame at an earth-centered point.
    /// Undefined on the polar axis.
    pub fn frame_at(&self, x: &Vector3<f64>) -> LocalFrame {
        let up = x.normalize();
        let east = Vector3::new(-x.y, x.x, 0.0).normalize();
        let north = up.cross(&east);
        LocalFrame { east, north, up }
    }

    /// Horizontal (east, north) offsets in meters of `p` from `origin`,
    /// measured along the sphere at mean sea level.
    pub fn horizontal_offset(&self, origin: &GeoPosition, p: &GeoPosition) -> (f64, f64) {
        let north = (p.latitude - origin.latitude).to_radians() * self.radius;
        let east = (p.longitude - origin.longitude).to_radians()
            * self.radius
            * origin.latitude.to_radians().cos();
        (east, north)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn radius_at_mid_latitude() {
        let earth = EarthModel::from_latitude(45.0);
        assert_abs_diff_eq!(earth.radius(), 6_378_101.03, epsilon = 0.01);
    }

    #[test]
    fn radius_grows_toward_pole() {
        let eq = EarthModel::from_latitude(0.0).radius();
        let pole = EarthModel::from_latitude(90.0).radius();
        assert!(pole > eq, "Gaussian radius is largest at the pole");
    }

    #[test]
    fn ecef_round_trip_keeps_position() {
        let earth = EarthModel::from_latitude(45.0);
        let p = GeoPosition::new(45.02, -45.0, -1000.0);
        let q = earth.to_geo(&earth.to_ecef(&p));
        assert_abs_diff_eq!(q.latitude, p.latitude, epsilon = 1e-10);
        assert_abs_diff_eq!(q.longitude, p.longitude, epsilon = 1e-10);
        assert_abs_diff_eq!(q.altitude, p.altitude, epsilon = 1e-6);
    }

    #[test]
    fn frame_is_orthonormal() {
        let earth = EarthModel::from_latitude(30.0);
        let f = earth.frame(&GeoPosition::new(30.0, 120.0, 0.0));
        assert_abs_diff_eq!(f.east.dot(&f.north), 0.0, epsilon = 1e-12);
        assert_abs_diff_eq!(f.east.dot(&f.up), 0.0, epsilon = 1e-12);
        assert_abs_diff_eq!(f.east.cross(&f.north).dot(&f.up), 1.0, epsilon = 1e-12);
    }

    #[test]
    fn frame_at_point_matches_geodetic_frame() {
        let earth = EarthModel::from_latitude(45.0);
        let p = GeoPosition::new(45.0, -45.0, -200.0);
        let a = earth.frame(&p);
        let b = earth.frame_at(&earth.to_ecef(&p));
        assert_abs_diff_eq!((a.east - b.east).norm(), 0.0, epsilon = 1e-12);
        assert_abs_diff_eq!((a.north - b.north).norm(), 0.0, epsilon = 1e-12);
        assert_abs_diff_eq!((a.up - b.up).norm(), 0.0, epsilon = 1e-12);
    }

    #[test]
    fn direction_angles_invert() {
        let earth = EarthModel::from_latitude(45.0);
        let f = earth.frame(&GeoPosition::new(45.0, -45.0, -100.0));
        let (de, az) = (12.5_f64.to_radians(), (-37.0_f64).to_radians());
        let (de2, az2) = f.angles(&f.direction(de, az));
        assert_abs_diff_eq!(de2, de, epsilon = 1e-12);
        assert_abs_diff_eq!(az2, az, epsilon = 1e-12);
    }

    #[test]
    fn north_step_matches_arc_length() {
        let earth = EarthModel::from_latitude(45.0);
        let a = GeoPosition::new(45.0, -45.0, 0.0);
        let b = GeoPosition::new(45.01, -45.0, 0.0);
        let (e, n) = earth.horizontal_offset(&a, &b);
        assert_abs_diff_eq!(e, 0.0, epsilon = 1e-9);
        assert_abs_diff_eq!(n, earth.radius() * 0.01_f64.to_radians(), epsilon = 1e-6);
    }
}
