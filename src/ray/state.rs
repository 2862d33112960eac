use nalgebra::Vector3;

use crate::ocean::SoundSpeed;

// ---------------------------------------------------------------------------
// Kinematic point: what the integrator advances
// ---------------------------------------------------------------------------

/// Position and slowness of a ray at one instant.
/// Frame: earth-centered Cartesian, origin at the earth's center.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RayPoint {
    pub time: f64,                // s since launch
    pub pos: Vector3<f64>,        // m
    pub slowness: Vector3<f64>,   // s/m, |slowness| = 1/c
}

impl RayPoint {
    /// Advance by a derivative scaled by dt (used inside RK4).
    pub fn apply(&self, d: &Deriv, dt: f64) -> RayPoint {
        RayPoint {
            time: self.time + dt,
            pos: self.pos + d.dpos * dt,
            slowness: self.slowness + d.dslowness * dt,
        }
    }

    pub fn is_finite(&self) -> bool {
        self.time.is_finite()
            && self.pos.iter().all(|v| v.is_finite())
            && self.slowness.iter().all(|v| v.is_finite())
    }

    /// Rescale slowness to exactly 1/c.
    pub fn normalized(mut self, speed: f64) -> RayPoint {
        let n = self.slowness.norm();
        if n > 0.0 {
            self.slowness /= n * speed;
        }
        self
    }
}

// ---------------------------------------------------------------------------
// Derivative (dx/dt, dxi/dt)
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Deriv {
    pub dpos: Vector3<f64>,       // m/s, ray velocity
    pub dslowness: Vector3<f64>,  // s/m^2
}

// ---------------------------------------------------------------------------
// Full ray state
// ---------------------------------------------------------------------------

/// Everything one grid cell knows about its ray.
#[derive(Debug, Clone, PartialEq)]
pub struct RayState {
    pub point: RayPoint,
    pub sound: SoundSpeed,     // environment at `point.pos`
    pub surface: u32,          // surface reflections
    pub bottom: u32,           // bottom reflections
    pub caustic: u32,          // caustics passed
    pub phase: Vec<f64>,       // rad per frequency, reflections + caustics
    pub attenuation: Vec<f64>, // dB per frequency, absorption + boundary loss
}

impl RayState {
    pub fn new(point: RayPoint, sound: SoundSpeed, n_freq: usize) -> Self {
        Self {
            point,
            sound,
            surface: 0,
            bottom: 0,
            caustic: 0,
            phase: vec![0.0; n_freq],
            attenuation: vec![0.0; n_freq],
        }
    }

    pub fn time(&self) -> f64 {
        self.point.time
    }

    pub fn pos(&self) -> &Vector3<f64> {
        &self.point.pos
    }

    /// dx/dt = c^2 xi
    pub fn velocity(&self) -> Vector3<f64> {
        self.point.slowness * (self.sound.speed * self.sound.speed)
    }

    /// d^2x/dt^2 along the ray, from the ray equations.
    pub fn acceleration(&self) -> Vector3<f64> {
        let c = self.sound.speed;
        let v = self.velocity();
        let dc_dt = self.sound.gradient.dot(&v);
        self.point.slowness * (2.0 * c * dc_dt) - self.sound.gradient * c
    }

    /// Unit propagation direction.
    pub fn direction(&self) -> Vector3<f64> {
        self.point.slowness.normalize()
    }

    /// True when both states have seen the same boundaries.
    pub fn same_history(&self, other: &RayState) -> bool {
        self.surface == other.surface && self.bottom == other.bottom
    }
}

// ---------------------------------------------------------------------------
// Grid cell
// ---------------------------------------------------------------------------

/// A wavefront grid cell: a live ray or one that left the valid domain.
#[derive(Debug, Clone, PartialEq)]
pub enum RayCell {
    Alive(RayState),
    /// Numerical divergence; the ray is excluded from stepping and search.
    Diverged { time: f64 },
}

impl RayCell {
    pub fn alive(&self) -> Option<&RayState> {
        match self {
            RayCell::Alive(r) => Some(r),
            RayCell::Diverged { .. } => None,
        }
    }

    pub fn alive_mut(&mut self) -> Option<&mut RayState> {
        match self {
            RayCell::Alive(r) => Some(r),
            RayCell::Diverged { .. } => None,
        }
    }

    pub fn is_alive(&self) -> bool {
        matches!(self, RayCell::Alive(_))
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    fn state(speed: f64, gradient: Vector3<f64>) -> RayState {
        let point = RayPoint {
            time: 0.0,
            pos: Vector3::new(6.4e6, 0.0, 0.0),
            slowness: Vector3::new(0.0, 1.0 / speed, 0.0),
        };
        RayState::new(point, SoundSpeed { speed, gradient }, 2)
    }

    #[test]
    fn velocity_has_sound_speed_magnitude() {
        let s = state(1500.0, Vector3::zeros());
        assert_abs_diff_eq!(s.velocity().norm(), 1500.0, epsilon = 1e-9);
        assert_eq!(s.acceleration().norm(), 0.0);
    }

    #[test]
    fn acceleration_bends_toward_slower_water() {
        // speed increases along +x, ray travels along +y: it must turn toward -x
        let s = state(1500.0, Vector3::new(0.05, 0.0, 0.0));
        assert!(s.acceleration().x < 0.0);
    }

    #[test]
    fn normalized_restores_slowness_magnitude() {
        let p = RayPoint {
            time: 1.0,
            pos: Vector3::zeros(),
            slowness: Vector3::new(3.0, 4.0, 0.0),
        };
        let n = p.normalized(1500.0);
        assert_abs_diff_eq!(n.slowness.norm(), 1.0 / 1500.0, epsilon = 1e-18);
    }

    #[test]
    fn diverged_cell_has_no_state() {
        let cell = RayCell::Diverged { time: 2.0 };
        assert!(cell.alive().is_none());
        assert!(!cell.is_alive());
    }
}
