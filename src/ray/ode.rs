use super::state::{Deriv, RayPoint};
use crate::ocean::SoundSpeed;

// ---------------------------------------------------------------------------
// Ray equations (Cartesian, earth-centered)
// ---------------------------------------------------------------------------

/// Right-hand side of the ray equations at a point.
///
///   dx/dt  = c^2 xi
///   dxi/dt = -grad(c) / c
pub fn derivatives(point: &RayPoint, sound: &SoundSpeed) -> Deriv {
    let c = sound.speed;
    Deriv {
        dpos: point.slowness * (c * c),
        dslowness: -sound.gradient / c,
    }
}
