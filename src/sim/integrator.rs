use crate::ray::{Deriv, RayPoint};

// ---------------------------------------------------------------------------
// Classical 4th-order Runge-Kutta for the ray equations
// ---------------------------------------------------------------------------

/// Single RK4 step: advance a ray point by dt.
///
/// `k1` is the derivative at `start` (cached from the previous step, so the
/// environment is queried three times per step). `deriv` evaluates the
/// right-hand side at intermediate points and may fail, e.g. when the
/// environment rejects a position.
pub fn rk4_step<E, F>(start: &RayPoint, k1: &Deriv, dt: f64, mut deriv: F) -> Result<RayPoint, E>
where
    F: FnMut(&RayPoint) -> Result<Deriv, E>,
{
    let k2 = deriv(&start.apply(k1, dt * 0.5))?;
    let k3 = deriv(&start.apply(&k2, dt * 0.5))?;
    let k4 = deriv(&start.apply(&k3, dt))?;

    Ok(RayPoint {
        time: start.time + dt,
        pos: start.pos + (k1.dpos + 2.0 * k2.dpos + 2.0 * k3.dpos + k4.dpos) * (dt / 6.0),
        slowness: start.slowness
            + (k1.dslowness + 2.0 * k2.dslowness + 2.0 * k3.dslowness + k4.dslowness) * (dt / 6.0),
    })
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
