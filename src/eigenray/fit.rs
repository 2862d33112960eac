use nalgebra::{Matrix3, Vector3};

use super::search::SearchLayers;
use super::target::Target;
use super::Eigenray;
use crate::ray::RayState;

const MAX_ITERATIONS: usize = 25;
const TIME_TOLERANCE: f64 = 1e-10; // s
const ANGLE_TOLERANCE: f64 = 1e-12; // rad

// ---------------------------------------------------------------------------
// 3-point derivative stencils on a non-uniform axis
// ---------------------------------------------------------------------------

/// Nodes and Lagrange derivative weights for one angular axis.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Stencil {
    pub nodes: [usize; 3],
    pub d1: [f64; 3], // first-derivative weights at the center ray
    pub d2: [f64; 3], // second-derivative weights
}

impl Stencil {
    /// Centered on `k` when both neighbors are usable, otherwise one-sided
    /// (forward, then backward). `usable` filters rays that may take part.
    pub fn around(axis: &[f64], k: usize, usable: impl Fn(usize) -> bool) -> Option<Stencil> {
        let n = axis.len();
        let nodes = if k >= 1 && k + 1 < n && usable(k - 1) && usable(k + 1) {
            [k - 1, k, k + 1]
        } else if k + 2 < n && usable(k + 1) && usable(k + 2) {
            [k, k + 1, k + 2]
        } else if k >= 2 && usable(k - 1) && usable(k - 2) {
            [k - 2, k - 1, k]
        } else {
            return None;
        };

        let x = axis[k];
        let [x0, x1, x2] = nodes.map(|i| axis[i]);
        let den = [(x0 - x1) * (x0 - x2), (x1 - x0) * (x1 - x2), (x2 - x0) * (x2 - x1)];
        let d1 = [
            ((x - x1) + (x - x2)) / den[0],
            ((x - x0) + (x - x2)) / den[1],
            ((x - x0) + (x - x1)) / den[2],
        ];
        let d2 = den.map(|d| 2.0 / d);
        Some(Stencil { nodes, d1, d2 })
    }
}

// ---------------------------------------------------------------------------
// Local model of the wavefront around one ray
// ---------------------------------------------------------------------------

/// Second-order Taylor model of ray position as a function of
/// (time, DE, AZ) offsets from a grid node, relative to the target.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LocalModel {
    pub x0: Vector3<f64>,
    pub xt: Vector3<f64>,
    pub xtt: Vector3<f64>,
    pub xd: Vector3<f64>,
    pub xdd: Vector3<f64>,
    pub xa: Vector3<f64>,
    pub xaa: Vector3<f64>,
    pub xtd: Vector3<f64>,
    pub xta: Vector3<f64>,
    pub xda: Vector3<f64>,
}

impl LocalModel {
    /// Offset from the target at `d = (dt, dde, daz)`.
    pub fn offset(&self, d: &Vector3<f64>) -> Vector3<f64> {
        let (t, e, a) = (d.x, d.y, d.z);
        self.x0
            + self.xt * t
            + self.xd * e
            + self.xa * a
            + self.xtt * (0.5 * t * t)
            + self.xdd * (0.5 * e * e)
            + self.xaa * (0.5 * a * a)
            + self.xtd * (t * e)
            + self.xta * (t * a)
            + self.xda * (e * a)
    }

    /// Columns: d/dt, d/dDE, d/dAZ.
    pub fn jacobian(&self, d: &Vector3<f64>) -> Matrix3<f64> {
        let (t, e, a) = (d.x, d.y, d.z);
        Matrix3::from_columns(&[
            self.xt + self.xtt * t + self.xtd * e + self.xta * a,
            self.xd + self.xdd * e + self.xtd * t + self.xda * a,
            self.xa + self.xaa * a + self.xta * t + self.xda * e,
        ])
    }

    /// Newton iteration for the offsets that put the ray on the target.
    pub fn solve(&self) -> Option<Vector3<f64>> {
        let mut d = Vector3::zeros();
        for _ in 0..MAX_ITERATIONS {
            let step = self.jacobian(&d).lu().solve(&-self.offset(&d))?;
            d += step;
            if !d.iter().all(|v| v.is_finite()) {
                return None;
            }
            if step.x.abs() < TIME_TOLERANCE && step.y.abs() < ANGLE_TOLERANCE && step.z.abs() < ANGLE_TOLERANCE {
                return Some(d);
            }
        }
        None
    }
}

// ---------------------------------------------------------------------------
// Fit an eigenray around a detected node
// ---------------------------------------------------------------------------

/// Allowed offset range around node `k`: one neighbor cell on each side,
/// one mirrored edge cell past the ends of the fan.
fn cell_bounds(axis: &[f64], k: usize) -> (f64, f64) {
    let n = axis.len();
    let below = if k > 0 { axis[k - 1] - axis[k] } else { axis[0] - axis[1] };
    let above = if k + 1 < n { axis[k + 1] - axis[k] } else { axis[n - 1] - axis[n - 2] };
    (below.min(above), below.max(above))
}

/// Build the local model for node (i, j) of the current layer.
pub fn local_model(layers: &SearchLayers, target: &Target, i: usize, j: usize) -> Option<LocalModel> {
    let curr = layers.curr;
    let center = curr.ray(i, j)?;
    let same = |r: Option<&RayState>| r.is_some_and(|r| r.same_history(center));
    let de = layers.fan.de_radians();
    let az = layers.fan.az_radians();

    let sd = Stencil::around(de, i, |k| same(curr.ray(k, j)))?;
    let sa = Stencil::around(az, j, |k| same(curr.ray(i, k)))?;

    let mut model = LocalModel {
        x0: center.pos() - target.ecef,
        xt: center.velocity(),
        xtt: center.acceleration(),
        xd: Vector3::zeros(),
        xdd: Vector3::zeros(),
        xa: Vector3::zeros(),
        xaa: Vector3::zeros(),
        xtd: Vector3::zeros(),
        xta: Vector3::zeros(),
        xda: Vector3::zeros(),
    };

    for (k, &p) in sd.nodes.iter().enumerate() {
        let r = curr.ray(p, j)?;
        model.xd += r.pos() * sd.d1[k];
        model.xdd += r.pos() * sd.d2[k];
        model.xtd += r.velocity() * sd.d1[k];
    }
    for (k, &q) in sa.nodes.iter().enumerate() {
        let r = curr.ray(i, q)?;
        model.xa += r.pos() * sa.d1[k];
        model.xaa += r.pos() * sa.d2[k];
        model.xta += r.velocity() * sa.d1[k];
    }

    // mixed term only when the whole 3x3 patch shares the center's history
    let patch = sd.nodes.iter().all(|&p| sa.nodes.iter().all(|&q| same(curr.ray(p, q))));
    if patch {
        for (ka, &q) in sa.nodes.iter().enumerate() {
            let mut dq = Vector3::zeros();
            for (kd, &p) in sd.nodes.iter().enumerate() {
                dq += curr.ray(p, q)?.pos() * sd.d1[kd];
            }
            model.xda += dq * sa.d1[ka];
        }
    }
    Some(model)
}

/// Solve for the eigenray through node (i, j), or None when the fit is rejected.
pub fn fit_eigenray(layers: &SearchLayers, target: &Target, i: usize, j: usize) -> Option<Eigenray> {
    let model = local_model(layers, target, i, j)?;
    let center = layers.curr.ray(i, j)?;
    let d = model.solve()?;
    let (dt, dde, daz) = (d.x, d.y, d.z);

    let time = layers.curr.time() + dt;
    if dt.abs() > layers.time_step || time <= 0.0 {
        return None;
    }
    let (lo, hi) = cell_bounds(layers.fan.de_radians(), i);
    if !(lo..=hi).contains(&dde) {
        return None;
    }
    let (lo, hi) = cell_bounds(layers.fan.az_radians(), j);
    if !(lo..=hi).contains(&daz) {
        return None;
    }

    // ray tube area per unit launch solid angle
    let jac = model.jacobian(&d);
    let velocity = jac.column(0).into_owned();
    let speed = velocity.norm();
    let dir = velocity / speed;
    let area = jac.column(1).cross(&jac.column(2)).dot(&dir);
    let source_de = layers.fan.de_radians()[i] + dde;
    let source_az = layers.fan.az_radians()[j] + daz;
    let spreading = 10.0 * (area.abs() / source_de.cos()).log10() - 10.0 * (speed / layers.source_speed).log10();
    if !spreading.is_finite() {
        return None;
    }

    // absorption and boundary loss, interpolated along the node ray in time
    let neighbor = (if dt >= 0.0 { layers.next.ray(i, j) } else { layers.prev.ray(i, j) })
        .filter(|r| r.same_history(center));
    let frac = dt.abs() / layers.time_step;
    let intensity = center
        .attenuation
        .iter()
        .enumerate()
        .map(|(k, &a)| {
            let loss = match neighbor {
                Some(r) => a + (r.attenuation[k] - a) * frac,
                None => a,
            };
            spreading + loss
        })
        .collect();

    let (target_de, target_az) = target.frame.angles(&dir);
    Some(Eigenray {
        time,
        intensity,
        phase: center.phase.clone(),
        source_de: source_de.to_degrees(),
        source_az: source_az.to_degrees(),
        target_de: target_de.to_degrees(),
        target_az: target_az.to_degrees(),
        surface: center.surface,
        bottom: center.bottom,
        caustic: center.caustic,
    })
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
