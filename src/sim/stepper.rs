use std::f64::consts::PI;

use nalgebra::Vector3;
use rayon::prelude::*;
use tracing::warn;

use super::integrator::rk4_step;
use super::wavefront::Wavefront;
use crate::error::{PropagationError, Result};
use crate::geo::EarthModel;
use crate::ocean::{BoundaryHeight, BoundaryKind, Ocean, SoundSpeed};
use crate::ray::{derivatives, RayCell, RayPoint, RayState};

/// Reflections allowed inside one time step before a ray is declared diverged.
pub const MAX_REFLECTIONS_PER_STEP: usize = 8;

/// Crossing location tolerance (m of boundary penetration).
const CROSSING_TOLERANCE: f64 = 1e-6;
const CROSSING_ITERATIONS: usize = 60;

// ---------------------------------------------------------------------------
// Per-ray failure modes
// ---------------------------------------------------------------------------

/// Why a single ray stopped.
#[derive(Debug)]
enum RayFault {
    /// Non-finite state: the ray is dropped, the run continues.
    Diverged,
    /// Broken environment: the run aborts.
    Environment(PropagationError),
}

impl From<PropagationError> for RayFault {
    fn from(e: PropagationError) -> Self {
        RayFault::Environment(e)
    }
}

type RayResult<T> = std::result::Result<T, RayFault>;

// ---------------------------------------------------------------------------
// Stepper
// ---------------------------------------------------------------------------

/// Advances whole wavefronts through an ocean by a fixed time step.
#[derive(Debug, Clone, Copy)]
pub struct Stepper<'a> {
    ocean: &'a Ocean,
    earth: &'a EarthModel,
    frequencies: &'a [f64],
    time_step: f64,
}

impl<'a> Stepper<'a> {
    pub fn new(ocean: &'a Ocean, earth: &'a EarthModel, frequencies: &'a [f64], time_step: f64) -> Self {
        Self { ocean, earth, frequencies, time_step }
    }

    pub fn time_step(&self) -> f64 {
        self.time_step
    }

    /// Produce the next layer from `curr`.
    ///
    /// Every live ray is integrated independently (in parallel); the
    /// returned layer is complete before caustic marking looks at ray
    /// pairs. Diverged rays stay diverged.
    pub fn advance(&self, curr: &Wavefront) -> Result<Wavefront> {
        let time = curr.time() + self.time_step;
        let cells = curr
            .cells()
            .par_iter()
            .map(|cell| match cell {
                RayCell::Alive(ray) => self.advance_ray(ray),
                RayCell::Diverged { time } => Ok(RayCell::Diverged { time: *time }),
            })
            .collect::<Result<Vec<_>>>()?;

        let (n_de, n_az) = curr.shape();
        let mut next = Wavefront::new(time, curr.step() + 1, n_de, n_az, cells);
        mark_caustics(curr, &mut next);
        Ok(next)
    }

    /// Straight-line step backward from the launch layer, no boundary handling.
    /// Gives the search a previous layer at the first step.
    pub fn backward(&self, launch: &Wavefront) -> Wavefront {
        let dt = self.time_step;
        let cells = launch
            .cells()
            .iter()
            .map(|cell| match cell {
                RayCell::Alive(ray) => {
                    let mut back = ray.clone();
                    back.point.time -= dt;
                    back.point.pos -= ray.velocity() * dt;
                    RayCell::Alive(back)
                }
                RayCell::Diverged { time } => RayCell::Diverged { time: *time },
            })
            .collect();
        let (n_de, n_az) = launch.shape();
        Wavefront::new(launch.time() - dt, launch.step(), n_de, n_az, cells)
    }

    fn advance_ray(&self, ray: &RayState) -> Result<RayCell> {
        match self.advance_reflecting(ray) {
            Ok(next) => Ok(RayCell::Alive(next)),
            Err(RayFault::Diverged) => {
                warn!(
                    time = ray.time(),
                    surface = ray.surface,
                    bottom = ray.bottom,
                    "ray diverged, dropping it from the wavefront"
                );
                Ok(RayCell::Diverged { time: ray.time() })
            }
            Err(RayFault::Environment(e)) => Err(e),
        }
    }

    /// Integrate one full time step, reflecting off boundaries as needed.
    fn advance_reflecting(&self, ray: &RayState) -> RayResult<RayState> {
        let end = ray.time() + self.time_step;
        let mut state = ray.clone();

        for _ in 0..=MAX_REFLECTIONS_PER_STEP {
            let remaining = end - state.time();
            let trial = self.integrate(&state, remaining)?;

            let mut hits = Vec::with_capacity(2);
            for kind in [BoundaryKind::Surface, BoundaryKind::Bottom] {
                let (depth, _) = self.penetration(&trial.point, kind)?;
                if depth > 0.0 {
                    hits.push((kind, self.locate_crossing(&state, &trial, kind)?));
                }
            }
            // earliest crossing wins when both boundaries were passed
            let Some((kind, hit)) = hits.into_iter().min_by(|a, b| a.1.time().total_cmp(&b.1.time())) else {
                return Ok(trial);
            };
            state = self.reflect(hit, kind)?;
        }
        Err(RayFault::Diverged)
    }

    /// RK4 from `state` over `h` seconds, accumulating absorption.
    fn integrate(&self, state: &RayState, h: f64) -> RayResult<RayState> {
        if h <= 0.0 {
            return Ok(state.clone());
        }
        let k1 = derivatives(&state.point, &state.sound);
        let point = rk4_step(&state.point, &k1, h, |p| {
            let sound = self.sound_at(p)?;
            Ok::<_, RayFault>(derivatives(p, &sound))
        })?;
        let sound = self.sound_at(&point)?;
        let point = point.normalized(sound.speed);
        if !point.is_finite() {
            return Err(RayFault::Diverged);
        }

        let mut next = state.clone();
        let path = 0.5 * (state.sound.speed + sound.speed) * h;
        for (k, &f) in self.frequencies.iter().enumerate() {
            let a0 = self.ocean.attenuation(&state.point.pos, f, state.time(), self.earth);
            let a1 = self.ocean.attenuation(&point.pos, f, point.time, self.earth);
            next.attenuation[k] += 0.5 * (a0 + a1) * path;
        }
        next.point = point;
        next.sound = sound;
        Ok(next)
    }

    fn sound_at(&self, p: &RayPoint) -> RayResult<SoundSpeed> {
        if !p.is_finite() {
            return Err(RayFault::Diverged);
        }
        Ok(self.ocean.sound_speed(&p.pos, p.time, self.earth)?)
    }

    /// Distance the point has moved past a boundary (m, > 0 when outside
    /// the water) and the boundary height below/above it.
    fn penetration(&self, p: &RayPoint, kind: BoundaryKind) -> RayResult<(f64, BoundaryHeight)> {
        let geo = self.earth.to_geo(&p.pos);
        let height = self.ocean.boundary(kind).height(&geo, p.time);
        if !(height.altitude.is_finite() && height.normal.iter().all(|v| v.is_finite()))
            || height.normal.norm() == 0.0
        {
            return Err(RayFault::Environment(PropagationError::InvalidBoundary {
                boundary: kind.name(),
                position: geo,
            }));
        }
        let depth = match kind {
            BoundaryKind::Surface => geo.altitude - height.altitude,
            BoundaryKind::Bottom => height.altitude - geo.altitude,
        };
        Ok((depth, height))
    }

    /// Illinois false position on the time of the boundary crossing
    /// between `start` (inside) and `trial` (outside).
    fn locate_crossing(&self, start: &RayState, trial: &RayState, kind: BoundaryKind) -> RayResult<RayState> {
        let (mut fa, _) = self.penetration(&start.point, kind)?;
        if fa >= 0.0 {
            // already on the boundary: reflect where we stand
            return Ok(start.clone());
        }
        let (mut fb, _) = self.penetration(&trial.point, kind)?;
        let mut a = 0.0;
        let mut b = trial.time() - start.time();
        let mut side = 0i8;
        let mut best = trial.clone();

        for _ in 0..CROSSING_ITERATIONS {
            let t = (a * fb - b * fa) / (fb - fa);
            let probe = self.integrate(start, t)?;
            let (f, _) = self.penetration(&probe.point, kind)?;
            best = probe;
            if f.abs() < CROSSING_TOLERANCE || (b - a) < 1e-12 {
                break;
            }
            if f > 0.0 {
                b = t;
                fb = f;
                if side == 1 {
                    fa *= 0.5;
                }
                side = 1;
            } else {
                a = t;
                fa = f;
                if side == -1 {
                    fb *= 0.5;
                }
                side = -1;
            }
        }
        Ok(best)
    }

    /// Snap onto the boundary, mirror slowness about its normal and apply
    /// the boundary's reflection loss and phase.
    fn reflect(&self, mut state: RayState, kind: BoundaryKind) -> RayResult<RayState> {
        let (depth, height) = self.penetration(&state.point, kind)?;
        let frame = self.earth.frame_at(&state.point.pos);
        let shift = match kind {
            BoundaryKind::Surface => -depth,
            BoundaryKind::Bottom => depth,
        };
        state.point.pos += frame.up * shift;

        let normal = frame.to_ecef(&height.normal).normalize();
        let xi = state.point.slowness;
        let along = xi.dot(&normal);
        state.point.slowness = xi - normal * (2.0 * along);

        let grazing = (along.abs() * state.sound.speed).clamp(0.0, 1.0).asin();
        let geo = self.earth.to_geo(&state.point.pos);
        let boundary = self.ocean.boundary(kind);
        for (k, &f) in self.frequencies.iter().enumerate() {
            let r = boundary.reflect_loss(&geo, f, grazing);
            state.attenuation[k] += r.loss_db;
            state.phase[k] += r.phase;
        }
        match kind {
            BoundaryKind::Surface => state.surface += 1,
            BoundaryKind::Bottom => state.bottom += 1,
        }
        Ok(state)
    }
}

// ---------------------------------------------------------------------------
// Caustics
// ---------------------------------------------------------------------------

/// Flag neighbor pairs whose separation reverses between `curr` and `next`.
///
/// Only pairs with matching reflection history in both layers are compared.
/// The lower-index ray of a reversed pair gets one caustic and its phase
/// flips by pi.
pub fn mark_caustics(curr: &Wavefront, next: &mut Wavefront) {
    let (n_de, n_az) = curr.shape();
    let mut hits = Vec::new();

    let mut check = |a: (usize, usize), b: (usize, usize)| {
        let (Some(ca), Some(cb), Some(na), Some(nb)) =
            (curr.ray(a.0, a.1), curr.ray(b.0, b.1), next.ray(a.0, a.1), next.ray(b.0, b.1))
        else {
            return;
        };
        if !(ca.same_history(cb) && na.same_history(nb) && ca.same_history(na)) {
            return;
        }
        let before: Vector3<f64> = cb.pos() - ca.pos();
        let after: Vector3<f64> = nb.pos() - na.pos();
        if before.dot(&after) < 0.0 {
            hits.push(next.index(a.0, a.1));
        }
    };

    for i in 0..n_de {
        for j in 0..n_az {
            if i + 1 < n_de {
                check((i, j), (i + 1, j));
            }
            if j + 1 < n_az {
                check((i, j), (i, j + 1));
            }
        }
    }

    let cells = next.cells_mut();
    for k in hits {
        if let Some(ray) = cells[k].alive_mut() {
            ray.caustic += 1;
            ray.phase.iter_mut().for_each(|p| *p -= PI);
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geo::GeoPosition;
    use crate::ocean::{ConstantAttenuation, FlatBoundary, LinearProfile};
    use approx::assert_abs_diff_eq;

    fn launch(ocean: &Ocean, earth: &EarthModel, src: GeoPosition, de: &[f64], az: &[f64], n_freq: usize) -> Wavefront {
        let x = earth.to_ecef(&src);
        let frame = earth.frame(&src);
        let sound = ocean.sound_speed(&x, 0.0, earth).unwrap();
        let mut cells = Vec::new();
        for d in de {
            for a in az {
                let dir = frame.direction(d.to_radians(), a.to_radians());
                let point = RayPoint { time: 0.0, pos: x, slowness: dir / sound.speed };
                cells.push(RayCell::Alive(RayState::new(point, sound, n_freq)));
            }
        }
        Wavefront::new(0.0, 0, de.len(), az.len(), cells)
    }

    fn run(stepper: &Stepper, mut w: Wavefront, steps: usize) -> Wavefront {
        for _ in 0..steps {
            w = stepper.advance(&w).unwrap();
        }
        w
    }

    #[test]
    fn straight_ray_travels_c_times_t() {
        let earth = EarthModel::from_latitude(45.0);
        let ocean = Ocean::isovelocity(1500.0, 3000.0);
        let src = GeoPosition::new(45.0, -45.0, -1000.0);
        let freqs = [1000.0];
        let stepper = Stepper::new(&ocean, &earth, &freqs, 0.1);
        let w0 = launch(&ocean, &earth, src, &[0.0], &[0.0], 1);
        let w = run(&stepper, w0, 10);
        let ray = w.ray(0, 0).unwrap();
        let dist = (ray.pos() - earth.to_ecef(&src)).norm();
        assert_abs_diff_eq!(dist, 1500.0, epsilon = 1e-6);
        assert_abs_diff_eq!(ray.time(), 1.0, epsilon = 1e-12);
        assert_eq!(ray.surface + ray.bottom, 0);
    }

    #[test]
    fn surface_reflection_flips_phase_and_stays_in_water() {
        let earth = EarthModel::from_latitude(45.0);
        let ocean = Ocean::isovelocity(1500.0, 3000.0);
        let src = GeoPosition::new(45.0, -45.0, -100.0);
        let freqs = [1000.0, 2000.0];
        let stepper = Stepper::new(&ocean, &earth, &freqs, 0.1);
        // 30 deg up: reaches the surface after 200 m of path
        let w = run(&stepper, launch(&ocean, &earth, src, &[30.0], &[0.0], 2), 3);
        let ray = w.ray(0, 0).unwrap();
        assert_eq!(ray.surface, 1);
        assert_eq!(ray.bottom, 0);
        assert_abs_diff_eq!(ray.phase[0], -PI, epsilon = 1e-12);
        assert_abs_diff_eq!(ray.phase[1], -PI, epsilon = 1e-12);
        assert!(earth.altitude(ray.pos()) < 0.0);
        let (de, _) = earth.frame_at(ray.pos()).angles(&ray.direction());
        assert_abs_diff_eq!(de.to_degrees(), -30.0, epsilon = 0.01);
        // image-source path: total length is unchanged by the reflection
        assert_abs_diff_eq!(ray.velocity().norm(), 1500.0, epsilon = 1e-9);
    }

    #[test]
    fn bottom_reflection_is_rigid() {
        let earth = EarthModel::from_latitude(45.0);
        let ocean = Ocean::isovelocity(1500.0, 200.0);
        let src = GeoPosition::new(45.0, -45.0, -100.0);
        let freqs = [500.0];
        let stepper = Stepper::new(&ocean, &earth, &freqs, 0.1);
        let w = run(&stepper, launch(&ocean, &earth, src, &[-45.0], &[0.0], 1), 2);
        let ray = w.ray(0, 0).unwrap();
        assert_eq!(ray.bottom, 1);
        assert_eq!(ray.phase[0], 0.0);
        let alt = earth.altitude(ray.pos());
        assert!(alt > -200.0 && alt < 0.0);
    }

    #[test]
    fn several_reflections_in_one_step() {
        // 20 m waveguide, steep ray: many bounces per 0.1 s
        let earth = EarthModel::from_latitude(45.0);
        let ocean = Ocean::isovelocity(1500.0, 20.0);
        let src = GeoPosition::new(45.0, -45.0, -10.0);
        let freqs = [500.0];
        let stepper = Stepper::new(&ocean, &earth, &freqs, 0.1);
        let w = run(&stepper, launch(&ocean, &earth, src, &[15.0], &[0.0], 1), 1);
        let ray = w.ray(0, 0).unwrap();
        // 150 m path, vertical travel 39 m: one surface and one bottom bounce
        assert_eq!(ray.surface, 1);
        assert_eq!(ray.bottom, 1);
        let alt = earth.altitude(ray.pos());
        assert!(alt > -20.0 && alt < 0.0);
    }

    #[test]
    fn runaway_reflections_diverge() {
        // 1 m waveguide, vertical ray: far more bounces than allowed per step
        let earth = EarthModel::from_latitude(45.0);
        let ocean = Ocean::isovelocity(1500.0, 1.0);
        let src = GeoPosition::new(45.0, -45.0, -0.5);
        let freqs = [500.0];
        let stepper = Stepper::new(&ocean, &earth, &freqs, 0.1);
        let w = run(&stepper, launch(&ocean, &earth, src, &[80.0], &[0.0], 1), 1);
        assert!(!w.cell(0, 0).is_alive());
        // and it stays dropped
        let w = stepper.advance(&w).unwrap();
        assert_eq!(w.alive_count(), 0);
    }

    #[test]
    fn absorption_accumulates_along_path() {
        let earth = EarthModel::from_latitude(45.0);
        let ocean = Ocean::isovelocity(1500.0, 3000.0).with_attenuation(Box::new(ConstantAttenuation::new(2.0)));
        let src = GeoPosition::new(45.0, -45.0, -1000.0);
        let freqs = [1000.0];
        let stepper = Stepper::new(&ocean, &earth, &freqs, 0.1);
        let w = run(&stepper, launch(&ocean, &earth, src, &[0.0], &[0.0], 1), 10);
        // 1.5 km at 2 dB/km
        assert_abs_diff_eq!(w.ray(0, 0).unwrap().attenuation[0], 3.0, epsilon = 1e-9);
    }

    #[test]
    fn bad_sound_speed_aborts_the_step() {
        let earth = EarthModel::from_latitude(45.0);
        // speed reaches zero 50 m below the surface
        let ocean = Ocean::new(
            Box::new(FlatBoundary::surface()),
            Box::new(FlatBoundary::bottom(5000.0)),
            Box::new(LinearProfile::new(1500.0, -30.0)),
        );
        let src = GeoPosition::new(45.0, -45.0, -46.0);
        let freqs = [1000.0];
        let stepper = Stepper::new(&ocean, &earth, &freqs, 0.1);
        let w = launch(&ocean, &earth, src, &[-90.0], &[0.0], 1);
        let err = stepper.advance(&w).unwrap_err();
        assert!(matches!(err, PropagationError::NonPhysicalSoundSpeed { .. }));
    }

    #[test]
    fn backward_layer_is_one_step_behind() {
        let earth = EarthModel::from_latitude(45.0);
        let ocean = Ocean::isovelocity(1500.0, 3000.0);
        let src = GeoPosition::new(45.0, -45.0, -1000.0);
        let freqs = [1000.0];
        let stepper = Stepper::new(&ocean, &earth, &freqs, 0.1);
        let w0 = launch(&ocean, &earth, src, &[0.0, 10.0], &[0.0], 1);
        let back = stepper.backward(&w0);
        assert_abs_diff_eq!(back.time(), -0.1, epsilon = 1e-15);
        let d = (back.ray(1, 0).unwrap().pos() - earth.to_ecef(&src)).norm();
        assert_abs_diff_eq!(d, 150.0, epsilon = 1e-6);
    }

    #[test]
    fn crossing_rays_mark_a_caustic() {
        let sound = SoundSpeed { speed: 1500.0, gradient: Vector3::zeros() };
        let cell = |x: f64, y: f64| {
            let p = RayPoint { time: 0.0, pos: Vector3::new(6.4e6 - 100.0, x, y), slowness: Vector3::new(0.0, 1.0 / 1500.0, 0.0) };
            RayCell::Alive(RayState::new(p, sound, 1))
        };
        let curr = Wavefront::new(1.0, 1, 3, 1, vec![cell(0.0, 0.0), cell(0.0, 10.0), cell(0.0, 20.0)]);
        // rays 0 and 1 swap order, ray 2 keeps its spacing from ray 1
        let mut next = Wavefront::new(1.1, 2, 3, 1, vec![cell(0.0, 12.0), cell(0.0, 8.0), cell(0.0, 30.0)]);
        mark_caustics(&curr, &mut next);
        let r0 = next.ray(0, 0).unwrap();
        assert_eq!(r0.caustic, 1);
        assert_abs_diff_eq!(r0.phase[0], -PI, epsilon = 1e-15);
        assert_eq!(next.ray(1, 0).unwrap().caustic, 0);
        assert_eq!(next.ray(2, 0).unwrap().caustic, 0);
    }

    #[test]
    fn different_histories_do_not_form_caustics() {
        let sound = SoundSpeed { speed: 1500.0, gradient: Vector3::zeros() };
        let cell = |y: f64, surface: u32| {
            let p = RayPoint { time: 0.0, pos: Vector3::new(6.4e6, 0.0, y), slowness: Vector3::new(0.0, 1.0 / 1500.0, 0.0) };
            let mut s = RayState::new(p, sound, 1);
            s.surface = surface;
            RayCell::Alive(s)
        };
        let curr = Wavefront::new(1.0, 1, 1, 2, vec![cell(0.0, 0), cell(10.0, 0)]);
        let mut next = Wavefront::new(1.1, 2, 1, 2, vec![cell(12.0, 1), cell(8.0, 0)]);
        mark_caustics(&curr, &mut next);
        assert_eq!(next.ray(0, 0).unwrap().caustic, 0);
    }
}
