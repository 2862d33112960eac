use rayon::prelude::*;
use tracing::{debug, info, trace};

use super::observer::{NoObserver, WavefrontObserver};
use super::stepper::Stepper;
use super::wavefront::Wavefront;
use crate::config::{PropagationConfig, RayFan};
use crate::eigenray::{find_eigenrays, SearchLayers, Target, TargetGrid};
use crate::error::{PropagationError, Result};
use crate::geo::{EarthModel, GeoPosition};
use crate::ocean::{BoundaryKind, Ocean};
use crate::proploss::Proploss;
use crate::ray::{RayCell, RayPoint, RayState};

/// Targets closer than this to the source are rejected (m).
const MIN_TARGET_RANGE: f64 = 1e-3;

// ---------------------------------------------------------------------------
// Wave queue: three wavefront layers marching forward in time
// ---------------------------------------------------------------------------

/// Owns the previous, current and next wavefronts of one run and the
/// eigenrays found so far.
///
/// Each step builds a new layer from the newest one, rotates the three
/// layers, then searches the frozen current layer for every target.
pub struct WaveQueue<'a> {
    fan: &'a RayFan,
    stepper: Stepper<'a>,
    source_speed: f64,
    targets: Vec<Target>,
    prev: Wavefront,
    curr: Wavefront,
    next: Wavefront,
    proploss: Proploss,
}

impl<'a> WaveQueue<'a> {
    /// Launch the fan from `source`.
    ///
    /// Fails before any stepping when the source is outside the water
    /// column, a target sits on the source, or the environment is
    /// unusable at the source.
    pub fn new(
        ocean: &'a Ocean,
        earth: &'a EarthModel,
        fan: &'a RayFan,
        source: GeoPosition,
        targets: TargetGrid,
        time_step: f64,
    ) -> Result<Self> {
        if !(time_step.is_finite() && time_step > 0.0) {
            return Err(PropagationError::InvalidTimeStep(time_step));
        }
        if !source.is_finite() || !in_water(ocean, &source) {
            return Err(PropagationError::SourceOutsideWater { position: source });
        }

        let origin = earth.to_ecef(&source);
        let prepared = targets
            .iter()
            .map(|(row, col, p)| {
                let t = Target::new(row, col, *p, earth);
                if (t.ecef - origin).norm() < MIN_TARGET_RANGE {
                    Err(PropagationError::TargetAtSource { row, col })
                } else {
                    Ok(t)
                }
            })
            .collect::<Result<Vec<_>>>()?;

        let sound = ocean.sound_speed(&origin, 0.0, earth)?;
        let frame = earth.frame(&source);
        let n_freq = fan.frequencies().len();
        let mut cells = Vec::with_capacity(fan.len());
        for &de in fan.de_radians() {
            for &az in fan.az_radians() {
                let dir = frame.direction(de, az);
                let point = RayPoint { time: 0.0, pos: origin, slowness: dir / sound.speed };
                cells.push(RayCell::Alive(RayState::new(point, sound, n_freq)));
            }
        }
        let (n_de, n_az) = fan.shape();
        let launch = Wavefront::new(0.0, 0, n_de, n_az, cells);

        let stepper = Stepper::new(ocean, earth, fan.frequencies(), time_step);
        let prev = stepper.backward(&launch);
        let next = stepper.advance(&launch)?;

        info!(
            source = %source,
            rays = fan.len(),
            targets = prepared.len(),
            time_step,
            sound_speed = sound.speed,
            "wavefront launched"
        );

        Ok(Self {
            fan,
            stepper,
            source_speed: sound.speed,
            targets: prepared,
            prev,
            curr: launch,
            next,
            proploss: Proploss::new(targets, fan.frequencies().to_vec()),
        })
    }

    /// Travel time of the current layer (s).
    pub fn time(&self) -> f64 {
        self.curr.time()
    }

    pub fn time_step(&self) -> f64 {
        self.stepper.time_step()
    }

    /// The frozen current layer.
    pub fn wavefront(&self) -> &Wavefront {
        &self.curr
    }

    pub fn proploss(&self) -> &Proploss {
        &self.proploss
    }

    pub fn into_proploss(self) -> Proploss {
        self.proploss
    }

    /// Advance one time step and search the new current layer.
    /// Returns how many eigenrays were added.
    pub fn step(&mut self) -> Result<usize> {
        let newest = self.stepper.advance(&self.next)?;
        let curr = std::mem::replace(&mut self.next, newest);
        self.prev = std::mem::replace(&mut self.curr, curr);

        let added = self.search();
        trace!(
            time = self.curr.time(),
            alive = self.curr.alive_count(),
            eigenrays = added,
            "step complete"
        );
        Ok(added)
    }

    fn search(&mut self) -> usize {
        let layers = SearchLayers {
            prev: &self.prev,
            curr: &self.curr,
            next: &self.next,
            fan: self.fan,
            time_step: self.stepper.time_step(),
            source_speed: self.source_speed,
        };
        let found: Vec<_> = self
            .targets
            .par_iter()
            .map(|t| (t.row, t.col, find_eigenrays(&layers, t)))
            .collect();

        let mut added = 0;
        for (row, col, detections) in found {
            for d in detections {
                let ray = &d.eigenray;
                let (time, de, az, surface, bottom) = (ray.time, ray.source_de, ray.source_az, ray.surface, ray.bottom);
                if self.proploss.add_eigenray(row, col, d.eigenray, d.bracket, &d.tolerance) {
                    debug!(row, col, time, de, az, surface, bottom, "eigenray");
                    added += 1;
                } else {
                    debug!(row, col, time, de, az, "duplicate eigenray dropped");
                }
            }
        }
        added
    }
}

fn in_water(ocean: &Ocean, p: &GeoPosition) -> bool {
    let top = ocean.boundary(BoundaryKind::Surface).height(p, 0.0).altitude;
    let floor = ocean.boundary(BoundaryKind::Bottom).height(p, 0.0).altitude;
    p.altitude <= top && p.altitude >= floor
}

// ---------------------------------------------------------------------------
// Full propagation runs
// ---------------------------------------------------------------------------

/// Propagate until the configured time or step limit, reporting every
/// layer to `observer`, then sum the eigenrays of every target.
pub fn propagate_with(
    ocean: &Ocean,
    earth: &EarthModel,
    fan: &RayFan,
    source: GeoPosition,
    targets: TargetGrid,
    config: &PropagationConfig,
    observer: &mut dyn WavefrontObserver,
) -> Result<Proploss> {
    config.validate()?;
    let mut wave = WaveQueue::new(ocean, earth, fan, source, targets, config.time_step)?;
    observer.observe(wave.wavefront());

    let steps = config.step_count();
    for _ in 0..steps {
        wave.step()?;
        observer.observe(wave.wavefront());
    }

    let mut proploss = wave.into_proploss();
    proploss.sum_eigenrays(config.sum_mode);
    info!(steps, eigenrays = proploss.eigenray_count(), "propagation finished");
    Ok(proploss)
}

/// Propagate without an observer (convenience wrapper).
pub fn propagate(
    ocean: &Ocean,
    earth: &EarthModel,
    fan: &RayFan,
    source: GeoPosition,
    targets: TargetGrid,
    config: &PropagationConfig,
) -> Result<Proploss> {
    propagate_with(ocean, earth, fan, source, targets, config, &mut NoObserver)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
