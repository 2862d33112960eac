use tracing::debug;

use super::fit::fit_eigenray;
use super::target::Target;
use super::{Bracket, DuplicateTolerance, Eigenray};
use crate::config::RayFan;
use crate::sim::Wavefront;

// ---------------------------------------------------------------------------
// Frozen layers the search reads
// ---------------------------------------------------------------------------

/// Three consecutive, completed wavefront layers plus the fan they came from.
#[derive(Debug, Clone, Copy)]
pub struct SearchLayers<'a> {
    pub prev: &'a Wavefront,
    pub curr: &'a Wavefront,
    pub next: &'a Wavefront,
    pub fan: &'a RayFan,
    pub time_step: f64,    // s
    pub source_speed: f64, // m/s at the source
}

/// An eigenray plus what identifies repeats of it.
#[derive(Debug, Clone, PartialEq)]
pub struct Detection {
    pub eigenray: Eigenray,
    pub tolerance: DuplicateTolerance,
    pub bracket: Bracket,
}

// ---------------------------------------------------------------------------
// Detection
// ---------------------------------------------------------------------------

/// All eigenrays to `target` whose closest approach falls on the current layer.
///
/// A ray qualifies when it is nearer the target now than one step before
/// and after, and no angular neighbor is nearer. Ties go to the
/// lower-index ray, so one bracket never yields two detections.
pub fn find_eigenrays(layers: &SearchLayers, target: &Target) -> Vec<Detection> {
    let curr = layers.curr;
    let (n_de, n_az) = curr.shape();
    let range = |w: &Wavefront, i: usize, j: usize| w.ray(i, j).map(|r| (r.pos() - target.ecef).norm());
    let dist: Vec<Option<f64>> = curr.iter().map(|(i, j, _)| range(curr, i, j)).collect();

    let mut found = Vec::new();
    for i in 0..n_de {
        for j in 0..n_az {
            let Some(d0) = dist[i * n_az + j] else { continue };
            let (Some(dp), Some(dn)) = (range(layers.prev, i, j), range(layers.next, i, j)) else {
                continue;
            };
            if !(d0 <= dp && d0 < dn) {
                continue;
            }
            if !local_minimum(&dist, n_de, n_az, i, j, d0) {
                continue;
            }

            match fit_eigenray(layers, target, i, j) {
                Some(eigenray) => found.push(Detection {
                    eigenray,
                    tolerance: DuplicateTolerance {
                        time: layers.time_step,
                        de: layers.fan.de_cell(i),
                        az: layers.fan.az_cell(j),
                    },
                    bracket: Bracket { step: curr.step(), de: i, az: j },
                }),
                None => debug!(
                    row = target.row,
                    col = target.col,
                    de = i,
                    az = j,
                    time = curr.time(),
                    "eigenray fit rejected"
                ),
            }
        }
    }
    found
}

fn local_minimum(dist: &[Option<f64>], n_de: usize, n_az: usize, i: usize, j: usize, d0: f64) -> bool {
    for di in -1i64..=1 {
        for dj in -1i64..=1 {
            if di == 0 && dj == 0 {
                continue;
            }
            let (ii, jj) = (i as i64 + di, j as i64 + dj);
            if ii < 0 || jj < 0 || ii >= n_de as i64 || jj >= n_az as i64 {
                continue;
            }
            let Some(dn) = dist[ii as usize * n_az + jj as usize] else { continue };
            let lower = (di, dj) < (0, 0);
            if (lower && d0 >= dn) || (!lower && d0 > dn) {
                return false;
            }
        }
    }
    true
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::seq;
    use crate::geo::{EarthModel, GeoPosition};
    use crate::ocean::SoundSpeed;
    use crate::ray::{RayCell, RayPoint, RayState};
    use approx::assert_abs_diff_eq;
    use nalgebra::Vector3;

    const C: f64 = 1500.0;

    /// Straight rays from the source in uniform water, `time` after launch.
    fn straight_layer(earth: &EarthModel, src: &GeoPosition, fan: &RayFan, time: f64, step: usize) -> Wavefront {
        let x = earth.to_ecef(src);
        let frame = earth.frame(src);
        let sound = SoundSpeed { speed: C, gradient: Vector3::zeros() };
        let mut cells = Vec::new();
        for de in fan.de_radians() {
            for az in fan.az_radians() {
                let dir = frame.direction(*de, *az);
                let point = RayPoint { time, pos: x + dir * (C * time), slowness: dir / C };
                cells.push(RayCell::Alive(RayState::new(point, sound, 1)));
            }
        }
        let (n_de, n_az) = fan.shape();
        Wavefront::new(time, step, n_de, n_az, cells)
    }

    struct Setup {
        earth: EarthModel,
        fan: RayFan,
        target: Target,
        range: f64,
    }

    fn setup() -> Setup {
        let earth = EarthModel::from_latitude(45.0);
        let src = GeoPosition::new(45.0, -45.0, -1000.0);
        let fan = RayFan::new(seq::linear(-2.0, 1.0, 2.0), seq::linear(-2.0, 1.0, 2.0), vec![1000.0]).unwrap();
        let range = 1480.0;
        let dir = earth.frame(&src).direction(0.3_f64.to_radians(), 0.2_f64.to_radians());
        let tgt = earth.to_geo(&(earth.to_ecef(&src) + dir * range));
        Setup { target: Target::new(0, 0, tgt, &earth), earth, fan, range }
    }

    #[test]
    fn straight_rays_give_one_exact_eigenray() {
        let s = setup();
        let src = GeoPosition::new(45.0, -45.0, -1000.0);
        let prev = straight_layer(&s.earth, &src, &s.fan, 0.9, 9);
        let curr = straight_layer(&s.earth, &src, &s.fan, 1.0, 10);
        let next = straight_layer(&s.earth, &src, &s.fan, 1.1, 11);
        let layers = SearchLayers { prev: &prev, curr: &curr, next: &next, fan: &s.fan, time_step: 0.1, source_speed: C };

        let found = find_eigenrays(&layers, &s.target);
        assert_eq!(found.len(), 1);
        let d = &found[0];
        assert_eq!(d.bracket, Bracket { step: 10, de: 2, az: 2 });
        let ray = &d.eigenray;
        assert_abs_diff_eq!(ray.time, s.range / C, epsilon = 1e-6);
        assert_abs_diff_eq!(ray.source_de, 0.3, epsilon = 1e-3);
        assert_abs_diff_eq!(ray.source_az, 0.2, epsilon = 1e-3);
        assert_abs_diff_eq!(ray.intensity[0], 20.0 * s.range.log10(), epsilon = 0.01);
        assert_eq!((ray.surface, ray.bottom, ray.caustic), (0, 0, 0));
        assert_eq!(d.tolerance.time, 0.1);
        assert_eq!(d.tolerance.de, 1.0);
    }

    #[test]
    fn nothing_found_before_closest_approach() {
        let s = setup();
        let src = GeoPosition::new(45.0, -45.0, -1000.0);
        let prev = straight_layer(&s.earth, &src, &s.fan, 0.4, 4);
        let curr = straight_layer(&s.earth, &src, &s.fan, 0.5, 5);
        let next = straight_layer(&s.earth, &src, &s.fan, 0.6, 6);
        let layers = SearchLayers { prev: &prev, curr: &curr, next: &next, fan: &s.fan, time_step: 0.1, source_speed: C };
        assert!(find_eigenrays(&layers, &s.target).is_empty());
    }

    #[test]
    fn diverged_node_is_skipped() {
        let s = setup();
        let src = GeoPosition::new(45.0, -45.0, -1000.0);
        let prev = straight_layer(&s.earth, &src, &s.fan, 0.9, 9);
        let mut curr = straight_layer(&s.earth, &src, &s.fan, 1.0, 10);
        let next = straight_layer(&s.earth, &src, &s.fan, 1.1, 11);
        let k = curr.index(2, 2);
        curr.cells_mut()[k] = RayCell::Diverged { time: 1.0 };
        let layers = SearchLayers { prev: &prev, curr: &curr, next: &next, fan: &s.fan, time_step: 0.1, source_speed: C };
        for d in find_eigenrays(&layers, &s.target) {
            assert_ne!((d.bracket.de, d.bracket.az), (2, 2));
        }
    }

    #[test]
    fn ties_prefer_the_lower_index() {
        let dist = vec![Some(1.0), Some(1.0), Some(2.0), Some(2.0)];
        assert!(local_minimum(&dist, 2, 2, 0, 0, 1.0));
        assert!(!local_minimum(&dist, 2, 2, 0, 1, 1.0));
    }
}
