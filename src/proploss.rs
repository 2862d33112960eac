use std::f64::consts::TAU;

use num_complex::Complex64;
use serde::{Deserialize, Serialize};

use crate::eigenray::{Bracket, DuplicateTolerance, Eigenray, TargetGrid};

// ---------------------------------------------------------------------------
// Summation mode
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SumMode {
    /// Complex pressures add, paths interfere.
    #[default]
    Coherent,
    /// Powers add, phase is dropped.
    Incoherent,
}

// ---------------------------------------------------------------------------
// Per-target summary of all arrivals
// ---------------------------------------------------------------------------

/// Combined field of every eigenray at one target.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ArrivalSum {
    pub intensity: Vec<f64>, // dB per frequency, +inf when nothing arrived
    pub phase: Vec<f64>,     // rad per frequency
    pub time: f64,           // s, power-weighted mean travel time
    pub source_de: f64,      // deg, power-weighted means
    pub source_az: f64,
    pub target_de: f64,
    pub target_az: f64,
    pub arrivals: usize,
}

impl ArrivalSum {
    fn empty(n_freq: usize) -> Self {
        Self {
            intensity: vec![f64::INFINITY; n_freq],
            phase: vec![0.0; n_freq],
            time: 0.0,
            source_de: 0.0,
            source_az: 0.0,
            target_de: 0.0,
            target_az: 0.0,
            arrivals: 0,
        }
    }
}

/// Sum a list of eigenrays into one field per frequency.
///
/// Each path contributes `10^(-I/20) exp(i (phase - 2 pi f t))`. The list
/// is only read, so repeated calls give identical results.
pub fn sum_eigenrays(rays: &[Eigenray], frequencies: &[f64], mode: SumMode) -> ArrivalSum {
    if rays.is_empty() {
        return ArrivalSum::empty(frequencies.len());
    }

    let mut intensity = Vec::with_capacity(frequencies.len());
    let mut phase = Vec::with_capacity(frequencies.len());
    for (k, &f) in frequencies.iter().enumerate() {
        match mode {
            SumMode::Coherent => {
                let p: Complex64 = rays
                    .iter()
                    .map(|r| Complex64::from_polar(10f64.powf(-r.intensity[k] / 20.0), r.phase[k] - TAU * f * r.time))
                    .sum();
                intensity.push(-20.0 * p.norm().log10());
                phase.push(p.arg());
            }
            SumMode::Incoherent => {
                let power: f64 = rays.iter().map(|r| 10f64.powf(-r.intensity[k] / 10.0)).sum();
                intensity.push(-10.0 * power.log10());
                phase.push(0.0);
            }
        }
    }

    // mean path power across frequencies weights the angle and time averages
    let weights: Vec<f64> = rays
        .iter()
        .map(|r| r.intensity.iter().map(|i| 10f64.powf(-i / 10.0)).sum::<f64>() / r.intensity.len().max(1) as f64)
        .collect();
    let total: f64 = weights.iter().sum();
    let mean = |value: fn(&Eigenray) -> f64| -> f64 {
        if total > 0.0 {
            rays.iter().zip(&weights).map(|(r, w)| value(r) * w).sum::<f64>() / total
        } else {
            rays.iter().map(value).sum::<f64>() / rays.len() as f64
        }
    };

    ArrivalSum {
        intensity,
        phase,
        time: mean(|r| r.time),
        source_de: mean(|r| r.source_de),
        source_az: mean(|r| r.source_az),
        target_de: mean(|r| r.target_de),
        target_az: mean(|r| r.target_az),
        arrivals: rays.len(),
    }
}

// ---------------------------------------------------------------------------
// Accumulator over a target grid
// ---------------------------------------------------------------------------

/// Eigenray lists and summed results for every target of a run.
#[derive(Debug, Clone)]
pub struct Proploss {
    targets: TargetGrid,
    frequencies: Vec<f64>,
    lists: Vec<Vec<Eigenray>>,   // row-major, detection order
    brackets: Vec<Vec<Bracket>>, // parallel to `lists`
    totals: Vec<ArrivalSum>,     // empty until summed
}

impl Proploss {
    pub fn new(targets: TargetGrid, frequencies: Vec<f64>) -> Self {
        let lists = vec![Vec::new(); targets.len()];
        let brackets = vec![Vec::new(); targets.len()];
        Self { targets, frequencies, lists, brackets, totals: Vec::new() }
    }

    pub fn targets(&self) -> &TargetGrid {
        &self.targets
    }

    pub fn frequencies(&self) -> &[f64] {
        &self.frequencies
    }

    fn index(&self, row: usize, col: usize) -> Option<usize> {
        let (rows, cols) = self.targets.shape();
        (row < rows && col < cols).then_some(row * cols + col)
    }

    /// Eigenrays found for a target, `None` outside the grid.
    pub fn eigenrays(&self, row: usize, col: usize) -> Option<&[Eigenray]> {
        self.index(row, col).map(|k| self.lists[k].as_slice())
    }

    /// Append an eigenray unless the list already holds the same path
    /// from the same crossing. Returns whether it was kept; targets
    /// outside the grid keep nothing. Invalidates previous sums.
    pub fn add_eigenray(
        &mut self,
        row: usize,
        col: usize,
        ray: Eigenray,
        bracket: Bracket,
        tolerance: &DuplicateTolerance,
    ) -> bool {
        let Some(k) = self.index(row, col) else {
            return false;
        };
        let repeat = self.lists[k]
            .iter()
            .zip(&self.brackets[k])
            .any(|(r, b)| b.same_crossing(&bracket) && r.duplicates(&ray, tolerance));
        if repeat {
            return false;
        }
        self.lists[k].push(ray);
        self.brackets[k].push(bracket);
        self.totals.clear();
        true
    }

    /// Sum every target's list.
    pub fn sum_eigenrays(&mut self, mode: SumMode) {
        self.totals = self
            .lists
            .iter()
            .map(|list| sum_eigenrays(list, &self.frequencies, mode))
            .collect();
    }

    /// Summed field at a target, once [`Proploss::sum_eigenrays`] has run.
    pub fn total(&self, row: usize, col: usize) -> Option<&ArrivalSum> {
        self.index(row, col).and_then(|k| self.totals.get(k))
    }

    pub fn eigenray_count(&self) -> usize {
        self.lists.iter().map(Vec::len).sum()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geo::GeoPosition;
    use approx::assert_abs_diff_eq;
    use std::f64::consts::PI;

    fn at(step: usize, de: usize) -> Bracket {
        Bracket { step, de, az: 4 }
    }

    fn path(time: f64, intensity: f64, phase: f64) -> Eigenray {
        Eigenray {
            time,
            intensity: vec![intensity],
            phase: vec![phase],
            source_de: 10.0,
            source_az: 0.0,
            target_de: -10.0,
            target_az: 0.0,
            surface: 0,
            bottom: 0,
            caustic: 0,
        }
    }

    #[test]
    fn empty_list_is_no_arrival() {
        let s = sum_eigenrays(&[], &[1000.0, 2000.0], SumMode::Coherent);
        assert_eq!(s.arrivals, 0);
        assert!(s.intensity.iter().all(|i| *i == f64::INFINITY));
        assert_eq!(s.phase, vec![0.0, 0.0]);
    }

    #[test]
    fn single_path_keeps_its_loss() {
        // time is a whole number of periods, so phase is untouched
        let s = sum_eigenrays(&[path(1.0, 60.0, 0.25)], &[1000.0], SumMode::Coherent);
        assert_abs_diff_eq!(s.intensity[0], 60.0, epsilon = 1e-9);
        assert_abs_diff_eq!(s.phase[0], 0.25, epsilon = 1e-9);
        assert_eq!(s.time, 1.0);
    }

    #[test]
    fn in_phase_paths_add_six_db() {
        let rays = [path(1.0, 60.0, 0.0), path(2.0, 60.0, 0.0)];
        let s = sum_eigenrays(&rays, &[1000.0], SumMode::Coherent);
        assert_abs_diff_eq!(s.intensity[0], 60.0 - 20.0 * 2f64.log10(), epsilon = 1e-9);
        assert_abs_diff_eq!(s.time, 1.5, epsilon = 1e-12);
    }

    #[test]
    fn opposite_phase_paths_cancel() {
        let rays = [path(1.0, 60.0, 0.0), path(2.0, 60.0, PI)];
        let s = sum_eigenrays(&rays, &[1000.0], SumMode::Coherent);
        assert!(s.intensity[0] > 200.0, "expected deep null, got {}", s.intensity[0]);
    }

    #[test]
    fn incoherent_paths_add_three_db() {
        let rays = [path(1.0, 60.0, 0.0), path(2.0, 60.0, PI)];
        let s = sum_eigenrays(&rays, &[1000.0], SumMode::Incoherent);
        assert_abs_diff_eq!(s.intensity[0], 60.0 - 10.0 * 2f64.log10(), epsilon = 1e-9);
        assert_eq!(s.phase[0], 0.0);
    }

    #[test]
    fn travel_time_rotates_phase_with_frequency() {
        // a quarter period late at 1 kHz
        let s = sum_eigenrays(&[path(0.25e-3, 60.0, 0.0)], &[1000.0], SumMode::Coherent);
        assert_abs_diff_eq!(s.phase[0], -PI / 2.0, epsilon = 1e-9);
    }

    #[test]
    fn summing_is_idempotent() {
        let grid = TargetGrid::single(GeoPosition::new(45.0, -45.0, -100.0));
        let mut pl = Proploss::new(grid, vec![1000.0, 3000.0]);
        let tol = DuplicateTolerance { time: 0.1, de: 1.0, az: 1.0 };
        let mut a = path(1.1, 60.0, 0.3);
        a.intensity.push(62.0);
        a.phase.push(0.3);
        let mut b = path(1.7, 65.0, -PI);
        b.intensity.push(66.0);
        b.phase.push(-PI);
        b.source_de = 30.0;
        b.surface = 1;
        assert!(pl.add_eigenray(0, 0, a, at(11, 5), &tol));
        assert!(pl.add_eigenray(0, 0, b, at(17, 12), &tol));
        pl.sum_eigenrays(SumMode::Coherent);
        let first = pl.total(0, 0).unwrap().clone();
        pl.sum_eigenrays(SumMode::Coherent);
        assert_eq!(pl.total(0, 0).unwrap(), &first);
        assert_eq!(pl.eigenrays(0, 0).unwrap().len(), 2);
    }

    #[test]
    fn same_crossing_on_next_step_is_rejected() {
        let grid = TargetGrid::single(GeoPosition::new(45.0, -45.0, -100.0));
        let mut pl = Proploss::new(grid, vec![1000.0]);
        let tol = DuplicateTolerance { time: 0.1, de: 1.0, az: 1.0 };
        assert!(pl.add_eigenray(0, 0, path(1.0, 60.0, 0.0), at(10, 20), &tol));
        assert!(!pl.add_eigenray(0, 0, path(1.02, 60.1, 0.0), at(11, 21), &tol));
        assert_eq!(pl.eigenray_count(), 1);
    }

    #[test]
    fn close_roots_in_neighboring_brackets_are_both_kept() {
        // two surface roots 0.03 deg apart on a 0.05 deg fan, same step
        let grid = TargetGrid::single(GeoPosition::new(45.0, -45.0, -100.0));
        let mut pl = Proploss::new(grid, vec![2000.0]);
        let tol = DuplicateTolerance { time: 0.1, de: 0.05, az: 1.0 };
        let root = |de: f64| {
            let mut r = path(89.0535, 80.0, -PI);
            r.source_de = de;
            r.surface = 1;
            r
        };
        assert!(pl.add_eigenray(0, 0, root(0.035), at(890, 20), &tol));
        assert!(pl.add_eigenray(0, 0, root(0.065), at(890, 21), &tol));
        assert_eq!(pl.eigenray_count(), 2);
    }

    #[test]
    fn targets_outside_the_grid_have_no_list() {
        let ps = (0..4).map(|k| GeoPosition::new(45.01 + 0.01 * k as f64, -45.0, -100.0)).collect();
        let mut pl = Proploss::new(TargetGrid::new(2, 2, ps).unwrap(), vec![1000.0]);
        let tol = DuplicateTolerance { time: 0.1, de: 1.0, az: 1.0 };
        assert!(pl.add_eigenray(1, 0, path(1.0, 60.0, 0.0), at(10, 3), &tol));
        assert!(!pl.add_eigenray(0, 2, path(2.0, 60.0, 0.0), at(20, 3), &tol));
        assert_eq!(pl.eigenrays(1, 0).unwrap().len(), 1);
        assert!(pl.eigenrays(0, 2).is_none());
        assert!(pl.eigenrays(2, 0).is_none());
        pl.sum_eigenrays(SumMode::Coherent);
        assert!(pl.total(0, 2).is_none());
        assert_eq!(pl.total(0, 0).unwrap().arrivals, 0);
    }

    #[test]
    fn adding_invalidates_old_sums() {
        let grid = TargetGrid::single(GeoPosition::new(45.0, -45.0, -100.0));
        let mut pl = Proploss::new(grid, vec![1000.0]);
        pl.sum_eigenrays(SumMode::Coherent);
        assert_eq!(pl.total(0, 0).unwrap().arrivals, 0);
        let tol = DuplicateTolerance { time: 0.1, de: 1.0, az: 1.0 };
        pl.add_eigenray(0, 0, path(1.0, 60.0, 0.0), at(10, 2), &tol);
        assert!(pl.total(0, 0).is_none());
    }
}
