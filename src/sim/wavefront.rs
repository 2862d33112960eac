use crate::ray::{RayCell, RayState};

// ---------------------------------------------------------------------------
// Wavefront grid: one time layer of the ray fan
// ---------------------------------------------------------------------------

/// Every ray of the fan at one instant, indexed by (DE index, AZ index).
///
/// A layer is frozen once the stepper has produced it; only the layer
/// under construction is ever mutated.
#[derive(Debug, Clone, PartialEq)]
pub struct Wavefront {
    time: f64,   // s since launch
    step: usize, // launch layer and the backward history layer are both 0
    n_de: usize,
    n_az: usize,
    cells: Vec<RayCell>, // row-major: de * n_az + az
}

impl Wavefront {
    pub(crate) fn new(time: f64, step: usize, n_de: usize, n_az: usize, cells: Vec<RayCell>) -> Self {
        assert_eq!(cells.len(), n_de * n_az, "wavefront cell count must match fan shape");
        Self { time, step, n_de, n_az, cells }
    }

    pub fn time(&self) -> f64 {
        self.time
    }

    pub fn step(&self) -> usize {
        self.step
    }

    /// (number of DE rays, number of AZ rays)
    pub fn shape(&self) -> (usize, usize) {
        (self.n_de, self.n_az)
    }

    pub fn index(&self, de: usize, az: usize) -> usize {
        de * self.n_az + az
    }

    pub fn cell(&self, de: usize, az: usize) -> &RayCell {
        &self.cells[self.index(de, az)]
    }

    /// Live ray at (de, az), or None when it diverged.
    pub fn ray(&self, de: usize, az: usize) -> Option<&RayState> {
        self.cell(de, az).alive()
    }

    pub fn cells(&self) -> &[RayCell] {
        &self.cells
    }

    pub(crate) fn cells_mut(&mut self) -> &mut [RayCell] {
        &mut self.cells
    }

    /// Cells with their (de, az) indices, row-major.
    pub fn iter(&self) -> impl Iterator<Item = (usize, usize, &RayCell)> + '_ {
        let n_az = self.n_az;
        self.cells.iter().enumerate().map(move |(k, c)| (k / n_az, k % n_az, c))
    }

    pub fn alive_count(&self) -> usize {
        self.cells.iter().filter(|c| c.is_alive()).count()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ocean::SoundSpeed;
    use crate::ray::RayPoint;
    use nalgebra::Vector3;

    fn live(x: f64) -> RayCell {
        let point = RayPoint {
            time: 0.5,
            pos: Vector3::new(x, 0.0, 0.0),
            slowness: Vector3::new(1.0 / 1500.0, 0.0, 0.0),
        };
        RayCell::Alive(RayState::new(
            point,
            SoundSpeed { speed: 1500.0, gradient: Vector3::zeros() },
            1,
        ))
    }

    #[test]
    fn row_major_indexing() {
        let cells = (0..6).map(|k| live(k as f64)).collect();
        let w = Wavefront::new(0.5, 5, 2, 3, cells);
        assert_eq!(w.shape(), (2, 3));
        assert_eq!(w.ray(1, 2).unwrap().pos().x, 5.0);
        let (de, az, _) = w.iter().nth(4).unwrap();
        assert_eq!((de, az), (1, 1));
    }

    #[test]
    fn diverged_cells_are_not_counted() {
        let cells = vec![live(0.0), RayCell::Diverged { time: 0.5 }, live(2.0), live(3.0)];
        let w = Wavefront::new(0.5, 5, 2, 2, cells);
        assert_eq!(w.alive_count(), 3);
        assert!(w.ray(0, 1).is_none());
    }

    #[test]
    #[should_panic]
    fn shape_mismatch_panics() {
        Wavefront::new(0.0, 0, 2, 2, vec![live(0.0)]);
    }
}
