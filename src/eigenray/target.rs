use nalgebra::Vector3;
use serde::Serialize;

use crate::error::{PropagationError, Result};
use crate::geo::{EarthModel, GeoPosition, LocalFrame};

// ---------------------------------------------------------------------------
// Receiver positions
// ---------------------------------------------------------------------------

/// Row-major 2D set of receivers, e.g. a deployed array or a range/depth grid.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TargetGrid {
    rows: usize,
    cols: usize,
    positions: Vec<GeoPosition>,
}

impl TargetGrid {
    pub fn new(rows: usize, cols: usize, positions: Vec<GeoPosition>) -> Result<Self> {
        if rows * cols != positions.len() {
            return Err(PropagationError::TargetShape { rows, cols, len: positions.len() });
        }
        if let Some(index) = positions.iter().position(|p| !p.is_finite()) {
            return Err(PropagationError::NonFiniteValue { axis: "target", index });
        }
        Ok(Self { rows, cols, positions })
    }

    pub fn single(position: GeoPosition) -> Self {
        Self { rows: 1, cols: 1, positions: vec![position] }
    }

    /// One row of receivers.
    pub fn line(positions: Vec<GeoPosition>) -> Result<Self> {
        Self::new(1, positions.len(), positions)
    }

    pub fn shape(&self) -> (usize, usize) {
        (self.rows, self.cols)
    }

    pub fn len(&self) -> usize {
        self.positions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }

    pub fn get(&self, row: usize, col: usize) -> Option<&GeoPosition> {
        if row < self.rows && col < self.cols {
            self.positions.get(row * self.cols + col)
        } else {
            None
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (usize, usize, &GeoPosition)> + '_ {
        let cols = self.cols.max(1);
        self.positions.iter().enumerate().map(move |(k, p)| (k / cols, k % cols, p))
    }
}

/// A receiver prepared for the search: earth-centered location and local frame.
#[derive(Debug, Clone)]
pub struct Target {
    pub row: usize,
    pub col: usize,
    pub position: GeoPosition,
    pub ecef: Vector3<f64>,
    pub frame: LocalFrame,
}

impl Target {
    pub fn new(row: usize, col: usize, position: GeoPosition, earth: &EarthModel) -> Self {
        Self {
            row,
            col,
            position,
            ecef: earth.to_ecef(&position),
            frame: earth.frame(&position),
        }
    }

    /// Index into a row-major per-target array.
    pub fn index(&self, cols: usize) -> usize {
        self.row * cols + self.col
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn grid_shape_must_match() {
        let p = GeoPosition::new(45.0, -45.0, -100.0);
        let err = TargetGrid::new(2, 2, vec![p; 3]).unwrap_err();
        assert_eq!(err, PropagationError::TargetShape { rows: 2, cols: 2, len: 3 });
    }

    #[test]
    fn grid_iterates_row_major() {
        let ps = (0..6).map(|k| GeoPosition::new(45.0, -45.0, -(k as f64))).collect();
        let g = TargetGrid::new(2, 3, ps).unwrap();
        let (r, c, p) = g.iter().nth(4).unwrap();
        assert_eq!((r, c), (1, 1));
        assert_eq!(p.altitude, -4.0);
        assert_eq!(g.get(1, 1), Some(p));
        assert!(g.get(2, 0).is_none());
    }

    #[test]
    fn non_finite_target_rejected() {
        let err = TargetGrid::line(vec![GeoPosition::new(f64::NAN, 0.0, 0.0)]).unwrap_err();
        assert_eq!(err, PropagationError::NonFiniteValue { axis: "target", index: 0 });
    }
}
