use thiserror::Error;

use crate::geo::GeoPosition;

/// Result type for propagation runs.
pub type Result<T> = std::result::Result<T, PropagationError>;

/// Faults that abort a run, either at construction or while stepping.
///
/// Diverged rays and rejected eigenray fits are not errors; they only
/// remove a ray or an arrival from the results.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum PropagationError {
    /// Angular fan too small for 3-point stencils
    #[error("{axis} fan needs at least {min} rays, got {len}")]
    FanTooSmall { axis: &'static str, len: usize, min: usize },

    /// Sequence values must strictly increase (or strictly decrease)
    #[error("{axis} sequence is not strictly monotonic at index {index}")]
    NotMonotonic { axis: &'static str, index: usize },

    /// A sequence contained NaN or infinity
    #[error("{axis} sequence has a non-finite value at index {index}")]
    NonFiniteValue { axis: &'static str, index: usize },

    /// No frequencies, or a frequency <= 0
    #[error("invalid frequency list: {0}")]
    InvalidFrequency(String),

    /// Time step must be positive and finite
    #[error("time step must be positive and finite, got {0}")]
    InvalidTimeStep(f64),

    /// Run limits must be positive
    #[error("invalid run limit: {0}")]
    InvalidLimit(String),

    /// Target grid dimensions do not match the number of positions
    #[error("target grid is {rows}x{cols} but {len} positions were given")]
    TargetShape { rows: usize, cols: usize, len: usize },

    /// Target sits on top of the source
    #[error("target ({row}, {col}) coincides with the source")]
    TargetAtSource { row: usize, col: usize },

    /// Source must be inside the water column
    #[error("source at {position} is outside the water column")]
    SourceOutsideWater { position: GeoPosition },

    /// Sound speed query returned a non-physical value
    #[error("non-physical sound speed {speed} m/s at {position}")]
    NonPhysicalSoundSpeed { speed: f64, position: GeoPosition },

    /// Boundary query returned unusable data
    #[error("{boundary} boundary data is invalid at {position}")]
    InvalidBoundary { boundary: &'static str, position: GeoPosition },

    /// Environment model parameters rejected at construction
    #[error("invalid environment model: {0}")]
    InvalidModel(String),

    /// Scenario file could not be parsed
    #[error("scenario parse error: {0}")]
    Scenario(String),
}

impl From<serde_json::Error> for PropagationError {
    fn from(e: serde_json::Error) -> Self {
        PropagationError::Scenario(e.to_string())
    }
}
