pub mod config;
pub mod eigenray;
pub mod error;
pub mod geo;
pub mod io;
pub mod ocean;
pub mod proploss;
pub mod ray;
pub mod sim;

pub use config::{PropagationConfig, RayFan, Scenario, ScenarioBuilder, ScenarioConfig};
pub use eigenray::{Eigenray, TargetGrid};
pub use error::{PropagationError, Result};
pub use geo::{EarthModel, GeoPosition};
pub use ocean::Ocean;
pub use proploss::{ArrivalSum, Proploss, SumMode};
pub use sim::{propagate, propagate_with, WaveQueue};
