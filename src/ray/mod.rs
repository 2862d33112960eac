pub mod ode;
pub mod state;

pub use ode::derivatives;
pub use state::{Deriv, RayCell, RayPoint, RayState};
