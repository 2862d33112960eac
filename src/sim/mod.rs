pub mod integrator;
pub mod observer;
pub mod runner;
pub mod stepper;
pub mod wavefront;

pub use integrator::rk4_step;
pub use observer::{Census, NoObserver, RayCensus, WavefrontObserver};
pub use runner::{propagate, propagate_with, WaveQueue};
pub use stepper::{mark_caustics, Stepper};
pub use wavefront::Wavefront;
