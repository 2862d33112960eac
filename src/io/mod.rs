pub mod csv;
pub mod json;

pub use csv::{write_eigenrays, write_eigenrays_file, WavefrontRecorder};
pub use json::{write_proploss, write_proploss_file, ProplossReport, TargetReport};
