//! autorid-ctl: administration and stress tool for autorid databases.

pub mod settings;
pub mod stress;

pub use settings::Settings;
pub use stress::{CounterVector, StressConfig, StressError, StressReport};
