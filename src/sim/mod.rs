pub mod engine;
/// Post-hoc run report.
pub mod kpi;
pub mod types;

pub use engine::Simulation;
pub use kpi::RunReport;
pub use types::{Metric, SimError, SimulationOutput, StepStats};
