/// Regular date grid used as the simulation clock.
pub mod clock;
/// Replicate loop with per-replicate seeding.
pub mod ensemble;
pub mod kpi;
/// Per-season Gaussian AR path generation.
pub mod seasonal_ar;
pub mod simulator;
pub mod types;

pub use ensemble::{Ensemble, EnsembleOutcome, EnsembleRequest, run_ensemble};
pub use kpi::EnsembleSummary;
pub use simulator::TimeSeriesSimulator;
pub use types::{MissingSeasonPolicy, SimulatedRecord, SimulatedSeries, SimulationOutcome};
