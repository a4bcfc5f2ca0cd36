//! Monte Carlo replicate loop.

use chrono::NaiveDateTime;
use rand::SeedableRng;
use rand::rngs::StdRng;
use rayon::prelude::*;
use tracing::{info, warn};

use super::simulator::TimeSeriesSimulator;
use super::types::{MissingSeasonPolicy, SimulatedSeries, SimulationOutcome};
use crate::error::{Error, Result};
use crate::model::FittedModel;

/// Settings of an ensemble run.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EnsembleRequest {
    pub from: NaiveDateTime,
    pub to: NaiveDateTime,
    /// Number of replicates.
    pub nsim: usize,
    /// Base seed; replicate `id` uses `seed.wrapping_add(id)`.
    pub seed: u64,
    /// Run replicates on the rayon pool.
    pub parallel: bool,
    pub policy: MissingSeasonPolicy,
}

/// Replicates of one ensemble run, in ascending id order.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Ensemble {
    pub replicates: Vec<SimulatedSeries>,
    /// Replicates that failed, with their errors.
    pub failures: Vec<(usize, Error)>,
}

impl Ensemble {
    /// Total number of simulated records across replicates.
    pub fn record_count(&self) -> usize {
        self.replicates.iter().map(SimulatedSeries::len).sum()
    }
}

/// Result of an ensemble request.
#[derive(Debug, Clone, PartialEq)]
pub enum EnsembleOutcome {
    Simulated(Ensemble),
    /// History already covers the requested range.
    AlreadyCovered { last_historical: NaiveDateTime },
}

/// Seed of replicate `id`.
pub fn replicate_seed(seed: u64, id: usize) -> u64 {
    seed.wrapping_add(id as u64)
}

/// Runs `nsim` independent replicates.
///
/// Each replicate owns an RNG seeded with [`replicate_seed`], so the result
/// is identical whether replicates run in parallel or sequentially. A
/// failing replicate is recorded in [`Ensemble::failures`] without
/// affecting the others.
///
/// # Errors
///
/// * `InvalidDateRange` for an inverted range
/// * `NonStationaryStructure` when the model's AR structures cannot be built
pub fn run_ensemble(model: &FittedModel, request: &EnsembleRequest) -> Result<EnsembleOutcome> {
    let simulator = TimeSeriesSimulator::new(model)?.with_policy(request.policy);
    if simulator.grid(request.from, request.to)?.is_none() {
        info!(last = %model.history.last, "requested range already covered by history");
        return Ok(EnsembleOutcome::AlreadyCovered {
            last_historical: model.history.last,
        });
    }

    info!(
        nsim = request.nsim,
        seed = request.seed,
        parallel = request.parallel,
        from = %request.from,
        to = %request.to,
        "running ensemble"
    );

    let run = |id: usize| -> (usize, Result<SimulationOutcome>) {
        let mut rng = StdRng::seed_from_u64(replicate_seed(request.seed, id));
        (id, simulator.simulate(request.from, request.to, id, &mut rng))
    };
    let outcomes: Vec<(usize, Result<SimulationOutcome>)> = if request.parallel {
        (0..request.nsim).into_par_iter().map(run).collect()
    } else {
        (0..request.nsim).map(run).collect()
    };

    let mut ensemble = Ensemble::default();
    for (id, outcome) in outcomes {
        match outcome {
            Ok(SimulationOutcome::Simulated(series)) => ensemble.replicates.push(series),
            Ok(SimulationOutcome::AlreadyCovered { .. }) => {}
            Err(e) => {
                warn!(id, error = %e, "replicate failed");
                ensemble.failures.push((id, e));
            }
        }
    }
    info!(
        replicates = ensemble.replicates.len(),
        failures = ensemble.failures.len(),
        records = ensemble.record_count(),
        "ensemble complete"
    );
    Ok(EnsembleOutcome::Simulated(ensemble))
}
