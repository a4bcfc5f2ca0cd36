//! Simulation entry point: [`FittedModel`] + date range → synthetic series.

use std::collections::BTreeMap;

use chrono::NaiveDateTime;
use rand::Rng;
use tracing::debug;

use super::clock::DateGrid;
use super::seasonal_ar::SeasonalArSimulator;
use super::types::{MissingSeasonPolicy, SimulatedRecord, SimulatedSeries, SimulationOutcome};
use crate::error::{Error, Result};
use crate::model::FittedModel;
use crate::stats::ArStructure;

/// Generates replicates from a fitted model.
///
/// The per-season AR structures are derived once at construction and shared
/// read-only by every call.
pub struct TimeSeriesSimulator<'a> {
    model: &'a FittedModel,
    structures: BTreeMap<u32, ArStructure>,
    policy: MissingSeasonPolicy,
}

impl<'a> TimeSeriesSimulator<'a> {
    /// Builds the Gaussian-domain AR structure of every fitted season.
    ///
    /// # Errors
    ///
    /// Returns `NonStationaryStructure` for a season whose Gaussian ACF has
    /// no valid AR representation.
    pub fn new(model: &'a FittedModel) -> Result<Self> {
        Ok(Self {
            model,
            structures: model.ar_structures()?,
            policy: MissingSeasonPolicy::default(),
        })
    }

    pub fn with_policy(mut self, policy: MissingSeasonPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn model(&self) -> &FittedModel {
        self.model
    }

    /// Date grid of a request, or `None` when history already covers it.
    ///
    /// The grid runs from `max(from, last + step)` to `to` inclusive and is
    /// aligned to the historical sampling grid.
    ///
    /// # Errors
    ///
    /// Returns `InvalidDateRange` when `from` is after `to`.
    pub fn grid(&self, from: NaiveDateTime, to: NaiveDateTime) -> Result<Option<DateGrid>> {
        if from > to {
            return Err(Error::InvalidDateRange(format!(
                "from ({from}) is after to ({to})"
            )));
        }
        let history = &self.model.history;
        if to <= history.last {
            return Ok(None);
        }

        let frequency = history.frequency;
        let first_new = history.last + frequency.step();
        let start = if from <= first_new {
            first_new
        } else {
            // round up onto the historical grid
            let steps = frequency.steps_between(history.last, from);
            let aligned = history.last + frequency.step() * steps as i32;
            if aligned < from {
                aligned + frequency.step()
            } else {
                aligned
            }
        };

        let grid = DateGrid::between(start, to, frequency);
        Ok((!grid.is_empty()).then_some(grid))
    }

    /// Simulates one replicate over `[from, to]`.
    ///
    /// # Errors
    ///
    /// * `InvalidDateRange` for an inverted range, or for a season absent
    ///   from the model under [`MissingSeasonPolicy::Fail`]
    pub fn simulate<R: Rng + ?Sized>(
        &self,
        from: NaiveDateTime,
        to: NaiveDateTime,
        id: usize,
        rng: &mut R,
    ) -> Result<SimulationOutcome> {
        let Some(mut grid) = self.grid(from, to)? else {
            return Ok(SimulationOutcome::AlreadyCovered {
                last_historical: self.model.history.last,
            });
        };

        let scheme = self.model.scheme;
        let mut labeled = Vec::with_capacity(grid.len());
        grid.run(|ts| labeled.push((ts, scheme.label(ts))));

        let path = SeasonalArSimulator::new(&self.structures, self.policy).simulate(&labeled, rng)?;

        let mut records = Vec::with_capacity(path.values.len());
        for ((&timestamp, season), &z) in path.timestamps.iter().zip(&path.seasons).zip(&path.values) {
            let Some(fit) = self.model.season(*season) else {
                continue;
            };
            records.push(SimulatedRecord {
                timestamp,
                value: fit.marginal.from_gaussian(z),
                id,
            });
        }
        debug!(id, records = records.len(), "simulated replicate");

        Ok(SimulationOutcome::Simulated(SimulatedSeries { id, records }))
    }
}
