//! Gaussian path generation with per-season AR structure.
//!
//! The requested grid is cut into contiguous blocks of equal season label.
//! The very first block is seeded with `p` independent innovations of its
//! season; every block then draws `n + p` innovations, keeps the trailing
//! `n`, and runs its AR(p) recursion on top of the last `p` values produced
//! so far, so each block conditions on the tail of the previous one.

use std::collections::BTreeMap;

use chrono::NaiveDateTime;
use rand::Rng;
use rand_distr::{Distribution, StandardNormal};
use tracing::warn;

use super::types::MissingSeasonPolicy;
use crate::error::{Error, Result};
use crate::stats::ArStructure;

/// Output of [`SeasonalArSimulator::simulate`].
#[derive(Debug, Clone, PartialEq, Default)]
pub struct GaussianPath {
    pub timestamps: Vec<NaiveDateTime>,
    pub seasons: Vec<u32>,
    pub values: Vec<f64>,
}

/// Runs the per-season AR(p) recursion over a labeled date grid.
pub struct SeasonalArSimulator<'a> {
    structures: &'a BTreeMap<u32, ArStructure>,
    policy: MissingSeasonPolicy,
}

impl<'a> SeasonalArSimulator<'a> {
    pub fn new(structures: &'a BTreeMap<u32, ArStructure>, policy: MissingSeasonPolicy) -> Self {
        Self { structures, policy }
    }

    /// Generates one Gaussian path over `grid` (timestamp, season label).
    ///
    /// # Errors
    ///
    /// Returns `InvalidDateRange` when a label has no AR structure and the
    /// policy is [`MissingSeasonPolicy::Fail`].
    pub fn simulate<R: Rng + ?Sized>(
        &self,
        grid: &[(NaiveDateTime, u32)],
        rng: &mut R,
    ) -> Result<GaussianPath> {
        let mut path = GaussianPath {
            timestamps: Vec::with_capacity(grid.len()),
            seasons: Vec::with_capacity(grid.len()),
            values: Vec::with_capacity(grid.len()),
        };
        let mut tail: Vec<f64> = Vec::new();
        let mut seeded = false;

        let mut start = 0;
        while start < grid.len() {
            let season = grid[start].1;
            let end = grid[start..]
                .iter()
                .position(|&(_, s)| s != season)
                .map_or(grid.len(), |offset| start + offset);
            let block = &grid[start..end];
            start = end;

            let Some(ar) = self.structures.get(&season) else {
                match self.policy {
                    MissingSeasonPolicy::Fail => {
                        return Err(Error::InvalidDateRange(format!(
                            "season {season} (first requested at {}) is not in the fitted model",
                            block[0].0
                        )));
                    }
                    MissingSeasonPolicy::Skip => {
                        warn!(season, dates = block.len(), "skipping dates of unfitted season");
                        continue;
                    }
                }
            };

            let p = ar.order();
            let sd = ar.innovation_sd();
            if !seeded {
                tail = draw(rng, p, sd);
                seeded = true;
            }
            if tail.len() < p {
                let mut padded = draw(rng, p - tail.len(), sd);
                padded.extend_from_slice(&tail);
                tail = padded;
            }

            let n = block.len();
            let innovations = draw(rng, n + p, sd);
            let mut x: Vec<f64> = Vec::with_capacity(n + p);
            x.extend_from_slice(&tail[tail.len() - p..]);
            for i in p..n + p {
                let ar_part: f64 = ar
                    .coefficients
                    .iter()
                    .enumerate()
                    .map(|(j, a)| a * x[i - 1 - j])
                    .sum();
                x.push(ar_part + innovations[i]);
            }

            for (k, &(ts, s)) in block.iter().enumerate() {
                path.timestamps.push(ts);
                path.seasons.push(s);
                path.values.push(x[p + k]);
            }
            let keep = x.len().min(self.max_order().max(p));
            tail = x[x.len() - keep..].to_vec();
        }

        Ok(path)
    }

    fn max_order(&self) -> usize {
        self.structures.values().map(ArStructure::order).max().unwrap_or(0)
    }
}

fn draw<R: Rng + ?Sized>(rng: &mut R, n: usize, sd: f64) -> Vec<f64> {
    (0..n)
        .map(|_| {
            let z: f64 = StandardNormal.sample(&mut *rng);
            sd * z
        })
        .collect()
}
