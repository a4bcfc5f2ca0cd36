//! Yule–Walker solve from an autocorrelation sequence to AR coefficients.

use nalgebra::{DMatrix, DVector};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Singular values below this are treated as zero by the pseudo-inverse.
const PINV_EPS: f64 = 1e-12;

/// Smallest innovation variance of a usable AR structure.
const MIN_INNOVATION_VARIANCE: f64 = 1e-12;

/// Autoregressive structure of one season: coefficients plus innovation
/// variance of a unit-variance Gaussian AR(p) process.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArStructure {
    /// `α_1 … α_p`, `α_1` applying to the most recent value.
    pub coefficients: Vec<f64>,
    pub innovation_variance: f64,
}

impl ArStructure {
    /// AR order `p`.
    pub fn order(&self) -> usize {
        self.coefficients.len()
    }

    pub fn innovation_sd(&self) -> f64 {
        self.innovation_variance.sqrt()
    }
}

pub struct YuleWalkerSolver;

impl YuleWalkerSolver {
    /// Solves `R·α = r` with `R[i][j] = acf[|i−j|]` and `r = acf[1..=p]`,
    /// where `p = acf.len() − 1`, through the Moore–Penrose pseudo-inverse.
    ///
    /// # Errors
    ///
    /// Returns `InvalidParameter` for an empty sequence or a failed
    /// decomposition.
    pub fn coefficients(acf: &[f64]) -> Result<Vec<f64>> {
        if acf.is_empty() {
            return Err(Error::InvalidParameter(
                "autocorrelation sequence is empty".to_string(),
            ));
        }
        let p = acf.len() - 1;
        if p == 0 {
            return Ok(Vec::new());
        }

        let r = DMatrix::from_fn(p, p, |i, j| acf[i.abs_diff(j)]);
        let rhs = DVector::from_column_slice(&acf[1..]);
        let pinv = r
            .pseudo_inverse(PINV_EPS)
            .map_err(|e| Error::InvalidParameter(format!("Yule-Walker solve failed: {e}")))?;
        let alpha = pinv * rhs;
        Ok(alpha.iter().copied().collect())
    }

    /// Highest order `p ≤ acf.len() − 1` whose leading `(p+1)×(p+1)`
    /// autocorrelation matrix is positive definite, found with the
    /// Durbin–Levinson recursion.
    ///
    /// A sequence that stays valid at every lag returns `acf.len() − 1`.
    pub fn admissible_order(acf: &[f64]) -> usize {
        let max_order = acf.len().saturating_sub(1);
        let mut phi: Vec<f64> = Vec::with_capacity(max_order);
        let mut variance = 1.0;
        for k in 1..=max_order {
            let projected: f64 = phi
                .iter()
                .zip(acf[1..k].iter().rev())
                .map(|(a, r)| a * r)
                .sum();
            let reflection = (acf[k] - projected) / variance;
            let next_variance = variance * (1.0 - reflection * reflection);
            if !next_variance.is_finite() || next_variance <= MIN_INNOVATION_VARIANCE {
                return k - 1;
            }
            let previous = phi.clone();
            for (a, b) in phi.iter_mut().zip(previous.iter().rev()) {
                *a -= reflection * b;
            }
            phi.push(reflection);
            variance = next_variance;
        }
        max_order
    }

    /// Coefficients plus innovation variance `1 − Σ α_i·acf[i]`.
    ///
    /// # Errors
    ///
    /// Returns `NonStationaryStructure` when the innovation variance is not
    /// positive, plus the errors of [`YuleWalkerSolver::coefficients`].
    pub fn solve(acf: &[f64], season: u32) -> Result<ArStructure> {
        let coefficients = Self::coefficients(acf)?;
        let explained: f64 = coefficients
            .iter()
            .zip(&acf[1..])
            .map(|(a, r)| a * r)
            .sum();
        let innovation_variance = 1.0 - explained;
        if innovation_variance.is_nan() || innovation_variance <= MIN_INNOVATION_VARIANCE {
            return Err(Error::NonStationaryStructure {
                season,
                variance: innovation_variance,
            });
        }
        Ok(ArStructure {
            coefficients,
            innovation_variance,
        })
    }
}
