//! Closed-form moments of the supported marginal families.

use std::collections::BTreeMap;

use serde::Serialize;

use super::marginal::Marginal;
use crate::error::Result;

/// First two raw moments of a distribution.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Moments {
    /// E[X]
    pub mean: f64,
    /// E[X²]
    pub second: f64,
}

impl Moments {
    /// Central second moment, E[X²] − E[X]².
    pub fn variance(&self) -> f64 {
        self.second - self.mean * self.mean
    }

    /// Moments of the mixture that is zero with probability `p0` and follows
    /// `self` otherwise.
    pub fn zero_inflated(&self, p0: f64) -> Self {
        let q = 1.0 - p0;
        Self {
            mean: q * self.mean,
            second: q * self.second,
        }
    }
}

/// Closed-form moment evaluation per family.
pub struct MomentCalculator;

impl MomentCalculator {
    /// Raw moments of the continuous marginal.
    pub fn moments(marginal: &Marginal) -> Moments {
        match *marginal {
            Marginal::Normal { mean, sd } => Moments {
                mean,
                second: sd * sd + mean * mean,
            },
            Marginal::Gamma { shape, scale } => Moments {
                mean: shape * scale,
                second: shape * (shape + 1.0) * scale * scale,
            },
            Marginal::Beta { alpha, beta, scale } => {
                let ab = alpha + beta;
                Moments {
                    mean: scale * alpha / ab,
                    second: scale * scale * alpha * (alpha + 1.0) / (ab * (ab + 1.0)),
                }
            }
            Marginal::Lognormal { mu, sigma } => Moments {
                mean: (mu + 0.5 * sigma * sigma).exp(),
                second: (2.0 * mu + 2.0 * sigma * sigma).exp(),
            },
        }
    }

    /// Raw moments from a family tag and named parameters.
    ///
    /// # Errors
    ///
    /// Returns `UnsupportedDistribution` for an unknown tag and
    /// `InvalidParameter` for missing parameters.
    pub fn moments_for(tag: &str, params: &BTreeMap<String, f64>) -> Result<Moments> {
        Ok(Self::moments(&Marginal::from_params(tag, params)?))
    }

    /// Raw moments of the zero-inflated marginal.
    pub fn zero_inflated_moments(marginal: &Marginal, p0: f64) -> Moments {
        Self::moments(marginal).zero_inflated(p0)
    }
}
