//! Autocorrelation-structure models: the empirical ACF or a parametric
//! family fitted to it.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::acf::EmpiricalAcf;
use super::lsq::LeastSquares;
use crate::error::{Error, Result};

/// Tag of an autocorrelation-structure family.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum AcsModel {
    /// Use the empirical ACF directly.
    #[default]
    #[serde(rename = "empirical")]
    Empirical,
    /// `ρ(t) = aᵗ`
    #[serde(rename = "ar1")]
    Ar1,
    /// `ρ(t) = exp(−(t/scale)^shape)`
    #[serde(rename = "weibull")]
    Weibull,
    /// `ρ(t) = (1 + shape·t/scale)^(−1/shape)`
    #[serde(rename = "paretoII")]
    ParetoII,
    /// Fractional Gaussian noise with Hurst exponent `H`.
    #[serde(rename = "fgn")]
    Fgn,
    /// `ρ(t) = (1 + (t/scale)^shape1)^(−shape2)`
    #[serde(rename = "burrXII")]
    BurrXII,
}

impl AcsModel {
    pub const TAGS: &[&str] = &["empirical", "ar1", "weibull", "paretoII", "fgn", "burrXII"];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Empirical => "empirical",
            Self::Ar1 => "ar1",
            Self::Weibull => "weibull",
            Self::ParetoII => "paretoII",
            Self::Fgn => "fgn",
            Self::BurrXII => "burrXII",
        }
    }

    /// Parameter names in fit order.
    pub fn param_names(&self) -> &'static [&'static str] {
        match self {
            Self::Empirical => &[],
            Self::Ar1 => &["a"],
            Self::Weibull | Self::ParetoII => &["scale", "shape"],
            Self::Fgn => &["hurst"],
            Self::BurrXII => &["scale", "shape1", "shape2"],
        }
    }

    fn bounds(&self) -> (Vec<f64>, Vec<f64>) {
        match self {
            Self::Empirical => (vec![], vec![]),
            Self::Ar1 => (vec![0.0], vec![0.999]),
            Self::Weibull => (vec![1e-3, 1e-3], vec![1e4, 10.0]),
            Self::ParetoII => (vec![1e-3, 1e-3], vec![1e4, 50.0]),
            Self::Fgn => (vec![1e-3], vec![0.999]),
            Self::BurrXII => (vec![1e-3, 1e-3, 1e-3], vec![1e4, 10.0, 50.0]),
        }
    }

    fn initial(&self, acf: &EmpiricalAcf) -> Vec<f64> {
        let rho1 = acf.at(1).unwrap_or(0.5);
        match self {
            Self::Empirical => vec![],
            Self::Ar1 => vec![rho1.clamp(0.0, 0.999)],
            Self::Weibull | Self::ParetoII => vec![2.0, 1.0],
            Self::Fgn => vec![0.7],
            Self::BurrXII => vec![2.0, 1.0, 1.0],
        }
    }

    /// Evaluates the family with `params` at (possibly fractional) lag `t`.
    pub fn evaluate(&self, params: &[f64], t: f64) -> f64 {
        if t == 0.0 {
            return 1.0;
        }
        match self {
            Self::Empirical => f64::NAN,
            Self::Ar1 => params[0].powf(t),
            Self::Weibull => (-(t / params[0]).powf(params[1])).exp(),
            Self::ParetoII => (1.0 + params[1] * t / params[0]).powf(-1.0 / params[1]),
            Self::Fgn => {
                let h2 = 2.0 * params[0];
                0.5 * ((t - 1.0).abs().powf(h2) - 2.0 * t.abs().powf(h2) + (t + 1.0).abs().powf(h2))
            }
            Self::BurrXII => (1.0 + (t / params[0]).powf(params[1])).powf(-params[2]),
        }
    }

    /// Fits the family to lags `1..=max_lag` of `acf`.
    ///
    /// # Errors
    ///
    /// * `InvalidParameter` when there are fewer lags than parameters
    /// * `FitDidNotConverge` from the least-squares solver
    pub fn fit(&self, acf: &EmpiricalAcf, solver: &LeastSquares) -> Result<FittedAcs> {
        let model = *self;
        if model == Self::Empirical {
            return Ok(FittedAcs {
                model,
                params: Vec::new(),
                empirical: acf.clone(),
            });
        }
        let n_params = model.param_names().len();
        let lags = acf.max_lag();
        if lags < n_params {
            return Err(Error::InvalidParameter(format!(
                "{model} needs at least {n_params} lags, got {lags}"
            )));
        }

        let targets = &acf.as_slice()[1..];
        let residuals = |p: &[f64]| -> Vec<f64> {
            targets
                .iter()
                .enumerate()
                .map(|(i, &r)| model.evaluate(p, (i + 1) as f64) - r)
                .collect()
        };
        let (lower, upper) = model.bounds();
        let solution = solver.minimize(
            &format!("{model} autocorrelation structure"),
            residuals,
            &model.initial(acf),
            &lower,
            &upper,
        )?;
        Ok(FittedAcs {
            model,
            params: solution.params,
            empirical: acf.clone(),
        })
    }
}

impl FromStr for AcsModel {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "empirical" => Ok(Self::Empirical),
            "ar1" => Ok(Self::Ar1),
            "weibull" => Ok(Self::Weibull),
            "paretoii" => Ok(Self::ParetoII),
            "fgn" => Ok(Self::Fgn),
            "burrxii" => Ok(Self::BurrXII),
            _ => Err(Error::UnsupportedAcsModel(s.to_string())),
        }
    }
}

impl fmt::Display for AcsModel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An autocorrelation structure ready for evaluation at any lag.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FittedAcs {
    pub model: AcsModel,
    pub params: Vec<f64>,
    /// The empirical ACF the structure was derived from.
    pub empirical: EmpiricalAcf,
}

impl FittedAcs {
    /// Autocorrelation at integer `lag`.
    pub fn at(&self, lag: usize) -> f64 {
        match self.model {
            AcsModel::Empirical => self.empirical.at(lag).unwrap_or(0.0),
            model => model.evaluate(&self.params, lag as f64),
        }
    }

    /// Target-domain sequence for lags `0..=max_lag`.
    pub fn sequence(&self, max_lag: usize) -> Vec<f64> {
        (0..=max_lag).map(|k| self.at(k)).collect()
    }
}
