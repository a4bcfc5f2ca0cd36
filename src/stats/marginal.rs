//! Marginal distribution families, maximum-likelihood fitting, and the
//! probability-integral transform.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use statrs::distribution::{Beta, Continuous, ContinuousCDF, Gamma, LogNormal, Normal};
use statrs::function::gamma::digamma;

use super::special::trigamma;
use crate::error::{Error, Result};

/// Largest uniform value passed to a quantile function.
const U_MAX: f64 = 1.0 - 1e-12;
/// Smallest uniform value passed to an unbounded quantile function.
const U_MIN: f64 = 1e-12;

const MLE_MAX_ITER: usize = 200;
const MLE_TOL: f64 = 1e-10;

/// Supported marginal distribution families.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DistributionFamily {
    #[default]
    Normal,
    Gamma,
    Beta,
    Lognormal,
}

impl DistributionFamily {
    /// All supported tags.
    pub const TAGS: &[&str] = &["normal", "gamma", "beta", "lognormal"];

    /// Number of free parameters estimated from data.
    pub fn n_params(&self) -> usize {
        2
    }

    /// Smallest sample a season must hold to be fitted.
    pub fn min_sample(&self) -> usize {
        self.n_params() + 1
    }

    /// Whether the family lives on `[0, ∞)` and carries a zero-inflation mass.
    pub fn is_zero_bounded(&self) -> bool {
        !matches!(self, Self::Normal)
    }

    /// Configuration tag.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Normal => "normal",
            Self::Gamma => "gamma",
            Self::Beta => "beta",
            Self::Lognormal => "lognormal",
        }
    }
}

impl FromStr for DistributionFamily {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "normal" | "norm" => Ok(Self::Normal),
            "gamma" => Ok(Self::Gamma),
            "beta" => Ok(Self::Beta),
            "lognormal" | "lognorm" => Ok(Self::Lognormal),
            _ => Err(Error::UnsupportedDistribution(s.to_string())),
        }
    }
}

impl fmt::Display for DistributionFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A parametrized continuous marginal.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "family", rename_all = "snake_case")]
pub enum Marginal {
    Normal { mean: f64, sd: f64 },
    Gamma { shape: f64, scale: f64 },
    /// Beta distribution stretched onto `[0, scale]`.
    Beta { alpha: f64, beta: f64, scale: f64 },
    Lognormal { mu: f64, sigma: f64 },
}

impl Marginal {
    /// Builds a marginal from a family tag and named parameters.
    ///
    /// Accepted names: `mean`/`sd` (normal), `shape`/`scale` (gamma),
    /// `alpha`/`beta`/`scale` (beta, `scale` optional and defaulting to 1),
    /// `mu`/`sigma` (lognormal).
    ///
    /// # Errors
    ///
    /// * `UnsupportedDistribution` for an unknown tag
    /// * `InvalidParameter` for missing or out-of-domain parameters
    pub fn from_params(tag: &str, params: &BTreeMap<String, f64>) -> Result<Self> {
        let family: DistributionFamily = tag.parse()?;
        let get = |name: &str| {
            params
                .get(name)
                .copied()
                .ok_or_else(|| Error::InvalidParameter(format!("{family} requires \"{name}\"")))
        };
        let marginal = match family {
            DistributionFamily::Normal => Self::Normal {
                mean: get("mean")?,
                sd: get("sd")?,
            },
            DistributionFamily::Gamma => Self::Gamma {
                shape: get("shape")?,
                scale: get("scale")?,
            },
            DistributionFamily::Beta => Self::Beta {
                alpha: get("alpha")?,
                beta: get("beta")?,
                scale: params.get("scale").copied().unwrap_or(1.0),
            },
            DistributionFamily::Lognormal => Self::Lognormal {
                mu: get("mu")?,
                sigma: get("sigma")?,
            },
        };
        marginal.validate()?;
        Ok(marginal)
    }

    /// Family of this marginal.
    pub fn family(&self) -> DistributionFamily {
        match self {
            Self::Normal { .. } => DistributionFamily::Normal,
            Self::Gamma { .. } => DistributionFamily::Gamma,
            Self::Beta { .. } => DistributionFamily::Beta,
            Self::Lognormal { .. } => DistributionFamily::Lognormal,
        }
    }

    fn validate(&self) -> Result<()> {
        let ok = match *self {
            Self::Normal { mean, sd } => mean.is_finite() && sd > 0.0 && sd.is_finite(),
            Self::Gamma { shape, scale } => shape > 0.0 && scale > 0.0,
            Self::Beta { alpha, beta, scale } => alpha > 0.0 && beta > 0.0 && scale > 0.0,
            Self::Lognormal { mu, sigma } => mu.is_finite() && sigma > 0.0,
        };
        if ok {
            Ok(())
        } else {
            Err(Error::InvalidParameter(format!("invalid {} parameters: {self:?}", self.family())))
        }
    }

    /// Probability density at `x`.
    pub fn pdf(&self, x: f64) -> f64 {
        match *self {
            Self::Normal { mean, sd } => Normal::new(mean, sd).map_or(0.0, |d| d.pdf(x)),
            Self::Gamma { shape, scale } => {
                if x <= 0.0 {
                    return 0.0;
                }
                Gamma::new(shape, 1.0 / scale).map_or(0.0, |d| d.pdf(x))
            }
            Self::Beta { alpha, beta, scale } => {
                let y = x / scale;
                if y <= 0.0 || y >= 1.0 {
                    return 0.0;
                }
                Beta::new(alpha, beta).map_or(0.0, |d| d.pdf(y) / scale)
            }
            Self::Lognormal { mu, sigma } => {
                if x <= 0.0 {
                    return 0.0;
                }
                LogNormal::new(mu, sigma).map_or(0.0, |d| d.pdf(x))
            }
        }
    }

    /// Cumulative distribution at `x`.
    pub fn cdf(&self, x: f64) -> f64 {
        match *self {
            Self::Normal { mean, sd } => Normal::new(mean, sd).map_or(f64::NAN, |d| d.cdf(x)),
            Self::Gamma { shape, scale } => {
                if x <= 0.0 {
                    return 0.0;
                }
                Gamma::new(shape, 1.0 / scale).map_or(f64::NAN, |d| d.cdf(x))
            }
            Self::Beta { alpha, beta, scale } => {
                let y = x / scale;
                if y <= 0.0 {
                    0.0
                } else if y >= 1.0 {
                    1.0
                } else {
                    Beta::new(alpha, beta).map_or(f64::NAN, |d| d.cdf(y))
                }
            }
            Self::Lognormal { mu, sigma } => {
                if x <= 0.0 {
                    return 0.0;
                }
                LogNormal::new(mu, sigma).map_or(f64::NAN, |d| d.cdf(x))
            }
        }
    }

    /// Quantile function F⁻¹(u) for `u ∈ (0, 1)`.
    ///
    /// `u` is clamped into the open unit interval so the result is always
    /// finite. Zero-bounded families return their lower bound for `u ≤ 0`.
    pub fn quantile(&self, u: f64) -> f64 {
        match *self {
            Self::Normal { mean, sd } => mean + sd * std_normal_quantile(u.clamp(U_MIN, U_MAX)),
            Self::Lognormal { mu, sigma } => {
                if u <= 0.0 {
                    return 0.0;
                }
                (mu + sigma * std_normal_quantile(u.clamp(U_MIN, U_MAX))).exp()
            }
            Self::Gamma { .. } | Self::Beta { .. } => {
                if u <= 0.0 {
                    return 0.0;
                }
                self.invert_cdf(u.min(U_MAX))
            }
        }
    }

    /// Safeguarded Newton inversion of the CDF on `[0, upper]`.
    fn invert_cdf(&self, u: f64) -> f64 {
        let mean = super::moments::MomentCalculator::moments(self).mean;
        let (mut lo, mut hi) = match *self {
            Self::Beta { scale, .. } => (0.0, scale),
            _ => {
                let mut hi = mean.max(f64::MIN_POSITIVE) * 2.0;
                while self.cdf(hi) < u && hi.is_finite() {
                    hi *= 2.0;
                }
                (0.0, hi)
            }
        };

        let mut x = mean.clamp(lo, hi);
        for _ in 0..MLE_MAX_ITER {
            let f = self.cdf(x) - u;
            if f.abs() < 1e-14 {
                break;
            }
            if f > 0.0 {
                hi = x;
            } else {
                lo = x;
            }
            let d = self.pdf(x);
            let newton = if d > 0.0 { x - f / d } else { f64::NAN };
            let next = if newton.is_finite() && newton > lo && newton < hi {
                newton
            } else {
                0.5 * (lo + hi)
            };
            if (next - x).abs() <= 1e-13 * x.abs().max(1e-300) {
                x = next;
                break;
            }
            x = next;
        }
        x
    }
}

/// Standard normal quantile Φ⁻¹(u).
pub fn std_normal_quantile(u: f64) -> f64 {
    -std::f64::consts::SQRT_2 * statrs::function::erf::erfc_inv(2.0 * u)
}

/// Standard normal CDF Φ(z).
pub fn std_normal_cdf(z: f64) -> f64 {
    0.5 * statrs::function::erf::erfc(-z / std::f64::consts::SQRT_2)
}

/// A season's fitted marginal plus its zero-inflation probability.
///
/// Immutable once created.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FittedMarginal {
    /// Continuous part of the distribution.
    pub marginal: Marginal,
    /// Probability mass at or below zero.
    pub p0: f64,
}

impl FittedMarginal {
    /// Fits `family` to one season's sample by maximum likelihood.
    ///
    /// For zero-bounded families `p0` is the fraction of values `≤ 0` and the
    /// continuous part is fitted to the positive values only. Normal
    /// marginals use every value and carry `p0 = 0`.
    ///
    /// # Errors
    ///
    /// * `InsufficientData` when fewer than `family.min_sample()` usable values remain
    /// * `DegenerateSample` when the sample has no spread
    /// * `FitDidNotConverge` when the likelihood iteration fails
    pub fn fit(family: DistributionFamily, values: &[f64], season: u32) -> Result<Self> {
        let needed = family.min_sample();
        let (sample, p0): (Vec<f64>, f64) = if family.is_zero_bounded() {
            let positive: Vec<f64> = values.iter().copied().filter(|&v| v > 0.0).collect();
            let p0 = if values.is_empty() {
                0.0
            } else {
                (values.len() - positive.len()) as f64 / values.len() as f64
            };
            (positive, p0)
        } else {
            (values.to_vec(), 0.0)
        };

        if sample.len() < needed {
            return Err(Error::InsufficientData {
                season,
                needed,
                got: sample.len(),
            });
        }

        let marginal = match family {
            DistributionFamily::Normal => fit_normal(&sample, season)?,
            DistributionFamily::Lognormal => fit_lognormal(&sample, season)?,
            DistributionFamily::Gamma => fit_gamma(&sample, season)?,
            DistributionFamily::Beta => fit_beta(&sample, season)?,
        };
        Ok(Self { marginal, p0 })
    }

    /// Maps a standard-normal draw onto the zero-inflated marginal:
    /// `u = (Φ(z) − p0) / (1 − p0)` clipped at 0, then `F⁻¹(u)`.
    pub fn from_gaussian(&self, z: f64) -> f64 {
        if self.p0 <= 0.0 {
            match self.marginal {
                Marginal::Normal { mean, sd } => return mean + sd * z,
                Marginal::Lognormal { mu, sigma } => return (mu + sigma * z).exp(),
                _ => {}
            }
        }
        let u = if self.p0 > 0.0 {
            ((std_normal_cdf(z) - self.p0) / (1.0 - self.p0)).max(0.0)
        } else {
            std_normal_cdf(z)
        };
        self.marginal.quantile(u)
    }

    /// Inverse of [`FittedMarginal::from_gaussian`] on the continuous part.
    ///
    /// Zero values map to the Gaussian quantile of `p0`.
    pub fn to_gaussian(&self, x: f64) -> f64 {
        let u = self.p0 + (1.0 - self.p0) * self.marginal.cdf(x);
        std_normal_quantile(u.clamp(U_MIN, U_MAX))
    }

    /// Density of the continuous part scaled by `1 − p0`.
    pub fn density(&self, x: f64) -> f64 {
        (1.0 - self.p0) * self.marginal.pdf(x)
    }
}

fn mean_and_sd(sample: &[f64]) -> (f64, f64) {
    let n = sample.len() as f64;
    let mean = sample.iter().sum::<f64>() / n;
    let var = sample.iter().map(|x| (x - mean).powi(2)).sum::<f64>() / n;
    (mean, var.sqrt())
}

fn degenerate(season: u32, reason: &str) -> Error {
    Error::DegenerateSample {
        season,
        reason: reason.to_string(),
    }
}

fn fit_normal(sample: &[f64], season: u32) -> Result<Marginal> {
    let (mean, sd) = mean_and_sd(sample);
    if sd <= 0.0 || !sd.is_finite() {
        return Err(degenerate(season, "zero variance"));
    }
    Ok(Marginal::Normal { mean, sd })
}

fn fit_lognormal(sample: &[f64], season: u32) -> Result<Marginal> {
    let logs: Vec<f64> = sample.iter().map(|x| x.ln()).collect();
    let (mu, sigma) = mean_and_sd(&logs);
    if sigma <= 0.0 || !sigma.is_finite() {
        return Err(degenerate(season, "zero variance of log values"));
    }
    Ok(Marginal::Lognormal { mu, sigma })
}

/// Gamma MLE: Newton iteration on `ln k − ψ(k) = ln(mean) − mean(ln x)`.
fn fit_gamma(sample: &[f64], season: u32) -> Result<Marginal> {
    let n = sample.len() as f64;
    let mean = sample.iter().sum::<f64>() / n;
    let mean_log = sample.iter().map(|x| x.ln()).sum::<f64>() / n;
    let s = mean.ln() - mean_log;
    if s <= 1e-12 || !s.is_finite() {
        return Err(degenerate(season, "all values are equal"));
    }

    let mut k = (3.0 - s + ((s - 3.0).powi(2) + 24.0 * s).sqrt()) / (12.0 * s);
    for _ in 0..MLE_MAX_ITER {
        let f = k.ln() - digamma(k) - s;
        let df = 1.0 / k - trigamma(k);
        let mut next = k - f / df;
        if next <= 0.0 || !next.is_finite() {
            next = 0.5 * k;
        }
        let converged = (next - k).abs() <= MLE_TOL * k;
        k = next;
        if converged {
            return Ok(Marginal::Gamma {
                shape: k,
                scale: mean / k,
            });
        }
    }
    Err(Error::FitDidNotConverge {
        what: format!("gamma marginal (season {season})"),
        iterations: MLE_MAX_ITER,
        cost: (k.ln() - digamma(k) - s).abs(),
    })
}

/// Beta MLE on `[0, scale]` with `scale = max · (1 + 1/n)`: two-dimensional
/// Newton iteration started from the method-of-moments estimate.
fn fit_beta(sample: &[f64], season: u32) -> Result<Marginal> {
    let n = sample.len() as f64;
    let max = sample.iter().copied().fold(f64::MIN, f64::max);
    let scale = max * (1.0 + 1.0 / n);
    let unit: Vec<f64> = sample.iter().map(|x| x / scale).collect();

    let (m, sd) = mean_and_sd(&unit);
    let v = sd * sd;
    if v <= 0.0 {
        return Err(degenerate(season, "zero variance"));
    }
    let l1 = unit.iter().map(|x| x.ln()).sum::<f64>() / n;
    let l2 = unit.iter().map(|x| (1.0 - x).ln()).sum::<f64>() / n;

    let common = m * (1.0 - m) / v - 1.0;
    let (mut a, mut b) = if common > 0.0 {
        (m * common, (1.0 - m) * common)
    } else {
        (1.0, 1.0)
    };

    let loglik = |a: f64, b: f64| {
        use statrs::function::beta::ln_beta;
        (a - 1.0) * l1 + (b - 1.0) * l2 - ln_beta(a, b)
    };

    let mut grad_norm = f64::INFINITY;
    for _ in 0..MLE_MAX_ITER {
        let dab = digamma(a + b);
        let g1 = dab - digamma(a) + l1;
        let g2 = dab - digamma(b) + l2;
        grad_norm = g1.hypot(g2);
        if grad_norm < 1e-9 {
            return Ok(Marginal::Beta { alpha: a, beta: b, scale });
        }

        let tab = trigamma(a + b);
        let h11 = tab - trigamma(a);
        let h22 = tab - trigamma(b);
        let h12 = tab;
        let det = h11 * h22 - h12 * h12;
        // Hessian of the beta log-likelihood is negative definite.
        let (mut da, mut db) = if det > 0.0 {
            (-(h22 * g1 - h12 * g2) / det, -(h11 * g2 - h12 * g1) / det)
        } else {
            (g1, g2)
        };

        let base = loglik(a, b);
        let mut accepted = false;
        for _ in 0..60 {
            let (na, nb) = (a + da, b + db);
            if na > 0.0 && nb > 0.0 && loglik(na, nb) >= base - 1e-12 {
                a = na;
                b = nb;
                accepted = true;
                break;
            }
            da *= 0.5;
            db *= 0.5;
        }
        if !accepted {
            break;
        }
    }

    Err(Error::FitDidNotConverge {
        what: format!("beta marginal (season {season})"),
        iterations: MLE_MAX_ITER,
        cost: grad_norm,
    })
}
