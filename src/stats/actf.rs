//! Autocorrelation transformation: the mapping between the correlation of a
//! latent Gaussian pair and the correlation of the same pair after the
//! marginal transform.

use serde::{Deserialize, Serialize};
use tracing::debug;

use super::lsq::LeastSquares;
use super::marginal::{FittedMarginal, Marginal, std_normal_quantile};
use super::moments::MomentCalculator;
use super::quadrature::Quadrature;
use super::special::std_normal_pdf;
use crate::error::{Error, Result};

/// Gaussian-domain correlations at which the transform is sampled.
pub const RHOZ_GRID: [f64; 10] = [0.1, 0.2, 0.3, 0.4, 0.5, 0.6, 0.7, 0.8, 0.9, 0.95];

/// Truncation of the standard normal support.
pub const GAUSSIAN_BOUND: f64 = 7.5;

/// Nodes of the tabulated marginal transform for families without a
/// closed-form quantile.
const TABLE_NODES: usize = 6001;

/// One sampled point of the transform.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ActfPoint {
    /// Correlation of the transformed (target-domain) pair.
    pub rhox: f64,
    /// Correlation of the Gaussian pair.
    pub rhoz: f64,
}

/// Evaluates `actf(r; b, c) = ((1+b·r)^(1−c) − 1) / ((1+b)^(1−c) − 1)`.
///
/// `c = 1` uses the limit `ln(1+b·r) / ln(1+b)`. Negative `r` uses the odd
/// extension so that the curve is defined on `[-1, 1]`.
pub fn actf(r: f64, b: f64, c: f64) -> f64 {
    let r = r.clamp(-1.0, 1.0);
    if r < 0.0 {
        return -actf(-r, b, c);
    }
    let k = 1.0 - c;
    if k.abs() < 1e-10 {
        return (b * r).ln_1p() / b.ln_1p();
    }
    ((1.0 + b * r).powf(k) - 1.0) / ((1.0 + b).powf(k) - 1.0)
}

/// Fitted transform coefficients of one season.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ActfCoefficients {
    pub b: f64,
    pub c: f64,
}

impl ActfCoefficients {
    /// `b = 1, c = 0` is the identity map.
    pub const IDENTITY: Self = Self { b: 1.0, c: 0.0 };

    /// Maps a target-domain correlation to the Gaussian domain.
    pub fn to_gaussian(&self, rhox: f64) -> f64 {
        actf(rhox, self.b, self.c)
    }

    /// Maps a Gaussian-domain correlation back to the target domain.
    pub fn to_target(&self, rhoz: f64) -> f64 {
        let y = rhoz.clamp(-1.0, 1.0);
        if y < 0.0 {
            return -self.to_target(-y);
        }
        let k = 1.0 - self.c;
        let r = if k.abs() < 1e-10 {
            ((1.0 + self.b).powf(y) - 1.0) / self.b
        } else {
            let d = (1.0 + self.b).powf(k) - 1.0;
            ((y * d + 1.0).powf(1.0 / k) - 1.0) / self.b
        };
        r.clamp(-1.0, 1.0)
    }
}

enum Transform {
    /// Closed-form Gaussian → marginal transform.
    Direct,
    /// Linear interpolation on an even grid from `lower` to the bound.
    Table { step: f64, values: Vec<f64> },
}

/// Computes target-domain correlations for Gaussian-domain correlations by
/// double integration over the bivariate standard normal density.
pub struct ActiveCorrelationIntegrator {
    marginal: FittedMarginal,
    quadrature: Quadrature,
    lower: f64,
    mean: f64,
    variance: f64,
    transform: Transform,
}

impl ActiveCorrelationIntegrator {
    /// Prepares the integrator for one season's marginal.
    ///
    /// # Errors
    ///
    /// Returns `InvalidParameter` if `p0` leaves no mass inside the
    /// integration domain or the marginal has no variance.
    pub fn new(marginal: FittedMarginal) -> Result<Self> {
        let lower = if marginal.p0 > 0.0 {
            std_normal_quantile(marginal.p0)
        } else {
            -GAUSSIAN_BOUND
        };
        if lower.is_nan() || lower >= GAUSSIAN_BOUND {
            return Err(Error::InvalidParameter(format!(
                "zero probability {} leaves no continuous mass",
                marginal.p0
            )));
        }

        let moments = MomentCalculator::zero_inflated_moments(&marginal.marginal, marginal.p0);
        let variance = moments.variance();
        if variance.is_nan() || variance <= 0.0 {
            return Err(Error::InvalidParameter(format!(
                "marginal variance {variance} is not positive"
            )));
        }

        let transform = match marginal.marginal {
            Marginal::Normal { .. } | Marginal::Lognormal { .. } => Transform::Direct,
            Marginal::Gamma { .. } | Marginal::Beta { .. } => {
                let step = (GAUSSIAN_BOUND - lower) / (TABLE_NODES - 1) as f64;
                let values = (0..TABLE_NODES)
                    .map(|i| marginal.from_gaussian(lower + step * i as f64))
                    .collect();
                Transform::Table { step, values }
            }
        };

        Ok(Self {
            marginal,
            quadrature: Quadrature::default(),
            lower,
            mean: moments.mean,
            variance,
            transform,
        })
    }

    /// Overrides the quadrature settings.
    pub fn with_quadrature(mut self, quadrature: Quadrature) -> Self {
        self.quadrature = quadrature;
        self
    }

    /// Lower integration bound: `Φ⁻¹(p0)` when `p0 > 0`, else `-7.5`.
    pub fn lower_bound(&self) -> f64 {
        self.lower
    }

    fn transform(&self, z: f64) -> f64 {
        if z <= self.lower && self.marginal.p0 > 0.0 {
            return 0.0;
        }
        match &self.transform {
            Transform::Direct => self.marginal.from_gaussian(z),
            Transform::Table { step, values } => {
                let pos = ((z - self.lower) / step).max(0.0);
                let i = (pos.floor() as usize).min(values.len() - 2);
                let frac = (pos - i as f64).min(1.0);
                values[i] + frac * (values[i + 1] - values[i])
            }
        }
    }

    /// Target-domain correlation produced by Gaussian correlation `rhoz`.
    ///
    /// # Errors
    ///
    /// * `InvalidParameter` if `rhoz` is outside `[0, 1)`
    /// * `IntegrationDidNotConverge` from either quadrature level
    pub fn rhox(&self, rhoz: f64) -> Result<f64> {
        if !(0.0..1.0).contains(&rhoz) {
            return Err(Error::InvalidParameter(format!(
                "gaussian correlation {rhoz} outside [0, 1)"
            )));
        }
        let s = (1.0 - rhoz * rhoz).sqrt();
        let mut inner_failure: Option<Error> = None;

        let raw = self.quadrature.integrate(
            |y| {
                if inner_failure.is_some() {
                    return 0.0;
                }
                let ty = self.transform(y);
                if ty == 0.0 {
                    return 0.0;
                }
                let centre = rhoz * y;
                let inner = self.quadrature.integrate_with_points(
                    |x| self.transform(x) * std_normal_pdf((x - centre) / s) / s,
                    self.lower,
                    GAUSSIAN_BOUND,
                    &[centre],
                );
                match inner {
                    Ok(est) => ty * std_normal_pdf(y) * est.value,
                    Err(e) => {
                        inner_failure = Some(e);
                        0.0
                    }
                }
            },
            self.lower,
            GAUSSIAN_BOUND,
        );
        if let Some(e) = inner_failure {
            return Err(e);
        }
        let raw = raw?.value;
        Ok((raw - self.mean * self.mean) / self.variance)
    }

    /// Evaluates the transform at every grid point.
    ///
    /// # Errors
    ///
    /// See [`ActiveCorrelationIntegrator::rhox`].
    pub fn points(&self, grid: &[f64]) -> Result<Vec<ActfPoint>> {
        grid.iter()
            .map(|&rhoz| Ok(ActfPoint { rhox: self.rhox(rhoz)?, rhoz }))
            .collect()
    }
}

/// Residual level of a transform fit that is as good as the integrator
/// points it was fitted to.
pub const ACTF_RESIDUAL_FLOOR: f64 = 1e-4;

/// Fits [`ActfCoefficients`] to integrator points by bounded least squares.
///
/// `c = 0` makes the curve the identity for every `b`, so near-normal
/// marginals leave `b` undetermined; the fit stops once the points are
/// matched to [`ACTF_RESIDUAL_FLOOR`].
#[derive(Debug, Clone, Default)]
pub struct AutocorrelationTransformFitter {
    solver: LeastSquares,
}

impl AutocorrelationTransformFitter {
    /// Initial guess `(b, c)`.
    pub const INITIAL: [f64; 2] = [1.0, 0.0];
    /// Lower bounds of `(b, c)`.
    pub const LOWER: [f64; 2] = [0.001, 0.0];

    pub fn new(solver: LeastSquares) -> Self {
        Self { solver }
    }

    /// Fits `rhoz ≈ actf(rhox; b, c)` for one season.
    ///
    /// # Errors
    ///
    /// Returns `FitDidNotConverge` when the solver exhausts its budget; no
    /// default coefficients are substituted.
    pub fn fit(&self, points: &[ActfPoint], season: u32) -> Result<ActfCoefficients> {
        if points.is_empty() {
            return Err(Error::InvalidParameter("no transform points to fit".to_string()));
        }
        let residuals = |p: &[f64]| -> Vec<f64> {
            points
                .iter()
                .map(|pt| actf(pt.rhox, p[0], p[1]) - pt.rhoz)
                .collect()
        };
        let solver = LeastSquares {
            residual_floor: self.solver.residual_floor.max(ACTF_RESIDUAL_FLOOR),
            ..self.solver
        };
        let solution = solver.minimize(
            &format!("autocorrelation transform (season {season})"),
            residuals,
            &Self::INITIAL,
            &Self::LOWER,
            &[f64::INFINITY, f64::INFINITY],
        )?;
        let coefficients = ActfCoefficients {
            b: solution.params[0],
            c: solution.params[1],
        };
        debug!(
            season,
            b = coefficients.b,
            c = coefficients.c,
            cost = solution.cost,
            "fitted autocorrelation transform"
        );
        Ok(coefficients)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn actf_is_anchored_at_zero_and_one() {
        for &(b, c) in &[(1.0, 0.0), (3.0, 2.0), (0.5, 1.0), (10.0, 0.3)] {
            assert_abs_diff_eq!(actf(0.0, b, c), 0.0, epsilon = 1e-12);
            assert_abs_diff_eq!(actf(1.0, b, c), 1.0, epsilon = 1e-12);
        }
    }

    #[test]
    fn identity_coefficients_are_identity() {
        for &r in &[-0.8, -0.1, 0.0, 0.3, 0.95] {
            assert_abs_diff_eq!(ActfCoefficients::IDENTITY.to_gaussian(r), r, epsilon = 1e-12);
        }
    }

    #[test]
    fn inverse_undoes_forward_map() {
        for coeffs in [
            ActfCoefficients { b: 2.0, c: 0.5 },
            ActfCoefficients { b: 0.3, c: 1.0 },
            ActfCoefficients { b: 5.0, c: 3.0 },
        ] {
            for &r in &[-0.6, 0.05, 0.4, 0.9] {
                let z = coeffs.to_gaussian(r);
                assert_abs_diff_eq!(coeffs.to_target(z), r, epsilon = 1e-9);
            }
        }
    }

    #[test]
    fn normal_marginal_preserves_correlation() {
        let marginal = FittedMarginal {
            marginal: Marginal::Normal { mean: 10.0, sd: 3.0 },
            p0: 0.0,
        };
        let integrator = ActiveCorrelationIntegrator::new(marginal).unwrap();
        for &rhoz in &[0.1, 0.5, 0.9] {
            let rhox = integrator.rhox(rhoz).unwrap();
            assert_abs_diff_eq!(rhox, rhoz, epsilon = 1e-3);
        }
    }

    #[test]
    fn zero_inflation_weakens_correlation() {
        let marginal = FittedMarginal {
            marginal: Marginal::Gamma {
                shape: 2.0,
                scale: 1.5,
            },
            p0: 0.2,
        };
        let integrator = ActiveCorrelationIntegrator::new(marginal).unwrap();
        assert!(integrator.lower_bound() > -1.0 && integrator.lower_bound() < -0.8);
        let points = integrator.points(&[0.3, 0.6, 0.9]).unwrap();
        let mut previous = 0.0;
        for pt in &points {
            assert!(pt.rhox > previous, "{pt:?}");
            assert!(pt.rhox < pt.rhoz, "{pt:?}");
            previous = pt.rhox;
        }
    }

    #[test]
    fn rejects_correlation_outside_unit_interval() {
        let marginal = FittedMarginal {
            marginal: Marginal::Normal { mean: 0.0, sd: 1.0 },
            p0: 0.0,
        };
        let integrator = ActiveCorrelationIntegrator::new(marginal).unwrap();
        assert!(matches!(integrator.rhox(1.0), Err(Error::InvalidParameter(_))));
        assert!(matches!(integrator.rhox(-0.1), Err(Error::InvalidParameter(_))));
    }

    #[test]
    fn fitter_recovers_known_curve() {
        let truth = ActfCoefficients { b: 2.0, c: 0.6 };
        let points: Vec<ActfPoint> = RHOZ_GRID
            .iter()
            .map(|&rhoz| ActfPoint {
                rhox: truth.to_target(rhoz),
                rhoz,
            })
            .collect();
        let fitted = AutocorrelationTransformFitter::default().fit(&points, 1).unwrap();
        // root-mean-square floor over ten points bounds each residual
        let bound = ACTF_RESIDUAL_FLOOR * (points.len() as f64).sqrt();
        for pt in &points {
            assert_abs_diff_eq!(fitted.to_gaussian(pt.rhox), pt.rhoz, epsilon = bound);
        }
    }

    #[test]
    fn fitter_converges_on_nearly_identity_points() {
        // a slightly skewed marginal: b is almost unidentified along c = 0
        let points: Vec<ActfPoint> = RHOZ_GRID
            .iter()
            .map(|&z| ActfPoint {
                rhox: z - 0.002 * z * (1.0 - z),
                rhoz: z,
            })
            .collect();
        let fitted = AutocorrelationTransformFitter::default().fit(&points, 3).unwrap();
        for pt in &points {
            assert_abs_diff_eq!(fitted.to_gaussian(pt.rhox), pt.rhoz, epsilon = 1e-3);
        }
    }

    #[test]
    fn fitter_converges_for_near_normal_gamma() {
        // shape 60 is close to normal; the fit must not wander along b
        let marginal = FittedMarginal {
            marginal: Marginal::Gamma {
                shape: 60.0,
                scale: 0.25,
            },
            p0: 0.0,
        };
        let points = ActiveCorrelationIntegrator::new(marginal)
            .unwrap()
            .points(&RHOZ_GRID)
            .unwrap();
        let fitted = AutocorrelationTransformFitter::default().fit(&points, 1).unwrap();
        for pt in &points {
            assert_abs_diff_eq!(fitted.to_gaussian(pt.rhox), pt.rhoz, epsilon = 2e-3);
        }
    }

    #[test]
    fn fitter_on_identity_points_keeps_identity_shape() {
        let points: Vec<ActfPoint> = RHOZ_GRID
            .iter()
            .map(|&r| ActfPoint { rhox: r, rhoz: r })
            .collect();
        let fitted = AutocorrelationTransformFitter::default().fit(&points, 1).unwrap();
        for &r in &[0.15, 0.5, 0.85] {
            assert_abs_diff_eq!(fitted.to_gaussian(r), r, epsilon = 1e-6);
        }
    }
}
