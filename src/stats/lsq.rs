//! Box-constrained Levenberg–Marquardt nonlinear least squares.

use nalgebra::{DMatrix, DVector};

use crate::error::{Error, Result};

/// Solver settings.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LeastSquares {
    /// Iteration budget (accepted plus rejected steps).
    pub max_iter: usize,
    /// Relative cost-reduction tolerance.
    pub ftol: f64,
    /// Relative step-size tolerance.
    pub xtol: f64,
    /// Projected-gradient tolerance.
    pub gtol: f64,
    /// Root-mean-square residual at or below which the current point is
    /// accepted. Stops the iteration on flat valleys where every step still
    /// improves the cost by more than `ftol`.
    pub residual_floor: f64,
}

impl Default for LeastSquares {
    fn default() -> Self {
        Self {
            max_iter: 500,
            ftol: 1e-10,
            xtol: 1e-10,
            gtol: 1e-12,
            residual_floor: 1e-10,
        }
    }
}

/// A converged least-squares solution.
#[derive(Debug, Clone, PartialEq)]
pub struct Solution {
    pub params: Vec<f64>,
    /// Half the residual sum of squares at `params`.
    pub cost: f64,
    pub iterations: usize,
}

const LAMBDA_MAX: f64 = 1e14;

impl LeastSquares {
    /// Minimizes `½‖residuals(x)‖²` subject to `lower ≤ x ≤ upper`.
    ///
    /// `what` names the fitted quantity in error messages.
    ///
    /// # Errors
    ///
    /// Returns `FitDidNotConverge` if the residuals are non-finite at the
    /// starting point or the iteration budget is exhausted.
    pub fn minimize<F>(
        &self,
        what: &str,
        residuals: F,
        x0: &[f64],
        lower: &[f64],
        upper: &[f64],
    ) -> Result<Solution>
    where
        F: Fn(&[f64]) -> Vec<f64>,
    {
        let project = |x: &mut [f64]| {
            for ((xi, lo), hi) in x.iter_mut().zip(lower).zip(upper) {
                *xi = xi.clamp(*lo, *hi);
            }
        };

        let mut x = x0.to_vec();
        project(&mut x);
        let mut r = residuals(&x);
        let mut cost = half_sum_sq(&r);
        if !cost.is_finite() {
            return Err(self.failure(what, 0, cost));
        }

        let m = r.len();
        let mut lambda = 1e-3;
        for iter in 0..self.max_iter {
            if self.below_floor(cost, m) {
                return Ok(Solution {
                    params: x,
                    cost,
                    iterations: iter,
                });
            }
            let jac = jacobian(&residuals, &x, &r, lower, upper);
            let j = DMatrix::from_fn(m, x.len(), |row, col| jac[col][row]);
            let rv = DVector::from_vec(r.clone());
            let grad = j.transpose() * &rv;

            let pg_max = x
                .iter()
                .zip(grad.iter())
                .zip(lower.iter().zip(upper))
                .filter(|((xi, g), (lo, hi))| {
                    !((*xi <= *lo && **g > 0.0) || (*xi >= *hi && **g < 0.0))
                })
                .fold(0.0_f64, |acc, ((_, g), _)| acc.max(g.abs()));
            if pg_max <= self.gtol {
                return Ok(Solution {
                    params: x,
                    cost,
                    iterations: iter,
                });
            }

            let jtj = j.transpose() * &j;
            let damping = jtj.diagonal().map(|d| lambda * d.max(1e-12));
            let a = &jtj + DMatrix::from_diagonal(&damping);
            let rhs = -grad;
            let step = a
                .clone()
                .cholesky()
                .map(|c| c.solve(&rhs))
                .or_else(|| a.lu().solve(&rhs));

            let Some(step) = step else {
                lambda *= 10.0;
                continue;
            };

            let mut candidate: Vec<f64> = x.iter().zip(step.iter()).map(|(xi, di)| xi + di).collect();
            project(&mut candidate);
            let r_new = residuals(&candidate);
            let cost_new = half_sum_sq(&r_new);

            if cost_new.is_finite() && cost_new < cost {
                let dx: f64 = x
                    .iter()
                    .zip(&candidate)
                    .map(|(a, b)| (a - b).powi(2))
                    .sum::<f64>()
                    .sqrt();
                let xnorm: f64 = x.iter().map(|v| v * v).sum::<f64>().sqrt();
                let reduction = cost - cost_new;

                x = candidate;
                r = r_new;
                cost = cost_new;
                lambda = (lambda / 10.0).max(1e-12);

                if self.below_floor(cost, m)
                    || reduction <= self.ftol * cost
                    || dx <= self.xtol * (self.xtol + xnorm)
                {
                    return Ok(Solution {
                        params: x,
                        cost,
                        iterations: iter + 1,
                    });
                }
            } else {
                lambda *= 10.0;
                if lambda > LAMBDA_MAX {
                    // no descent direction left: stationary up to rounding
                    return Ok(Solution {
                        params: x,
                        cost,
                        iterations: iter + 1,
                    });
                }
            }
        }

        Err(self.failure(what, self.max_iter, cost))
    }

    fn below_floor(&self, cost: f64, residual_count: usize) -> bool {
        cost == 0.0 || (2.0 * cost / residual_count.max(1) as f64).sqrt() <= self.residual_floor
    }

    fn failure(&self, what: &str, iterations: usize, cost: f64) -> Error {
        Error::FitDidNotConverge {
            what: what.to_string(),
            iterations,
            cost,
        }
    }
}

fn half_sum_sq(r: &[f64]) -> f64 {
    0.5 * r.iter().map(|v| v * v).sum::<f64>()
}

/// Forward-difference Jacobian, one column per parameter; steps back from an
/// active upper bound.
fn jacobian<F>(residuals: &F, x: &[f64], r: &[f64], lower: &[f64], upper: &[f64]) -> Vec<Vec<f64>>
where
    F: Fn(&[f64]) -> Vec<f64>,
{
    let eps = f64::EPSILON.sqrt();
    (0..x.len())
        .map(|i| {
            let mut h = eps * x[i].abs().max(1.0);
            if x[i] + h > upper[i] && x[i] - h >= lower[i] {
                h = -h;
            }
            let mut xp = x.to_vec();
            xp[i] += h;
            let rp = residuals(&xp);
            rp.iter().zip(r).map(|(a, b)| (a - b) / h).collect()
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn fits_exponential_decay() {
        let ts: Vec<f64> = (0..20).map(f64::from).collect();
        let ys: Vec<f64> = ts.iter().map(|t| 2.0 * (-0.3 * t).exp()).collect();
        let residuals = |p: &[f64]| -> Vec<f64> {
            ts.iter()
                .zip(&ys)
                .map(|(t, y)| p[0] * (-p[1] * t).exp() - y)
                .collect()
        };
        let sol = LeastSquares::default()
            .minimize("decay", residuals, &[1.0, 0.1], &[0.0, 0.0], &[f64::INFINITY, f64::INFINITY])
            .unwrap();
        assert_relative_eq!(sol.params[0], 2.0, epsilon = 1e-6);
        assert_relative_eq!(sol.params[1], 0.3, epsilon = 1e-6);
        assert!(sol.cost < 1e-12);
    }

    #[test]
    fn respects_active_bound() {
        // unconstrained optimum at x = -1, bounded below by 0
        let residuals = |p: &[f64]| vec![p[0] + 1.0];
        let sol = LeastSquares::default()
            .minimize("shift", residuals, &[3.0], &[0.0], &[10.0])
            .unwrap();
        assert_eq!(sol.params[0], 0.0);
        assert_relative_eq!(sol.cost, 0.5);
    }

    #[test]
    fn starting_point_is_projected() {
        let residuals = |p: &[f64]| vec![p[0] - 2.0];
        let sol = LeastSquares::default()
            .minimize("shift", residuals, &[-5.0], &[1.0], &[3.0])
            .unwrap();
        assert_relative_eq!(sol.params[0], 2.0, epsilon = 1e-8);
    }

    #[test]
    fn non_finite_start_fails() {
        let residuals = |_: &[f64]| vec![f64::NAN];
        let err = LeastSquares::default()
            .minimize("broken", residuals, &[1.0], &[0.0], &[2.0])
            .unwrap_err();
        assert!(matches!(err, Error::FitDidNotConverge { ref what, .. } if what == "broken"));
    }

    #[test]
    fn exhausted_budget_fails() {
        let solver = LeastSquares {
            max_iter: 1,
            ftol: 0.0,
            xtol: 0.0,
            gtol: 0.0,
            residual_floor: 0.0,
        };
        let residuals = |p: &[f64]| vec![p[0].powi(3) - 5.0, p[0] - 1.0];
        let result = solver.minimize("cubic", residuals, &[10.0], &[0.0], &[100.0]);
        assert!(matches!(result, Err(Error::FitDidNotConverge { iterations: 1, .. })));
    }

    #[test]
    fn flat_valley_stops_at_residual_floor() {
        // the residual vanishes only as x grows without bound
        let residuals = |p: &[f64]| vec![1e-3 / (1.0 + p[0]), 1e-3 / (1.0 + p[0])];
        let solver = LeastSquares {
            gtol: 0.0,
            ftol: 0.0,
            xtol: 0.0,
            residual_floor: 1e-6,
            ..LeastSquares::default()
        };
        let sol = solver
            .minimize("valley", residuals, &[0.0], &[0.0], &[f64::INFINITY])
            .unwrap();
        assert!(sol.iterations < 50, "took {} iterations", sol.iterations);
        assert!((2.0 * sol.cost / 2.0).sqrt() <= 1e-6);
    }

    #[test]
    fn point_already_within_floor_is_returned_unchanged() {
        let residuals = |p: &[f64]| vec![1e-9 * p[0], 1e-9];
        let solver = LeastSquares {
            residual_floor: 1e-6,
            ..LeastSquares::default()
        };
        let sol = solver
            .minimize("flat", residuals, &[1.0], &[0.0], &[10.0])
            .unwrap();
        assert_eq!(sol.params, vec![1.0]);
        assert_eq!(sol.iterations, 0);
    }
}
