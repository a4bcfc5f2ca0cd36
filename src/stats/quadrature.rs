//! Globally adaptive Gauss–Kronrod (7/15) quadrature.

use std::cmp::Ordering;
use std::collections::BinaryHeap;

use crate::error::{Error, Result};

/// Kronrod abscissae on [-1, 1], descending; odd indices are Gauss nodes.
const XGK: [f64; 8] = [
    0.991_455_371_120_812_6,
    0.949_107_912_342_758_5,
    0.864_864_423_359_769_1,
    0.741_531_185_599_394_4,
    0.586_087_235_467_691_1,
    0.405_845_151_377_397_2,
    0.207_784_955_007_898_5,
    0.0,
];

const WGK: [f64; 8] = [
    0.022_935_322_010_529_22,
    0.063_092_092_629_978_55,
    0.104_790_010_322_250_2,
    0.140_653_259_715_525_9,
    0.169_004_726_639_267_9,
    0.190_350_578_064_785_4,
    0.204_432_940_075_298_9,
    0.209_482_141_084_727_8,
];

const WG: [f64; 4] = [
    0.129_484_966_168_869_7,
    0.279_705_391_489_276_7,
    0.381_830_050_505_118_9,
    0.417_959_183_673_469_4,
];

/// Integration tolerances and subdivision budget.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Quadrature {
    /// Absolute error tolerance.
    pub epsabs: f64,
    /// Relative error tolerance.
    pub epsrel: f64,
    /// Maximum number of subintervals.
    pub limit: usize,
}

impl Default for Quadrature {
    fn default() -> Self {
        Self {
            epsabs: 1.49e-8,
            epsrel: 1e-5,
            limit: 10_000,
        }
    }
}

/// A converged integral.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Estimate {
    pub value: f64,
    pub abs_error: f64,
    pub subdivisions: usize,
}

#[derive(Debug, Clone, Copy)]
struct Segment {
    a: f64,
    b: f64,
    value: f64,
    error: f64,
}

impl PartialEq for Segment {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Segment {}

impl PartialOrd for Segment {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Segment {
    fn cmp(&self, other: &Self) -> Ordering {
        self.error.total_cmp(&other.error)
    }
}

impl Quadrature {
    /// Integrates `f` over `[a, b]`.
    ///
    /// # Errors
    ///
    /// Returns `IntegrationDidNotConverge` if the tolerance is not met within
    /// `limit` subintervals, or if the integrand produces non-finite values.
    pub fn integrate<F>(&self, f: F, a: f64, b: f64) -> Result<Estimate>
    where
        F: FnMut(f64) -> f64,
    {
        self.integrate_with_points(f, a, b, &[])
    }

    /// Integrates `f` over `[a, b]`, starting from a partition at `points`.
    ///
    /// Points outside `(a, b)` are ignored. Use them to flag peaks or kinks
    /// the first Kronrod rule could step over.
    ///
    /// # Errors
    ///
    /// See [`Quadrature::integrate`].
    pub fn integrate_with_points<F>(&self, mut f: F, a: f64, b: f64, points: &[f64]) -> Result<Estimate>
    where
        F: FnMut(f64) -> f64,
    {
        if a == b {
            return Ok(Estimate {
                value: 0.0,
                abs_error: 0.0,
                subdivisions: 0,
            });
        }
        let (lo, hi, sign) = if a < b { (a, b, 1.0) } else { (b, a, -1.0) };

        let mut breaks: Vec<f64> = points
            .iter()
            .copied()
            .filter(|p| p.is_finite() && *p > lo && *p < hi)
            .collect();
        breaks.sort_by(f64::total_cmp);
        breaks.dedup();

        let mut edges = Vec::with_capacity(breaks.len() + 2);
        edges.push(lo);
        edges.extend(breaks);
        edges.push(hi);

        let mut heap = BinaryHeap::new();
        let mut total = 0.0;
        let mut total_err = 0.0;
        for w in edges.windows(2) {
            let seg = gk15(&mut f, w[0], w[1]);
            total += seg.value;
            total_err += seg.error;
            heap.push(seg);
        }

        loop {
            if !total.is_finite() || !total_err.is_finite() {
                return Err(self.failure(heap.len(), total, total_err));
            }
            let tolerance = self.epsabs.max(self.epsrel * total.abs());
            if total_err <= tolerance {
                return Ok(Estimate {
                    value: sign * total,
                    abs_error: total_err,
                    subdivisions: heap.len(),
                });
            }
            if heap.len() >= self.limit {
                return Err(self.failure(heap.len(), total, total_err));
            }
            let Some(worst) = heap.pop() else {
                return Err(self.failure(0, total, total_err));
            };
            let mid = 0.5 * (worst.a + worst.b);
            if mid <= worst.a || mid >= worst.b {
                // interval can no longer be split in floating point
                return Err(self.failure(heap.len() + 1, total, total_err));
            }
            let left = gk15(&mut f, worst.a, mid);
            let right = gk15(&mut f, mid, worst.b);
            total += left.value + right.value - worst.value;
            total_err += left.error + right.error - worst.error;
            heap.push(left);
            heap.push(right);
        }
    }

    fn failure(&self, subdivisions: usize, estimate: f64, abs_error: f64) -> Error {
        Error::IntegrationDidNotConverge {
            subdivisions,
            estimate,
            abs_error,
            tolerance: self.epsabs.max(self.epsrel * estimate.abs()),
        }
    }
}

/// Single 15-point Kronrod rule with the QUADPACK error heuristic.
fn gk15<F: FnMut(f64) -> f64>(f: &mut F, a: f64, b: f64) -> Segment {
    let center = 0.5 * (a + b);
    let half = 0.5 * (b - a);

    let fc = f(center);
    let mut res_g = fc * WG[3];
    let mut res_k = fc * WGK[7];
    let mut fv1 = [0.0; 7];
    let mut fv2 = [0.0; 7];

    for j in 0..7 {
        let dx = half * XGK[j];
        let f1 = f(center - dx);
        let f2 = f(center + dx);
        fv1[j] = f1;
        fv2[j] = f2;
        res_k += WGK[j] * (f1 + f2);
        if j % 2 == 1 {
            res_g += WG[j / 2] * (f1 + f2);
        }
    }

    let mean = res_k * 0.5;
    let mut res_asc = WGK[7] * (fc - mean).abs();
    for j in 0..7 {
        res_asc += WGK[j] * ((fv1[j] - mean).abs() + (fv2[j] - mean).abs());
    }
    res_asc *= half.abs();

    let value = res_k * half;
    let mut error = ((res_k - res_g) * half).abs();
    if res_asc != 0.0 && error != 0.0 {
        error = res_asc * (200.0 * error / res_asc).powf(1.5).min(1.0);
    }
    if !value.is_finite() {
        error = f64::INFINITY;
    }

    Segment { a, b, value, error }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use std::f64::consts::PI;

    #[test]
    fn integrates_polynomial_exactly() {
        let q = Quadrature::default();
        let est = q.integrate(|x| 3.0 * x * x + 2.0 * x + 1.0, 0.0, 2.0).unwrap();
        assert_relative_eq!(est.value, 14.0, epsilon = 1e-12);
        assert_eq!(est.subdivisions, 1);
    }

    #[test]
    fn integrates_gaussian_density() {
        let q = Quadrature {
            epsrel: 1e-10,
            ..Quadrature::default()
        };
        let est = q
            .integrate(|x| (-0.5 * x * x).exp() / (2.0 * PI).sqrt(), -7.5, 7.5)
            .unwrap();
        assert_relative_eq!(est.value, 1.0, epsilon = 1e-9);
    }

    #[test]
    fn reversed_bounds_flip_sign() {
        let q = Quadrature::default();
        let est = q.integrate(f64::sin, PI, 0.0).unwrap();
        assert_relative_eq!(est.value, -2.0, epsilon = 1e-10);
    }

    #[test]
    fn narrow_peak_found_with_break_point() {
        let q = Quadrature {
            epsrel: 1e-10,
            ..Quadrature::default()
        };
        let sd = 0.01;
        let peak = |x: f64| (-0.5 * ((x - 3.3) / sd).powi(2)).exp() / (sd * (2.0 * PI).sqrt());
        let est = q.integrate_with_points(peak, -7.5, 7.5, &[3.3]).unwrap();
        assert_relative_eq!(est.value, 1.0, epsilon = 1e-6);
    }

    #[test]
    fn handles_integrable_kink() {
        let q = Quadrature::default();
        let est = q.integrate(|x: f64| x.abs(), -1.0, 1.0).unwrap();
        assert_relative_eq!(est.value, 1.0, epsilon = 1e-8);
    }

    #[test]
    fn budget_exhaustion_is_reported() {
        let q = Quadrature {
            epsabs: 0.0,
            epsrel: 1e-14,
            limit: 3,
        };
        let result = q.integrate(|x: f64| x.sqrt().recip(), 0.0, 1.0);
        assert!(matches!(
            result,
            Err(Error::IntegrationDidNotConverge { subdivisions: 3, .. })
        ));
    }

    #[test]
    fn non_finite_integrand_is_reported() {
        let q = Quadrature::default();
        let result = q.integrate(|_| f64::NAN, 0.0, 1.0);
        assert!(matches!(result, Err(Error::IntegrationDidNotConverge { .. })));
    }
}
