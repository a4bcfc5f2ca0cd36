//! Special functions not provided by `statrs`.

use std::f64::consts::PI;

/// Trigamma function ψ₁(x), the derivative of digamma, for `x > 0`.
///
/// Shifts the argument above 6 with the recurrence ψ₁(x) = ψ₁(x+1) + 1/x²
/// and finishes with the asymptotic series.
pub fn trigamma(x: f64) -> f64 {
    if x <= 0.0 || !x.is_finite() {
        return f64::NAN;
    }
    let mut x = x;
    let mut acc = 0.0;
    while x < 6.0 {
        acc += 1.0 / (x * x);
        x += 1.0;
    }
    let inv = 1.0 / x;
    let inv2 = inv * inv;
    let series = inv
        + inv2 / 2.0
        + inv * inv2
            * (1.0 / 6.0 - inv2 * (1.0 / 30.0 - inv2 * (1.0 / 42.0 - inv2 / 30.0)));
    acc + series
}

/// Standard normal density.
pub fn std_normal_pdf(z: f64) -> f64 {
    (-0.5 * z * z).exp() / (2.0 * PI).sqrt()
}
