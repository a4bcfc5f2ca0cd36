//! Error types for analysis and simulation.

use chrono::NaiveDateTime;
use thiserror::Error;

/// Result type alias for analysis and simulation operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors raised by the fitting and simulation pipeline.
///
/// Every fitting-phase error is fatal for the whole `analyze` call; no partial
/// model is ever returned.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum Error {
    /// Unknown marginal distribution tag.
    #[error("unsupported distribution \"{0}\" (expected normal, gamma, beta or lognormal)")]
    UnsupportedDistribution(String),

    /// Unknown autocorrelation-structure tag.
    #[error(
        "unsupported autocorrelation structure \"{0}\" (expected empirical, ar1, weibull, paretoII, fgn or burrXII)"
    )]
    UnsupportedAcsModel(String),

    /// Unknown season scheme tag.
    #[error("unsupported season scheme \"{0}\" (expected month, quarter, week or none)")]
    UnsupportedSeasonScheme(String),

    /// A season has too few usable observations for the chosen family.
    #[error("insufficient data in season {season}: need at least {needed}, got {got}")]
    InsufficientData {
        season: u32,
        needed: usize,
        got: usize,
    },

    /// A season's sample cannot identify the marginal (e.g. zero spread).
    #[error("degenerate sample in season {season}: {reason}")]
    DegenerateSample { season: u32, reason: String },

    /// Adaptive quadrature exhausted its subdivision budget.
    #[error(
        "integration did not converge after {subdivisions} subdivisions (estimate {estimate:.6e}, error {abs_error:.3e}, tolerance {tolerance:.3e})"
    )]
    IntegrationDidNotConverge {
        subdivisions: usize,
        estimate: f64,
        abs_error: f64,
        tolerance: f64,
    },

    /// Nonlinear least squares exhausted its iteration budget.
    #[error("{what} fit did not converge after {iterations} iterations (cost {cost:.3e})")]
    FitDidNotConverge {
        what: String,
        iterations: usize,
        cost: f64,
    },

    /// The Gaussian-domain ACF of a season implies a non-positive innovation variance.
    #[error("season {season} has a non-stationary autocorrelation structure (innovation variance {variance:.6})")]
    NonStationaryStructure { season: u32, variance: f64 },

    /// The requested simulation window is invalid.
    #[error("invalid date range: {0}")]
    InvalidDateRange(String),

    /// Invalid parameter value.
    #[error("invalid parameter: {0}")]
    InvalidParameter(String),

    /// Input series is empty.
    #[error("empty input series")]
    EmptySeries,

    /// Timestamps are duplicated or out of order.
    #[error("timestamps must be strictly increasing (offending timestamp {at})")]
    UnorderedTimestamps { at: NaiveDateTime },

    /// The sampling frequency could not be inferred from the timestamps.
    #[error("could not infer frequency: {0}")]
    FrequencyInference(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_messages_are_descriptive() {
        let err = Error::InsufficientData {
            season: 3,
            needed: 3,
            got: 1,
        };
        assert_eq!(
            err.to_string(),
            "insufficient data in season 3: need at least 3, got 1"
        );

        let err = Error::UnsupportedDistribution("weibull".to_string());
        assert!(err.to_string().contains("\"weibull\""));

        let err = Error::InvalidDateRange("from is after to".to_string());
        assert_eq!(err.to_string(), "invalid date range: from is after to");
    }

    #[test]
    fn errors_are_clonable_and_comparable() {
        let err1 = Error::EmptySeries;
        let err2 = err1.clone();
        assert_eq!(err1, err2);
    }
}
