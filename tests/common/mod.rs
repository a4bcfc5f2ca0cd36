//! Shared test fixtures for integration tests.

#![allow(dead_code)]

use std::f64::consts::PI;

use chrono::{Datelike, NaiveDate, NaiveDateTime, NaiveTime, TimeDelta};
use irradiance_sim::analysis::{AnalysisOptions, analyze_with};
use irradiance_sim::model::FittedModel;
use irradiance_sim::series::{ObservedSeries, SeasonScheme};
use irradiance_sim::sim::{Ensemble, EnsembleOutcome, EnsembleRequest, MissingSeasonPolicy};
use irradiance_sim::stats::DistributionFamily;
use rand::SeedableRng;
use rand::rngs::StdRng;
use rand_distr::{Distribution, StandardNormal};

/// Lag-1 coefficient of the synthetic Gaussian process.
pub const PHI: f64 = 0.6;

/// Midnight of `y-m-d`.
pub fn midnight(y: i32, m: u32, d: u32) -> NaiveDateTime {
    NaiveDate::from_ymd_opt(y, m, d)
        .unwrap()
        .and_time(NaiveTime::MIN)
}

/// Monthly mean of the synthetic radiation series (MJ/m² per day).
pub fn monthly_mean(month: u32) -> f64 {
    16.0 + 8.0 * (2.0 * PI * (f64::from(month) - 3.5) / 12.0).sin()
}

/// Monthly standard deviation of the synthetic series.
pub fn monthly_sd(month: u32) -> f64 {
    2.5 + 1.0 * (2.0 * PI * (f64::from(month) - 3.5) / 12.0).sin()
}

/// Daily series whose standardized values follow a Gaussian AR(1) with
/// coefficient [`PHI`] and whose mean and spread vary by month.
pub fn seasonal_ar1_series(start: NaiveDate, days: i64, seed: u64) -> ObservedSeries {
    let mut rng = StdRng::seed_from_u64(seed);
    let innovation_sd = (1.0 - PHI * PHI).sqrt();
    let mut z: f64 = StandardNormal.sample(&mut rng);
    let mut dates = Vec::with_capacity(days as usize);
    let mut values = Vec::with_capacity(days as usize);
    for d in 0..days {
        let date = start + TimeDelta::days(d);
        let eps: f64 = StandardNormal.sample(&mut rng);
        z = PHI * z + innovation_sd * eps;
        dates.push(date);
        values.push(monthly_mean(date.month()) + monthly_sd(date.month()) * z);
    }
    ObservedSeries::from_daily(&dates, &values).unwrap()
}

/// Ten years of synthetic daily history, 2010-01-01 to 2019-12-31.
pub fn ten_year_history() -> ObservedSeries {
    let start = NaiveDate::from_ymd_opt(2010, 1, 1).unwrap();
    let end = NaiveDate::from_ymd_opt(2019, 12, 31).unwrap();
    seasonal_ar1_series(start, (end - start).num_days() + 1, 1995)
}

/// Three years of synthetic daily history, 2017-01-01 to 2019-12-31.
pub fn three_year_history() -> ObservedSeries {
    let start = NaiveDate::from_ymd_opt(2017, 1, 1).unwrap();
    let end = NaiveDate::from_ymd_opt(2019, 12, 31).unwrap();
    seasonal_ar1_series(start, (end - start).num_days() + 1, 1995)
}

/// Monthly model of `family` fitted to [`three_year_history`] at the
/// default lag.
pub fn three_year_monthly_model(family: DistributionFamily) -> FittedModel {
    let options = AnalysisOptions {
        scheme: SeasonScheme::Month,
        family,
        ..AnalysisOptions::default()
    };
    analyze_with(&three_year_history(), &options).unwrap()
}

/// Monthly normal model of order 1 fitted to [`ten_year_history`].
pub fn monthly_ar1_model() -> FittedModel {
    let options = AnalysisOptions {
        scheme: SeasonScheme::Month,
        max_lag: 1,
        ..AnalysisOptions::default()
    };
    analyze_with(&ten_year_history(), &options).unwrap()
}

/// Request for `nsim` replicates over `[from, to]` with the default policy.
pub fn request(from: NaiveDateTime, to: NaiveDateTime, nsim: usize, seed: u64) -> EnsembleRequest {
    EnsembleRequest {
        from,
        to,
        nsim,
        seed,
        parallel: true,
        policy: MissingSeasonPolicy::Fail,
    }
}

/// Unwraps a simulated ensemble, panicking on `AlreadyCovered`.
pub fn simulated(outcome: EnsembleOutcome) -> Ensemble {
    match outcome {
        EnsembleOutcome::Simulated(ensemble) => ensemble,
        EnsembleOutcome::AlreadyCovered { last_historical } => {
            panic!("expected a simulation, history ends at {last_historical}")
        }
    }
}
