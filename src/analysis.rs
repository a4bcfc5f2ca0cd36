//! Fitting entry point: historical series → [`FittedModel`].

use std::collections::BTreeMap;

use rayon::prelude::*;
use tracing::{debug, info, warn};

use crate::error::{Error, Result};
use crate::model::{FittedModel, HistorySpan, SeasonFit};
use crate::series::{ObservedSeries, SeasonScheme};
use crate::stats::actf::RHOZ_GRID;
use crate::stats::lsq::LeastSquares;
use crate::stats::summary::{HISTOGRAM_BINS, histogram};
use crate::stats::{
    AcsModel, ActfCoefficients, ActfPoint, ActiveCorrelationIntegrator, AutocorrelationEstimator,
    AutocorrelationTransformFitter, DensityBin, DescriptiveStats, DistributionFamily,
    FittedMarginal,
};

/// Settings of one analysis run.
#[derive(Debug, Clone, PartialEq)]
pub struct AnalysisOptions {
    pub scheme: SeasonScheme,
    pub family: DistributionFamily,
    pub acs_model: AcsModel,
    /// Highest lag of the autocorrelation structure and AR order.
    pub max_lag: usize,
    /// Fit seasons on the rayon pool.
    pub parallel: bool,
}

impl Default for AnalysisOptions {
    fn default() -> Self {
        Self {
            scheme: SeasonScheme::Month,
            family: DistributionFamily::Normal,
            acs_model: AcsModel::Empirical,
            max_lag: AutocorrelationEstimator::DEFAULT_LAG_MAX,
            parallel: true,
        }
    }
}

/// Fits a seasonal model with the empirical autocorrelation structure.
///
/// # Errors
///
/// See [`analyze_with`].
pub fn analyze(
    series: &ObservedSeries,
    scheme: SeasonScheme,
    family: DistributionFamily,
    max_lag: usize,
) -> Result<FittedModel> {
    analyze_with(
        series,
        &AnalysisOptions {
            scheme,
            family,
            max_lag,
            ..AnalysisOptions::default()
        },
    )
}

/// Fits marginals, autocorrelation structures and correlation transforms
/// for every season present in `series`.
///
/// Seasons are fitted first, so a season without enough usable values is
/// reported as such before the autocorrelation is estimated. Any season
/// failing to fit fails the whole call; errors are reported for the lowest
/// failing season label so the outcome does not depend on scheduling.
///
/// The target-domain autocorrelation is estimated once on the
/// season-standardised series and shared by every season; seasons differ
/// through their marginal and hence their correlation transform.
///
/// # Errors
///
/// * `FrequencyInference` when the sampling step cannot be inferred
/// * `InsufficientData` / `DegenerateSample` from marginal fitting
/// * `IntegrationDidNotConverge` / `FitDidNotConverge` from the transform
///   or a parametric structure
/// * `NonStationaryStructure` when a season's Gaussian ACF is not valid
pub fn analyze_with(series: &ObservedSeries, options: &AnalysisOptions) -> Result<FittedModel> {
    let frequency = series.infer_frequency()?;

    let mut samples: BTreeMap<u32, Vec<f64>> = BTreeMap::new();
    for o in series.observations() {
        samples
            .entry(options.scheme.label(o.timestamp))
            .or_default()
            .push(o.value);
    }
    let work: Vec<(u32, Vec<f64>)> = samples.into_iter().collect();

    info!(
        observations = series.len(),
        seasons = work.len(),
        scheme = %options.scheme,
        family = %options.family,
        acs = %options.acs_model,
        max_lag = options.max_lag,
        "analyzing series"
    );

    let solver = LeastSquares::default();
    let fit = |(season, values): &(u32, Vec<f64>)| fit_season(*season, values, options, &solver);
    let results: Vec<Result<SeasonMarginal>> = if options.parallel {
        work.par_iter().map(fit).collect()
    } else {
        work.iter().map(fit).collect()
    };
    let fitted: Vec<SeasonMarginal> = results.into_iter().collect::<Result<_>>()?;

    let estimator = AutocorrelationEstimator::new(options.max_lag);
    let overall_acf = estimator.estimate(&series.values())?;
    let seasonal_acf = estimator.estimate_seasonal(series, frequency, options.scheme)?;
    let acs = options.acs_model.fit(&seasonal_acf, &solver)?;
    let max_lag = match options.acs_model {
        AcsModel::Empirical => options.max_lag.min(seasonal_acf.max_lag()),
        _ => options.max_lag,
    };
    debug!(
        lag1 = seasonal_acf.at(1).unwrap_or(0.0),
        lags = seasonal_acf.max_lag(),
        "estimated season-standardised autocorrelation"
    );

    let seasons: BTreeMap<u32, SeasonFit> = fitted
        .into_iter()
        .map(|m| {
            let fit = SeasonFit {
                season: m.season,
                histogram: m.histogram,
                stats: m.stats,
                marginal: m.marginal,
                acs: acs.clone(),
                actf_points: m.actf_points,
                actf: m.actf,
            };
            (m.season, fit)
        })
        .collect();

    let model = FittedModel {
        scheme: options.scheme,
        family: options.family,
        acs_model: options.acs_model,
        max_lag,
        history: HistorySpan {
            first: series.first_timestamp(),
            last: series.last_timestamp(),
            frequency,
        },
        overall_acf,
        seasons,
    };
    for (season, ar) in model.ar_structures()? {
        if ar.order() < max_lag {
            warn!(
                season,
                order = ar.order(),
                max_lag,
                "gaussian autocorrelation is not valid beyond this order; AR order reduced"
            );
        }
    }
    info!(seasons = model.seasons.len(), max_lag, "analysis complete");
    Ok(model)
}

/// Per-season part of a fit, before the shared structure is attached.
struct SeasonMarginal {
    season: u32,
    stats: DescriptiveStats,
    histogram: Vec<DensityBin>,
    marginal: FittedMarginal,
    actf_points: Vec<ActfPoint>,
    actf: ActfCoefficients,
}

fn fit_season(
    season: u32,
    values: &[f64],
    options: &AnalysisOptions,
    solver: &LeastSquares,
) -> Result<SeasonMarginal> {
    let marginal = FittedMarginal::fit(options.family, values, season)?;
    let stats = DescriptiveStats::from_values(values).ok_or(Error::EmptySeries)?;

    let integrator = ActiveCorrelationIntegrator::new(marginal)?;
    let actf_points = integrator.points(&RHOZ_GRID)?;
    let actf = AutocorrelationTransformFitter::new(*solver).fit(&actf_points, season)?;

    debug!(
        season,
        count = stats.count,
        mean = stats.mean,
        p0 = marginal.p0,
        b = actf.b,
        c = actf.c,
        "fitted season"
    );

    Ok(SeasonMarginal {
        season,
        histogram: histogram(values, HISTOGRAM_BINS),
        stats,
        marginal,
        actf_points,
        actf,
    })
}
