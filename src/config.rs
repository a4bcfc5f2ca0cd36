//! TOML-based run configuration and preset definitions.

use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use chrono::NaiveDateTime;
use serde::Deserialize;

use crate::analysis::AnalysisOptions;
use crate::io::import::parse_timestamp;
use crate::report::ReportKind;
use crate::series::{Aggregation, SeasonScheme};
use crate::sim::{EnsembleRequest, MissingSeasonPolicy};
use crate::stats::{AcsModel, DistributionFamily};

/// Top-level run configuration parsed from TOML.
///
/// All fields have defaults matching the baseline run. Load from TOML with
/// [`RunConfig::from_toml_file`] or use [`RunConfig::baseline`] for the
/// built-in default.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RunConfig {
    /// Historical input series.
    #[serde(default)]
    pub input: InputConfig,
    /// Seasonal fitting parameters.
    #[serde(default)]
    pub analysis: AnalysisConfig,
    /// Ensemble simulation parameters.
    #[serde(default)]
    pub simulation: SimulationConfig,
    /// Output destinations.
    #[serde(default)]
    pub output: OutputConfig,
}

/// Historical input series.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct InputConfig {
    /// CSV file holding the observed series.
    pub path: PathBuf,
    /// Name of the timestamp column.
    pub date_column: String,
    /// Name of the value column.
    pub value_column: String,
    /// Resampling applied before analysis: `"none"`, `"daily_sum"` or `"daily_mean"`.
    pub aggregation: String,
}

impl Default for InputConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("data/sample_daily.csv"),
            date_column: "date".to_string(),
            value_column: "value".to_string(),
            aggregation: "none".to_string(),
        }
    }
}

/// Seasonal fitting parameters.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AnalysisConfig {
    /// Season scheme: `"month"`, `"quarter"`, `"week"` or `"none"`.
    pub season: String,
    /// Marginal family: `"normal"`, `"gamma"`, `"beta"` or `"lognormal"`.
    pub distribution: String,
    /// Autocorrelation structure: `"empirical"`, `"ar1"`, `"weibull"`,
    /// `"paretoII"`, `"fgn"` or `"burrXII"`.
    pub acs: String,
    /// Highest autocorrelation lag, also the AR order (must be > 0).
    pub lag_max: usize,
    /// Fit seasons in parallel.
    pub parallel: bool,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            season: "month".to_string(),
            distribution: "normal".to_string(),
            acs: "empirical".to_string(),
            lag_max: 30,
            parallel: true,
        }
    }
}

/// Ensemble simulation parameters.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SimulationConfig {
    /// First requested date (`YYYY-MM-DD` or `YYYY-MM-DD HH:MM:SS`).
    pub from: String,
    /// Last requested date, inclusive.
    pub to: String,
    /// Number of replicates (must be > 0).
    pub nsim: usize,
    /// Master random seed.
    pub seed: u64,
    /// Policy for dates of unobserved seasons: `"fail"` or `"skip"`.
    pub missing_season: String,
    /// Run replicates in parallel.
    pub parallel: bool,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            from: "2020-01-01".to_string(),
            to: "2020-12-31".to_string(),
            nsim: 10,
            seed: 1995,
            missing_season: "fail".to_string(),
            parallel: true,
        }
    }
}

/// Output destinations.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct OutputConfig {
    /// CSV file receiving the simulated ensemble.
    pub csv: PathBuf,
    /// Report printed to stdout: `"stat"`, `"dist"` or `"acs"`.
    pub report: String,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            csv: PathBuf::from("simulated.csv"),
            report: "stat".to_string(),
        }
    }
}

/// Configuration error with field path and constraint description.
#[derive(Debug)]
pub struct ConfigError {
    /// Dotted field path (e.g., `"simulation.nsim"`).
    pub field: String,
    /// Human-readable constraint description.
    pub message: String,
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "config error: {}: {}", self.field, self.message)
    }
}

/// Parses a tag field, mapping the crate error into a [`ConfigError`].
fn parse_field<T>(field: &str, value: &str) -> Result<T, ConfigError>
where
    T: FromStr<Err = crate::error::Error>,
{
    value.parse().map_err(|e: crate::error::Error| ConfigError {
        field: field.to_string(),
        message: e.to_string(),
    })
}

fn parse_date_field(field: &str, value: &str) -> Result<NaiveDateTime, ConfigError> {
    parse_timestamp(value).ok_or_else(|| ConfigError {
        field: field.to_string(),
        message: format!("cannot parse \"{value}\" as a date"),
    })
}

impl RunConfig {
    /// Returns the baseline run: normal marginal, monthly seasons,
    /// empirical autocorrelation up to lag 30.
    pub fn baseline() -> Self {
        Self {
            input: InputConfig::default(),
            analysis: AnalysisConfig::default(),
            simulation: SimulationConfig::default(),
            output: OutputConfig::default(),
        }
    }

    /// Returns the zero-inflated preset: gamma marginal with a point mass
    /// at zero, for series containing dry or overcast days.
    pub fn zero_inflated() -> Self {
        Self {
            analysis: AnalysisConfig {
                distribution: "gamma".to_string(),
                lag_max: 10,
                ..AnalysisConfig::default()
            },
            output: OutputConfig {
                report: "dist".to_string(),
                ..OutputConfig::default()
            },
            ..Self::baseline()
        }
    }

    /// Returns the parametric-ACS preset: normal marginal with a Weibull
    /// autocorrelation structure.
    pub fn parametric_acs() -> Self {
        Self {
            analysis: AnalysisConfig {
                acs: "weibull".to_string(),
                ..AnalysisConfig::default()
            },
            output: OutputConfig {
                report: "acs".to_string(),
                ..OutputConfig::default()
            },
            ..Self::baseline()
        }
    }

    /// Available preset names.
    pub const PRESETS: &[&str] = &["baseline", "zero_inflated", "parametric_acs"];

    /// Loads a configuration from a named preset.
    ///
    /// # Errors
    ///
    /// Returns a `ConfigError` if the preset name is unknown.
    pub fn from_preset(name: &str) -> Result<Self, ConfigError> {
        match name {
            "baseline" => Ok(Self::baseline()),
            "zero_inflated" => Ok(Self::zero_inflated()),
            "parametric_acs" => Ok(Self::parametric_acs()),
            _ => Err(ConfigError {
                field: "preset".to_string(),
                message: format!(
                    "unknown preset \"{name}\", available: {}",
                    Self::PRESETS.join(", ")
                ),
            }),
        }
    }

    /// Parses a configuration from a TOML file.
    ///
    /// # Errors
    ///
    /// Returns a `ConfigError` if the file cannot be read or the TOML is invalid.
    pub fn from_toml_file(path: &Path) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path).map_err(|e| ConfigError {
            field: "config".to_string(),
            message: format!("cannot read \"{}\": {e}", path.display()),
        })?;
        Self::from_toml_str(&content)
    }

    /// Parses a configuration from a TOML string.
    ///
    /// # Errors
    ///
    /// Returns a `ConfigError` if the TOML is invalid or contains unknown fields.
    pub fn from_toml_str(s: &str) -> Result<Self, ConfigError> {
        toml::from_str(s).map_err(|e| ConfigError {
            field: "toml".to_string(),
            message: e.to_string(),
        })
    }

    /// Resolved input aggregation.
    ///
    /// # Errors
    ///
    /// Returns a `ConfigError` on an unknown aggregation tag.
    pub fn aggregation(&self) -> Result<Aggregation, ConfigError> {
        parse_field("input.aggregation", &self.input.aggregation)
    }

    /// Resolved report kind.
    ///
    /// # Errors
    ///
    /// Returns a `ConfigError` on an unknown report tag.
    pub fn report_kind(&self) -> Result<ReportKind, ConfigError> {
        parse_field("output.report", &self.output.report)
    }

    /// Resolves the `[analysis]` section into typed options.
    ///
    /// # Errors
    ///
    /// Returns the first `ConfigError` among the analysis tags.
    pub fn analysis_options(&self) -> Result<AnalysisOptions, ConfigError> {
        let a = &self.analysis;
        Ok(AnalysisOptions {
            scheme: parse_field::<SeasonScheme>("analysis.season", &a.season)?,
            family: parse_field::<DistributionFamily>("analysis.distribution", &a.distribution)?,
            acs_model: parse_field::<AcsModel>("analysis.acs", &a.acs)?,
            max_lag: a.lag_max,
            parallel: a.parallel,
        })
    }

    /// Resolves the `[simulation]` section into an ensemble request.
    ///
    /// # Errors
    ///
    /// Returns the first `ConfigError` among the simulation fields.
    pub fn ensemble_request(&self) -> Result<EnsembleRequest, ConfigError> {
        let s = &self.simulation;
        Ok(EnsembleRequest {
            from: parse_date_field("simulation.from", &s.from)?,
            to: parse_date_field("simulation.to", &s.to)?,
            nsim: s.nsim,
            seed: s.seed,
            parallel: s.parallel,
            policy: parse_field::<MissingSeasonPolicy>(
                "simulation.missing_season",
                &s.missing_season,
            )?,
        })
    }

    /// Validates all fields and returns a list of errors.
    ///
    /// Returns an empty vector if configuration is valid.
    pub fn validate(&self) -> Vec<ConfigError> {
        let mut errors = Vec::new();

        let i = &self.input;
        if i.date_column.trim().is_empty() {
            errors.push(ConfigError {
                field: "input.date_column".into(),
                message: "must not be empty".into(),
            });
        }
        if i.value_column.trim().is_empty() {
            errors.push(ConfigError {
                field: "input.value_column".into(),
                message: "must not be empty".into(),
            });
        }
        if let Err(e) = self.aggregation() {
            errors.push(e);
        }

        let a = &self.analysis;
        if let Err(e) = parse_field::<SeasonScheme>("analysis.season", &a.season) {
            errors.push(e);
        }
        if let Err(e) = parse_field::<DistributionFamily>("analysis.distribution", &a.distribution) {
            errors.push(e);
        }
        if let Err(e) = parse_field::<AcsModel>("analysis.acs", &a.acs) {
            errors.push(e);
        }
        if a.lag_max == 0 {
            errors.push(ConfigError {
                field: "analysis.lag_max".into(),
                message: "must be > 0".into(),
            });
        }

        let s = &self.simulation;
        let from = parse_date_field("simulation.from", &s.from);
        let to = parse_date_field("simulation.to", &s.to);
        match (from, to) {
            (Ok(from), Ok(to)) if from > to => errors.push(ConfigError {
                field: "simulation.from".into(),
                message: "must be <= simulation.to".into(),
            }),
            (from, to) => {
                errors.extend(from.err());
                errors.extend(to.err());
            }
        }
        if s.nsim == 0 {
            errors.push(ConfigError {
                field: "simulation.nsim".into(),
                message: "must be > 0".into(),
            });
        }
        if let Err(e) =
            parse_field::<MissingSeasonPolicy>("simulation.missing_season", &s.missing_season)
        {
            errors.push(e);
        }

        if let Err(e) = self.report_kind() {
            errors.push(e);
        }

        errors
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn baseline_preset_valid() {
        let cfg = RunConfig::baseline();
        let errors = cfg.validate();
        assert!(errors.is_empty(), "baseline should be valid: {errors:?}");
    }

    #[test]
    fn from_preset_unknown() {
        let err = RunConfig::from_preset("nonexistent");
        assert!(err.is_err());
        let e = err.unwrap_err();
        assert!(e.message.contains("unknown preset"));
    }

    #[test]
    fn all_presets_are_valid() {
        for name in RunConfig::PRESETS {
            let cfg = RunConfig::from_preset(name);
            assert!(cfg.is_ok(), "preset \"{name}\" should load");
            let errors = cfg.as_ref().map(|c| c.validate()).unwrap_or_default();
            assert!(
                errors.is_empty(),
                "preset \"{name}\" should be valid: {errors:?}"
            );
        }
    }

    #[test]
    fn valid_toml_parses() {
        let toml = r#"
[input]
path = "obs.csv"
date_column = "day"
value_column = "rsds"
aggregation = "daily_sum"

[analysis]
season = "quarter"
distribution = "gamma"
acs = "paretoII"
lag_max = 7
parallel = false

[simulation]
from = "2030-01-01"
to = "2030-06-30"
nsim = 25
seed = 7
missing_season = "skip"
parallel = false

[output]
csv = "out/sim.csv"
report = "acs"
"#;
        let cfg = RunConfig::from_toml_str(toml).unwrap();
        assert!(cfg.validate().is_empty());
        assert_eq!(cfg.aggregation().unwrap(), Aggregation::DailySum);

        let options = cfg.analysis_options().unwrap();
        assert_eq!(options.scheme, SeasonScheme::Quarter);
        assert_eq!(options.family, DistributionFamily::Gamma);
        assert_eq!(options.acs_model, AcsModel::ParetoII);
        assert_eq!(options.max_lag, 7);
        assert!(!options.parallel);

        let request = cfg.ensemble_request().unwrap();
        assert_eq!(request.nsim, 25);
        assert_eq!(request.seed, 7);
        assert_eq!(request.policy, MissingSeasonPolicy::Skip);
        assert!(request.from < request.to);
        assert_eq!(cfg.report_kind().unwrap(), ReportKind::Acs);
    }

    #[test]
    fn invalid_toml_unknown_field() {
        let toml = r#"
[analysis]
season = "month"
bogus_field = true
"#;
        assert!(RunConfig::from_toml_str(toml).is_err());
    }

    #[test]
    fn partial_toml_uses_defaults() {
        let toml = r#"
[simulation]
seed = 99
"#;
        let cfg = RunConfig::from_toml_str(toml).unwrap();
        assert_eq!(cfg.simulation.seed, 99);
        assert_eq!(cfg.simulation.nsim, 10);
        assert_eq!(cfg.analysis.lag_max, 30);
        assert_eq!(cfg.input.value_column, "value");
    }

    #[test]
    fn validation_collects_every_error() {
        let mut cfg = RunConfig::baseline();
        cfg.analysis.season = "fortnight".to_string();
        cfg.analysis.distribution = "weibull".to_string();
        cfg.analysis.lag_max = 0;
        cfg.simulation.nsim = 0;
        let errors = cfg.validate();
        for field in [
            "analysis.season",
            "analysis.distribution",
            "analysis.lag_max",
            "simulation.nsim",
        ] {
            assert!(
                errors.iter().any(|e| e.field == field),
                "missing error for {field}: {errors:?}"
            );
        }
    }

    #[test]
    fn validation_catches_inverted_range() {
        let mut cfg = RunConfig::baseline();
        cfg.simulation.from = "2021-01-01".to_string();
        cfg.simulation.to = "2020-01-01".to_string();
        let errors = cfg.validate();
        assert!(errors.iter().any(|e| e.field == "simulation.from"));
    }

    #[test]
    fn validation_catches_unparsable_date() {
        let mut cfg = RunConfig::baseline();
        cfg.simulation.to = "next year".to_string();
        let errors = cfg.validate();
        assert!(errors.iter().any(|e| e.field == "simulation.to"));
        assert!(cfg.ensemble_request().is_err());
    }

    #[test]
    fn validation_catches_bad_policy() {
        let mut cfg = RunConfig::baseline();
        cfg.simulation.missing_season = "interpolate".to_string();
        let errors = cfg.validate();
        assert!(errors.iter().any(|e| e.field == "simulation.missing_season"));
    }

    #[test]
    fn presets_differ_where_expected() {
        let zi = RunConfig::zero_inflated().analysis_options().unwrap();
        assert_eq!(zi.family, DistributionFamily::Gamma);
        let pa = RunConfig::parametric_acs().analysis_options().unwrap();
        assert_eq!(pa.acs_model, AcsModel::Weibull);
        assert_eq!(pa.family, DistributionFamily::Normal);
    }
}
