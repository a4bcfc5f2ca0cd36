//! irradiance-sim entry point: CLI wiring and config-driven analysis and simulation.

use std::fmt::Display;
use std::path::{Path, PathBuf};
use std::process;

use irradiance_sim::analysis::analyze_with;
use irradiance_sim::config::RunConfig;
use irradiance_sim::io::export::export_csv;
use irradiance_sim::io::import::{ImportError, load_series};
use irradiance_sim::model::FittedModel;
use irradiance_sim::report::ModelReport;
use irradiance_sim::sim::{EnsembleOutcome, EnsembleSummary, SimulatedSeries, run_ensemble};
use tracing_subscriber::EnvFilter;

/// Parsed CLI arguments.
struct CliArgs {
    config_path: Option<String>,
    preset: Option<String>,
    input: Option<String>,
    seed_override: Option<u64>,
    nsim_override: Option<usize>,
    out: Option<String>,
    #[cfg(feature = "api")]
    serve: bool,
    #[cfg(feature = "api")]
    port: u16,
}

fn print_help() {
    eprintln!("irradiance-sim: seasonal stochastic simulation of solar radiation series");
    eprintln!();
    eprintln!("Usage: irradiance-sim [OPTIONS]");
    eprintln!();
    eprintln!("Options:");
    eprintln!("  --config <path>          Load run configuration from TOML file");
    eprintln!(
        "  --preset <name>          Use a built-in preset ({})",
        RunConfig::PRESETS.join(", ")
    );
    eprintln!("  --input <csv>            Override the historical series CSV");
    eprintln!("  --seed <u64>             Override random seed");
    eprintln!("  --nsim <n>               Override number of replicates");
    eprintln!("  --out <path>             Override simulated ensemble CSV path");
    #[cfg(feature = "api")]
    {
        eprintln!("  --serve                  Start REST API server after simulation");
        eprintln!("  --port <u16>             API server port (default: 3000)");
    }
    eprintln!("  --help                   Show this help message");
    eprintln!();
    eprintln!("If no --config or --preset is given, the baseline preset is used.");
    eprintln!("Log verbosity follows RUST_LOG (default: info).");
}

/// Returns the value following flag `args[*i]`, exiting if it is missing.
fn flag_value(args: &[String], i: &mut usize, what: &str) -> String {
    let flag = &args[*i];
    *i += 1;
    if *i >= args.len() {
        eprintln!("error: {flag} requires {what}");
        process::exit(1);
    }
    args[*i].clone()
}

fn parse_args() -> CliArgs {
    let args: Vec<String> = std::env::args().collect();
    let mut cli = CliArgs {
        config_path: None,
        preset: None,
        input: None,
        seed_override: None,
        nsim_override: None,
        out: None,
        #[cfg(feature = "api")]
        serve: false,
        #[cfg(feature = "api")]
        port: 3000,
    };

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--help" | "-h" => {
                print_help();
                process::exit(0);
            }
            "--config" => cli.config_path = Some(flag_value(&args, &mut i, "a path argument")),
            "--preset" => cli.preset = Some(flag_value(&args, &mut i, "a name argument")),
            "--input" => cli.input = Some(flag_value(&args, &mut i, "a path argument")),
            "--out" => cli.out = Some(flag_value(&args, &mut i, "a path argument")),
            "--seed" => {
                let v = flag_value(&args, &mut i, "a u64 argument");
                if let Ok(s) = v.parse::<u64>() {
                    cli.seed_override = Some(s);
                } else {
                    eprintln!("error: --seed value \"{v}\" is not a valid u64");
                    process::exit(1);
                }
            }
            "--nsim" => {
                let v = flag_value(&args, &mut i, "a count argument");
                if let Ok(n) = v.parse::<usize>() {
                    cli.nsim_override = Some(n);
                } else {
                    eprintln!("error: --nsim value \"{v}\" is not a valid count");
                    process::exit(1);
                }
            }
            #[cfg(feature = "api")]
            "--serve" => {
                cli.serve = true;
            }
            #[cfg(feature = "api")]
            "--port" => {
                let v = flag_value(&args, &mut i, "a u16 argument");
                if let Ok(p) = v.parse::<u16>() {
                    cli.port = p;
                } else {
                    eprintln!("error: --port value \"{v}\" is not a valid u16");
                    process::exit(1);
                }
            }
            other => {
                eprintln!("error: unknown argument \"{other}\"");
                print_help();
                process::exit(1);
            }
        }
        i += 1;
    }

    cli
}

/// Loads the configuration selected on the command line and applies overrides.
fn load_config(cli: &CliArgs) -> RunConfig {
    // --config takes priority, then --preset, then baseline default
    let loaded = if let Some(ref path) = cli.config_path {
        RunConfig::from_toml_file(Path::new(path))
    } else if let Some(ref name) = cli.preset {
        RunConfig::from_preset(name)
    } else {
        Ok(RunConfig::baseline())
    };
    let mut cfg = loaded.unwrap_or_else(|e| {
        eprintln!("{e}");
        process::exit(1);
    });

    if let Some(ref input) = cli.input {
        cfg.input.path = PathBuf::from(input);
    }
    if let Some(seed) = cli.seed_override {
        cfg.simulation.seed = seed;
    }
    if let Some(nsim) = cli.nsim_override {
        cfg.simulation.nsim = nsim;
    }
    if let Some(ref out) = cli.out {
        cfg.output.csv = PathBuf::from(out);
    }

    let errors = cfg.validate();
    if !errors.is_empty() {
        for e in &errors {
            eprintln!("{e}");
        }
        process::exit(1);
    }
    cfg
}

fn fail(e: impl Display) -> ! {
    eprintln!("error: {e}");
    process::exit(1);
}

/// Loads, fits and simulates; returns the model and the simulated replicates.
fn run(cfg: &RunConfig) -> (FittedModel, Vec<SimulatedSeries>) {
    let aggregation = cfg.aggregation().unwrap_or_else(|e| fail(e));
    let options = cfg.analysis_options().unwrap_or_else(|e| fail(e));
    let request = cfg.ensemble_request().unwrap_or_else(|e| fail(e));
    let report_kind = cfg.report_kind().unwrap_or_else(|e| fail(e));

    let series = load_series(
        &cfg.input.path,
        &cfg.input.date_column,
        &cfg.input.value_column,
    )
    .and_then(|s| s.aggregate(aggregation).map_err(ImportError::from))
    .unwrap_or_else(|e| fail(e));
    tracing::info!(
        path = %cfg.input.path.display(),
        observations = series.len(),
        "loaded historical series"
    );

    let model = analyze_with(&series, &options).unwrap_or_else(|e| fail(e));
    println!("{}", ModelReport::from_model(&model).with_kind(report_kind));

    let ensemble = match run_ensemble(&model, &request).unwrap_or_else(|e| fail(e)) {
        EnsembleOutcome::AlreadyCovered { last_historical } => {
            println!("\nno simulation needed: history already covers the range (last observation {last_historical})");
            return (model, Vec::new());
        }
        EnsembleOutcome::Simulated(ensemble) => ensemble,
    };

    for (id, e) in &ensemble.failures {
        eprintln!("error: replicate {id} failed: {e}");
    }
    if ensemble.replicates.is_empty() {
        eprintln!("error: every replicate failed");
        process::exit(1);
    }

    let summary = EnsembleSummary::from_replicates(&model, &ensemble.replicates);
    println!("\n{summary}");

    if let Err(e) = export_csv(&ensemble.replicates, &cfg.output.csv) {
        eprintln!("error: failed to write CSV: {e}");
        process::exit(1);
    }
    eprintln!("Simulated ensemble written to {}", cfg.output.csv.display());

    (model, ensemble.replicates)
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let cli = parse_args();
    let cfg = load_config(&cli);

    #[cfg_attr(not(feature = "api"), expect(unused_variables))]
    let (model, replicates) = run(&cfg);

    // Start API server if requested
    #[cfg(feature = "api")]
    if cli.serve {
        use std::net::SocketAddr;
        use std::sync::Arc;

        let state = Arc::new(irradiance_sim::api::AppState::new(model, replicates));
        let addr = SocketAddr::from(([0, 0, 0, 0], cli.port));
        let rt = tokio::runtime::Runtime::new().unwrap_or_else(|e| {
            eprintln!("error: failed to create tokio runtime: {e}");
            process::exit(1);
        });
        if let Err(e) = rt.block_on(irradiance_sim::api::serve(state, addr)) {
            eprintln!("error: server failed: {e}");
            process::exit(1);
        }
    }
}
