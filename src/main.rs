use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand};

use hawkes_tape::config::{Config, LoggingConfig};
use hawkes_tape::hawkes::{reconstruct, simulate, HawkesEstimator};
use hawkes_tape::model::HawkesParams;
use hawkes_tape::summary::IntensitySummary;
use hawkes_tape::tape_store;

#[derive(Parser)]
#[command(name = "hawkes-tape")]
#[command(author, version, about = "Fit a Hawkes process to large-trade arrivals and reconstruct its intensity", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Config file (defaults to config/default.toml when present)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Log level override (e.g. "debug"); RUST_LOG takes precedence
    #[arg(long, global = true)]
    log_level: Option<String>,
}

#[derive(Subcommand)]
enum Commands {
    /// Maximum-likelihood fit of (mu, alpha, beta) and write the parameter file
    Fit(FitArgs),
    /// Reconstruct the fitted intensity on a uniform grid and write it as CSV
    Intensity(IntensityArgs),
    /// Simulate a Hawkes tape by thinning and write it as a ts_ms CSV
    Simulate(SimulateArgs),
}

#[derive(Args)]
struct FitArgs {
    /// Large-trade tape CSV with an epoch-millisecond column
    #[arg(long)]
    events: PathBuf,

    /// Output parameter file
    #[arg(long)]
    out: PathBuf,

    /// Stability margin c enforcing alpha < c * beta
    #[arg(long)]
    margin: Option<f64>,

    /// Minimum number of events required to fit
    #[arg(long)]
    min_events: Option<usize>,

    /// Iteration cap per simplex run
    #[arg(long)]
    max_iters: Option<u64>,

    /// Initial baseline intensity (requires --alpha0 and --beta0)
    #[arg(long)]
    mu0: Option<f64>,

    #[arg(long)]
    alpha0: Option<f64>,

    #[arg(long)]
    beta0: Option<f64>,

    /// Also print the fit as JSON on stdout
    #[arg(long)]
    json: bool,
}

#[derive(Args)]
struct IntensityArgs {
    #[arg(long)]
    events: PathBuf,

    /// Parameter file written by `fit`
    #[arg(long)]
    params: PathBuf,

    /// Output CSV (t_sec, dt_utc, lambda)
    #[arg(long)]
    out: PathBuf,

    /// Grid step in whole seconds
    #[arg(long)]
    step: Option<u32>,

    /// Number of peak seconds to print
    #[arg(long)]
    top_k: Option<usize>,
}

#[derive(Args)]
struct SimulateArgs {
    #[arg(long)]
    mu: f64,

    #[arg(long)]
    alpha: f64,

    #[arg(long)]
    beta: f64,

    /// Simulated window length in seconds
    #[arg(long)]
    horizon: f64,

    #[arg(long, default_value_t = 42)]
    seed: u64,

    /// Epoch milliseconds of t = 0
    #[arg(long, default_value_t = 1_730_764_800_000)]
    start_ms: i64,

    #[arg(long)]
    out: PathBuf,
}

fn main() {
    let cli = Cli::parse();

    let mut config = match Config::load(cli.config.as_deref()) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Failed to load config: {:#}", e);
            std::process::exit(1);
        }
    };
    if let Some(level) = &cli.log_level {
        config.logging.level = level.clone();
    }
    if let Err(e) = init_tracing(&config.logging) {
        eprintln!("Failed to initialise logging: {:#}", e);
        std::process::exit(1);
    }

    let outcome = match cli.command {
        Commands::Fit(args) => run_fit(config, args),
        Commands::Intensity(args) => run_intensity(config, args),
        Commands::Simulate(args) => run_simulate(args),
    };
    if let Err(e) = outcome {
        let msg = format!("{:#}", e);
        tracing::error!(error = %msg, "Run aborted");
        eprintln!("Error: {}", msg);
        std::process::exit(1);
    }
}

fn init_tracing(logging: &LoggingConfig) -> Result<()> {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&logging.level));

    match &logging.file {
        Some(path) => {
            let log_file = std::fs::File::create(path)
                .with_context(|| format!("failed to create log file {}", path.display()))?;
            tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_writer(log_file)
                .with_ansi(false)
                .json()
                .init();
        }
        None => {
            tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_writer(std::io::stderr)
                .init();
        }
    }
    Ok(())
}

fn run_fit(mut config: Config, args: FitArgs) -> Result<()> {
    if let Some(margin) = args.margin {
        config.fit.stability_margin = margin;
    }
    if let Some(min_events) = args.min_events {
        config.fit.min_events = min_events;
    }
    if let Some(max_iters) = args.max_iters {
        config.fit.max_iters = max_iters;
    }
    config.validate()?;

    let initial = match (args.mu0, args.alpha0, args.beta0) {
        (Some(mu), Some(alpha), Some(beta)) => {
            Some(HawkesParams::new(mu, alpha, beta).context("invalid initial guess")?)
        }
        (None, None, None) => None,
        _ => bail!("--mu0, --alpha0 and --beta0 must be given together"),
    };

    let load = tape_store::load_events(&args.events, &config.events.timestamp_column)
        .with_context(|| format!("failed to load events from {}", args.events.display()))?;
    if load.dropped > 0 {
        eprintln!(
            "Dropped {} of {} rows with unusable timestamps",
            load.dropped, load.rows
        );
    }

    let estimator = HawkesEstimator::new(config.fit.clone());
    let fit = estimator.fit(&load.series, initial)?;
    let report = fit.report();
    tape_store::write_fit_report(&args.out, &report)
        .with_context(|| format!("failed to write {}", args.out.display()))?;

    println!("Fitted Hawkes (1D exponential kernel), margin {}", fit.stability_margin);
    print!("{}", report);
    println!("log_likelihood: {:.6}", fit.log_likelihood);
    if args.json {
        println!("{}", serde_json::to_string_pretty(&fit)?);
    }
    Ok(())
}

fn run_intensity(config: Config, args: IntensityArgs) -> Result<()> {
    let step = args.step.unwrap_or(config.intensity.grid_step_seconds);
    let top_k = args.top_k.unwrap_or(config.intensity.top_k);

    let report = tape_store::read_fit_report(&args.params)?;
    let load = tape_store::load_events(&args.events, &config.events.timestamp_column)
        .with_context(|| format!("failed to load events from {}", args.events.display()))?;
    warn_on_mismatch(&args.params, report.events, load.series.len());

    let series = reconstruct(&load.series, &report.params, step)?;
    tape_store::write_intensity(&args.out, &series)
        .with_context(|| format!("failed to write {}", args.out.display()))?;

    println!("Wrote: {}", args.out.display());
    if let Some(summary) = IntensitySummary::from_series(&series, top_k) {
        println!(
            "lambda: count={} min={:.6} mean={:.6} std={:.6} max={:.6}",
            summary.count, summary.min, summary.mean, summary.std, summary.max
        );
        println!("Top {} lambda seconds:", summary.peaks.len());
        for (t_sec, lambda) in &summary.peaks {
            println!("  {}  {:.6}", t_sec, lambda);
        }
    }
    Ok(())
}

fn warn_on_mismatch(params_path: &Path, fitted_events: usize, loaded_events: usize) {
    if fitted_events != loaded_events {
        tracing::warn!(
            params = %params_path.display(),
            fitted_events,
            loaded_events,
            "Event count differs from the one the parameters were fitted on"
        );
    }
}

fn run_simulate(args: SimulateArgs) -> Result<()> {
    let params = HawkesParams::new(args.mu, args.alpha, args.beta)?;
    let offsets = simulate(&params, args.horizon, args.seed)?;
    let ts_ms: Vec<i64> = offsets
        .iter()
        .map(|t| args.start_ms + (t * 1000.0).round() as i64)
        .collect();
    tape_store::write_events(&args.out, &ts_ms)
        .with_context(|| format!("failed to write {}", args.out.display()))?;
    println!("Simulated {} events into {}", ts_ms.len(), args.out.display());
    Ok(())
}
