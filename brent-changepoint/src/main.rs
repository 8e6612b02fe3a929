//! Brent change-point analysis CLI.
//!
//! Usage:
//! ```bash
//! # Detect change points and correlate them with events
//! brent-changepoint analyze --prices data/BrentOilPrices.csv --events data/events.csv
//!
//! # Check a price file for gaps, duplicates and bad values
//! brent-changepoint validate --prices data/BrentOilPrices.csv --config config/default.toml
//!
//! # Descriptive statistics and volatility regime
//! brent-changepoint summary --prices data/BrentOilPrices.csv --start 2020-01-01
//! ```

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use brent_changepoint::data::{parse_date, DataLoader};
use brent_changepoint::preprocess::{PriceSeries, SeriesSummary};
use brent_changepoint::regime::{VolatilityConfig, VolatilityRegimeClassifier};
use brent_changepoint::validation::SeriesIntegrityValidator;
use brent_changepoint::{AnalysisReport, EngineConfig, RegimeEngine};
use clap::{Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};

#[derive(Parser)]
#[command(name = "brent-changepoint")]
#[command(about = "Bayesian change-point detection and event impact analysis for Brent crude")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the full pipeline and write a JSON report
    Analyze {
        /// Price file (CSV or Parquet) with Date and Price columns
        #[arg(short, long)]
        prices: PathBuf,

        /// Event catalog CSV
        #[arg(short, long)]
        events: Option<PathBuf>,

        /// Engine configuration (TOML)
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Where to write the JSON report
        #[arg(short, long, default_value = "results/analysis.json")]
        output: PathBuf,

        /// Random seed for the sampler (overrides the config)
        #[arg(long)]
        seed: Option<u64>,
    },

    /// Run data integrity checks on a price file
    Validate {
        #[arg(short, long)]
        prices: PathBuf,

        /// Engine configuration (TOML); thresholds come from `[validation]`
        #[arg(short, long)]
        config: Option<PathBuf>,
    },

    /// Print descriptive statistics and volatility regimes
    Summary {
        #[arg(short, long)]
        prices: PathBuf,

        /// Rolling window for volatility
        #[arg(short, long, default_value_t = 30)]
        window: usize,

        /// First date to include
        #[arg(long)]
        start: Option<String>,

        /// Last date to include
        #[arg(long)]
        end: Option<String>,
    },
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("brent_changepoint=info".parse()?),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Analyze {
            prices,
            events,
            config,
            output,
            seed,
        } => run_analyze(prices, events, config, output, seed),
        Commands::Validate { prices, config } => run_validate(prices, config),
        Commands::Summary {
            prices,
            window,
            start,
            end,
        } => run_summary(prices, window, start, end),
    }
}

fn run_analyze(
    prices: PathBuf,
    events: Option<PathBuf>,
    config: Option<PathBuf>,
    output: PathBuf,
    seed: Option<u64>,
) -> Result<()> {
    let mut engine_config = load_config(config.as_deref())?;
    if let Some(seed) = seed {
        engine_config = engine_config.with_seed(seed);
    }
    let engine = RegimeEngine::new(engine_config)?;

    let pb = ProgressBar::new_spinner();
    pb.set_style(ProgressStyle::default_spinner().template("{spinner:.green} [{elapsed_precise}] {msg}")?);
    pb.set_message("Sampling change points...");
    pb.enable_steady_tick(Duration::from_millis(120));

    let result = engine.analyze_files(&prices, events.as_deref());
    pb.finish_and_clear();
    let report = result.context("Analysis failed")?;

    if let Some(parent) = output.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create {}", parent.display()))?;
    }
    let json = serde_json::to_string_pretty(&report)?;
    fs::write(&output, json).with_context(|| format!("Failed to write {}", output.display()))?;

    print_report(&report);
    println!("\nReport written to {}", output.display());
    Ok(())
}

fn load_config(path: Option<&Path>) -> Result<EngineConfig> {
    match path {
        Some(path) => EngineConfig::from_toml_file(path)
            .with_context(|| format!("Failed to load config {}", path.display())),
        None => Ok(EngineConfig::default()),
    }
}

fn print_report(report: &AnalysisReport) {
    let s = &report.summary;
    println!("\n=== Brent Change-Point Analysis ===");
    println!("Period: {} to {} ({} prices)", s.start_date, s.end_date, s.observations);
    println!(
        "Sampler: {} chains, R-hat {}, ESS {:.0}, {:.1}s",
        report.diagnostics.chains,
        report
            .diagnostics
            .r_hat
            .map_or_else(|| "n/a".to_string(), |r| format!("{:.3}", r)),
        report.diagnostics.ess,
        report.diagnostics.elapsed_secs
    );
    match &report.convergence_error {
        Some(e) => println!("Convergence: FAILED ({})", e),
        None => println!("Convergence: ok"),
    }

    println!("\nChange points ({}):", report.change_points.len());
    for (i, cp) in report.change_points.iter().enumerate() {
        let names: Vec<&str> = report
            .events_for_change_point(i)
            .iter()
            .map(|e| e.name.as_str())
            .collect();
        println!(
            "  {}  p={:.2}  ${:.2} -> ${:.2} ({:+.1}%){}",
            cp.date,
            cp.probability,
            cp.mean_before,
            cp.mean_after,
            cp.impact_pct,
            if names.is_empty() {
                String::new()
            } else {
                format!("  [{}]", names.join("; "))
            }
        );
    }

    if !report.events.is_empty() {
        println!(
            "\nEvents matched: {}/{}",
            report.correlations.matched_count(),
            report.events.len()
        );
    }

    if let Some(vol) = &report.volatility {
        println!(
            "Current volatility: {:.1}% ({:?}, {:.2}x baseline)",
            vol.current.value * 100.0,
            vol.current.label,
            vol.current.ratio
        );
    }
}

fn run_validate(prices: PathBuf, config: Option<PathBuf>) -> Result<()> {
    let engine_config = load_config(config.as_deref())?;
    let report = SeriesIntegrityValidator::new(DataLoader::new(), engine_config.validation)
        .validate_file(&prices)
        .with_context(|| format!("Failed to load {}", prices.display()))?;

    println!("{}", report.summary());
    for check in &report.checks {
        let status = if check.passed { "PASS" } else { "FAIL" };
        println!("  [{}] {}: {}", status, check.name, check.message);
        if let Some(details) = &check.details {
            println!("         {}", details);
        }
    }

    if !report.all_passed() {
        anyhow::bail!("{} checks failed", report.failed_checks().len());
    }
    Ok(())
}

fn run_summary(
    prices: PathBuf,
    window: usize,
    start: Option<String>,
    end: Option<String>,
) -> Result<()> {
    let loaded = DataLoader::new()
        .load_prices(&prices)
        .with_context(|| format!("Failed to load {}", prices.display()))?;
    let mut series = PriceSeries::new(loaded.observations)?;

    if start.is_some() || end.is_some() {
        let start = match start {
            Some(s) => parse_date(&s).context("Invalid start date")?,
            None => series.first_date(),
        };
        let end = match end {
            Some(e) => parse_date(&e).context("Invalid end date")?,
            None => series.last_date(),
        };
        series = series.between(start, end)?;
    }

    let summary = SeriesSummary::from_series(&series, window)?;
    println!("=== Brent Price Summary ===");
    println!(
        "Period: {} to {} ({} prices)",
        summary.start_date, summary.end_date, summary.observations
    );
    println!(
        "Price: mean ${:.2}, median ${:.2}, std ${:.2}, range ${:.2} - ${:.2}",
        summary.price.mean, summary.price.median, summary.price.std, summary.price.min, summary.price.max
    );
    println!(
        "Daily return: mean {:.3}%, std {:.3}%",
        summary.returns.mean_pct, summary.returns.std_pct
    );
    if let (Some(skew), Some(kurt)) = (summary.returns.skewness, summary.returns.kurtosis) {
        println!("Skewness {:.2}, excess kurtosis {:.2}", skew, kurt);
    }
    let p = &summary.returns.percentiles;
    println!(
        "Return percentiles: p1 {:.2}%, p5 {:.2}%, p50 {:.2}%, p95 {:.2}%, p99 {:.2}%",
        p.p1, p.p5, p.p50, p.p95, p.p99
    );
    if let Some(jb) = summary.returns.jarque_bera_p {
        println!("Normality (Jarque-Bera p-value): {:.6}", jb);
    }
    if let Some(lb) = &summary.volatility_clustering {
        println!(
            "Volatility clustering (Ljung-Box, {} lags): Q {:.1}, p {:.4}{}",
            lb.lags,
            lb.statistic,
            lb.p_value,
            if lb.is_significant() { " (significant)" } else { "" }
        );
    }
    println!(
        "Trend: {:+.4} $/day, R² {:.3}",
        summary.trend.slope, summary.trend.r_squared
    );
    for ma in &summary.moving_averages {
        println!(
            "  MA{}: mean ${:.2}, std ${:.2}, range ${:.2} - ${:.2}",
            ma.window, ma.mean, ma.std, ma.min, ma.max
        );
    }
    println!("Latest: ${:.2}", summary.latest_price);
    for (label, change) in [
        ("1d", summary.change_1d_pct),
        ("5d", summary.change_5d_pct),
        ("21d", summary.change_21d_pct),
    ] {
        if let Some(c) = change {
            println!("  {} change: {:+.2}%", label, c);
        }
    }

    let classifier = VolatilityRegimeClassifier::new(VolatilityConfig {
        window,
        ..Default::default()
    });
    let vol = classifier.report(&series)?;
    println!(
        "\nVolatility baseline {:.1}%, current {:.1}% on {} ({:?})",
        vol.baseline * 100.0,
        vol.current.value * 100.0,
        vol.current_date,
        vol.current.label
    );
    for year in &vol.yearly {
        println!(
            "  {}: {:.1}% ({:?})",
            year.year,
            year.label.value * 100.0,
            year.label.label
        );
    }
    Ok(())
}
