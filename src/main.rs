//! Cultivar - Main Entry Point
//!
//! Loads a CSV dataset, runs the benchmarking pipeline, and prints the
//! screening, comparison, and evaluation summaries.

use clap::Parser;
use cultivar::data::DatasetReader;
use cultivar::pipeline::{self, PipelineReport};
use cultivar::PipelineConfig;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "cultivar", about = "Cross-validated classifier benchmarking for tabular data")]
struct Cli {
    /// Path to the CSV dataset
    data: PathBuf,

    /// Name of the label column
    #[arg(long)]
    label: String,

    /// Comma-separated feature columns (default: every numeric column)
    #[arg(long)]
    features: Option<String>,

    /// Comma-separated closed set of allowed label values (default: the
    /// distinct values found in the label column)
    #[arg(long)]
    classes: Option<String>,

    /// Fraction of samples assigned to training
    #[arg(long, default_value_t = 0.7)]
    split_fraction: f64,

    /// Master random seed
    #[arg(long, default_value_t = 42)]
    seed: u64,

    /// Cross-validation folds
    #[arg(long, default_value_t = 5)]
    folds: usize,

    /// Cross-validation repeats
    #[arg(long, default_value_t = 5)]
    repeats: usize,

    /// Candidates for each family's primary hyperparameter
    #[arg(long, default_value_t = 10)]
    grid_size: usize,

    /// Cap on candidates for a family's secondary hyperparameter
    #[arg(long, default_value_t = 6)]
    max_secondary: usize,

    /// Absolute correlation cutoff for the screening recommendation
    #[arg(long, default_value_t = 0.75)]
    correlation_cutoff: f64,

    /// Frequency-ratio cutoff for near-zero-variance flagging
    #[arg(long, default_value_t = 19.0)]
    nzv_freq_ratio: f64,

    /// Percent-unique cutoff for near-zero-variance flagging
    #[arg(long, default_value_t = 10.0)]
    nzv_unique_pct: f64,

    /// Worker threads (default: available parallelism)
    #[arg(long)]
    workers: Option<usize>,

    /// Also write the full report as JSON to this path
    #[arg(long)]
    report: Option<PathBuf>,
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "cultivar=info".into()),
        )
        .init();

    let cli = Cli::parse();

    let mut reader = DatasetReader::new(&cli.label);
    if let Some(features) = &cli.features {
        let columns: Vec<String> = features.split(',').map(|s| s.trim().to_string()).collect();
        reader = reader.with_feature_columns(columns);
    }
    if let Some(classes) = &cli.classes {
        let allowed: Vec<String> = classes.split(',').map(|s| s.trim().to_string()).collect();
        reader = reader.with_allowed_labels(allowed);
    }
    let dataset = reader.read_csv(&cli.data.to_string_lossy())?;

    let mut config = PipelineConfig::new()
        .with_split_fraction(cli.split_fraction)
        .with_seed(cli.seed)
        .with_resampling(cli.folds, cli.repeats)
        .with_grid_size(cli.grid_size)
        .with_correlation_cutoff(cli.correlation_cutoff);
    config.max_secondary_candidates = cli.max_secondary;
    config.nzv_freq_ratio = cli.nzv_freq_ratio;
    config.nzv_unique_pct = cli.nzv_unique_pct;
    if let Some(workers) = cli.workers {
        config = config.with_workers(workers);
    }

    let report = pipeline::run(&dataset, &config)?;
    print_report(&report);

    if let Some(path) = &cli.report {
        let json = serde_json::to_string_pretty(&report)?;
        std::fs::write(path, json)?;
        println!("\nFull report written to {}", path.display());
    }

    Ok(())
}

fn print_report(report: &PipelineReport) {
    println!(
        "Partition: {} train / {} test",
        report.partition.train_size(),
        report.partition.test_size()
    );

    println!("\nPredictor screening:");
    println!(
        "{:<20} {:>10} {:>12} {:>6}",
        "predictor", "freq ratio", "pct unique", "nzv"
    );
    for v in &report.screening.variance {
        println!(
            "{:<20} {:>10.2} {:>12.2} {:>6}",
            v.predictor,
            v.freq_ratio,
            v.percent_unique,
            if v.near_zero_variance { "yes" } else { "no" }
        );
    }
    if report.screening.correlated_predictors.is_empty() {
        println!("No predictors exceed the correlation cutoff.");
    } else {
        println!(
            "Recommended for removal (correlated): {}",
            report.screening.correlated_predictors.join(", ")
        );
    }

    println!("\nCross-validated accuracy:");
    println!(
        "{:<15} {:>7} {:>7} {:>7} {:>7} {:>7} {:>7} {:>7}",
        "model", "mean", "std", "min", "q1", "median", "q3", "max"
    );
    for s in &report.comparison.summaries {
        println!(
            "{:<15} {:>7.4} {:>7.4} {:>7.4} {:>7.4} {:>7.4} {:>7.4} {:>7.4}",
            s.family.name(),
            s.mean,
            s.std,
            s.min,
            s.q1,
            s.median,
            s.q3,
            s.max
        );
    }
    for result in &report.results {
        println!("{} selected: {}", result.family.name(), result.best_params());
    }
    for skipped in &report.skipped {
        println!("{} skipped: {}", skipped.family.name(), skipped.reason);
    }

    println!("\nTest-set evaluation ({}):", report.best_family.name());
    let confusion = &report.evaluation.confusion;
    print!("{:<12}", "");
    for name in confusion.class_names() {
        print!("{:>12}", name);
    }
    println!();
    for (i, name) in confusion.class_names().iter().enumerate() {
        print!("{:<12}", name);
        for j in 0..confusion.class_names().len() {
            print!("{:>12}", confusion.counts()[[i, j]]);
        }
        println!();
    }

    println!(
        "\n{:<12} {:>12} {:>12} {:>12} {:>12}",
        "class", "sensitivity", "specificity", "precision", "npv"
    );
    for m in &report.evaluation.per_class {
        println!(
            "{:<12} {:>12} {:>12} {:>12} {:>12}",
            m.class,
            fmt_opt(m.sensitivity),
            fmt_opt(m.specificity),
            fmt_opt(m.precision),
            fmt_opt(m.negative_predictive_value)
        );
    }

    let (lo, hi) = report.evaluation.accuracy_ci;
    println!(
        "\nAccuracy: {:.4} (95% CI {:.4} - {:.4})",
        report.evaluation.accuracy, lo, hi
    );
}

fn fmt_opt(value: Option<f64>) -> String {
    match value {
        Some(v) => format!("{:.4}", v),
        None => "NA".to_string(),
    }
}
