//! @ai:module:intent CLI for the run metrics pipeline
//! @ai:module:layer presentation

use anyhow::Result;
use clap::{Parser, Subcommand};
use runmetrics::{
    collector::{correlation_chart, histogram_charts, write_outputs, BatchCollector},
    compare::scatter_charts,
    config::PipelineConfig,
    derive::DerivationEngine,
    align::TableAligner,
    BatchComparator, ExclusionEvaluator, MetricFrame, MetricSchema, RunAggregator, ScatterConfig,
};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "runmetrics")]
#[command(about = "Collect, derive and compare metrics from agent evaluation runs")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Collect metric files from run directories into batch tables
    Collect {
        /// Directory containing one subdirectory per run
        #[arg(short, long)]
        work_dir: PathBuf,

        /// CSV schema of metrics to collect
        #[arg(short, long)]
        metrics: PathBuf,

        /// JSON list of exclusion criteria
        #[arg(short, long)]
        exclusion_criteria: Option<PathBuf>,

        /// Only accept metric files with the .json suffix
        #[arg(short, long)]
        strict: bool,

        /// Emit histogram and correlation plots
        #[arg(long)]
        histograms: bool,

        /// Path to configuration file
        #[arg(short, long)]
        config: Option<PathBuf>,
    },

    /// Evaluate derived quantities over a collected additive table
    Derive {
        /// additive_metrics.csv from a collect invocation
        #[arg(short, long)]
        metrics_file: PathBuf,

        /// CSV list of derivation specs
        #[arg(short, long)]
        quantities_file: PathBuf,

        /// Directory for derived_quantities.csv
        #[arg(short, long, default_value = ".")]
        output: PathBuf,
    },

    /// Compare batches: per-metric summary tables and scatter plots
    Compare {
        /// Batch tables as CSV files
        #[arg(short, long, num_args = 1..)]
        batches: Vec<PathBuf>,

        /// Labels for the batches, one per batch
        #[arg(short, long, num_args = 1..)]
        labels: Option<Vec<String>>,

        /// Where the outputs should be saved
        #[arg(short, long, default_value = ".")]
        out_dir: PathBuf,

        /// Advanced plotting parameters as a JSON file
        #[arg(short, long)]
        advanced_parameters_file: Option<PathBuf>,

        /// Write into a timestamped subdirectory of out_dir
        #[arg(long)]
        timestamped: bool,

        /// Path to configuration file
        #[arg(short, long)]
        config: Option<PathBuf>,
    },

    /// Join per-metric summary tables into one wide table
    Align {
        /// Directory containing data_<metric>.csv files
        #[arg(short, long)]
        work_dir: PathBuf,

        /// Output file name, without the .csv suffix
        #[arg(short, long)]
        table_name: String,

        /// Columns to include, in the format <metric>.<sub_metric>
        #[arg(short, long, num_args = 1..)]
        columns: Vec<String>,

        /// Key column present in every data file
        #[arg(short, long, default_value = "category")]
        key_col: String,
    },

    /// Initialize default configuration
    Init {
        /// Output path for config file
        #[arg(short, long, default_value = "runmetrics.toml")]
        output: PathBuf,
    },
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("runmetrics=info".parse()?),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Collect {
            work_dir,
            metrics,
            exclusion_criteria,
            strict,
            histograms,
            config,
        } => collect(work_dir, metrics, exclusion_criteria, strict, histograms, config),
        Commands::Derive {
            metrics_file,
            quantities_file,
            output,
        } => derive(metrics_file, quantities_file, output),
        Commands::Compare {
            batches,
            labels,
            out_dir,
            advanced_parameters_file,
            timestamped,
            config,
        } => compare(batches, labels, out_dir, advanced_parameters_file, timestamped, config),
        Commands::Align {
            work_dir,
            table_name,
            columns,
            key_col,
        } => align(work_dir, table_name, columns, key_col),
        Commands::Init { output } => init_config(output),
    }
}

/// @ai:intent Collect every run under the work directory
/// @ai:effects fs:read, fs:write
fn collect(
    work_dir: PathBuf,
    metrics: PathBuf,
    exclusion_criteria: Option<PathBuf>,
    strict: bool,
    histograms: bool,
    config: Option<PathBuf>,
) -> Result<()> {
    let mut config = load_or_default_config(config)?;
    config.collect.strict |= strict;
    config.collect.histograms |= histograms;

    let schema = MetricSchema::load(&metrics)?;
    let exclusions = match exclusion_criteria {
        Some(path) => ExclusionEvaluator::load(&path)?,
        None => ExclusionEvaluator::empty(),
    };

    let aggregator = RunAggregator::with_config(schema, exclusions, &config.collect);
    let output = BatchCollector::new(aggregator).collect(&work_dir)?;

    tracing::info!(
        "Collected {} runs, {} skipped",
        output.stats.total_runs,
        output.stats.skipped_runs
    );
    for (run_id, reason) in &output.excluded_runs {
        tracing::info!("Run {} excluded: {}", run_id, reason);
    }

    write_outputs(&output, &work_dir)?;

    if config.collect.histograms {
        histogram_charts(&output.additive, &work_dir)?;
        correlation_chart(&output.additive, &work_dir)?;
    }

    Ok(())
}

/// @ai:intent Append derived quantity columns to a collected table
/// @ai:effects fs:read, fs:write
fn derive(metrics_file: PathBuf, quantities_file: PathBuf, output: PathBuf) -> Result<()> {
    let frame = MetricFrame::read_csv(&metrics_file)?;
    let engine = DerivationEngine::load(&quantities_file)?;
    let augmented = engine.derive(&frame)?;

    std::fs::create_dir_all(&output)?;
    let out_path = output.join("derived_quantities.csv");
    augmented.write_csv(&out_path)?;
    tracing::info!("Derived quantities saved to {}", out_path.display());

    Ok(())
}

/// @ai:intent Summarize and plot each metric across batches
/// @ai:effects fs:read, fs:write
fn compare(
    batches: Vec<PathBuf>,
    labels: Option<Vec<String>>,
    out_dir: PathBuf,
    advanced_parameters_file: Option<PathBuf>,
    timestamped: bool,
    config: Option<PathBuf>,
) -> Result<()> {
    let config = load_or_default_config(config)?;

    let mut frames = Vec::with_capacity(batches.len());
    for path in &batches {
        tracing::info!("Reading batch file: {}", path.display());
        frames.push(MetricFrame::read_csv(path)?);
    }

    let scatter_config = match advanced_parameters_file {
        Some(path) => ScatterConfig::load(&path)?,
        None => ScatterConfig::default(),
    };

    let comparator = BatchComparator::new(frames, labels)?
        .with_config(scatter_config)
        .with_key_column(config.compare.key_column)
        .skip_unconfigured(config.compare.skip_unconfigured);

    let out_dir = if timestamped {
        let timestamp = chrono::Utc::now().format("%Y-%m-%d_%H-%M-%S");
        out_dir.join(timestamp.to_string())
    } else {
        out_dir
    };
    std::fs::create_dir_all(&out_dir)?;

    let tables = comparator.write_summaries(&out_dir)?;
    let plots = scatter_charts(&comparator, &out_dir)?;
    tracing::info!(
        "Wrote {} summary tables and {} plots to {}",
        tables.len(),
        plots.len(),
        out_dir.display()
    );

    Ok(())
}

/// @ai:intent Join summary tables into one wide table
/// @ai:effects fs:read, fs:write
fn align(work_dir: PathBuf, table_name: String, columns: Vec<String>, key_col: String) -> Result<()> {
    let aligner = TableAligner::new(key_col, &columns)?;
    let out_path = aligner.run(&work_dir, &table_name)?;
    tracing::info!("Aligned table saved to {}", out_path.display());
    Ok(())
}

/// @ai:intent Write a default configuration file
/// @ai:effects fs:write
fn init_config(output: PathBuf) -> Result<()> {
    let config = PipelineConfig::default();
    config.save(&output)?;
    tracing::info!("Default configuration written to {}", output.display());
    Ok(())
}

/// @ai:intent Load a configuration file, or defaults when none is given
/// @ai:effects fs:read
fn load_or_default_config(path: Option<PathBuf>) -> Result<PipelineConfig> {
    match path {
        Some(path) => Ok(PipelineConfig::load(&path)?),
        None => Ok(PipelineConfig::default()),
    }
}
