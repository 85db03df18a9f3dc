//! yuho CLI binary.
//!
//! Resolves company names to EDINET filers and writes the indicators found in
//! their latest annual securities reports.

mod names;

use chrono::{Local, NaiveDate};
use clap::{Args, Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use std::path::{Path, PathBuf};
use std::process;
use std::time::Duration;
use tracing::info;
use tracing_subscriber::EnvFilter;
use yuho::extract::IndicatorSpec;
use yuho::output::{ExportFormat, Exporter, render_validation};
use yuho::registry::EdinetClient;
use yuho::resolve::Threshold;
use yuho::{Config, Pipeline};

#[derive(Parser)]
#[command(name = "yuho")]
#[command(about = "Extract annual securities report indicators for company names", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Resolve names, fetch their latest annual reports and extract indicators
    Run {
        #[command(flatten)]
        batch: BatchArgs,

        /// JSON file with the indicators to extract
        #[arg(long)]
        indicators: Option<PathBuf>,

        /// Write the results as CSV with a byte order mark for spreadsheet tools
        #[arg(long)]
        excel: bool,
    },

    /// Resolve names only and report similarity scores
    Validate {
        #[command(flatten)]
        batch: BatchArgs,
    },

    /// Show the indicators that would be extracted
    Indicators {
        /// JSON file with the indicators to extract
        #[arg(long)]
        indicators: Option<PathBuf>,

        /// Print the table as JSON
        #[arg(long)]
        json: bool,
    },
}

#[derive(Args)]
struct BatchArgs {
    /// Company names
    names: Vec<String>,

    /// File with one company name per line (`#` starts a comment)
    #[arg(long)]
    names_file: Option<PathBuf>,

    /// EDINET subscription key (defaults to EDINET_API_KEY)
    #[arg(long)]
    api_key: Option<String>,

    /// Minimum similarity for a name match, between 0 and 1
    #[arg(long)]
    threshold: Option<Threshold>,

    /// Days of document listings to scan
    #[arg(long)]
    days: Option<u32>,

    /// Last day to scan (YYYY-MM-DD), today by default
    #[arg(long)]
    end_date: Option<NaiveDate>,

    /// Companies processed concurrently
    #[arg(long)]
    concurrency: Option<usize>,

    /// Directory for the output files
    #[arg(long, default_value = ".")]
    output_dir: PathBuf,

    /// Output format (csv, json, pretty-json or text)
    #[arg(long, default_value = "csv")]
    format: ExportFormat,
}

impl BatchArgs {
    /// Environment configuration with the command-line overrides applied.
    fn config(&self) -> Result<Config, Box<dyn std::error::Error>> {
        let mut config = Config::from_env()?;
        if let Some(api_key) = &self.api_key {
            config.api_key = Some(api_key.clone());
        }
        if let Some(threshold) = self.threshold {
            config.threshold = threshold;
        }
        if let Some(days) = self.days {
            config.lookback_days = days;
        }
        if let Some(end_date) = self.end_date {
            config.end_date = Some(end_date);
        }
        if let Some(concurrency) = self.concurrency {
            config.concurrency = concurrency;
        }
        config.validate()?;
        Ok(config)
    }

    fn names(&self) -> Result<Vec<String>, Box<dyn std::error::Error>> {
        let names = names::collect_names(&self.names, self.names_file.as_deref())?;
        if names.is_empty() {
            return Err("No company names given (pass names or --names-file)".into());
        }
        Ok(names)
    }

    fn output_path(&self, stem: &str, format: ExportFormat) -> PathBuf {
        self.output_dir
            .join(format!("{stem}.{}", format.extension()))
    }
}

#[tokio::main]
async fn main() {
    init_tracing();
    if let Err(e) = run().await {
        eprintln!("Error: {}", e);
        process::exit(1);
    }
}

fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();
}

async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Run {
            batch,
            indicators,
            excel,
        } => {
            let spec = load_spec(indicators.as_deref())?;
            run_batch(&batch, spec, excel).await?;
        }
        Commands::Validate { batch } => {
            validate_names(&batch).await?;
        }
        Commands::Indicators { indicators, json } => {
            let spec = load_spec(indicators.as_deref())?;
            show_indicators(&spec, json)?;
        }
    }

    Ok(())
}

fn load_spec(path: Option<&Path>) -> Result<IndicatorSpec, Box<dyn std::error::Error>> {
    match path {
        Some(path) => IndicatorSpec::from_file(path)
            .map_err(|e| format!("Failed to load indicators from {}: {}", path.display(), e).into()),
        None => Ok(IndicatorSpec::default()),
    }
}

fn pipeline(
    config: &Config,
    spec: IndicatorSpec,
) -> Result<Pipeline<EdinetClient>, Box<dyn std::error::Error>> {
    let today = Local::now().date_naive();
    let pipeline_config = config.pipeline_config(spec, today)?;
    Ok(Pipeline::new(config.client()?, pipeline_config))
}

fn progress_bar(len: usize) -> Result<ProgressBar, Box<dyn std::error::Error>> {
    let pb = ProgressBar::new(len as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{bar:40.cyan/blue}] {pos}/{len} {msg}")?
            .progress_chars("█▓░"),
    );
    pb.enable_steady_tick(Duration::from_millis(100));
    Ok(pb)
}

async fn run_batch(
    batch: &BatchArgs,
    spec: IndicatorSpec,
    excel: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let names = batch.names()?;
    let config = batch.config()?;
    let pipeline = pipeline(&config, spec)?;
    std::fs::create_dir_all(&batch.output_dir)?;

    let pb = progress_bar(names.len())?;
    pb.set_message("Listing documents...");
    let report = match pipeline
        .run_with_progress(&names, |row| {
            pb.set_message(row.query_name().to_string());
            pb.inc(1);
        })
        .await
    {
        Ok(report) => {
            pb.finish_with_message("Done");
            report
        }
        Err(e) => {
            pb.finish_with_message("Failed!");
            return Err(e.into());
        }
    };

    let table = report.table(&pipeline.config().spec);
    let results_path = if excel {
        let path = batch.output_path("results", ExportFormat::Csv);
        table.export_spreadsheet_csv(&path)?;
        path
    } else {
        let path = batch.output_path("results", batch.format);
        table.export_to_file(&path, batch.format)?;
        path
    };
    let validation_path = batch.output_path("validation", batch.format);
    report
        .validation_report()
        .export_to_file(&validation_path, batch.format)?;
    info!(
        results = %results_path.display(),
        validation = %validation_path.display(),
        "Wrote output files"
    );

    println!("{}", report.summary());
    if !report.skipped_days.is_empty() {
        println!(
            "Listing incomplete: {} day(s) of the window could not be listed",
            report.skipped_days.len()
        );
    }
    if let Some(reason) = &report.aborted {
        println!("Batch aborted: {}", reason);
    }
    println!("Results:    {}", results_path.display());
    println!("Validation: {}", validation_path.display());
    println!("Calls used: {}", pipeline.registry().budget().used());

    Ok(())
}

async fn validate_names(batch: &BatchArgs) -> Result<(), Box<dyn std::error::Error>> {
    let names = batch.names()?;
    let config = batch.config()?;
    let pipeline = pipeline(&config, IndicatorSpec::default())?;
    std::fs::create_dir_all(&batch.output_dir)?;

    let spinner = ProgressBar::new_spinner();
    spinner.enable_steady_tick(Duration::from_millis(100));
    spinner.set_message("Listing documents...");
    let report = pipeline.validate(&names).await;
    spinner.finish_and_clear();
    let report = report?;

    let path = batch.output_path("validation", batch.format);
    report.export_to_file(&path, batch.format)?;

    print!("{}", render_validation(&report));
    println!("\nValidation: {}", path.display());

    Ok(())
}

fn show_indicators(spec: &IndicatorSpec, json: bool) -> Result<(), Box<dyn std::error::Error>> {
    if json {
        println!("{}", serde_json::to_string_pretty(spec)?);
        return Ok(());
    }

    println!("Indicators ({}):", spec.len());
    println!("{}", "=".repeat(40));
    for indicator in spec.indicators() {
        println!("{}", indicator.name);
        for tag in &indicator.tags {
            println!("  {}", tag);
        }
    }

    Ok(())
}
