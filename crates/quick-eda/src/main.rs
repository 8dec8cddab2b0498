//! CLI entry point for the automated EDA pipeline.

use anyhow::{Result, anyhow};
use clap::{Parser, ValueEnum};
use polars::io::csv::read::CsvReadOptions;
use polars::prelude::*;
use quick_eda::{EdaConfig, EdaPipeline, EdaReport, PairingPolicy, TestOutcome};
use std::io::Cursor;
use std::path::{Path, PathBuf};
use tracing::{debug, error, info};

/// CLI-compatible pairing policy enum
#[derive(Debug, Clone, Copy, ValueEnum)]
enum CliPairingPolicy {
    /// Any duplicate, unmatched or missing identifier falls back to the unpaired test
    Strict,
    /// Drop observations without a partner and pair the rest
    DropUnmatched,
}

impl From<CliPairingPolicy> for PairingPolicy {
    fn from(cli: CliPairingPolicy) -> Self {
        match cli {
            CliPairingPolicy::Strict => PairingPolicy::Strict,
            CliPairingPolicy::DropUnmatched => PairingPolicy::DropUnmatched,
        }
    }
}

#[derive(Parser, Debug)]
#[command(
    version,
    about = "Automated exploratory data analysis",
    long_about = "Classifies every column of a CSV file, summarizes it, tests its \
                  relationship with a target column and writes an HTML report with charts.\n\n\
                  OUTPUT:\n  \
                  <output>/<name>.html\n  \
                  <output>/_visuals/*.png\n\n\
                  EXAMPLES:\n  \
                  # Compare every column with 'group'\n  \
                  quick-eda -i data.csv --target group\n\n  \
                  # Paired tests through an identifier column\n  \
                  quick-eda -i data.csv --target group --id subject -o results/\n\n  \
                  # Machine-readable result\n  \
                  quick-eda -i data.csv --target group --json | jq .relationships"
)]
struct Args {
    /// Path to the CSV file to analyze
    #[arg(short, long)]
    input: String,

    /// Target column every other column is compared with
    #[arg(short, long)]
    target: String,

    /// Identifier column used to pair observations
    #[arg(long)]
    id: Option<String>,

    /// Output directory for the report and the `_visuals` folder
    #[arg(short, long, default_value = "eda_output")]
    output: PathBuf,

    /// Report file name (without extension)
    #[arg(short, long, default_value = "EDA")]
    name: String,

    /// Significance level for all tests (0.0 - 1.0, exclusive)
    #[arg(short, long, default_value = "0.05")]
    alpha: f64,

    /// When to fall back from the paired to the unpaired t-test
    #[arg(long, value_enum, default_value = "strict")]
    pairing: CliPairingPolicy,

    /// Use Welch's t-test instead of the pooled-variance t-test
    #[arg(long)]
    welch: bool,

    /// Disable Yates' continuity correction on 2x2 tables
    #[arg(long)]
    no_yates: bool,

    /// Keep images from earlier runs in the `_visuals` folder
    #[arg(long)]
    keep_stale_visuals: bool,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long, default_value = "info")]
    log_level: String,

    /// Suppress progress output (only show warnings, errors and the final summary)
    #[arg(short, long)]
    quiet: bool,

    /// Output the report as JSON to stdout instead of a human-readable summary
    ///
    /// Disables all logs; useful for piping: `... --json | jq .warnings`
    #[arg(long)]
    json: bool,
}

/// Initialize the tracing subscriber for logging.
///
/// When `json_output` is true, logging is completely disabled to ensure
/// only JSON is written to stdout.
fn init_logging(level: &str, quiet: bool, json_output: bool) {
    if json_output {
        return;
    }

    use tracing_subscriber::EnvFilter;

    let effective_level = if quiet { "warn" } else { level };

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(effective_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();
}

fn main() -> Result<()> {
    let args = Args::parse();

    init_logging(&args.log_level, args.quiet, args.json);

    if !Path::new(&args.input).exists() {
        return Err(anyhow!("Input file not found: {}", args.input));
    }

    info!("Loading dataset from: {}", args.input);
    let data = load_csv_with_fallbacks(&args.input)?;
    info!("Dataset loaded successfully: {:?}", data.shape());

    let mut config_builder = EdaConfig::builder()
        .target_column(&args.target)
        .output_dir(&args.output)
        .file_name(&args.name)
        .significance_level(args.alpha)
        .pairing_policy(args.pairing.into())
        .equal_variance(!args.welch)
        .yates_correction(!args.no_yates)
        .clear_stale_visuals(!args.keep_stale_visuals);

    if let Some(ref id) = args.id {
        config_builder = config_builder.identifier_column(id);
    }

    let config = config_builder.build()?;
    let pipeline = EdaPipeline::builder().config(config).build()?;

    match pipeline.run(&data) {
        Ok(report) => {
            if args.json {
                println!("{}", serde_json::to_string_pretty(&report)?);
            } else {
                print_human_readable_summary(&report, &args);
            }
            Ok(())
        }
        Err(e) => {
            if args.json {
                println!("{}", serde_json::to_string_pretty(&e)?);
            }
            error!("EDA failed: {}", e);
            Err(anyhow!("EDA failed: {}", e))
        }
    }
}

fn print_human_readable_summary(report: &EdaReport, args: &Args) {
    println!();
    println!("{}", "=".repeat(80));
    println!("EDA COMPLETE");
    println!("{}", "=".repeat(80));
    println!();

    println!(
        "Input:  {} ({} rows x {} columns)",
        args.input, report.rows, report.columns
    );
    println!("Report: {}", report.document_path.display());
    println!(
        "Images: {} in {}",
        report.image_count(),
        report.visuals_dir.display()
    );
    println!();

    let role = report
        .target
        .role
        .map(|r| r.display_name())
        .unwrap_or("not classifiable");
    println!("Target Column: {} ({})", report.target.column, role);
    if let Some(ref id) = report.target.identifier {
        println!("Identifier:    {}", id);
    }
    println!("Significance:  {}", report.significance_level);
    println!();

    if !report.relationships.is_empty() {
        println!("Relationships:");
        println!(
            "  {:<24} {:<36} {:>12} {:>5}",
            "Column", "Test", "p-value", "Sig."
        );
        println!("  {}", "-".repeat(80));
        for result in &report.relationships {
            let (p_value, significant) = match &result.outcome {
                TestOutcome::Computed {
                    result: stat,
                    significant,
                } => (
                    quick_eda::utils::format_number(stat.p_value),
                    if *significant { "*" } else { "" },
                ),
                TestOutcome::Failed { .. } => ("failed".to_string(), ""),
            };
            println!(
                "  {:<24} {:<36} {:>12} {:>5}",
                truncate_str(&result.column, 23),
                result.test.display_name(),
                p_value,
                significant
            );
        }
        println!();
    }

    let excluded = report.excluded();
    if !excluded.is_empty() {
        println!("Excluded Columns ({}):", excluded.len());
        for column in excluded {
            println!(
                "  - {} [{}]: {}",
                column.name,
                column.stage.display_name(),
                column.reason
            );
        }
        println!();
    }

    if !report.warnings.is_empty() {
        println!("Warnings ({}):", report.warnings.len());
        for warning in &report.warnings {
            println!("  - {}", warning);
        }
        println!();
    }

    println!("{}", "=".repeat(80));
}

/// Truncate a string for table display.
fn truncate_str(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else {
        let kept: String = s.chars().take(max_len.saturating_sub(3)).collect();
        format!("{kept}...")
    }
}

/// Load CSV with multiple fallback strategies
fn load_csv_with_fallbacks(path: &str) -> Result<DataFrame> {
    // Strategy 1: Standard loading with quote handling and date parsing
    match CsvReadOptions::default()
        .with_infer_schema_length(Some(100))
        .with_has_header(true)
        .with_parse_options(
            CsvParseOptions::default()
                .with_quote_char(Some(b'"'))
                .with_try_parse_dates(true),
        )
        .try_into_reader_with_file_path(Some(PathBuf::from(path)))?
        .finish()
    {
        Ok(df) => return Ok(df),
        Err(e) => {
            debug!("Standard loading failed: {}", e);
        }
    }

    // Strategy 2: Without date parsing
    match CsvReadOptions::default()
        .with_infer_schema_length(Some(100))
        .with_has_header(true)
        .try_into_reader_with_file_path(Some(PathBuf::from(path)))?
        .finish()
    {
        Ok(df) => return Ok(df),
        Err(e) => {
            debug!("Loading without date parsing failed: {}", e);
        }
    }

    // Strategy 3: Pre-clean content
    match std::fs::read_to_string(path) {
        Ok(content) => {
            let cleaned = clean_csv_content(&content);
            CsvReadOptions::default()
                .with_infer_schema_length(Some(100))
                .with_has_header(true)
                .into_reader_with_file_handle(Cursor::new(cleaned))
                .finish()
                .map_err(|e| e.into())
        }
        Err(e) => {
            error!("Could not read file: {}", e);
            Err(e.into())
        }
    }
}

/// Clean CSV content
fn clean_csv_content(content: &str) -> String {
    content
        .replace("\"\"\"", "\"")
        .replace("\"\"", "\"")
        .lines()
        .filter(|line| !line.trim().is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}
