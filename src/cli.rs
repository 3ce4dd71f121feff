use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};

use crate::{
    format::FileFormat,
    normalize::Locale,
    remote::DEFAULT_TIMEOUT,
    sample::{DEFAULT_SAMPLE_ROWS, DEFAULT_SAMPLE_SEED},
};

#[derive(Debug, Parser)]
#[command(author, version, about = "Explore NYC taxi trip records", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Show the reporting period, headline metrics and insights
    Summary(SummaryArgs),
    /// Preview the first rows of the normalized, filtered table
    Preview(PreviewArgs),
    /// Produce descriptive statistics for numeric columns
    Stats(StatsArgs),
    /// Produce frequency counts for categorical columns
    Frequency(FrequencyArgs),
    /// Emit chart-ready aggregates (trips per day or hour, histograms)
    Series(SeriesArgs),
    /// Write the normalized, filtered table to CSV
    Export(ExportArgs),
    /// Report the detected format of each input file without loading it
    Detect(DetectArgs),
}

#[derive(Debug, Clone, Args)]
pub struct SourceArgs {
    /// Input file; repeat to merge several files into one table
    #[arg(short = 'i', long = "input", action = clap::ArgAction::Append)]
    pub inputs: Vec<PathBuf>,
    /// Share link or direct http(s) URL to download
    #[arg(long, conflicts_with = "inputs")]
    pub url: Option<String>,
    /// Use the bundled synthetic dataset
    #[arg(long, conflicts_with_all = ["inputs", "url"])]
    pub sample: bool,
    /// Number of rows in the bundled dataset
    #[arg(long = "sample-rows", default_value_t = DEFAULT_SAMPLE_ROWS)]
    pub sample_rows: usize,
    /// Seed for the bundled dataset
    #[arg(long = "sample-seed", default_value_t = DEFAULT_SAMPLE_SEED)]
    pub sample_seed: u64,
    /// Input format; detected from extension and content when omitted
    #[arg(long, value_enum)]
    pub format: Option<FileFormat>,
    /// Character encoding of delimited input (defaults to utf-8)
    #[arg(long = "input-encoding")]
    pub input_encoding: Option<String>,
    /// Seconds to wait for a download before giving up
    #[arg(long = "timeout-secs", default_value_t = DEFAULT_TIMEOUT.as_secs())]
    pub timeout_secs: u64,
    /// Remove rows that exactly repeat an earlier row
    #[arg(long = "drop-duplicates")]
    pub drop_duplicates: bool,
    /// Language for labels and fallback values
    #[arg(long, value_enum, default_value = "en")]
    pub locale: Locale,
}

#[derive(Debug, Clone, Default, Args)]
pub struct PeriodArgs {
    /// Reporting month (1-12); requires --year
    #[arg(long, requires = "year", conflicts_with_all = ["from", "to"])]
    pub month: Option<u32>,
    /// Reporting year; requires --month
    #[arg(long, requires = "month")]
    pub year: Option<i32>,
    /// Last month of a month range; requires --end-year
    #[arg(long = "end-month", requires_all = ["month", "end_year"])]
    pub end_month: Option<u32>,
    /// Year of the last month of a month range
    #[arg(long = "end-year", requires = "end_month")]
    pub end_year: Option<i32>,
    /// First day of an explicit date range (YYYY-MM-DD)
    #[arg(long, requires = "to")]
    pub from: Option<String>,
    /// Last day of an explicit date range (YYYY-MM-DD)
    #[arg(long, requires = "from")]
    pub to: Option<String>,
}

#[derive(Debug, Clone, Default, Args)]
pub struct FilterArgs {
    /// Inclusive pickup date range such as `2024-01-01..2024-01-31`
    #[arg(long = "date-range")]
    pub date_range: Option<String>,
    /// Inclusive numeric range such as `fare_amount=5..50` (either side may be open)
    #[arg(long = "range", action = clap::ArgAction::Append)]
    pub ranges: Vec<String>,
    /// Categorical selection such as `payment_type=2 - Cash`; repeat to select more
    #[arg(long = "category", action = clap::ArgAction::Append)]
    pub categories: Vec<String>,
    /// YAML file holding a saved filter selection
    #[arg(long = "filters")]
    pub filters_file: Option<PathBuf>,
}

#[derive(Debug, Args)]
pub struct SummaryArgs {
    #[command(flatten)]
    pub source: SourceArgs,
    #[command(flatten)]
    pub period: PeriodArgs,
    #[command(flatten)]
    pub filter: FilterArgs,
    /// Emit the summary as JSON
    #[arg(long)]
    pub json: bool,
}

#[derive(Debug, Args)]
pub struct PreviewArgs {
    #[command(flatten)]
    pub source: SourceArgs,
    #[command(flatten)]
    pub period: PeriodArgs,
    #[command(flatten)]
    pub filter: FilterArgs,
    /// Number of rows to display
    #[arg(long, default_value_t = 10)]
    pub rows: usize,
}

#[derive(Debug, Args)]
pub struct StatsArgs {
    #[command(flatten)]
    pub source: SourceArgs,
    #[command(flatten)]
    pub period: PeriodArgs,
    #[command(flatten)]
    pub filter: FilterArgs,
    /// Columns to profile (defaults to every numeric column)
    #[arg(short = 'C', long = "columns", value_delimiter = ',')]
    pub columns: Vec<String>,
}

#[derive(Debug, Args)]
pub struct FrequencyArgs {
    #[command(flatten)]
    pub source: SourceArgs,
    #[command(flatten)]
    pub period: PeriodArgs,
    #[command(flatten)]
    pub filter: FilterArgs,
    /// Columns to count (defaults to the first three categorical columns)
    #[arg(short = 'C', long = "columns", value_delimiter = ',')]
    pub columns: Vec<String>,
    /// Number of values to show per column
    #[arg(long, default_value_t = 10)]
    pub top: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum SeriesKind {
    /// Trips per calendar day of pickup
    Daily,
    /// Trips per hour of day of pickup
    Hourly,
    /// Equal-width histogram of a numeric column
    Histogram,
    /// Seeded sample of pickup coordinates for scatter plots
    Points,
}

#[derive(Debug, Args)]
pub struct SeriesArgs {
    #[command(flatten)]
    pub source: SourceArgs,
    #[command(flatten)]
    pub period: PeriodArgs,
    #[command(flatten)]
    pub filter: FilterArgs,
    /// Aggregate to produce
    #[arg(long, value_enum, default_value = "daily")]
    pub kind: SeriesKind,
    /// Column to bin (histogram only)
    #[arg(long, required_if_eq("kind", "histogram"))]
    pub column: Option<String>,
    /// Number of histogram bins (1-1000)
    #[arg(long, default_value_t = 20, value_parser = clap::value_parser!(u16).range(1..=1000))]
    pub bins: u16,
    /// Number of points to sample
    #[arg(long, default_value_t = 1000)]
    pub points: usize,
    /// Seed for point sampling
    #[arg(long, default_value_t = DEFAULT_SAMPLE_SEED)]
    pub seed: u64,
}

#[derive(Debug, Args)]
pub struct ExportArgs {
    #[command(flatten)]
    pub source: SourceArgs,
    #[command(flatten)]
    pub period: PeriodArgs,
    #[command(flatten)]
    pub filter: FilterArgs,
    /// Output CSV file (stdout if omitted or `-`)
    #[arg(short = 'o', long = "output")]
    pub output: Option<PathBuf>,
    /// Also save the active filter selection as YAML
    #[arg(long = "save-filters")]
    pub save_filters: Option<PathBuf>,
}

#[derive(Debug, Args)]
pub struct DetectArgs {
    /// Files to inspect
    #[arg(short = 'i', long = "input", required = true, action = clap::ArgAction::Append)]
    pub inputs: Vec<PathBuf>,
    /// Explicit format selector to validate against
    #[arg(long, value_enum)]
    pub format: Option<FileFormat>,
}
