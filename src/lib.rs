pub mod cli;
pub mod data;
pub mod dictionary;
pub mod error;
pub mod export;
pub mod filter;
pub mod format;
pub mod frequency;
pub mod insights;
pub mod io_utils;
pub mod loader;
pub mod normalize;
pub mod period;
pub mod preview;
pub mod readers;
pub mod remote;
pub mod sample;
pub mod schema;
pub mod series;
pub mod session;
pub mod stats;
pub mod summary;
pub mod table;
pub mod trips;

use std::{env, sync::OnceLock};

use anyhow::Result;
use clap::Parser;
use log::{LevelFilter, debug, info};

use crate::{
    cli::{Cli, Commands},
    error::{DownloadError, Error, LoadError, ValidationError},
    format::{FormatDetection, detect_format},
};

static LOGGER: OnceLock<()> = OnceLock::new();

fn init_logging() {
    LOGGER.get_or_init(|| {
        let mut builder = env_logger::Builder::from_env(env_logger::Env::default());
        if env::var("RUST_LOG").is_err() {
            builder.filter_module("taxi_lens", LevelFilter::Info);
        }
        let _ = builder.format_timestamp_millis().try_init();
    });
}

pub fn run() -> Result<()> {
    init_logging();
    let cli = Cli::parse();
    match cli.command {
        Commands::Summary(args) => summary::execute(&args),
        Commands::Preview(args) => preview::execute(&args),
        Commands::Stats(args) => stats::execute(&args),
        Commands::Frequency(args) => frequency::execute(&args),
        Commands::Series(args) => series::execute(&args),
        Commands::Export(args) => export::execute(&args),
        Commands::Detect(args) => handle_detect(&args),
    }
}

/// Corrective action for the first typed error found in the chain.
pub fn hint(err: &anyhow::Error) -> Option<&'static str> {
    err.chain().find_map(|cause| {
        if let Some(err) = cause.downcast_ref::<Error>() {
            err.hint()
        } else if let Some(err) = cause.downcast_ref::<LoadError>() {
            err.hint()
        } else if let Some(err) = cause.downcast_ref::<DownloadError>() {
            err.hint()
        } else {
            cause.downcast_ref::<ValidationError>().and_then(|err| err.hint())
        }
    })
}

fn handle_detect(args: &cli::DetectArgs) -> Result<()> {
    let headers = ["file", "format", "candidates"].map(String::from).to_vec();
    let mut rows = Vec::with_capacity(args.inputs.len());
    for path in &args.inputs {
        let detection = match io_utils::read_head(path) {
            Ok(head) => detect_format(path, &head, args.format),
            Err(err) => FormatDetection::Unsupported {
                reason: err.to_string(),
            },
        };
        debug!("{path:?}: {detection:?}");
        let (result, candidates) = match &detection {
            FormatDetection::Detected(format) => (format.to_string(), String::new()),
            FormatDetection::Ambiguous { candidates } => {
                ("ambiguous".to_string(), format::join_formats(candidates))
            }
            FormatDetection::Unsupported { reason } => (format!("unsupported: {reason}"), String::new()),
        };
        rows.push(vec![readers::display_name(path), result, candidates]);
    }
    table::print_table(&headers, &rows);
    info!("Checked {} file(s)", rows.len());
    Ok(())
}
