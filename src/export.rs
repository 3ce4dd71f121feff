use std::{fs, path::Path};

use anyhow::{Context, Result};
use log::info;

use crate::{cli::ExportArgs, io_utils, session, trips::TripTable};

pub fn execute(args: &ExportArgs) -> Result<()> {
    let session = session::open(&args.source, &args.period, &args.filter)?;
    let view = session.view()?;
    let output = args.output.as_deref();
    let written = write_csv(&view, output)?;
    info!(
        "Wrote {written} row(s) to {}",
        output
            .filter(|p| !io_utils::is_dash(p))
            .map(|p| format!("{p:?}"))
            .unwrap_or_else(|| "stdout".to_string())
    );

    if let Some(path) = &args.save_filters {
        let yaml = session.filters().to_yaml()?;
        fs::write(path, yaml).with_context(|| format!("Writing filters to {path:?}"))?;
        info!("Saved filter selection to {path:?}");
    }
    Ok(())
}

/// Writes `table` as CSV with canonical column names. Returns the number of
/// data rows written.
pub fn write_csv(table: &TripTable, output: Option<&Path>) -> Result<usize> {
    let delimiter = output
        .map(io_utils::resolve_input_delimiter)
        .unwrap_or(io_utils::DEFAULT_CSV_DELIMITER);
    let mut writer = io_utils::open_csv_writer(output, delimiter)?;
    writer
        .write_record(table.column_names())
        .context("Writing header row")?;
    for (idx, row) in table.rows().iter().enumerate() {
        writer
            .write_record(
                row.iter()
                    .map(|cell| cell.as_ref().map(|v| v.as_display()).unwrap_or_default()),
            )
            .with_context(|| format!("Writing row {}", idx + 2))?;
    }
    writer.flush().context("Flushing output")?;
    Ok(table.row_count())
}
