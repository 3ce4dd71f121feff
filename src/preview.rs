use anyhow::Result;
use log::info;

use crate::{cli::PreviewArgs, session, table};

pub fn execute(args: &PreviewArgs) -> Result<()> {
    let session = session::open(&args.source, &args.period, &args.filter)?;
    let view = session.view()?;
    let (headers, rows) = table::trip_rows(&view.head(args.rows), session.locale());
    table::print_table(&headers, &rows);
    info!(
        "Displayed {} of {} row(s)",
        rows.len(),
        view.row_count()
    );
    Ok(())
}
