use std::path::Path;

use encoding_rs::Encoding;
use log::debug;

use crate::{
    data::parse_typed_value,
    error::{LoadError, Result},
    format::FileFormat,
    io_utils,
    readers::malformed,
    schema::infer_column_types,
    trips::TripTable,
};

/// Reads a delimited text file with a header row. Column types come from a
/// full scan of the file.
pub fn read(path: &Path, source_name: &str, encoding: &'static Encoding) -> Result<TripTable> {
    let delimiter = io_utils::resolve_input_delimiter(path);
    let mut reader =
        io_utils::open_csv_reader_from_path(path, delimiter).map_err(|source| LoadError::Io {
            path: path.to_path_buf(),
            source,
        })?;
    let headers = io_utils::reader_headers(&mut reader, encoding)
        .map_err(|err| malformed(source_name, FileFormat::Csv, format!("{err:#}")))?;
    if headers.iter().all(|h| h.trim().is_empty()) {
        return Err(LoadError::Empty(source_name.to_string()).into());
    }

    let mut raw_rows = Vec::new();
    for (row_idx, record) in reader.byte_records().enumerate() {
        let record = record.map_err(|err| malformed(source_name, FileFormat::Csv, err))?;
        let decoded = io_utils::decode_record(&record, encoding).map_err(|err| {
            malformed(
                source_name,
                FileFormat::Csv,
                format!("row {}: {err:#}", row_idx + 2),
            )
        })?;
        raw_rows.push(decoded);
    }

    let columns = infer_column_types(&headers, &raw_rows);
    debug!(
        "Inferred types for '{}': {}",
        source_name,
        columns
            .iter()
            .map(|c| format!("{}={}", c.name, c.datatype))
            .collect::<Vec<_>>()
            .join(", ")
    );
    let rows = raw_rows
        .iter()
        .map(|raw| {
            columns
                .iter()
                .enumerate()
                .map(|(idx, column)| {
                    raw.get(idx)
                        .and_then(|cell| parse_typed_value(cell, &column.datatype))
                })
                .collect()
        })
        .collect();
    Ok(TripTable::new(columns, rows))
}
