//! Format-specific readers that turn one file into a [`TripTable`].
//!
//! Parser failures are surfaced with the underlying parser's own message
//! inside [`LoadError::Malformed`]; a file with a header but no rows is
//! [`LoadError::Empty`].

pub mod delimited;
pub mod columnar;
pub mod spreadsheet;

use std::path::Path;

use encoding_rs::{Encoding, UTF_8};
use log::debug;

use crate::{
    error::{LoadError, Result},
    format::{FileFormat, FormatDetection, detect_format, join_formats},
    io_utils,
    trips::TripTable,
};

#[derive(Debug, Clone, Copy)]
pub struct ReadOptions {
    pub encoding: &'static Encoding,
}

impl Default for ReadOptions {
    fn default() -> Self {
        Self { encoding: UTF_8 }
    }
}

/// Detects the format of `path` (honouring `explicit`) and parses it.
pub fn read_path(
    path: &Path,
    explicit: Option<FileFormat>,
    options: &ReadOptions,
) -> Result<TripTable> {
    read_source(path, &display_name(path), explicit, options)
}

/// Like [`read_path`], but reports problems under `source_name` (used for
/// downloads, whose temporary path means nothing to the user).
pub fn read_source(
    path: &Path,
    source_name: &str,
    explicit: Option<FileFormat>,
    options: &ReadOptions,
) -> Result<TripTable> {
    let head = io_utils::read_head(path).map_err(|source| LoadError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let format = resolve_format(path, &head, explicit, source_name)?;
    read_with_format(path, source_name, format, options)
}

/// Turns a detection result into a format or the matching load error.
pub fn resolve_format(
    path: &Path,
    head: &[u8],
    explicit: Option<FileFormat>,
    source_name: &str,
) -> Result<FileFormat> {
    match detect_format(path, head, explicit) {
        FormatDetection::Detected(format) => {
            debug!("Detected {format} format for '{source_name}'");
            Ok(format)
        }
        FormatDetection::Ambiguous { candidates } => Err(LoadError::AmbiguousFormat {
            source_name: source_name.to_string(),
            candidates: join_formats(&candidates),
        }
        .into()),
        FormatDetection::Unsupported { reason } => Err(LoadError::UnsupportedFormat {
            source_name: source_name.to_string(),
            reason,
        }
        .into()),
    }
}

pub fn read_with_format(
    path: &Path,
    source_name: &str,
    format: FileFormat,
    options: &ReadOptions,
) -> Result<TripTable> {
    let table = match format {
        FileFormat::Csv => delimited::read(path, source_name, options.encoding)?,
        FileFormat::Parquet => columnar::read(path, source_name)?,
        FileFormat::Xlsx => spreadsheet::read(path, source_name)?,
    };
    if table.is_empty() {
        return Err(LoadError::Empty(source_name.to_string()).into());
    }
    debug!(
        "Parsed {} row(s) and {} column(s) from '{}'",
        table.row_count(),
        table.columns().len(),
        source_name
    );
    Ok(table)
}

pub fn display_name(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

pub(crate) fn malformed(source_name: &str, format: FileFormat, message: impl ToString) -> LoadError {
    LoadError::Malformed {
        source_name: source_name.to_string(),
        format,
        message: message.to_string(),
    }
}
