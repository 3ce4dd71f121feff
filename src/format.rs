//! Input format detection.
//!
//! Detection never guesses silently: it returns a [`FormatDetection`] that is
//! either a single format, an explicit ambiguity, or a rejection, and the
//! caller decides what to do with the last two.

use std::{fmt, path::Path, str::FromStr};

use clap::ValueEnum;
use itertools::Itertools;
use serde::{Deserialize, Serialize};

const PARQUET_MAGIC: &[u8] = b"PAR1";
const ZIP_MAGIC: &[u8] = b"PK\x03\x04";
const OLE_MAGIC: &[u8] = &[0xD0, 0xCF, 0x11, 0xE0, 0xA1, 0xB1, 0x1A, 0xE1];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ValueEnum)]
#[value(rename_all = "kebab-case")]
pub enum FileFormat {
    /// Comma (or tab) separated text with a header row
    Csv,
    /// Apache Parquet columnar file
    Parquet,
    /// Excel / OpenDocument workbook (first sheet)
    Xlsx,
}

impl FileFormat {
    /// Extension used for temporary copies so that readers keyed on file
    /// extension pick the right decoder.
    pub fn extension(&self) -> &'static str {
        match self {
            FileFormat::Csv => "csv",
            FileFormat::Parquet => "parquet",
            FileFormat::Xlsx => "xlsx",
        }
    }

    pub fn from_extension(ext: &str) -> Option<FileFormat> {
        match ext.to_ascii_lowercase().as_str() {
            "csv" | "tsv" | "txt" => Some(FileFormat::Csv),
            "parquet" | "pq" => Some(FileFormat::Parquet),
            "xlsx" | "xls" | "xlsm" | "xlsb" | "ods" => Some(FileFormat::Xlsx),
            _ => None,
        }
    }
}

impl fmt::Display for FileFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            FileFormat::Csv => "CSV",
            FileFormat::Parquet => "Parquet",
            FileFormat::Xlsx => "spreadsheet",
        };
        f.write_str(label)
    }
}

impl FromStr for FileFormat {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        FileFormat::from_extension(value.trim().trim_start_matches('.'))
            .ok_or_else(|| format!("Unknown file format '{value}'"))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FormatDetection {
    Detected(FileFormat),
    Ambiguous { candidates: Vec<FileFormat> },
    Unsupported { reason: String },
}

impl fmt::Display for FormatDetection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FormatDetection::Detected(format) => write!(f, "{format}"),
            FormatDetection::Ambiguous { candidates } => {
                write!(f, "ambiguous ({})", join_formats(candidates))
            }
            FormatDetection::Unsupported { reason } => write!(f, "unsupported ({reason})"),
        }
    }
}

pub fn join_formats(formats: &[FileFormat]) -> String {
    formats.iter().join(" or ")
}

/// Decides the format of an input from an explicit selector, the file name
/// and the first bytes of its content.
///
/// An explicit selector always wins. Otherwise the extension and the magic
/// bytes must agree; when they disagree the result is `Ambiguous`.
pub fn detect_format(name: &Path, head: &[u8], explicit: Option<FileFormat>) -> FormatDetection {
    if let Some(format) = explicit {
        return FormatDetection::Detected(format);
    }

    let sniffed = sniff(head);
    match name.extension().and_then(|ext| ext.to_str()) {
        Some(ext) => match FileFormat::from_extension(ext) {
            Some(by_ext) => match sniffed {
                Some(by_magic) if by_magic != by_ext => FormatDetection::Ambiguous {
                    candidates: vec![by_ext, by_magic],
                },
                _ => FormatDetection::Detected(by_ext),
            },
            None => FormatDetection::Unsupported {
                reason: format!("extension '.{ext}' is not CSV, Parquet or Excel"),
            },
        },
        None => match sniffed {
            Some(format) => FormatDetection::Detected(format),
            None if head.is_empty() => FormatDetection::Unsupported {
                reason: "file is empty and has no extension".to_string(),
            },
            None => FormatDetection::Ambiguous {
                candidates: vec![FileFormat::Csv, FileFormat::Parquet, FileFormat::Xlsx],
            },
        },
    }
}

/// Recognizes formats by their leading bytes. Text is only claimed when the
/// first line looks like a comma or tab separated header.
fn sniff(head: &[u8]) -> Option<FileFormat> {
    if head.starts_with(PARQUET_MAGIC) {
        return Some(FileFormat::Parquet);
    }
    if head.starts_with(ZIP_MAGIC) || head.starts_with(OLE_MAGIC) {
        return Some(FileFormat::Xlsx);
    }
    let text = match std::str::from_utf8(head) {
        Ok(text) => text,
        // The sniff window may cut a multi-byte character in half.
        Err(err) if err.error_len().is_none() => std::str::from_utf8(&head[..err.valid_up_to()]).ok()?,
        Err(_) => return None,
    };
    let first_line = text.lines().next()?;
    if first_line.contains(',') || first_line.contains('\t') {
        Some(FileFormat::Csv)
    } else {
        None
    }
}
