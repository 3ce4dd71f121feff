//! Error taxonomy for loading, downloading and period validation.
//!
//! Library operations return these typed errors; the command handlers wrap
//! them with `anyhow` context. Every variant renders a plain cause and, where
//! the user can do something about it, a [`hint`](Error::hint).

use std::{io, path::PathBuf};

use thiserror::Error;

use crate::format::FileFormat;

pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Load(#[from] LoadError),
    #[error(transparent)]
    Download(#[from] DownloadError),
    #[error(transparent)]
    Validation(#[from] ValidationError),
}

impl Error {
    pub fn hint(&self) -> Option<&'static str> {
        match self {
            Error::Load(err) => err.hint(),
            Error::Download(err) => err.hint(),
            Error::Validation(err) => err.hint(),
        }
    }
}

#[derive(Debug, Error)]
pub enum LoadError {
    #[error("Unsupported file format for '{source_name}': {reason}")]
    UnsupportedFormat { source_name: String, reason: String },
    #[error("Cannot tell the format of '{source_name}' (could be {candidates})")]
    AmbiguousFormat {
        source_name: String,
        candidates: String,
    },
    #[error("Failed to parse '{source_name}' as {format}: {message}")]
    Malformed {
        source_name: String,
        format: FileFormat,
        message: String,
    },
    #[error("'{0}' contains no data rows")]
    Empty(String),
    #[error("Failed to read {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("None of the {} file(s) could be loaded", failures.len())]
    NoUsableFiles { failures: Vec<FileFailure> },
    #[error("No input was given")]
    NoInput,
}

impl LoadError {
    pub fn hint(&self) -> Option<&'static str> {
        match self {
            LoadError::UnsupportedFormat { .. } => Some("Use a CSV, Parquet or Excel file."),
            LoadError::AmbiguousFormat { .. } => {
                Some("Pass --format csv|parquet|xlsx to choose the format explicitly.")
            }
            LoadError::Malformed { .. } => {
                Some("Check that the file is not truncated and that --format matches its content.")
            }
            LoadError::Empty(_) => Some("Make sure the file has a header row and at least one trip."),
            LoadError::NoUsableFiles { .. } => Some("Review the per-file errors listed above."),
            LoadError::NoInput => Some("Pass --input, --url or --sample."),
            LoadError::Io { .. } => None,
        }
    }
}

/// One file that was skipped during a multi-file load.
#[derive(Debug)]
pub struct FileFailure {
    pub source_name: String,
    pub error: Error,
}

#[derive(Debug, Error)]
pub enum DownloadError {
    #[error("'{0}' is not a recognized share link or http(s) URL")]
    InvalidLink(String),
    #[error("Could not reach {url}: {message}")]
    Unreachable { url: String, message: String },
    #[error("Access to {url} was denied (HTTP {status}); the file is not shared publicly")]
    Forbidden { url: String, status: u16 },
    #[error("Nothing found at {url} (HTTP 404)")]
    NotFound { url: String },
    #[error("Download from {url} failed with HTTP {status}")]
    HttpStatus { url: String, status: u16 },
    #[error("Download from {url} timed out after {seconds}s")]
    Timeout { url: String, seconds: u64 },
    #[error("Response from {url} is not a data file (content type '{content_type}')")]
    NotAFile { url: String, content_type: String },
    #[error("{url} still answers with a virus-scan warning after confirming it")]
    ScanWarning { url: String },
    #[error("Failed to store download from {url}: {source}")]
    Storage {
        url: String,
        #[source]
        source: io::Error,
    },
}

impl DownloadError {
    pub fn hint(&self) -> Option<&'static str> {
        match self {
            DownloadError::InvalidLink(_) => Some(
                "Use a link like https://drive.google.com/file/d/FILE_ID/view or https://drive.google.com/open?id=FILE_ID",
            ),
            DownloadError::Forbidden { .. } | DownloadError::NotAFile { .. } => Some(
                "Check the sharing permission: open the file, choose Share and set 'Anyone with the link' to Viewer.",
            ),
            DownloadError::NotFound { .. } => Some("Copy the link again from the Share dialog."),
            DownloadError::Timeout { .. } => {
                Some("Retry with a larger --timeout-secs or a smaller file.")
            }
            DownloadError::ScanWarning { .. } => Some(
                "The file is too large for Drive to scan. Download it in a browser and pass it with --input.",
            ),
            DownloadError::Unreachable { .. } => Some("Check the network connection and the URL."),
            DownloadError::HttpStatus { .. } | DownloadError::Storage { .. } => None,
        }
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Month {0} is outside 1..=12")]
    Month(u32),
    #[error("Year {year} is outside {min}..={max}")]
    Year { year: i32, min: i32, max: i32 },
    #[error("Period start {start} is after end {end}")]
    ReversedRange { start: String, end: String },
    #[error("Invalid {what} '{value}': {reason}")]
    Input {
        what: &'static str,
        value: String,
        reason: String,
    },
}

impl ValidationError {
    pub fn hint(&self) -> Option<&'static str> {
        match self {
            ValidationError::Month(_) | ValidationError::Year { .. } => {
                Some("Pick a month between 1 and 12 and a year between 2009 and 2030.")
            }
            ValidationError::ReversedRange { .. } => Some("Swap the start and end values."),
            ValidationError::Input { .. } => None,
        }
    }
}
