//! Source acquisition.
//!
//! A [`SourceDescriptor`] names where the trips come from: one local file,
//! several local files to merge, a remote link, or the bundled sample. The
//! [`Loader`] turns a descriptor into a shared [`TripTable`] and remembers the
//! result for the rest of the session; the cache key includes the file's size
//! and modification time, so an edited file is read again.
//!
//! Only complete loads are cached. A multi-file load with skipped files is
//! retried in full on the next request so that a repaired file gets picked up.
//!
//! Every cached table is held in memory for the life of the loader; callers
//! loading many large sources should [`Loader::clear_cache`] between them.

use std::{
    collections::HashMap,
    fs,
    path::{Path, PathBuf},
    sync::Arc,
    time::{Duration, SystemTime},
};

use encoding_rs::{Encoding, UTF_8};
use log::{debug, info, warn};

use crate::{
    error::{FileFailure, LoadError, Result},
    format::FileFormat,
    readers::{self, ReadOptions},
    remote::{self, DEFAULT_TIMEOUT},
    sample,
    trips::TripTable,
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SourceDescriptor {
    Local {
        path: PathBuf,
        format: Option<FileFormat>,
    },
    /// Several local files merged by column union, in the given order.
    Multi {
        paths: Vec<PathBuf>,
        format: Option<FileFormat>,
    },
    Remote {
        link: String,
        format: Option<FileFormat>,
    },
    Sample {
        rows: usize,
        seed: u64,
    },
}

impl SourceDescriptor {
    /// Picks single or multi mode from the number of paths.
    pub fn from_paths(mut paths: Vec<PathBuf>, format: Option<FileFormat>) -> Option<Self> {
        match paths.len() {
            0 => None,
            1 => paths.pop().map(|path| SourceDescriptor::Local { path, format }),
            _ => Some(SourceDescriptor::Multi { paths, format }),
        }
    }

    pub fn label(&self) -> String {
        match self {
            SourceDescriptor::Local { path, .. } => readers::display_name(path),
            SourceDescriptor::Multi { paths, .. } => format!("{} files", paths.len()),
            SourceDescriptor::Remote { link, .. } => link.clone(),
            SourceDescriptor::Sample { rows, seed } => format!("sample ({rows} rows, seed {seed})"),
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct LoaderOptions {
    pub timeout: Duration,
    pub encoding: &'static Encoding,
    pub drop_duplicates: bool,
}

impl Default for LoaderOptions {
    fn default() -> Self {
        Self {
            timeout: DEFAULT_TIMEOUT,
            encoding: UTF_8,
            drop_duplicates: false,
        }
    }
}

/// Outcome of one load request.
#[derive(Debug)]
pub struct Loaded {
    pub table: Arc<TripTable>,
    /// Files skipped during a multi-file load.
    pub failures: Vec<FileFailure>,
    pub files_loaded: usize,
    pub duplicates_removed: usize,
    pub from_cache: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
enum CacheKey {
    Local {
        path: PathBuf,
        len: u64,
        modified: Option<SystemTime>,
        format: Option<FileFormat>,
    },
    Multi(Vec<CacheKey>),
    Remote {
        url: String,
        format: Option<FileFormat>,
    },
    Sample {
        rows: usize,
        seed: u64,
    },
}

#[derive(Debug, Clone)]
struct CacheEntry {
    table: Arc<TripTable>,
    files_loaded: usize,
    duplicates_removed: usize,
}

#[derive(Debug, Default)]
pub struct Loader {
    options: LoaderOptions,
    cache: HashMap<CacheKey, CacheEntry>,
}

impl Loader {
    pub fn new(options: LoaderOptions) -> Self {
        Self {
            options,
            cache: HashMap::new(),
        }
    }

    pub fn options(&self) -> &LoaderOptions {
        &self.options
    }

    pub fn cached_entries(&self) -> usize {
        self.cache.len()
    }

    pub fn clear_cache(&mut self) {
        self.cache.clear();
    }

    pub fn load(&mut self, source: &SourceDescriptor) -> Result<Loaded> {
        let key = cache_key(source)?;
        if let Some(entry) = self.cache.get(&key) {
            debug!("Cache hit for {}", source.label());
            return Ok(Loaded {
                table: Arc::clone(&entry.table),
                failures: Vec::new(),
                files_loaded: entry.files_loaded,
                duplicates_removed: entry.duplicates_removed,
                from_cache: true,
            });
        }

        let read_options = ReadOptions {
            encoding: self.options.encoding,
        };
        let (table, failures, files_loaded) = match source {
            SourceDescriptor::Local { path, format } => {
                (readers::read_path(path, *format, &read_options)?, Vec::new(), 1)
            }
            SourceDescriptor::Multi { paths, format } => load_many(paths, *format, &read_options)?,
            SourceDescriptor::Remote { link, format } => (
                load_remote(link, *format, self.options.timeout, &read_options)?,
                Vec::new(),
                1,
            ),
            SourceDescriptor::Sample { rows, seed } => {
                let table = sample::generate(*rows, *seed);
                if table.is_empty() {
                    return Err(LoadError::Empty(source.label()).into());
                }
                (table, Vec::new(), 1)
            }
        };

        let (table, duplicates_removed) = if self.options.drop_duplicates {
            let (deduped, removed) = table.drop_duplicates();
            info!("Removed {removed} duplicate row(s)");
            (deduped, removed)
        } else {
            (table, 0)
        };
        info!(
            "Loaded {} row(s) and {} column(s) from {}",
            table.row_count(),
            table.columns().len(),
            source.label()
        );

        let table = Arc::new(table);
        if failures.is_empty() {
            self.cache.insert(
                key,
                CacheEntry {
                    table: Arc::clone(&table),
                    files_loaded,
                    duplicates_removed,
                },
            );
        }
        Ok(Loaded {
            table,
            failures,
            files_loaded,
            duplicates_removed,
            from_cache: false,
        })
    }
}

fn cache_key(source: &SourceDescriptor) -> Result<CacheKey> {
    Ok(match source {
        SourceDescriptor::Local { path, format } => local_key(path, *format)?,
        SourceDescriptor::Multi { paths, format } => CacheKey::Multi(
            paths
                .iter()
                .map(|path| {
                    // Unreadable files fail later with a per-file error.
                    local_key(path, *format).unwrap_or_else(|_| CacheKey::Local {
                        path: path.clone(),
                        len: 0,
                        modified: None,
                        format: *format,
                    })
                })
                .collect(),
        ),
        SourceDescriptor::Remote { link, format } => CacheKey::Remote {
            url: remote::resolve_link(link)?.download_url().to_string(),
            format: *format,
        },
        SourceDescriptor::Sample { rows, seed } => CacheKey::Sample {
            rows: *rows,
            seed: *seed,
        },
    })
}

fn local_key(path: &Path, format: Option<FileFormat>) -> Result<CacheKey> {
    let metadata = fs::metadata(path).map_err(|source| LoadError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(CacheKey::Local {
        path: path.to_path_buf(),
        len: metadata.len(),
        modified: metadata.modified().ok(),
        format,
    })
}

/// Reads every file independently and merges the survivors. Fails only when
/// no file could be read.
fn load_many(
    paths: &[PathBuf],
    format: Option<FileFormat>,
    options: &ReadOptions,
) -> Result<(TripTable, Vec<FileFailure>, usize)> {
    let mut tables = Vec::with_capacity(paths.len());
    let mut failures = Vec::new();
    for path in paths {
        match readers::read_path(path, format, options) {
            Ok(table) => tables.push(table),
            Err(error) => {
                let source_name = readers::display_name(path);
                warn!("Skipping '{source_name}': {error}");
                failures.push(FileFailure { source_name, error });
            }
        }
    }
    if tables.is_empty() {
        return Err(LoadError::NoUsableFiles { failures }.into());
    }
    let files_loaded = tables.len();
    let merged = TripTable::concat(tables);
    info!(
        "Merged {files_loaded} of {} file(s) into {} row(s)",
        paths.len(),
        merged.row_count()
    );
    Ok((merged, failures, files_loaded))
}

fn load_remote(
    link: &str,
    format: Option<FileFormat>,
    timeout: Duration,
    options: &ReadOptions,
) -> Result<TripTable> {
    let resolved = remote::resolve_link(link)?;
    let url = resolved.download_url();
    let format = format.or_else(|| format_from_url(url));
    let download = remote::download(url, format, timeout)?;
    info!("Downloaded {} byte(s) from {url}", download.bytes);
    readers::read_source(download.file.path(), link.trim(), format, options)
}

/// Format implied by the last path segment of a URL, if it has a known
/// extension.
fn format_from_url(url: &str) -> Option<FileFormat> {
    let path = url.split(['?', '#']).next()?;
    let segment = path.rsplit('/').next()?;
    let (_, ext) = segment.rsplit_once('.')?;
    FileFormat::from_extension(ext)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;

    fn write(dir: &Path, name: &str, body: &str) -> PathBuf {
        let path = dir.join(name);
        fs::write(&path, body).unwrap();
        path
    }

    #[test]
    fn from_paths_picks_mode() {
        assert_eq!(SourceDescriptor::from_paths(vec![], None), None);
        assert!(matches!(
            SourceDescriptor::from_paths(vec![PathBuf::from("a.csv")], None),
            Some(SourceDescriptor::Local { .. })
        ));
        assert!(matches!(
            SourceDescriptor::from_paths(vec![PathBuf::from("a.csv"), PathBuf::from("b.csv")], None),
            Some(SourceDescriptor::Multi { .. })
        ));
    }

    #[test]
    fn url_extension_hints_format() {
        assert_eq!(
            format_from_url("https://example.test/data/yellow_2024-01.parquet?raw=1"),
            Some(FileFormat::Parquet)
        );
        assert_eq!(format_from_url("https://drive.google.com/uc?export=download&id=abc"), None);
    }

    #[test]
    fn identical_requests_hit_the_cache() {
        let dir = tempfile::tempdir().unwrap();
        let path = write(dir.path(), "trips.csv", "fare_amount\n1.5\n2.5\n");
        let mut loader = Loader::new(LoaderOptions::default());
        let source = SourceDescriptor::Local { path, format: None };
        let first = loader.load(&source).unwrap();
        let second = loader.load(&source).unwrap();
        assert!(!first.from_cache);
        assert!(second.from_cache);
        assert!(Arc::ptr_eq(&first.table, &second.table));
        assert_eq!(loader.cached_entries(), 1);
    }

    #[test]
    fn changed_format_is_a_cache_miss() {
        let dir = tempfile::tempdir().unwrap();
        let path = write(dir.path(), "trips.csv", "fare_amount\n1.5\n");
        let mut loader = Loader::new(LoaderOptions::default());
        loader
            .load(&SourceDescriptor::Local { path: path.clone(), format: None })
            .unwrap();
        let explicit = loader
            .load(&SourceDescriptor::Local { path, format: Some(FileFormat::Csv) })
            .unwrap();
        assert!(!explicit.from_cache);
        assert_eq!(loader.cached_entries(), 2);
    }

    #[test]
    fn multi_load_keeps_going_past_bad_files() {
        let dir = tempfile::tempdir().unwrap();
        let good = write(dir.path(), "a.csv", "fare_amount\n1.5\n");
        let empty = write(dir.path(), "b.csv", "fare_amount\n");
        let missing = dir.path().join("c.csv");
        let mut loader = Loader::new(LoaderOptions::default());
        let loaded = loader
            .load(&SourceDescriptor::Multi {
                paths: vec![good, empty, missing],
                format: None,
            })
            .unwrap();
        assert_eq!(loaded.table.row_count(), 1);
        assert_eq!(loaded.files_loaded, 1);
        let skipped = loaded
            .failures
            .iter()
            .map(|f| f.source_name.as_str())
            .collect::<Vec<_>>();
        assert_eq!(skipped, vec!["b.csv", "c.csv"]);
        assert_eq!(loader.cached_entries(), 0);
    }

    #[test]
    fn multi_load_with_no_survivors_fails() {
        let dir = tempfile::tempdir().unwrap();
        let empty = write(dir.path(), "b.csv", "fare_amount\n");
        let mut loader = Loader::new(LoaderOptions::default());
        let err = loader
            .load(&SourceDescriptor::Multi {
                paths: vec![empty.clone(), empty],
                format: None,
            })
            .unwrap_err();
        match err {
            Error::Load(LoadError::NoUsableFiles { failures }) => assert_eq!(failures.len(), 2),
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[test]
    fn duplicate_removal_is_opt_in() {
        let dir = tempfile::tempdir().unwrap();
        let path = write(dir.path(), "dupes.csv", "fare_amount\n1.5\n1.5\n2.0\n");
        let source = SourceDescriptor::Local { path, format: None };
        let kept = Loader::new(LoaderOptions::default()).load(&source).unwrap();
        assert_eq!(kept.table.row_count(), 3);
        let deduped = Loader::new(LoaderOptions {
            drop_duplicates: true,
            ..LoaderOptions::default()
        })
        .load(&source)
        .unwrap();
        assert_eq!(deduped.table.row_count(), 2);
        assert_eq!(deduped.duplicates_removed, 1);
    }

    #[test]
    fn empty_sample_is_an_error() {
        let mut loader = Loader::new(LoaderOptions::default());
        assert!(matches!(
            loader.load(&SourceDescriptor::Sample { rows: 0, seed: 1 }),
            Err(Error::Load(LoadError::Empty(_)))
        ));
        let loaded = loader.load(&SourceDescriptor::Sample { rows: 25, seed: 1 }).unwrap();
        assert_eq!(loaded.table.row_count(), 25);
    }
}
