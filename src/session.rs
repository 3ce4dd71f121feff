//! One interactive session.
//!
//! The session owns the loader (and its cache), the currently loaded table
//! and the active filter selection. Loading runs the whole pipeline:
//! load, normalize column names, decode dictionary columns, resolve the
//! period. Every (re)load replaces the previous table and period and resets
//! the filters.

use std::{collections::BTreeSet, sync::Arc, time::Duration};

use anyhow::Context;
use itertools::Itertools;
use log::{info, warn};

use crate::{
    cli::{FilterArgs, PeriodArgs, SourceArgs},
    data::parse_naive_date,
    dictionary,
    error::{FileFailure, LoadError, Result, ValidationError},
    filter::{self, FilterState},
    insights::{self, Insight, Overview},
    io_utils,
    loader::{Loader, LoaderOptions, SourceDescriptor},
    normalize::{self, Locale},
    period::{self, PeriodMetadata, PeriodRequest},
    trips::TripTable,
};

/// The normalized table of the current load plus what is known about it.
#[derive(Debug)]
pub struct Dataset {
    pub source: SourceDescriptor,
    pub table: Arc<TripTable>,
    pub present_columns: BTreeSet<String>,
    /// `(source, canonical)` column renames applied by the normalizer.
    pub renamed: Vec<(String, String)>,
    pub period: PeriodMetadata,
    pub failures: Vec<FileFailure>,
    pub files_loaded: usize,
}

#[derive(Debug)]
pub struct Session {
    loader: Loader,
    locale: Locale,
    dataset: Option<Dataset>,
    filters: FilterState,
}

impl Session {
    pub fn new(options: LoaderOptions, locale: Locale) -> Self {
        Self {
            loader: Loader::new(options),
            locale,
            dataset: None,
            filters: FilterState::default(),
        }
    }

    pub fn locale(&self) -> Locale {
        self.locale
    }

    /// Loads `source` and replaces the current dataset. On failure the
    /// previous dataset and filters are left untouched.
    pub fn load(&mut self, source: SourceDescriptor, request: &PeriodRequest) -> Result<&Dataset> {
        let loaded = self.loader.load(&source)?;
        let normalized = normalize::normalize(&loaded.table);
        let table = dictionary::apply_dictionaries(&normalized.table, self.locale);
        let period = period::resolve(&table, request)?;
        info!("Period: {}", period.label(self.locale));

        self.filters.reset();
        Ok(&*self.dataset.insert(Dataset {
            source,
            table: Arc::new(table),
            present_columns: normalized.present_columns,
            renamed: normalized.renamed,
            period,
            failures: loaded.failures,
            files_loaded: loaded.files_loaded,
        }))
    }

    pub fn dataset(&self) -> Option<&Dataset> {
        self.dataset.as_ref()
    }

    pub fn filters(&self) -> &FilterState {
        &self.filters
    }

    pub fn set_filters(&mut self, filters: FilterState) {
        self.filters = filters;
    }

    pub fn reset_filters(&mut self) {
        self.filters.reset();
    }

    /// The loaded table with the active filters applied.
    pub fn view(&self) -> Result<TripTable> {
        let dataset = self.dataset.as_ref().ok_or(LoadError::NoInput)?;
        Ok(self.filters.apply(&dataset.table))
    }

    pub fn insights(&self) -> Result<Vec<Insight>> {
        Ok(insights::generate(&self.view()?, self.locale))
    }

    pub fn overview(&self) -> Result<Overview> {
        Ok(insights::overview(&self.view()?))
    }
}

/// Builds the source descriptor selected on the command line.
pub fn source_descriptor(args: &SourceArgs) -> Result<SourceDescriptor> {
    if args.sample {
        return Ok(SourceDescriptor::Sample {
            rows: args.sample_rows,
            seed: args.sample_seed,
        });
    }
    if let Some(link) = &args.url {
        return Ok(SourceDescriptor::Remote {
            link: link.clone(),
            format: args.format,
        });
    }
    SourceDescriptor::from_paths(args.inputs.clone(), args.format).ok_or_else(|| LoadError::NoInput.into())
}

pub fn loader_options(args: &SourceArgs) -> anyhow::Result<LoaderOptions> {
    Ok(LoaderOptions {
        timeout: Duration::from_secs(args.timeout_secs),
        encoding: io_utils::resolve_encoding(args.input_encoding.as_deref())?,
        drop_duplicates: args.drop_duplicates,
    })
}

pub fn period_request(args: &PeriodArgs) -> Result<PeriodRequest, ValidationError> {
    if let (Some(from), Some(to)) = (&args.from, &args.to) {
        let date = |raw: &str| {
            parse_naive_date(raw).map_err(|err| ValidationError::Input {
                what: "date",
                value: raw.to_string(),
                reason: err.to_string(),
            })
        };
        return Ok(PeriodRequest::DateRange {
            start: date(from)?,
            end: date(to)?,
        });
    }
    Ok(match (args.month, args.year, args.end_month, args.end_year) {
        (Some(start_month), Some(start_year), Some(end_month), Some(end_year)) => {
            PeriodRequest::MonthRange {
                start_month,
                start_year,
                end_month,
                end_year,
            }
        }
        (Some(month), Some(year), _, _) => PeriodRequest::Month { month, year },
        _ => PeriodRequest::AutoDetect,
    })
}

/// Filter selection from a saved YAML file, overlaid with any command-line
/// selections.
pub fn filter_state(args: &FilterArgs) -> anyhow::Result<FilterState> {
    let mut state = match &args.filters_file {
        Some(path) => FilterState::from_yaml_path(path)?,
        None => FilterState::default(),
    };
    let overrides = filter::parse_filters(args.date_range.as_deref(), &args.ranges, &args.categories)?;
    if overrides.date_range.is_some() {
        state.date_range = overrides.date_range;
    }
    state.numeric.extend(overrides.numeric);
    state.categories.extend(overrides.categories);
    Ok(state)
}

/// Opens a session from command-line groups: load, then apply filters.
pub fn open(source: &SourceArgs, period: &PeriodArgs, filters: &FilterArgs) -> anyhow::Result<Session> {
    let request = period_request(period)?;
    let descriptor = source_descriptor(source)?;
    let label = descriptor.label();
    let state = filter_state(filters)?;

    let mut session = Session::new(loader_options(source)?, source.locale);
    let dataset = session
        .load(descriptor, &request)
        .with_context(|| format!("Loading {label}"))?;
    if !dataset.failures.is_empty() {
        warn!(
            "Loaded {} file(s); skipped {}: {}",
            dataset.files_loaded,
            dataset.failures.len(),
            dataset
                .failures
                .iter()
                .map(|failure| failure.source_name.as_str())
                .join(", ")
        );
    }
    session.set_filters(state);
    Ok(session)
}
