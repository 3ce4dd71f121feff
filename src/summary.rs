use std::collections::BTreeSet;

use anyhow::{Context, Result};
use log::info;
use serde::Serialize;

use crate::{
    cli::SummaryArgs,
    insights::{Insight, Overview},
    normalize::Locale,
    period::PeriodMetadata,
    session::{self, Session},
    stats::format_number,
    table,
};

#[derive(Debug, Serialize)]
pub struct SummaryReport {
    pub source: String,
    pub period: PeriodMetadata,
    pub period_label: String,
    pub overview: Overview,
    pub insights: Vec<Insight>,
    pub rows: usize,
    pub filtered_rows: usize,
    pub present_columns: BTreeSet<String>,
    pub renamed_columns: Vec<RenamedColumn>,
    pub files_loaded: usize,
    pub skipped_files: Vec<SkippedFile>,
}

#[derive(Debug, Serialize)]
pub struct RenamedColumn {
    pub source: String,
    pub canonical: String,
}

#[derive(Debug, Serialize)]
pub struct SkippedFile {
    pub file: String,
    pub reason: String,
}

pub fn execute(args: &SummaryArgs) -> Result<()> {
    let session = session::open(&args.source, &args.period, &args.filter)?;
    let report = build_report(&session)?;
    if args.json {
        let json = serde_json::to_string_pretty(&report).context("Serializing summary")?;
        println!("{json}");
    } else {
        print!("{}", render(&report, session.locale()));
    }
    info!(
        "Summarized {} of {} row(s)",
        report.filtered_rows, report.rows
    );
    Ok(())
}

pub fn build_report(session: &Session) -> Result<SummaryReport> {
    let dataset = session
        .dataset()
        .context("No dataset is loaded")?;
    Ok(SummaryReport {
        source: dataset.source.label(),
        period: dataset.period.clone(),
        period_label: dataset.period.label(session.locale()),
        overview: session.overview()?,
        insights: session.insights()?,
        rows: dataset.table.row_count(),
        filtered_rows: session.view()?.row_count(),
        present_columns: dataset.present_columns.clone(),
        renamed_columns: dataset
            .renamed
            .iter()
            .map(|(source, canonical)| RenamedColumn {
                source: source.clone(),
                canonical: canonical.clone(),
            })
            .collect(),
        files_loaded: dataset.files_loaded,
        skipped_files: dataset
            .failures
            .iter()
            .map(|failure| SkippedFile {
                file: failure.source_name.clone(),
                reason: failure.error.to_string(),
            })
            .collect(),
    })
}

/// Plain-text rendering: banner, headline metrics, insights, then load notes.
pub fn render(report: &SummaryReport, locale: Locale) -> String {
    let (period_title, overview_title, insights_title, none_text) = match locale {
        Locale::En => ("Period", "Overview", "Insights", "No insights available"),
        Locale::Id => ("Periode", "Ringkasan", "Wawasan", "Tidak ada wawasan"),
    };
    let mut output = format!("{period_title}: {}\n\n{overview_title}\n", report.period_label);
    output.push_str(&table::render_pairs(&overview_pairs(report, locale)));

    output.push_str(&format!("\n{insights_title}\n"));
    if report.insights.is_empty() {
        output.push_str(none_text);
        output.push('\n');
    } else {
        let pairs = report
            .insights
            .iter()
            .map(|insight| (insight.label.clone(), insight.text.clone()))
            .collect::<Vec<_>>();
        output.push_str(&table::render_pairs(&pairs));
    }

    if !report.renamed_columns.is_empty() {
        output.push_str("\nRenamed columns\n");
        for renamed in &report.renamed_columns {
            output.push_str(&format!("  {} -> {}\n", renamed.source, renamed.canonical));
        }
    }
    if !report.skipped_files.is_empty() {
        output.push_str(&format!(
            "\nLoaded {} file(s); skipped {}\n",
            report.files_loaded,
            report.skipped_files.len()
        ));
        for skipped in &report.skipped_files {
            output.push_str(&format!("  {}: {}\n", skipped.file, skipped.reason));
        }
    }
    output
}

fn overview_pairs(report: &SummaryReport, locale: Locale) -> Vec<(String, String)> {
    let labels: [&str; 6] = match locale {
        Locale::En => [
            "Trips",
            "Trips after filters",
            "Columns",
            "Average fare",
            "Average distance",
            "Total revenue",
        ],
        Locale::Id => [
            "Perjalanan",
            "Perjalanan setelah filter",
            "Kolom",
            "Rata-rata tarif",
            "Rata-rata jarak",
            "Total pendapatan",
        ],
    };
    let money = |v: Option<f64>| v.map(|v| format!("${v:.2}")).unwrap_or_else(|| "-".into());
    let overview = &report.overview;
    vec![
        (labels[0].to_string(), report.rows.to_string()),
        (labels[1].to_string(), report.filtered_rows.to_string()),
        (labels[2].to_string(), overview.columns.to_string()),
        (labels[3].to_string(), money(overview.average_fare)),
        (
            labels[4].to_string(),
            overview
                .average_distance
                .map(|v| format!("{} mi", format_number(v)))
                .unwrap_or_else(|| "-".into()),
        ),
        (labels[5].to_string(), money(overview.total_revenue)),
    ]
}
