use std::borrow::Cow;
use std::fmt::Write as _;

use crate::{
    normalize::{Locale, display_label},
    trips::TripTable,
};

/// Renders an aligned plain-text table. Columns whose cells are all numeric
/// are right-aligned; everything else is left-aligned.
pub fn render_table(headers: &[String], rows: &[Vec<String>]) -> String {
    let column_count = headers.len();
    let mut widths = headers.iter().map(|h| display_width(h)).collect::<Vec<_>>();
    let mut numeric = vec![!rows.is_empty(); column_count];

    for row in rows {
        for (idx, cell) in row.iter().enumerate().take(column_count) {
            widths[idx] = widths[idx].max(display_width(cell));
            if !cell.is_empty() && !looks_numeric(cell) {
                numeric[idx] = false;
            }
        }
    }

    for width in &mut widths {
        *width = (*width).max(1);
    }

    let mut output = String::new();
    let _ = writeln!(output, "{}", format_row(headers, &widths, &numeric));

    let separator_widths = widths.iter().map(|w| (*w).max(3)).collect::<Vec<usize>>();
    let separator_cells = separator_widths
        .iter()
        .map(|w| "-".repeat(*w))
        .collect::<Vec<_>>();
    let _ = writeln!(
        output,
        "{}",
        format_row(&separator_cells, &separator_widths, &numeric)
    );

    for row in rows {
        let _ = writeln!(output, "{}", format_row(row, &widths, &numeric));
    }

    output
}

pub fn print_table(headers: &[String], rows: &[Vec<String>]) {
    let rendered = render_table(headers, rows);
    print!("{rendered}");
}

/// Headers (as localized labels) and display cells of a trip table. Missing
/// cells render empty.
pub fn trip_rows(table: &TripTable, locale: Locale) -> (Vec<String>, Vec<Vec<String>>) {
    let headers = table
        .columns()
        .iter()
        .map(|c| display_label(&c.name, locale).to_string())
        .collect();
    let rows = table
        .rows()
        .iter()
        .map(|row| {
            row.iter()
                .map(|cell| cell.as_ref().map(|v| v.as_display()).unwrap_or_default())
                .collect()
        })
        .collect();
    (headers, rows)
}

/// Two-column `label  value` listing without a header.
pub fn render_pairs(pairs: &[(String, String)]) -> String {
    let width = pairs
        .iter()
        .map(|(label, _)| display_width(label))
        .max()
        .unwrap_or(0);
    let mut output = String::new();
    for (label, value) in pairs {
        let padding = width.saturating_sub(display_width(label));
        let _ = writeln!(
            output,
            "{label}{}  {}",
            " ".repeat(padding),
            sanitize_cell(value)
        );
    }
    output
}

fn looks_numeric(cell: &str) -> bool {
    let trimmed = cell.trim_start_matches('$').trim_end_matches('%');
    trimmed.parse::<f64>().is_ok()
}

fn format_row(values: &[String], widths: &[usize], right_align: &[bool]) -> String {
    let mut cells = Vec::with_capacity(values.len());
    for (idx, value) in values.iter().enumerate() {
        if idx >= widths.len() {
            break;
        }
        let sanitized = sanitize_cell(value);
        let padding = widths[idx].saturating_sub(display_width(sanitized.as_ref()));
        let pad = " ".repeat(padding);
        if right_align.get(idx).copied().unwrap_or(false) {
            cells.push(format!("{pad}{sanitized}"));
        } else {
            cells.push(format!("{sanitized}{pad}"));
        }
    }
    let mut line = cells.join("  ");
    while line.ends_with(' ') {
        line.pop();
    }
    line
}

fn display_width(value: &str) -> usize {
    let mut width = 0usize;
    let mut chars = value.chars();
    while let Some(ch) = chars.next() {
        if ch == '\u{1b}' {
            // Skip ANSI escape sequence (e.g. \x1b[31m)
            for next in chars.by_ref() {
                if next == 'm' {
                    break;
                }
            }
        } else {
            width += 1;
        }
    }
    width
}

fn sanitize_cell(value: &str) -> Cow<'_, str> {
    if value.contains(['\n', '\r', '\t']) {
        Cow::Owned(value.replace(['\n', '\r', '\t'], " "))
    } else {
        Cow::Borrowed(value)
    }
}
