use std::collections::HashMap;

use anyhow::{Result, anyhow};
use log::info;
use serde::Serialize;

use crate::{cli::FrequencyArgs, session, table, trips::TripTable};

const DEFAULT_COLUMN_COUNT: usize = 3;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ValueCount {
    pub value: String,
    pub count: usize,
    /// Share of non-missing cells, 0-100.
    pub percent: f64,
}

pub fn execute(args: &FrequencyArgs) -> Result<()> {
    let session = session::open(&args.source, &args.period, &args.filter)?;
    let view = session.view()?;

    let columns = if args.columns.is_empty() {
        view.categorical_columns()
            .into_iter()
            .take(DEFAULT_COLUMN_COUNT)
            .map(|c| c.name.clone())
            .collect::<Vec<_>>()
    } else {
        if let Some(missing) = args.columns.iter().find(|name| !view.has_column(name)) {
            return Err(anyhow!("Column '{missing}' not found"));
        }
        args.columns.clone()
    };
    if columns.is_empty() {
        return Err(anyhow!(
            "No categorical columns available. Supply --columns to continue."
        ));
    }

    let mut rows = Vec::new();
    for column in &columns {
        for item in top_values(&view, column, args.top).unwrap_or_default() {
            rows.push(vec![
                column.clone(),
                item.value,
                item.count.to_string(),
                format!("{:.2}%", item.percent),
            ]);
        }
    }
    let headers = vec![
        "column".to_string(),
        "value".to_string(),
        "count".to_string(),
        "percent".to_string(),
    ];
    table::print_table(&headers, &rows);
    info!("Computed frequency counts for {} column(s)", columns.len());
    Ok(())
}

/// Most frequent display values of `column`, by count descending then value
/// ascending. `top == 0` keeps every value. `None` when the column is absent.
pub fn top_values(table: &TripTable, column: &str, top: usize) -> Option<Vec<ValueCount>> {
    let values = table.text_values(column)?;
    let total = values.len();
    let mut counts: HashMap<String, usize> = HashMap::new();
    for value in values {
        *counts.entry(value).or_insert(0) += 1;
    }
    let mut items = counts.into_iter().collect::<Vec<_>>();
    items.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
    if top > 0 && items.len() > top {
        items.truncate(top);
    }
    Some(
        items
            .into_iter()
            .map(|(value, count)| ValueCount {
                value,
                count,
                percent: (count as f64 / total as f64) * 100.0,
            })
            .collect(),
    )
}
