use std::path::Path;

use calamine::{Data, Reader, open_workbook_auto};
use log::debug;

use crate::{
    data::{Value, parse_naive_datetime},
    error::{LoadError, Result},
    format::FileFormat,
    readers::malformed,
    schema::{ColumnMeta, ColumnType, is_temporal_name},
    trips::{Row, TripTable},
};

/// Reads the first worksheet of a workbook. The first non-empty row is the
/// header; blank header cells are named `column_<n>`.
pub fn read(path: &Path, source_name: &str) -> Result<TripTable> {
    let mut workbook =
        open_workbook_auto(path).map_err(|err| malformed(source_name, FileFormat::Xlsx, err))?;
    let sheet_names = workbook.sheet_names();
    let Some(sheet) = sheet_names.first() else {
        return Err(LoadError::Empty(source_name.to_string()).into());
    };
    debug!(
        "Reading sheet '{sheet}' (first of {}) from '{source_name}'",
        sheet_names.len()
    );
    let range = workbook
        .worksheet_range(sheet)
        .map_err(|err| malformed(source_name, FileFormat::Xlsx, err))?;

    let mut sheet_rows = range
        .rows()
        .skip_while(|row| row.iter().all(|cell| matches!(cell, Data::Empty)));
    let Some(header_row) = sheet_rows.next() else {
        return Err(LoadError::Empty(source_name.to_string()).into());
    };
    let width = range.width();
    let headers = (0..width)
        .map(|idx| {
            let name = header_row
                .get(idx)
                .map(|cell| cell.to_string().trim().to_string())
                .unwrap_or_default();
            if name.is_empty() {
                format!("column_{}", idx + 1)
            } else {
                name
            }
        })
        .collect::<Vec<_>>();

    let rows = sheet_rows
        .filter(|row| !row.iter().all(|cell| matches!(cell, Data::Empty)))
        .map(|row| {
            (0..width)
                .map(|idx| row.get(idx).and_then(cell_to_value))
                .collect::<Row>()
        })
        .collect::<Vec<_>>();

    let columns = headers
        .into_iter()
        .enumerate()
        .map(|(idx, name)| {
            let datatype = settle_type(&name, rows.iter().filter_map(|row| row[idx].as_ref()));
            ColumnMeta::new(name, datatype)
        })
        .collect::<Vec<_>>();
    let rows = rows
        .into_iter()
        .map(|row| {
            row.into_iter()
                .zip(&columns)
                .map(|(cell, column)| cell.and_then(|v| conform(v, &column.datatype)))
                .collect()
        })
        .collect();
    Ok(TripTable::new(columns, rows))
}

fn cell_to_value(cell: &Data) -> Option<Value> {
    match cell {
        Data::Empty | Data::Error(_) => None,
        Data::Int(v) => Some(Value::Integer(*v)),
        Data::Float(v) => Some(Value::Float(*v)),
        Data::Bool(v) => Some(Value::Boolean(*v)),
        Data::String(s) if s.trim().is_empty() => None,
        Data::String(s) => Some(Value::String(s.clone())),
        Data::DateTime(dt) => dt.as_datetime().map(Value::DateTime),
        Data::DateTimeIso(s) => parse_naive_datetime(s).ok().map(Value::DateTime),
        Data::DurationIso(s) => Some(Value::String(s.clone())),
    }
}

fn settle_type<'a>(name: &str, values: impl Iterator<Item = &'a Value>) -> ColumnType {
    let mut settled: Option<ColumnType> = None;
    let mut saw_timestamp_text = false;
    for value in values {
        if let Value::String(s) = value
            && parse_naive_datetime(s).is_ok()
        {
            saw_timestamp_text = true;
        }
        let observed = value.column_type();
        settled = Some(match settled {
            Some(current) => current.unify(&observed),
            None => observed,
        });
    }
    match settled {
        Some(ColumnType::String) if saw_timestamp_text && is_temporal_name(name) => {
            ColumnType::DateTime
        }
        Some(ty) => ty,
        None => ColumnType::Unknown,
    }
}

fn conform(value: Value, datatype: &ColumnType) -> Option<Value> {
    match (datatype, value) {
        (ColumnType::DateTime, Value::String(s)) => parse_naive_datetime(&s).ok().map(Value::DateTime),
        (ColumnType::DateTime, other @ Value::DateTime(_)) => Some(other),
        (ColumnType::DateTime, _) => None,
        (ty, other) => Some(other.coerce_to(ty)),
    }
}
