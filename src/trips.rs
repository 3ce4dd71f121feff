//! In-memory trip table.
//!
//! A [`TripTable`] is a row-major grid of optional typed cells plus column
//! metadata. No column is mandatory: callers ask [`TripTable::has_column`]
//! (or use the `Option`-returning accessors) before touching a field. Tables
//! are never mutated in place once loaded; every transformation returns a new
//! table.

use std::collections::{BTreeSet, HashSet};

use log::debug;

use crate::{
    data::Value,
    schema::{ColumnMeta, ColumnType},
};

pub type Row = Vec<Option<Value>>;

#[derive(Debug, Clone, PartialEq, Default)]
pub struct TripTable {
    columns: Vec<ColumnMeta>,
    rows: Vec<Row>,
}

impl TripTable {
    /// Builds a table; rows shorter than the header are padded with missing
    /// cells and longer rows are truncated.
    pub fn new(columns: Vec<ColumnMeta>, rows: Vec<Row>) -> Self {
        let width = columns.len();
        let rows = rows
            .into_iter()
            .map(|mut row| {
                row.resize(width, None);
                row
            })
            .collect();
        Self { columns, rows }
    }

    pub fn columns(&self) -> &[ColumnMeta] {
        &self.columns
    }

    pub fn column_names(&self) -> Vec<String> {
        self.columns.iter().map(|c| c.name.clone()).collect()
    }

    pub fn present_columns(&self) -> BTreeSet<String> {
        self.columns.iter().map(|c| c.name.clone()).collect()
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c.name == name)
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.column_index(name).is_some()
    }

    pub fn column_type(&self, name: &str) -> Option<&ColumnType> {
        self.column_index(name).map(|idx| &self.columns[idx].datatype)
    }

    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn rows(&self) -> &[Row] {
        &self.rows
    }

    /// Cells of one column, or `None` when the column is absent.
    pub fn column_values(&self, name: &str) -> Option<impl Iterator<Item = Option<&Value>>> {
        let idx = self.column_index(name)?;
        Some(self.rows.iter().map(move |row| row[idx].as_ref()))
    }

    /// Non-missing numeric cells of one column, or `None` when absent.
    pub fn numeric_values(&self, name: &str) -> Option<Vec<f64>> {
        Some(
            self.column_values(name)?
                .filter_map(|value| value.and_then(Value::as_f64))
                .collect(),
        )
    }

    /// Non-missing display strings of one column, or `None` when absent.
    pub fn text_values(&self, name: &str) -> Option<Vec<String>> {
        Some(
            self.column_values(name)?
                .flatten()
                .map(Value::as_display)
                .collect(),
        )
    }

    pub fn numeric_columns(&self) -> Vec<&ColumnMeta> {
        self.columns
            .iter()
            .filter(|c| c.datatype.is_numeric())
            .collect()
    }

    pub fn categorical_columns(&self) -> Vec<&ColumnMeta> {
        self.columns
            .iter()
            .filter(|c| matches!(c.datatype, ColumnType::String | ColumnType::Boolean))
            .collect()
    }

    pub fn temporal_columns(&self) -> Vec<&ColumnMeta> {
        self.columns
            .iter()
            .filter(|c| c.datatype == ColumnType::DateTime)
            .collect()
    }

    /// Returns a new table holding the rows for which `keep` returns true,
    /// in their original order.
    pub fn filter_rows<F>(&self, mut keep: F) -> TripTable
    where
        F: FnMut(&[Option<Value>]) -> bool,
    {
        TripTable {
            columns: self.columns.clone(),
            rows: self
                .rows
                .iter()
                .filter(|row| keep(row))
                .cloned()
                .collect(),
        }
    }

    pub fn head(&self, count: usize) -> TripTable {
        TripTable {
            columns: self.columns.clone(),
            rows: self.rows.iter().take(count).cloned().collect(),
        }
    }

    /// Returns a copy with column names replaced through `rename`.
    pub fn with_renamed_columns<F>(&self, mut rename: F) -> TripTable
    where
        F: FnMut(usize, &str) -> Option<String>,
    {
        let columns = self
            .columns
            .iter()
            .enumerate()
            .map(|(idx, column)| match rename(idx, &column.name) {
                Some(name) => ColumnMeta::new(name, column.datatype.clone()),
                None => column.clone(),
            })
            .collect();
        TripTable {
            columns,
            rows: self.rows.clone(),
        }
    }

    /// Returns a copy in which column `name` is rewritten cell by cell.
    /// Returns `None` when the column is absent.
    pub fn map_column<F>(&self, name: &str, datatype: ColumnType, mut map: F) -> Option<TripTable>
    where
        F: FnMut(Option<&Value>) -> Option<Value>,
    {
        let idx = self.column_index(name)?;
        let mut columns = self.columns.clone();
        columns[idx].datatype = datatype;
        let rows = self
            .rows
            .iter()
            .map(|row| {
                let mut row = row.clone();
                row[idx] = map(row[idx].as_ref());
                row
            })
            .collect();
        Some(TripTable { columns, rows })
    }

    /// Removes rows that repeat an earlier row cell for cell. Returns the
    /// de-duplicated table and the number of rows removed.
    pub fn drop_duplicates(&self) -> (TripTable, usize) {
        let mut seen = HashSet::with_capacity(self.rows.len());
        let deduped = self.filter_rows(|row| seen.insert(row_key(row)));
        let removed = self.rows.len() - deduped.rows.len();
        (deduped, removed)
    }

    /// Stacks tables vertically over the union of their columns.
    ///
    /// Columns keep the order of first appearance. A column missing from a
    /// table yields missing cells for that table's rows; columns whose types
    /// disagree are widened with [`ColumnType::unify`].
    pub fn concat(tables: Vec<TripTable>) -> TripTable {
        let mut columns: Vec<ColumnMeta> = Vec::new();
        for table in &tables {
            for column in &table.columns {
                match columns.iter_mut().find(|c| c.name == column.name) {
                    Some(existing) => {
                        let unified = existing.datatype.unify(&column.datatype);
                        if unified != existing.datatype {
                            debug!(
                                "Column '{}' widened from {} to {}",
                                column.name, existing.datatype, unified
                            );
                        }
                        existing.datatype = unified;
                    }
                    None => columns.push(column.clone()),
                }
            }
        }

        let total_rows = tables.iter().map(|t| t.rows.len()).sum();
        let mut rows = Vec::with_capacity(total_rows);
        for table in tables {
            let positions = table
                .columns
                .iter()
                .map(|column| {
                    columns
                        .iter()
                        .position(|c| c.name == column.name)
                        .unwrap_or_default()
                })
                .collect::<Vec<_>>();
            for row in table.rows {
                let mut merged: Row = vec![None; columns.len()];
                for (source_idx, cell) in row.into_iter().enumerate() {
                    let target = positions[source_idx];
                    merged[target] = cell.map(|value| value.coerce_to(&columns[target].datatype));
                }
                rows.push(merged);
            }
        }
        TripTable { columns, rows }
    }
}

fn row_key(row: &[Option<Value>]) -> String {
    row.iter()
        .map(|cell| match cell {
            Some(value) => value.as_display(),
            None => String::from("\u{0}"),
        })
        .collect::<Vec<_>>()
        .join("\u{1f}")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table(columns: &[(&str, ColumnType)], rows: Vec<Row>) -> TripTable {
        TripTable::new(
            columns
                .iter()
                .map(|(name, ty)| ColumnMeta::new(*name, ty.clone()))
                .collect(),
            rows,
        )
    }

    #[test]
    fn concat_unions_columns_and_keeps_order() {
        let a = table(
            &[("fare_amount", ColumnType::Integer)],
            vec![vec![Some(Value::Integer(5))]],
        );
        let b = table(
            &[("tip_amount", ColumnType::Float), ("fare_amount", ColumnType::Float)],
            vec![vec![Some(Value::Float(1.5)), Some(Value::Float(7.25))]],
        );
        let merged = TripTable::concat(vec![a, b]);
        assert_eq!(merged.column_names(), vec!["fare_amount", "tip_amount"]);
        assert_eq!(merged.column_type("fare_amount"), Some(&ColumnType::Float));
        assert_eq!(
            merged.rows(),
            &[
                vec![Some(Value::Float(5.0)), None],
                vec![Some(Value::Float(7.25)), Some(Value::Float(1.5))],
            ]
        );
    }

    #[test]
    fn drop_duplicates_counts_removed_rows() {
        let t = table(
            &[("a", ColumnType::Integer)],
            vec![
                vec![Some(Value::Integer(1))],
                vec![Some(Value::Integer(1))],
                vec![None],
            ],
        );
        let (deduped, removed) = t.drop_duplicates();
        assert_eq!(removed, 1);
        assert_eq!(deduped.row_count(), 2);
    }

    #[test]
    fn absent_columns_report_none() {
        let t = table(&[("a", ColumnType::Integer)], vec![]);
        assert!(t.numeric_values("fare_amount").is_none());
        assert_eq!(t.numeric_values("a"), Some(vec![]));
    }

    #[test]
    fn new_pads_short_rows() {
        let t = table(
            &[("a", ColumnType::Integer), ("b", ColumnType::Integer)],
            vec![vec![Some(Value::Integer(1))]],
        );
        assert_eq!(t.rows()[0], vec![Some(Value::Integer(1)), None]);
    }
}
