use std::{fs::File, path::Path};

use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime};
use parquet::{
    file::reader::{FileReader, SerializedFileReader},
    record::Field,
};

use crate::{
    data::Value,
    error::{LoadError, Result},
    format::FileFormat,
    readers::malformed,
    schema::{ColumnMeta, ColumnType},
    trips::{Row, TripTable},
};

/// Reads a Parquet file through the row-oriented record API. Types come from
/// the file itself; column types are settled by the first non-null value
/// seen per column and widened when later values disagree.
pub fn read(path: &Path, source_name: &str) -> Result<TripTable> {
    let file = File::open(path).map_err(|source| LoadError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let reader = SerializedFileReader::new(file)
        .map_err(|err| malformed(source_name, FileFormat::Parquet, err))?;
    let names = reader
        .metadata()
        .file_metadata()
        .schema()
        .get_fields()
        .iter()
        .map(|field| field.name().to_string())
        .collect::<Vec<_>>();

    let mut types: Vec<Option<ColumnType>> = vec![None; names.len()];
    let mut rows: Vec<Row> = Vec::with_capacity(reader.metadata().file_metadata().num_rows().max(0) as usize);
    let iter = reader
        .get_row_iter(None)
        .map_err(|err| malformed(source_name, FileFormat::Parquet, err))?;
    for record in iter {
        let record = record.map_err(|err| malformed(source_name, FileFormat::Parquet, err))?;
        let mut row: Row = vec![None; names.len()];
        for (name, field) in record.get_column_iter() {
            let Some(idx) = names.iter().position(|n| n == name) else {
                continue;
            };
            let value = field_to_value(field);
            if let Some(value) = &value {
                let observed = value.column_type();
                types[idx] = Some(match &types[idx] {
                    Some(current) => current.unify(&observed),
                    None => observed,
                });
            }
            row[idx] = value;
        }
        rows.push(row);
    }

    let columns = names
        .into_iter()
        .zip(types.iter())
        .map(|(name, ty)| ColumnMeta::new(name, ty.clone().unwrap_or(ColumnType::Unknown)))
        .collect::<Vec<_>>();
    let rows = rows
        .into_iter()
        .map(|row| {
            row.into_iter()
                .zip(&columns)
                .map(|(cell, column)| cell.map(|v| v.coerce_to(&column.datatype)))
                .collect()
        })
        .collect();
    Ok(TripTable::new(columns, rows))
}

fn field_to_value(field: &Field) -> Option<Value> {
    let value = match field {
        Field::Null => return None,
        Field::Bool(b) => Value::Boolean(*b),
        Field::Byte(v) => Value::Integer(i64::from(*v)),
        Field::Short(v) => Value::Integer(i64::from(*v)),
        Field::Int(v) => Value::Integer(i64::from(*v)),
        Field::Long(v) => Value::Integer(*v),
        Field::UByte(v) => Value::Integer(i64::from(*v)),
        Field::UShort(v) => Value::Integer(i64::from(*v)),
        Field::UInt(v) => Value::Integer(i64::from(*v)),
        Field::ULong(v) => Value::Integer(i64::try_from(*v).ok()?),
        Field::Float(v) => Value::Float(f64::from(*v)),
        Field::Double(v) => Value::Float(*v),
        Field::Str(s) => Value::String(s.clone()),
        Field::Date(days) => Value::DateTime(epoch_date(*days)?.and_time(NaiveTime::MIN)),
        Field::TimestampMillis(ms) => Value::DateTime(naive_from_micros(ms.checked_mul(1_000)?)?),
        Field::TimestampMicros(us) => Value::DateTime(naive_from_micros(*us)?),
        other => Value::String(other.to_string()),
    };
    Some(value)
}

fn epoch_date(days: i32) -> Option<NaiveDate> {
    NaiveDate::from_ymd_opt(1970, 1, 1)?.checked_add_signed(chrono::Duration::days(i64::from(days)))
}

fn naive_from_micros(micros: i64) -> Option<NaiveDateTime> {
    DateTime::from_timestamp_micros(micros).map(|dt| dt.naive_utc())
}
