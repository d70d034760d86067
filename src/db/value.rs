use crate::query::CellValue;
use chrono::{DateTime, NaiveDate, NaiveTime};
use duckdb::types::{TimeUnit, Value};

fn to_micros(unit: TimeUnit, value: i64) -> i64 {
    match unit {
        TimeUnit::Second => value.saturating_mul(1_000_000),
        TimeUnit::Millisecond => value.saturating_mul(1_000),
        TimeUnit::Microsecond => value,
        TimeUnit::Nanosecond => value / 1_000,
    }
}

fn wide_int<T>(value: T) -> CellValue
where
    T: TryInto<i64> + ToString + Copy,
{
    match value.try_into() {
        Ok(i) => CellValue::Int(i),
        Err(_) => CellValue::Text(value.to_string()),
    }
}

/// Renders bytes the way DuckDB prints a BLOB: printable ASCII as is, the rest
/// as `\xHH`.
fn blob_text(bytes: &[u8]) -> String {
    let mut out = String::with_capacity(bytes.len());
    for &b in bytes {
        if (32..=126).contains(&b) && !matches!(b, b'\\' | b'\'' | b'"') {
            out.push(b as char);
        } else {
            out.push_str(&format!("\\x{:02X}", b));
        }
    }
    out
}

/// Converts a DuckDB value into a driver-independent cell.
pub fn to_cell(value: Value) -> CellValue {
    match value {
        Value::Null => CellValue::Null,
        Value::Boolean(b) => CellValue::Bool(b),
        Value::TinyInt(i) => CellValue::Int(i.into()),
        Value::SmallInt(i) => CellValue::Int(i.into()),
        Value::Int(i) => CellValue::Int(i.into()),
        Value::BigInt(i) => CellValue::Int(i),
        Value::HugeInt(i) => wide_int(i),
        Value::UTinyInt(u) => CellValue::Int(u.into()),
        Value::USmallInt(u) => CellValue::Int(u.into()),
        Value::UInt(u) => CellValue::Int(u.into()),
        Value::UBigInt(u) => wide_int(u),
        Value::Float(f) => CellValue::Float(f.into()),
        Value::Double(f) => CellValue::Float(f),
        Value::Decimal(d) => {
            let text = d.to_string();
            text.parse::<f64>()
                .map(CellValue::Float)
                .unwrap_or(CellValue::Text(text))
        }
        Value::Text(s) | Value::Enum(s) => CellValue::Text(s),
        Value::Blob(bytes) => CellValue::Text(blob_text(&bytes)),
        Value::Date32(days) => NaiveDate::from_ymd_opt(1970, 1, 1)
            .and_then(|epoch| epoch.checked_add_signed(chrono::Duration::days(days.into())))
            .map(CellValue::Date)
            .unwrap_or(CellValue::Int(days.into())),
        Value::Timestamp(unit, v) => DateTime::from_timestamp_micros(to_micros(unit, v))
            .map(|ts| CellValue::Timestamp(ts.naive_utc()))
            .unwrap_or(CellValue::Int(v)),
        Value::Time64(unit, v) => {
            let micros = to_micros(unit, v);
            let secs = (micros / 1_000_000) as u32;
            let nanos = ((micros % 1_000_000) * 1_000) as u32;
            NaiveTime::from_num_seconds_from_midnight_opt(secs, nanos)
                .map(|t| CellValue::Text(t.to_string()))
                .unwrap_or(CellValue::Int(v))
        }
        Value::Interval {
            months,
            days,
            nanos,
        } => CellValue::Text(format!(
            "{} months {} days {} microseconds",
            months,
            days,
            nanos / 1_000
        )),
        Value::List(items) | Value::Array(items) => {
            CellValue::List(items.into_iter().map(to_cell).collect())
        }
        Value::Struct(fields) => CellValue::Struct(
            fields
                .iter()
                .map(|(key, value)| (key.clone(), to_cell(value.clone())))
                .collect(),
        ),
        Value::Map(entries) => CellValue::Struct(
            entries
                .iter()
                .map(|(key, value)| (to_cell(key.clone()).to_string(), to_cell(value.clone())))
                .collect(),
        ),
        Value::Union(inner) => to_cell(*inner),
        #[allow(unreachable_patterns)]
        other => CellValue::Text(format!("{:?}", other)),
    }
}
