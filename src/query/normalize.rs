use crate::query::result::{CellValue, QueryResult};
use serde::Serialize;
use std::collections::HashSet;
use tracing::{debug, warn};

const NULL_TEXT: &str = "NULL";

/// Flattens every column that holds a list or struct value to text.
///
/// Every cell in such a column becomes text, nulls included (`NULL`). Columns
/// without composite values keep their native types.
pub fn normalize(mut result: QueryResult) -> QueryResult {
    let width = result.columns.len();

    for (row_index, row) in result.rows.iter().enumerate() {
        if row.len() != width {
            warn!(
                "Row {} has {} values but the result has {} columns",
                row_index,
                row.len(),
                width
            );
        }
    }

    for col in 0..width {
        let has_composite = result.column_values(col).any(CellValue::is_composite);
        if !has_composite {
            continue;
        }

        debug!("Converting column '{}' to text", result.columns[col]);
        for row in result.rows.iter_mut() {
            if let Some(cell) = row.get_mut(col) {
                match cell {
                    CellValue::Text(_) => {}
                    CellValue::Null => *cell = CellValue::Text(NULL_TEXT.to_string()),
                    _ => *cell = CellValue::Text(cell.to_display_string()),
                }
            }
        }
    }

    result
}

/// Column facts the presentation layer needs to decide on a chart.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
pub struct ResultProfile {
    /// Columns whose non-null values are all numeric.
    pub numeric_columns: Vec<String>,
    /// Columns with one distinct non-null value per row.
    pub index_candidates: Vec<String>,
    /// First column, when it qualifies as an index.
    pub index_column: Option<String>,
    /// Default series to plot.
    pub chart_series: Option<String>,
}

impl ResultProfile {
    pub fn from_result(result: &QueryResult) -> Self {
        let mut profile = ResultProfile::default();
        if result.is_empty() {
            return profile;
        }

        for (col, name) in result.columns.iter().enumerate() {
            if is_numeric_column(result, col) {
                profile.numeric_columns.push(name.clone());
            }
            if distinct_count(result, col) == result.row_count() {
                profile.index_candidates.push(name.clone());
            }
        }

        profile.index_column = result
            .columns
            .first()
            .filter(|first| profile.index_candidates.contains(first))
            .cloned();

        profile.chart_series = profile
            .numeric_columns
            .iter()
            .find(|name| Some(*name) != profile.index_column.as_ref())
            .cloned();

        profile
    }
}

fn is_numeric_column(result: &QueryResult, col: usize) -> bool {
    let mut seen_number = false;
    for value in result.column_values(col) {
        match value {
            CellValue::Null => {}
            v if v.is_numeric() => seen_number = true,
            _ => return false,
        }
    }
    seen_number
}

fn distinct_count(result: &QueryResult, col: usize) -> usize {
    result
        .column_values(col)
        .filter(|v| !v.is_null())
        .map(distinct_key)
        .collect::<HashSet<_>>()
        .len()
}

// Floats are not `Hash`, so values are keyed by a type tag plus display form.
fn distinct_key(value: &CellValue) -> (u8, String) {
    let tag = match value {
        CellValue::Null => 0,
        CellValue::Bool(_) => 1,
        CellValue::Int(_) => 2,
        CellValue::Float(_) => 3,
        CellValue::Text(_) => 4,
        CellValue::Date(_) => 5,
        CellValue::Timestamp(_) => 6,
        CellValue::List(_) => 7,
        CellValue::Struct(_) => 8,
    };
    (tag, value.to_display_string())
}
