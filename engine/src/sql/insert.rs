//! Bulk insert rendering for hot-cache flushes
//!
//! Upstream payloads are heterogeneous; each record is projected onto the
//! table's allowed-field list. Unknown fields are dropped, missing ones get
//! the column default (or `NULL`, which the server turns into the type
//! default), and every value is coerced by column kind.

use super::{datetime_literal, quote_str};
use crate::tables::{Column, ColumnKind};
use strata_shared::utils::time::{datetime_from_epoch, parse_datetime};
use strata_shared::{FieldValue, Record};

/// A rendered insert and the number of rows it carries.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InsertStatement {
    pub sql: String,
    pub rows: usize,
}

/// Renders escaped, type-coerced `INSERT ... VALUES` statements.
#[derive(Debug, Clone, Copy, Default)]
pub struct BatchSqlBuilder;

impl BatchSqlBuilder {
    /// Build one insert for `records` into `table` (already qualified).
    ///
    /// Records sharing no field with `columns` are skipped. Returns `None`
    /// when nothing is left to insert; callers treat that as a no-op.
    pub fn build(table: &str, columns: &[Column], records: &[Record]) -> Option<InsertStatement> {
        if columns.is_empty() {
            return None;
        }

        let rows: Vec<String> = records
            .iter()
            .filter(|record| columns.iter().any(|c| record.fields.contains_key(&c.name)))
            .map(|record| {
                let values: Vec<String> = columns
                    .iter()
                    .map(|column| render_value(column, record.get(&column.name)))
                    .collect();
                format!("({})", values.join(", "))
            })
            .collect();

        if rows.is_empty() {
            return None;
        }

        let column_list: Vec<&str> = columns.iter().map(|c| c.name.as_str()).collect();
        Some(InsertStatement {
            sql: format!(
                "INSERT INTO {} ({}) VALUES {}",
                table,
                column_list.join(", "),
                rows.join(", ")
            ),
            rows: rows.len(),
        })
    }
}

fn render_value(column: &Column, value: Option<&FieldValue>) -> String {
    let rendered = match value {
        None | Some(FieldValue::Null) => None,
        Some(value) => match column.kind {
            ColumnKind::Text => Some(render_text(value)),
            ColumnKind::Decimal => render_decimal(value),
            ColumnKind::Integer => render_integer(value),
            ColumnKind::Bool => render_bool(value),
            ColumnKind::Timestamp => Some(render_timestamp(value)),
            ColumnKind::Json => Some(render_json(value)),
        },
    };
    rendered.unwrap_or_else(|| column.default.unwrap_or("NULL").to_string())
}

fn render_text(value: &FieldValue) -> String {
    match value {
        FieldValue::Text(s) => quote_str(s),
        FieldValue::Number(n) => quote_str(&n.to_string()),
        FieldValue::Bool(b) => quote_str(if *b { "true" } else { "false" }),
        FieldValue::Null => "NULL".to_string(),
        nested => render_json(nested),
    }
}

/// Decimals keep their textual form so the server parses them exactly.
fn render_decimal(value: &FieldValue) -> Option<String> {
    match value {
        FieldValue::Number(n) => Some(n.to_string()),
        FieldValue::Text(s) if is_decimal_text(s.trim()) => Some(s.trim().to_string()),
        _ => None,
    }
}

fn is_decimal_text(s: &str) -> bool {
    !s.is_empty()
        && s.chars().any(|c| c.is_ascii_digit())
        && s
            .chars()
            .all(|c| c.is_ascii_digit() || matches!(c, '.' | '-' | '+' | 'e' | 'E'))
        && s.parse::<f64>().map_or(false, f64::is_finite)
}

fn render_integer(value: &FieldValue) -> Option<String> {
    match value {
        FieldValue::Number(n) => {
            if n.is_i64() || n.is_u64() {
                Some(n.to_string())
            } else {
                n.as_f64()
                    .filter(|f| f.fract() == 0.0 && f.is_finite())
                    .map(|f| format!("{}", f as i64))
            }
        }
        FieldValue::Text(s) => s.trim().parse::<i64>().ok().map(|i| i.to_string()),
        _ => None,
    }
}

fn render_bool(value: &FieldValue) -> Option<String> {
    let b = match value {
        FieldValue::Bool(b) => *b,
        FieldValue::Number(n) => n.as_f64().map(|f| f != 0.0)?,
        FieldValue::Text(s) => match s.trim().to_ascii_lowercase().as_str() {
            "true" | "1" | "yes" => true,
            "false" | "0" | "no" => false,
            _ => return None,
        },
        _ => return None,
    };
    Some(if b { "true" } else { "false" }.to_string())
}

fn render_timestamp(value: &FieldValue) -> String {
    let parsed = match value {
        FieldValue::Number(n) => match n.as_i64() {
            Some(i) => datetime_from_epoch(i),
            // Fractional epoch seconds, e.g. 1700000000.123
            None => n
                .as_f64()
                .filter(|f| f.is_finite())
                .and_then(|f| datetime_from_epoch((f * 1_000.0).round() as i64)),
        },
        FieldValue::Text(s) => parse_datetime(s),
        _ => None,
    };
    match (parsed, value) {
        (Some(dt), _) => datetime_literal(&dt),
        (None, FieldValue::Text(s)) => {
            format!("parseDateTime64BestEffortOrNull({}, 3, 'UTC')", quote_str(s))
        }
        (None, _) => "NULL".to_string(),
    }
}

fn render_json(value: &FieldValue) -> String {
    match value {
        FieldValue::Text(s) => quote_str(s),
        other => quote_str(&other.to_json().to_string()),
    }
}
