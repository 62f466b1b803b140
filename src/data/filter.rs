use std::collections::HashSet;

use log::{info, warn};
use thiserror::Error;

use super::model::{parse_datetime, CellValue, ColumnKind, Table};
use super::SkipNotice;
use crate::error::{EmptyStage, PipelineError};

// ---------------------------------------------------------------------------
// Value coercion
// ---------------------------------------------------------------------------

/// A condition value that cannot be read as the column's type.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("'{value}' 无法转换为{kind}")]
pub struct CoercionError {
    pub value: String,
    pub kind: ColumnKind,
}

/// Convert one textual condition value to a cell comparable with a column of
/// the given kind.
///
/// * numeric: float when the text contains `.`, integer otherwise
/// * date-time: any layout accepted by [`parse_datetime`]
/// * text: the trimmed text
pub fn coerce(value: &str, kind: ColumnKind) -> Result<CellValue, CoercionError> {
    let value = value.trim();
    let fail = || CoercionError {
        value: value.to_string(),
        kind,
    };
    match kind {
        ColumnKind::Numeric if value.contains('.') => {
            value.parse::<f64>().map(CellValue::Float).map_err(|_| fail())
        }
        ColumnKind::Numeric => value.parse::<i64>().map(CellValue::Integer).map_err(|_| fail()),
        ColumnKind::DateTime => parse_datetime(value).map(CellValue::DateTime).ok_or_else(fail),
        ColumnKind::Text => Ok(CellValue::String(value.to_string())),
    }
}

// ---------------------------------------------------------------------------
// Condition clauses
// ---------------------------------------------------------------------------

/// One `column=value1,value2,...` clause, trimmed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Condition {
    pub column: String,
    pub values: Vec<String>,
}

impl Condition {
    /// Split a clause on its first `=`.  `None` when there is no `=`.
    pub fn parse(clause: &str) -> Option<Self> {
        let (column, values) = clause.split_once('=')?;
        Some(Condition {
            column: column.trim().to_string(),
            values: values.split(',').map(|v| v.trim().to_string()).collect(),
        })
    }
}

/// Result of [`apply_conditions`]: the narrowed table and every clause that
/// was skipped.
#[derive(Debug, Clone)]
pub struct FilterOutcome {
    pub table: Table,
    pub skipped: Vec<SkipNotice>,
}

/// Narrow `table` by a `;`-separated list of clauses, applied in order.
///
/// Each accepted clause keeps the rows whose value in `column` is one of the
/// clause's values, after coercing them to the column's kind in `table`,
/// however far earlier clauses have narrowed it.  Clauses with no `=`, with an
/// unknown column, or with a value that fails coercion are skipped and
/// reported.  A blank string applies no clauses.
///
/// Fails with an empty-result error when no rows remain.
pub fn apply_conditions(table: &Table, spec: &str) -> Result<FilterOutcome, PipelineError> {
    let kinds: Vec<ColumnKind> = table
        .column_names()
        .iter()
        .map(|name| table.column_kind(name).unwrap_or(ColumnKind::Text))
        .collect();
    let mut current = table.clone();
    let mut skipped = Vec::new();
    let mut skip = |notice: SkipNotice| {
        warn!("{notice}");
        skipped.push(notice);
    };

    let clauses: Vec<&str> = if spec.trim().is_empty() {
        Vec::new()
    } else {
        spec.split(';').collect()
    };

    for clause in clauses {
        let Some(condition) = Condition::parse(clause) else {
            skip(SkipNotice::MalformedClause {
                clause: clause.trim().to_string(),
            });
            continue;
        };
        let Some(col) = current.column_index(&condition.column) else {
            skip(SkipNotice::UnknownColumn {
                column: condition.column,
            });
            continue;
        };
        let kind = kinds[col];
        let coerced: Result<HashSet<CellValue>, CoercionError> =
            condition.values.iter().map(|v| coerce(v, kind)).collect();
        let wanted = match coerced {
            Ok(wanted) => wanted,
            Err(_) => {
                skip(SkipNotice::Coercion {
                    column: condition.column,
                    values: condition.values,
                    kind,
                });
                continue;
            }
        };

        current = current.retain_rows(|row| wanted.contains(&row[col]));
        info!(
            "applied '{} in {:?}': {} rows remain",
            condition.column,
            condition.values,
            current.len()
        );
    }

    if current.is_empty() {
        return Err(PipelineError::EmptyResult(EmptyStage::Filter));
    }
    Ok(FilterOutcome {
        table: current,
        skipped,
    })
}
