//! Data layer: table model, loading, selection, filtering, joining, export.
//!
//! Architecture:
//! ```text
//!   primary .csv/.xlsx          lookup .csv/.xlsx
//!          │                           │
//!          ▼                           ▼
//!     ┌──────────┐                ┌──────────┐
//!     │  loader  │                │  loader  │   parse file → Table
//!     └──────────┘                └──────────┘
//!          │                           │
//!          ▼                           ▼
//!     ┌──────────┐                ┌──────────┐
//!     │  filter  │  conditions    │  range   │   "0-5,10" → row set
//!     └──────────┘                └──────────┘
//!          │                           │
//!          └─────────────┬─────────────┘
//!                        ▼
//!                  ┌──────────┐
//!                  │   join   │   composite-key inner join
//!                  └──────────┘
//!                        │
//!                        ▼
//!                  ┌──────────┐
//!                  │  export  │   detail + tracking-number .xlsx
//!                  └──────────┘
//! ```

use std::fmt;

use self::model::ColumnKind;

pub mod export;
pub mod filter;
pub mod join;
pub mod loader;
pub mod model;
pub mod range;

/// A piece of input that was ignored without failing the run.
///
/// Each notice is logged when it happens and carried to the final report.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SkipNotice {
    /// `start-end` with `start > end` or `end` past the last row.
    RowRange { token: String, row_count: usize },
    /// Single index past the last row.
    RowIndex { token: String, row_count: usize },
    /// Condition clause without `=`.
    MalformedClause { clause: String },
    /// Condition on a column the primary table does not have.
    UnknownColumn { column: String },
    /// Condition values that do not fit the column's type.
    Coercion {
        column: String,
        values: Vec<String>,
        kind: ColumnKind,
    },
    /// Joined result has no tracking-number column to extract.
    MissingTrackingColumn { column: String },
}

impl fmt::Display for SkipNotice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SkipNotice::RowRange { token, row_count } => {
                write!(f, "无效的行索引范围：{token}（共 {row_count} 行），跳过此范围。")
            }
            SkipNotice::RowIndex { token, row_count } => {
                write!(f, "无效的行索引：{token}（共 {row_count} 行），跳过此索引。")
            }
            SkipNotice::MalformedClause { clause } => {
                write!(f, "条件格式无效：'{clause}'，跳过此条件。")
            }
            SkipNotice::UnknownColumn { column } => {
                write!(f, "列名 '{column}' 不存在于原始表格中，跳过此条件。")
            }
            SkipNotice::Coercion {
                column,
                values,
                kind,
            } => write!(
                f,
                "列 '{column}' 的值 {values:?} 无法转换为{kind}，跳过此条件。"
            ),
            SkipNotice::MissingTrackingColumn { column } => {
                write!(f, "合并后的数据表中没有找到“{column}”列，无法保存单号列表。")
            }
        }
    }
}
