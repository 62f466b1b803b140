use std::fmt;
use std::path::PathBuf;

use thiserror::Error;

use crate::data::export::ExportError;
use crate::data::loader::LoadError;
use crate::data::range::RangeFormatError;

/// Which of the two input tables an error refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TableRole {
    /// The table being filtered and exported.
    Primary,
    /// The table supplying the key combinations to join against.
    Lookup,
}

impl fmt::Display for TableRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TableRole::Primary => write!(f, "原始表格"),
            TableRole::Lookup => write!(f, "筛选条件表格"),
        }
    }
}

/// The stage that left no rows behind.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EmptyStage {
    Filter,
    Join,
}

impl fmt::Display for EmptyStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EmptyStage::Filter => write!(f, "应用条件后，原始表格没有剩余数据。"),
            EmptyStage::Join => write!(f, "合并后没有数据满足条件，请检查筛选条件是否正确。"),
        }
    }
}

/// Bad or missing caller input, detected before any output is written.
#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("缺少必要的参数：{}", .0.join(", "))]
    MissingParameters(Vec<&'static str>),

    #[error("{role}路径不存在: {}", .path.display())]
    PathNotFound { role: TableRole, path: PathBuf },

    #[error("{role}格式不支持，请使用Excel或CSV文件: {}", .path.display())]
    UnsupportedFormat { role: TableRole, path: PathBuf },
}

/// Every fatal failure of the filter-and-export pipeline.
///
/// Soft skips (bad condition clauses, out-of-range row indices) are not
/// errors; they are reported through [`crate::data::SkipNotice`].
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("读取{role}失败：{source}")]
    Load {
        role: TableRole,
        #[source]
        source: LoadError,
    },

    #[error("{role}中缺少必要的列：{}", .missing.join(", "))]
    Schema { role: TableRole, missing: Vec<String> },

    #[error("行索引范围解析错误：{0}")]
    RangeFormat(#[from] RangeFormatError),

    #[error("{0}")]
    EmptyResult(EmptyStage),

    #[error("保存结果失败：{0}")]
    Export(#[from] ExportError),
}

pub type Result<T, E = PipelineError> = std::result::Result<T, E>;
