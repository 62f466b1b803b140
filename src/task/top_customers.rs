//! Filter the detail rows of the top customers.
//!
//! The operator picks rows of a ranked customer table (the lookup table) by
//! position, optionally narrows the detail table (the primary table) with
//! fixed-value conditions, and gets back the matching detail rows plus the
//! list of their tracking numbers.

use std::fmt;
use std::path::Path;

use log::{debug, error, info, warn};

use super::registry::{ParamKind, ParamSpec, TaskArgs, TaskDescriptor, TaskOutcome};
use crate::config::PipelineConfig;
use crate::data::export::{join_and_export, ExportResult};
use crate::data::filter::apply_conditions;
use crate::data::join::require_columns;
use crate::data::loader::load_table;
use crate::data::model::Table;
use crate::data::range::parse_ranges;
use crate::data::SkipNotice;
use crate::error::{PipelineError, TableRole, ValidationError};

pub const TASK_ID: &str = "filter-top-customers";

pub const PARAMS: &[ParamSpec] = &[
    ParamSpec {
        name: "primary_path",
        kind: ParamKind::FilePath,
        required: true,
        prompt: "请输入原始表格路径：",
    },
    ParamSpec {
        name: "lookup_path",
        kind: ParamKind::FilePath,
        required: true,
        prompt: "请输入筛选条件表格路径：",
    },
    ParamSpec {
        name: "output_dir",
        kind: ParamKind::DirPath,
        required: true,
        prompt: "请输入输出文件夹的绝对路径：",
    },
    ParamSpec {
        name: "file_prefix",
        kind: ParamKind::Text,
        required: true,
        prompt: "请输入输出文件的日期前缀：",
    },
    ParamSpec {
        name: "row_ranges",
        kind: ParamKind::Text,
        required: true,
        prompt: "请输入行索引范围（可以输入多个范围，用逗号分隔；例如：0-5,10-15）：",
    },
    ParamSpec {
        name: "extra_conditions",
        kind: ParamKind::Text,
        required: false,
        prompt: "请输入额外的固定值筛选条件（格式：列名=值1,值2,...；多个条件用分号分隔；例如：工单小类=签收延误,派送延误）：",
    },
];

pub fn descriptor() -> TaskDescriptor {
    TaskDescriptor {
        id: TASK_ID,
        title: "筛选前几位客户明细",
        params: PARAMS,
        entry: run_with_args,
    }
}

/// Parameters as supplied by the caller, before cleaning.
#[derive(Debug, Clone, Default)]
pub struct TopCustomersParams {
    pub primary_path: Option<String>,
    pub lookup_path: Option<String>,
    pub output_dir: Option<String>,
    pub file_prefix: Option<String>,
    pub row_ranges: Option<String>,
    pub extra_conditions: Option<String>,
}

impl TopCustomersParams {
    pub fn from_args(args: &TaskArgs) -> Self {
        let get = |name: &str| args.get(name).cloned();
        TopCustomersParams {
            primary_path: get("primary_path"),
            lookup_path: get("lookup_path"),
            output_dir: get("output_dir"),
            file_prefix: get("file_prefix"),
            row_ranges: get("row_ranges"),
            extra_conditions: get("extra_conditions"),
        }
    }
}

/// Strip surrounding whitespace and quote characters left over from
/// copy-pasted paths.  Blank values count as absent.
fn clean(value: Option<&str>) -> Option<&str> {
    let v = value?.trim_matches(|c: char| c == '"' || c == '\'' || c.is_whitespace());
    (!v.is_empty()).then_some(v)
}

/// Summary of a successful run.
#[derive(Debug, Clone)]
pub struct RunReport {
    pub primary_rows: usize,
    pub selected_lookup_rows: usize,
    pub export: ExportResult,
    /// Every soft skip, in the order it happened.
    pub skipped: Vec<SkipNotice>,
}

impl fmt::Display for RunReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "操作成功完成！")?;
        writeln!(
            f,
            "原始表格共 {} 行，应用条件后 {} 行，选中筛选条件 {} 行，合并后得到 {} 行。",
            self.primary_rows,
            self.export.rows_before,
            self.selected_lookup_rows,
            self.export.rows_after
        )?;
        write!(f, "结果已保存到 {}", self.export.detail_path.display())?;
        if let Some(path) = &self.export.tracking_path {
            write!(f, "\n单号列表已保存到 {}", path.display())?;
        }
        if !self.skipped.is_empty() {
            write!(f, "\n已跳过：")?;
            for notice in &self.skipped {
                write!(f, "\n  - {notice}")?;
            }
        }
        Ok(())
    }
}

fn run_with_args(args: &TaskArgs) -> TaskOutcome {
    run(&TopCustomersParams::from_args(args))
}

/// Entry operation: run the whole pipeline and fold any failure into the
/// returned outcome.
pub fn run(params: &TopCustomersParams) -> TaskOutcome {
    match execute(params, &PipelineConfig::default()) {
        Ok(report) => {
            info!("{report}");
            TaskOutcome::success(report.to_string())
        }
        Err(e) => {
            error!("{e}");
            TaskOutcome::failure(e.to_string())
        }
    }
}

/// Run the pipeline: validate, load, select, filter, join, export.
///
/// Output files are written only after every check has passed.
pub fn execute(
    params: &TopCustomersParams,
    config: &PipelineConfig,
) -> Result<RunReport, PipelineError> {
    let primary_path = clean(params.primary_path.as_deref());
    let lookup_path = clean(params.lookup_path.as_deref());
    let output_dir = clean(params.output_dir.as_deref());
    let file_prefix = clean(params.file_prefix.as_deref());
    let row_ranges = clean(params.row_ranges.as_deref());
    let extra_conditions = clean(params.extra_conditions.as_deref()).unwrap_or("");

    let (Some(primary_path), Some(lookup_path), Some(output_dir), Some(file_prefix), Some(row_ranges)) =
        (primary_path, lookup_path, output_dir, file_prefix, row_ranges)
    else {
        let missing = [
            ("primary_path", primary_path.is_none()),
            ("lookup_path", lookup_path.is_none()),
            ("output_dir", output_dir.is_none()),
            ("file_prefix", file_prefix.is_none()),
            ("row_ranges", row_ranges.is_none()),
        ]
        .into_iter()
        .filter_map(|(name, absent)| absent.then_some(name))
        .collect();
        return Err(ValidationError::MissingParameters(missing).into());
    };

    let primary_path = Path::new(primary_path);
    let lookup_path = Path::new(lookup_path);
    let inputs = [(TableRole::Primary, primary_path), (TableRole::Lookup, lookup_path)];
    for (role, path) in inputs {
        if !path.exists() {
            return Err(ValidationError::PathNotFound {
                role,
                path: path.to_path_buf(),
            }
            .into());
        }
    }
    for (role, path) in inputs {
        let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("");
        if !config.accepts_extension(ext) {
            return Err(ValidationError::UnsupportedFormat {
                role,
                path: path.to_path_buf(),
            }
            .into());
        }
    }

    let primary = load(primary_path, TableRole::Primary, config)?;
    let lookup = load(lookup_path, TableRole::Lookup, config)?;

    require_columns(&lookup, &config.key_columns, TableRole::Lookup)?;
    require_columns(&primary, &config.key_columns, TableRole::Primary)?;

    let selection = parse_ranges(row_ranges, lookup.len())?;
    if selection.indices.is_empty() {
        warn!("row ranges '{row_ranges}' select no lookup rows");
    }

    let filtered = apply_conditions(&primary, extra_conditions)?;
    info!(
        "{} of {} primary rows remain after conditions",
        filtered.table.len(),
        primary.len()
    );

    let export = join_and_export(
        &filtered.table,
        &lookup,
        &selection.indices,
        config,
        Path::new(output_dir),
        file_prefix,
    )?;

    let mut skipped = selection.skipped;
    skipped.extend(filtered.skipped);
    skipped.extend(export.skipped.iter().cloned());

    Ok(RunReport {
        primary_rows: primary.len(),
        selected_lookup_rows: selection.indices.len(),
        export,
        skipped,
    })
}

fn load(path: &Path, role: TableRole, config: &PipelineConfig) -> Result<Table, PipelineError> {
    let table = load_table(path).map_err(|source| PipelineError::Load { role, source })?;
    info!("{role}共有 {} 行数据，列名：{:?}", table.len(), table.column_names());
    debug!("{role}前{}行：\n{}", config.preview_rows, table.preview(config.preview_rows));
    Ok(table)
}
