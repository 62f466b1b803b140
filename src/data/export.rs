use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use chrono::{Datelike, NaiveDateTime, Timelike};
use log::{info, warn};
use rust_xlsxwriter::{ExcelDateTime, Format, Workbook, Worksheet, XlsxError};
use thiserror::Error;

use super::join::{inner_join, require_columns};
use super::model::{CellValue, Table};
use super::SkipNotice;
use crate::config::PipelineConfig;
use crate::error::{EmptyStage, PipelineError, TableRole};

/// Worksheet size limits of the `.xlsx` format.
const MAX_ROWS: usize = 1_048_576;
const MAX_COLUMNS: usize = 16_384;

#[derive(Debug, Error)]
pub enum ExportError {
    #[error("无法创建输出文件夹 {}: {source}", .path.display())]
    CreateDir {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("写入 {} 失败: {source}", .path.display())]
    Write { path: PathBuf, source: XlsxError },

    #[error("结果共 {rows} 行 {columns} 列，超出 Excel 工作表的上限")]
    TooLarge { rows: usize, columns: usize },
}

/// What [`join_and_export`] produced.
#[derive(Debug, Clone)]
pub struct ExportResult {
    pub detail_path: PathBuf,
    /// Absent when the joined table has no tracking-number column.
    pub tracking_path: Option<PathBuf>,
    /// Primary rows going into the join.
    pub rows_before: usize,
    /// Rows in the joined detail table.
    pub rows_after: usize,
    pub skipped: Vec<SkipNotice>,
}

// ---------------------------------------------------------------------------
// Join + export
// ---------------------------------------------------------------------------

/// Join `primary` with the `selected` rows of `lookup` on the configured key
/// columns and write the result under `output_dir`.
///
/// Nothing is written unless the key columns exist and the join is non-empty.
/// The tracking-number list is written only when the joined table has the
/// tracking column.
pub fn join_and_export(
    primary: &Table,
    lookup: &Table,
    selected: &BTreeSet<usize>,
    config: &PipelineConfig,
    output_dir: &Path,
    file_prefix: &str,
) -> Result<ExportResult, PipelineError> {
    let keys = &config.key_columns;
    require_columns(lookup, keys, TableRole::Lookup)?;

    let selection = lookup
        .take_rows(selected.iter().copied())
        .project(keys)
        .ok_or_else(|| PipelineError::Schema {
            role: TableRole::Lookup,
            missing: lookup.missing_columns(keys),
        })?;
    info!(
        "join keys from {} lookup rows:\n{}",
        selection.len(),
        selection.preview(config.preview_rows)
    );

    let joined = inner_join(primary, &selection, keys)?;
    info!("joined rows: {}", joined.len());
    if joined.is_empty() {
        return Err(PipelineError::EmptyResult(EmptyStage::Join));
    }

    std::fs::create_dir_all(output_dir).map_err(|source| ExportError::CreateDir {
        path: output_dir.to_path_buf(),
        source,
    })?;

    let detail_path = output_dir.join(config.detail_file_name(file_prefix));
    write_xlsx(&joined, &detail_path)?;
    info!("wrote {} rows to {}", joined.len(), detail_path.display());

    let mut skipped = Vec::new();
    let tracking_path = match joined.project(&[config.tracking_column]) {
        Some(tracking) => {
            let path = output_dir.join(config.tracking_file_name(file_prefix));
            write_xlsx(&tracking, &path)?;
            info!("wrote tracking numbers to {}", path.display());
            Some(path)
        }
        None => {
            let notice = SkipNotice::MissingTrackingColumn {
                column: config.tracking_column.to_string(),
            };
            warn!("{notice}");
            skipped.push(notice);
            None
        }
    };

    Ok(ExportResult {
        detail_path,
        tracking_path,
        rows_before: primary.len(),
        rows_after: joined.len(),
        skipped,
    })
}

// ---------------------------------------------------------------------------
// .xlsx writer
// ---------------------------------------------------------------------------

/// Write `table` to a single-sheet workbook: header row, then one row per
/// table row, no index column.  Nulls are left as empty cells.
pub fn write_xlsx(table: &Table, path: &Path) -> Result<(), ExportError> {
    let rows = table.len() + 1;
    let columns = table.column_names().len();
    if rows > MAX_ROWS || columns > MAX_COLUMNS {
        return Err(ExportError::TooLarge { rows, columns });
    }

    fill_workbook(table, path).map_err(|source| ExportError::Write {
        path: path.to_path_buf(),
        source,
    })
}

fn fill_workbook(table: &Table, path: &Path) -> Result<(), XlsxError> {
    let mut workbook = Workbook::new();
    let datetime_format = Format::new().set_num_format("yyyy-mm-dd hh:mm:ss");
    let sheet = workbook.add_worksheet();

    // Bounds were checked by the caller, so the index casts cannot truncate.
    for (c, name) in table.column_names().iter().enumerate() {
        sheet.write_string(0, c as u16, name)?;
    }
    for (r, row) in table.rows().iter().enumerate() {
        for (c, cell) in row.iter().enumerate() {
            write_cell(sheet, r as u32 + 1, c as u16, cell, &datetime_format)?;
        }
    }

    workbook.save(path)
}

fn write_cell(
    sheet: &mut Worksheet,
    row: u32,
    col: u16,
    cell: &CellValue,
    datetime_format: &Format,
) -> Result<(), XlsxError> {
    match cell {
        CellValue::String(s) => {
            sheet.write_string(row, col, s)?;
        }
        CellValue::Integer(i) => {
            sheet.write_number(row, col, *i as f64)?;
        }
        CellValue::Float(f) if f.is_finite() => {
            sheet.write_number(row, col, *f)?;
        }
        CellValue::Float(f) => {
            sheet.write_string(row, col, &f.to_string())?;
        }
        CellValue::Bool(b) => {
            sheet.write_boolean(row, col, *b)?;
        }
        CellValue::DateTime(dt) => match excel_datetime(dt) {
            Some(x) => {
                sheet.write_datetime_with_format(row, col, &x, datetime_format)?;
            }
            None => {
                sheet.write_string(row, col, &cell.to_string())?;
            }
        },
        CellValue::Null => {}
    }
    Ok(())
}

/// `None` outside Excel's 1900-9999 calendar.
fn excel_datetime(dt: &NaiveDateTime) -> Option<ExcelDateTime> {
    let year = u16::try_from(dt.year()).ok()?;
    let seconds = f64::from(dt.second()) + f64::from(dt.nanosecond() % 1_000_000_000) / 1e9;
    ExcelDateTime::from_ymd(year, dt.month() as u8, dt.day() as u8)
        .and_then(|d| d.and_hms(dt.hour() as u16, dt.minute() as u8, seconds))
        .ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::filter::apply_conditions;
    use crate::data::loader::load_table;
    use crate::data::model::ColumnKind;

    fn s(v: &str) -> CellValue {
        CellValue::String(v.to_string())
    }

    fn keys() -> Vec<String> {
        PipelineConfig::default()
            .key_columns
            .iter()
            .map(|k| k.to_string())
            .collect()
    }

    fn lookup() -> Table {
        Table::new(
            keys(),
            vec![
                vec![s("北区"), s("K1"), s("甲")],
                vec![s("南区"), s("K2"), s("乙")],
            ],
        )
    }

    fn primary(with_tracking: bool) -> Table {
        let mut cols = if with_tracking {
            vec!["单号".to_string()]
        } else {
            vec!["编号".to_string()]
        };
        cols.extend(keys());
        cols.push("金额".to_string());
        Table::new(
            cols,
            vec![
                vec![CellValue::Integer(11), s("北区"), s("K1"), s("甲"), CellValue::Float(9.5)],
                vec![CellValue::Integer(12), s("南区"), s("K2"), s("乙"), CellValue::Null],
                vec![CellValue::Integer(13), s("西区"), s("K3"), s("丙"), CellValue::Float(1.0)],
            ],
        )
    }

    #[test]
    fn written_workbook_reads_back_with_same_values() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.xlsx");
        let table = primary(true);
        write_xlsx(&table, &path).unwrap();

        let back = load_table(&path).unwrap();
        assert_eq!(back.column_names(), table.column_names());
        // integers come back as integer-valued floats, which compare equal
        assert_eq!(back, table);
    }

    #[test]
    fn datetime_cells_read_back_as_a_datetime_column() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("dates.xlsx");
        let at = |d: u32, h: u32| {
            CellValue::DateTime(
                chrono::NaiveDate::from_ymd_opt(2024, 5, d)
                    .and_then(|d| d.and_hms_opt(h, 30, 0))
                    .unwrap(),
            )
        };
        let table = Table::new(
            vec!["单号".into(), "揽收时间".into()],
            vec![
                vec![CellValue::Integer(1), at(1, 0)],
                vec![CellValue::Integer(2), at(2, 9)],
                vec![CellValue::Integer(3), CellValue::Null],
            ],
        );
        write_xlsx(&table, &path).unwrap();

        let back = load_table(&path).unwrap();
        assert_eq!(back.column_kind("揽收时间"), Some(ColumnKind::DateTime));
        assert_eq!(back, table);

        let out = apply_conditions(&back, "揽收时间=2024-05-02 09:30:00").unwrap();
        assert_eq!(out.table.value(0, "单号"), Some(&CellValue::Integer(2)));
        assert_eq!(out.table.len(), 1);
    }

    #[test]
    fn writes_detail_and_tracking_files() {
        let dir = tempfile::tempdir().unwrap();
        let out_dir = dir.path().join("nested").join("out");
        let selected: BTreeSet<usize> = [0].into_iter().collect();

        let result = join_and_export(
            &primary(true),
            &lookup(),
            &selected,
            &PipelineConfig::default(),
            &out_dir,
            "0501",
        )
        .unwrap();

        assert_eq!(result.detail_path, out_dir.join("0501-前几位客户明细.xlsx"));
        assert_eq!(
            result.tracking_path.as_deref(),
            Some(out_dir.join("0501-筛选后客户运单号列表.xlsx").as_path())
        );
        assert_eq!((result.rows_before, result.rows_after), (3, 1));

        let tracking = load_table(result.tracking_path.as_ref().unwrap()).unwrap();
        assert_eq!(tracking.column_names(), &["单号"]);
        assert_eq!(tracking.value(0, "单号"), Some(&CellValue::Integer(11)));
    }

    #[test]
    fn missing_tracking_column_is_a_soft_skip() {
        let dir = tempfile::tempdir().unwrap();
        let selected: BTreeSet<usize> = [0, 1].into_iter().collect();
        let result = join_and_export(
            &primary(false),
            &lookup(),
            &selected,
            &PipelineConfig::default(),
            dir.path(),
            "p",
        )
        .unwrap();

        assert!(result.tracking_path.is_none());
        assert_eq!(result.rows_after, 2);
        assert!(matches!(
            result.skipped.as_slice(),
            [SkipNotice::MissingTrackingColumn { .. }]
        ));
    }

    #[test]
    fn empty_join_writes_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let out_dir = dir.path().join("never");
        let err = join_and_export(
            &primary(true),
            &lookup(),
            &BTreeSet::new(),
            &PipelineConfig::default(),
            &out_dir,
            "p",
        )
        .unwrap_err();

        assert!(matches!(err, PipelineError::EmptyResult(EmptyStage::Join)));
        assert!(!out_dir.exists());
    }

    #[test]
    fn lookup_without_keys_is_rejected_before_writing() {
        let dir = tempfile::tempdir().unwrap();
        let out_dir = dir.path().join("never");
        let bad = Table::new(vec!["K码".into()], vec![vec![s("K1")]]);
        let err = join_and_export(
            &primary(true),
            &bad,
            &[0].into_iter().collect(),
            &PipelineConfig::default(),
            &out_dir,
            "p",
        )
        .unwrap_err();

        assert!(matches!(
            err,
            PipelineError::Schema { role: TableRole::Lookup, .. }
        ));
        assert!(!out_dir.exists());
    }
}
