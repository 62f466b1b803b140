use std::borrow::Cow;
use std::collections::HashSet;
use std::path::{Path, PathBuf};

use calamine::{open_workbook_auto, Data, Reader};
use log::{info, warn};
use thiserror::Error;

use super::model::{parse_datetime, CellValue, Row, Table};

/// Why a table could not be read.
#[derive(Debug, Error)]
pub enum LoadError {
    #[error("文件不存在: {}", .0.display())]
    NotFound(PathBuf),

    #[error("不支持的文件格式: .{0}")]
    UnsupportedExtension(String),

    #[error("无法读取文件: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV 解析失败: {0}")]
    Csv(#[from] csv::Error),

    #[error("Excel 解析失败: {0}")]
    Spreadsheet(#[from] calamine::Error),

    #[error("工作簿中没有工作表")]
    NoWorksheet,
}

/// Cell texts read as missing values.
const NA_MARKERS: &[&str] = &[
    "", "#N/A", "#N/A N/A", "#NA", "-1.#IND", "-1.#QNAN", "-NaN", "-nan", "1.#IND", "1.#QNAN",
    "<NA>", "N/A", "NA", "NULL", "NaN", "None", "n/a", "nan", "null",
];

fn is_na_marker(text: &str) -> bool {
    NA_MARKERS.contains(&text)
}

// ---------------------------------------------------------------------------
// Public entry-point
// ---------------------------------------------------------------------------

/// Load a table from a file.  Dispatch by extension (case-insensitive).
///
/// Supported formats:
/// * `.csv`  – header row followed by data rows
/// * `.xlsx` – first worksheet, first row is the header
/// * `.xls`  – same, legacy binary workbook
pub fn load_table(path: &Path) -> Result<Table, LoadError> {
    if !path.exists() {
        return Err(LoadError::NotFound(path.to_path_buf()));
    }
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or("")
        .to_ascii_lowercase();

    let table = match ext.as_str() {
        "csv" => load_csv(path)?,
        "xlsx" | "xls" => load_spreadsheet(path)?,
        other => return Err(LoadError::UnsupportedExtension(other.to_string())),
    };
    info!(
        "loaded {} rows x {} columns from {}",
        table.len(),
        table.column_names().len(),
        path.display()
    );
    Ok(table)
}

// ---------------------------------------------------------------------------
// Header normalisation
// ---------------------------------------------------------------------------

/// Make header names usable as a schema: blank names become `Unnamed: {i}`,
/// repeated names get a `.1`, `.2`, ... suffix.
fn normalize_headers(raw: impl IntoIterator<Item = String>) -> Vec<String> {
    let raw: Vec<String> = raw
        .into_iter()
        .enumerate()
        .map(|(i, name)| {
            let name = name.trim();
            if name.is_empty() {
                format!("Unnamed: {i}")
            } else {
                name.to_string()
            }
        })
        .collect();

    let mut used: HashSet<String> = HashSet::new();
    let mut headers = Vec::with_capacity(raw.len());
    for name in raw {
        let mut candidate = name.clone();
        let mut n = 0;
        while used.contains(&candidate) {
            n += 1;
            candidate = format!("{name}.{n}");
        }
        used.insert(candidate.clone());
        headers.push(candidate);
    }
    headers
}

// ---------------------------------------------------------------------------
// CSV loader
// ---------------------------------------------------------------------------

/// CSV layout: header row with column names, then one record per row.
///
/// Columns are typed as a whole: a column whose non-missing cells all parse
/// as numbers is numeric, one whose cells are all `true`/`false` is boolean,
/// anything else stays text.
fn load_csv(path: &Path) -> Result<Table, LoadError> {
    let bytes = std::fs::read(path)?;
    let text = decode_text(&bytes, path);

    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .from_reader(text.as_bytes());
    let headers = normalize_headers(reader.headers()?.iter().map(str::to_string));

    let mut raw_rows: Vec<Vec<String>> = Vec::new();
    for record in reader.records() {
        let record = record?;
        raw_rows.push(record.iter().map(str::to_string).collect());
    }

    let rows = type_csv_columns(headers.len(), raw_rows);
    Ok(Table::new(headers, rows))
}

/// UTF-8 (with or without BOM) is used as is; anything else is decoded as
/// GB18030.
fn decode_text<'a>(bytes: &'a [u8], path: &Path) -> Cow<'a, str> {
    let bytes = bytes.strip_prefix(b"\xEF\xBB\xBF").unwrap_or(bytes);
    match std::str::from_utf8(bytes) {
        Ok(text) => Cow::Borrowed(text),
        Err(_) => {
            warn!("{} is not UTF-8, decoding as GB18030", path.display());
            let (text, _, had_errors) = encoding_rs::GB18030.decode(bytes);
            if had_errors {
                warn!("{} contains bytes invalid in GB18030", path.display());
            }
            text
        }
    }
}

#[derive(Clone, Copy)]
enum CsvColumnType {
    Numeric,
    Bool,
    Text,
}

fn csv_column_type<'a>(cells: impl Iterator<Item = &'a str>) -> CsvColumnType {
    let mut numeric = true;
    let mut boolean = true;
    for cell in cells.filter(|c| !is_na_marker(c)) {
        let t = cell.trim();
        numeric &= t.parse::<i64>().is_ok() || t.parse::<f64>().is_ok();
        boolean &= parse_bool(t).is_some();
        if !numeric && !boolean {
            return CsvColumnType::Text;
        }
    }
    match (numeric, boolean) {
        (true, _) => CsvColumnType::Numeric,
        (false, true) => CsvColumnType::Bool,
        _ => CsvColumnType::Text,
    }
}

fn parse_bool(text: &str) -> Option<bool> {
    match text {
        "true" | "True" | "TRUE" => Some(true),
        "false" | "False" | "FALSE" => Some(false),
        _ => None,
    }
}

fn type_csv_columns(width: usize, raw_rows: Vec<Vec<String>>) -> Vec<Row> {
    let types: Vec<CsvColumnType> = (0..width)
        .map(|col| {
            csv_column_type(
                raw_rows
                    .iter()
                    .map(move |r| r.get(col).map(String::as_str).unwrap_or("")),
            )
        })
        .collect();

    raw_rows
        .into_iter()
        .map(|raw| {
            raw.into_iter()
                .zip(types.iter())
                .map(|(cell, ty)| typed_csv_cell(cell, *ty))
                .collect()
        })
        .collect()
}

fn typed_csv_cell(cell: String, ty: CsvColumnType) -> CellValue {
    if is_na_marker(&cell) {
        return CellValue::Null;
    }
    let t = cell.trim();
    match ty {
        CsvColumnType::Numeric => {
            if let Ok(i) = t.parse::<i64>() {
                CellValue::Integer(i)
            } else if let Ok(f) = t.parse::<f64>() {
                CellValue::Float(f)
            } else {
                CellValue::String(cell)
            }
        }
        CsvColumnType::Bool => parse_bool(t).map_or(CellValue::String(cell), CellValue::Bool),
        CsvColumnType::Text => CellValue::String(cell),
    }
}

// ---------------------------------------------------------------------------
// Spreadsheet loader
// ---------------------------------------------------------------------------

/// Read the first worksheet of an `.xlsx` / `.xls` workbook.  The first used
/// row is the header.
fn load_spreadsheet(path: &Path) -> Result<Table, LoadError> {
    let mut workbook = open_workbook_auto(path)?;
    let range = workbook
        .worksheet_range_at(0)
        .ok_or(LoadError::NoWorksheet)??;

    let mut rows = range.rows();
    let Some(header) = rows.next() else {
        return Ok(Table::new(Vec::new(), Vec::new()));
    };
    let headers = normalize_headers(header.iter().map(header_text));
    let rows: Vec<Row> = rows
        .map(|r| r.iter().map(spreadsheet_cell).collect())
        .collect();
    Ok(Table::new(headers, rows))
}

fn header_text(data: &Data) -> String {
    match spreadsheet_cell(data) {
        CellValue::Null => String::new(),
        CellValue::Float(f) if f.fract() == 0.0 => format!("{}", f as i64),
        other => other.to_string(),
    }
}

fn spreadsheet_cell(data: &Data) -> CellValue {
    match data {
        Data::Int(i) => CellValue::Integer(*i),
        Data::Float(f) => CellValue::Float(*f),
        Data::String(s) if is_na_marker(s) => CellValue::Null,
        Data::String(s) => CellValue::String(s.clone()),
        Data::Bool(b) => CellValue::Bool(*b),
        Data::DateTime(dt) => dt
            .as_datetime()
            .map_or(CellValue::Float(dt.as_f64()), CellValue::DateTime),
        Data::DateTimeIso(s) => {
            parse_datetime(s).map_or_else(|| CellValue::String(s.clone()), CellValue::DateTime)
        }
        Data::DurationIso(s) => CellValue::String(s.clone()),
        Data::Error(_) | Data::Empty => CellValue::Null,
    }
}
