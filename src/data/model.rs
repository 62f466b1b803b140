use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};

use chrono::NaiveDateTime;

/// Display format for date-time cells (previews, messages).
pub const DATETIME_DISPLAY_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

// ---------------------------------------------------------------------------
// CellValue – a single cell in a table
// ---------------------------------------------------------------------------

/// A dynamically-typed cell value, as read from a CSV or spreadsheet file.
///
/// Cells are used as set members (condition values) and as composite join
/// keys, so `CellValue` is `Ord + Hash`.  Integers and floats compare
/// numerically: `Integer(3) == Float(3.0)`.
#[derive(Debug, Clone)]
pub enum CellValue {
    String(String),
    Integer(i64),
    Float(f64),
    Bool(bool),
    DateTime(NaiveDateTime),
    Null,
}

// -- Manual Eq/Ord/Hash so numbers compare across Integer/Float --

fn rank(v: &CellValue) -> u8 {
    match v {
        CellValue::Null => 0,
        CellValue::Bool(_) => 1,
        CellValue::Integer(_) | CellValue::Float(_) => 2,
        CellValue::String(_) => 3,
        CellValue::DateTime(_) => 4,
    }
}

/// `-0.0` and `0.0` are the same cell value.
fn canonical(f: f64) -> f64 {
    if f == 0.0 {
        0.0
    } else {
        f
    }
}

/// The integer a float stands for, when it is integer-valued and in range.
fn integral(f: f64) -> Option<i64> {
    if f.fract() == 0.0 && f >= i64::MIN as f64 && f < i64::MAX as f64 {
        Some(f as i64)
    } else {
        None
    }
}

/// Exact comparison; never rounds `a` to a float.
fn cmp_int_float(a: i64, b: f64) -> Ordering {
    const TWO_POW_63: f64 = 9_223_372_036_854_775_808.0;
    if b.is_nan() {
        // matches `total_cmp`: negative NaN sorts first, positive NaN last
        return if b.is_sign_negative() {
            Ordering::Greater
        } else {
            Ordering::Less
        };
    }
    if b >= TWO_POW_63 {
        return Ordering::Less;
    }
    if b < -TWO_POW_63 {
        return Ordering::Greater;
    }
    // floor is in [-2^63, 2^63), so the cast is exact
    let floor = b.floor();
    match a.cmp(&(floor as i64)) {
        Ordering::Equal if b > floor => Ordering::Less,
        ord => ord,
    }
}

impl PartialEq for CellValue {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for CellValue {}

impl PartialOrd for CellValue {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for CellValue {
    fn cmp(&self, other: &Self) -> Ordering {
        use CellValue::*;
        let (ra, rb) = (rank(self), rank(other));
        if ra != rb {
            return ra.cmp(&rb);
        }
        match (self, other) {
            (Null, Null) => Ordering::Equal,
            (Bool(a), Bool(b)) => a.cmp(b),
            (Integer(a), Integer(b)) => a.cmp(b),
            (Float(a), Float(b)) => canonical(*a).total_cmp(&canonical(*b)),
            (Integer(a), Float(b)) => cmp_int_float(*a, *b),
            (Float(a), Integer(b)) => cmp_int_float(*b, *a).reverse(),
            (String(a), String(b)) => a.cmp(b),
            (DateTime(a), DateTime(b)) => a.cmp(b),
            _ => Ordering::Equal,
        }
    }
}

impl Hash for CellValue {
    fn hash<H: Hasher>(&self, state: &mut H) {
        rank(self).hash(state);
        match self {
            CellValue::String(s) => s.hash(state),
            CellValue::Integer(i) => i.hash(state),
            CellValue::Float(f) => match integral(*f) {
                Some(i) => i.hash(state),
                None => canonical(*f).to_bits().hash(state),
            },
            CellValue::Bool(b) => b.hash(state),
            CellValue::DateTime(d) => d.hash(state),
            CellValue::Null => {}
        }
    }
}

impl fmt::Display for CellValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CellValue::String(s) => write!(f, "{s}"),
            CellValue::Integer(i) => write!(f, "{i}"),
            CellValue::Float(v) => write!(f, "{v}"),
            CellValue::Bool(b) => write!(f, "{b}"),
            CellValue::DateTime(d) => write!(f, "{}", d.format(DATETIME_DISPLAY_FORMAT)),
            CellValue::Null => write!(f, "<null>"),
        }
    }
}

impl CellValue {
    pub fn is_null(&self) -> bool {
        matches!(self, CellValue::Null)
    }

    pub fn is_numeric(&self) -> bool {
        matches!(self, CellValue::Integer(_) | CellValue::Float(_))
    }
}

/// Accepted textual date-time layouts, tried in order after RFC 3339.
const DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y/%m/%d %H:%M:%S%.f",
    "%Y-%m-%d %H:%M",
    "%Y/%m/%d %H:%M",
];
const DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%Y/%m/%d", "%Y%m%d", "%Y.%m.%d"];

/// Parse a date or date-time written the ways operators usually write them.
/// Date-only text is midnight of that day.
pub fn parse_datetime(text: &str) -> Option<NaiveDateTime> {
    let text = text.trim();
    if let Ok(dt) = chrono::DateTime::parse_from_rfc3339(text) {
        return Some(dt.naive_local());
    }
    DATETIME_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(text, fmt).ok())
        .or_else(|| {
            DATE_FORMATS
                .iter()
                .find_map(|fmt| chrono::NaiveDate::parse_from_str(text, fmt).ok())
                .and_then(|d| d.and_hms_opt(0, 0, 0))
        })
}

// ---------------------------------------------------------------------------
// ColumnKind – inferred type of a whole column
// ---------------------------------------------------------------------------

/// The type a column is treated as when condition values are coerced.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnKind {
    Numeric,
    DateTime,
    Text,
}

impl ColumnKind {
    /// Infer the kind from a column's cells, ignoring nulls.
    ///
    /// A column with no non-null cells is numeric (a column of missing
    /// numbers); booleans and mixed columns are text.
    pub fn infer<'a>(cells: impl IntoIterator<Item = &'a CellValue>) -> Self {
        let mut numeric = true;
        let mut datetime = true;
        let mut seen = false;
        for cell in cells {
            if cell.is_null() {
                continue;
            }
            seen = true;
            numeric &= cell.is_numeric();
            datetime &= matches!(cell, CellValue::DateTime(_));
            if !numeric && !datetime {
                return ColumnKind::Text;
            }
        }
        if !seen || numeric {
            ColumnKind::Numeric
        } else if datetime {
            ColumnKind::DateTime
        } else {
            ColumnKind::Text
        }
    }
}

impl fmt::Display for ColumnKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ColumnKind::Numeric => write!(f, "数字"),
            ColumnKind::DateTime => write!(f, "日期时间"),
            ColumnKind::Text => write!(f, "文本"),
        }
    }
}

// ---------------------------------------------------------------------------
// Table – a loaded (or derived) dataset
// ---------------------------------------------------------------------------

/// One row, positionally aligned with [`Table::column_names`].
pub type Row = Vec<CellValue>;

/// An ordered sequence of rows sharing one set of named columns.
///
/// Tables are never mutated once built; every filtering stage produces a new
/// table.
#[derive(Debug, Clone, PartialEq)]
pub struct Table {
    columns: Vec<String>,
    rows: Vec<Row>,
}

impl Table {
    /// Build a table.  Short rows are padded with nulls and long rows are
    /// truncated so every row matches the header width.
    pub fn new(columns: Vec<String>, rows: Vec<Row>) -> Self {
        let width = columns.len();
        let rows = rows
            .into_iter()
            .map(|mut row| {
                row.resize(width, CellValue::Null);
                row
            })
            .collect();
        Table { columns, rows }
    }

    /// Number of rows.
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// Whether the table has no rows.
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn column_names(&self) -> &[String] {
        &self.columns
    }

    pub fn rows(&self) -> &[Row] {
        &self.rows
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == name)
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.column_index(name).is_some()
    }

    /// Names from `wanted` that this table does not have, in the given order.
    pub fn missing_columns<S: AsRef<str>>(&self, wanted: &[S]) -> Vec<String> {
        wanted
            .iter()
            .map(AsRef::as_ref)
            .filter(|name| !self.has_column(name))
            .map(str::to_string)
            .collect()
    }

    /// Cell at `row` in the named column.
    pub fn value(&self, row: usize, column: &str) -> Option<&CellValue> {
        let col = self.column_index(column)?;
        self.rows.get(row).and_then(|r| r.get(col))
    }

    /// All cells of the named column, top to bottom.
    pub fn column_values<'a>(&'a self, column: &str) -> Option<impl Iterator<Item = &'a CellValue>> {
        let col = self.column_index(column)?;
        Some(self.rows.iter().map(move |r| &r[col]))
    }

    pub fn column_kind(&self, column: &str) -> Option<ColumnKind> {
        self.column_values(column).map(ColumnKind::infer)
    }

    /// New table with the rows at `indices`, in the given order.  Indices
    /// past the end are ignored.
    pub fn take_rows(&self, indices: impl IntoIterator<Item = usize>) -> Table {
        let rows = indices
            .into_iter()
            .filter_map(|i| self.rows.get(i).cloned())
            .collect();
        Table {
            columns: self.columns.clone(),
            rows,
        }
    }

    /// New table with only the rows for which `keep` returns true.
    pub fn retain_rows(&self, mut keep: impl FnMut(&Row) -> bool) -> Table {
        let rows = self.rows.iter().filter(|r| keep(r)).cloned().collect();
        Table {
            columns: self.columns.clone(),
            rows,
        }
    }

    /// New table with only the named columns, in the given order.  Returns
    /// `None` if any of them is missing.
    pub fn project<S: AsRef<str>>(&self, columns: &[S]) -> Option<Table> {
        let idx: Vec<usize> = columns
            .iter()
            .map(|c| self.column_index(c.as_ref()))
            .collect::<Option<_>>()?;
        let rows = self
            .rows
            .iter()
            .map(|r| idx.iter().map(|&i| r[i].clone()).collect())
            .collect();
        Some(Table {
            columns: columns.iter().map(|c| c.as_ref().to_string()).collect(),
            rows,
        })
    }

    /// First `n` rows rendered as tab-separated text, header first.
    pub fn preview(&self, n: usize) -> String {
        let mut out = self.columns.join("\t");
        for row in self.rows.iter().take(n) {
            out.push('\n');
            let cells: Vec<String> = row.iter().map(ToString::to_string).collect();
            out.push_str(&cells.join("\t"));
        }
        if self.rows.len() > n {
            out.push_str(&format!("\n... ({} rows)", self.rows.len()));
        }
        out
    }
}
