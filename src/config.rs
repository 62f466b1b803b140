/// Fixed settings of the top-customers pipeline.
///
/// These are constants of the operator workflow (column labels come from the
/// operator's spreadsheets); `Default` is the only configuration the entry
/// operation uses.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Composite join key, all required in the lookup table.
    pub key_columns: [&'static str; 3],
    /// Column exported on its own as the tracking-number list.
    pub tracking_column: &'static str,
    /// Detail workbook name is `{prefix}-{detail_suffix}`.
    pub detail_suffix: &'static str,
    /// Tracking-number workbook name is `{prefix}-{tracking_suffix}`.
    pub tracking_suffix: &'static str,
    /// Accepted input extensions, lower case, without the dot.
    pub input_extensions: &'static [&'static str],
    /// Rows shown in loader previews.
    pub preview_rows: usize,
}

/// Pickup station name, K-code, customer name.
pub const KEY_COLUMNS: [&str; 3] = ["揽收网点名称", "K码", "客户名称"];
pub const TRACKING_COLUMN: &str = "单号";
pub const DETAIL_SUFFIX: &str = "前几位客户明细.xlsx";
pub const TRACKING_SUFFIX: &str = "筛选后客户运单号列表.xlsx";
pub const INPUT_EXTENSIONS: &[&str] = &["csv", "xlsx", "xls"];

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            key_columns: KEY_COLUMNS,
            tracking_column: TRACKING_COLUMN,
            detail_suffix: DETAIL_SUFFIX,
            tracking_suffix: TRACKING_SUFFIX,
            input_extensions: INPUT_EXTENSIONS,
            preview_rows: 10,
        }
    }
}

impl PipelineConfig {
    pub fn detail_file_name(&self, prefix: &str) -> String {
        format!("{prefix}-{}", self.detail_suffix)
    }

    pub fn tracking_file_name(&self, prefix: &str) -> String {
        format!("{prefix}-{}", self.tracking_suffix)
    }

    /// Whether `ext` (any case, no dot) is an accepted input extension.
    pub fn accepts_extension(&self, ext: &str) -> bool {
        let ext = ext.to_ascii_lowercase();
        self.input_extensions.iter().any(|e| *e == ext)
    }
}
