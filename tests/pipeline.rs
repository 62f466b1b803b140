use std::fs;
use std::path::{Path, PathBuf};

use ccr_toolkit::data::export::write_xlsx;
use ccr_toolkit::data::loader::load_table;
use ccr_toolkit::data::model::{CellValue, Table};
use ccr_toolkit::task::top_customers::{run, TopCustomersParams};
use ccr_toolkit::task::{TaskArgs, TaskRegistry};
use tempfile::TempDir;

const PRIMARY: &str = "\
单号,工单小类,揽收网点名称,K码,客户名称
1001,签收延误,北区,K1,甲
1002,派送延误,北区,K1,甲
1003,签收延误,南区,K2,乙
1004,签收延误,西区,K3,丙
1005,签收延误,北区,K1,甲
";

const LOOKUP: &str = "\
揽收网点名称,K码,客户名称,投诉量
北区,K1,甲,3
南区,K2,乙,1
西区,K3,丙,1
";

struct Fixture {
    dir: TempDir,
    primary: PathBuf,
    lookup: PathBuf,
}

impl Fixture {
    fn new() -> Self {
        let dir = tempfile::tempdir().unwrap();
        let primary = dir.path().join("complaints.csv");
        let lookup = dir.path().join("top.csv");
        fs::write(&primary, PRIMARY).unwrap();
        fs::write(&lookup, LOOKUP).unwrap();
        Fixture { dir, primary, lookup }
    }

    fn out_dir(&self) -> PathBuf {
        self.dir.path().join("out")
    }

    fn params(&self, ranges: &str, conditions: &str) -> TopCustomersParams {
        TopCustomersParams {
            primary_path: Some(self.primary.display().to_string()),
            lookup_path: Some(self.lookup.display().to_string()),
            output_dir: Some(self.out_dir().display().to_string()),
            file_prefix: Some("0501".into()),
            row_ranges: Some(ranges.into()),
            extra_conditions: Some(conditions.into()),
        }
    }
}

fn tracking_numbers(path: &Path, column: &str) -> Vec<CellValue> {
    let table = load_table(path).unwrap();
    table.column_values(column).unwrap().cloned().collect()
}

fn ints(values: &[i64]) -> Vec<CellValue> {
    values.iter().map(|&v| CellValue::Integer(v)).collect()
}

#[test]
fn filters_joins_and_writes_both_workbooks() {
    let fx = Fixture::new();
    let outcome = run(&fx.params("0-1", "工单小类=签收延误"));
    assert!(outcome.success, "{}", outcome.message);
    assert!(outcome.message.contains("操作成功完成"));

    let detail = fx.out_dir().join("0501-前几位客户明细.xlsx");
    let tracking = fx.out_dir().join("0501-筛选后客户运单号列表.xlsx");
    assert!(outcome.message.contains(&detail.display().to_string()));

    // the lookup only contributes its key columns
    let table = load_table(&detail).unwrap();
    assert_eq!(
        table.column_names(),
        &["单号", "工单小类", "揽收网点名称", "K码", "客户名称"]
    );
    assert_eq!(tracking_numbers(&detail, "单号"), ints(&[1001, 1003, 1005]));

    let list = load_table(&tracking).unwrap();
    assert_eq!(list.column_names(), &["单号"]);
    assert_eq!(tracking_numbers(&tracking, "单号"), ints(&[1001, 1003, 1005]));
}

#[test]
fn runs_through_the_registry_with_quoted_inputs() {
    let fx = Fixture::new();
    let registry = TaskRegistry::builtin().unwrap();
    let task = registry.get("filter-top-customers").unwrap();

    let mut args = TaskArgs::new();
    args.insert("primary_path".into(), format!("\"{}\"", fx.primary.display()));
    args.insert("lookup_path".into(), format!("'{}'", fx.lookup.display()));
    args.insert("output_dir".into(), format!("  \"{}\"  ", fx.out_dir().display()));
    args.insert("file_prefix".into(), "\"0501\"".into());
    args.insert("row_ranges".into(), "0".into());

    let outcome = task.run(&args);
    assert!(outcome.success, "{}", outcome.message);
    assert_eq!(
        tracking_numbers(&fx.out_dir().join("0501-筛选后客户运单号列表.xlsx"), "单号"),
        ints(&[1001, 1002, 1005])
    );
}

#[test]
fn soft_skips_are_reported_but_do_not_fail() {
    let fx = Fixture::new();
    let outcome = run(&fx.params("0-1,99,5-9", "不存在的列=1;工单小类=签收延误;坏条件"));
    assert!(outcome.success, "{}", outcome.message);
    for fragment in ["99", "5-9", "不存在的列", "坏条件"] {
        assert!(outcome.message.contains(fragment), "{fragment} missing: {}", outcome.message);
    }
}

#[test]
fn missing_parameters_are_listed_together() {
    let outcome = run(&TopCustomersParams::default());
    assert!(!outcome.success);
    assert!(outcome.message.starts_with("缺少必要的参数"));
    for name in ["primary_path", "lookup_path", "output_dir", "file_prefix", "row_ranges"] {
        assert!(outcome.message.contains(name));
    }
}

#[test]
fn nonexistent_input_fails_before_loading() {
    let fx = Fixture::new();
    let mut params = fx.params("0", "");
    params.lookup_path = Some(fx.dir.path().join("nope.xlsx").display().to_string());
    let outcome = run(&params);
    assert!(!outcome.success);
    assert!(outcome.message.contains("筛选条件表格路径不存在"), "{}", outcome.message);
    assert!(!fx.out_dir().exists());
}

#[test]
fn unsupported_extension_is_rejected() {
    let fx = Fixture::new();
    let txt = fx.dir.path().join("complaints.txt");
    fs::write(&txt, PRIMARY).unwrap();
    let mut params = fx.params("0", "");
    params.primary_path = Some(txt.display().to_string());

    let outcome = run(&params);
    assert!(!outcome.success);
    assert!(outcome.message.contains("原始表格格式不支持"), "{}", outcome.message);
}

#[test]
fn missing_key_column_is_fatal() {
    let fx = Fixture::new();
    fs::write(&fx.lookup, "揽收网点名称,客户名称\n北区,甲\n").unwrap();
    let outcome = run(&fx.params("0", ""));
    assert!(!outcome.success);
    assert!(outcome.message.contains("K码"), "{}", outcome.message);
    assert!(!fx.out_dir().exists());
}

#[test]
fn malformed_range_is_fatal() {
    let fx = Fixture::new();
    let outcome = run(&fx.params("a-b", ""));
    assert!(!outcome.success);
    assert!(outcome.message.contains("行索引范围解析错误"), "{}", outcome.message);
    assert!(!fx.out_dir().exists());
}

#[test]
fn conditions_that_remove_everything_stop_the_run() {
    let fx = Fixture::new();
    let outcome = run(&fx.params("0-2", "工单小类=丢件"));
    assert!(!outcome.success);
    assert_eq!(outcome.message, "应用条件后，原始表格没有剩余数据。");
    assert!(!fx.out_dir().exists());
}

#[test]
fn empty_join_stops_the_run() {
    let fx = Fixture::new();
    // only 1002 survives the condition, and it belongs to lookup row 0
    let outcome = run(&fx.params("2", "工单小类=派送延误"));
    assert!(!outcome.success);
    assert_eq!(outcome.message, "合并后没有数据满足条件，请检查筛选条件是否正确。");
    assert!(!fx.out_dir().exists());
}

#[test]
fn detail_only_when_tracking_column_is_absent() {
    let fx = Fixture::new();
    fs::write(
        &fx.primary,
        "编号,揽收网点名称,K码,客户名称\n1,北区,K1,甲\n2,南区,K2,乙\n",
    )
    .unwrap();
    let outcome = run(&fx.params("0", ""));
    assert!(outcome.success, "{}", outcome.message);
    assert!(outcome.message.contains("单号"));
    assert!(fx.out_dir().join("0501-前几位客户明细.xlsx").exists());
    assert!(!fx.out_dir().join("0501-筛选后客户运单号列表.xlsx").exists());
}

#[test]
fn xlsx_primary_is_filtered_by_date() {
    let fx = Fixture::new();
    let at = |d: u32| {
        CellValue::DateTime(
            chrono::NaiveDate::from_ymd_opt(2024, 5, d)
                .and_then(|d| d.and_hms_opt(0, 0, 0))
                .unwrap(),
        )
    };
    let s = |v: &str| CellValue::String(v.to_string());
    let primary = Table::new(
        ["单号", "揽收时间", "揽收网点名称", "K码", "客户名称"]
            .iter()
            .map(|c| c.to_string())
            .collect(),
        vec![
            vec![CellValue::Integer(2001), at(1), s("北区"), s("K1"), s("甲")],
            vec![CellValue::Integer(2002), at(2), s("北区"), s("K1"), s("甲")],
            vec![CellValue::Integer(2003), at(1), s("南区"), s("K2"), s("乙")],
        ],
    );
    let xlsx = fx.dir.path().join("complaints.xlsx");
    write_xlsx(&primary, &xlsx).unwrap();

    let mut params = fx.params("0", "揽收时间=2024-05-01");
    params.primary_path = Some(xlsx.display().to_string());
    let outcome = run(&params);
    assert!(outcome.success, "{}", outcome.message);
    assert_eq!(
        tracking_numbers(&fx.out_dir().join("0501-筛选后客户运单号列表.xlsx"), "单号"),
        ints(&[2001])
    );
}
