use std::collections::BTreeSet;

use log::warn;
use thiserror::Error;

use super::SkipNotice;

/// A row-range token that is not `N` or `N-M` with non-negative integers.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("无法解析 '{token}'：{reason}")]
pub struct RangeFormatError {
    pub token: String,
    pub reason: &'static str,
}

impl RangeFormatError {
    fn new(token: &str, reason: &'static str) -> Self {
        RangeFormatError {
            token: token.to_string(),
            reason,
        }
    }
}

/// Rows selected by a range string, plus the tokens that were
/// skipped because they fell outside the table.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RowSelection {
    pub indices: BTreeSet<usize>,
    pub skipped: Vec<SkipNotice>,
}

/// Parse a row-range string such as `"0-5,10-15,20"` against a table
/// of `row_count` rows.
///
/// Tokens are separated by `,`.  A token containing `-` is an inclusive range
/// `start-end`; any other token is a single index.  Surrounding whitespace is
/// ignored.
///
/// * A token that is not made of integers (including a leading `-`, as in
///   `-1-3`, and empty tokens) aborts the whole string with a
///   [`RangeFormatError`].
/// * A well-formed range with `start > end` or `end >= row_count`, or an index
///   `>= row_count`, is skipped as a whole and reported; parsing continues.
pub fn parse_ranges(spec: &str, row_count: usize) -> Result<RowSelection, RangeFormatError> {
    let mut selection = RowSelection::default();

    for token in spec.split(',') {
        let token = token.trim();
        if token.contains('-') {
            let mut parts = token.split('-');
            let (Some(start), Some(end), None) = (parts.next(), parts.next(), parts.next()) else {
                return Err(RangeFormatError::new(token, "范围只能包含一个 '-'"));
            };
            let start = parse_index(token, start)?;
            let end = parse_index(token, end)?;
            if start > end || end >= row_count {
                selection.skip(SkipNotice::RowRange {
                    token: token.to_string(),
                    row_count,
                });
                continue;
            }
            selection.indices.extend(start..=end);
        } else {
            let index = parse_index(token, token)?;
            if index >= row_count {
                selection.skip(SkipNotice::RowIndex {
                    token: token.to_string(),
                    row_count,
                });
                continue;
            }
            selection.indices.insert(index);
        }
    }

    Ok(selection)
}

fn parse_index(token: &str, part: &str) -> Result<usize, RangeFormatError> {
    let part = part.trim();
    if part.is_empty() {
        return Err(RangeFormatError::new(token, "缺少数字"));
    }
    part.parse::<usize>()
        .map_err(|_| RangeFormatError::new(token, "不是有效的非负整数"))
}

impl RowSelection {
    fn skip(&mut self, notice: SkipNotice) {
        warn!("{notice}");
        self.skipped.push(notice);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn set(v: &[usize]) -> BTreeSet<usize> {
        v.iter().copied().collect()
    }

    #[test]
    fn single_zero_index() {
        for rows in [1, 2, 50] {
            assert_eq!(parse_ranges("0", rows).unwrap().indices, set(&[0]));
        }
    }

    #[test]
    fn ranges_and_indices_union() {
        let sel = parse_ranges("0-2,5", 10).unwrap();
        assert_eq!(sel.indices, set(&[0, 1, 2, 5]));
        assert!(sel.skipped.is_empty());
    }

    #[test]
    fn order_and_overlap_do_not_matter() {
        let a = parse_ranges("5, 0-2, 1-3, 2", 10).unwrap().indices;
        let b = parse_ranges("2,1-3,0-2,5", 10).unwrap().indices;
        assert_eq!(a, b);
        assert_eq!(a, set(&[0, 1, 2, 3, 5]));
    }

    #[test]
    fn whitespace_is_tolerated() {
        let sel = parse_ranges(" 1 - 3 ,  7 ", 10).unwrap();
        assert_eq!(sel.indices, set(&[1, 2, 3, 7]));
    }

    #[test]
    fn leading_negative_is_a_format_error() {
        let err = parse_ranges("-1-3", 10).unwrap_err();
        assert_eq!(err.token, "-1-3");

        assert!(parse_ranges("-3", 10).is_err());
    }

    #[test]
    fn malformed_token_aborts_everything() {
        assert!(parse_ranges("0-2,abc,5", 10).is_err());
        assert!(parse_ranges("0,", 10).is_err());
        assert!(parse_ranges("3-", 10).is_err());
        assert!(parse_ranges("1.5", 10).is_err());
    }

    #[test]
    fn range_past_end_is_skipped_whole() {
        let sel = parse_ranges("8-12", 10).unwrap();
        assert!(sel.indices.is_empty());
        assert_eq!(
            sel.skipped,
            vec![SkipNotice::RowRange {
                token: "8-12".to_string(),
                row_count: 10
            }]
        );
    }

    #[test]
    fn inverted_and_out_of_bounds_are_soft_skips() {
        let sel = parse_ranges("5-3,10,2", 10).unwrap();
        assert_eq!(sel.indices, set(&[2]));
        assert_eq!(sel.skipped.len(), 2);
    }

    #[test]
    fn empty_table_selects_nothing() {
        let sel = parse_ranges("0", 0).unwrap();
        assert!(sel.indices.is_empty());
        assert_eq!(sel.skipped.len(), 1);
    }
}
