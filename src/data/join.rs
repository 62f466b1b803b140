use std::collections::{HashMap, HashSet};

use super::model::{CellValue, Row, Table};
use crate::error::{PipelineError, TableRole};

/// Fail with a schema error naming every column of `required` that `table`
/// lacks.
pub fn require_columns<S: AsRef<str>>(
    table: &Table,
    required: &[S],
    role: TableRole,
) -> Result<(), PipelineError> {
    let missing = table.missing_columns(required);
    if missing.is_empty() {
        Ok(())
    } else {
        Err(PipelineError::Schema { role, missing })
    }
}

fn key_of(row: &Row, key_idx: &[usize]) -> Vec<CellValue> {
    key_idx.iter().map(|&i| row[i].clone()).collect()
}

/// Inner equi-join of `primary` (left) and `lookup` (right) on all `keys` at
/// once.
///
/// Output rows follow `primary`'s row order; a primary row matching several
/// lookup rows appears once per match.  Output columns are the primary
/// columns followed by the lookup's non-key columns.  A non-key name present
/// on both sides is suffixed `_x` (primary) and `_y` (lookup).
///
/// [`join_and_export`](super::export::join_and_export) projects the lookup to
/// its key columns first, so the detail export carries primary columns only.
pub fn inner_join<S: AsRef<str>>(
    primary: &Table,
    lookup: &Table,
    keys: &[S],
) -> Result<Table, PipelineError> {
    require_columns(primary, keys, TableRole::Primary)?;
    require_columns(lookup, keys, TableRole::Lookup)?;

    let key_names: HashSet<&str> = keys.iter().map(AsRef::as_ref).collect();
    let index_of = |t: &Table| -> Vec<usize> {
        keys.iter()
            .filter_map(|k| t.column_index(k.as_ref()))
            .collect()
    };
    let left_keys = index_of(primary);
    let right_keys = index_of(lookup);

    let right_extra: Vec<usize> = lookup
        .column_names()
        .iter()
        .enumerate()
        .filter(|(_, name)| !key_names.contains(name.as_str()))
        .map(|(i, _)| i)
        .collect();

    // -- Output schema --
    let right_extra_names: HashSet<&str> = right_extra
        .iter()
        .map(|&i| lookup.column_names()[i].as_str())
        .collect();
    let mut columns: Vec<String> = primary
        .column_names()
        .iter()
        .map(|name| {
            if !key_names.contains(name.as_str()) && right_extra_names.contains(name.as_str()) {
                format!("{name}_x")
            } else {
                name.clone()
            }
        })
        .collect();
    columns.extend(right_extra.iter().map(|&i| {
        let name = &lookup.column_names()[i];
        if primary.has_column(name) {
            format!("{name}_y")
        } else {
            name.clone()
        }
    }));

    // -- Hash the lookup side, probe with the primary side --
    let mut index: HashMap<Vec<CellValue>, Vec<usize>> = HashMap::new();
    for (i, row) in lookup.rows().iter().enumerate() {
        index.entry(key_of(row, &right_keys)).or_default().push(i);
    }

    let mut rows = Vec::new();
    for row in primary.rows() {
        let Some(matches) = index.get(&key_of(row, &left_keys)) else {
            continue;
        };
        for &m in matches {
            let mut out = row.clone();
            out.extend(right_extra.iter().map(|&c| lookup.rows()[m][c].clone()));
            rows.push(out);
        }
    }

    Ok(Table::new(columns, rows))
}
