//! FILENAME: core/pivot-table/src/sort.rs
//! Row sorting by a column's values.
//!
//! Sorting never reorders rendered output. It re-derives the order of the
//! row axis items from the value index, and the table is rebuilt from the
//! reordered axis. Only single-dimension row axes are sortable.

use std::cmp::Ordering;

use crate::axis::TableAxis;
use crate::config::EngineConfig;
use crate::definition::{SortDirection, SortId, Sorting};
use crate::number_format::response_number;
use crate::response::ValueIndex;

/// The column a sort refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortTarget {
    /// The row total column.
    Total,
    /// A column leaf position.
    Column(usize),
}

/// Resolves a sort id against the column axis.
///
/// Accepts a column composite id, the total id ("total" or the configured
/// total prefix, any case), or a 1-based column position where 0 is the total.
pub fn resolve_sort_target(
    id: &SortId,
    col_axis: Option<&TableAxis>,
    config: &EngineConfig,
) -> Option<SortTarget> {
    let size = col_axis.map_or(0, TableAxis::size);

    match id {
        SortId::Position(0) => Some(SortTarget::Total),
        SortId::Position(n) => {
            let position = (*n as usize) - 1;
            if position < size {
                Some(SortTarget::Column(position))
            } else {
                None
            }
        }
        SortId::Key(key) => {
            if key.eq_ignore_ascii_case("total") || key.eq_ignore_ascii_case(&config.total_sort_prefix) {
                return Some(SortTarget::Total);
            }

            col_axis
                .and_then(|axis| axis.ids.iter().position(|id| id == key))
                .map(SortTarget::Column)
        }
    }
}

/// Value of one row under the sort target; None when there is no data.
/// The total is the sum of the row's defined values.
pub fn sort_value(
    index: &ValueIndex,
    col_axis: Option<&TableAxis>,
    row_dimension: &str,
    row_id: &str,
    target: SortTarget,
) -> Option<f64> {
    let lookup = |position: Option<usize>| {
        let mut ids: Vec<(&str, &str)> = match (col_axis, position) {
            (Some(axis), Some(p)) => axis.leaf_item_ids(p),
            _ => Vec::new(),
        };
        ids.push((row_dimension, row_id));
        index.value_for(&ids).map(response_number)
    };

    match target {
        SortTarget::Column(position) => lookup(Some(position)),
        SortTarget::Total => {
            let positions: Vec<Option<usize>> = match col_axis {
                Some(axis) => (0..axis.size()).map(Some).collect(),
                None => vec![None],
            };

            positions
                .into_iter()
                .filter_map(lookup)
                .fold(None, |acc, v| Some(acc.unwrap_or(0.0) + v))
        }
    }
}

/// Ascending order of two defined sort values.
pub fn compare_sort_values(a: f64, b: f64) -> Ordering {
    a.partial_cmp(&b).unwrap_or(Ordering::Equal)
}

/// Reorders the row item ids by the sorted column.
/// Rows with a value are sorted ascending and the block is reversed for DESC,
/// so both directions are exact mirrors even on ties. Rows without data keep
/// their layout order at the end.
/// Returns None when the sort id does not match any column.
pub fn sorted_row_ids(
    sorting: &Sorting,
    index: &ValueIndex,
    col_axis: Option<&TableAxis>,
    row_dimension: &str,
    row_ids: &[String],
    config: &EngineConfig,
) -> Option<Vec<String>> {
    let target = match resolve_sort_target(&sorting.id, col_axis, config) {
        Some(target) => target,
        None => {
            log_warn!("SORT", "no column matches sort id {:?}; keeping row order", sorting.id);
            return None;
        }
    };

    let mut defined: Vec<(f64, &String)> = Vec::with_capacity(row_ids.len());
    let mut undefined: Vec<&String> = Vec::new();
    for id in row_ids {
        match sort_value(index, col_axis, row_dimension, id, target) {
            Some(value) => defined.push((value, id)),
            None => undefined.push(id),
        }
    }

    defined.sort_by(|a, b| compare_sort_values(a.0, b.0));
    if sorting.direction == SortDirection::Desc {
        defined.reverse();
    }

    log_debug!(
        "SORT",
        "sorted {} rows of '{}' by {:?} {:?} ({} without data)",
        row_ids.len(),
        row_dimension,
        target,
        sorting.direction,
        undefined.len()
    );

    Some(
        defined
            .into_iter()
            .map(|(_, id)| id)
            .chain(undefined)
            .cloned()
            .collect(),
    )
}
