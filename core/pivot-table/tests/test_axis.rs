//! FILENAME: tests/test_axis.rs
//! Integration tests for axis expansion: spans, single-item floors and keys.

mod common;

use common::{row_header, TestHarness};
use pivot_table::{AxisType, EngineConfig, TableAxis, ValueIndex};
use serde_json::{json, Value};

// ============================================================================
// HELPER FUNCTIONS
// ============================================================================

fn create_axis(unique: &[&[&str]], compact: bool) -> TableAxis {
    let names = (0..unique.len()).map(|i| format!("d{}", i)).collect();
    let unique = unique
        .iter()
        .map(|ids| ids.iter().map(|s| s.to_string()).collect())
        .collect();
    TableAxis::from_unique_ids(AxisType::Col, names, unique, compact, &EngineConfig::default()).unwrap()
}

/// Sum of the spans of the doors on one floor.
fn floor_span_sum(axis: &TableAxis, floor: usize) -> usize {
    axis.floors[floor].iter().map(|cell| cell.span).sum()
}

fn dimension(name: &str, ids: &[&str]) -> Value {
    let items: Vec<Value> = ids.iter().map(|id| json!({"id": id})).collect();
    json!({"dimension": name, "items": items})
}

// ============================================================================
// SPAN TESTS
// ============================================================================

#[test]
fn test_span_conservation() {
    let shapes: &[&[&[&str]]] = &[
        &[&["a", "b", "c"]],
        &[&["a", "b"], &["x", "y", "z"]],
        &[&["a", "b"], &["x", "y"], &["1", "2", "3"]],
        &[&["a"], &["x", "y"]],
        &[&["a", "b"], &["p"]],
        &[&["a", "b"], &["x", "y"], &["p"]],
        &[&["a", "b"], &["p"], &["x", "y", "z"]],
    ];

    for &shape in shapes {
        let axis = create_axis(shape, false);
        let width: usize = shape.iter().map(|ids| ids.len()).product();

        assert_eq!(axis.size(), width);
        for floor in 0..axis.dims() {
            assert_eq!(floor_span_sum(&axis, floor), width, "shape {:?}, floor {}", shape, floor);
        }
    }
}

#[test]
fn test_single_item_top_floor_spans_axis() {
    let axis = create_axis(&[&["p"], &["x", "y", "z"]], false);
    assert_eq!(axis.span, vec![3, 1]);
    assert_eq!(axis.floors[0].iter().filter(|c| c.is_door()).count(), 1);
    assert_eq!(axis.floors[0][0].span, 3);
}

#[test]
fn test_single_item_lower_floor_takes_top_span() {
    let axis = create_axis(&[&["a", "b"], &["x", "y"], &["p"]], false);
    assert_eq!(axis.span, vec![2, 1, 2]);

    let compact = create_axis(&[&["a", "b"], &["x", "y"], &["p"]], true);
    assert_eq!(compact.span, vec![2, 1, 1]);
    assert_eq!(floor_span_sum(&compact, 2), 4);
}

#[test]
fn test_composite_ids_cross_product() {
    let axis = create_axis(&[&["a", "b"], &["x", "y"]], false);
    assert_eq!(axis.ids, vec!["a-x", "a-y", "b-x", "b-y"]);

    let config = EngineConfig {
        key_delimiter: "|".to_string(),
        ..EngineConfig::default()
    };
    let piped = TableAxis::from_unique_ids(
        AxisType::Row,
        vec!["d0".into(), "d1".into()],
        vec![vec!["a".into()], vec!["x".into(), "y".into()]],
        false,
        &config,
    )
    .unwrap();
    assert_eq!(piped.ids, vec!["a|x", "a|y"]);
}

// ============================================================================
// LAYOUT-DRIVEN AXIS TESTS
// ============================================================================

#[test]
fn test_metadata_ids_win_over_layout_items() {
    let harness = TestHarness::new();
    let layout = harness.layout(json!({
        "columns": [dimension("ou", &["LEVEL-2"])],
        "rows": [dimension("pe", &["LAST_3_MONTHS"])]
    }));
    let response = harness.response(
        &["ou", "pe", "value"],
        json!({"ou": ["Bo", "Kenema"], "pe": ["202101", "202102", "202103"]}),
        json!([]),
    );

    let col = TableAxis::build(&layout, &response, AxisType::Col, &harness.config)
        .unwrap()
        .unwrap();
    let row = TableAxis::build(&layout, &response, AxisType::Row, &harness.config)
        .unwrap()
        .unwrap();

    assert_eq!(col.ids, vec!["Bo", "Kenema"]);
    assert_eq!(row.size(), 3);
}

#[test]
fn test_missing_axis_is_none() {
    let harness = TestHarness::new();
    let layout = harness.layout(json!({"columns": [dimension("pe", &["202101"])]}));
    let response = harness.response(&["pe", "value"], json!({}), json!([]));

    let row = TableAxis::build(&layout, &response, AxisType::Row, &harness.config).unwrap();
    assert!(row.is_none());
}

#[test]
fn test_every_leaf_pair_finds_its_value() {
    let harness = TestHarness::new();
    let layout = harness.layout(json!({
        "columns": [dimension("dx", &["A", "B"]), dimension("co", &["m", "f"])],
        "rows": [dimension("ou", &["X", "Y"]), dimension("pe", &["202101", "202102", "202103"])]
    }));

    let mut rows = Vec::new();
    for dx in ["A", "B"] {
        for co in ["m", "f"] {
            for ou in ["X", "Y"] {
                for pe in ["202101", "202102", "202103"] {
                    rows.push(json!([pe, co, "1", ou, dx]));
                }
            }
        }
    }
    let response = harness.response(&["pe", "co", "value", "ou", "dx"], json!({}), Value::Array(rows));

    let index = ValueIndex::build(&response, &layout, &harness.config).unwrap();
    assert_eq!(index.len(), 24);

    let table = harness.build(&layout, &response);
    let values: Vec<_> = table
        .view.rows
        .iter()
        .flatten()
        .filter(|c| c.cell_type == pivot_table::CellType::Value)
        .collect();

    assert_eq!(values.len(), 24);
    assert!(values.iter().all(|c| !c.empty && c.value == Some(1.0)));
}

#[test]
fn test_single_item_floors_on_rows() {
    let harness = TestHarness::new();
    let layout = harness.layout(json!({
        "columns": [dimension("dx", &["A"])],
        "rows": [dimension("pe", &["202101"]), dimension("ou", &["X", "Y"])],
        "showColSubTotals": false
    }));
    let response = harness.response(
        &["dx", "pe", "ou", "value"],
        json!({}),
        json!([["A", "202101", "X", "1"], ["A", "202101", "Y", "2"]]),
    );

    let table = harness.build(&layout, &response);
    let row = table.row_axis.as_ref().unwrap();

    assert_eq!(row.span, vec![2, 1]);
    assert_eq!(row_header(&table, "202101").unwrap().row_span, 2);
    assert_eq!(row_header(&table, "X").unwrap().row_span, 1);
    assert_eq!(row_header(&table, "Y").unwrap().row_span, 1);
}

#[test]
fn test_single_item_floors_on_columns() {
    let harness = TestHarness::new();
    let layout = harness.layout(json!({
        "columns": [dimension("dx", &["A", "B"]), dimension("pe", &["202101"])],
        "rows": [dimension("ou", &["X"])],
        "showRowSubTotals": false
    }));
    let response = harness.response(
        &["dx", "pe", "ou", "value"],
        json!({}),
        json!([["A", "202101", "X", "1"], ["B", "202101", "X", "2"]]),
    );

    let table = harness.build(&layout, &response);
    let col = table.col_axis.as_ref().unwrap();

    assert_eq!(col.span, vec![1, 1]);
    assert_eq!(col.ids, vec!["A-202101", "B-202101"]);

    let period_headers: Vec<usize> = table.view.rows[1]
        .iter()
        .filter(|c| c.id.as_deref() == Some("202101") && c.is_rendered())
        .map(|c| c.col_span)
        .collect();
    assert_eq!(period_headers, vec![1, 1]);
}
