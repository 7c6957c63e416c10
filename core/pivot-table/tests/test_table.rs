//! FILENAME: tests/test_table.rs
//! Integration tests for table assembly: cells, totals, subtotals and collapsing.

mod common;

use common::{
    rendered_texts, row_header, visible_texts, AgeGroupFixture, ImmunizationFixture, TestHarness,
};
use pivot_table::{build_pivot_table, CellType, PivotError, ResponseError, Table};
use serde_json::json;

// ============================================================================
// HELPER FUNCTIONS
// ============================================================================

fn texts(rows: &[&[&str]]) -> Vec<Vec<String>> {
    rows.iter()
        .map(|row| row.iter().map(|s| s.to_string()).collect())
        .collect()
}

fn build_immunization_table(extra: serde_json::Value) -> Table {
    let harness = TestHarness::new();
    let layout = harness.layout(ImmunizationFixture::layout(extra));
    let response = harness.response(
        &ImmunizationFixture::headers(),
        ImmunizationFixture::meta_data(),
        ImmunizationFixture::rows(),
    );
    harness.build(&layout, &response)
}

fn build_age_group_table(extra: serde_json::Value) -> Table {
    let harness = TestHarness::new();
    let layout = harness.layout(AgeGroupFixture::layout(extra));
    let response = harness.response(&AgeGroupFixture::headers(), json!({}), AgeGroupFixture::rows());
    harness.build(&layout, &response)
}

// ============================================================================
// BASIC GRID TESTS
// ============================================================================

#[test]
fn test_end_to_end_scenario() {
    let harness = TestHarness::new();
    let layout = harness.layout(json!({
        "columns": [{"dimension": "dx", "items": [{"id": "A"}, {"id": "B"}]}],
        "rows": [{"dimension": "pe", "items": [{"id": "202101"}]}],
        "filters": [{"dimension": "ou", "items": [{"id": "X"}]}]
    }));
    let response = harness.response(
        &["dx", "pe", "ou", "value"],
        json!({}),
        json!([["A", "202101", "X", "10"], ["B", "202101", "X", "20"]]),
    );

    let table = harness.build(&layout, &response);

    assert_eq!(table.view.header_row_count, 1);
    assert_eq!(
        visible_texts(&table),
        texts(&[
            &["pe / dx", "A", "B", "Total"],
            &["202101", "10", "20", "30"],
            &["Total", "10", "20", "30"],
        ])
    );
}

#[test]
fn test_immunization_table() {
    let table = build_immunization_table(json!({}));

    assert_eq!(
        visible_texts(&table),
        texts(&[
            &["Organisation unit / Data", "BCG doses", "OPV doses", "Total"],
            &["Bo", "30", "12", "42"],
            &["Kenema", "10", "25", "35"],
            &["Bombali", "20", "", "20"],
            &["Tonkolili", "", "", ""],
            &["Total", "60", "37", "97"],
        ])
    );
    assert_eq!(table.view.td_count, 24);
}

#[test]
fn test_empty_and_zero_are_distinct() {
    let harness = TestHarness::new();
    let layout = harness.layout(ImmunizationFixture::layout(json!({})));
    let response = harness.response(
        &ImmunizationFixture::headers(),
        json!({}),
        json!([["BCG", "202101", "Bo", "0"]]),
    );

    let table = harness.build(&layout, &response);
    let bo = &table.view.rows[1];

    assert_eq!(bo[1].value, Some(0.0));
    assert!(!bo[1].empty);
    assert_eq!(bo[1].formatted_value, "0");

    assert!(bo[2].empty);
    assert!(bo[2].to_html().contains("&nbsp;"));

    // A zero is data, so the row total is zero rather than empty.
    assert!(!bo[3].empty);
    assert_eq!(bo[3].formatted_value, "0");
}

#[test]
fn test_grand_total_sums_all_cells() {
    let harness = TestHarness::new();
    let layout = harness.layout(json!({
        "columns": [{"dimension": "dx", "items": [{"id": "A"}, {"id": "B"}]}],
        "rows": [{"dimension": "ou", "items": [{"id": "X"}, {"id": "Y"}, {"id": "Z"}]}],
        "filters": [{"dimension": "pe", "items": [{"id": "202101"}]}],
        "showColSubTotals": false,
        "showRowSubTotals": false
    }));
    let headers = ["dx", "ou", "pe", "value"];

    let full = harness.response(
        &headers,
        json!({}),
        json!([
            ["A", "X", "202101", "1"], ["B", "X", "202101", "2"],
            ["A", "Y", "202101", "3"], ["B", "Y", "202101", "4"],
            ["A", "Z", "202101", "5"], ["B", "Z", "202101", "6.5"]
        ]),
    );
    let table = harness.build(&layout, &full);
    let grand = table.view.rows.last().unwrap().last().unwrap();
    assert_eq!(grand.cell_type, CellType::ValueGrandTotal);
    assert_eq!(grand.value, Some(21.5));
    assert_eq!(grand.formatted_value, "21.5");
    assert!(!grand.empty);

    let partial = harness.response(&headers, json!({}), json!([["B", "Y", "202101", "4"]]));
    let table = harness.build(&layout, &partial);
    let grand = table.view.rows.last().unwrap().last().unwrap();
    assert_eq!(grand.value, Some(4.0));

    let none = harness.response(&headers, json!({}), json!([]));
    let table = harness.build(&layout, &none);
    let grand = table.view.rows.last().unwrap().last().unwrap();
    assert!(grand.empty);
    assert_eq!(grand.formatted_value, "");
}

#[test]
fn test_totals_are_rounded_to_display_precision() {
    let harness = TestHarness::new();
    let layout = harness.layout(ImmunizationFixture::layout(json!({})));
    let response = harness.response(
        &ImmunizationFixture::headers(),
        json!({}),
        json!([["BCG", "202101", "Bo", "1.005"], ["OPV", "202101", "Bo", "2.111"]]),
    );

    let table = harness.build(&layout, &response);
    let bo = &table.view.rows[1];

    assert_eq!(bo[1].formatted_value, "1.005");
    assert_eq!(bo[3].formatted_value, "3.12");
}

#[test]
fn test_totals_rounding_to_zero_drop_the_sign() {
    let harness = TestHarness::new();
    let layout = harness.layout(ImmunizationFixture::layout(json!({})));
    let response = harness.response(
        &ImmunizationFixture::headers(),
        json!({}),
        json!([["BCG", "202101", "Bo", "-0.001"]]),
    );

    let table = harness.build(&layout, &response);

    assert_eq!(rendered_texts(&table.view.rows[1]), vec!["Bo", "-0.001", "", "0"]);
    assert_eq!(rendered_texts(table.view.rows.last().unwrap()), vec!["Total", "0", "", "0"]);
}

#[test]
fn test_digit_group_separator() {
    let harness = TestHarness::new();
    let response = harness.response(
        &ImmunizationFixture::headers(),
        json!({}),
        json!([["BCG", "202101", "Bo", "1234567"], ["OPV", "202101", "Bo", "1000"]]),
    );

    let space = harness.build(&harness.layout(ImmunizationFixture::layout(json!({}))), &response);
    assert_eq!(rendered_texts(&space.view.rows[1]), vec!["Bo", "1 234 567", "1 000", "1 235 567"]);

    let comma = harness.build(
        &harness.layout(ImmunizationFixture::layout(json!({"digitGroupSeparator": "COMMA"}))),
        &response,
    );
    assert_eq!(rendered_texts(&comma.view.rows[1]), vec!["Bo", "1,234,567", "1,000", "1,235,567"]);
}

// ============================================================================
// MISSING AXIS TESTS
// ============================================================================

#[test]
fn test_table_without_column_axis() {
    let harness = TestHarness::new();
    let layout = harness.layout(json!({
        "rows": [{"dimension": "ou", "items": [{"id": "Bo"}, {"id": "Kenema"}]}],
        "filters": [
            {"dimension": "dx", "items": [{"id": "BCG"}]},
            {"dimension": "pe", "items": [{"id": "202101"}]}
        ]
    }));
    let response = harness.response(
        &ImmunizationFixture::headers(),
        ImmunizationFixture::meta_data(),
        ImmunizationFixture::rows(),
    );

    let table = harness.build(&layout, &response);

    assert!(table.col_axis.is_none());
    assert_eq!(
        visible_texts(&table),
        texts(&[
            &["Organisation unit"],
            &["Bo", "30"],
            &["Kenema", "10"],
            &["Total", "40"],
        ])
    );
}

#[test]
fn test_table_without_row_axis() {
    let harness = TestHarness::new();
    let layout = harness.layout(json!({
        "columns": [{"dimension": "dx", "items": [{"id": "BCG"}, {"id": "OPV"}]}],
        "filters": [
            {"dimension": "ou", "items": [{"id": "Bo"}]},
            {"dimension": "pe", "items": [{"id": "202101"}]}
        ]
    }));
    let response = harness.response(
        &ImmunizationFixture::headers(),
        ImmunizationFixture::meta_data(),
        ImmunizationFixture::rows(),
    );

    let table = harness.build(&layout, &response);

    assert!(table.row_axis.is_none());
    assert_eq!(
        visible_texts(&table),
        texts(&[&["Data", "BCG doses", "OPV doses", "Total"], &["", "30", "12", "42"]])
    );
    assert_eq!(table.view.rows[1][0].cell_type, CellType::Transparent);
    assert!(table.view.sortable.is_empty());
}

// ============================================================================
// SUBTOTAL TESTS
// ============================================================================

#[test]
fn test_subtotal_rows() {
    let table = build_age_group_table(json!({}));

    assert_eq!(
        visible_texts(&table),
        texts(&[
            &["ou", "age / dx", "BCG", "Total"],
            &["Bo", "under1", "4", "4"],
            &["over1", "6", "6"],
            &["", "10", "10"],
            &["Kenema", "under1", "", ""],
            &["over1", "", ""],
            &["", "", ""],
            &["Total", "10", "10"],
        ])
    );

    let subtotal_row = &table.view.rows[3];
    assert_eq!(subtotal_row[0].cell_type, CellType::DimensionSubtotal);
    assert_eq!(subtotal_row[0].col_span, 2);
    assert!(subtotal_row[1].hidden);
    assert_eq!(subtotal_row[2].cell_type, CellType::ValueSubtotal);
    assert_eq!(subtotal_row[3].cell_type, CellType::ValueTotalSubgrandtotal);

    assert_eq!(row_header(&table, "Bo").unwrap().row_span, 2);
    assert!(table.view.sortable.is_empty());
}

#[test]
fn test_subtotal_columns() {
    let harness = TestHarness::new();
    let layout = harness.layout(json!({
        "columns": [
            {"dimension": "dx", "items": [{"id": "BCG"}, {"id": "OPV"}]},
            {"dimension": "age", "items": [{"id": "under1"}, {"id": "over1"}]}
        ],
        "rows": [{"dimension": "ou", "items": [{"id": "Bo"}, {"id": "Kenema"}]}],
        "filters": [{"dimension": "pe", "items": [{"id": "202101"}]}]
    }));
    let response = harness.response(
        &AgeGroupFixture::headers(),
        json!({}),
        json!([
            ["BCG", "202101", "Bo", "under1", "4"],
            ["BCG", "202101", "Bo", "over1", "6"],
            ["OPV", "202101", "Bo", "under1", "1"],
            ["OPV", "202101", "Kenema", "over1", "2"]
        ]),
    );

    let table = harness.build(&layout, &response);

    assert_eq!(table.view.header_row_count, 2);
    assert_eq!(
        visible_texts(&table),
        texts(&[
            &["dx", "BCG", "", "OPV", "", "Total"],
            &["ou / age", "under1", "over1", "under1", "over1"],
            &["Bo", "4", "6", "10", "1", "", "1", "11"],
            &["Kenema", "", "", "", "", "2", "2", "2"],
            &["Total", "4", "6", "10", "1", "2", "3", "13"],
        ])
    );

    let totals = table.view.rows.last().unwrap();
    assert_eq!(totals[2].cell_type, CellType::ValueTotal);
    assert_eq!(totals[3].cell_type, CellType::ValueTotalSubgrandtotal);
    assert_eq!(totals[7].cell_type, CellType::ValueGrandTotal);

    let kenema = &table.view.rows[3];
    assert!(kenema[3].empty);
    assert_eq!(kenema[3].cell_type, CellType::ValueSubtotal);

    let ids: Vec<&str> = table.view.sortable.iter().map(|s| s.id.as_str()).collect();
    assert_eq!(ids, vec!["total_", "BCG-under1", "BCG-over1", "OPV-under1", "OPV-over1"]);
}

#[test]
fn test_subtotals_disabled() {
    let table = build_age_group_table(json!({"colSubTotals": false}));
    assert!(table
        .view.rows
        .iter()
        .flatten()
        .all(|c| c.cell_type != CellType::ValueSubtotal));
    assert_eq!(table.view.rows.len(), 6);
}

// ============================================================================
// EMPTY ROW COLLAPSING TESTS
// ============================================================================

#[test]
fn test_hide_empty_rows_collapses_group() {
    let table = build_age_group_table(json!({"hideEmptyRows": true}));

    assert_eq!(
        visible_texts(&table),
        texts(&[
            &["ou", "age / dx", "BCG", "Total"],
            &["Bo", "under1", "4", "4"],
            &["over1", "6", "6"],
            &["", "10", "10"],
            &["Total", "10", "10"],
        ])
    );

    assert_eq!(row_header(&table, "Bo").unwrap().row_span, 2);
    assert!(row_header(&table, "Kenema").is_none());

    let axis = table.row_axis.as_ref().unwrap();
    assert!(axis.floors[0][2].collapsed);
    assert_eq!(axis.floors[0][2].children, 0);
    assert!(!axis.floors[0][0].collapsed);
    assert_eq!(axis.floors[0][0].children, 2);
}

#[test]
fn test_hide_empty_rows_moves_header_to_first_visible_row() {
    let harness = TestHarness::new();
    let layout = harness.layout(AgeGroupFixture::layout(json!({"hideEmptyRows": true})));
    let response = harness.response(
        &AgeGroupFixture::headers(),
        json!({}),
        json!([["BCG", "202101", "Bo", "over1", "6"], ["BCG", "202101", "Kenema", "under1", "3"]]),
    );

    let table = harness.build(&layout, &response);

    assert_eq!(
        visible_texts(&table),
        texts(&[
            &["ou", "age / dx", "BCG", "Total"],
            &["Bo", "over1", "6", "6"],
            &["", "6", "6"],
            &["Kenema", "under1", "3", "3"],
            &["", "3", "3"],
            &["Total", "9", "9"],
        ])
    );
    assert_eq!(row_header(&table, "Bo").unwrap().row_span, 1);
}

#[test]
fn test_hide_empty_rows_single_dimension() {
    let table = build_immunization_table(json!({"hideEmptyRows": true}));

    assert!(row_header(&table, "Tonkolili").is_none());
    assert_eq!(visible_texts(&table).len(), 5);
    assert_eq!(visible_texts(&table).last().unwrap(), &vec!["Total", "60", "37", "97"]);
}

// ============================================================================
// PRESENTATION TESTS
// ============================================================================

#[test]
fn test_hierarchy_names() {
    let harness = TestHarness::new();
    let layout = harness.layout(ImmunizationFixture::layout(json!({"showHierarchy": true})));
    let response = harness.response(
        &ImmunizationFixture::headers(),
        json!({
            "names": {"Bo": "Bo", "SL": "Sierra Leone", "South": "Southern"},
            "ouHierarchy": {"Bo": "/SL/South"}
        }),
        ImmunizationFixture::rows(),
    );

    let table = harness.build(&layout, &response);
    let bo = row_header(&table, "Bo").unwrap();

    assert_eq!(bo.formatted_value, "Southern / Bo");
    assert!(bo.align_left);
    assert!(bo.css_classes().contains("td-nobreak align-left"));
}

#[test]
fn test_html_output() {
    let table = build_immunization_table(json!({"displayDensity": "COMPACT", "fontSize": "SMALL"}));

    assert!(table
        .html
        .starts_with("<table class=\"pivot displaydensity-compact fontsize-small\"><tr>"));
    assert!(table.html.ends_with("</tr></table>"));
    assert_eq!(table.html.matches("<tr>").count(), 6);
    assert_eq!(table.html.matches("<td").count(), table.view.td_count);
}

#[test]
fn test_serializes_to_json() {
    let table = build_immunization_table(json!({}));
    let value = serde_json::to_value(&table).unwrap();

    assert_eq!(value["view"]["headerRowCount"], json!(1));
    assert_eq!(value["view"]["rows"][1][1]["cellType"], json!("value"));
    assert_eq!(value["colAxis"]["ids"], json!(["BCG", "OPV"]));
}

// ============================================================================
// ERROR TESTS
// ============================================================================

#[test]
fn test_missing_dimension_header() {
    let harness = TestHarness::new();
    let layout = harness.layout(ImmunizationFixture::layout(json!({})));
    let response = harness.response(&["dx", "pe", "value"], json!({}), json!([]));

    let result = build_pivot_table(&layout, &response, &harness.config);
    assert!(matches!(
        result,
        Err(PivotError::Response(ResponseError::MissingDimensionHeader(ref d))) if d == "ou"
    ));
}

#[test]
fn test_empty_response_renders_empty_table() {
    let harness = TestHarness::new();
    let layout = harness.layout(ImmunizationFixture::layout(json!({})));
    let response = harness.response(&ImmunizationFixture::headers(), json!({}), json!([]));

    let table = harness.build(&layout, &response);

    assert!(response.is_empty());
    assert_eq!(table.view.rows.len(), 6);
    assert!(table
        .view.rows
        .iter()
        .skip(1)
        .flat_map(|row| row.iter())
        .filter(|c| c.cell_type.is_numeric())
        .all(|c| c.empty));
}
