//! FILENAME: tests/common/mod.rs
//! Test harness and fixtures for pivot table integration tests.

#![allow(dead_code)]

use pivot_table::{
    build_layout, build_pivot_table, EngineConfig, Layout, Response, Table, TableCell,
};
use serde_json::{json, Value};

/// Test harness holding the engine configuration used for every build.
pub struct TestHarness {
    pub config: EngineConfig,
}

impl TestHarness {
    /// Create a harness with the default configuration.
    pub fn new() -> Self {
        TestHarness {
            config: EngineConfig::default(),
        }
    }

    /// Build and validate a layout; panics on invalid layouts.
    pub fn layout(&self, config: Value) -> Layout {
        build_layout(&config, None, None).expect("layout should be valid")
    }

    /// Build a response with one header per name (the last one should be "value").
    pub fn response(&self, headers: &[&str], meta_data: Value, rows: Value) -> Response {
        let headers: Vec<Value> = headers
            .iter()
            .map(|name| json!({"name": name, "column": name, "meta": *name != "value"}))
            .collect();

        Response::from_value(json!({
            "headers": headers,
            "metaData": meta_data,
            "rows": rows
        }))
        .expect("response should be valid")
    }

    pub fn build(&self, layout: &Layout, response: &Response) -> Table {
        build_pivot_table(layout, response, &self.config).expect("table should build")
    }
}

// ============================================================================
// FIXTURES
// ============================================================================

/// Immunization data: two data elements by four districts for one month.
pub struct ImmunizationFixture;

impl ImmunizationFixture {
    pub fn headers() -> Vec<&'static str> {
        vec!["dx", "pe", "ou", "value"]
    }

    pub fn meta_data() -> Value {
        json!({
            "names": {
                "dx": "Data",
                "pe": "Period",
                "ou": "Organisation unit",
                "BCG": "BCG doses",
                "OPV": "OPV doses",
                "202101": "January 2021",
                "Bo": "Bo",
                "Kenema": "Kenema",
                "Bombali": "Bombali",
                "Tonkolili": "Tonkolili"
            }
        })
    }

    /// Tonkolili has no data.
    pub fn rows() -> Value {
        json!([
            ["BCG", "202101", "Bo", "30"],
            ["OPV", "202101", "Bo", "12"],
            ["BCG", "202101", "Kenema", "10"],
            ["OPV", "202101", "Kenema", "25"],
            ["BCG", "202101", "Bombali", "20"]
        ])
    }

    /// Data on columns, districts on rows, the month as filter.
    pub fn layout(extra: Value) -> Value {
        let mut config = json!({
            "columns": [{"dimension": "dx", "items": [{"id": "BCG"}, {"id": "OPV"}]}],
            "rows": [{"dimension": "ou", "items": [
                {"id": "Bo"}, {"id": "Kenema"}, {"id": "Bombali"}, {"id": "Tonkolili"}
            ]}],
            "filters": [{"dimension": "pe", "items": [{"id": "202101"}]}]
        });
        merge(&mut config, extra);
        config
    }
}

/// Two-level rows: districts by age group, one data element on columns.
pub struct AgeGroupFixture;

impl AgeGroupFixture {
    pub fn headers() -> Vec<&'static str> {
        vec!["dx", "pe", "ou", "age", "value"]
    }

    /// Kenema has no data for either age group.
    pub fn rows() -> Value {
        json!([
            ["BCG", "202101", "Bo", "under1", "4"],
            ["BCG", "202101", "Bo", "over1", "6"]
        ])
    }

    pub fn layout(extra: Value) -> Value {
        let mut config = json!({
            "columns": [{"dimension": "dx", "items": [{"id": "BCG"}]}],
            "rows": [
                {"dimension": "ou", "items": [{"id": "Bo"}, {"id": "Kenema"}]},
                {"dimension": "age", "items": [{"id": "under1"}, {"id": "over1"}]}
            ],
            "filters": [{"dimension": "pe", "items": [{"id": "202101"}]}]
        });
        merge(&mut config, extra);
        config
    }
}

fn merge(target: &mut Value, extra: Value) {
    if let (Some(target), Value::Object(extra)) = (target.as_object_mut(), extra) {
        target.extend(extra);
    }
}

// ============================================================================
// ASSERTION HELPERS
// ============================================================================

/// Display texts of the rendered cells of a row.
pub fn rendered_texts(cells: &[TableCell]) -> Vec<String> {
    cells
        .iter()
        .filter(|c| c.is_rendered())
        .map(|c| c.formatted_value.clone())
        .collect()
}

/// Rendered rows of a table as display texts, empty rows skipped.
pub fn visible_texts(table: &Table) -> Vec<Vec<String>> {
    table.view.visible_rows().map(|row| rendered_texts(row)).collect()
}

/// The rendered header cell of a row axis item, if any.
pub fn row_header<'a>(table: &'a Table, id: &str) -> Option<&'a TableCell> {
    table
        .view.rows
        .iter()
        .skip(table.view.header_row_count)
        .flat_map(|row| row.iter())
        .find(|c| c.id.as_deref() == Some(id) && c.is_rendered())
}

/// Row axis item ids in table order (single-dimension row axes).
pub fn row_order(table: &Table) -> Vec<String> {
    table
        .row_axis
        .as_ref()
        .map(|axis| axis.ids.clone())
        .unwrap_or_default()
}
