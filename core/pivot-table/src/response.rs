//! FILENAME: core/pivot-table/src/response.rs
//! Analytics Response - The data side of a pivot table.
//!
//! A response is the server's answer to an analytics request: positional
//! headers, rows of raw values aligned with those headers, and metadata
//! (item names, per-dimension item ids, organisation unit hierarchy paths).
//!
//! The `ValueIndex` turns the rows into an O(1) lookup from a composite
//! dimension-item key to the row's value. It is a separate value built once
//! per (layout, response) pair and passed explicitly to the table builder.

use std::collections::hash_map::Entry;

use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::config::EngineConfig;
use crate::definition::Layout;
use crate::error::ResponseError;
use crate::number_format::response_number;

/// Name of the header holding the data value of each row.
pub const VALUE_HEADER: &str = "value";

// ============================================================================
// RAW VALUES AND HEADERS
// ============================================================================

/// A single raw cell of a response row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ResponseValue {
    Null,
    Bool(bool),
    Number(f64),
    Text(String),
}

impl ResponseValue {
    /// Text form used when composing lookup keys.
    pub fn as_key(&self) -> String {
        match self {
            ResponseValue::Null => String::new(),
            ResponseValue::Bool(b) => b.to_string(),
            ResponseValue::Number(n) => n.to_string(),
            ResponseValue::Text(s) => s.clone(),
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, ResponseValue::Null)
    }
}

impl From<&str> for ResponseValue {
    fn from(s: &str) -> Self {
        ResponseValue::Text(s.to_string())
    }
}

impl From<f64> for ResponseValue {
    fn from(n: f64) -> Self {
        ResponseValue::Number(n)
    }
}

/// Describes one column of the response rows.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Header {
    pub name: String,
    #[serde(default)]
    pub column: String,
    #[serde(default)]
    pub meta: bool,
    /// Position of this header's value within every row.
    #[serde(skip_deserializing, default)]
    pub index: usize,
}

impl Header {
    pub fn new(name: impl Into<String>) -> Self {
        let name = name.into();
        Header {
            column: name.clone(),
            name,
            meta: false,
            index: 0,
        }
    }
}

// ============================================================================
// METADATA
// ============================================================================

/// Names, hierarchy paths and per-dimension item ids sent with a response.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MetaData {
    #[serde(default)]
    pub names: FxHashMap<String, String>,

    /// Organisation unit id -> "/root/.../parent" path of ancestor ids.
    #[serde(default)]
    pub ou_hierarchy: FxHashMap<String, String>,

    /// Every other key; dimension names map to arrays of item ids.
    #[serde(flatten)]
    pub dimensions: FxHashMap<String, Value>,
}

impl MetaData {
    /// Item ids the server resolved for a dimension, empty if none.
    pub fn dimension_ids(&self, dimension_name: &str) -> Vec<String> {
        match self.dimensions.get(dimension_name) {
            Some(Value::Array(ids)) => ids
                .iter()
                .filter_map(Value::as_str)
                .map(str::to_string)
                .collect(),
            _ => Vec::new(),
        }
    }

    pub fn with_name(mut self, id: impl Into<String>, name: impl Into<String>) -> Self {
        self.names.insert(id.into(), name.into());
        self
    }

    pub fn with_dimension_ids(mut self, dimension_name: impl Into<String>, ids: &[&str]) -> Self {
        self.dimensions
            .insert(dimension_name.into(), Value::from(ids.to_vec()));
        self
    }
}

// ============================================================================
// RESPONSE
// ============================================================================

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawResponse {
    #[serde(default)]
    headers: Vec<Header>,
    #[serde(default)]
    meta_data: MetaData,
    #[serde(default)]
    rows: Vec<Vec<ResponseValue>>,
}

/// A validated analytics response. Every row has one value per header.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Response {
    headers: Vec<Header>,
    meta_data: MetaData,
    rows: Vec<Vec<ResponseValue>>,
    #[serde(skip)]
    name_header_map: FxHashMap<String, usize>,
}

impl Response {
    pub fn new(
        mut headers: Vec<Header>,
        meta_data: MetaData,
        rows: Vec<Vec<ResponseValue>>,
    ) -> Result<Response, ResponseError> {
        if headers.is_empty() {
            return Err(ResponseError::MissingHeaders);
        }

        for (row, values) in rows.iter().enumerate() {
            if values.len() != headers.len() {
                return Err(ResponseError::RowLength {
                    row,
                    expected: headers.len(),
                    found: values.len(),
                });
            }
        }

        let mut name_header_map = FxHashMap::default();
        for (index, header) in headers.iter_mut().enumerate() {
            header.index = index;
            name_header_map.entry(header.name.clone()).or_insert(index);
        }

        if rows.is_empty() {
            log_info!("RESPONSE", "response has no data rows");
        } else {
            log_debug!("RESPONSE", "{} headers, {} rows", headers.len(), rows.len());
        }

        Ok(Response {
            headers,
            meta_data,
            rows,
            name_header_map,
        })
    }

    pub fn from_json(json: &str) -> Result<Response, ResponseError> {
        let raw: RawResponse = serde_json::from_str(json)?;
        Response::new(raw.headers, raw.meta_data, raw.rows)
    }

    pub fn from_value(value: Value) -> Result<Response, ResponseError> {
        let raw: RawResponse = serde_json::from_value(value)?;
        Response::new(raw.headers, raw.meta_data, raw.rows)
    }

    /// Replaces the metadata with the result of a separate metadata request.
    pub fn with_metadata(mut self, meta_data: MetaData) -> Self {
        self.meta_data = meta_data;
        self
    }

    pub fn headers(&self) -> &[Header] {
        &self.headers
    }

    pub fn rows(&self) -> &[Vec<ResponseValue>] {
        &self.rows
    }

    pub fn meta_data(&self) -> &MetaData {
        &self.meta_data
    }

    /// Zero rows is a valid, all-empty table.
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn header(&self, name: &str) -> Option<&Header> {
        self.name_header_map.get(name).map(|&i| &self.headers[i])
    }

    pub fn header_index(&self, name: &str) -> Option<usize> {
        self.name_header_map.get(name).copied()
    }

    pub fn value_header_index(&self) -> Result<usize, ResponseError> {
        self.header_index(VALUE_HEADER)
            .ok_or(ResponseError::MissingValueHeader)
    }

    /// Display name of an id, empty when unknown.
    pub fn name_by_id(&self, id: &str) -> &str {
        self.meta_data
            .names
            .get(id)
            .map(String::as_str)
            .unwrap_or("")
    }

    /// Label of a dimension, falling back to the dimension name itself.
    pub fn dimension_label(&self, dimension_name: &str) -> String {
        match self.meta_data.names.get(dimension_name) {
            Some(name) if !name.is_empty() => name.clone(),
            _ => dimension_name.to_string(),
        }
    }

    /// Ancestor names of an organisation unit, root excluded, each followed
    /// by the separator. Empty unless `show_hierarchy` is set.
    pub fn hierarchy_name_by_id(&self, id: &str, show_hierarchy: bool, separator: &str) -> String {
        if !show_hierarchy {
            return String::new();
        }

        let path = match self.meta_data.ou_hierarchy.get(id) {
            Some(path) => path,
            None => return String::new(),
        };

        let mut name = String::new();
        for ancestor in path.split('/').filter(|p| !p.is_empty()).skip(1) {
            name.push_str(self.name_by_id(ancestor));
            name.push_str(separator);
        }
        name
    }

    /// Display name of an item, with its hierarchy prefix when requested.
    pub fn item_name(&self, id: &str, show_hierarchy: bool, config: &EngineConfig) -> String {
        let mut name = self.hierarchy_name_by_id(id, show_hierarchy, &config.hierarchy_separator);
        name.push_str(self.name_by_id(id));
        name
    }

    pub fn ids_by_dimension_name(&self, dimension_name: &str) -> Vec<String> {
        self.meta_data.dimension_ids(dimension_name)
    }
}

// ============================================================================
// VALUE INDEX
// ============================================================================

/// Composite key -> raw value lookup over the rows of a response.
///
/// Keys hold one item id per key dimension, ordered by dimension name and
/// joined with the configured delimiter. Key dimensions are every column
/// and row dimension, plus filter dimensions that the response carries as
/// a header and that resolve to exactly one item. Rows that differ only in
/// a multi-item filter share a key and their values are summed.
#[derive(Debug, Clone)]
pub struct ValueIndex {
    key_dimensions: Vec<String>,
    fixed_ids: FxHashMap<String, String>,
    values: FxHashMap<String, ResponseValue>,
    delimiter: String,
}

impl ValueIndex {
    pub fn build(
        response: &Response,
        layout: &Layout,
        config: &EngineConfig,
    ) -> Result<ValueIndex, ResponseError> {
        let value_index = response.value_header_index()?;
        let meta = Some(response.meta_data());

        let mut key_dimensions: Vec<(String, usize)> = Vec::new();
        let mut fixed_ids = FxHashMap::default();
        let mut sum_collisions = false;

        for dimension in layout.dimensions(false, false) {
            let index = response
                .header_index(&dimension.dimension)
                .ok_or_else(|| ResponseError::MissingDimensionHeader(dimension.dimension.clone()))?;
            key_dimensions.push((dimension.dimension.clone(), index));
        }

        if let Some(filters) = &layout.filters {
            for dimension in filters.dimensions() {
                let index = match response.header_index(&dimension.dimension) {
                    Some(index) => index,
                    None => continue,
                };

                let ids = dimension.unique_item_ids(meta);
                if ids.len() == 1 {
                    fixed_ids.insert(dimension.dimension.clone(), ids[0].clone());
                    key_dimensions.push((dimension.dimension.clone(), index));
                } else {
                    sum_collisions = true;
                    log_warn!(
                        "RESPONSE",
                        "filter '{}' has {} items in the rows; values are summed across it",
                        dimension.dimension,
                        ids.len()
                    );
                }
            }
        }

        key_dimensions.sort_by(|a, b| a.0.cmp(&b.0));
        key_dimensions.dedup_by(|a, b| a.0 == b.0);

        let mut values = FxHashMap::default();
        let mut parts: Vec<String> = Vec::with_capacity(key_dimensions.len());

        for row in response.rows() {
            let value = match row.get(value_index) {
                Some(value) if !value.is_null() => value,
                _ => continue,
            };

            parts.clear();
            for (_, index) in &key_dimensions {
                parts.push(row.get(*index).map(ResponseValue::as_key).unwrap_or_default());
            }

            match values.entry(parts.join(&config.key_delimiter)) {
                Entry::Occupied(mut entry) if sum_collisions => {
                    let sum = response_number(entry.get()) + response_number(value);
                    entry.insert(ResponseValue::Number(sum));
                }
                Entry::Occupied(mut entry) => {
                    entry.insert(value.clone());
                }
                Entry::Vacant(entry) => {
                    entry.insert(value.clone());
                }
            }
        }

        log_debug!(
            "RESPONSE",
            "indexed {} values by [{}]",
            values.len(),
            key_dimensions.iter().map(|(n, _)| n.as_str()).collect::<Vec<_>>().join(", ")
        );

        Ok(ValueIndex {
            key_dimensions: key_dimensions.into_iter().map(|(name, _)| name).collect(),
            fixed_ids,
            values,
            delimiter: config.key_delimiter.clone(),
        })
    }

    /// Dimension names making up a key, in key order.
    pub fn key_dimensions(&self) -> &[String] {
        &self.key_dimensions
    }

    /// Composes the key for (dimension, item id) pairs.
    /// Filter dimensions with a single item are filled in automatically.
    pub fn key_for(&self, ids: &[(&str, &str)]) -> String {
        let parts: Vec<&str> = self
            .key_dimensions
            .iter()
            .map(|dimension| {
                ids.iter()
                    .find(|(name, _)| *name == dimension.as_str())
                    .map(|(_, id)| *id)
                    .or_else(|| self.fixed_ids.get(dimension).map(String::as_str))
                    .unwrap_or("")
            })
            .collect();

        parts.join(&self.delimiter)
    }

    pub fn get(&self, key: &str) -> Option<&ResponseValue> {
        self.values.get(key)
    }

    /// Looks up the value for (dimension, item id) pairs.
    pub fn value_for(&self, ids: &[(&str, &str)]) -> Option<&ResponseValue> {
        self.get(&self.key_for(ids))
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}
