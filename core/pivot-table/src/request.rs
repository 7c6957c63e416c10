//! FILENAME: core/pivot-table/src/request.rs
//! Analytics request building.
//!
//! The engine never performs network calls. This module only composes the
//! request URLs a caller sends to the analytics server for a layout, and
//! maps HTTP failures of those requests to user-facing messages.
//!
//! A table needs two requests: a metadata-only request with sorted
//! dimensions, and a data-only request. The caller merges the metadata into
//! the data response (`Response::with_metadata`) before building the table.

use serde::Serialize;

use crate::definition::{unique, AggregationType, Dimension, Layout, OptionId};

/// Display property used when the layout does not name one.
pub const DEFAULT_DISPLAY_PROPERTY: &str = "NAME";

const APPROVAL_LEVEL_DEFAULT: &str = "DEFAULT";

const URL_HINT: &str = "Hint: A good way to reduce the number of items is to use relative periods and level/group organisation unit selection modes.";

// ============================================================================
// REQUEST
// ============================================================================

/// A GET request against the analytics endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalyticsRequest {
    pub base_url: String,
    pub params: Vec<(String, String)>,
}

impl AnalyticsRequest {
    pub fn new(base_url: impl Into<String>) -> Self {
        AnalyticsRequest {
            base_url: base_url.into(),
            params: Vec::new(),
        }
    }

    pub fn add(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.params.push((key.into(), value.into()));
    }

    pub fn with(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.add(key, value);
        self
    }

    /// Value of the first parameter with this key.
    pub fn param(&self, key: &str) -> Option<&str> {
        self.params
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    /// Full request URL.
    pub fn url(&self) -> String {
        if self.params.is_empty() {
            return self.base_url.clone();
        }

        let query: Vec<String> = self
            .params
            .iter()
            .map(|(key, value)| format!("{}={}", key, value))
            .collect();

        let separator = if self.base_url.contains('?') { '&' } else { '?' };
        format!("{}{}{}", self.base_url, separator, query.join("&"))
    }
}

/// The two requests behind one table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DataRequests {
    /// Metadata only (`skipData=true`), dimensions sorted by name.
    pub metadata: AnalyticsRequest,
    /// Data only (`skipMeta=true`), dimensions in layout order.
    pub data: AnalyticsRequest,
}

// ============================================================================
// PARAMETERS
// ============================================================================

fn dimension_param(dimension: &Dimension, sorted: bool) -> String {
    let mut ids = unique(dimension.record_ids());
    if sorted {
        ids.sort();
    }
    format!("{}:{}", dimension.dimension, ids.join(";"))
}

/// Query parameters describing a layout.
///
/// Columns and rows become `dimension` params, filters become `filter`
/// params. With `sorted`, dimensions are ordered by name and item ids
/// alphabetically, so equal selections produce equal URLs.
pub fn request_params(layout: &Layout, sorted: bool) -> Vec<(String, String)> {
    let mut params = Vec::new();

    for dimension in layout.dimensions(false, sorted) {
        params.push(("dimension".to_string(), dimension_param(dimension, sorted)));
    }

    if let Some(filters) = &layout.filters {
        let mut dimensions: Vec<&Dimension> = filters.dimensions().iter().collect();
        if sorted {
            dimensions.sort_by(|a, b| a.dimension.cmp(&b.dimension));
        }
        for dimension in dimensions {
            params.push(("filter".to_string(), dimension_param(dimension, sorted)));
        }
    }

    if layout.show_hierarchy {
        params.push(("hierarchyMeta".to_string(), "true".to_string()));
    }

    if layout.completed_only {
        params.push(("completedOnly".to_string(), "true".to_string()));
    }

    if layout.aggregation_type != AggregationType::Default {
        params.push(("aggregationType".to_string(), layout.aggregation_type.id().to_string()));
    }

    if !layout.user_org_unit.is_empty() {
        params.push(("userOrgUnit".to_string(), layout.user_org_unit.join(";")));
    }

    if let Some(level) = &layout.data_approval_level {
        if level.id != APPROVAL_LEVEL_DEFAULT {
            params.push(("approvalLevel".to_string(), level.id.clone()));
        }
    }

    if let Some(program) = &layout.program {
        params.push(("program".to_string(), program.id.clone()));
    }

    if let Some(date) = layout.relative_period_date {
        params.push(("relativePeriodDate".to_string(), date.format("%Y-%m-%d").to_string()));
    }

    if layout.skip_rounding {
        params.push(("skipRounding".to_string(), "true".to_string()));
    }

    let display_property = layout
        .display_property
        .as_deref()
        .filter(|p| !p.is_empty())
        .unwrap_or(DEFAULT_DISPLAY_PROPERTY)
        .to_uppercase();
    params.push(("displayProperty".to_string(), display_property));

    params
}

impl Layout {
    /// The metadata and data requests for this layout.
    pub fn data_requests(&self, base_url: &str) -> DataRequests {
        let mut metadata = AnalyticsRequest::new(base_url);
        metadata.params = request_params(self, true);
        metadata.add("skipData", "true");

        let mut data = AnalyticsRequest::new(base_url);
        data.params = request_params(self, false);
        data.add("skipMeta", "true");

        log_debug!(
            "REQUEST",
            "metadata url {} chars, data url {} chars",
            metadata.url().len(),
            data.url().len()
        );

        DataRequests { metadata, data }
    }
}

// ============================================================================
// STATUS MESSAGES
// ============================================================================

/// User-facing message for a failed analytics request, when the status
/// has one. 413 and 414 mean the URL carries too many items.
pub fn status_message(status: u16, url: &str) -> Option<String> {
    match status {
        413 | 414 => {
            let length = url.chars().count();
            let limit = if length > 8000 {
                8000
            } else if length > 4000 {
                4000
            } else {
                2000
            };

            log_warn!("REQUEST", "request rejected with {}: url has {} characters", status, length);

            Some(format!(
                "Too many items selected (url has {} characters). Please reduce to less than {} characters.\n\n{}",
                length, limit, URL_HINT
            ))
        }
        _ => None,
    }
}
