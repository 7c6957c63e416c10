//! FILENAME: core/pivot-table/src/config.rs
//! Engine configuration passed explicitly into every builder.

use serde::{Deserialize, Serialize};

/// Cross-cutting settings for index, axis and table construction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EngineConfig {
    /// Joins dimension item ids into composite keys.
    #[serde(default = "default_key_delimiter")]
    pub key_delimiter: String,

    /// Decimal places shown for computed totals.
    #[serde(default = "default_display_precision")]
    pub display_precision: u32,

    /// Label of the total header cells.
    #[serde(default = "default_total_label")]
    pub total_label: String,

    /// Prefix of the sortable id registered for the row-total column.
    #[serde(default = "default_total_sort_prefix")]
    pub total_sort_prefix: String,

    /// Placed after every ancestor name when hierarchy names are shown.
    #[serde(default = "default_hierarchy_separator")]
    pub hierarchy_separator: String,
}

fn default_key_delimiter() -> String {
    "-".to_string()
}

fn default_display_precision() -> u32 {
    2
}

fn default_total_label() -> String {
    "Total".to_string()
}

fn default_total_sort_prefix() -> String {
    "total_".to_string()
}

fn default_hierarchy_separator() -> String {
    " / ".to_string()
}

impl Default for EngineConfig {
    fn default() -> Self {
        EngineConfig {
            key_delimiter: default_key_delimiter(),
            display_precision: default_display_precision(),
            total_label: default_total_label(),
            total_sort_prefix: default_total_sort_prefix(),
            hierarchy_separator: default_hierarchy_separator(),
        }
    }
}

impl EngineConfig {
    /// Parses a config from JSON; absent fields take their defaults.
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    /// Joins ids with the configured delimiter.
    pub fn join_ids<S: AsRef<str>>(&self, ids: &[S]) -> String {
        ids.iter()
            .map(|s| s.as_ref())
            .collect::<Vec<_>>()
            .join(&self.key_delimiter)
    }
}
