//! FILENAME: core/pivot-table/src/definition.rs
//! Pivot Table Definition - The layout of an analytics report.
//!
//! This module contains all the types needed to DESCRIBE a pivot table:
//! which dimension items sit on columns, rows and filters, plus the display
//! and aggregation options. These structures are designed to be:
//! - Built leniently from user/favorite JSON (bad pieces are dropped, not fatal)
//! - Validated once, then treated as immutable snapshots of user intent
//! - Serializable back into the persisted favorite format

use std::collections::BTreeMap;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};

use crate::error::LayoutError;
use crate::response::MetaData;

/// Dimension name of the period dimension. Every layout needs it somewhere.
pub const PERIOD_DIMENSION: &str = "pe";

/// Dimension name of the category dimension. It may come without items;
/// its items are then resolved from response metadata.
pub const CATEGORY_DIMENSION: &str = "co";

/// Dimension name of the data dimension.
pub const DATA_DIMENSION: &str = "dx";

/// Dimension name of the organisation unit dimension.
pub const ORG_UNIT_DIMENSION: &str = "ou";

// ============================================================================
// RECORD / DIMENSION / AXIS
// ============================================================================

/// A dimension item: an id with an optional display name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Record {
    pub id: String,
    #[serde(default)]
    pub name: String,
}

impl Record {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Record {
            id: id.into(),
            name: name.into(),
        }
    }

    /// Builds a record from raw JSON. Returns None unless `id` is a non-empty string.
    pub fn from_value(value: &Value) -> Option<Record> {
        let id = value.get("id").and_then(Value::as_str)?;
        if id.is_empty() {
            return None;
        }

        let name = value.get("name").and_then(Value::as_str).unwrap_or_default();
        Some(Record::new(id, name))
    }
}

/// A named lane of dimension items.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Dimension {
    pub dimension: String,
    pub items: Vec<Record>,
    /// Optional filter expression (e.g. "GT:10"), carried through unchanged.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filter: Option<String>,
}

impl Dimension {
    pub fn new(dimension: impl Into<String>, items: Vec<Record>) -> Self {
        Dimension {
            dimension: dimension.into(),
            items,
            filter: None,
        }
    }

    /// Builds a dimension from raw JSON.
    /// Invalid items are dropped. The dimension itself is rejected when its
    /// name is missing, or when no items remain and it is not the category dimension.
    pub fn from_value(value: &Value) -> Option<Dimension> {
        let name = match value.get("dimension").and_then(Value::as_str) {
            Some(name) if !name.is_empty() => name,
            _ => {
                log_debug!("LAYOUT", "dropping dimension without a name: {}", value);
                return None;
            }
        };

        let raw_items = array_from(value.get("items"));
        let mut items = Vec::with_capacity(raw_items.len());
        for raw in raw_items {
            match Record::from_value(raw) {
                Some(record) => items.push(record),
                None => log_debug!("LAYOUT", "dimension '{}': dropping item without id: {}", name, raw),
            }
        }

        if items.is_empty() && name != CATEGORY_DIMENSION {
            log_debug!("LAYOUT", "dropping dimension '{}': no items", name);
            return None;
        }

        Some(Dimension {
            dimension: name.to_string(),
            items,
            filter: value.get("filter").and_then(Value::as_str).map(str::to_string),
        })
    }

    pub fn is_category(&self) -> bool {
        self.dimension == CATEGORY_DIMENSION
    }

    /// Item ids in layout order.
    pub fn record_ids(&self) -> Vec<String> {
        self.items.iter().map(|r| r.id.clone()).collect()
    }

    /// Unique item ids for this dimension.
    /// Server-resolved ids in the response metadata win over the layout items
    /// (the server expands group sets, levels and categories); order is kept.
    pub fn unique_item_ids(&self, meta: Option<&MetaData>) -> Vec<String> {
        let resolved = meta
            .map(|m| m.dimension_ids(&self.dimension))
            .filter(|ids| !ids.is_empty());

        let ids = resolved.unwrap_or_else(|| self.record_ids());
        unique(ids)
    }
}

/// Ordered dimensions placed on one side of the table.
/// An axis always holds at least one dimension.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Axis {
    dimensions: Vec<Dimension>,
}

impl Axis {
    /// Returns None for an empty dimension list.
    pub fn new(dimensions: Vec<Dimension>) -> Option<Axis> {
        if dimensions.is_empty() {
            None
        } else {
            Some(Axis { dimensions })
        }
    }

    /// Builds an axis from a raw JSON array, dropping invalid dimensions.
    pub fn from_value(value: Option<&Value>) -> Option<Axis> {
        let dimensions: Vec<Dimension> = array_from(value)
            .into_iter()
            .filter_map(Dimension::from_value)
            .collect();

        Axis::new(dimensions)
    }

    pub fn dimensions(&self) -> &[Dimension] {
        &self.dimensions
    }

    pub fn len(&self) -> usize {
        self.dimensions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.dimensions.is_empty()
    }

    pub fn has(&self, dimension_name: &str) -> bool {
        self.dimensions.iter().any(|d| d.dimension == dimension_name)
    }

    pub fn dimension(&self, dimension_name: &str) -> Option<&Dimension> {
        self.dimensions.iter().find(|d| d.dimension == dimension_name)
    }

    /// Dimension names in axis order.
    pub fn dimension_names(&self) -> Vec<String> {
        self.dimensions.iter().map(|d| d.dimension.clone()).collect()
    }

    /// Clone of this axis with dimensions ordered by name.
    pub fn sorted(&self) -> Axis {
        let mut dimensions = self.dimensions.clone();
        dimensions.sort_by(|a, b| a.dimension.cmp(&b.dimension));
        Axis { dimensions }
    }
}

// ============================================================================
// OPTION IDS
// ============================================================================

/// Options that travel as upper-case string ids ("SUM", "COMPACT", ...).
pub trait OptionId: Sized + Copy + Default + 'static {
    const ALL: &'static [Self];

    fn id(&self) -> &'static str;

    /// Case-insensitive lookup by id.
    fn from_id(id: &str) -> Option<Self> {
        Self::ALL
            .iter()
            .copied()
            .find(|option| option.id().eq_ignore_ascii_case(id))
    }
}

/// Aggregation applied by the analytics server.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "UPPERCASE")]
pub enum AggregationType {
    #[default]
    Default,
    Count,
    Sum,
    Average,
    StdDev,
    Variance,
    Min,
    Max,
}

impl OptionId for AggregationType {
    const ALL: &'static [Self] = &[
        AggregationType::Default,
        AggregationType::Count,
        AggregationType::Sum,
        AggregationType::Average,
        AggregationType::StdDev,
        AggregationType::Variance,
        AggregationType::Min,
        AggregationType::Max,
    ];

    fn id(&self) -> &'static str {
        match self {
            AggregationType::Default => "DEFAULT",
            AggregationType::Count => "COUNT",
            AggregationType::Sum => "SUM",
            AggregationType::Average => "AVERAGE",
            AggregationType::StdDev => "STDDEV",
            AggregationType::Variance => "VARIANCE",
            AggregationType::Min => "MIN",
            AggregationType::Max => "MAX",
        }
    }
}

/// Cell padding of the rendered table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "UPPERCASE")]
pub enum DisplayDensity {
    Comfortable,
    #[default]
    Normal,
    Compact,
}

impl OptionId for DisplayDensity {
    const ALL: &'static [Self] = &[
        DisplayDensity::Comfortable,
        DisplayDensity::Normal,
        DisplayDensity::Compact,
    ];

    fn id(&self) -> &'static str {
        match self {
            DisplayDensity::Comfortable => "COMFORTABLE",
            DisplayDensity::Normal => "NORMAL",
            DisplayDensity::Compact => "COMPACT",
        }
    }
}

/// Font size of the rendered table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "UPPERCASE")]
pub enum FontSize {
    Large,
    #[default]
    Normal,
    Small,
}

impl OptionId for FontSize {
    const ALL: &'static [Self] = &[FontSize::Large, FontSize::Normal, FontSize::Small];

    fn id(&self) -> &'static str {
        match self {
            FontSize::Large => "LARGE",
            FontSize::Normal => "NORMAL",
            FontSize::Small => "SMALL",
        }
    }
}

/// Separator placed between groups of three digits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "UPPERCASE")]
pub enum DigitGroupSeparator {
    None,
    #[default]
    Space,
    Comma,
}

impl DigitGroupSeparator {
    pub fn symbol(&self) -> &'static str {
        match self {
            DigitGroupSeparator::None => "",
            DigitGroupSeparator::Space => " ",
            DigitGroupSeparator::Comma => ",",
        }
    }
}

impl OptionId for DigitGroupSeparator {
    const ALL: &'static [Self] = &[
        DigitGroupSeparator::None,
        DigitGroupSeparator::Space,
        DigitGroupSeparator::Comma,
    ];

    fn id(&self) -> &'static str {
        match self {
            DigitGroupSeparator::None => "NONE",
            DigitGroupSeparator::Space => "SPACE",
            DigitGroupSeparator::Comma => "COMMA",
        }
    }
}

// ============================================================================
// SORTING
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum SortDirection {
    Asc,
    Desc,
}

impl SortDirection {
    pub fn toggled(self) -> Self {
        match self {
            SortDirection::Asc => SortDirection::Desc,
            SortDirection::Desc => SortDirection::Asc,
        }
    }

    /// "DESC" (any case) is descending, every other string ascending.
    pub fn from_id(id: &str) -> Self {
        if id.eq_ignore_ascii_case("DESC") {
            SortDirection::Desc
        } else {
            SortDirection::Asc
        }
    }
}

/// What a sort refers to: a column composite id / the total id, or a
/// 1-based column position where 0 means the total column.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SortId {
    Position(u64),
    Key(String),
}

impl SortId {
    fn from_value(value: &Value) -> Option<SortId> {
        match value {
            Value::String(s) => Some(SortId::Key(s.clone())),
            Value::Number(n) => n.as_u64().map(SortId::Position),
            _ => None,
        }
    }
}

impl From<&str> for SortId {
    fn from(key: &str) -> Self {
        SortId::Key(key.to_string())
    }
}

impl From<u64> for SortId {
    fn from(position: u64) -> Self {
        SortId::Position(position)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Sorting {
    pub id: SortId,
    pub direction: SortDirection,
}

impl Sorting {
    fn from_value(value: &Value) -> Option<Sorting> {
        let obj = value.as_object()?;
        let id = SortId::from_value(obj.get("id")?)?;
        let direction = obj.get("direction").and_then(Value::as_str)?;
        Some(Sorting {
            id,
            direction: SortDirection::from_id(direction),
        })
    }
}

// ============================================================================
// REFERENCED OBJECTS
// ============================================================================

/// A reference to a server object by id (approval level, program).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdRef {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

impl IdRef {
    pub fn new(id: impl Into<String>) -> Self {
        IdRef {
            id: id.into(),
            name: None,
        }
    }

    fn from_value(value: &Value) -> Option<IdRef> {
        let id = value.as_object()?.get("id")?.as_str()?;
        Some(IdRef {
            id: id.to_string(),
            name: value.get("name").and_then(Value::as_str).map(str::to_string),
        })
    }
}

/// One colored value range of a legend set. Both bounds are inclusive.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Legend {
    pub start_value: f64,
    pub end_value: f64,
    pub color: String,
}

impl Legend {
    fn from_value(value: &Value) -> Option<Legend> {
        Some(Legend {
            start_value: number_from(value.get("startValue")?)?,
            end_value: number_from(value.get("endValue")?)?,
            color: value.get("color")?.as_str()?.to_string(),
        })
    }

    pub fn contains(&self, value: f64) -> bool {
        value >= self.start_value && value <= self.end_value
    }
}

/// Colors data cells by value range.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LegendSet {
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub legends: Vec<Legend>,
}

impl LegendSet {
    fn from_value(value: &Value) -> Option<LegendSet> {
        let record = Record::from_value(value)?;
        let legends = array_from(value.get("legends"))
            .into_iter()
            .filter_map(Legend::from_value)
            .collect();

        Some(LegendSet {
            id: record.id,
            name: record.name,
            legends,
        })
    }

    /// Color for a value. When ranges overlap, the last matching legend wins.
    pub fn color_for(&self, value: f64) -> Option<&str> {
        self.legends
            .iter()
            .rev()
            .find(|legend| legend.contains(value))
            .map(|legend| legend.color.as_str())
    }
}

// ============================================================================
// LAYOUT PATCH
// ============================================================================

/// Leniently parsed layout options. Every field is None when the source
/// did not carry a usable value. Used for the base config and for the
/// forced overlay applied after parsing.
#[derive(Debug, Clone, Default)]
pub struct LayoutPatch {
    pub columns: Option<Axis>,
    pub rows: Option<Axis>,
    pub filters: Option<Axis>,
    pub show_col_totals: Option<bool>,
    pub show_row_totals: Option<bool>,
    pub show_col_sub_totals: Option<bool>,
    pub show_row_sub_totals: Option<bool>,
    pub show_dimension_labels: Option<bool>,
    pub hide_empty_rows: Option<bool>,
    pub skip_rounding: Option<bool>,
    pub show_hierarchy: Option<bool>,
    pub completed_only: Option<bool>,
    pub aggregation_type: Option<AggregationType>,
    pub data_approval_level: Option<IdRef>,
    pub display_density: Option<DisplayDensity>,
    pub font_size: Option<FontSize>,
    pub digit_group_separator: Option<DigitGroupSeparator>,
    pub legend_set: Option<LegendSet>,
    pub parent_graph_map: Option<BTreeMap<String, String>>,
    pub program: Option<IdRef>,
    pub reporting_period: Option<bool>,
    pub organisation_unit: Option<bool>,
    pub parent_organisation_unit: Option<bool>,
    pub regression: Option<bool>,
    pub cumulative: Option<bool>,
    pub sort_order: Option<i64>,
    pub top_limit: Option<i64>,
    pub id: Option<String>,
    pub name: Option<String>,
    pub sorting: Option<Sorting>,
    pub display_property: Option<String>,
    pub user_org_unit: Option<Vec<String>>,
    pub relative_period_date: Option<NaiveDate>,
}

impl LayoutPatch {
    /// Reads every known option from a JSON object.
    /// Legacy favorite names (`colTotals`, ...) win over the `show*` names,
    /// and nested `reportParams` win over the flat report flags.
    pub fn from_map(config: &Map<String, Value>) -> Self {
        let flag = |key: &str| config.get(key).and_then(Value::as_bool);
        let params = config.get("reportParams").and_then(Value::as_object);
        let param_flag = |key: &str| params.and_then(|p| p.get(key)).and_then(Value::as_bool);

        LayoutPatch {
            columns: config.get("columns").and_then(|v| Axis::from_value(Some(v))),
            rows: config.get("rows").and_then(|v| Axis::from_value(Some(v))),
            filters: config.get("filters").and_then(|v| Axis::from_value(Some(v))),
            show_col_totals: flag("colTotals").or_else(|| flag("showColTotals")),
            show_row_totals: flag("rowTotals").or_else(|| flag("showRowTotals")),
            show_col_sub_totals: flag("colSubTotals").or_else(|| flag("showColSubTotals")),
            show_row_sub_totals: flag("rowSubTotals").or_else(|| flag("showRowSubTotals")),
            show_dimension_labels: flag("showDimensionLabels"),
            hide_empty_rows: flag("hideEmptyRows"),
            skip_rounding: flag("skipRounding"),
            show_hierarchy: flag("showHierarchy"),
            completed_only: flag("completedOnly"),
            aggregation_type: option_from(config, "aggregationType"),
            data_approval_level: config.get("dataApprovalLevel").and_then(IdRef::from_value),
            display_density: option_from(config, "displayDensity"),
            font_size: option_from(config, "fontSize"),
            digit_group_separator: option_from(config, "digitGroupSeparator"),
            legend_set: config.get("legendSet").and_then(LegendSet::from_value),
            parent_graph_map: config.get("parentGraphMap").and_then(string_map_from),
            program: config.get("program").and_then(IdRef::from_value),
            reporting_period: param_flag("paramReportingPeriod").or_else(|| flag("reportingPeriod")),
            organisation_unit: param_flag("paramOrganisationUnit")
                .or_else(|| flag("organisationUnit")),
            parent_organisation_unit: param_flag("paramParentOrganisationUnit")
                .or_else(|| flag("parentOrganisationUnit")),
            regression: flag("regression"),
            cumulative: flag("cumulative"),
            sort_order: config.get("sortOrder").and_then(integer_from),
            top_limit: config.get("topLimit").and_then(integer_from),
            id: string_from(config, "id"),
            name: string_from(config, "name"),
            sorting: config.get("sorting").and_then(Sorting::from_value),
            display_property: string_from(config, "displayProperty"),
            user_org_unit: config.get("userOrgUnit").and_then(|v| {
                let ids: Vec<String> = array_from(Some(v))
                    .into_iter()
                    .filter_map(Value::as_str)
                    .map(str::to_string)
                    .collect();
                if ids.is_empty() {
                    None
                } else {
                    Some(ids)
                }
            }),
            relative_period_date: config.get("relativePeriodDate").and_then(date_from),
        }
    }
}

// ============================================================================
// MAIN LAYOUT STRUCT
// ============================================================================

/// The complete, validated description of a pivot table report.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Layout {
    pub columns: Option<Axis>,
    pub rows: Option<Axis>,
    pub filters: Option<Axis>,

    pub show_col_totals: bool,
    pub show_row_totals: bool,
    pub show_col_sub_totals: bool,
    pub show_row_sub_totals: bool,
    pub show_dimension_labels: bool,
    pub hide_empty_rows: bool,
    pub skip_rounding: bool,
    pub show_hierarchy: bool,
    pub completed_only: bool,

    pub aggregation_type: AggregationType,
    pub data_approval_level: Option<IdRef>,
    pub display_density: DisplayDensity,
    pub font_size: FontSize,
    pub digit_group_separator: DigitGroupSeparator,
    pub legend_set: Option<LegendSet>,
    pub parent_graph_map: Option<BTreeMap<String, String>>,
    pub program: Option<IdRef>,

    // Report table parameters
    pub reporting_period: bool,
    pub organisation_unit: bool,
    pub parent_organisation_unit: bool,

    pub regression: bool,
    pub cumulative: bool,
    pub sort_order: i64,
    pub top_limit: i64,

    pub id: Option<String>,
    pub name: Option<String>,
    pub sorting: Option<Sorting>,
    pub display_property: Option<String>,
    pub user_org_unit: Vec<String>,
    pub relative_period_date: Option<NaiveDate>,
}

impl Default for Layout {
    fn default() -> Self {
        Layout {
            columns: None,
            rows: None,
            filters: None,
            show_col_totals: true,
            show_row_totals: true,
            show_col_sub_totals: true,
            show_row_sub_totals: true,
            show_dimension_labels: true,
            hide_empty_rows: false,
            skip_rounding: false,
            show_hierarchy: false,
            completed_only: false,
            aggregation_type: AggregationType::Default,
            data_approval_level: None,
            display_density: DisplayDensity::Normal,
            font_size: FontSize::Normal,
            digit_group_separator: DigitGroupSeparator::Space,
            legend_set: None,
            parent_graph_map: None,
            program: None,
            reporting_period: false,
            organisation_unit: false,
            parent_organisation_unit: false,
            regression: false,
            cumulative: false,
            sort_order: 0,
            top_limit: 0,
            id: None,
            name: None,
            sorting: None,
            display_property: None,
            user_org_unit: Vec::new(),
            relative_period_date: None,
        }
    }
}

/// Builds and validates a layout.
///
/// `apply_config` is shallow-merged over `config` before parsing;
/// `force_config` is applied after parsing and wins over everything.
pub fn build_layout(
    config: &Value,
    apply_config: Option<&Value>,
    force_config: Option<&Value>,
) -> Result<Layout, LayoutError> {
    let mut merged = config.as_object().cloned().ok_or(LayoutError::NotAnObject)?;

    if let Some(apply) = apply_config {
        match apply.as_object() {
            Some(overlay) => {
                for (key, value) in overlay {
                    merged.insert(key.clone(), value.clone());
                }
            }
            None => log_debug!("LAYOUT", "ignoring non-object apply config"),
        }
    }

    let mut layout = Layout::from_patch(LayoutPatch::from_map(&merged));

    if let Some(force) = force_config {
        match force.as_object() {
            Some(overlay) => layout.apply_patch(LayoutPatch::from_map(overlay)),
            None => log_debug!("LAYOUT", "ignoring non-object force config"),
        }
    }

    layout.validate()?;
    Ok(layout)
}

impl Layout {
    /// Parses and validates a layout from JSON text.
    pub fn from_json(json: &str) -> Result<Layout, LayoutError> {
        let value: Value = serde_json::from_str(json)?;
        build_layout(&value, None, None)
    }

    /// Fills every absent option with its default.
    pub fn from_patch(patch: LayoutPatch) -> Layout {
        let mut layout = Layout::default();
        layout.apply_patch(patch);
        layout
    }

    /// Overwrites every option the patch carries.
    pub fn apply_patch(&mut self, patch: LayoutPatch) {
        fn set<T>(target: &mut T, value: Option<T>) {
            if let Some(v) = value {
                *target = v;
            }
        }

        if patch.columns.is_some() {
            self.columns = patch.columns;
        }
        if patch.rows.is_some() {
            self.rows = patch.rows;
        }
        if patch.filters.is_some() {
            self.filters = patch.filters;
        }

        set(&mut self.show_col_totals, patch.show_col_totals);
        set(&mut self.show_row_totals, patch.show_row_totals);
        set(&mut self.show_col_sub_totals, patch.show_col_sub_totals);
        set(&mut self.show_row_sub_totals, patch.show_row_sub_totals);
        set(&mut self.show_dimension_labels, patch.show_dimension_labels);
        set(&mut self.hide_empty_rows, patch.hide_empty_rows);
        set(&mut self.skip_rounding, patch.skip_rounding);
        set(&mut self.show_hierarchy, patch.show_hierarchy);
        set(&mut self.completed_only, patch.completed_only);
        set(&mut self.aggregation_type, patch.aggregation_type);
        set(&mut self.display_density, patch.display_density);
        set(&mut self.font_size, patch.font_size);
        set(&mut self.digit_group_separator, patch.digit_group_separator);
        set(&mut self.reporting_period, patch.reporting_period);
        set(&mut self.organisation_unit, patch.organisation_unit);
        set(&mut self.parent_organisation_unit, patch.parent_organisation_unit);
        set(&mut self.regression, patch.regression);
        set(&mut self.cumulative, patch.cumulative);
        set(&mut self.sort_order, patch.sort_order);
        set(&mut self.top_limit, patch.top_limit);
        set(&mut self.user_org_unit, patch.user_org_unit);

        if patch.data_approval_level.is_some() {
            self.data_approval_level = patch.data_approval_level;
        }
        if patch.legend_set.is_some() {
            self.legend_set = patch.legend_set;
        }
        if patch.parent_graph_map.is_some() {
            self.parent_graph_map = patch.parent_graph_map;
        }
        if patch.program.is_some() {
            self.program = patch.program;
        }
        if patch.id.is_some() {
            self.id = patch.id;
        }
        if patch.name.is_some() {
            self.name = patch.name;
        }
        if patch.sorting.is_some() {
            self.sorting = patch.sorting;
        }
        if patch.display_property.is_some() {
            self.display_property = patch.display_property;
        }
        if patch.relative_period_date.is_some() {
            self.relative_period_date = patch.relative_period_date;
        }
    }

    /// Checks the layout can produce a table.
    pub fn validate(&self) -> Result<(), LayoutError> {
        if self.columns.is_none() && self.rows.is_none() {
            log_warn!("LAYOUT", "{}", LayoutError::MissingRowOrColumn);
            return Err(LayoutError::MissingRowOrColumn);
        }

        if !self.has_dimension(PERIOD_DIMENSION, true) {
            log_warn!("LAYOUT", "{}", LayoutError::MissingPeriod);
            return Err(LayoutError::MissingPeriod);
        }

        Ok(())
    }

    /// Columns, rows and optionally filters, skipping absent axes.
    pub fn axes(&self, include_filter: bool) -> Vec<&Axis> {
        let mut axes: Vec<&Axis> = Vec::with_capacity(3);
        axes.extend(self.columns.as_ref());
        axes.extend(self.rows.as_ref());
        if include_filter {
            axes.extend(self.filters.as_ref());
        }
        axes
    }

    pub fn has_dimension(&self, dimension_name: &str, include_filter: bool) -> bool {
        self.axes(include_filter)
            .iter()
            .any(|axis| axis.has(dimension_name))
    }

    /// All dimensions in axis order, optionally sorted by name.
    pub fn dimensions(&self, include_filter: bool, sorted: bool) -> Vec<&Dimension> {
        let mut dimensions: Vec<&Dimension> = self
            .axes(include_filter)
            .into_iter()
            .flat_map(|axis| axis.dimensions().iter())
            .collect();

        if sorted {
            dimensions.sort_by(|a, b| a.dimension.cmp(&b.dimension));
        }
        dimensions
    }

    pub fn dimension_names(&self, include_filter: bool, sorted: bool) -> Vec<String> {
        self.dimensions(include_filter, sorted)
            .into_iter()
            .map(|d| d.dimension.clone())
            .collect()
    }

    /// Finds a dimension on any axis, filters included.
    pub fn dimension(&self, dimension_name: &str) -> Option<&Dimension> {
        self.axes(true)
            .into_iter()
            .find_map(|axis| axis.dimension(dimension_name))
    }

    /// Sets or toggles the sort after a header click, then re-validates.
    /// A new id starts descending; clicking the same id again flips the direction.
    pub fn toggle_sort(&mut self, id: impl Into<SortId>) -> Result<(), LayoutError> {
        let id = id.into();
        let direction = match &self.sorting {
            Some(current) if current.id == id => current.direction.toggled(),
            _ => SortDirection::Desc,
        };

        log_debug!("SORT", "sorting on {:?} {:?}", id, direction);
        self.sorting = Some(Sorting { id, direction });
        self.validate()
    }

    /// The persisted favorite resource for this layout.
    pub fn to_favorite(&self) -> Value {
        let axis_json = |axis: &Option<Axis>| -> Value {
            match axis {
                Some(axis) => json!(axis.dimensions()),
                None => json!([]),
            }
        };

        let mut favorite = json!({
            "columns": axis_json(&self.columns),
            "rows": axis_json(&self.rows),
            "filters": axis_json(&self.filters),
            "colTotals": self.show_col_totals,
            "rowTotals": self.show_row_totals,
            "colSubTotals": self.show_col_sub_totals,
            "rowSubTotals": self.show_row_sub_totals,
            "showDimensionLabels": self.show_dimension_labels,
            "hideEmptyRows": self.hide_empty_rows,
            "skipRounding": self.skip_rounding,
            "showHierarchy": self.show_hierarchy,
            "completedOnly": self.completed_only,
            "aggregationType": self.aggregation_type.id(),
            "displayDensity": self.display_density.id(),
            "fontSize": self.font_size.id(),
            "digitGroupSeparator": self.digit_group_separator.id(),
            "reportParams": {
                "paramReportingPeriod": self.reporting_period,
                "paramOrganisationUnit": self.organisation_unit,
                "paramParentOrganisationUnit": self.parent_organisation_unit,
            },
            "regression": self.regression,
            "cumulative": self.cumulative,
            "sortOrder": self.sort_order,
            "topLimit": self.top_limit,
        });

        if let Some(obj) = favorite.as_object_mut() {
            if let Some(level) = &self.data_approval_level {
                obj.insert("dataApprovalLevel".into(), json!(level));
            }
            if let Some(legend_set) = &self.legend_set {
                obj.insert("legendSet".into(), json!({ "id": legend_set.id }));
            }
            if let Some(map) = &self.parent_graph_map {
                obj.insert("parentGraphMap".into(), json!(map));
            }
            if let Some(program) = &self.program {
                obj.insert("program".into(), json!(program));
            }
            if let Some(id) = &self.id {
                obj.insert("id".into(), json!(id));
            }
            if let Some(name) = &self.name {
                obj.insert("name".into(), json!(name));
            }
            if let Some(sorting) = &self.sorting {
                obj.insert("sorting".into(), json!(sorting));
            }
            if let Some(display_property) = &self.display_property {
                obj.insert("displayProperty".into(), json!(display_property));
            }
            if !self.user_org_unit.is_empty() {
                obj.insert("userOrgUnit".into(), json!(self.user_org_unit));
            }
            if let Some(date) = &self.relative_period_date {
                obj.insert(
                    "relativePeriodDate".into(),
                    json!(date.format("%Y-%m-%d").to_string()),
                );
            }
        }

        favorite
    }
}

// ============================================================================
// LENIENT JSON HELPERS
// ============================================================================

/// Wraps a single value into a one-element list; absent/null is empty.
fn array_from(value: Option<&Value>) -> Vec<&Value> {
    match value {
        None | Some(Value::Null) => Vec::new(),
        Some(Value::Array(items)) => items.iter().collect(),
        Some(other) => vec![other],
    }
}

fn string_from(config: &Map<String, Value>, key: &str) -> Option<String> {
    config.get(key).and_then(Value::as_str).map(str::to_string)
}

fn number_from(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => crate::number_format::parse_numeric(s),
        _ => None,
    }
}

fn integer_from(value: &Value) -> Option<i64> {
    value
        .as_i64()
        .or_else(|| value.as_f64().map(|f| f.trunc() as i64))
}

fn option_from<T: OptionId>(config: &Map<String, Value>, key: &str) -> Option<T> {
    let id = config.get(key)?.as_str()?;
    if id.is_empty() {
        return None;
    }

    match T::from_id(id) {
        Some(option) => Some(option),
        None => {
            log_warn!("LAYOUT", "unknown {} '{}', using default", key, id);
            Some(T::default())
        }
    }
}

fn string_map_from(value: &Value) -> Option<BTreeMap<String, String>> {
    let obj = value.as_object()?;
    Some(
        obj.iter()
            .filter_map(|(k, v)| v.as_str().map(|s| (k.clone(), s.to_string())))
            .collect(),
    )
}

/// Accepts "YYYY-MM-DD", optionally followed by a time part.
fn date_from(value: &Value) -> Option<NaiveDate> {
    let text = value.as_str()?;
    NaiveDate::parse_from_str(text, "%Y-%m-%d")
        .ok()
        .or_else(|| text.get(..10).and_then(|d| NaiveDate::parse_from_str(d, "%Y-%m-%d").ok()))
}

/// Removes duplicates, keeping first occurrences in order.
pub(crate) fn unique(ids: Vec<String>) -> Vec<String> {
    let mut seen = rustc_hash::FxHashSet::default();
    ids.into_iter().filter(|id| seen.insert(id.clone())).collect()
}
