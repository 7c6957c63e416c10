//! FILENAME: core/pivot-table/src/view.rs
//! Pivot View - Render-agnostic output of the table builder.
//!
//! This module holds the 2D grid of cells a presentation layer consumes.
//! Each cell carries:
//! - Its type (dimension header, value, subtotal, total, ...)
//! - Span counts for merged cells
//! - Raw numeric value and pre-formatted display text
//! - Collapsed/hidden flags and a style class
//!
//! `TableView::to_html` renders the grid as an HTML table.

use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};
use smallvec::SmallVec;
use uuid::Uuid;

use crate::definition::{DisplayDensity, FontSize, Layout, OptionId};

/// Header uuids linked to a value cell (column chain, then row chain).
pub type LinkedUuids = SmallVec<[Uuid; 8]>;

// ============================================================================
// CELL TYPES AND STYLES
// ============================================================================

/// The type of a cell in the table grid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum CellType {
    /// Dimension item header or label.
    Dimension,
    /// Data cell.
    Value,
    /// "Total" column header.
    DimensionTotal,
    /// Row or column total.
    ValueTotal,
    /// Subtotal header (column) or subtotal row label.
    DimensionSubtotal,
    /// Subtotal of data cells.
    ValueSubtotal,
    /// Subtotal row crossing a subtotal column.
    ValueSubtotalTotal,
    /// Total column crossing a subtotal row, or total row crossing a subtotal column.
    ValueTotalSubgrandtotal,
    /// Sum of all data cells.
    ValueGrandTotal,
    /// Spacer row used when there is no row axis.
    Transparent,
}

impl CellType {
    /// Cells holding a number (data, subtotals, totals).
    pub fn is_numeric(&self) -> bool {
        matches!(
            self,
            CellType::Value
                | CellType::ValueTotal
                | CellType::ValueSubtotal
                | CellType::ValueSubtotalTotal
                | CellType::ValueTotalSubgrandtotal
                | CellType::ValueGrandTotal
        )
    }
}

/// Main style class of a cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum StyleClass {
    Dim,
    DimLabel,
    Empty,
    DimSubtotal,
    DimTotal,
    Value,
    ValueTotal,
    ValueSubtotal,
    ValueSubtotalTotal,
    ValueTotalSubgrandtotal,
    ValueGrandTotal,
    TransparentRow,
}

impl StyleClass {
    pub fn css_class(&self) -> &'static str {
        match self {
            StyleClass::Dim => "pivot-dim",
            StyleClass::DimLabel => "pivot-dim-label",
            StyleClass::Empty => "pivot-empty",
            StyleClass::DimSubtotal => "pivot-dim-subtotal",
            StyleClass::DimTotal => "pivot-dim-total",
            StyleClass::Value => "pivot-value",
            StyleClass::ValueTotal => "pivot-value-total",
            StyleClass::ValueSubtotal => "pivot-value-subtotal",
            StyleClass::ValueSubtotalTotal => "pivot-value-subtotal-total",
            StyleClass::ValueTotalSubgrandtotal => "pivot-value-total-subgrandtotal",
            StyleClass::ValueGrandTotal => "pivot-value-grandtotal",
            StyleClass::TransparentRow => "pivot-transparent-row",
        }
    }
}

// ============================================================================
// TABLE CELL
// ============================================================================

/// A single cell in the table grid.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TableCell {
    pub cell_type: CellType,
    pub style: StyleClass,

    /// Element id; set for header cells, data cells and the total header.
    pub uuid: Option<Uuid>,

    /// Dimension item id of header cells.
    pub id: Option<String>,

    /// Numeric value of data and total cells. Missing data counts as 0 here;
    /// `empty` tells "no data" apart from a real zero.
    pub value: Option<f64>,

    /// Pre-formatted display string.
    pub formatted_value: String,

    /// 0 means no span attribute.
    pub col_span: usize,
    pub row_span: usize,

    pub empty: bool,
    pub collapsed: bool,
    pub hidden: bool,

    pub no_break: bool,
    pub align_left: bool,

    /// Legend color of the value.
    pub color: Option<String>,

    /// Registered as a sortable header under this id.
    pub sort_id: Option<String>,

    /// Header uuids a data cell belongs to.
    #[serde(skip_serializing_if = "SmallVec::is_empty")]
    pub uuids: LinkedUuids,
}

impl TableCell {
    fn new(cell_type: CellType, style: StyleClass, text: String) -> Self {
        TableCell {
            cell_type,
            style,
            uuid: None,
            id: None,
            value: None,
            formatted_value: text,
            col_span: 0,
            row_span: 0,
            empty: false,
            collapsed: false,
            hidden: false,
            no_break: false,
            align_left: false,
            color: None,
            sort_id: None,
            uuids: LinkedUuids::new(),
        }
    }

    /// Creates a dimension item header cell.
    pub fn dimension(id: impl Into<String>, label: String, uuid: Uuid) -> Self {
        let mut cell = TableCell::new(CellType::Dimension, StyleClass::Dim, label);
        cell.id = Some(id.into());
        cell.uuid = Some(uuid);
        cell
    }

    /// Creates a dimension name label cell.
    pub fn label(text: impl Into<String>) -> Self {
        let mut cell = TableCell::new(CellType::Dimension, StyleClass::DimLabel, text.into());
        cell.col_span = 1;
        cell.row_span = 1;
        cell
    }

    /// Creates the blank corner cell.
    pub fn corner(col_span: usize, row_span: usize) -> Self {
        let mut cell = TableCell::new(CellType::Dimension, StyleClass::Empty, String::new());
        cell.col_span = col_span;
        cell.row_span = row_span;
        cell
    }

    /// Creates a data cell.
    pub fn value(uuid: Uuid, value: f64, text: String, empty: bool) -> Self {
        let mut cell = TableCell::new(CellType::Value, StyleClass::Value, text);
        cell.uuid = Some(uuid);
        cell.value = Some(value);
        cell.empty = empty;
        cell
    }

    /// Creates a computed subtotal/total cell.
    pub fn aggregate(cell_type: CellType, value: f64, text: String, empty: bool) -> Self {
        let style = match cell_type {
            CellType::ValueSubtotal => StyleClass::ValueSubtotal,
            CellType::ValueSubtotalTotal => StyleClass::ValueSubtotalTotal,
            CellType::ValueTotalSubgrandtotal => StyleClass::ValueTotalSubgrandtotal,
            CellType::ValueGrandTotal => StyleClass::ValueGrandTotal,
            _ => StyleClass::ValueTotal,
        };

        let mut cell = TableCell::new(cell_type, style, text);
        cell.value = Some(value);
        cell.empty = empty;
        cell
    }

    /// Creates a subtotal header or subtotal row label cell.
    pub fn dimension_subtotal() -> Self {
        TableCell::new(CellType::DimensionSubtotal, StyleClass::DimSubtotal, String::new())
    }

    /// Creates a "Total" label cell (column header or totals row label).
    pub fn dimension_total(cell_type: CellType, label: impl Into<String>) -> Self {
        TableCell::new(cell_type, StyleClass::DimTotal, label.into())
    }

    /// Creates the spacer cell of a table without row dimensions.
    pub fn transparent() -> Self {
        TableCell::new(CellType::Transparent, StyleClass::TransparentRow, String::new())
    }

    pub fn with_col_span(mut self, span: usize) -> Self {
        self.col_span = span;
        self
    }

    pub fn with_row_span(mut self, span: usize) -> Self {
        self.row_span = span;
        self
    }

    pub fn with_uuid(mut self, uuid: Uuid) -> Self {
        self.uuid = Some(uuid);
        self
    }

    pub fn with_hidden(mut self, hidden: bool) -> Self {
        self.hidden = hidden;
        self
    }

    pub fn with_collapsed(mut self, collapsed: bool) -> Self {
        self.collapsed = collapsed;
        self
    }

    /// Rendered cells are neither hidden (merged) nor collapsed.
    pub fn is_rendered(&self) -> bool {
        !self.hidden && !self.collapsed
    }

    /// Full class attribute of the cell.
    pub fn css_classes(&self) -> String {
        let mut classes = vec![self.style.css_class()];

        if self.no_break {
            classes.push("td-nobreak");
        }
        if self.align_left {
            classes.push("align-left");
        }
        if self.hidden {
            classes.push("td-hidden");
        }
        if self.collapsed {
            classes.push("td-collapsed");
        }
        if self.cell_type == CellType::Value && !self.empty {
            classes.push("pointer");
        }
        if self.cell_type == CellType::DimensionSubtotal
            || (self.cell_type.is_numeric() && self.empty)
        {
            classes.push("cursor-default");
        }
        if self.sort_id.is_some() {
            classes.push("td-sortable");
        }

        classes.join(" ")
    }

    /// Renders the cell as a `<td>`; hidden and collapsed cells render nothing.
    pub fn to_html(&self) -> String {
        if !self.is_rendered() {
            return String::new();
        }

        let mut html = String::from("<td");
        if let Some(uuid) = &self.uuid {
            html.push_str(&format!(" id=\"{}\"", uuid));
        }
        html.push_str(&format!(" class=\"{}\"", self.css_classes()));
        if self.col_span > 0 {
            html.push_str(&format!(" colspan=\"{}\"", self.col_span));
        }
        if self.row_span > 0 {
            html.push_str(&format!(" rowspan=\"{}\"", self.row_span));
        }
        if let Some(color) = &self.color {
            html.push_str(&format!(" style=\"color:{};\"", escape_html(color)));
        }
        html.push('>');

        if self.formatted_value.is_empty() {
            html.push_str("&nbsp;");
        } else {
            html.push_str(&escape_html(&self.formatted_value));
        }

        html.push_str("</td>");
        html
    }
}

fn escape_html(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            _ => escaped.push(c),
        }
    }
    escaped
}

// ============================================================================
// MAIN VIEW STRUCT
// ============================================================================

/// A header cell the caller can click to sort by.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SortableHeader {
    pub id: String,
    pub uuid: Uuid,
}

/// The complete table grid: column header rows, then data and subtotal
/// rows, then the totals row.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TableView {
    /// Indexed as rows[row][col]. Hidden and collapsed cells stay in place.
    pub rows: Vec<Vec<TableCell>>,

    /// Number of leading column header rows.
    pub header_row_count: usize,

    /// Class attribute of the rendered table.
    pub class_name: String,

    /// Data cell uuid -> linked header uuids.
    pub uuid_dim_uuids_map: FxHashMap<Uuid, LinkedUuids>,

    /// Sortable headers in rendering order.
    pub sortable: Vec<SortableHeader>,

    /// Number of rendered cells.
    pub td_count: usize,
}

impl TableView {
    pub fn new(layout: &Layout) -> Self {
        TableView {
            rows: Vec::new(),
            header_row_count: 0,
            class_name: table_class(layout.display_density, layout.font_size),
            uuid_dim_uuids_map: FxHashMap::default(),
            sortable: Vec::new(),
            td_count: 0,
        }
    }

    /// Appends a row and updates the rendered cell count and sort registry.
    pub fn push_row(&mut self, cells: Vec<TableCell>) {
        for cell in cells.iter().filter(|c| c.is_rendered()) {
            self.td_count += 1;
            if let (Some(id), Some(uuid)) = (&cell.sort_id, cell.uuid) {
                self.sortable.push(SortableHeader { id: id.clone(), uuid });
            }
        }
        self.rows.push(cells);
    }

    /// Rows with at least one rendered cell.
    pub fn visible_rows(&self) -> impl Iterator<Item = &Vec<TableCell>> {
        self.rows
            .iter()
            .filter(|row| row.iter().any(TableCell::is_rendered))
    }

    /// Renders the grid as an HTML table.
    pub fn to_html(&self) -> String {
        let mut html = format!("<table class=\"{}\">", self.class_name);

        for row in self.visible_rows() {
            html.push_str("<tr>");
            for cell in row {
                html.push_str(&cell.to_html());
            }
            html.push_str("</tr>");
        }

        html.push_str("</table>");
        html
    }
}

/// "pivot" plus density and font size classes when they differ from normal.
pub fn table_class(density: DisplayDensity, font_size: FontSize) -> String {
    let mut class_name = String::from("pivot");

    if density != DisplayDensity::Normal {
        class_name.push_str(" displaydensity-");
        class_name.push_str(&density.id().to_lowercase());
    }
    if font_size != FontSize::Normal {
        class_name.push_str(" fontsize-");
        class_name.push_str(&font_size.id().to_lowercase());
    }

    class_name
}
