//! FILENAME: core/pivot-table/src/table.rs
//! Table - Assembles the cell grid from a layout, a response and its axes.
//!
//! Assembly order:
//! 1. Data cells for every row leaf x column leaf, looked up in the value index
//! 2. Row totals
//! 3. Empty row collapsing (hideEmptyRows), shrinking the row axis doors
//! 4. Column header rows, with dimension labels or the corner cell
//! 5. Data rows: row headers, data cells with column subtotals, row total
//! 6. Subtotal rows after every top-floor run of the row axis
//! 7. Totals row with sub-grand-totals and the grand total

use serde::Serialize;
use uuid::Uuid;

use crate::axis::{AxisType, TableAxis};
use crate::config::EngineConfig;
use crate::definition::Layout;
use crate::error::PivotError;
use crate::number_format::{pretty_print, response_number, rounded_display, value_display};
use crate::response::{Response, ValueIndex};
use crate::sort::sorted_row_ids;
use crate::view::{CellType, LinkedUuids, TableCell, TableView};

// ============================================================================
// TABLE RESULT
// ============================================================================

/// A built pivot table: the cell grid, its HTML rendering and the axes it
/// was built from.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Table {
    pub view: TableView,
    pub html: String,
    pub col_axis: Option<TableAxis>,
    pub row_axis: Option<TableAxis>,
}

impl Table {
    /// Builds the grid. A missing axis collapses to a single implicit
    /// position on that side.
    pub fn build(
        layout: &Layout,
        response: &Response,
        index: &ValueIndex,
        col_axis: Option<TableAxis>,
        mut row_axis: Option<TableAxis>,
        config: &EngineConfig,
    ) -> Table {
        let mut grid = value_grid(layout, index, col_axis.as_ref(), row_axis.as_ref(), config);

        if layout.hide_empty_rows {
            if let (Some(_), Some(row)) = (&col_axis, &mut row_axis) {
                collapse_empty_rows(&mut grid, row);
            }
        }

        let view = TableBuilder::new(layout, response, config, col_axis.as_ref(), row_axis.as_ref())
            .assemble(grid);
        let html = view.to_html();

        Table {
            view,
            html,
            col_axis,
            row_axis,
        }
    }
}

// ============================================================================
// DATA CELLS
// ============================================================================

/// Data cells per row leaf, with the row total cells when they are shown.
struct ValueGrid {
    rows: Vec<Vec<TableCell>>,
    totals: Option<Vec<TableCell>>,
    collapsed: Vec<bool>,
}

fn value_grid(
    layout: &Layout,
    index: &ValueIndex,
    col: Option<&TableAxis>,
    row: Option<&TableAxis>,
    config: &EngineConfig,
) -> ValueGrid {
    let col_size = col.map_or(1, TableAxis::size);
    let row_size = row.map_or(1, TableAxis::size);

    let mut rows = Vec::with_capacity(row_size);

    for r in 0..row_size {
        let mut cells = Vec::with_capacity(col_size);

        for c in 0..col_size {
            let mut ids: Vec<(&str, &str)> = col.map(|axis| axis.leaf_item_ids(c)).unwrap_or_default();
            if let Some(axis) = row {
                ids.extend(axis.leaf_item_ids(r));
            }

            let mut cell = match index.value_for(&ids) {
                Some(raw) => {
                    let value = response_number(raw);
                    let text = pretty_print(&value_display(raw), layout.digit_group_separator);
                    let mut cell = TableCell::value(Uuid::new_v4(), value, text, false);
                    cell.color = layout
                        .legend_set
                        .as_ref()
                        .and_then(|set| set.color_for(value))
                        .map(str::to_string);
                    cell
                }
                None => TableCell::value(Uuid::new_v4(), 0.0, String::new(), true),
            };

            let mut uuids = LinkedUuids::new();
            if let Some(axis) = col {
                uuids.extend(axis.leaf_uuids[c].iter().copied());
            }
            if let Some(axis) = row {
                uuids.extend(axis.leaf_uuids[r].iter().copied());
            }
            cell.uuids = uuids;

            cells.push(cell);
        }

        rows.push(cells);
    }

    let totals = if col.is_some() && layout.show_row_totals {
        Some(
            rows.iter()
                .map(|cells| total_cell(CellType::ValueTotal, cells.iter(), layout, config))
                .collect(),
        )
    } else {
        None
    };

    ValueGrid {
        collapsed: vec![false; rows.len()],
        rows,
        totals,
    }
}

/// Collapses rows without data and reduces the row axis doors above them.
fn collapse_empty_rows(grid: &mut ValueGrid, row_axis: &mut TableAxis) {
    let mut hidden = 0;

    for (position, cells) in grid.rows.iter_mut().enumerate() {
        if !cells.iter().all(|cell| cell.empty) {
            continue;
        }

        for cell in cells.iter_mut() {
            cell.collapsed = true;
        }
        if let Some(totals) = grid.totals.as_mut() {
            totals[position].collapsed = true;
        }

        grid.collapsed[position] = true;
        row_axis.reduce_empty_leaf(position);
        hidden += 1;
    }

    log_debug!("TABLE", "collapsed {} of {} rows without data", hidden, grid.rows.len());
}

/// Sum of the non-empty cells. The result is empty when every cell is
/// empty, and collapsed when every cell is collapsed.
fn total_cell<'c>(
    cell_type: CellType,
    cells: impl Iterator<Item = &'c TableCell>,
    layout: &Layout,
    config: &EngineConfig,
) -> TableCell {
    let mut sum = 0.0;
    let mut empty = true;
    let mut collapsed = true;

    for cell in cells {
        if !cell.empty {
            sum += cell.value.unwrap_or(0.0);
            empty = false;
        }
        collapsed &= cell.collapsed;
    }

    let text = if empty {
        String::new()
    } else {
        pretty_print(
            &rounded_display(sum, config.display_precision),
            layout.digit_group_separator,
        )
    };

    TableCell::aggregate(cell_type, sum, text, empty).with_collapsed(collapsed)
}

// ============================================================================
// GRID ASSEMBLY
// ============================================================================

struct TableBuilder<'a> {
    layout: &'a Layout,
    response: &'a Response,
    config: &'a EngineConfig,
    col: Option<&'a TableAxis>,
    row: Option<&'a TableAxis>,
    col_dims: usize,
    row_dims: usize,

    do_col_totals: bool,
    do_row_totals: bool,
    /// Subtotal rows, needs more than one row dimension.
    do_col_sub_totals: bool,
    /// Subtotal columns, needs more than one column dimension.
    do_row_sub_totals: bool,
    do_sortable: bool,
}

impl<'a> TableBuilder<'a> {
    fn new(
        layout: &'a Layout,
        response: &'a Response,
        config: &'a EngineConfig,
        col: Option<&'a TableAxis>,
        row: Option<&'a TableAxis>,
    ) -> Self {
        let col_dims = col.map_or(0, TableAxis::dims);
        let row_dims = row.map_or(0, TableAxis::dims);

        TableBuilder {
            layout,
            response,
            config,
            col,
            row,
            col_dims,
            row_dims,
            do_col_totals: layout.show_col_totals,
            do_row_totals: layout.show_row_totals,
            do_col_sub_totals: layout.show_col_sub_totals && row_dims > 1,
            do_row_sub_totals: layout.show_row_sub_totals && col_dims > 1,
            do_sortable: row_dims == 1,
        }
    }

    fn assemble(&self, grid: ValueGrid) -> TableView {
        let mut view = TableView::new(self.layout);

        let header_rows = self.col_header_rows();
        view.header_row_count = header_rows.len();
        for cells in header_rows {
            view.push_row(cells);
        }

        let value_rows: Vec<Vec<TableCell>> = grid
            .rows
            .iter()
            .map(|cells| self.with_col_subtotals(cells))
            .collect();

        for (position, values) in value_rows.iter().enumerate() {
            let mut cells = match self.row {
                Some(row) => self.row_header_cells(row, position, &grid.collapsed),
                None if self.layout.show_dimension_labels => vec![TableCell::transparent()],
                None => Vec::new(),
            };

            for cell in values {
                if let (Some(uuid), false) = (cell.uuid, cell.uuids.is_empty()) {
                    view.uuid_dim_uuids_map.insert(uuid, cell.uuids.clone());
                }
            }

            cells.extend(values.iter().cloned());
            if let Some(totals) = &grid.totals {
                cells.push(totals[position].clone());
            }
            view.push_row(cells);

            if let (true, Some(row)) = (self.do_col_sub_totals, self.row) {
                let run = row.span[0].max(1);
                if (position + 1) % run == 0 {
                    let start = position + 1 - run;
                    view.push_row(self.subtotal_row(
                        &value_rows[start..=position],
                        grid.totals.as_ref().map(|t| &t[start..=position]),
                        &grid.collapsed[start..=position],
                    ));
                }
            }
        }

        if self.do_col_totals && self.row.is_some() {
            view.push_row(self.totals_row(&grid.rows));
        }

        log_debug!(
            "TABLE",
            "built table: {} header rows, {} rows, {} cells rendered",
            view.header_row_count,
            view.rows.len(),
            view.td_count
        );

        view
    }

    /// Item label shown in a header: the metadata name, or the id itself
    /// when the response has no name for it.
    fn header_label(&self, id: &str) -> String {
        let name = self.response.item_name(id, self.layout.show_hierarchy, self.config);
        if name.is_empty() {
            id.to_string()
        } else {
            name
        }
    }

    fn dimension_label(&self, dimension_name: &str) -> TableCell {
        TableCell::label(self.response.dimension_label(dimension_name))
    }

    // ------------------------------------------------------------------------
    // Column headers
    // ------------------------------------------------------------------------

    fn col_header_rows(&self) -> Vec<Vec<TableCell>> {
        let labels = self.layout.show_dimension_labels;

        let col = match self.col {
            Some(col) => col,
            None => {
                return match self.row {
                    Some(row) if labels => vec![row
                        .dimension_names
                        .iter()
                        .map(|name| self.dimension_label(name))
                        .collect()],
                    _ => Vec::new(),
                };
            }
        };

        let row_names: &[String] = match self.row {
            Some(row) => &row.dimension_names,
            None => &[],
        };
        let leading = row_names.len().saturating_sub(1);
        let last = col.dims() - 1;

        (0..col.dims())
            .map(|floor| {
                let mut cells = Vec::new();
                let col_label = self.response.dimension_label(&col.dimension_names[floor]);

                if labels {
                    if floor < last {
                        cells.extend((0..leading).map(|_| TableCell::label("")));
                        cells.push(TableCell::label(col_label));
                    } else {
                        cells.extend(row_names[..leading].iter().map(|name| self.dimension_label(name)));
                        let text = match row_names.last() {
                            Some(name) => format!("{} / {}", self.response.dimension_label(name), col_label),
                            None => col_label,
                        };
                        cells.push(TableCell::label(text));
                    }
                } else if floor == 0 && self.row.is_some() {
                    cells.push(TableCell::corner(self.row_dims, self.col_dims));
                }

                for (position, header) in col.floors[floor].iter().enumerate() {
                    let mut cell = TableCell::dimension(header.id.clone(), self.header_label(&header.id), header.uuid)
                        .with_col_span(header.span)
                        .with_hidden(header.span == 0);

                    if floor == last && self.do_sortable && header.is_door() {
                        cell.sort_id = Some(col.ids[position].clone());
                    }
                    cells.push(cell);

                    if floor == 0 && self.do_row_sub_totals && (position + 1) % col.span[0].max(1) == 0 {
                        cells.push(TableCell::dimension_subtotal().with_row_span(self.col_dims));
                    }
                }

                if floor == 0 && self.do_row_totals {
                    let mut total = TableCell::dimension_total(CellType::DimensionTotal, &self.config.total_label)
                        .with_uuid(Uuid::new_v4())
                        .with_row_span(self.col_dims);
                    if self.do_sortable {
                        total.sort_id = Some(self.config.total_sort_prefix.clone());
                    }
                    cells.push(total);
                }

                cells
            })
            .collect()
    }

    // ------------------------------------------------------------------------
    // Data rows
    // ------------------------------------------------------------------------

    /// Row header cells of one row leaf. A run's header moves down to its
    /// first visible row and spans the visible rows only.
    fn row_header_cells(&self, row: &TableAxis, position: usize, collapsed: &[bool]) -> Vec<TableCell> {
        (0..row.dims())
            .map(|floor| {
                let cell = row.cell(floor, position);
                let door = row.cell(floor, cell.oldest_sibling);

                let end = (cell.oldest_sibling + row.span[floor]).min(row.size());
                let mut visible = (cell.oldest_sibling..end).filter(|&p| !collapsed[p]);
                let first = visible.next();
                let count = first.map_or(0, |_| 1 + visible.count());

                let mut td = match first {
                    Some(first) if first == position => {
                        TableCell::dimension(door.id.clone(), self.header_label(&door.id), door.uuid)
                            .with_row_span(count)
                    }
                    Some(_) => TableCell::dimension(cell.id.clone(), String::new(), cell.uuid).with_hidden(true),
                    None => TableCell::dimension(cell.id.clone(), String::new(), cell.uuid).with_collapsed(true),
                };
                td.no_break = true;
                td.align_left = self.layout.show_hierarchy;
                td
            })
            .collect()
    }

    /// Inserts a subtotal cell after every top-floor run of column leaves.
    fn with_col_subtotals(&self, cells: &[TableCell]) -> Vec<TableCell> {
        if !self.do_row_sub_totals {
            return cells.to_vec();
        }

        let factor = self.col.map_or(1, TableAxis::unique_factor).max(1);
        let mut result = Vec::with_capacity(cells.len() + cells.len() / factor);

        for run in cells.chunks(factor) {
            result.extend(run.iter().cloned());
            result.push(total_cell(CellType::ValueSubtotal, run.iter(), self.layout, self.config));
        }

        result
    }

    /// Subtotal row summing each column over one top-floor run of rows.
    fn subtotal_row(
        &self,
        rows: &[Vec<TableCell>],
        totals: Option<&[TableCell]>,
        collapsed: &[bool],
    ) -> Vec<TableCell> {
        let run_collapsed = collapsed.iter().all(|&c| c);
        let mut cells = Vec::new();

        cells.push(
            TableCell::dimension_subtotal()
                .with_col_span(self.row_dims)
                .with_collapsed(run_collapsed),
        );
        for _ in 1..self.row_dims {
            cells.push(
                TableCell::dimension_subtotal()
                    .with_hidden(true)
                    .with_collapsed(run_collapsed),
            );
        }

        let width = rows.first().map_or(0, Vec::len);
        for column in 0..width {
            let cell_type = if rows[0][column].cell_type == CellType::ValueSubtotal {
                CellType::ValueSubtotalTotal
            } else {
                CellType::ValueSubtotal
            };
            cells.push(total_cell(
                cell_type,
                rows.iter().map(|r| &r[column]),
                self.layout,
                self.config,
            ));
        }

        if let Some(totals) = totals {
            cells.push(total_cell(
                CellType::ValueTotalSubgrandtotal,
                totals.iter(),
                self.layout,
                self.config,
            ));
        }

        cells
    }

    // ------------------------------------------------------------------------
    // Totals row
    // ------------------------------------------------------------------------

    /// Column totals over the data rows, sub-grand-totals after every
    /// top-floor column run and the grand total.
    fn totals_row(&self, rows: &[Vec<TableCell>]) -> Vec<TableCell> {
        let width = rows.first().map_or(0, Vec::len);

        let col_totals: Vec<TableCell> = (0..width)
            .map(|column| {
                total_cell(CellType::ValueTotal, rows.iter().map(|r| &r[column]), self.layout, self.config)
                    .with_collapsed(false)
            })
            .collect();

        let mut cells = vec![
            TableCell::dimension_total(CellType::DimensionSubtotal, &self.config.total_label)
                .with_col_span(self.row_dims),
        ];

        if self.do_row_sub_totals {
            let factor = self.col.map_or(1, TableAxis::unique_factor).max(1);
            for run in col_totals.chunks(factor) {
                cells.extend(run.iter().cloned());
                cells.push(
                    total_cell(CellType::ValueTotalSubgrandtotal, run.iter(), self.layout, self.config)
                        .with_collapsed(false),
                );
            }
        } else {
            cells.extend(col_totals.iter().cloned());
        }

        if self.do_row_totals && self.col.is_some() && self.row.is_some() {
            cells.push(
                total_cell(CellType::ValueGrandTotal, col_totals.iter(), self.layout, self.config)
                    .with_collapsed(false),
            );
        }

        cells
    }
}

// ============================================================================
// PUBLIC API
// ============================================================================

/// Builds a pivot table from a validated layout and a response carrying
/// the merged metadata. When the layout is sorted and the row axis has a
/// single dimension, the row items are reordered before the table is built.
pub fn build_pivot_table(
    layout: &Layout,
    response: &Response,
    config: &EngineConfig,
) -> Result<Table, PivotError> {
    let index = ValueIndex::build(response, layout, config)?;
    let col_axis = TableAxis::build(layout, response, AxisType::Col, config)?;
    let mut row_axis = TableAxis::build(layout, response, AxisType::Row, config)?;

    let sorted = match (&layout.sorting, &row_axis) {
        (Some(sorting), Some(axis)) if axis.dims() == 1 => sorted_row_ids(
            sorting,
            &index,
            col_axis.as_ref(),
            &axis.dimension_names[0],
            &axis.unique_ids[0],
            config,
        )
        .map(|ids| (axis.dimension_names.clone(), ids)),
        _ => None,
    };

    if let Some((names, ids)) = sorted {
        row_axis = Some(TableAxis::from_unique_ids(
            AxisType::Row,
            names,
            vec![ids],
            layout.hide_empty_rows,
            config,
        )?);
    }

    Ok(Table::build(layout, response, &index, col_axis, row_axis, config))
}
