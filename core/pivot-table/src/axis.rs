//! FILENAME: core/pivot-table/src/axis.rs
//! Table Axis - Expands the dimensions of one table side into header cells.
//!
//! Algorithm (each stage is a pure function over the previous one):
//! 1. Unique item ids per dimension floor
//! 2. Axis width (product of the unique counts) and accumulated floor widths
//! 3. Span per floor
//! 4. All-floor ids: every leaf position's ancestor id on each floor
//! 5. Composite leaf ids (floor ids joined with the key delimiter)
//! 6. Header cells in a flat arena per floor, linked by indices
//! 7. Uuid chains from every leaf up through its ancestors

use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};
use smallvec::SmallVec;
use uuid::Uuid;

use crate::config::EngineConfig;
use crate::definition::Layout;
use crate::error::PivotError;
use crate::response::Response;

/// Uuids of a leaf's own header run followed by its ancestors' runs.
pub type UuidChain = SmallVec<[Uuid; 4]>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AxisType {
    Col,
    Row,
}

// ============================================================================
// HEADER CELLS
// ============================================================================

/// One position of one floor of an axis.
///
/// The first cell of every span-sized run is the "door": it carries the span
/// and represents the whole run when rendered. The others have span 0.
#[derive(Debug, Clone, Serialize)]
pub struct HeaderCell {
    pub uuid: Uuid,
    /// Dimension item id.
    pub id: String,
    pub floor: usize,
    pub axis: AxisType,
    pub leaf: bool,
    /// Cells merged by this cell; 0 for every non-door cell.
    pub span: usize,
    /// True for doors.
    pub oldest: bool,
    /// Unique child ids below this cell; reduced when empty rows are hidden.
    pub children: usize,
    /// Index of this run's door on the same floor.
    pub oldest_sibling: usize,
    /// Index of the cell at the same position one floor up.
    pub parent: Option<usize>,
    pub collapsed: bool,
}

impl HeaderCell {
    pub fn is_door(&self) -> bool {
        self.oldest
    }
}

// ============================================================================
// EXPANSION STAGES
// ============================================================================

/// Returns the axis width and the running product of unique counts per floor.
pub fn floor_widths(unique_ids: &[Vec<String>]) -> (usize, Vec<usize>) {
    let mut width = 1;
    let mut acc = Vec::with_capacity(unique_ids.len());

    for ids in unique_ids {
        width *= ids.len();
        acc.push(width);
    }

    (width, acc)
}

/// Span of the header cells on every floor.
///
/// A top floor with a single item spans the whole axis. A lower floor with a
/// single item takes the top floor's span, unless `compact_single_floors` is
/// set (row axis with empty rows hidden), where it nests like any other floor.
pub fn floor_spans(
    unique_counts: &[usize],
    acc_floor_width: &[usize],
    axis_width: usize,
    compact_single_floors: bool,
) -> Vec<usize> {
    let mut spans: Vec<usize> = Vec::with_capacity(unique_counts.len());

    for (floor, &count) in unique_counts.iter().enumerate() {
        let nested = axis_width / acc_floor_width[floor].max(1);

        let span = if count == 1 {
            if floor == 0 {
                axis_width
            } else if compact_single_floors {
                nested
            } else {
                spans[0]
            }
        } else {
            nested
        };

        spans.push(span);
    }

    spans
}

/// Repeats every id `span` times, and the whole block until `axis_width` is filled.
pub fn expand_floor(ids: &[String], span: usize, axis_width: usize) -> Vec<String> {
    let block = span * ids.len();
    if block == 0 {
        return Vec::new();
    }

    let factor = axis_width / block;
    let mut all = Vec::with_capacity(axis_width);

    for _ in 0..factor {
        for id in ids {
            for _ in 0..span {
                all.push(id.clone());
            }
        }
    }

    all
}

/// Joins the floor ids of every leaf position.
pub fn composite_ids(all_floor_ids: &[Vec<String>], delimiter: &str) -> Vec<String> {
    let width = all_floor_ids.first().map_or(0, Vec::len);

    (0..width)
        .map(|position| {
            all_floor_ids
                .iter()
                .map(|floor| floor[position].as_str())
                .collect::<Vec<_>>()
                .join(delimiter)
        })
        .collect()
}

/// Creates the header cell arena with doors, spans, children and parents.
pub fn header_cells(
    all_floor_ids: &[Vec<String>],
    spans: &[usize],
    unique_counts: &[usize],
    axis_type: AxisType,
) -> Vec<Vec<HeaderCell>> {
    let height = all_floor_ids.len();
    let mut floors: Vec<Vec<HeaderCell>> = Vec::with_capacity(height);

    for (floor, ids) in all_floor_ids.iter().enumerate() {
        let leaf = floor == height - 1;
        let span = spans[floor];
        let children = if leaf { 0 } else { unique_counts[floor + 1] };

        let mut cells = Vec::with_capacity(ids.len());
        let mut door = 0;
        let mut door_count = 0;

        for (position, id) in ids.iter().enumerate() {
            let is_door = door_count == 0;
            if is_door {
                door = position;
            }

            cells.push(HeaderCell {
                uuid: Uuid::new_v4(),
                id: id.clone(),
                floor,
                axis: axis_type,
                leaf,
                span: if is_door { span } else { 0 },
                oldest: is_door,
                children,
                oldest_sibling: door,
                parent: if floor > 0 { Some(position) } else { None },
                collapsed: false,
            });

            door_count += 1;
            if door_count == span {
                door_count = 0;
            }
        }

        floors.push(cells);
    }

    floors
}

/// For every leaf: its own door's uuid, then each ancestor's door uuid bottom-up.
pub fn leaf_uuid_chains(floors: &[Vec<HeaderCell>]) -> Vec<UuidChain> {
    let last = match floors.last() {
        Some(last) => last,
        None => return Vec::new(),
    };

    last.iter()
        .map(|leaf| {
            let mut chain = UuidChain::new();
            let mut floor = leaf.floor;
            let mut cell = leaf;

            loop {
                chain.push(floors[floor][cell.oldest_sibling].uuid);
                match cell.parent {
                    Some(parent) => {
                        floor -= 1;
                        cell = &floors[floor][parent];
                    }
                    None => break,
                }
            }

            chain
        })
        .collect()
}

// ============================================================================
// TABLE AXIS
// ============================================================================

/// The fully expanded header structure of one table side.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TableAxis {
    pub axis_type: AxisType,
    pub dimension_names: Vec<String>,
    pub unique_ids: Vec<Vec<String>>,
    pub acc_floor_width: Vec<usize>,
    pub span: Vec<usize>,
    pub all_floor_ids: Vec<Vec<String>>,
    /// Composite id of every leaf position.
    pub ids: Vec<String>,
    pub floors: Vec<Vec<HeaderCell>>,
    pub leaf_uuids: Vec<UuidChain>,
    #[serde(skip)]
    uuid_map: FxHashMap<Uuid, (usize, usize)>,
}

impl TableAxis {
    /// Expands the layout's columns or rows. Returns None when that side
    /// has no dimensions.
    pub fn build(
        layout: &Layout,
        response: &Response,
        axis_type: AxisType,
        config: &EngineConfig,
    ) -> Result<Option<TableAxis>, PivotError> {
        let axis = match axis_type {
            AxisType::Col => layout.columns.as_ref(),
            AxisType::Row => layout.rows.as_ref(),
        };

        let axis = match axis {
            Some(axis) => axis,
            None => return Ok(None),
        };

        let meta = Some(response.meta_data());
        let unique_ids = axis
            .dimensions()
            .iter()
            .map(|d| d.unique_item_ids(meta))
            .collect();

        let compact = layout.hide_empty_rows && axis_type == AxisType::Row;

        TableAxis::from_unique_ids(axis_type, axis.dimension_names(), unique_ids, compact, config)
            .map(Some)
    }

    /// Expands explicit per-floor id lists. Used directly when the row order
    /// has been re-derived by sorting.
    pub fn from_unique_ids(
        axis_type: AxisType,
        dimension_names: Vec<String>,
        unique_ids: Vec<Vec<String>>,
        compact_single_floors: bool,
        config: &EngineConfig,
    ) -> Result<TableAxis, PivotError> {
        for (name, ids) in dimension_names.iter().zip(&unique_ids) {
            if ids.is_empty() {
                return Err(PivotError::EmptyDimension(name.clone()));
            }
        }

        let unique_counts: Vec<usize> = unique_ids.iter().map(Vec::len).collect();
        let (axis_width, acc_floor_width) = floor_widths(&unique_ids);
        let span = floor_spans(&unique_counts, &acc_floor_width, axis_width, compact_single_floors);

        let all_floor_ids: Vec<Vec<String>> = unique_ids
            .iter()
            .zip(&span)
            .map(|(ids, &s)| expand_floor(ids, s, axis_width))
            .collect();

        let ids = composite_ids(&all_floor_ids, &config.key_delimiter);
        let floors = header_cells(&all_floor_ids, &span, &unique_counts, axis_type);
        let leaf_uuids = leaf_uuid_chains(&floors);

        let mut uuid_map = FxHashMap::default();
        for (f, cells) in floors.iter().enumerate() {
            for (i, cell) in cells.iter().enumerate() {
                uuid_map.insert(cell.uuid, (f, i));
            }
        }

        log_debug!(
            "AXIS",
            "{:?} axis [{}]: width {}, spans {:?}",
            axis_type,
            dimension_names.join(", "),
            axis_width,
            span
        );

        Ok(TableAxis {
            axis_type,
            dimension_names,
            unique_ids,
            acc_floor_width,
            span,
            all_floor_ids,
            ids,
            floors,
            leaf_uuids,
            uuid_map,
        })
    }

    /// Number of floors.
    pub fn dims(&self) -> usize {
        self.floors.len()
    }

    /// Number of leaf positions.
    pub fn size(&self) -> usize {
        self.ids.len()
    }

    pub fn cell(&self, floor: usize, position: usize) -> &HeaderCell {
        &self.floors[floor][position]
    }

    pub fn leaf(&self, position: usize) -> &HeaderCell {
        &self.floors[self.dims() - 1][position]
    }

    pub fn by_uuid(&self, uuid: &Uuid) -> Option<&HeaderCell> {
        self.uuid_map
            .get(uuid)
            .map(|&(floor, position)| &self.floors[floor][position])
    }

    /// (dimension name, item id) pairs of a leaf position, top floor first.
    pub fn leaf_item_ids(&self, position: usize) -> Vec<(&str, &str)> {
        self.dimension_names
            .iter()
            .zip(&self.all_floor_ids)
            .map(|(name, ids)| (name.as_str(), ids[position].as_str()))
            .collect()
    }

    /// Leaf positions per top-floor item.
    pub fn unique_factor(&self) -> usize {
        if self.unique_ids.len() < 2 {
            1
        } else {
            self.size() / self.unique_ids[0].len()
        }
    }

    /// Marks an empty leaf collapsed and walks up through the door cells,
    /// decrementing `children` and collapsing every door that reaches zero.
    pub fn reduce_empty_leaf(&mut self, position: usize) {
        if self.floors.is_empty() || position >= self.size() {
            return;
        }

        let mut floor = self.dims() - 1;
        let mut index = position;

        loop {
            let (children, collapsed, parent) = {
                let cell = &self.floors[floor][index];
                (cell.children, cell.collapsed, cell.parent)
            };

            if children == 0 && !collapsed {
                self.floors[floor][index].collapsed = true;

                if let Some(parent) = parent {
                    let door = self.floors[floor - 1][parent].oldest_sibling;
                    let count = &mut self.floors[floor - 1][door].children;
                    *count = count.saturating_sub(1);
                }
            }

            match parent {
                Some(parent) => {
                    index = self.floors[floor - 1][parent].oldest_sibling;
                    floor -= 1;
                }
                None => break,
            }
        }
    }
}
