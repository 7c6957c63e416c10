//! FILENAME: core/pivot-table/src/lib.rs
//! Pivot table engine for analytics responses.
//!
//! Turns a report layout (which dimensions go on columns, rows and filters)
//! and an analytics response (flat rows of dimension item ids and values)
//! into a cross-tabulated grid with subtotals, totals and sortable headers.
//! The engine is synchronous and performs no I/O; fetching is the caller's job.
//!
//! Layers:
//! - `definition`: Layout configuration (what the table IS)
//! - `response`: Parsed analytics response and the composite-key value index
//! - `axis`: Header structure of one table side (HOW headers nest and span)
//! - `table`: Grid assembly (HOW we calculate)
//! - `view`: Render-agnostic output and HTML (WHAT we display)
//! - `sort`: Row ordering by a column's values
//! - `request`: Analytics request URLs and HTTP status messages

#[macro_use]
mod logging;

pub mod config;
pub mod error;
pub mod number_format;
pub mod definition;
pub mod response;
pub mod axis;
pub mod view;
pub mod sort;
pub mod table;
pub mod request;

pub use config::EngineConfig;
pub use error::{LayoutError, PivotError, ResponseError};
pub use definition::*;
pub use response::{Header, MetaData, Response, ResponseValue, ValueIndex};
pub use axis::{AxisType, HeaderCell, TableAxis};
pub use view::*;
pub use sort::{sorted_row_ids, SortTarget};
pub use table::{build_pivot_table, Table};
pub use request::{status_message, AnalyticsRequest, DataRequests};
