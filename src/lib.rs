//! Headless tabular dataset runtime: filtering, sorting, pagination,
//! selection, and row virtualization for a collection of rows, independent
//! of any particular rendering layer.
//!
//! [`facade::Engine`] is the entry point. Construct one from
//! [`config::EngineOptions`], feed it rows through `set_data`, and drive it
//! through the rest of its methods; subscribe to [`event_bus::EngineEvent`]
//! to react to state changes.

pub mod config;
pub mod data_source;
pub mod error;
pub mod event_bus;
pub mod facade;
pub mod filter;
pub mod pipeline;
pub mod plugins;
pub mod selection;
pub mod sort;
pub mod state_store;
pub mod types;

pub use config::EngineOptions;
pub use error::EngineError;
pub use event_bus::{EngineEvent, EventKind, SubscriptionId};
pub use facade::{Engine, EngineHandle};
pub use types::{
    CellValue, Column, ColumnId, DataMode, Filter, FilterOperator, FilterState, FilterValue, HttpMethod, LoadState, PaginationState, Row, RowId,
    SelectionState, SortDirection, SortKey, SortState,
};
