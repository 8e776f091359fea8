//! Engine construction options and their validation. Mirrors the option
//! table the facade consumes at `Engine::new` time; anything that can be
//! checked without row data is checked here, once, rather than defensively
//! re-checked on every mutating call.

use std::collections::HashMap;
use std::sync::Arc;

use crate::data_source::ServerSideConfig;
use crate::error::EngineError;
use crate::filter::CustomFilter;
use crate::types::{Column, Comparator, ColumnId, DataMode, Formatter, RowId};

/// Extracts a stable [`RowId`] from a payload. Defaults to an ordinal
/// counter when the host supplies none, per the data model's "row id
/// derivation" note.
pub type IdExtractor<T> = Arc<dyn Fn(&T) -> RowId + Send + Sync>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortMode {
    Single,
    Multi,
}

#[derive(Clone)]
pub struct SortingOptions {
    pub enabled: bool,
    pub mode: SortMode,
    pub case_sensitive: bool,
}

impl Default for SortingOptions {
    fn default() -> Self {
        SortingOptions {
            enabled: true,
            mode: SortMode::Single,
            case_sensitive: false,
        }
    }
}

#[derive(Clone)]
pub struct FilteringOptions {
    pub enabled: bool,
    /// Whether `search(q)` (global search across filterable columns) is
    /// active at all; `set_search` is a no-op while this is `false`.
    pub global_search: bool,
    pub case_sensitive: bool,
    pub debounce_ms: u64,
}

impl Default for FilteringOptions {
    fn default() -> Self {
        FilteringOptions {
            enabled: true,
            global_search: true,
            case_sensitive: false,
            debounce_ms: 300,
        }
    }
}

#[derive(Clone)]
pub struct PaginationOptions {
    pub enabled: bool,
    pub page_size: usize,
    pub page_size_options: Vec<usize>,
}

impl Default for PaginationOptions {
    fn default() -> Self {
        PaginationOptions {
            enabled: true,
            page_size: 10,
            page_size_options: vec![5, 10, 25, 50, 100],
        }
    }
}

#[derive(Clone, Copy)]
pub struct SelectionOptions {
    pub enabled: bool,
    pub mode: crate::selection::SelectionMode,
}

impl Default for SelectionOptions {
    fn default() -> Self {
        SelectionOptions {
            enabled: false,
            mode: crate::selection::SelectionMode::Multiple,
        }
    }
}

#[derive(Clone, Copy)]
pub struct VirtualScrollOptions {
    pub enabled: bool,
    pub row_height: f64,
    pub overscan: usize,
}

impl Default for VirtualScrollOptions {
    fn default() -> Self {
        VirtualScrollOptions {
            enabled: false,
            row_height: 48.0,
            overscan: 5,
        }
    }
}

/// The full construction-time option set for an [`crate::facade::Engine`].
/// Builder-style like [`Column`], since most hosts only override a handful
/// of fields.
pub struct EngineOptions<T> {
    pub columns: Vec<Column<T>>,
    pub data_mode: DataMode,
    pub server_side: Option<ServerSideConfig>,
    pub sorting: SortingOptions,
    pub filtering: FilteringOptions,
    pub pagination: PaginationOptions,
    pub selection: SelectionOptions,
    pub virtual_scroll: VirtualScrollOptions,
    pub row_id: Option<IdExtractor<T>>,
    pub preserve_state: bool,
    pub state_key: String,
    pub custom_comparators: HashMap<ColumnId, Comparator>,
    pub custom_filters: HashMap<ColumnId, CustomFilter<T>>,
    pub custom_formatters: HashMap<ColumnId, Formatter<T>>,
}

impl<T> EngineOptions<T> {
    pub fn new(columns: Vec<Column<T>>) -> Self {
        EngineOptions {
            columns,
            data_mode: DataMode::Client,
            server_side: None,
            sorting: SortingOptions::default(),
            filtering: FilteringOptions::default(),
            pagination: PaginationOptions::default(),
            selection: SelectionOptions::default(),
            virtual_scroll: VirtualScrollOptions::default(),
            row_id: None,
            preserve_state: false,
            state_key: "datatable-state".to_string(),
            custom_comparators: HashMap::new(),
            custom_filters: HashMap::new(),
            custom_formatters: HashMap::new(),
        }
    }

    pub fn data_mode(mut self, mode: DataMode) -> Self {
        self.data_mode = mode;
        self
    }

    pub fn server_side(mut self, config: ServerSideConfig) -> Self {
        self.server_side = Some(config);
        self
    }

    pub fn sorting(mut self, sorting: SortingOptions) -> Self {
        self.sorting = sorting;
        self
    }

    pub fn filtering(mut self, filtering: FilteringOptions) -> Self {
        self.filtering = filtering;
        self
    }

    pub fn pagination(mut self, pagination: PaginationOptions) -> Self {
        self.pagination = pagination;
        self
    }

    pub fn selection(mut self, selection: SelectionOptions) -> Self {
        self.selection = selection;
        self
    }

    pub fn virtual_scroll(mut self, virtual_scroll: VirtualScrollOptions) -> Self {
        self.virtual_scroll = virtual_scroll;
        self
    }

    pub fn row_id(mut self, extractor: impl Fn(&T) -> RowId + Send + Sync + 'static) -> Self {
        self.row_id = Some(Arc::new(extractor));
        self
    }

    pub fn preserve_state(mut self, state_key: impl Into<String>) -> Self {
        self.preserve_state = true;
        self.state_key = state_key.into();
        self
    }

    /// Validates everything that can be checked without row data: at least
    /// one unique column id, a positive page size, and (for server mode) a
    /// non-empty url. Mirrors the construction-time checks the source
    /// design performs before the engine accepts any data.
    pub fn validate(&self) -> Result<(), EngineError> {
        if self.columns.is_empty() {
            return Err(EngineError::InvalidConfig("at least one column is required".into()));
        }

        let mut seen = std::collections::HashSet::new();
        for column in &self.columns {
            if !seen.insert(&column.id) {
                return Err(EngineError::InvalidConfig(format!("duplicate column id: {}", column.id)));
            }
        }

        if self.pagination.enabled && self.pagination.page_size == 0 {
            return Err(EngineError::InvalidConfig("pagination.pageSize must be at least 1".into()));
        }

        if self.virtual_scroll.enabled && self.virtual_scroll.row_height <= 0.0 {
            return Err(EngineError::InvalidConfig("virtualScroll.rowHeight must be positive".into()));
        }

        if self.data_mode == DataMode::Server {
            match &self.server_side {
                Some(config) if !config.url.is_empty() => {}
                _ => return Err(EngineError::InvalidConfig("serverSide.url is required when dataMode is Server".into())),
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::CellValue;

    fn columns() -> Vec<Column<i32>> {
        vec![Column::new("n", "N", |v: &i32| CellValue::Number(*v as f64))]
    }

    #[test]
    fn rejects_empty_column_list() {
        let opts: EngineOptions<i32> = EngineOptions::new(vec![]);
        assert!(opts.validate().is_err());
    }

    #[test]
    fn rejects_duplicate_column_ids() {
        let opts = EngineOptions::new(vec![
            Column::new("n", "N", |v: &i32| CellValue::Number(*v as f64)),
            Column::new("n", "N2", |v: &i32| CellValue::Number(*v as f64)),
        ]);
        assert!(opts.validate().is_err());
    }

    #[test]
    fn rejects_zero_page_size() {
        let mut opts = EngineOptions::new(columns());
        opts.pagination.page_size = 0;
        assert!(opts.validate().is_err());
    }

    #[test]
    fn server_mode_requires_a_url() {
        let opts = EngineOptions::new(columns()).data_mode(DataMode::Server);
        assert!(opts.validate().is_err());
    }

    #[test]
    fn valid_client_mode_options_pass() {
        let opts = EngineOptions::new(columns());
        assert!(opts.validate().is_ok());
    }

    #[test]
    fn defaults_match_the_documented_values() {
        let opts = EngineOptions::new(columns());
        assert_eq!(opts.pagination.page_size, 10);
        assert_eq!(opts.pagination.page_size_options, vec![5, 10, 25, 50, 100]);
        assert!(!opts.selection.enabled);
        assert!(opts.filtering.global_search);
        assert_eq!(opts.filtering.debounce_ms, 300);
        assert_eq!(opts.virtual_scroll.row_height, 48.0);
    }
}
