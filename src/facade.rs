//! C8 — Engine Facade: the single entry point a host constructs and drives.
//! Owns every other component and re-synchronizes them synchronously on
//! every mutating call — there is no background scheduler, so "eventually
//! consistent" never applies here.
//!
//! [`Engine`] is a thin owned wrapper around [`EngineHandle`], the actual
//! cheaply-cloneable reference type. Plugins receive a handle rather than
//! the engine itself so that installing a plugin never requires exposing
//! engine internals across a trait boundary.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use chrono::Utc;
use serde::de::DeserializeOwned;
use tracing::warn;

use crate::config::{EngineOptions, IdExtractor};
use crate::data_source::{build_request, RemoteDataSource, ServerSideConfig};
use crate::error::EngineError;
use crate::event_bus::{EngineEvent, EventBus, EventKind, SubscriptionId};
use crate::filter::CustomFilter;
use crate::pipeline::{self, PipelineInput, Projections};
use crate::plugins::export::{self, ExportFormat, ExportResult, ExportScope};
use crate::plugins::{Plugin, PluginHost};
use crate::selection::{SelectionManager, SelectionMode};
use crate::state_store::{InMemoryStore, StateSnapshot, StateStore};
use crate::types::{
    Column, ColumnId, Comparator, DataMode, Filter, FilterOperator, FilterState, FilterValue, Formatter, LoadState, PaginationState, Row, RowId, SortDirection,
    SortKey, SortState,
};

struct Inner<T> {
    columns: Vec<Column<T>>,
    rows: Vec<Row<T>>,
    sort_state: SortState,
    filter_state: FilterState,
    pagination: PaginationState,
    selection: SelectionManager,
    load_state: LoadState,
    projections: Projections,
    event_bus: EventBus<T>,
    state_store: StateStore,
    plugin_host: PluginHost<T>,

    row_id: Option<IdExtractor<T>>,
    next_ordinal: u64,
    preserve_state: bool,
    state_key: String,
    custom_comparators: HashMap<ColumnId, Comparator>,
    custom_filters: HashMap<ColumnId, CustomFilter<T>>,
    #[allow(dead_code)]
    custom_formatters: HashMap<ColumnId, Formatter<T>>,

    data_mode: DataMode,
    server_side: Option<ServerSideConfig>,
    server_total: Option<usize>,

    sorting_enabled: bool,
    sort_mode: crate::config::SortMode,
    filtering_enabled: bool,
    global_search_enabled: bool,
    case_sensitive: bool,
    pagination_enabled: bool,
    selection_enabled: bool,
    selection_mode: SelectionMode,

    destroyed: bool,
}

impl<T: Clone> Inner<T> {
    /// Steps 1–7 of the compute pipeline, run against the authoritative row
    /// collection. Called after every mutation that could change what's
    /// visible.
    fn recompute(&mut self) {
        let server_mode = self.data_mode == DataMode::Server;
        let mut pagination = self.pagination.clone();

        let (projections, visible) = pipeline::recompute(PipelineInput {
            rows: &self.rows,
            columns: &self.columns,
            sort_state: &self.sort_state,
            filter_state: &self.filter_state,
            pagination: &mut pagination,
            case_sensitive: self.case_sensitive,
            filtering_enabled: self.filtering_enabled && !server_mode,
            sorting_enabled: self.sorting_enabled && !server_mode,
            pagination_enabled: self.pagination_enabled && !server_mode,
            custom_filters: &self.custom_filters,
            comparator_overrides: &self.custom_comparators,
        });

        if server_mode {
            if let Some(total) = self.server_total {
                pagination.total_rows = total;
                pagination.total_pages = if pagination.page_size > 0 { total.div_ceil(pagination.page_size) } else { 0 };
            }
        }

        let selection_state = pipeline::update_selection_state(&self.selection, &visible);

        self.projections = projections;
        self.pagination = pagination;
        self.event_bus.emit(EngineEvent::PageChange(self.pagination.clone()));
        self.event_bus.emit(EngineEvent::SelectionChange(selection_state));
        self.event_bus.emit(EngineEvent::StateChange);
    }

    fn visible_rows(&self) -> Vec<&Row<T>> {
        let by_id: HashMap<&RowId, &Row<T>> = self.rows.iter().map(|r| (&r.id, r)).collect();
        self.projections.paginated.iter().filter_map(|id| by_id.get(id).copied()).collect()
    }

    fn next_row_id(&mut self, payload: &T) -> RowId {
        let id = match &self.row_id {
            Some(extract) => extract(payload),
            None => RowId(self.next_ordinal.to_string()),
        };
        self.next_ordinal += 1;
        id
    }

    fn hidden_columns(&self) -> Vec<ColumnId> {
        self.columns.iter().filter(|c| !c.visible).map(|c| c.id.clone()).collect()
    }

    fn snapshot(&self) -> StateSnapshot {
        StateSnapshot {
            sort_state: self.sort_state.clone(),
            filter_state: self.filter_state.clone(),
            page_index: self.pagination.page_index,
            page_size: self.pagination.page_size,
            selected_ids: self.selection.selected_ids.clone(),
            hidden_columns: self.hidden_columns(),
            last_fetch: self.load_state.last_fetch,
        }
    }

    fn persist(&mut self) {
        if self.preserve_state {
            let snapshot = self.snapshot();
            let key = self.state_key.clone();
            self.state_store.save(&key, &snapshot);
        }
    }

    fn apply_snapshot(&mut self, snapshot: StateSnapshot) {
        self.sort_state = snapshot.sort_state;
        self.filter_state = snapshot.filter_state;
        self.pagination.page_index = snapshot.page_index;
        self.pagination.page_size = snapshot.page_size;
        self.selection.selected_ids = snapshot.selected_ids;
        for column in self.columns.iter_mut() {
            column.visible = !snapshot.hidden_columns.contains(&column.id);
        }
        self.load_state.last_fetch = snapshot.last_fetch;
    }
}

/// A cheaply-cloneable reference to a running engine. Every method acquires
/// the engine's internal lock for the duration of one synchronous
/// recomputation; none of them hold it across an `.await`.
pub struct EngineHandle<T> {
    inner: Arc<Mutex<Inner<T>>>,
    data_source: Option<Arc<RemoteDataSource>>,
}

impl<T> Clone for EngineHandle<T> {
    fn clone(&self) -> Self {
        EngineHandle {
            inner: self.inner.clone(),
            data_source: self.data_source.clone(),
        }
    }
}

impl<T> EngineHandle<T> {
    fn lock(&self) -> MutexGuard<'_, Inner<T>> {
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Registers a callback for `kind`. See [`EventBus::on`].
    pub fn on(&self, kind: EventKind, callback: impl Fn(&EngineEvent<T>) + Send + Sync + 'static) -> SubscriptionId {
        self.lock().event_bus.on(kind, callback)
    }

    pub fn off(&self, kind: EventKind, id: SubscriptionId) {
        self.lock().event_bus.off(kind, id);
    }

    pub fn is_destroyed(&self) -> bool {
        self.lock().destroyed
    }
}

impl<T: Clone> EngineHandle<T> {
    fn guard_destroyed(&self) -> Result<MutexGuard<'_, Inner<T>>, EngineError> {
        let inner = self.lock();
        if inner.destroyed {
            Err(EngineError::Destroyed)
        } else {
            Ok(inner)
        }
    }

    // -- data -----------------------------------------------------------

    pub fn set_data(&self, payloads: Vec<T>) -> Result<(), EngineError> {
        let mut inner = self.guard_destroyed()?;
        let rows: Vec<Row<T>> = payloads
            .into_iter()
            .map(|payload| {
                let id = inner.next_row_id(&payload);
                Row::new(id, payload)
            })
            .collect();
        inner.rows = rows;
        let inner = &mut *inner;
        inner.selection.reconcile(&inner.rows);
        inner.recompute();
        inner.event_bus.emit(EngineEvent::DataChange(inner.rows.clone()));
        inner.persist();
        Ok(())
    }

    pub fn get_data(&self) -> Vec<T> {
        let inner = self.lock();
        inner.visible_rows().into_iter().map(|r| r.payload.clone()).collect()
    }

    pub fn get_all_rows(&self) -> Vec<Row<T>> {
        self.lock().rows.clone()
    }

    pub fn add_row(&self, payload: T) -> Result<(), EngineError> {
        let mut inner = self.guard_destroyed()?;
        let id = inner.next_row_id(&payload);
        inner.rows.push(Row::new(id, payload));
        inner.recompute();
        inner.event_bus.emit(EngineEvent::DataChange(inner.rows.clone()));
        inner.persist();
        Ok(())
    }

    pub fn update_row(&self, id: &RowId, update: impl FnOnce(&mut T)) -> Result<(), EngineError> {
        let mut inner = self.guard_destroyed()?;
        match inner.rows.iter_mut().find(|r| &r.id == id) {
            Some(row) => update(&mut row.payload),
            None => {
                warn!(target: "datatable::facade", %id, "updateRow: unknown row id, ignoring");
                return Ok(());
            }
        }
        inner.recompute();
        inner.event_bus.emit(EngineEvent::DataChange(inner.rows.clone()));
        inner.persist();
        Ok(())
    }

    pub fn delete_row(&self, id: &RowId) -> Result<(), EngineError> {
        let mut inner = self.guard_destroyed()?;
        inner.rows.retain(|r| &r.id != id);
        let inner = &mut *inner;
        inner.selection.reconcile(&inner.rows);
        inner.recompute();
        inner.event_bus.emit(EngineEvent::DataChange(inner.rows.clone()));
        inner.persist();
        Ok(())
    }

    pub fn clear_data(&self) -> Result<(), EngineError> {
        let mut inner = self.guard_destroyed()?;
        inner.rows.clear();
        inner.selection.selected_ids.clear();
        inner.pagination.page_index = 0;
        inner.recompute();
        inner.event_bus.emit(EngineEvent::DataChange(Vec::new()));
        inner.persist();
        Ok(())
    }

    // -- columns ----------------------------------------------------------

    pub fn set_column_visibility(&self, column_id: &ColumnId, visible: bool) -> Result<(), EngineError> {
        let mut inner = self.guard_destroyed()?;
        match inner.columns.iter_mut().find(|c| &c.id == column_id) {
            Some(column) => column.visible = visible,
            None => {
                warn!(target: "datatable::facade", %column_id, "setColumnVisibility: unknown column id, ignoring");
                return Ok(());
            }
        }
        inner.event_bus.emit(EngineEvent::ColumnVisibility {
            column_id: column_id.clone(),
            visible,
        });
        inner.event_bus.emit(EngineEvent::StateChange);
        inner.persist();
        Ok(())
    }

    pub fn columns(&self) -> Vec<Column<T>> {
        self.lock().columns.clone()
    }

    /// Applies visibility for every `(column_id, visible)` pair in `updates`
    /// in one pass; unknown column ids are logged and skipped, matching
    /// `set_column_visibility`. Emits one `ColumnVisibility` event per
    /// column actually changed.
    pub fn set_columns(&self, updates: impl IntoIterator<Item = (ColumnId, bool)>) -> Result<(), EngineError> {
        let mut inner = self.guard_destroyed()?;
        let mut changed = Vec::new();
        for (column_id, visible) in updates {
            match inner.columns.iter_mut().find(|c| c.id == column_id) {
                Some(column) => {
                    column.visible = visible;
                    changed.push((column_id, visible));
                }
                None => warn!(target: "datatable::facade", %column_id, "setColumns: unknown column id, ignoring"),
            }
        }
        for (column_id, visible) in changed {
            inner.event_bus.emit(EngineEvent::ColumnVisibility { column_id, visible });
        }
        inner.event_bus.emit(EngineEvent::StateChange);
        inner.persist();
        Ok(())
    }

    pub fn toggle_column(&self, column_id: &ColumnId) -> Result<(), EngineError> {
        let mut inner = self.guard_destroyed()?;
        let visible = match inner.columns.iter_mut().find(|c| &c.id == column_id) {
            Some(column) => {
                column.visible = !column.visible;
                column.visible
            }
            None => {
                warn!(target: "datatable::facade", %column_id, "toggleColumn: unknown column id, ignoring");
                return Ok(());
            }
        };
        inner.event_bus.emit(EngineEvent::ColumnVisibility {
            column_id: column_id.clone(),
            visible,
        });
        inner.event_bus.emit(EngineEvent::StateChange);
        inner.persist();
        Ok(())
    }

    // -- sorting ----------------------------------------------------------

    /// Cycles `column_id` through asc -> desc -> none. In multi-sort mode
    /// the column's key is added, cycled, or dropped independently of the
    /// other active keys.
    pub fn sort_by(&self, column_id: &ColumnId) -> Result<(), EngineError> {
        let mut inner = self.guard_destroyed()?;
        if !inner.columns.iter().any(|c| &c.id == column_id && c.sortable) {
            warn!(target: "datatable::facade", %column_id, "sortBy: unknown or unsortable column id, ignoring");
            return Ok(());
        }

        match inner.sort_mode {
            crate::config::SortMode::Single => {
                let current = match &inner.sort_state {
                    SortState::Single(Some(key)) if &key.column_id == column_id => Some(key.direction),
                    _ => None,
                };
                inner.sort_state = SortState::Single(SortDirection::cycle(current).map(|direction| SortKey {
                    column_id: column_id.clone(),
                    direction,
                }));
            }
            crate::config::SortMode::Multi => {
                let mut keys = match &inner.sort_state {
                    SortState::Multi(keys) => keys.clone(),
                    SortState::Single(Some(key)) => vec![key.clone()],
                    SortState::Single(None) => Vec::new(),
                };
                match keys.iter().position(|k| &k.column_id == column_id) {
                    Some(idx) => match SortDirection::cycle(Some(keys[idx].direction)) {
                        Some(direction) => keys[idx].direction = direction,
                        None => {
                            keys.remove(idx);
                        }
                    },
                    None => keys.push(SortKey {
                        column_id: column_id.clone(),
                        direction: SortDirection::Asc,
                    }),
                }
                inner.sort_state = SortState::Multi(keys);
            }
        }

        inner.recompute();
        inner.event_bus.emit(EngineEvent::SortChange(inner.sort_state.clone()));
        inner.persist();
        Ok(())
    }

    pub fn set_sort_state(&self, state: SortState) -> Result<(), EngineError> {
        let mut inner = self.guard_destroyed()?;
        inner.sort_state = state;
        inner.recompute();
        inner.event_bus.emit(EngineEvent::SortChange(inner.sort_state.clone()));
        inner.persist();
        Ok(())
    }

    pub fn clear_sort(&self) -> Result<(), EngineError> {
        let mode = self.lock().sort_mode;
        let state = match mode {
            crate::config::SortMode::Multi => SortState::Multi(Vec::new()),
            crate::config::SortMode::Single => SortState::Single(None),
        };
        self.set_sort_state(state)
    }

    // -- filtering ----------------------------------------------------------

    pub fn set_filter(&self, column_id: impl Into<ColumnId>, operator: FilterOperator, value: FilterValue) -> Result<(), EngineError> {
        let filter = Filter::new(column_id, operator, value)?;
        let mut inner = self.guard_destroyed()?;
        inner.filter_state.filters.retain(|f| f.column_id != filter.column_id);
        inner.filter_state.filters.push(filter);
        inner.pagination.page_index = 0;
        inner.recompute();
        inner.event_bus.emit(EngineEvent::FilterChange(inner.filter_state.clone()));
        inner.persist();
        Ok(())
    }

    /// Replaces the entire filter list wholesale (as opposed to
    /// [`EngineHandle::set_filter`], which replaces only the same-column
    /// filter). The global search term is left untouched.
    pub fn set_filters(&self, filters: Vec<Filter>) -> Result<(), EngineError> {
        let mut inner = self.guard_destroyed()?;
        inner.filter_state.filters = filters;
        inner.pagination.page_index = 0;
        inner.recompute();
        inner.event_bus.emit(EngineEvent::FilterChange(inner.filter_state.clone()));
        inner.persist();
        Ok(())
    }

    pub fn remove_filter(&self, column_id: &ColumnId) -> Result<(), EngineError> {
        let mut inner = self.guard_destroyed()?;
        inner.filter_state.filters.retain(|f| &f.column_id != column_id);
        inner.recompute();
        inner.event_bus.emit(EngineEvent::FilterChange(inner.filter_state.clone()));
        inner.persist();
        Ok(())
    }

    pub fn clear_filters(&self) -> Result<(), EngineError> {
        let mut inner = self.guard_destroyed()?;
        inner.filter_state.filters.clear();
        inner.pagination.page_index = 0;
        inner.recompute();
        inner.event_bus.emit(EngineEvent::FilterChange(inner.filter_state.clone()));
        inner.persist();
        Ok(())
    }

    pub fn set_search(&self, text: impl Into<String>) -> Result<(), EngineError> {
        let mut inner = self.guard_destroyed()?;
        if !inner.global_search_enabled {
            warn!(target: "datatable::facade", "search: global search is disabled, ignoring");
            return Ok(());
        }
        let text = text.into();
        inner.filter_state.global_search = text.clone();
        inner.pagination.page_index = 0;
        inner.recompute();
        inner.event_bus.emit(EngineEvent::SearchChange(text));
        inner.persist();
        Ok(())
    }

    // -- pagination ----------------------------------------------------------

    pub fn set_page(&self, page_index: usize) -> Result<(), EngineError> {
        let mut inner = self.guard_destroyed()?;
        inner.pagination.page_index = page_index;
        inner.recompute();
        inner.persist();
        Ok(())
    }

    pub fn set_page_size(&self, page_size: usize) -> Result<(), EngineError> {
        if page_size == 0 {
            warn!(target: "datatable::facade", "setPageSize: page size must be at least 1, ignoring");
            return Ok(());
        }
        let mut inner = self.guard_destroyed()?;
        inner.pagination.page_size = page_size;
        inner.pagination.page_index = 0;
        inner.recompute();
        inner.persist();
        Ok(())
    }

    pub fn next_page(&self) -> Result<(), EngineError> {
        let mut inner = self.guard_destroyed()?;
        let max_index = inner.pagination.total_pages.saturating_sub(1);
        inner.pagination.page_index = (inner.pagination.page_index + 1).min(max_index);
        inner.recompute();
        inner.persist();
        Ok(())
    }

    pub fn previous_page(&self) -> Result<(), EngineError> {
        let mut inner = self.guard_destroyed()?;
        inner.pagination.page_index = inner.pagination.page_index.saturating_sub(1);
        inner.recompute();
        inner.persist();
        Ok(())
    }

    pub fn first_page(&self) -> Result<(), EngineError> {
        self.set_page(0)
    }

    pub fn last_page(&self) -> Result<(), EngineError> {
        let mut inner = self.guard_destroyed()?;
        inner.pagination.page_index = inner.pagination.total_pages.saturating_sub(1);
        inner.recompute();
        inner.persist();
        Ok(())
    }

    pub fn pagination(&self) -> PaginationState {
        self.lock().pagination.clone()
    }

    // -- selection ----------------------------------------------------------

    pub fn select_row(&self, id: &RowId) -> Result<(), EngineError> {
        let mut inner = self.guard_destroyed()?;
        if !inner.selection_enabled {
            return Ok(());
        }
        let mode = inner.selection_mode;
        let inner = &mut *inner;
        inner.selection.select_row(&mut inner.rows, id, mode);
        inner.recompute();
        inner.event_bus.emit(EngineEvent::RowSelect { row_id: id.clone(), selected: true });
        inner.persist();
        Ok(())
    }

    pub fn deselect_row(&self, id: &RowId) -> Result<(), EngineError> {
        let mut inner = self.guard_destroyed()?;
        let inner = &mut *inner;
        inner.selection.deselect_row(&mut inner.rows, id);
        inner.recompute();
        inner.event_bus.emit(EngineEvent::RowSelect { row_id: id.clone(), selected: false });
        inner.persist();
        Ok(())
    }

    pub fn toggle_row(&self, id: &RowId) -> Result<(), EngineError> {
        let mut inner = self.guard_destroyed()?;
        if !inner.selection_enabled {
            return Ok(());
        }
        let mode = inner.selection_mode;
        let inner = &mut *inner;
        inner.selection.toggle_row(&mut inner.rows, id, mode);
        let selected = inner.selection.selected_ids.contains(id);
        inner.recompute();
        inner.event_bus.emit(EngineEvent::RowSelect { row_id: id.clone(), selected });
        inner.persist();
        Ok(())
    }

    pub fn select_all(&self) -> Result<(), EngineError> {
        let mut inner = self.guard_destroyed()?;
        if !inner.selection_enabled || inner.selection_mode != SelectionMode::Multiple {
            return Ok(());
        }
        let visible_ids: Vec<RowId> = inner.projections.paginated.clone();
        let inner = &mut *inner;
        inner.selection.select_all(&mut inner.rows, &visible_ids);
        inner.recompute();
        inner.persist();
        Ok(())
    }

    pub fn deselect_all(&self) -> Result<(), EngineError> {
        let mut inner = self.guard_destroyed()?;
        let inner = &mut *inner;
        inner.selection.deselect_all(&mut inner.rows);
        inner.recompute();
        inner.persist();
        Ok(())
    }

    pub fn get_selected_rows(&self) -> Vec<Row<T>> {
        let inner = self.lock();
        inner.rows.iter().filter(|r| inner.selection.selected_ids.contains(&r.id)).cloned().collect()
    }

    // -- state persistence ----------------------------------------------------------

    pub fn get_state(&self) -> StateSnapshot {
        self.lock().snapshot()
    }

    pub fn set_state(&self, snapshot: StateSnapshot) -> Result<(), EngineError> {
        let mut inner = self.guard_destroyed()?;
        inner.apply_snapshot(snapshot);
        inner.recompute();
        inner.persist();
        Ok(())
    }

    pub fn reset_state(&self) -> Result<(), EngineError> {
        let mut inner = self.guard_destroyed()?;
        inner.sort_state = match inner.sort_mode {
            crate::config::SortMode::Multi => SortState::Multi(Vec::new()),
            crate::config::SortMode::Single => SortState::Single(None),
        };
        inner.filter_state = FilterState::default();
        inner.pagination.page_index = 0;
        inner.selection.selected_ids.clear();
        for column in inner.columns.iter_mut() {
            column.visible = true;
        }
        inner.recompute();
        let key = inner.state_key.clone();
        inner.state_store.remove(&key);
        Ok(())
    }

    // -- export ----------------------------------------------------------

    /// Renders `scope` through `columns` (or, when `None`, every currently
    /// visible column) in `format`. Returns `Ok(None)` for `Xlsx`, which
    /// the export plugin does not support.
    pub fn export(
        &self,
        format: ExportFormat,
        scope: ExportScope,
        columns: Option<&[ColumnId]>,
        include_headers: bool,
        file_stem: &str,
    ) -> Result<Option<ExportResult>, EngineError> {
        let inner = self.guard_destroyed()?;

        let rows: Vec<Row<T>> = match scope {
            ExportScope::SelectedOnly => inner.rows.iter().filter(|r| inner.selection.selected_ids.contains(&r.id)).cloned().collect(),
            ExportScope::VisibleOnly => inner.visible_rows().into_iter().cloned().collect(),
            ExportScope::All => inner.rows.clone(),
        };

        let selected_columns: Vec<Column<T>> = match columns {
            Some(ids) => inner.columns.iter().filter(|c| ids.contains(&c.id)).cloned().collect(),
            None => inner.columns.iter().filter(|c| c.visible).cloned().collect(),
        };

        drop(inner);

        let row_refs: Vec<&Row<T>> = rows.iter().collect();
        let column_refs: Vec<&Column<T>> = selected_columns.iter().collect();
        Ok(export::export(&row_refs, &column_refs, format, include_headers, file_stem))
    }

    // -- plugins ----------------------------------------------------------

    pub fn use_plugin(&self, plugin: Box<dyn Plugin<T>>) -> Result<(), EngineError> {
        if self.is_destroyed() {
            return Err(EngineError::Destroyed);
        }
        let mut host = { std::mem::take(&mut self.lock().plugin_host) };
        host.install(plugin, self);
        self.lock().plugin_host = host;
        Ok(())
    }

    pub fn destroy(&self) {
        let mut host = {
            let mut inner = self.lock();
            if inner.destroyed {
                return;
            }
            inner.destroyed = true;
            inner.event_bus.emit(EngineEvent::Destroy);
            inner.event_bus.clear();
            std::mem::take(&mut inner.plugin_host)
        };
        host.uninstall_all(self);
    }
}

impl<T: Clone + Send + Sync + 'static> EngineHandle<T> {
    /// Issues a remote reload using current sort/filter/pagination state.
    /// No-ops with a warning when the engine was not constructed with a
    /// server-side data source. A response that arrives after a newer
    /// `reload` was issued is dropped by [`RemoteDataSource::reload`]
    /// before it reaches here.
    pub async fn reload(&self) -> Result<(), EngineError>
    where
        T: DeserializeOwned,
    {
        let Some(data_source) = self.data_source.clone() else {
            warn!(target: "datatable::facade", "reload: engine is not configured with a server-side data source");
            return Ok(());
        };

        let request = {
            let inner = self.guard_destroyed()?;
            let static_params = inner.server_side.as_ref().map(|c| c.params.clone()).unwrap_or_default();
            build_request(
                inner.pagination.page_index,
                inner.pagination.page_size,
                inner.sort_state.clone(),
                &inner.filter_state.filters,
                &inner.filter_state.global_search,
                static_params,
            )
        };

        {
            let mut inner = self.lock();
            inner.load_state.loading = true;
        }

        let outcome = data_source.reload::<T>(&request).await;

        let mut inner = self.lock();
        inner.load_state.loading = false;

        match outcome {
            Ok(None) => Ok(()),
            Ok(Some(result)) => {
                let rows: Vec<Row<T>> = result
                    .rows
                    .into_iter()
                    .map(|payload| {
                        let id = inner.next_row_id(&payload);
                        Row::new(id, payload)
                    })
                    .collect();
                inner.rows = rows;
                inner.server_total = Some(result.total);
                inner.load_state.error = None;
                inner.load_state.last_fetch = Some(Utc::now());
                let inner = &mut *inner;
                inner.selection.reconcile(&inner.rows);
                inner.recompute();
                inner.event_bus.emit(EngineEvent::DataLoad(inner.rows.clone()));
                inner.persist();
                Ok(())
            }
            Err(err) => {
                inner.load_state.error = Some(err.to_string());
                inner.event_bus.emit(EngineEvent::DataError(err.to_string()));
                Err(err)
            }
        }
    }
}

/// The engine a host constructs and owns. Derefs to [`EngineHandle`], which
/// carries the actual method set — `Engine` exists as the distinct,
/// non-plugin-facing owner type.
pub struct Engine<T> {
    handle: EngineHandle<T>,
}

impl<T> std::ops::Deref for Engine<T> {
    type Target = EngineHandle<T>;

    fn deref(&self) -> &EngineHandle<T> {
        &self.handle
    }
}

impl<T: Clone> Engine<T> {
    /// Validates `options` and constructs a new engine, seeded from a
    /// persisted snapshot if `preserveState` is enabled and one exists.
    pub fn new(options: EngineOptions<T>) -> Result<Self, EngineError> {
        options.validate()?;

        let data_source = match (options.data_mode, &options.server_side) {
            (DataMode::Server, Some(config)) => Some(Arc::new(RemoteDataSource::new(config.clone()))),
            _ => None,
        };

        let sort_state = match options.sorting.mode {
            crate::config::SortMode::Multi => SortState::Multi(Vec::new()),
            crate::config::SortMode::Single => SortState::Single(None),
        };

        let inner = Inner {
            columns: options.columns,
            rows: Vec::new(),
            sort_state,
            filter_state: FilterState::default(),
            pagination: PaginationState::new(options.pagination.page_size),
            selection: SelectionManager::new(),
            load_state: LoadState::default(),
            projections: Projections::default(),
            event_bus: EventBus::new(),
            state_store: StateStore::new(Some(Box::new(InMemoryStore::default()))),
            plugin_host: PluginHost::new(),
            row_id: options.row_id,
            next_ordinal: 0,
            preserve_state: options.preserve_state,
            state_key: options.state_key,
            custom_comparators: options.custom_comparators,
            custom_filters: options.custom_filters,
            custom_formatters: options.custom_formatters,
            data_mode: options.data_mode,
            server_side: options.server_side,
            server_total: None,
            sorting_enabled: options.sorting.enabled,
            sort_mode: options.sorting.mode,
            filtering_enabled: options.filtering.enabled,
            global_search_enabled: options.filtering.global_search,
            case_sensitive: options.filtering.case_sensitive,
            pagination_enabled: options.pagination.enabled,
            selection_enabled: options.selection.enabled,
            selection_mode: options.selection.mode,
            destroyed: false,
        };

        let handle = EngineHandle {
            inner: Arc::new(Mutex::new(inner)),
            data_source,
        };

        {
            let mut guard = handle.lock();
            if guard.preserve_state {
                let key = guard.state_key.clone();
                if let Some(snapshot) = guard.state_store.load(&key) {
                    guard.apply_snapshot(snapshot);
                }
            }
            guard.recompute();
            guard.event_bus.emit(EngineEvent::Init);
        }

        Ok(Engine { handle })
    }

    pub fn handle(&self) -> EngineHandle<T> {
        self.handle.clone()
    }
}
