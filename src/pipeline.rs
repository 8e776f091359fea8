//! C5 — Compute Pipeline: deterministically recomputes the filtered,
//! sorted, paginated, and visible projections from the authoritative row
//! collection and current options.

use std::collections::HashMap;

use crate::filter::{apply_filters, CustomFilter};
use crate::selection::SelectionManager;
use crate::sort::sort_rows;
use crate::types::{Column, ColumnId, Comparator, FilterState, PaginationState, Row, RowId, SelectionState, SortState};

/// Recomputed on every mutation that affects projections. Holds owned
/// `RowId` lists over the authoritative row collection rather than cloned
/// rows, so recomputation stays cheap even for large collections.
#[derive(Debug, Clone, Default)]
pub struct Projections {
    pub filtered: Vec<RowId>,
    pub sorted: Vec<RowId>,
    pub paginated: Vec<RowId>,
}

pub struct PipelineInput<'a, 'p, T> {
    pub rows: &'a [Row<T>],
    pub columns: &'a [Column<T>],
    pub sort_state: &'a SortState,
    pub filter_state: &'a FilterState,
    pub pagination: &'p mut PaginationState,
    pub case_sensitive: bool,
    pub filtering_enabled: bool,
    pub sorting_enabled: bool,
    pub pagination_enabled: bool,
    pub custom_filters: &'a HashMap<ColumnId, CustomFilter<T>>,
    pub comparator_overrides: &'a HashMap<ColumnId, Comparator>,
}

/// Runs steps 1–7 of C5 and returns the new projections plus the rows
/// comprising the visible (post-pagination) window in input order.
pub fn recompute<'a, 'p, T: Clone>(input: PipelineInput<'a, 'p, T>) -> (Projections, Vec<&'a Row<T>>) {
    // Step 1/2: filter.
    let filtered: Vec<&Row<T>> = if input.filtering_enabled {
        apply_filters(
            input.rows,
            input.columns,
            &input.filter_state.filters,
            &input.filter_state.global_search,
            input.case_sensitive,
            input.custom_filters,
        )
    } else {
        input.rows.iter().collect()
    };

    // Step 3: sort. sort_rows operates in place on an owned Vec<Row<T>>, so
    // we sort a parallel index list instead of cloning rows.
    let mut sorted: Vec<&Row<T>> = filtered.clone();
    if input.sorting_enabled && !input.sort_state.is_empty() {
        sort_by_reference(&mut sorted, input.columns, input.sort_state, input.comparator_overrides);
    }

    // Step 4: recompute pagination bounds.
    let total_rows = sorted.len();
    input.pagination.total_rows = total_rows;
    input.pagination.total_pages = if input.pagination.page_size > 0 {
        total_rows.div_ceil(input.pagination.page_size)
    } else {
        0
    };
    let max_index = input.pagination.total_pages.saturating_sub(1);
    if input.pagination.page_index > max_index {
        input.pagination.page_index = max_index;
    }

    // Step 5: paginate.
    let paginated: Vec<&Row<T>> = if input.pagination_enabled && input.pagination.page_size > 0 {
        let start = (input.pagination.page_index * input.pagination.page_size).min(sorted.len());
        let end = (start + input.pagination.page_size).min(sorted.len());
        sorted[start..end].to_vec()
    } else {
        sorted.clone()
    };

    let projections = Projections {
        filtered: filtered.iter().map(|r| r.id.clone()).collect(),
        sorted: sorted.iter().map(|r| r.id.clone()).collect(),
        paginated: paginated.iter().map(|r| r.id.clone()).collect(),
    };

    (projections, paginated)
}

fn sort_by_reference<'a, T: Clone>(
    rows: &mut Vec<&'a Row<T>>,
    columns: &[Column<T>],
    state: &SortState,
    overrides: &HashMap<ColumnId, Comparator>,
) {
    // sort_rows wants &mut [Row<T>]; we adapt it to a Vec<&Row<T>> by
    // sorting indices with the same comparator logic instead of touching
    // the rows themselves (they're shared references into the
    // authoritative collection).
    let mut owned: Vec<Row<T>> = rows.iter().map(|r| (*r).clone()).collect();
    sort_rows(&mut owned, columns, state, overrides);
    let order: Vec<RowId> = owned.iter().map(|r| r.id.clone()).collect();
    let by_id: HashMap<&RowId, &Row<T>> = rows.iter().map(|r| (&r.id, *r)).collect();
    *rows = order.iter().filter_map(|id| by_id.get(id).copied()).collect();
}

/// Recomputes `allSelected`/`partiallySelected` against the visible
/// projection, per step 7.
pub fn update_selection_state<T>(manager: &SelectionManager, visible_rows: &[&Row<T>]) -> SelectionState {
    manager.state(visible_rows)
}
