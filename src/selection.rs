//! C7 — Selection Manager: tracks selected row ids and the "all/partial"
//! aggregate flags under the current visible projection.

use std::collections::HashSet;

use crate::types::{Row, RowId, SelectionState};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SelectionMode {
    Single,
    Multiple,
}

/// Pure selection-bookkeeping operations. Holds no row data itself — the
/// facade calls these against its authoritative and visible row slices so
/// there is exactly one place that owns `selected_ids`.
#[derive(Debug, Default)]
pub struct SelectionManager {
    pub selected_ids: HashSet<RowId>,
}

impl SelectionManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Marks `id` selected. In single-select mode, any prior selection is
    /// cleared first. Rows with `disabled=true` cannot be selected; the
    /// caller passes `disabled` after looking up the row.
    pub fn select_row<T>(&mut self, rows: &mut [Row<T>], id: &RowId, mode: SelectionMode) {
        let Some(row) = rows.iter_mut().find(|r| &r.id == id) else {
            return;
        };
        if row.disabled {
            return;
        }

        if mode == SelectionMode::Single {
            self.selected_ids.clear();
            for r in rows.iter_mut() {
                r.selected = false;
            }
            let row = rows.iter_mut().find(|r| &r.id == id).unwrap();
            row.selected = true;
        } else {
            row.selected = true;
        }
        self.selected_ids.insert(id.clone());
    }

    pub fn deselect_row<T>(&mut self, rows: &mut [Row<T>], id: &RowId) {
        self.selected_ids.remove(id);
        if let Some(row) = rows.iter_mut().find(|r| &r.id == id) {
            row.selected = false;
        }
    }

    pub fn toggle_row<T>(&mut self, rows: &mut [Row<T>], id: &RowId, mode: SelectionMode) {
        if self.selected_ids.contains(id) {
            self.deselect_row(rows, id);
        } else {
            self.select_row(rows, id, mode);
        }
    }

    /// Selects every non-disabled row among `visible_ids`. Multi-select
    /// only; callers gate this on `mode == Multiple` before calling.
    pub fn select_all<T>(&mut self, rows: &mut [Row<T>], visible_ids: &[RowId]) {
        let visible: HashSet<&RowId> = visible_ids.iter().collect();
        for row in rows.iter_mut() {
            if visible.contains(&row.id) && !row.disabled {
                row.selected = true;
                self.selected_ids.insert(row.id.clone());
            }
        }
    }

    pub fn deselect_all<T>(&mut self, rows: &mut [Row<T>]) {
        self.selected_ids.clear();
        for row in rows.iter_mut() {
            row.selected = false;
        }
    }

    /// Drops any selected id no longer present in `rows` — called after
    /// `setData`, `deleteRow`, `clearData`.
    pub fn reconcile<T>(&mut self, rows: &[Row<T>]) {
        let present: HashSet<&RowId> = rows.iter().map(|r| &r.id).collect();
        self.selected_ids.retain(|id| present.contains(id));
    }

    /// Recomputes `all_selected`/`partially_selected` against the supplied
    /// visible (non-disabled-aware) row slice.
    pub fn state<T>(&self, visible_rows: &[&Row<T>]) -> SelectionState {
        let non_disabled: Vec<&&Row<T>> = visible_rows.iter().filter(|r| !r.disabled).collect();
        let selected_visible = non_disabled.iter().filter(|r| self.selected_ids.contains(&r.id)).count();

        let all_selected = !non_disabled.is_empty() && selected_visible == non_disabled.len();
        let partially_selected = selected_visible > 0 && selected_visible < non_disabled.len();

        SelectionState {
            selected_ids: self.selected_ids.clone(),
            all_selected,
            partially_selected,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rows() -> Vec<Row<i32>> {
        (1..=5).map(|n| Row::new(RowId(n.to_string()), n)).collect()
    }

    #[test]
    fn single_select_mode_clears_prior_selection() {
        let mut mgr = SelectionManager::new();
        let mut rows = rows();
        mgr.select_row(&mut rows, &RowId::from("1"), SelectionMode::Single);
        mgr.select_row(&mut rows, &RowId::from("2"), SelectionMode::Single);
        assert_eq!(mgr.selected_ids.len(), 1);
        assert!(mgr.selected_ids.contains(&RowId::from("2")));
        assert!(!rows[0].selected);
        assert!(rows[1].selected);
    }

    #[test]
    fn disabled_rows_cannot_be_selected() {
        let mut mgr = SelectionManager::new();
        let mut rows = rows();
        rows[0].disabled = true;
        mgr.select_row(&mut rows, &RowId::from("1"), SelectionMode::Multiple);
        assert!(mgr.selected_ids.is_empty());
    }

    #[test]
    fn reconcile_drops_ids_no_longer_present() {
        let mut mgr = SelectionManager::new();
        let mut rows = rows();
        mgr.select_row(&mut rows, &RowId::from("1"), SelectionMode::Multiple);
        mgr.select_row(&mut rows, &RowId::from("2"), SelectionMode::Multiple);

        let remaining: Vec<Row<i32>> = rows.into_iter().filter(|r| r.id != RowId::from("1")).collect();
        mgr.reconcile(&remaining);
        assert_eq!(mgr.selected_ids, HashSet::from([RowId::from("2")]));
    }

    #[test]
    fn selection_survives_filter_and_all_selected_reflects_visible_only() {
        let mut mgr = SelectionManager::new();
        let mut rows = rows();
        for id in ["1", "2", "3", "4", "5"] {
            mgr.select_row(&mut rows, &RowId::from(id), SelectionMode::Multiple);
        }
        assert_eq!(mgr.selected_ids.len(), 5);

        // simulate a filter that hides 3 rows, leaving ids 1 and 2 visible
        let visible: Vec<&Row<i32>> = rows.iter().filter(|r| r.id == RowId::from("1") || r.id == RowId::from("2")).collect();
        let state = mgr.state(&visible);
        assert_eq!(state.selected_ids.len(), 5);
        assert!(state.all_selected);

        // clearing the filter restores the full visible set
        let all_visible: Vec<&Row<i32>> = rows.iter().collect();
        let state = mgr.state(&all_visible);
        assert!(state.all_selected);
    }
}
