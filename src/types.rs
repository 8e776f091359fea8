//! Core data model: rows, columns, sort/filter/pagination/selection/load
//! state, and the dynamically-typed [`CellValue`] the filter and sort
//! engines reason about.

use std::cmp::Ordering;
use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A row identifier. Derived once at ingestion via the id-extractor
/// supplied to [`crate::facade::EngineOptions`]; compared by strict
/// equality and deduplicated when stored for selection.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RowId(pub String);

impl fmt::Display for RowId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for RowId {
    fn from(s: &str) -> Self {
        RowId(s.to_string())
    }
}

impl From<String> for RowId {
    fn from(s: String) -> Self {
        RowId(s)
    }
}

/// A column identifier, unique per table.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ColumnId(pub String);

impl fmt::Display for ColumnId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for ColumnId {
    fn from(s: &str) -> Self {
        ColumnId(s.to_string())
    }
}

impl From<String> for ColumnId {
    fn from(s: String) -> Self {
        ColumnId(s)
    }
}

/// A dynamically-typed cell value. Row payloads are opaque to the engine
/// (`T` is the host's concrete type); columns extract a `CellValue` from a
/// payload so the filter/sort engines have a closed, uniform type to
/// compare against instead of reaching into `T` directly.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum CellValue {
    Null,
    Bool(bool),
    Number(f64),
    Text(String),
    Timestamp(DateTime<Utc>),
}

impl CellValue {
    /// Whether this cell counts as empty for `isEmpty`/`isNotEmpty`.
    pub fn is_empty_value(&self) -> bool {
        match self {
            CellValue::Null => true,
            CellValue::Text(s) => s.is_empty(),
            _ => false,
        }
    }

    /// Coerce to a normalized string for string-mode comparisons.
    pub fn normalized(&self, case_sensitive: bool) -> String {
        let raw = match self {
            CellValue::Null => String::new(),
            CellValue::Bool(b) => b.to_string(),
            CellValue::Number(n) => format_number(*n),
            CellValue::Text(s) => s.clone(),
            CellValue::Timestamp(t) => t.to_rfc3339(),
        };
        if case_sensitive {
            raw
        } else {
            raw.to_lowercase()
        }
    }

    /// Attempt a numeric reading; non-numeric values coerce to 0.0, matching
    /// the relational-operator semantics in the filter engine.
    pub fn as_number_or_zero(&self) -> f64 {
        match self {
            CellValue::Number(n) => *n,
            CellValue::Bool(b) => {
                if *b {
                    1.0
                } else {
                    0.0
                }
            }
            CellValue::Text(s) => s.trim().parse::<f64>().unwrap_or(0.0),
            CellValue::Null => 0.0,
            CellValue::Timestamp(t) => t.timestamp_millis() as f64,
        }
    }
}

fn format_number(n: f64) -> String {
    if n.fract() == 0.0 && n.abs() < 1e15 {
        format!("{}", n as i64)
    } else {
        n.to_string()
    }
}

/// Accessor: pulls a [`CellValue`] out of a row payload for a given column.
pub type Accessor<T> = Arc<dyn Fn(&T) -> CellValue + Send + Sync>;

/// Formatter: renders a cell for export, given the extracted value and the
/// full payload (so formatters can reference sibling fields).
pub type Formatter<T> = Arc<dyn Fn(&CellValue, &T) -> String + Send + Sync>;

/// Comparator override for a column's sort behavior.
pub type Comparator = Arc<dyn Fn(&CellValue, &CellValue) -> Ordering + Send + Sync>;

/// A column definition.
#[derive(Clone)]
pub struct Column<T> {
    pub id: ColumnId,
    pub label: String,
    pub visible: bool,
    pub sortable: bool,
    pub filterable: bool,
    pub accessor: Accessor<T>,
    pub formatter: Option<Formatter<T>>,
    pub comparator: Option<Comparator>,
}

impl<T> fmt::Debug for Column<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Column")
            .field("id", &self.id)
            .field("label", &self.label)
            .field("visible", &self.visible)
            .field("sortable", &self.sortable)
            .field("filterable", &self.filterable)
            .finish_non_exhaustive()
    }
}

impl<T> Column<T> {
    /// Build a column with the given id/label and a field accessor.
    /// `visible`, `sortable`, `filterable` default to `true` per the spec.
    pub fn new(
        id: impl Into<ColumnId>,
        label: impl Into<String>,
        accessor: impl Fn(&T) -> CellValue + Send + Sync + 'static,
    ) -> Self {
        Column {
            id: id.into(),
            label: label.into(),
            visible: true,
            sortable: true,
            filterable: true,
            accessor: Arc::new(accessor),
            formatter: None,
            comparator: None,
        }
    }

    pub fn visible(mut self, visible: bool) -> Self {
        self.visible = visible;
        self
    }

    pub fn sortable(mut self, sortable: bool) -> Self {
        self.sortable = sortable;
        self
    }

    pub fn filterable(mut self, filterable: bool) -> Self {
        self.filterable = filterable;
        self
    }

    pub fn formatter(mut self, f: impl Fn(&CellValue, &T) -> String + Send + Sync + 'static) -> Self {
        self.formatter = Some(Arc::new(f));
        self
    }

    pub fn comparator(mut self, c: impl Fn(&CellValue, &CellValue) -> Ordering + Send + Sync + 'static) -> Self {
        self.comparator = Some(Arc::new(c));
        self
    }

    pub fn extract(&self, payload: &T) -> CellValue {
        (self.accessor)(payload)
    }
}

/// A single ingested row.
#[derive(Debug, Clone)]
pub struct Row<T> {
    pub id: RowId,
    pub payload: T,
    pub selected: bool,
    pub expanded: bool,
    pub disabled: bool,
}

impl<T> Row<T> {
    pub fn new(id: RowId, payload: T) -> Self {
        Row {
            id,
            payload,
            selected: false,
            expanded: false,
            disabled: false,
        }
    }
}

/// Sort direction. Unlike the source design's `asc | desc | null`, "no
/// sort" is represented by the absence of a [`SortKey`] rather than a third
/// direction value — see `SortState` below.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SortDirection {
    Asc,
    Desc,
}

impl SortDirection {
    pub fn sign(self) -> i32 {
        match self {
            SortDirection::Asc => 1,
            SortDirection::Desc => -1,
        }
    }

    /// `asc -> desc -> none` cycle step; `None` input starts the cycle.
    pub fn cycle(current: Option<SortDirection>) -> Option<SortDirection> {
        match current {
            None => Some(SortDirection::Asc),
            Some(SortDirection::Asc) => Some(SortDirection::Desc),
            Some(SortDirection::Desc) => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SortKey {
    pub column_id: ColumnId,
    pub direction: SortDirection,
}

/// `Single(None)` means no active sort. A sum type rather than an optional
/// list, so single/multi mode is never ambiguous at runtime.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum SortState {
    Single(Option<SortKey>),
    Multi(Vec<SortKey>),
}

impl Default for SortState {
    fn default() -> Self {
        SortState::Single(None)
    }
}

impl SortState {
    pub fn keys(&self) -> &[SortKey] {
        match self {
            SortState::Single(Some(k)) => std::slice::from_ref(k),
            SortState::Single(None) => &[],
            SortState::Multi(keys) => keys,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.keys().is_empty()
    }
}

/// The fourteen filter operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FilterOperator {
    Equals,
    NotEquals,
    Contains,
    NotContains,
    StartsWith,
    EndsWith,
    IsEmpty,
    IsNotEmpty,
    GreaterThan,
    GreaterThanOrEqual,
    LessThan,
    LessThanOrEqual,
    Between,
    In,
    NotIn,
}

impl FilterOperator {
    /// How many operand values this operator expects, for arity checking
    /// in [`Filter::new`].
    fn expects(self) -> ValueShape {
        use FilterOperator::*;
        match self {
            Equals | NotEquals | Contains | NotContains | StartsWith | EndsWith => ValueShape::Text,
            IsEmpty | IsNotEmpty => ValueShape::None,
            GreaterThan | GreaterThanOrEqual | LessThan | LessThanOrEqual => ValueShape::Number,
            Between => ValueShape::Range,
            In | NotIn => ValueShape::List,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ValueShape {
    None,
    Text,
    Number,
    Range,
    List,
}

/// The operand for a [`Filter`]. Variants line up with the arity each
/// [`FilterOperator`] expects.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum FilterValue {
    None,
    Text(String),
    Number(f64),
    Range(f64, f64),
    List(Vec<String>),
}

impl FilterValue {
    fn shape(&self) -> ValueShape {
        match self {
            FilterValue::None => ValueShape::None,
            FilterValue::Text(_) => ValueShape::Text,
            FilterValue::Number(_) => ValueShape::Number,
            FilterValue::Range(_, _) => ValueShape::Range,
            FilterValue::List(_) => ValueShape::List,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Filter {
    pub column_id: ColumnId,
    pub operator: FilterOperator,
    pub value: FilterValue,
}

impl Filter {
    /// Construct a filter, rejecting a value whose shape doesn't match the
    /// operator's arity (e.g. `between` without a `Range`).
    pub fn new(column_id: impl Into<ColumnId>, operator: FilterOperator, value: FilterValue) -> Result<Self, crate::error::EngineError> {
        let expected = operator.expects();
        if value.shape() != expected {
            return Err(crate::error::EngineError::InvalidFilter(format!(
                "{operator:?} expects {expected:?}, got {:?}",
                value.shape()
            )));
        }
        Ok(Filter {
            column_id: column_id.into(),
            operator,
            value,
        })
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FilterState {
    pub filters: Vec<Filter>,
    pub global_search: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PaginationState {
    pub page_index: usize,
    pub page_size: usize,
    pub total_rows: usize,
    pub total_pages: usize,
}

impl PaginationState {
    pub fn new(page_size: usize) -> Self {
        PaginationState {
            page_index: 0,
            page_size,
            total_rows: 0,
            total_pages: 0,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct SelectionState {
    pub selected_ids: HashSet<RowId>,
    pub all_selected: bool,
    pub partially_selected: bool,
}

#[derive(Debug, Clone, Default)]
pub struct LoadState {
    pub loading: bool,
    pub error: Option<String>,
    pub last_fetch: Option<DateTime<Utc>>,
}

/// Data source mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DataMode {
    Client,
    Server,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HttpMethod {
    Get,
    Post,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sort_direction_cycles_asc_desc_none() {
        assert_eq!(SortDirection::cycle(None), Some(SortDirection::Asc));
        assert_eq!(SortDirection::cycle(Some(SortDirection::Asc)), Some(SortDirection::Desc));
        assert_eq!(SortDirection::cycle(Some(SortDirection::Desc)), None);
    }

    #[test]
    fn filter_new_rejects_mismatched_arity() {
        assert!(Filter::new("n", FilterOperator::Between, FilterValue::Number(1.0)).is_err());
        assert!(Filter::new("n", FilterOperator::Between, FilterValue::Range(1.0, 2.0)).is_ok());
        assert!(Filter::new("n", FilterOperator::IsEmpty, FilterValue::None).is_ok());
        assert!(Filter::new("n", FilterOperator::In, FilterValue::List(vec!["a".into()])).is_ok());
    }

    #[test]
    fn cell_value_normalizes_case() {
        let v = CellValue::Text("Hello".to_string());
        assert_eq!(v.normalized(false), "hello");
        assert_eq!(v.normalized(true), "Hello");
    }

    #[test]
    fn cell_value_numeric_coercion_defaults_to_zero() {
        assert_eq!(CellValue::Text("not a number".into()).as_number_or_zero(), 0.0);
        assert_eq!(CellValue::Text("42".into()).as_number_or_zero(), 42.0);
    }
}
