//! C2 — State Store: persists a UI-facing engine snapshot (sort, filter,
//! pagination, selection, and hidden-column overrides) under a string key
//! in a best-effort key-value store, round-tripping the set/map/timestamp
//! values that aren't directly JSON-native.
//!
//! The authoritative row collection and column closures are not part of
//! the snapshot — closures aren't serializable, and row data is normally
//! re-fetched rather than persisted alongside UI state.

use std::collections::{HashMap, HashSet};

use chrono::{DateTime, Utc};
use serde_json::{json, Value};
use tracing::{error, warn};

use crate::error::EngineError;
use crate::types::{ColumnId, FilterState, RowId, SortState};

/// Best-effort backing store. Implementations may be in-memory, a file, a
/// browser storage facility, or a remote cache — the engine assumes no
/// concurrent writers under the same key ("last write wins").
pub trait KeyValueStore: Send + Sync {
    fn save(&mut self, key: &str, value: String) -> Result<(), String>;
    fn load(&self, key: &str) -> Result<Option<String>, String>;
    fn remove(&mut self, key: &str) -> Result<(), String>;
    fn clear(&mut self) -> Result<(), String>;
}

/// Default backing store for hosts with no persistence layer of their own,
/// and for tests.
#[derive(Debug, Default)]
pub struct InMemoryStore {
    entries: HashMap<String, String>,
}

impl KeyValueStore for InMemoryStore {
    fn save(&mut self, key: &str, value: String) -> Result<(), String> {
        self.entries.insert(key.to_string(), value);
        Ok(())
    }

    fn load(&self, key: &str) -> Result<Option<String>, String> {
        Ok(self.entries.get(key).cloned())
    }

    fn remove(&mut self, key: &str) -> Result<(), String> {
        self.entries.remove(key);
        Ok(())
    }

    fn clear(&mut self) -> Result<(), String> {
        self.entries.clear();
        Ok(())
    }
}

/// The serializable subset of [`crate::types::EngineState`] persisted by
/// the state store: sort/filter/pagination/selection plus which columns
/// the user has hidden. Uses the closed `Set`/`Map`/`Date` reviver tags.
#[derive(Debug, Clone, PartialEq)]
pub struct StateSnapshot {
    pub sort_state: SortState,
    pub filter_state: FilterState,
    pub page_index: usize,
    pub page_size: usize,
    pub selected_ids: HashSet<RowId>,
    pub hidden_columns: Vec<ColumnId>,
    pub last_fetch: Option<DateTime<Utc>>,
}

impl StateSnapshot {
    fn to_json(&self) -> Value {
        let sort_json = serde_json::to_value(&self.sort_state).unwrap_or(Value::Null);
        let filter_json = serde_json::to_value(&self.filter_state).unwrap_or(Value::Null);

        let selected_ids_json = json!({
            "tag": "Set",
            "values": self.selected_ids.iter().map(|id| id.0.clone()).collect::<Vec<_>>(),
        });

        let hidden_columns_json = json!({
            "tag": "Map",
            "entries": self.hidden_columns.iter().map(|c| json!([c.0.clone(), true])).collect::<Vec<_>>(),
        });

        let last_fetch_json = match &self.last_fetch {
            Some(ts) => json!({ "tag": "Date", "iso": ts.to_rfc3339() }),
            None => Value::Null,
        };

        json!({
            "sortState": sort_json,
            "filterState": filter_json,
            "pageIndex": self.page_index,
            "pageSize": self.page_size,
            "selectedIds": selected_ids_json,
            "hiddenColumns": hidden_columns_json,
            "lastFetch": last_fetch_json,
        })
    }

    fn from_json(value: &Value) -> Result<Self, EngineError> {
        let obj = value.as_object().ok_or_else(|| EngineError::Persistence("snapshot is not an object".into()))?;

        let sort_state: SortState = obj
            .get("sortState")
            .map(|v| serde_json::from_value(v.clone()))
            .transpose()
            .map_err(|e| EngineError::Persistence(e.to_string()))?
            .unwrap_or_default();

        let filter_state: FilterState = obj
            .get("filterState")
            .map(|v| serde_json::from_value(v.clone()))
            .transpose()
            .map_err(|e| EngineError::Persistence(e.to_string()))?
            .unwrap_or_default();

        let page_index = obj.get("pageIndex").and_then(Value::as_u64).unwrap_or(0) as usize;
        let page_size = obj.get("pageSize").and_then(Value::as_u64).unwrap_or(10) as usize;

        let selected_ids = match obj.get("selectedIds") {
            Some(v) => decode_set(v)?.into_iter().map(RowId).collect(),
            None => HashSet::new(),
        };

        let hidden_columns = match obj.get("hiddenColumns") {
            Some(v) => decode_map(v)?.into_iter().map(|(k, _)| ColumnId(k)).collect(),
            None => Vec::new(),
        };

        let last_fetch = match obj.get("lastFetch") {
            Some(Value::Null) | None => None,
            Some(v) => Some(decode_date(v)?),
        };

        Ok(StateSnapshot {
            sort_state,
            filter_state,
            page_index,
            page_size,
            selected_ids,
            hidden_columns,
            last_fetch,
        })
    }
}

fn decode_set(v: &Value) -> Result<Vec<String>, EngineError> {
    let obj = v.as_object().ok_or_else(|| EngineError::Persistence("expected tagged Set".into()))?;
    match obj.get("tag").and_then(Value::as_str) {
        Some("Set") => {}
        other => return Err(EngineError::Persistence(format!("unrecognized tag for Set field: {other:?}"))),
    }
    let values = obj
        .get("values")
        .and_then(Value::as_array)
        .ok_or_else(|| EngineError::Persistence("Set tag missing values array".into()))?;
    values
        .iter()
        .map(|v| v.as_str().map(|s| s.to_string()).ok_or_else(|| EngineError::Persistence("Set value is not a string".into())))
        .collect()
}

fn decode_map(v: &Value) -> Result<Vec<(String, Value)>, EngineError> {
    let obj = v.as_object().ok_or_else(|| EngineError::Persistence("expected tagged Map".into()))?;
    match obj.get("tag").and_then(Value::as_str) {
        Some("Map") => {}
        other => return Err(EngineError::Persistence(format!("unrecognized tag for Map field: {other:?}"))),
    }
    let entries = obj
        .get("entries")
        .and_then(Value::as_array)
        .ok_or_else(|| EngineError::Persistence("Map tag missing entries array".into()))?;
    entries
        .iter()
        .map(|entry| {
            let pair = entry.as_array().ok_or_else(|| EngineError::Persistence("Map entry is not a pair".into()))?;
            let key = pair.first().and_then(Value::as_str).ok_or_else(|| EngineError::Persistence("Map entry key is not a string".into()))?;
            let val = pair.get(1).cloned().unwrap_or(Value::Null);
            Ok((key.to_string(), val))
        })
        .collect()
}

fn decode_date(v: &Value) -> Result<DateTime<Utc>, EngineError> {
    let obj = v.as_object().ok_or_else(|| EngineError::Persistence("expected tagged Date".into()))?;
    match obj.get("tag").and_then(Value::as_str) {
        Some("Date") => {}
        other => return Err(EngineError::Persistence(format!("unrecognized tag for Date field: {other:?}"))),
    }
    let iso = obj.get("iso").and_then(Value::as_str).ok_or_else(|| EngineError::Persistence("Date tag missing iso field".into()))?;
    DateTime::parse_from_rfc3339(iso)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| EngineError::Persistence(e.to_string()))
}

/// Facade-facing wrapper around a [`KeyValueStore`]. Every failure mode
/// (no backing store configured, serialization failure, malformed
/// snapshot) is logged and surfaced as "no state available" rather than
/// propagated — persistence is advisory.
pub struct StateStore {
    backend: Option<Box<dyn KeyValueStore>>,
}

impl StateStore {
    pub fn new(backend: Option<Box<dyn KeyValueStore>>) -> Self {
        StateStore { backend }
    }

    pub fn save(&mut self, key: &str, snapshot: &StateSnapshot) {
        let Some(backend) = self.backend.as_mut() else {
            warn!(target: "datatable::state_store", "no backing store configured, snapshot dropped");
            return;
        };
        let serialized = snapshot.to_json().to_string();
        if let Err(err) = backend.save(key, serialized) {
            error!(target: "datatable::state_store", %err, "failed to persist state snapshot");
        }
    }

    pub fn load(&self, key: &str) -> Option<StateSnapshot> {
        let backend = self.backend.as_ref()?;
        let raw = match backend.load(key) {
            Ok(Some(raw)) => raw,
            Ok(None) => return None,
            Err(err) => {
                error!(target: "datatable::state_store", %err, "failed to read state snapshot");
                return None;
            }
        };
        let value: Value = match serde_json::from_str(&raw) {
            Ok(v) => v,
            Err(err) => {
                error!(target: "datatable::state_store", %err, "state snapshot is not valid JSON");
                return None;
            }
        };
        match StateSnapshot::from_json(&value) {
            Ok(snapshot) => Some(snapshot),
            Err(err) => {
                error!(target: "datatable::state_store", %err, "state snapshot could not be decoded");
                None
            }
        }
    }

    pub fn remove(&mut self, key: &str) {
        if let Some(backend) = self.backend.as_mut() {
            if let Err(err) = backend.remove(key) {
                error!(target: "datatable::state_store", %err, "failed to remove state snapshot");
            }
        }
    }

    pub fn clear(&mut self) {
        if let Some(backend) = self.backend.as_mut() {
            if let Err(err) = backend.clear() {
                error!(target: "datatable::state_store", %err, "failed to clear state store");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Filter, FilterOperator, FilterValue, SortDirection, SortKey};

    fn sample_snapshot() -> StateSnapshot {
        StateSnapshot {
            sort_state: SortState::Single(Some(SortKey {
                column_id: "name".into(),
                direction: SortDirection::Asc,
            })),
            filter_state: FilterState {
                filters: vec![Filter::new("n", FilterOperator::GreaterThan, FilterValue::Number(1.0)).unwrap()],
                global_search: "needle".into(),
            },
            page_index: 2,
            page_size: 25,
            selected_ids: HashSet::from([RowId::from("a"), RowId::from("b")]),
            hidden_columns: vec![ColumnId::from("internal")],
            last_fetch: Some(DateTime::parse_from_rfc3339("2024-06-01T12:00:00Z").unwrap().with_timezone(&Utc)),
        }
    }

    #[test]
    fn round_trips_through_the_in_memory_store() {
        let mut store = StateStore::new(Some(Box::new(InMemoryStore::default())));
        let snapshot = sample_snapshot();
        store.save("datatable-state", &snapshot);
        let loaded = store.load("datatable-state").expect("snapshot should round-trip");
        assert_eq!(loaded, snapshot);
    }

    #[test]
    fn missing_backend_yields_none_without_panicking() {
        let store = StateStore::new(None);
        assert!(store.load("anything").is_none());
    }

    #[test]
    fn unrecognized_tag_is_a_persistence_failure_not_a_panic() {
        let bad = json!({
            "sortState": {"Single": null},
            "filterState": {"filters": [], "globalSearch": ""},
            "pageIndex": 0,
            "pageSize": 10,
            "selectedIds": {"tag": "Bag", "values": []},
            "hiddenColumns": {"tag": "Map", "entries": []},
            "lastFetch": null,
        });
        assert!(StateSnapshot::from_json(&bad).is_err());
    }
}
