//! C6 — Data Source: abstracts local (in-memory) vs remote (HTTP) row
//! sourcing. Remote mode defers filter/sort/page to a server and accepts a
//! configurable response transform.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering as AtomicOrdering};
use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::{error, info};

use crate::error::EngineError;
use crate::types::{Filter, FilterState, HttpMethod, SortState};

/// Static configuration for the remote transport.
#[derive(Clone)]
pub struct ServerSideConfig {
    pub url: String,
    pub method: HttpMethod,
    pub headers: HashMap<String, String>,
    pub params: HashMap<String, String>,
    pub data_path: String,
    pub total_path: String,
    pub transformer: Option<ResponseTransformer>,
}

impl Default for ServerSideConfig {
    fn default() -> Self {
        ServerSideConfig {
            url: String::new(),
            method: HttpMethod::Get,
            headers: HashMap::new(),
            params: HashMap::new(),
            data_path: "data".to_string(),
            total_path: "total".to_string(),
            transformer: None,
        }
    }
}

/// A response mapper returning `{data, total}` from the raw response body.
/// Defaults to `body[data_path] ?? body` / `body[total_path] ?? data.len()`.
pub type ResponseTransformer = Arc<dyn Fn(&Value) -> (Value, Option<u64>) + Send + Sync>;

/// The request parameters built from current facade state, before being
/// serialized into a query string or JSON body.
#[derive(Debug, Clone)]
pub struct ReloadRequest {
    pub page: usize,
    pub page_size: usize,
    pub sort: SortState,
    pub filters: FilterState,
    pub static_params: HashMap<String, String>,
}

impl ReloadRequest {
    /// Flattens into the `page`, `pageSize`, (`sortBy`,`sortDir`) or
    /// `sort=[...]`, `filters=[...]`, `search=<string>` shape described for
    /// both GET query strings and POST bodies.
    pub fn to_json(&self) -> Value {
        let mut obj = serde_json::Map::new();
        obj.insert("page".into(), Value::from(self.page));
        obj.insert("pageSize".into(), Value::from(self.page_size));

        match &self.sort {
            crate::types::SortState::Single(Some(key)) => {
                obj.insert("sortBy".into(), Value::from(key.column_id.0.clone()));
                obj.insert(
                    "sortDir".into(),
                    Value::from(match key.direction {
                        crate::types::SortDirection::Asc => "asc",
                        crate::types::SortDirection::Desc => "desc",
                    }),
                );
            }
            crate::types::SortState::Single(None) => {}
            crate::types::SortState::Multi(keys) => {
                obj.insert("sort".into(), serde_json::to_value(keys).unwrap_or(Value::Array(vec![])));
            }
        }

        obj.insert("filters".into(), serde_json::to_value(&self.filters.filters).unwrap_or(Value::Array(vec![])));
        obj.insert("search".into(), Value::from(self.filters.global_search.clone()));

        for (k, v) in &self.static_params {
            obj.insert(k.clone(), Value::from(v.clone()));
        }

        Value::Object(obj)
    }

    fn query_pairs(&self) -> Vec<(String, String)> {
        let mut pairs = Vec::new();
        if let Value::Object(obj) = self.to_json() {
            for (k, v) in obj {
                let s = match v {
                    Value::String(s) => s,
                    other => other.to_string(),
                };
                pairs.push((k, s));
            }
        }
        pairs
    }
}

/// Drives remote reloads and guarantees that only the latest-initiated
/// request's result is ever applied, even if an older request's response
/// arrives later — the async analogue of "cancel or sequence older ones"
/// described for concurrent reload invocations.
pub struct RemoteDataSource {
    config: ServerSideConfig,
    client: reqwest::Client,
    generation: AtomicU64,
}

/// Outcome of a completed reload attempt, already filtered for staleness
/// by [`RemoteDataSource::reload`] — a stale response never reaches the
/// caller at all.
pub struct ReloadOutcome<T> {
    pub rows: Vec<T>,
    pub total: usize,
}

impl RemoteDataSource {
    pub fn new(config: ServerSideConfig) -> Self {
        RemoteDataSource {
            config,
            client: reqwest::Client::new(),
            generation: AtomicU64::new(0),
        }
    }

    /// Issues a request for `request` and returns the parsed rows/total, or
    /// `Ok(None)` when a newer `reload` was dispatched before this one
    /// completed (the response is dropped, per the race-safety contract).
    pub async fn reload<T: DeserializeOwned>(&self, request: &ReloadRequest) -> Result<Option<ReloadOutcome<T>>, EngineError> {
        let my_generation = self.generation.fetch_add(1, AtomicOrdering::SeqCst) + 1;

        let result = self.dispatch(request).await;

        // A newer reload was issued while this one was in flight; drop the
        // result silently, matching "an aborted or superseded request must
        // neither update state nor emit success events."
        if self.generation.load(AtomicOrdering::SeqCst) != my_generation {
            info!(target: "datatable::data_source", "dropping stale reload response (generation {my_generation})");
            return Ok(None);
        }

        let body = result?;
        let (data_value, total_hint) = match &self.config.transformer {
            Some(transform) => transform(&body),
            None => default_transform(&body, &self.config.data_path, &self.config.total_path),
        };

        let rows: Vec<T> = serde_json::from_value(data_value).map_err(|e| EngineError::Transport(e.to_string()))?;
        let total = total_hint.map(|t| t as usize).unwrap_or(rows.len());

        Ok(Some(ReloadOutcome { rows, total }))
    }

    async fn dispatch(&self, request: &ReloadRequest) -> Result<Value, EngineError> {
        let mut builder = match self.config.method {
            HttpMethod::Get => {
                let pairs = request.query_pairs();
                self.client.get(&self.config.url).query(&pairs)
            }
            HttpMethod::Post => self.client.post(&self.config.url).json(&request.to_json()),
        };

        for (k, v) in &self.config.headers {
            builder = builder.header(k, v);
        }
        for (k, v) in &self.config.params {
            builder = builder.query(&[(k, v)]);
        }

        let response = builder.send().await.map_err(|e| {
            error!(target: "datatable::data_source", error = %e, "remote reload transport failure");
            EngineError::Transport(e.to_string())
        })?;

        if !response.status().is_success() {
            let status = response.status();
            error!(target: "datatable::data_source", %status, "remote reload returned non-success status");
            return Err(EngineError::Transport(format!("HTTP {status}")));
        }

        response.json::<Value>().await.map_err(|e| {
            error!(target: "datatable::data_source", error = %e, "remote reload returned unparsable body");
            EngineError::Transport(e.to_string())
        })
    }
}

/// `{data: body.data ?? body, total: body.total ?? |data|}`.
fn default_transform(body: &Value, data_path: &str, total_path: &str) -> (Value, Option<u64>) {
    let data = body.get(data_path).cloned().unwrap_or_else(|| body.clone());
    let total = body.get(total_path).and_then(Value::as_u64);
    (data, total)
}

/// Builds the parameter set a facade `reload` call would assemble from
/// current state, before a [`RemoteDataSource`] dispatches it.
pub fn build_request(
    page: usize,
    page_size: usize,
    sort: SortState,
    filters: &[Filter],
    global_search: &str,
    static_params: HashMap<String, String>,
) -> ReloadRequest {
    ReloadRequest {
        page,
        page_size,
        sort,
        filters: FilterState {
            filters: filters.to_vec(),
            global_search: global_search.to_string(),
        },
        static_params,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::SortDirection;

    #[test]
    fn default_transform_falls_back_to_whole_body() {
        let body = serde_json::json!([{"id": 1}, {"id": 2}]);
        let (data, total) = default_transform(&body, "data", "total");
        assert_eq!(data, body);
        assert_eq!(total, None);
    }

    #[test]
    fn default_transform_reads_named_paths() {
        let body = serde_json::json!({"data": [{"id": 1}], "total": 42});
        let (data, total) = default_transform(&body, "data", "total");
        assert_eq!(data, serde_json::json!([{"id": 1}]));
        assert_eq!(total, Some(42));
    }

    #[test]
    fn request_json_includes_single_sort_key() {
        let request = build_request(
            0,
            10,
            SortState::Single(Some(crate::types::SortKey {
                column_id: "name".into(),
                direction: SortDirection::Asc,
            })),
            &[],
            "",
            HashMap::new(),
        );
        let json = request.to_json();
        assert_eq!(json["sortBy"], "name");
        assert_eq!(json["sortDir"], "asc");
    }
}
