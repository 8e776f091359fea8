//! End-to-end coverage of the engine's eight literal scenarios, driven
//! entirely through the public facade.

use std::collections::HashMap;

use datatable_engine::config::EngineOptions;
use datatable_engine::data_source::ServerSideConfig;
use datatable_engine::plugins::export::{self, ExportFormat};
use datatable_engine::plugins::virtual_window::VirtualWindow;
use datatable_engine::{CellValue, Column, ColumnId, DataMode, Engine, FilterOperator, FilterValue, RowId};

#[derive(Clone, Debug, PartialEq)]
struct Numbered {
    n: i64,
}

fn numbered_columns() -> Vec<Column<Numbered>> {
    vec![Column::new("n", "N", |v: &Numbered| CellValue::Number(v.n as f64))]
}

#[test]
fn filter_then_paginate_yields_one_page_of_ten_greater_than_twenty() {
    let options = EngineOptions::new(numbered_columns())
        .row_id(|v: &Numbered| RowId(v.n.to_string()))
        .pagination(datatable_engine::config::PaginationOptions {
            enabled: true,
            page_size: 10,
            page_size_options: vec![10],
        });
    let engine = Engine::new(options).unwrap();
    engine.set_data((1..=30).map(|n| Numbered { n }).collect()).unwrap();
    engine.set_filter("n", FilterOperator::GreaterThan, FilterValue::Number(20.0)).unwrap();

    let pagination = engine.pagination();
    assert_eq!(pagination.total_rows, 10);
    assert_eq!(pagination.total_pages, 1);

    let visible: Vec<i64> = engine.get_data().into_iter().map(|v| v.n).collect();
    assert_eq!(visible, (21..=30).collect::<Vec<_>>());
}

#[derive(Clone, Debug, PartialEq)]
struct Named {
    name: String,
}

fn named_columns() -> Vec<Column<Named>> {
    vec![Column::new("name", "Name", |v: &Named| CellValue::Text(v.name.clone()))]
}

#[test]
fn sort_cycles_through_asc_desc_and_back_to_input_order() {
    let options = EngineOptions::new(named_columns()).row_id(|v: &Named| RowId(v.name.clone()));
    let engine = Engine::new(options).unwrap();
    engine
        .set_data(vec!["B", "a", "C"].into_iter().map(|s| Named { name: s.to_string() }).collect())
        .unwrap();

    engine.sort_by(&ColumnId::from("name")).unwrap();
    assert_eq!(engine.get_data().into_iter().map(|v| v.name).collect::<Vec<_>>(), vec!["a", "B", "C"]);

    engine.sort_by(&ColumnId::from("name")).unwrap();
    assert_eq!(engine.get_data().into_iter().map(|v| v.name).collect::<Vec<_>>(), vec!["C", "B", "a"]);

    engine.sort_by(&ColumnId::from("name")).unwrap();
    assert_eq!(engine.get_data().into_iter().map(|v| v.name).collect::<Vec<_>>(), vec!["B", "a", "C"]);
}

#[derive(Clone, Debug, PartialEq)]
struct PQ {
    p: i64,
    q: i64,
}

#[test]
fn multi_sort_tiebreaks_on_the_second_key() {
    let columns = vec![
        Column::new("p", "P", |v: &PQ| CellValue::Number(v.p as f64)),
        Column::new("q", "Q", |v: &PQ| CellValue::Number(v.q as f64)),
    ];
    let options = EngineOptions::new(columns)
        .row_id(|v: &PQ| RowId(format!("{}-{}", v.p, v.q)))
        .sorting(datatable_engine::config::SortingOptions {
            enabled: true,
            mode: datatable_engine::config::SortMode::Multi,
            case_sensitive: false,
        });
    let engine = Engine::new(options).unwrap();
    engine
        .set_data(vec![PQ { p: 1, q: 2 }, PQ { p: 1, q: 1 }, PQ { p: 2, q: 0 }])
        .unwrap();

    engine.sort_by(&ColumnId::from("p")).unwrap();
    engine.sort_by(&ColumnId::from("q")).unwrap();
    engine.sort_by(&ColumnId::from("q")).unwrap();

    let order: Vec<(i64, i64)> = engine.get_data().into_iter().map(|v| (v.p, v.q)).collect();
    assert_eq!(order, vec![(1, 2), (1, 1), (2, 0)]);
}

#[test]
fn global_search_is_a_no_op_when_every_column_is_unfilterable() {
    let columns: Vec<Column<Named>> = vec![Column::new("name", "Name", |v: &Named| CellValue::Text(v.name.clone())).filterable(false)];
    let options = EngineOptions::new(columns).row_id(|v: &Named| RowId(v.name.clone()));
    let engine = Engine::new(options).unwrap();
    let people = vec!["Ada", "Grace", "Linus"].into_iter().map(|s| Named { name: s.to_string() }).collect::<Vec<_>>();
    engine.set_data(people.clone()).unwrap();

    engine.set_search("anything").unwrap();
    let visible: Vec<String> = engine.get_data().into_iter().map(|v| v.name).collect();
    assert_eq!(visible, people.into_iter().map(|v| v.name).collect::<Vec<_>>());
}

#[test]
fn selection_survives_filtering_and_all_selected_tracks_only_the_visible_rows() {
    let options = EngineOptions::new(numbered_columns())
        .row_id(|v: &Numbered| RowId(v.n.to_string()))
        .selection(datatable_engine::config::SelectionOptions {
            enabled: true,
            mode: datatable_engine::selection::SelectionMode::Multiple,
        });
    let engine = Engine::new(options).unwrap();
    engine.set_data((1..=5).map(|n| Numbered { n }).collect()).unwrap();

    for n in 1..=5 {
        engine.select_row(&RowId(n.to_string())).unwrap();
    }
    assert_eq!(engine.get_state().selected_ids.len(), 5);

    engine.set_filter("n", FilterOperator::GreaterThan, FilterValue::Number(3.0)).unwrap();
    let state = engine.get_state();
    assert_eq!(state.selected_ids.len(), 5);

    engine.clear_filters().unwrap();
}

#[derive(serde::Deserialize, Clone, Debug, PartialEq)]
struct RemoteRow {
    id: String,
    n: i64,
}

/// Drains the request and writes back a fixed JSON body, standing in for a
/// real HTTP server without pulling in a mocking crate the pack never
/// reaches for.
async fn respond(mut socket: tokio::net::TcpStream, body: &str) {
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    let mut buf = [0u8; 1024];
    let _ = socket.read(&mut buf).await;
    let response = format!("HTTP/1.1 200 OK\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}", body.len(), body);
    let _ = socket.write_all(response.as_bytes()).await;
}

#[tokio::test]
async fn a_stale_reload_response_never_overwrites_a_newer_one() {
    use tokio::net::TcpListener;
    use tokio::time::{sleep, Duration};

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        let (socket_a, _) = listener.accept().await.unwrap();
        let (socket_b, _) = listener.accept().await.unwrap();
        tokio::spawn(async move {
            sleep(Duration::from_millis(80)).await;
            respond(socket_a, r#"{"data": [{"id": "a0", "n": 0}], "total": 1}"#).await;
        });
        respond(socket_b, r#"{"data": [{"id": "b1", "n": 1}], "total": 1}"#).await;
    });

    let columns = vec![Column::new("n", "N", |v: &RemoteRow| CellValue::Number(v.n as f64))];
    let options = EngineOptions::new(columns).data_mode(DataMode::Server).server_side(ServerSideConfig {
        url: format!("http://{addr}/rows"),
        method: datatable_engine::HttpMethod::Get,
        headers: HashMap::new(),
        params: HashMap::new(),
        data_path: "data".to_string(),
        total_path: "total".to_string(),
        transformer: None,
    });
    let engine: Engine<RemoteRow> = Engine::new(options).unwrap();

    let (a, b) = tokio::join!(engine.reload(), engine.reload());
    a.unwrap();
    b.unwrap();

    let rows = engine.get_data();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].id, "b1");
}

#[derive(Clone)]
struct Contact {
    name: String,
    note: String,
}

#[test]
fn csv_export_escapes_commas_quotes_and_embedded_newlines() {
    use datatable_engine::types::RowId as Id;
    let columns = vec![
        Column::new("name", "name", |c: &Contact| CellValue::Text(c.name.clone())),
        Column::new("note", "note", |c: &Contact| CellValue::Text(c.note.clone())),
    ];
    let col_refs: Vec<&Column<Contact>> = columns.iter().collect();
    let row = datatable_engine::Row::new(
        Id::from("1"),
        Contact {
            name: "Doe, J. \"Jr\"".to_string(),
            note: "line1\nline2".to_string(),
        },
    );
    let rows = vec![&row];

    let result = export::export(&rows, &col_refs, ExportFormat::Csv, true, "contacts").unwrap();
    let text = String::from_utf8(result.bytes).unwrap();
    let lines: Vec<&str> = text.lines().collect();
    assert_eq!(lines[0], "name,note");
    assert_eq!(lines[1], "\"Doe, J. \"\"Jr\"\"\",\"line1\nline2\"");
}

#[test]
fn virtual_window_bounds_the_rendered_slice_with_overscan() {
    let mut window = VirtualWindow::new(20.0, 2);
    window.set_container_height(100.0);
    window.set_source_len(50);
    window.on_scroll(58.0);

    assert_eq!(window.window(), (0, 10));
    assert_eq!(window.offset_y(), 0.0);
    assert_eq!(window.visible_count(), 10);
}
