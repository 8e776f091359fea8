//! C9.1 — Export plugin: renders a chosen row/column subset as CSV, JSON,
//! or aligned plain text.

use crate::types::{CellValue, Column, Row};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportScope {
    SelectedOnly,
    VisibleOnly,
    All,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportFormat {
    Csv,
    Json,
    PlainText,
    /// Reserved; unsupported without an extra library.
    Xlsx,
}

impl ExportFormat {
    pub fn mime(self) -> &'static str {
        match self {
            ExportFormat::Csv => "text/csv",
            ExportFormat::Json => "application/json",
            ExportFormat::PlainText => "text/plain",
            ExportFormat::Xlsx => "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet",
        }
    }

    pub fn extension(self) -> &'static str {
        match self {
            ExportFormat::Csv => "csv",
            ExportFormat::Json => "json",
            ExportFormat::PlainText => "txt",
            ExportFormat::Xlsx => "xlsx",
        }
    }
}

/// The produced payload plus enough metadata for a host to trigger a
/// download; the core makes no assumption about how that happens.
pub struct ExportResult {
    pub bytes: Vec<u8>,
    pub file_name: String,
    pub mime: &'static str,
}

/// Renders `rows` through `columns` in `format`. `include_headers` only
/// affects CSV and plain text (JSON always keys by column label/id).
/// Returns `None` for `Xlsx`, which this core does not support — callers
/// should log and no-op, per the design.
pub fn export<T>(rows: &[&Row<T>], columns: &[&Column<T>], format: ExportFormat, include_headers: bool, file_stem: &str) -> Option<ExportResult> {
    let bytes = match format {
        ExportFormat::Csv => export_csv(rows, columns, include_headers).into_bytes(),
        ExportFormat::Json => export_json(rows, columns).into_bytes(),
        ExportFormat::PlainText => export_plain_text(rows, columns, include_headers).into_bytes(),
        ExportFormat::Xlsx => return None,
    };

    Some(ExportResult {
        bytes,
        file_name: format!("{file_stem}.{}", format.extension()),
        mime: format.mime(),
    })
}

fn column_label<T>(column: &Column<T>) -> &str {
    if column.label.is_empty() {
        &column.id.0
    } else {
        &column.label
    }
}

fn cell_text<T>(column: &Column<T>, payload: &T) -> String {
    let cell = column.extract(payload);
    if let Some(formatter) = &column.formatter {
        return formatter(&cell, payload);
    }
    match &cell {
        CellValue::Null => String::new(),
        CellValue::Bool(b) => b.to_string(),
        CellValue::Number(_) => cell.normalized(true),
        CellValue::Text(s) => s.clone(),
        CellValue::Timestamp(ts) => ts.to_rfc3339(),
    }
}

fn csv_escape(field: &str) -> String {
    if field.contains(',') || field.contains('"') || field.contains('\n') {
        format!("\"{}\"", field.replace('"', "\"\""))
    } else {
        field.to_string()
    }
}

fn export_csv<T>(rows: &[&Row<T>], columns: &[&Column<T>], include_headers: bool) -> String {
    let mut lines = Vec::new();
    if include_headers {
        lines.push(columns.iter().map(|c| csv_escape(column_label(c))).collect::<Vec<_>>().join(","));
    }
    for row in rows {
        let line = columns.iter().map(|c| csv_escape(&cell_text(c, &row.payload))).collect::<Vec<_>>().join(",");
        lines.push(line);
    }
    lines.join("\n")
}

fn export_json<T>(rows: &[&Row<T>], columns: &[&Column<T>]) -> String {
    let mut array = Vec::with_capacity(rows.len());
    for row in rows {
        let mut obj = serde_json::Map::new();
        for column in columns {
            obj.insert(column_label(column).to_string(), serde_json::Value::String(cell_text(column, &row.payload)));
        }
        array.push(serde_json::Value::Object(obj));
    }
    serde_json::Value::Array(array).to_string()
}

fn export_plain_text<T>(rows: &[&Row<T>], columns: &[&Column<T>], include_headers: bool) -> String {
    let headers: Vec<String> = columns.iter().map(|c| column_label(c).to_string()).collect();
    let cells: Vec<Vec<String>> = rows.iter().map(|row| columns.iter().map(|c| cell_text(c, &row.payload)).collect()).collect();

    let widths: Vec<usize> = headers
        .iter()
        .enumerate()
        .map(|(i, h)| {
            let max_cell = cells.iter().map(|r| r[i].len()).max().unwrap_or(0);
            h.len().max(max_cell)
        })
        .collect();

    let mut lines = Vec::new();
    if include_headers {
        lines.push(pad_row(&headers, &widths));
        let separator = widths.iter().map(|w| "-".repeat(*w)).collect::<Vec<_>>().join("-+-");
        lines.push(separator);
    }
    for row in &cells {
        lines.push(pad_row(row, &widths));
    }
    lines.join("\n")
}

fn pad_row(cells: &[String], widths: &[usize]) -> String {
    cells
        .iter()
        .zip(widths.iter())
        .map(|(cell, width)| format!("{cell:<width$}", width = *width))
        .collect::<Vec<_>>()
        .join(" | ")
}
