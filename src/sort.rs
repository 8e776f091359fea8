//! C4 — Sort Engine: stable single/multi-key ordering with a type-aware
//! default comparator.

use std::cmp::Ordering;

use chrono::{DateTime, Utc};

use crate::types::{CellValue, Column, ColumnId, Comparator, Row, SortKey, SortState};

/// Sorts `rows` in place according to `state`, consulting `columns` for a
/// per-column comparator override and falling back to [`default_comparator`].
/// A global `override_comparator` (from `customComparators`) takes
/// precedence over a column's own `comparator` field.
pub fn sort_rows<T>(
    rows: &mut [Row<T>],
    columns: &[Column<T>],
    state: &SortState,
    overrides: &std::collections::HashMap<ColumnId, Comparator>,
) {
    let keys = state.keys();
    if keys.is_empty() {
        return;
    }

    let resolved: Vec<(&SortKey, Option<&Column<T>>)> = keys
        .iter()
        .map(|k| (k, columns.iter().find(|c| c.id == k.column_id)))
        .collect();

    // `sort_by` is documented stable, preserving input order for equal keys.
    rows.sort_by(|a, b| {
        for (key, column) in &resolved {
            let Some(column) = column else { continue };
            let cell_a = column.extract(&a.payload);
            let cell_b = column.extract(&b.payload);

            let comparator = overrides
                .get(&key.column_id)
                .or(column.comparator.as_ref());

            let ordering = match comparator {
                Some(cmp) => cmp(&cell_a, &cell_b),
                None => default_comparator(&cell_a, &cell_b),
            };

            let signed = if key.direction.sign() < 0 { ordering.reverse() } else { ordering };
            if signed != Ordering::Equal {
                return signed;
            }
        }
        Ordering::Equal
    });
}

/// The seven-step default comparator precedence described for C4.
pub fn default_comparator(a: &CellValue, b: &CellValue) -> Ordering {
    // 1. both null -> equal; one absent -> absent first.
    match (a, b) {
        (CellValue::Null, CellValue::Null) => return Ordering::Equal,
        (CellValue::Null, _) => return Ordering::Less,
        (_, CellValue::Null) => return Ordering::Greater,
        _ => {}
    }

    // 2. both numeric primitives -> numeric difference.
    if let (CellValue::Number(x), CellValue::Number(y)) = (a, b) {
        return x.partial_cmp(y).unwrap_or(Ordering::Equal);
    }

    // 3. both boolean -> false < true.
    if let (CellValue::Bool(x), CellValue::Bool(y)) = (a, b) {
        return x.cmp(y);
    }

    // 4. both timestamps -> chronological.
    if let (CellValue::Timestamp(x), CellValue::Timestamp(y)) = (a, b) {
        return x.cmp(y);
    }

    let a_str = cell_as_str(a);
    let b_str = cell_as_str(b);

    // 5. attempt numeric parse of both, rejecting date-like strings and
    //    partial parses.
    if let (Some(x), Some(y)) = (parse_strict_number(&a_str), parse_strict_number(&b_str)) {
        return x.partial_cmp(&y).unwrap_or(Ordering::Equal);
    }

    // 6. attempt timestamp parse of both.
    if let (Some(x), Some(y)) = (parse_recognizable_timestamp(&a_str), parse_recognizable_timestamp(&b_str)) {
        return x.cmp(&y);
    }

    // 7. locale-aware string compare with numeric collation, case-insensitive.
    natural_compare(&a_str, &b_str)
}

fn cell_as_str(v: &CellValue) -> String {
    match v {
        CellValue::Text(s) => s.clone(),
        other => other.normalized(true),
    }
}

/// `YYYY-MM-DD` or `DD/MM/YYYY` prefixes are treated as dates, not numbers,
/// even though they contain only digits and separators.
fn looks_like_date(s: &str) -> bool {
    let bytes = s.as_bytes();
    let is_digit = |b: u8| b.is_ascii_digit();

    let matches_pattern = |pattern: &[usize]| -> bool {
        // pattern gives run lengths for digit groups separated by one
        // non-digit separator each, e.g. [4,2,2] for YYYY-MM-DD.
        let mut idx = 0;
        for (i, &len) in pattern.iter().enumerate() {
            if i > 0 {
                if idx >= bytes.len() || is_digit(bytes[idx]) {
                    return false;
                }
                idx += 1;
            }
            if idx + len > bytes.len() {
                return false;
            }
            if !bytes[idx..idx + len].iter().all(|&b| is_digit(b)) {
                return false;
            }
            idx += len;
        }
        true
    };

    matches_pattern(&[4, 2, 2]) || matches_pattern(&[2, 2, 4])
}

/// Rejects partial parses (trailing garbage) and date-like strings.
fn parse_strict_number(s: &str) -> Option<f64> {
    let trimmed = s.trim();
    if trimmed.is_empty() || looks_like_date(trimmed) {
        return None;
    }
    trimmed.parse::<f64>().ok()
}

/// Only recognizes unambiguous, parseable date/time prefixes (RFC3339 or
/// `YYYY-MM-DD`), not every string a general date library might guess at.
fn parse_recognizable_timestamp(s: &str) -> Option<DateTime<Utc>> {
    let trimmed = s.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(trimmed) {
        return Some(dt.with_timezone(&Utc));
    }
    if trimmed.len() == 10 && looks_like_date(trimmed) && &trimmed[4..5] == "-" {
        if let Ok(naive) = chrono::NaiveDate::parse_from_str(trimmed, "%Y-%m-%d") {
            return naive.and_hms_opt(0, 0, 0).map(|dt| DateTime::from_naive_utc_and_offset(dt, Utc));
        }
    }
    None
}

/// Splits a string into alternating digit/non-digit runs and compares
/// digit runs numerically, everything else case-insensitively and
/// lexicographically — a small natural-sort comparator standing in for
/// full locale collation at this crate's scale.
fn natural_compare(a: &str, b: &str) -> Ordering {
    let a_runs = split_runs(a);
    let b_runs = split_runs(b);

    for pair in a_runs.iter().zip(b_runs.iter()) {
        let (ra, rb) = pair;
        let ordering = match (ra.parse::<u64>(), rb.parse::<u64>()) {
            (Ok(na), Ok(nb)) => na.cmp(&nb),
            _ => ra.to_lowercase().cmp(&rb.to_lowercase()),
        };
        if ordering != Ordering::Equal {
            return ordering;
        }
    }
    a_runs.len().cmp(&b_runs.len())
}

fn split_runs(s: &str) -> Vec<String> {
    let mut runs = Vec::new();
    let mut current = String::new();
    let mut current_is_digit: Option<bool> = None;

    for ch in s.chars() {
        let is_digit = ch.is_ascii_digit();
        match current_is_digit {
            Some(d) if d == is_digit => current.push(ch),
            _ => {
                if !current.is_empty() {
                    runs.push(std::mem::take(&mut current));
                }
                current.push(ch);
                current_is_digit = Some(is_digit);
            }
        }
    }
    if !current.is_empty() {
        runs.push(current);
    }
    runs
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{RowId, SortDirection};
    use std::collections::HashMap;

    #[test]
    fn sort_cycle_matches_literal_scenario() {
        let columns = vec![Column::new("name", "Name", |v: &String| CellValue::Text(v.clone()))];
        let mut rows: Vec<Row<String>> = vec!["B", "a", "C"]
            .into_iter()
            .enumerate()
            .map(|(i, s)| Row::new(RowId(i.to_string()), s.to_string()))
            .collect();

        let asc = SortState::Single(Some(SortKey {
            column_id: "name".into(),
            direction: SortDirection::Asc,
        }));
        sort_rows(&mut rows, &columns, &asc, &HashMap::new());
        assert_eq!(rows.iter().map(|r| r.payload.clone()).collect::<Vec<_>>(), vec!["a", "B", "C"]);

        let desc = SortState::Single(Some(SortKey {
            column_id: "name".into(),
            direction: SortDirection::Desc,
        }));
        sort_rows(&mut rows, &columns, &desc, &HashMap::new());
        assert_eq!(rows.iter().map(|r| r.payload.clone()).collect::<Vec<_>>(), vec!["C", "B", "a"]);
    }

    #[test]
    fn multi_sort_tiebreaks_on_second_key() {
        #[derive(Clone)]
        struct PQ {
            p: i64,
            q: i64,
        }
        let columns = vec![
            Column::new("p", "P", |v: &PQ| CellValue::Number(v.p as f64)),
            Column::new("q", "Q", |v: &PQ| CellValue::Number(v.q as f64)),
        ];
        let mut rows: Vec<Row<PQ>> = vec![
            PQ { p: 1, q: 2 },
            PQ { p: 1, q: 1 },
            PQ { p: 2, q: 0 },
        ]
        .into_iter()
        .enumerate()
        .map(|(i, pq)| Row::new(RowId(i.to_string()), pq))
        .collect();

        let state = SortState::Multi(vec![
            SortKey { column_id: "p".into(), direction: SortDirection::Asc },
            SortKey { column_id: "q".into(), direction: SortDirection::Desc },
        ]);
        sort_rows(&mut rows, &columns, &state, &HashMap::new());
        let result: Vec<(i64, i64)> = rows.iter().map(|r| (r.payload.p, r.payload.q)).collect();
        assert_eq!(result, vec![(1, 2), (1, 1), (2, 0)]);
    }

    #[test]
    fn default_comparator_prefers_numeric_parse_over_string_compare() {
        let a = CellValue::Text("9".into());
        let b = CellValue::Text("10".into());
        assert_eq!(default_comparator(&a, &b), Ordering::Less);
    }

    #[test]
    fn default_comparator_treats_date_like_strings_as_dates_not_numbers() {
        let a = CellValue::Text("2024-01-01".into());
        let b = CellValue::Text("2023-12-31".into());
        assert_eq!(default_comparator(&a, &b), Ordering::Greater);
    }

    #[test]
    fn default_comparator_falls_back_to_natural_string_compare() {
        let a = CellValue::Text("item2".into());
        let b = CellValue::Text("item10".into());
        assert_eq!(default_comparator(&a, &b), Ordering::Less);
    }

    #[test]
    fn null_orders_before_present_values() {
        assert_eq!(default_comparator(&CellValue::Null, &CellValue::Number(1.0)), Ordering::Less);
        assert_eq!(default_comparator(&CellValue::Number(1.0), &CellValue::Null), Ordering::Greater);
    }
}
