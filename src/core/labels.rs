//! Slice label conventions.
//!
//! Quality control sheets name slices `s001`, `s002`, ... while tables merged
//! from the atlas exports may carry bare slice numbers. Everything is
//! normalised to the `sNNN` form before tables are joined.

use regex::Regex;

use super::table::{CellMarks, RegionTable, TextTable};

/// Formats a slice number as a quality control label (`3` -> `s003`).
pub fn qc_label(number: u32) -> String {
    format!("s{number:03}")
}

/// Whether a label already is in `sNNN` form.
pub fn is_qc_label(label: &str) -> bool {
    label.len() == 4
        && label.starts_with('s')
        && label[1..].chars().all(|c| c.is_ascii_digit())
}

/// Slice number of a label: accepts `s003`, `3` and `3.0`.
pub fn parse_slice_number(label: &str) -> Option<u32> {
    let label = label.trim();
    let digits = label.strip_prefix('s').unwrap_or(label);
    if let Ok(n) = digits.parse::<u32>() {
        return Some(n);
    }
    let f: f64 = digits.parse().ok()?;
    (f >= 0.0 && f.fract() == 0.0 && f <= u32::MAX as f64).then_some(f as u32)
}

/// Slice number embedded in an atlas export file name, e.g.
/// `RefAtlasRegions__s012.csv` -> 12.
pub fn slice_number_from_file_name(name: &str) -> Option<u32> {
    let pattern = Regex::new(r"__s(\d+)\.csv$").ok()?;
    pattern
        .captures(name)
        .and_then(|caps| caps.get(1))
        .and_then(|m| m.as_str().parse().ok())
}

/// Converts labels to `sNNN` unless every label already is in that form.
///
/// Labels that are not slice numbers (e.g. `Total`) are kept as they are.
/// Returns `None` when nothing needs to change.
pub fn normalized_labels(labels: &[String]) -> Option<Vec<String>> {
    if labels.iter().all(|l| is_qc_label(l)) {
        return None;
    }
    Some(
        labels
            .iter()
            .map(|l| parse_slice_number(l).map_or_else(|| l.clone(), qc_label))
            .collect(),
    )
}

fn normalize_label(label: &str) -> String {
    parse_slice_number(label).map_or_else(|| label.to_string(), qc_label)
}

/// Normalises a table's slice labels (and its marks) in place.
/// Returns whether anything changed.
pub fn normalize_table_labels(table: &mut RegionTable, marks: &mut CellMarks) -> bool {
    let Some(labels) = normalized_labels(table.rows()) else {
        return false;
    };
    if table.set_row_labels(labels).is_err() {
        return false;
    }
    marks.rename_rows(normalize_label);
    true
}

/// Normalises the slice labels of a quality control sheet in place.
pub fn normalize_text_labels(table: &mut TextTable) -> bool {
    match normalized_labels(&table.rows) {
        Some(labels) => {
            table.rows = labels;
            true
        }
        None => false,
    }
}
