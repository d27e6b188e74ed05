//! Quality control sheet handling.
//!
//! The QC sheet lists, per slice, the regions that were damaged and the
//! regions whose counts must be taken from the colliculi alignment. Cells hold
//! `;`-separated region names, possibly coarse names that the region
//! dictionary expands into sub-regions.

use std::collections::{BTreeMap, HashMap};

use thiserror::Error;

use crate::core::table::TextTable;

/// QC column listing damaged regions.
pub const DAMAGE_COLUMN: &str = "damage";

/// QC column listing regions adjusted from the colliculi alignment.
pub const PARTS_ADJUSTMENT_COLUMN: &str = "parts adjustment";

/// Errors raised while reading a QC sheet.
#[derive(Debug, Error, PartialEq)]
pub enum QcError {
    #[error("QC sheet has no '{0}' column")]
    MissingColumn(String),
}

/// Result type for QC operations.
pub type Result<T> = std::result::Result<T, QcError>;

/// Slice label -> regions named in that slice's cell.
pub type SliceRegions = BTreeMap<String, Vec<String>>;

/// Splits a QC cell on `;` and trims every name. Empty names are dropped.
pub fn split_regions(cell: &str) -> Vec<String> {
    cell.split(';')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

/// Expands every name of a QC cell through the dictionary and joins the
/// result with `"; "`. Names missing from the dictionary are kept.
pub fn expand_cell(cell: &str, dictionary: &HashMap<String, Vec<String>>) -> String {
    cell.split(';')
        .map(str::trim)
        .map(|name| match dictionary.get(name) {
            Some(parts) => parts.join("; "),
            None => name.to_string(),
        })
        .collect::<Vec<_>>()
        .join("; ")
}

/// Expands the `damage` and `parts adjustment` columns in place.
///
/// Returns the number of cells rewritten. Missing columns are skipped with a
/// warning.
pub fn expand_qc(qc: &mut TextTable, dictionary: &HashMap<String, Vec<String>>) -> usize {
    let mut rewritten = 0;
    for column in [DAMAGE_COLUMN, PARTS_ADJUSTMENT_COLUMN] {
        let Some(c) = qc.column_position(column) else {
            log::warn!("QC sheet has no '{}' column", column);
            continue;
        };
        for r in 0..qc.rows.len() {
            let expanded = qc.cells[r]
                .get(c)
                .and_then(|cell| cell.as_deref())
                .map(|cell| expand_cell(cell, dictionary));
            if let Some(expanded) = expanded {
                qc.set_cell(r, c, Some(expanded));
                rewritten += 1;
            }
        }
    }
    rewritten
}

/// Slice label -> regions for every non-empty cell of `column`.
pub fn region_mapping(qc: &TextTable, column: &str) -> Result<SliceRegions> {
    let c = qc
        .column_position(column)
        .ok_or_else(|| QcError::MissingColumn(column.to_string()))?;
    Ok(qc
        .column_cells(c)
        .into_iter()
        .filter_map(|(slice, cell)| cell.map(|text| (slice.to_string(), split_regions(text))))
        .filter(|(_, regions)| !regions.is_empty())
        .collect())
}

/// Region -> slices, slices in ascending label order.
pub fn invert_mapping(mapping: &SliceRegions) -> BTreeMap<String, Vec<String>> {
    let mut inverted: BTreeMap<String, Vec<String>> = BTreeMap::new();
    for (slice, regions) in mapping {
        for region in regions {
            inverted
                .entry(region.clone())
                .or_default()
                .push(slice.clone());
        }
    }
    inverted
}
