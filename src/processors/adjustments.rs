//! Replacing cells with values from the colliculi alignment.
//!
//! Some regions are better registered by a second atlas alignment made for
//! the colliculi. The QC sheet lists, per slice, the regions whose values
//! must be taken from the tables of that alignment; replaced cells are
//! highlighted `Adjusted`.

use crate::core::table::{Highlight, MarkedTable, RegionTable};

use super::imputation::Correction;
use super::qc::SliceRegions;

/// Replaces cell `(slice, region)` of `target` with the colliculi value.
///
/// Returns `None` (leaving the cell untouched) when the cell does not exist in
/// `target` or in `colliculi`. An empty colliculi cell yields a missing
/// replacement.
pub fn replace_from_colliculi(
    target: &mut MarkedTable,
    colliculi: &RegionTable,
    slice: &str,
    region: &str,
) -> Option<Correction> {
    let r = target.table.row_position(slice)?;
    let c = target.table.column_position(region)?;
    colliculi.row_position(slice)?;
    colliculi.column_position(region)?;
    let previous = target.table.get(r, c);
    let replacement = colliculi.value(slice, region);

    target.table.set(r, c, replacement);
    target.marks.mark(slice, region, Highlight::Adjusted);

    Some(Correction {
        row: slice.to_string(),
        column: region.to_string(),
        previous,
        replacement,
        kind: Highlight::Adjusted,
    })
}

/// Whether the QC sheet asks for any parts adjustment.
pub fn needs_colliculi(parts_adjustment: &SliceRegions) -> bool {
    parts_adjustment.values().any(|regions| !regions.is_empty())
}

/// Applies the QC parts adjustments to the objects and regions tables.
///
/// A `(slice, region)` pair is replaced only when it is a cell of both the
/// objects table and the colliculi objects table. Both tables get
/// the same cells highlighted. Returns the corrections of the objects table.
pub fn apply_parts_adjustments(
    objects: &mut MarkedTable,
    regions: &mut MarkedTable,
    colliculi_objects: &RegionTable,
    colliculi_regions: &RegionTable,
    parts_adjustment: &SliceRegions,
) -> Vec<Correction> {
    let mut corrections = Vec::new();

    for (slice, names) in parts_adjustment {
        if objects.table.row_position(slice).is_none() {
            log::warn!("Slice {} of the QC sheet is not in the objects table, skipping", slice);
            continue;
        }
        for region in names {
            if objects.table.column_position(region).is_none() {
                log::warn!("Region '{}' (slice {}) is not in the objects table, skipping", region, slice);
                continue;
            }
            if colliculi_objects.column_position(region).is_none() {
                log::debug!("Region '{}' not in the colliculi table, left as is", region);
                continue;
            }
            if colliculi_objects.row_position(slice).is_none() {
                log::warn!("Slice {} is not in the colliculi table, '{}' left as is", slice, region);
                continue;
            }

            if let Some(correction) = replace_from_colliculi(objects, colliculi_objects, slice, region) {
                log::debug!(
                    "{} / {}: {:?} -> {:?}",
                    slice,
                    region,
                    correction.previous,
                    correction.replacement
                );
                corrections.push(correction);
            }
            replace_from_colliculi(regions, colliculi_regions, slice, region);
        }
    }

    corrections
}

/// Replaces every `Adjusted` cell of `target` with the value at the same
/// `(slice, region)` in `colliculi`. Cells absent from `colliculi` are
/// logged and left untouched.
pub fn replace_adjusted_cells(target: &mut MarkedTable, colliculi: &RegionTable) -> Vec<Correction> {
    let mut corrections = Vec::new();
    for (slice, region) in target.marks.cells_with(Highlight::Adjusted) {
        if colliculi.row_position(&slice).is_none() || colliculi.column_position(&region).is_none() {
            log::warn!(
                "Adjusted cell {} / {} has no counterpart in the colliculi table",
                slice,
                region
            );
            continue;
        }
        if let Some(correction) = replace_from_colliculi(target, colliculi, &slice, &region) {
            corrections.push(correction);
        }
    }
    corrections
}
