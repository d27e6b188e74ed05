//! Damaged slice handling.
//!
//! Two flavours share the contiguous-run imputation:
//! - QC driven: damaged `(slice, region)` pairs come from the QC sheet and are
//!   imputed in the objects and regions tables together.
//! - Highlight driven: green cells of the object size and count tables are
//!   imputed, after yellow cells were replaced from the colliculi tables.

use std::collections::BTreeMap;

use crate::core::table::{CellMarks, Highlight, MarkedTable, RegionTable};

use super::imputation::{impute_column, Correction};
use super::qc::{invert_mapping, SliceRegions};

/// Outcome of the QC driven damage handling.
#[derive(Debug, Clone, Default)]
pub struct DamageReport {
    /// Corrections applied to the objects table.
    pub objects: Vec<Correction>,
    /// Corrections applied to the regions table.
    pub regions: Vec<Correction>,
    /// QC regions that are not columns of the objects table.
    pub unknown_regions: Vec<String>,
    /// QC slices that are not rows of the objects table.
    pub unknown_slices: Vec<String>,
}

fn row_positions(table: &RegionTable, slices: &[String], unknown: &mut Vec<String>) -> Vec<usize> {
    slices
        .iter()
        .filter_map(|slice| {
            let pos = table.row_position(slice);
            if pos.is_none() && !unknown.contains(slice) {
                unknown.push(slice.clone());
            }
            pos
        })
        .collect()
}

fn impute_region(table: &mut RegionTable, region: &str, slices: &[String], max_run: usize) -> Vec<Correction> {
    let Some(c) = table.column_position(region) else {
        return Vec::new();
    };
    let mut ignored = Vec::new();
    let rows = row_positions(table, slices, &mut ignored);
    impute_column(table, c, &rows, max_run)
}

/// Imputes the QC `damage` cells of the objects and regions tables.
///
/// Every modified cell is highlighted `Damaged` in both tables. `Adjusted`
/// highlights of either input are carried to both outputs unless the cell
/// was damaged; other highlights are dropped.
pub fn handle_damage(
    objects: &mut MarkedTable,
    regions: &mut MarkedTable,
    damage: &SliceRegions,
    max_run: usize,
) -> DamageReport {
    let mut report = DamageReport::default();

    for (region, slices) in invert_mapping(damage) {
        if objects.table.column_position(&region).is_none() {
            log::warn!("Damaged region '{}' is not in the objects table, skipping", region);
            report.unknown_regions.push(region);
            continue;
        }
        // Validates the slices against the objects table.
        let known = row_positions(&objects.table, &slices, &mut report.unknown_slices);
        if known.is_empty() {
            continue;
        }

        report
            .objects
            .extend(impute_region(&mut objects.table, &region, &slices, max_run));
        report
            .regions
            .extend(impute_region(&mut regions.table, &region, &slices, max_run));
    }

    for slice in &report.unknown_slices {
        log::warn!("Damaged slice {} is not in the objects table, skipping", slice);
    }

    let mut marks = objects.marks.filtered(|h| h == Highlight::Adjusted);
    marks.merge(&regions.marks.filtered(|h| h == Highlight::Adjusted));
    for correction in report.objects.iter().chain(&report.regions) {
        marks.mark(correction.row.clone(), correction.column.clone(), Highlight::Damaged);
    }
    objects.marks = marks.clone();
    regions.marks = marks;

    report
}

/// Imputes every `Damaged` cell of a table, region by region.
///
/// Highlights are left as they are.
pub fn impute_damaged_cells(table: &mut MarkedTable, max_run: usize) -> Vec<Correction> {
    let mut by_region: BTreeMap<String, Vec<String>> = BTreeMap::new();
    for (slice, region) in table.marks.cells_with(Highlight::Damaged) {
        by_region.entry(region).or_default().push(slice);
    }

    by_region
        .into_iter()
        .flat_map(|(region, slices)| impute_region(&mut table.table, &region, &slices, max_run))
        .collect::<Vec<_>>()
}

/// Keeps only the manual (`Adjusted`, `Damaged`) highlights of a table.
pub fn manual_marks(marks: &CellMarks) -> CellMarks {
    marks.filtered(Highlight::is_manual)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn labels(n: usize) -> Vec<String> {
        (1..=n as u32).map(crate::core::labels::qc_label).collect()
    }

    fn column(values: &[f64]) -> RegionTable {
        RegionTable::from_values(
            labels(values.len()),
            vec!["CA1 L".into(), "DG L".into()],
            values.iter().map(|v| vec![Some(*v), Some(*v * 10.0)]).collect(),
        )
        .unwrap()
    }

    #[test]
    fn test_handle_damage_imputes_both_tables() {
        let mut objects = MarkedTable::unmarked(column(&[2.0, 50.0, 4.0, 1.0, 1.0]));
        let mut regions = MarkedTable::unmarked(column(&[20.0, 500.0, 40.0, 10.0, 10.0]));
        regions.marks.mark("s004", "DG L", Highlight::Adjusted);
        regions.marks.mark("s005", "DG L", Highlight::Outlier);

        let damage = SliceRegions::from([
            ("s002".to_string(), vec!["CA1 L".to_string(), "Nope".to_string()]),
            ("s099".to_string(), vec!["CA1 L".to_string()]),
        ]);

        let report = handle_damage(&mut objects, &mut regions, &damage, 2);

        assert_eq!(objects.table.value("s002", "CA1 L"), Some(3.0));
        assert_eq!(regions.table.value("s002", "CA1 L"), Some(30.0));
        assert_eq!(objects.table.value("s002", "DG L"), Some(500.0));
        assert_eq!(report.unknown_regions, vec!["Nope".to_string()]);
        assert_eq!(report.unknown_slices, vec!["s099".to_string()]);

        assert_eq!(objects.marks.get("s002", "CA1 L"), Some(Highlight::Damaged));
        assert_eq!(objects.marks.get("s004", "DG L"), Some(Highlight::Adjusted));
        assert_eq!(regions.marks.get("s005", "DG L"), None);
    }

    #[test]
    fn test_handle_damage_clears_long_runs() {
        let mut objects = MarkedTable::unmarked(column(&[1.0, 9.0, 9.0, 9.0, 2.0]));
        let mut regions = MarkedTable::unmarked(column(&[1.0, 9.0, 9.0, 9.0, 2.0]));
        let damage = SliceRegions::from([
            ("s002".to_string(), vec!["DG L".to_string()]),
            ("s003".to_string(), vec!["DG L".to_string()]),
            ("s004".to_string(), vec!["DG L".to_string()]),
        ]);

        let report = handle_damage(&mut objects, &mut regions, &damage, 2);

        assert_eq!(report.objects.len(), 3);
        assert!(report.objects.iter().all(|c| c.replacement.is_none()));
        assert_eq!(objects.table.value("s003", "DG L"), None);
        assert_eq!(objects.table.value("s003", "CA1 L"), Some(9.0));
    }

    #[test]
    fn test_impute_damaged_cells() {
        let mut table = MarkedTable::unmarked(column(&[2.0, 0.0, 6.0]));
        table.marks.mark("s002", "CA1 L", Highlight::Damaged);
        table.marks.mark("s001", "DG L", Highlight::Adjusted);

        let corrections = impute_damaged_cells(&mut table, 2);

        assert_eq!(corrections.len(), 1);
        assert_eq!(table.table.value("s002", "CA1 L"), Some(4.0));
        assert_eq!(table.table.value("s001", "DG L"), Some(20.0));
        assert_eq!(table.marks.len(), 2);
    }

    #[test]
    fn test_manual_marks() {
        let mut marks = CellMarks::new();
        marks.mark("s001", "CA1 L", Highlight::Damaged);
        marks.mark("s002", "CA1 L", Highlight::TotalOutlier);
        assert_eq!(manual_marks(&marks).len(), 1);
    }
}
