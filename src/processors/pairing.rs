//! Pairing left and right hemisphere rows of the summary table.

use std::collections::{BTreeSet, HashMap};

use thiserror::Error;

use crate::core::stats::mean_present;
use crate::core::table::{RegionTable, TableError};

/// Column appended with the mean of the count columns.
pub const AVERAGE_COUNTS_COLUMN: &str = "Average Counts";

/// Errors raised while pairing regions.
#[derive(Debug, Error, PartialEq)]
pub enum PairingError {
    #[error("Unpaired labels detected: {}", .0.join(", "))]
    UnpairedLabels(Vec<String>),

    #[error(transparent)]
    Table(#[from] TableError),
}

/// Result type for pairing operations.
pub type Result<T> = std::result::Result<T, PairingError>;

/// Hemisphere suffix of a label.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Side {
    Right,
    Left,
}

impl Side {
    pub const fn suffix(self) -> &'static str {
        match self {
            Side::Right => " R",
            Side::Left => " L",
        }
    }
}

/// Splits `"CA1 L"` into `("CA1", Left)`. The base is trimmed.
pub fn split_side(label: &str) -> Option<(String, Side)> {
    [Side::Right, Side::Left].into_iter().find_map(|side| {
        label
            .strip_suffix(side.suffix())
            .map(|base| (base.trim().to_string(), side))
    })
}

/// Builds the paired table: one row per base label (in `R` row order),
/// columns `<col> R…`, `<col> L…`, then `Average Counts`.
///
/// # Errors
///
/// Returns [`PairingError::UnpairedLabels`] (sorted) when a base label has
/// only one side.
pub fn pair_regions(summary: &RegionTable) -> Result<RegionTable> {
    let mut right: Vec<(String, usize)> = Vec::new();
    let mut left: HashMap<String, usize> = HashMap::new();
    for (r, label) in summary.rows().iter().enumerate() {
        match split_side(label) {
            Some((base, Side::Right)) => right.push((base, r)),
            Some((base, Side::Left)) => {
                left.entry(base).or_insert(r);
            }
            None => {}
        }
    }

    let right_bases: BTreeSet<&str> = right.iter().map(|(b, _)| b.as_str()).collect();
    let left_bases: BTreeSet<&str> = left.keys().map(String::as_str).collect();
    let unpaired: Vec<String> = right_bases
        .symmetric_difference(&left_bases)
        .map(|s| s.to_string())
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect();
    if !unpaired.is_empty() {
        return Err(PairingError::UnpairedLabels(unpaired));
    }

    let columns: Vec<String> = [Side::Right, Side::Left]
        .iter()
        .flat_map(|side| summary.columns().iter().map(move |c| format!("{c}{}", side.suffix())))
        .collect();
    let count_columns: Vec<usize> = columns
        .iter()
        .enumerate()
        .filter(|(_, c)| c.contains("counts"))
        .map(|(i, _)| i)
        .collect();

    let mut seen = BTreeSet::new();
    let mut paired = RegionTable::new(Vec::new(), columns).with_index_name("Base Label");
    for (base, r) in &right {
        let Some(&l) = left.get(base) else {
            continue;
        };
        if !seen.insert(base.clone()) {
            continue;
        }
        let mut cells: Vec<Option<f64>> = summary.row_values(*r).to_vec();
        cells.extend_from_slice(summary.row_values(l));
        paired.push_row(base.clone(), cells)?;
    }

    let averages: Vec<Option<f64>> = (0..paired.n_rows())
        .map(|r| {
            let counts: Vec<Option<f64>> = count_columns.iter().map(|&c| paired.get(r, c)).collect();
            mean_present(&counts)
        })
        .collect();
    paired.push_column(AVERAGE_COUNTS_COLUMN, averages)?;

    Ok(paired)
}

/// Drops rows whose `Average Counts` is missing or below `threshold`.
pub fn filter_by_average_counts(paired: &mut RegionTable, threshold: f64) -> usize {
    let Some(c) = paired.column_position(AVERAGE_COUNTS_COLUMN) else {
        return 0;
    };
    let before = paired.n_rows();
    paired.retain_rows(|_, cells| cells[c].is_some_and(|avg| avg >= threshold));
    before - paired.n_rows()
}

/// Output name `Processed_<name>`.
pub fn processed_file_name(name: &str) -> String {
    format!("Processed_{name}")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn summary(labels: &[&str]) -> RegionTable {
        let values = labels
            .iter()
            .enumerate()
            .map(|(i, _)| vec![Some(i as f64), Some(10.0 * (i + 1) as f64)])
            .collect();
        RegionTable::from_values(
            labels.iter().map(|s| s.to_string()).collect(),
            vec!["03_densities".into(), "03_objects_counts".into()],
            values,
        )
        .unwrap()
        .with_index_name("Label")
    }

    #[test]
    fn test_split_side() {
        assert_eq!(split_side("CA1 L"), Some(("CA1".into(), Side::Left)));
        assert_eq!(split_side("CA1 R"), Some(("CA1".into(), Side::Right)));
        assert_eq!(split_side("4th ventricle"), None);
    }

    #[test]
    fn test_pair_regions() {
        let table = summary(&["CA1 L", "CA1 R", "Total", "DG R", "DG L"]);
        let paired = pair_regions(&table).unwrap();

        assert_eq!(paired.index_name, "Base Label");
        assert_eq!(paired.rows(), &["CA1", "DG"].map(String::from)[..]);
        assert_eq!(
            paired.columns(),
            &[
                "03_densities R",
                "03_objects_counts R",
                "03_densities L",
                "03_objects_counts L",
                AVERAGE_COUNTS_COLUMN
            ]
            .map(String::from)[..]
        );
        assert_eq!(paired.value("CA1", "03_densities R"), Some(1.0));
        assert_eq!(paired.value("CA1", "03_densities L"), Some(0.0));
        assert_eq!(paired.value("CA1", AVERAGE_COUNTS_COLUMN), Some(15.0));
        assert_eq!(paired.value("DG", AVERAGE_COUNTS_COLUMN), Some(45.0));
    }

    #[test]
    fn test_unpaired_labels_error() {
        let table = summary(&["CA1 L", "CA1 R", "DG L", "SC R"]);
        assert_eq!(
            pair_regions(&table),
            Err(PairingError::UnpairedLabels(vec!["DG".into(), "SC".into()]))
        );
    }

    #[test]
    fn test_filter_by_average_counts() {
        let table = summary(&["CA1 L", "CA1 R", "DG R", "DG L"]);
        let mut paired = pair_regions(&table).unwrap();
        let dropped = filter_by_average_counts(&mut paired, 20.0);
        assert_eq!(dropped, 1);
        assert_eq!(paired.rows(), &["DG".to_string()][..]);
    }

    #[test]
    fn test_processed_file_name() {
        assert_eq!(processed_file_name("All_densities.xlsx"), "Processed_All_densities.xlsx");
    }
}
