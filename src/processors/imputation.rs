//! Contiguous-run imputation of flagged slices.
//!
//! Flagged slice positions of one region are grouped into maximal runs of
//! consecutive positions. Short runs take the mean of the values just outside
//! the run (or the one that exists); long runs are cleared.

use crate::core::table::{Highlight, RegionTable};

/// One changed cell.
#[derive(Debug, Clone, PartialEq)]
pub struct Correction {
    pub row: String,
    pub column: String,
    pub previous: Option<f64>,
    pub replacement: Option<f64>,
    pub kind: Highlight,
}

/// Sorts and de-duplicates positions, then splits them into maximal runs of
/// consecutive positions.
pub fn contiguous_runs(positions: &[usize]) -> Vec<Vec<usize>> {
    let mut sorted = positions.to_vec();
    sorted.sort_unstable();
    sorted.dedup();

    let mut runs: Vec<Vec<usize>> = Vec::new();
    for pos in sorted {
        match runs.last_mut() {
            Some(run) if run.last().is_some_and(|&last| last + 1 == pos) => run.push(pos),
            _ => runs.push(vec![pos]),
        }
    }
    runs
}

/// Value assigned to every cell of a run.
///
/// `None` for runs longer than `max_run` and for runs with no usable
/// neighbour.
pub fn run_fill(series: &[Option<f64>], run: &[usize], max_run: usize) -> Option<f64> {
    let (&first, &last) = (run.first()?, run.last()?);
    if run.len() > max_run {
        return None;
    }
    let before = first
        .checked_sub(1)
        .and_then(|i| series.get(i).copied().flatten());
    let after = series.get(last + 1).copied().flatten();
    match (before, after) {
        (Some(a), Some(b)) => Some((a + b) / 2.0),
        (Some(v), None) | (None, Some(v)) => Some(v),
        (None, None) => None,
    }
}

/// Imputes `positions` of `series` in place.
///
/// Returns `(position, previous, replacement)` for every flagged position
/// inside the series; positions past the end are ignored.
pub fn impute_series(
    series: &mut [Option<f64>],
    positions: &[usize],
    max_run: usize,
) -> Vec<(usize, Option<f64>, Option<f64>)> {
    let in_range: Vec<usize> = positions
        .iter()
        .copied()
        .filter(|&p| p < series.len())
        .collect();

    let mut changes = Vec::with_capacity(in_range.len());
    for run in contiguous_runs(&in_range) {
        let fill = run_fill(series, &run, max_run);
        for &pos in &run {
            changes.push((pos, series[pos], fill));
            series[pos] = fill;
        }
    }
    changes
}

/// Imputes flagged rows of one table column and reports the changes as
/// `Damaged` corrections.
pub fn impute_column(
    table: &mut RegionTable,
    column: usize,
    rows: &[usize],
    max_run: usize,
) -> Vec<Correction> {
    let Some(name) = table.columns().get(column).cloned() else {
        return Vec::new();
    };
    let mut series = table.column_values(column);
    let changes = impute_series(&mut series, rows, max_run);

    changes
        .into_iter()
        .map(|(row, previous, replacement)| {
            table.set(row, column, replacement);
            Correction {
                row: table.rows()[row].clone(),
                column: name.clone(),
                previous,
                replacement,
                kind: Highlight::Damaged,
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_contiguous_runs() {
        assert_eq!(
            contiguous_runs(&[7, 2, 3, 3, 5, 8, 9]),
            vec![vec![2, 3], vec![5], vec![7, 8, 9]]
        );
        assert!(contiguous_runs(&[]).is_empty());
    }

    #[test]
    fn test_single_gap_takes_neighbour_mean() {
        let mut series = vec![Some(10.0), Some(0.0), Some(20.0)];
        let changes = impute_series(&mut series, &[1], 2);
        assert_eq!(series[1], Some(15.0));
        assert_eq!(changes, vec![(1, Some(0.0), Some(15.0))]);
    }

    #[test]
    fn test_two_slice_gap_shares_fill() {
        let mut series = vec![Some(2.0), Some(9.0), Some(9.0), Some(4.0)];
        impute_series(&mut series, &[2, 1], 2);
        assert_eq!(series, vec![Some(2.0), Some(3.0), Some(3.0), Some(4.0)]);
    }

    #[test]
    fn test_three_slice_gap_is_cleared() {
        let mut series = vec![Some(1.0), Some(5.0), Some(5.0), Some(5.0), Some(3.0)];
        impute_series(&mut series, &[1, 2, 3], 2);
        assert_eq!(series, vec![Some(1.0), None, None, None, Some(3.0)]);
    }

    #[test]
    fn test_boundary_run_uses_single_neighbour() {
        let mut series = vec![Some(8.0), Some(8.0), Some(6.0), Some(1.0)];
        impute_series(&mut series, &[0, 1], 2);
        assert_eq!(&series[..2], &[Some(6.0), Some(6.0)]);

        let mut series = vec![Some(1.0), Some(4.0), Some(9.0)];
        impute_series(&mut series, &[2], 2);
        assert_eq!(series[2], Some(4.0));
    }

    #[test]
    fn test_missing_neighbours() {
        let mut series = vec![None, Some(5.0), Some(7.0)];
        impute_series(&mut series, &[1], 2);
        assert_eq!(series[1], Some(7.0));

        let mut series = vec![None, Some(5.0), None];
        impute_series(&mut series, &[1], 2);
        assert_eq!(series[1], None);
    }

    #[test]
    fn test_out_of_range_positions_ignored() {
        let mut series = vec![Some(1.0), Some(2.0)];
        let changes = impute_series(&mut series, &[5], 2);
        assert!(changes.is_empty());
    }

    #[test]
    fn test_impute_column_reports_corrections() {
        let mut table = RegionTable::from_values(
            vec!["s001".into(), "s002".into(), "s003".into()],
            vec!["CA1 L".into()],
            vec![vec![Some(2.0)], vec![Some(100.0)], vec![Some(4.0)]],
        )
        .unwrap();

        let corrections = impute_column(&mut table, 0, &[1], 2);
        assert_eq!(table.value("s002", "CA1 L"), Some(3.0));
        assert_eq!(
            corrections,
            vec![Correction {
                row: "s002".into(),
                column: "CA1 L".into(),
                previous: Some(100.0),
                replacement: Some(3.0),
                kind: Highlight::Damaged,
            }]
        );
    }
}
