//! `Total` and `Weighted Average` summary rows.

use crate::core::table::{MarkedTable, RegionTable, Result};

use super::damage::manual_marks;

/// Label of the column-sum row of count tables.
pub const TOTAL_ROW: &str = "Total";

/// Label of the count-weighted mean row of size tables.
pub const WEIGHTED_AVERAGE_ROW: &str = "Weighted Average";

/// Column sums of `counts`, missing cells skipped.
pub fn count_totals(counts: &RegionTable) -> Vec<Option<f64>> {
    counts.column_sums().into_iter().map(Some).collect()
}

/// Σ(size·count) / Σcount per column, over the rows of `sizes`.
///
/// Counts are matched to sizes by row label and column name. A product is
/// only formed where both cells exist, while the denominator sums every
/// present count. A zero denominator gives a missing average.
pub fn weighted_averages(sizes: &RegionTable, counts: &RegionTable) -> Vec<Option<f64>> {
    sizes
        .columns()
        .iter()
        .enumerate()
        .map(|(c, region)| {
            let Some(cc) = counts.column_position(region) else {
                return None;
            };
            let weighted: f64 = sizes
                .iter_rows()
                .filter_map(|(label, cells)| {
                    let size = cells[c]?;
                    let count = counts.get(counts.row_position(label)?, cc)?;
                    Some(size * count)
                })
                .sum();
            let total: f64 = counts.column_values(cc).into_iter().flatten().sum();
            (total != 0.0).then(|| weighted / total)
        })
        .collect()
}

/// Appends `Total` to the counts and `Weighted Average` to the sizes.
///
/// Existing summary rows are dropped first so the step can be re-run. Only
/// manual highlights are kept.
pub fn add_totals(sizes: &mut MarkedTable, counts: &mut MarkedTable) -> Result<()> {
    counts.table.remove_row(TOTAL_ROW);
    sizes.table.remove_row(WEIGHTED_AVERAGE_ROW);

    let averages = weighted_averages(&sizes.table, &counts.table);
    let totals = count_totals(&counts.table);

    counts.table.push_row(TOTAL_ROW, totals)?;
    sizes.table.push_row(WEIGHTED_AVERAGE_ROW, averages)?;

    counts.marks = manual_marks(&counts.marks);
    sizes.marks = manual_marks(&sizes.marks);
    Ok(())
}
