//! Density estimation and the cross-rat summary table.
//!
//! Density of a region in a slice (objects per mm³):
//!
//! ```text
//! count / (area · pixel_area · 1e-9 · (thickness + 2·√(size/π)))
//! ```
//!
//! The section thickness is corrected by the mean object diameter
//! (Abercrombie correction).

use std::path::Path;

use thiserror::Error;

use crate::config::DensityConfig;
use crate::core::table::{RegionTable, TableError};

use super::totals::TOTAL_ROW;

/// Errors raised by the density steps.
#[derive(Debug, Error, PartialEq)]
pub enum DensityError {
    #[error("{name} table is {found_rows}x{found_cols}, expected {rows}x{cols}")]
    ShapeMismatch {
        name: &'static str,
        rows: usize,
        cols: usize,
        found_rows: usize,
        found_cols: usize,
    },

    #[error("{0} has no rows")]
    EmptyTable(String),

    #[error("no tables to summarize")]
    NothingToSummarize,

    #[error(transparent)]
    Table(#[from] TableError),
}

/// Result type for density operations.
pub type Result<T> = std::result::Result<T, DensityError>;

/// Density of a single cell, `None` when the area is zero.
pub fn cell_density(count: f64, area: f64, size: f64, config: &DensityConfig) -> Option<f64> {
    if area == 0.0 {
        return None;
    }
    let thickness = config.section_thickness_um + 2.0 * (size / std::f64::consts::PI).sqrt();
    let density = count / (area * config.pixel_area_um2 * 1e-9 * thickness);
    density.is_finite().then_some(density)
}

fn check_shape(name: &'static str, table: &RegionTable, like: &RegionTable) -> Result<()> {
    if table.n_rows() != like.n_rows() || table.n_cols() != like.n_cols() {
        return Err(DensityError::ShapeMismatch {
            name,
            rows: like.n_rows(),
            cols: like.n_cols(),
            found_rows: table.n_rows(),
            found_cols: table.n_cols(),
        });
    }
    Ok(())
}

/// Appends a `Total` row of column sums to a region area table.
pub fn with_area_totals(areas: &RegionTable) -> Result<RegionTable> {
    let mut areas = areas.clone();
    let sums = areas.column_sums().into_iter().map(Some).collect();
    areas.push_row(TOTAL_ROW, sums)?;
    Ok(areas)
}

/// Computes densities from counts, areas and sizes.
///
/// `areas` must not carry its `Total` row yet; it is appended here. The three
/// tables are aligned by position and the result takes the labels of `sizes`.
///
/// # Errors
///
/// Returns [`DensityError::ShapeMismatch`] when the tables differ in shape.
pub fn estimate_densities(
    counts: &RegionTable,
    areas: &RegionTable,
    sizes: &RegionTable,
    config: &DensityConfig,
) -> Result<RegionTable> {
    let areas = with_area_totals(areas)?;
    check_shape("counts", counts, sizes)?;
    check_shape("region areas", &areas, sizes)?;

    let mut densities = RegionTable::new(sizes.rows().to_vec(), sizes.columns().to_vec())
        .with_index_name(sizes.index_name.clone());

    for r in 0..sizes.n_rows() {
        for c in 0..sizes.n_cols() {
            let value = match (counts.get(r, c), areas.get(r, c), sizes.get(r, c)) {
                (Some(count), Some(area), Some(size)) => cell_density(count, area, size, config),
                _ => None,
            };
            densities.set(r, c, value);
        }
    }

    Ok(densities)
}

/// Kind of table contributing to the summary.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SummarySource {
    Density,
    Counts,
}

/// Column label of a summary source: the file stem, truncated after
/// `counts` for count tables.
pub fn summary_label(path: &Path, source: SummarySource) -> String {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let stem = name.split('.').next().unwrap_or_default().to_string();
    match source {
        SummarySource::Density => stem,
        SummarySource::Counts => match stem.find("counts") {
            Some(idx) => format!("{}counts", &stem[..idx]),
            None => format!("{stem}counts"),
        },
    }
}

/// Builds the summary table from the last row of each source table.
///
/// Rows are region names, in the column order of the first table, then any
/// region first seen in a later table. The index header is `Label`.
pub fn summarize_last_rows(sources: &[(String, RegionTable)]) -> Result<RegionTable> {
    if sources.is_empty() {
        return Err(DensityError::NothingToSummarize);
    }

    let mut regions: Vec<String> = Vec::new();
    for (_, table) in sources {
        for column in table.columns() {
            if !regions.contains(column) {
                regions.push(column.clone());
            }
        }
    }

    let mut summary = RegionTable::new(regions.clone(), Vec::new()).with_index_name("Label");
    for (label, table) in sources {
        let last = table
            .n_rows()
            .checked_sub(1)
            .ok_or_else(|| DensityError::EmptyTable(label.clone()))?;
        let column: Vec<Option<f64>> = regions
            .iter()
            .map(|region| table.column_position(region).and_then(|c| table.get(last, c)))
            .collect();
        summary.push_column(label.clone(), column)?;
    }

    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn single(rows: &[&str], cols: &[&str], values: Vec<Vec<Option<f64>>>) -> RegionTable {
        RegionTable::from_values(
            rows.iter().map(|s| s.to_string()).collect(),
            cols.iter().map(|s| s.to_string()).collect(),
            values,
        )
        .unwrap()
    }

    #[test]
    fn test_cell_density_formula() {
        let config = DensityConfig::default();
        let size = std::f64::consts::PI * 25.0;
        let density = cell_density(10.0, 1000.0, size, &config).unwrap();
        let expected = 10.0 / (1000.0 * 0.1936e-9 * 50.0);
        assert!((density - expected).abs() / expected < 1e-12);
        assert_eq!(cell_density(10.0, 0.0, size, &config), None);
    }

    #[test]
    fn test_estimate_densities() {
        let config = DensityConfig::default();
        let counts = single(&["s001", "Total"], &["A"], vec![vec![Some(5.0)], vec![Some(5.0)]]);
        let areas = single(&["s001"], &["A"], vec![vec![Some(100.0)]]);
        let sizes = single(
            &["s001", "Weighted Average"],
            &["A"],
            vec![vec![None], vec![Some(0.0)]],
        );

        let densities = estimate_densities(&counts, &areas, &sizes, &config).unwrap();
        assert_eq!(densities.get(0, 0), None);
        let expected = 5.0 / (100.0 * 0.1936e-9 * 40.0);
        let total = densities.value("Weighted Average", "A").unwrap();
        assert!((total - expected).abs() / expected < 1e-12);
    }

    #[test]
    fn test_estimate_densities_shape_mismatch() {
        let config = DensityConfig::default();
        let counts = single(&["s001"], &["A"], vec![vec![Some(5.0)]]);
        let areas = single(&["s001"], &["A"], vec![vec![Some(100.0)]]);
        let sizes = single(&["s001", "WA"], &["A"], vec![vec![None], vec![None]]);

        let result = estimate_densities(&counts, &areas, &sizes, &config);
        assert!(matches!(result, Err(DensityError::ShapeMismatch { name: "counts", .. })));
    }

    #[test]
    fn test_summary_label() {
        assert_eq!(
            summary_label(Path::new("/x/03_densities.xlsx"), SummarySource::Density),
            "03_densities"
        );
        assert_eq!(
            summary_label(
                Path::new("/x/03_objects_counts_corrected_with_totals.xlsx"),
                SummarySource::Counts
            ),
            "03_objects_counts"
        );
    }

    #[test]
    fn test_summarize_last_rows() {
        let a = single(&["s001", "Total"], &["CA1 L", "CA1 R"], vec![
            vec![Some(1.0), Some(1.0)],
            vec![Some(10.0), Some(20.0)],
        ]);
        let b = single(&["Total"], &["CA1 R", "DG L"], vec![vec![Some(5.0), Some(6.0)]]);

        let summary = summarize_last_rows(&[("03_densities".into(), a), ("03_objects_counts".into(), b)]).unwrap();

        assert_eq!(summary.index_name, "Label");
        assert_eq!(summary.rows(), &["CA1 L", "CA1 R", "DG L"].map(String::from)[..]);
        assert_eq!(summary.value("CA1 R", "03_densities"), Some(20.0));
        assert_eq!(summary.value("CA1 L", "03_objects_counts"), None);
        assert_eq!(summary.value("DG L", "03_objects_counts"), Some(6.0));
    }

    #[test]
    fn test_summarize_nothing() {
        assert_eq!(summarize_last_rows(&[]), Err(DensityError::NothingToSummarize));
    }
}
