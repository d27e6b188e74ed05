//! Outlier marking and the outlier frequency analysis.
//!
//! A table is split into its body rows and its trailing summary row. Each
//! part gets its own band `mean ± k·SD` (population SD over present values);
//! body cells outside the band are highlighted `Outlier`, summary cells
//! `TotalOutlier`.

use crate::config::OutlierConfig;
use crate::core::stats::{gaussian_kde, mean, std_dev, Kde};
use crate::core::table::{CellMarks, Highlight, MarkedTable, RegionTable};

/// Accepted band of one part of a table.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OutlierBand {
    pub mean: f64,
    pub sd: f64,
    pub lower: f64,
    pub upper: f64,
}

impl OutlierBand {
    /// Band `mean ± k·SD` of the values; `None` for no values.
    pub fn from_values(values: &[f64], k: f64) -> Option<Self> {
        let mean = mean(values)?;
        let sd = std_dev(values, 0)?;
        Some(Self {
            mean,
            sd,
            lower: mean - k * sd,
            upper: mean + k * sd,
        })
    }

    /// Strictly outside the band.
    #[inline]
    pub fn excludes(&self, value: f64) -> bool {
        value > self.upper || value < self.lower
    }
}

/// A highlighted position, shared between tables of equal shape.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OutlierCell {
    pub row: usize,
    pub column: usize,
    pub highlight: Highlight,
}

/// Outcome of outlier detection on one table.
#[derive(Debug, Clone, PartialEq)]
pub struct OutlierReport {
    /// Band of the body rows.
    pub body: Option<OutlierBand>,
    /// Band of the trailing summary row.
    pub totals: Option<OutlierBand>,
    pub cells: Vec<OutlierCell>,
    /// Present values of the body rows, row-major.
    pub body_values: Vec<f64>,
    /// Present values of the summary row.
    pub total_values: Vec<f64>,
}

/// Finds outliers of the body rows and of the last row of `table`.
pub fn find_outliers(table: &RegionTable, k: f64) -> OutlierReport {
    let Some((body, last)) = table.split_last_row() else {
        return OutlierReport {
            body: None,
            totals: None,
            cells: Vec::new(),
            body_values: Vec::new(),
            total_values: Vec::new(),
        };
    };
    let body_values = body.present_values();
    let total_values = last.present_values();
    let body_band = OutlierBand::from_values(&body_values, k);
    let total_band = OutlierBand::from_values(&total_values, k);

    let last_row = table.n_rows() - 1;
    let mut cells = Vec::new();
    for c in 0..table.n_cols() {
        for r in 0..table.n_rows() {
            let (band, highlight) = if r == last_row {
                (total_band, Highlight::TotalOutlier)
            } else {
                (body_band, Highlight::Outlier)
            };
            if let (Some(band), Some(v)) = (band, table.get(r, c)) {
                if band.excludes(v) {
                    cells.push(OutlierCell { row: r, column: c, highlight });
                }
            }
        }
    }

    OutlierReport {
        body: body_band,
        totals: total_band,
        cells,
        body_values,
        total_values,
    }
}

/// Marks of `cells` on `table`; positions outside the table are skipped.
pub fn marks_for(table: &RegionTable, cells: &[OutlierCell]) -> CellMarks {
    let mut marks = CellMarks::new();
    for cell in cells {
        if let (Some(row), Some(column)) = (table.rows().get(cell.row), table.columns().get(cell.column)) {
            marks.mark(row.clone(), column.clone(), cell.highlight);
        }
    }
    marks
}

/// Equal-width histogram.
#[derive(Debug, Clone, PartialEq)]
pub struct Histogram {
    /// `bins + 1` edges.
    pub edges: Vec<f64>,
    pub counts: Vec<usize>,
}

impl Histogram {
    /// `bins` equal-width bins spanning the data. The last bin is closed.
    pub fn from_values(values: &[f64], bins: usize) -> Option<Self> {
        if values.is_empty() || bins == 0 {
            return None;
        }
        let min = values.iter().copied().fold(f64::INFINITY, f64::min);
        let max = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        let (lo, hi) = if min == max { (min - 0.5, max + 0.5) } else { (min, max) };
        let width = (hi - lo) / bins as f64;
        let edges: Vec<f64> = (0..=bins).map(|i| lo + width * i as f64).collect();
        Some(Self::with_edges(values, edges))
    }

    /// Counts `values` into existing edges; values outside are ignored.
    pub fn with_edges(values: &[f64], edges: Vec<f64>) -> Self {
        let bins = edges.len().saturating_sub(1);
        let mut counts = vec![0usize; bins];
        if bins > 0 {
            let (lo, hi) = (edges[0], edges[bins]);
            let width = (hi - lo) / bins as f64;
            for &v in values {
                if v < lo || v > hi || width <= 0.0 {
                    continue;
                }
                let idx = (((v - lo) / width) as usize).min(bins - 1);
                counts[idx] += 1;
            }
        }
        Self { edges, counts }
    }

    pub fn max_count(&self) -> usize {
        self.counts.iter().copied().max().unwrap_or(0)
    }
}

/// Detects outliers in the sizes table and applies the same positions to
/// the counts table. Only outlier highlights are kept on the outputs.
pub fn highlight_outliers(
    sizes: &RegionTable,
    counts: &RegionTable,
    config: &OutlierConfig,
) -> (OutlierReport, MarkedTable, MarkedTable) {
    let report = find_outliers(sizes, config.sd_multiplier);
    for (name, band) in [("body rows", report.body), ("last row", report.totals)] {
        if let Some(b) = band {
            log::info!(
                "Sizes {}: mean {:.3}, SD {:.3}, thresholds [{:.3}, {:.3}]",
                name,
                b.mean,
                b.sd,
                b.lower,
                b.upper
            );
        }
    }
    log::info!("{} outlier cells", report.cells.len());

    let sizes_marked = MarkedTable::new(sizes.clone(), marks_for(sizes, &report.cells));
    let counts_marked = MarkedTable::new(counts.clone(), marks_for(counts, &report.cells));
    (report, sizes_marked, counts_marked)
}

/// Values and outlier values pooled across tables.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct OutlierPool {
    pub values: Vec<f64>,
    pub outliers: Vec<f64>,
}

/// Pools of the body rows (orange outliers) and the summary rows (pink
/// outliers) of several previously highlighted count tables.
pub fn pool_outliers(tables: &[MarkedTable]) -> (OutlierPool, OutlierPool) {
    let mut body = OutlierPool::default();
    let mut totals = OutlierPool::default();

    for marked in tables {
        let Some((body_rows, last_row)) = marked.table.split_last_row() else {
            continue;
        };
        body.values.extend(body_rows.present_values());
        totals.values.extend(last_row.present_values());

        for ((row, column), highlight) in marked.marks.iter() {
            let Some(v) = marked.table.value(row, column) else {
                continue;
            };
            match highlight {
                Highlight::Outlier => body.outliers.push(v),
                Highlight::TotalOutlier => totals.outliers.push(v),
                _ => {}
            }
        }
    }

    (body, totals)
}

/// Distinct values with their frequency, ascending.
pub fn value_counts(values: &[f64]) -> Vec<(f64, usize)> {
    let mut sorted = values.to_vec();
    sorted.sort_by(f64::total_cmp);
    let mut counts: Vec<(f64, usize)> = Vec::new();
    for v in sorted {
        match counts.last_mut() {
            Some((last, n)) if *last == v => *n += 1,
            _ => counts.push((v, 1)),
        }
    }
    counts
}

/// One bin of the cumulative ratio histogram, `[lower, upper)`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RatioBin {
    pub lower: f64,
    pub upper: f64,
    pub share: f64,
}

/// The four views of the outlier frequency analysis.
#[derive(Debug, Clone, PartialEq)]
pub struct FrequencyAnalysis {
    /// Outlier frequency / value frequency per distinct value.
    pub ratio: Vec<(f64, f64)>,
    /// Density of the outlier values.
    pub kde: Option<Kde>,
    /// Cumulative outlier frequency / cumulative value frequency, for values
    /// with at least one outlier at or below them.
    pub cumulative: Vec<(f64, f64)>,
    /// Share of the cumulative ratio points per bin.
    pub binned: Vec<RatioBin>,
}

/// Runs the frequency analysis on a pool.
pub fn frequency_analysis(pool: &OutlierPool, config: &OutlierConfig) -> FrequencyAnalysis {
    let value_freq = value_counts(&pool.values);
    let outlier_freq = value_counts(&pool.outliers);
    let outlier_count = |v: f64| {
        outlier_freq
            .iter()
            .find(|(o, _)| *o == v)
            .map_or(0, |(_, n)| *n)
    };

    let mut keys: Vec<f64> = value_freq
        .iter()
        .chain(&outlier_freq)
        .map(|(v, _)| *v)
        .collect();
    keys.sort_by(f64::total_cmp);
    keys.dedup();
    let ratio = keys
        .iter()
        .map(|&v| {
            let total = value_freq.iter().find(|(x, _)| *x == v).map_or(0, |(_, n)| *n);
            let r = if total == 0 { 0.0 } else { outlier_count(v) as f64 / total as f64 };
            (v, r)
        })
        .collect();

    let kde = gaussian_kde(&pool.outliers, config.kde_bw_adjust, config.kde_cut, 200);

    let mut cumulative = Vec::new();
    let (mut cum_values, mut cum_outliers) = (0usize, 0usize);
    for &(v, n) in &value_freq {
        cum_values += n;
        cum_outliers += outlier_count(v);
        if cum_outliers > 0 {
            cumulative.push((v, cum_outliers as f64 / cum_values as f64));
        }
    }

    let binned = bin_points(&cumulative, config.frequency_bin_width);

    FrequencyAnalysis {
        ratio,
        kde,
        cumulative,
        binned,
    }
}

/// Left-closed bins of `width` from `floor(min)` past the max; each bin's
/// share of the points.
fn bin_points(points: &[(f64, f64)], width: f64) -> Vec<RatioBin> {
    if points.is_empty() || width <= 0.0 {
        return Vec::new();
    }
    let min = points.iter().map(|(v, _)| *v).fold(f64::INFINITY, f64::min).floor();
    let max = points.iter().map(|(v, _)| *v).fold(f64::NEG_INFINITY, f64::max);
    let n_bins = (((max - min) / width).floor() as usize) + 1;

    let mut counts = vec![0usize; n_bins];
    for (v, _) in points {
        let idx = (((v - min) / width).floor() as usize).min(n_bins - 1);
        counts[idx] += 1;
    }
    let total = points.len() as f64;
    counts
        .into_iter()
        .enumerate()
        .map(|(i, n)| RatioBin {
            lower: min + width * i as f64,
            upper: min + width * (i + 1) as f64,
            share: n as f64 / total,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sizes() -> RegionTable {
        let mut values: Vec<Vec<Option<f64>>> = (0..10).map(|_| vec![Some(10.0), Some(10.0)]).collect();
        values[3][1] = Some(100.0);
        values.push(vec![Some(50.0), Some(52.0)]);
        RegionTable::from_values(
            (0..11).map(|i| format!("s{:03}", i + 1)).collect(),
            vec!["CA1 L".into(), "DG L".into()],
            values,
        )
        .unwrap()
    }

    #[test]
    fn test_band_uses_population_sd() {
        let band = OutlierBand::from_values(&[2.0, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0], 2.0).unwrap();
        assert_eq!(band.mean, 5.0);
        assert_eq!(band.sd, 2.0);
        assert_eq!((band.lower, band.upper), (1.0, 9.0));
        assert!(!band.excludes(9.0));
        assert!(band.excludes(9.5));
    }

    #[test]
    fn test_find_outliers() {
        let report = find_outliers(&sizes(), 2.0);
        assert_eq!(
            report.cells,
            vec![OutlierCell { row: 3, column: 1, highlight: Highlight::Outlier }]
        );
        assert_eq!(report.body_values.len(), 20);
        assert_eq!(report.total_values, vec![50.0, 52.0]);
        assert_eq!(report.totals.unwrap().mean, 51.0);
    }

    #[test]
    fn test_highlight_outliers_applies_positions_to_counts() {
        let sizes = sizes();
        let mut counts = sizes.clone();
        counts.set_row_labels(
            (0..10).map(|i| format!("s{:03}", i + 1)).chain(["Total".to_string()]).collect(),
        )
        .unwrap();

        let (_, sizes_marked, counts_marked) =
            highlight_outliers(&sizes, &counts, &OutlierConfig::default());
        assert_eq!(sizes_marked.marks.get("s004", "DG L"), Some(Highlight::Outlier));
        assert_eq!(counts_marked.marks.get("s004", "DG L"), Some(Highlight::Outlier));
    }

    #[test]
    fn test_histogram() {
        let hist = Histogram::from_values(&[0.0, 1.0, 2.0, 3.0, 4.0], 4).unwrap();
        assert_eq!(hist.edges, vec![0.0, 1.0, 2.0, 3.0, 4.0]);
        assert_eq!(hist.counts, vec![1, 1, 1, 2]);

        let shared = Histogram::with_edges(&[0.5, 10.0], hist.edges.clone());
        assert_eq!(shared.counts, vec![1, 0, 0, 0]);
    }

    #[test]
    fn test_pool_outliers() {
        let mut marked = MarkedTable::unmarked(sizes());
        marked.marks.mark("s004", "DG L", Highlight::Outlier);
        marked.marks.mark("s011", "DG L", Highlight::TotalOutlier);
        marked.marks.mark("s001", "CA1 L", Highlight::Damaged);

        let (body, totals) = pool_outliers(&[marked.clone(), marked]);
        assert_eq!(body.values.len(), 40);
        assert_eq!(body.outliers, vec![100.0, 100.0]);
        assert_eq!(totals.outliers, vec![52.0, 52.0]);
    }

    #[test]
    fn test_frequency_analysis() {
        let pool = OutlierPool {
            values: vec![1.0, 1.0, 2.0, 3.0, 3.0, 60.0],
            outliers: vec![3.0, 60.0],
        };
        let analysis = frequency_analysis(&pool, &OutlierConfig::default());

        assert_eq!(
            analysis.ratio,
            vec![(1.0, 0.0), (2.0, 0.0), (3.0, 0.5), (60.0, 1.0)]
        );
        assert_eq!(analysis.cumulative, vec![(3.0, 0.2), (60.0, 2.0 / 6.0)]);
        assert_eq!(
            analysis.binned,
            vec![
                RatioBin { lower: 3.0, upper: 53.0, share: 0.5 },
                RatioBin { lower: 53.0, upper: 103.0, share: 0.5 },
            ]
        );
        assert!(analysis.kde.is_some());
    }

    #[test]
    fn test_value_counts() {
        assert_eq!(value_counts(&[2.0, 1.0, 2.0]), vec![(1.0, 1), (2.0, 2)]);
    }
}
