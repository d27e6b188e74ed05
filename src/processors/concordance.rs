//! Sign concordance of laterality indices across regions.
//!
//! Two regions concord on a rat when their LI has the same sign. Regions are
//! ranked by average absolute LI; windowed concordance then measures how much
//! each region agrees with its neighbours in that ranking, and the regions of
//! high-concordance stretches are compared pairwise.

use rayon::prelude::*;

use crate::core::stats::{quantile, sign};
use crate::core::table::RegionTable;

use super::laterality::{li_column, LateralityError, Result};

/// A region with its LI values (one per rat) and their average magnitude.
#[derive(Debug, Clone, PartialEq)]
pub struct RankedRegion {
    pub label: String,
    pub li: Vec<Option<f64>>,
    pub average_abs_li: f64,
}

/// Σ|LI| over present values divided by the number of LI columns.
pub fn average_absolute_li(li: &[Option<f64>]) -> f64 {
    if li.is_empty() {
        return 0.0;
    }
    li.iter().flatten().map(|v| v.abs()).sum::<f64>() / li.len() as f64
}

/// Regions ordered by descending average absolute LI (stable for ties).
pub fn rank_by_average_absolute_li(table: &RegionTable, rats: &[String]) -> Result<Vec<RankedRegion>> {
    if rats.is_empty() {
        return Err(LateralityError::NoRats);
    }
    let columns: Vec<usize> = rats
        .iter()
        .map(|rat| {
            let name = li_column(rat);
            table
                .column_position(&name)
                .ok_or(LateralityError::MissingColumn(name))
        })
        .collect::<Result<_>>()?;

    let mut ranked: Vec<RankedRegion> = table
        .iter_rows()
        .map(|(label, cells)| {
            let li: Vec<Option<f64>> = columns.iter().map(|&c| cells[c]).collect();
            RankedRegion {
                label: label.to_string(),
                average_abs_li: average_absolute_li(&li),
                li,
            }
        })
        .collect();
    ranked.sort_by(|a, b| b.average_abs_li.total_cmp(&a.average_abs_li));
    Ok(ranked)
}

/// Fraction of rats on which the two LI vectors have the same sign.
/// A missing value never matches.
pub fn sign_concordance(a: &[Option<f64>], b: &[Option<f64>]) -> f64 {
    if a.is_empty() {
        return 0.0;
    }
    let matches = a
        .iter()
        .zip(b)
        .filter(|(x, y)| matches!((sign(**x), sign(**y)), (Some(p), Some(q)) if p == q))
        .count();
    matches as f64 / a.len() as f64
}

/// Unweighted concordance of each region with the regions at most `window`
/// positions away in the ranking (itself included).
pub fn windowed_concordance(regions: &[RankedRegion], window: usize) -> Vec<f64> {
    let n = regions.len();
    (0..n)
        .map(|i| {
            let start = i.saturating_sub(window);
            let end = (i + window + 1).min(n);
            let total: f64 = (start..end)
                .map(|j| sign_concordance(&regions[i].li, &regions[j].li))
                .sum();
            total / (end - start) as f64
        })
        .collect()
}

/// Maximal runs of consecutive positions whose concordance reaches the
/// `q` quantile of all concordance values.
pub fn high_concordance_clusters(concordance: &[f64], q: f64) -> Vec<Vec<usize>> {
    let Some(threshold) = quantile(concordance, q) else {
        return Vec::new();
    };
    let mut clusters = Vec::new();
    let mut current = Vec::new();
    for (i, &value) in concordance.iter().enumerate() {
        if value >= threshold {
            current.push(i);
        } else if !current.is_empty() {
            clusters.push(std::mem::take(&mut current));
        }
    }
    if !current.is_empty() {
        clusters.push(current);
    }
    clusters
}

/// Square matrix of pairwise sign concordance.
#[derive(Debug, Clone, PartialEq)]
pub struct ConcordanceMatrix {
    pub labels: Vec<String>,
    pub values: Vec<Vec<f64>>,
}

impl ConcordanceMatrix {
    /// Pairwise concordance of the given regions, rows computed in parallel.
    pub fn pairwise(regions: &[&RankedRegion]) -> Self {
        let values = regions
            .par_iter()
            .map(|a| {
                regions
                    .iter()
                    .map(|b| sign_concordance(&a.li, &b.li))
                    .collect()
            })
            .collect();
        Self {
            labels: regions.iter().map(|r| r.label.clone()).collect(),
            values,
        }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.labels.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    pub fn row_means(&self) -> Vec<f64> {
        self.values
            .iter()
            .map(|row| {
                if row.is_empty() {
                    0.0
                } else {
                    row.iter().sum::<f64>() / row.len() as f64
                }
            })
            .collect()
    }

    /// Rows and columns reordered by descending row mean (stable).
    pub fn ordered_by_row_mean(&self) -> Self {
        let means = self.row_means();
        let mut order: Vec<usize> = (0..self.len()).collect();
        order.sort_by(|&a, &b| means[b].total_cmp(&means[a]));

        Self {
            labels: order.iter().map(|&i| self.labels[i].clone()).collect(),
            values: order
                .iter()
                .map(|&i| order.iter().map(|&j| self.values[i][j]).collect())
                .collect(),
        }
    }
}

/// Full concordance analysis of an LI table.
#[derive(Debug, Clone)]
pub struct ConcordanceAnalysis {
    pub ranked: Vec<RankedRegion>,
    pub windowed: Vec<f64>,
    pub clusters: Vec<Vec<usize>>,
    /// Pairwise matrix of all clustered regions, ordered by row mean.
    pub matrix: ConcordanceMatrix,
}

/// Ranks regions, computes windowed concordance, finds clusters and builds
/// the ordered pairwise matrix.
pub fn analyze(table: &RegionTable, rats: &[String], window: usize, q: f64) -> Result<ConcordanceAnalysis> {
    let ranked = rank_by_average_absolute_li(table, rats)?;
    let windowed = windowed_concordance(&ranked, window);
    let clusters = high_concordance_clusters(&windowed, q);

    let clustered: Vec<&RankedRegion> = clusters.iter().flatten().map(|&i| &ranked[i]).collect();
    let matrix = ConcordanceMatrix::pairwise(&clustered).ordered_by_row_mean();

    log::info!(
        "{} regions ranked, {} high-concordance clusters ({} regions)",
        ranked.len(),
        clusters.len(),
        matrix.len()
    );

    Ok(ConcordanceAnalysis {
        ranked,
        windowed,
        clusters,
        matrix,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn region(label: &str, li: &[Option<f64>]) -> RankedRegion {
        RankedRegion {
            label: label.into(),
            li: li.to_vec(),
            average_abs_li: average_absolute_li(li),
        }
    }

    #[test]
    fn test_average_absolute_li_divides_by_all_columns() {
        assert_eq!(average_absolute_li(&[Some(0.5), Some(-0.3), None, Some(0.2)]), 0.25);
    }

    #[test]
    fn test_sign_concordance() {
        let a = [Some(0.2), Some(-0.1), None, Some(0.0)];
        assert_eq!(sign_concordance(&a, &a), 0.75);
        let b = [Some(0.4), Some(0.1), Some(0.3), Some(0.0)];
        assert_eq!(sign_concordance(&a, &b), 0.5);

        let full = [Some(0.2), Some(-0.1)];
        assert_eq!(sign_concordance(&full, &full), 1.0);
    }

    #[test]
    fn test_rank_by_average_absolute_li() {
        let table = RegionTable::from_values(
            vec!["A".into(), "B".into(), "C".into()],
            vec!["03_LI".into(), "04_LI".into()],
            vec![
                vec![Some(0.1), Some(0.1)],
                vec![Some(-0.5), Some(0.3)],
                vec![Some(0.1), Some(-0.1)],
            ],
        )
        .unwrap();
        let rats = vec!["03".to_string(), "04".to_string()];

        let ranked = rank_by_average_absolute_li(&table, &rats).unwrap();
        let labels: Vec<&str> = ranked.iter().map(|r| r.label.as_str()).collect();
        assert_eq!(labels, vec!["B", "A", "C"]);

        let missing = rank_by_average_absolute_li(&table, &["05".to_string()]);
        assert_eq!(missing, Err(LateralityError::MissingColumn("05_LI".into())));
    }

    #[test]
    fn test_windowed_concordance() {
        let regions = vec![
            region("A", &[Some(1.0), Some(1.0)]),
            region("B", &[Some(1.0), Some(1.0)]),
            region("C", &[Some(-1.0), Some(-1.0)]),
        ];
        let windowed = windowed_concordance(&regions, 1);
        assert_eq!(windowed[0], 1.0);
        assert!((windowed[1] - 2.0 / 3.0).abs() < 1e-12);
        assert_eq!(windowed[2], 0.5);
    }

    #[test]
    fn test_high_concordance_clusters() {
        let concordance = [0.9, 0.9, 0.2, 0.3, 0.9, 0.1, 0.2, 0.3];
        assert_eq!(
            high_concordance_clusters(&concordance, 0.75),
            vec![vec![0, 1], vec![4]]
        );
        assert!(high_concordance_clusters(&[], 0.75).is_empty());
    }

    #[test]
    fn test_pairwise_matrix_ordering() {
        let a = region("A", &[Some(1.0), Some(-1.0)]);
        let b = region("B", &[Some(1.0), Some(1.0)]);
        let c = region("C", &[Some(1.0), Some(1.0)]);

        let matrix = ConcordanceMatrix::pairwise(&[&a, &b, &c]);
        assert_eq!(matrix.values[0], vec![1.0, 0.5, 0.5]);
        assert_eq!(matrix.values[1][1], 1.0);

        let ordered = matrix.ordered_by_row_mean();
        assert_eq!(ordered.labels, vec!["B", "C", "A"]);
        assert_eq!(ordered.values[2], vec![0.5, 0.5, 1.0]);
    }

    #[test]
    fn test_analyze() {
        let table = RegionTable::from_values(
            (0..8).map(|i| format!("R{i}")).collect(),
            vec!["03_LI".into(), "04_LI".into()],
            (0..8)
                .map(|i| {
                    let v = 0.9 - i as f64 * 0.1;
                    vec![Some(v), Some(if i % 3 == 0 { -v } else { v })]
                })
                .collect(),
        )
        .unwrap();

        let analysis = analyze(&table, &["03".into(), "04".into()], 5, 0.75).unwrap();
        assert_eq!(analysis.ranked.len(), 8);
        assert_eq!(analysis.windowed.len(), 8);
        let clustered: usize = analysis.clusters.iter().map(Vec::len).sum();
        assert_eq!(analysis.matrix.len(), clustered);
        assert!(clustered >= 2);
    }
}
