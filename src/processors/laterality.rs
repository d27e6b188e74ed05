//! Laterality index and the per-rat statistics behind the laterality plots.
//!
//! LI = (L − R) / (L + R) of the left and right hemisphere densities of a
//! region: +1 when only the left side has objects, −1 when only the right.

use regex::Regex;
use thiserror::Error;

use crate::core::stats::{mean, std_dev};
use crate::core::table::{RegionTable, TableError};

use super::pairing::Side;

/// Errors raised by the laterality steps.
#[derive(Debug, Error, PartialEq)]
pub enum LateralityError {
    #[error("Missing column '{0}'")]
    MissingColumn(String),

    #[error("No '<rat>_densities L' columns found")]
    NoRats,

    #[error(transparent)]
    Table(#[from] TableError),
}

/// Result type for laterality operations.
pub type Result<T> = std::result::Result<T, LateralityError>;

/// `<rat>_densities L` / `<rat>_densities R`.
pub fn densities_column(rat: &str, side: Side) -> String {
    format!("{rat}_densities{}", side.suffix())
}

/// `<rat>_LI`.
pub fn li_column(rat: &str) -> String {
    format!("{rat}_LI")
}

/// (L − R) / (L + R); missing when a side is missing or L + R = 0.
pub fn laterality_index(left: Option<f64>, right: Option<f64>) -> Option<f64> {
    let (l, r) = (left?, right?);
    let sum = l + r;
    if sum == 0.0 {
        return None;
    }
    Some((l - r) / sum)
}

/// Rat ids with both `<rat>_densities L` and `<rat>_densities R` columns, in
/// column order.
pub fn detect_rats(table: &RegionTable) -> Vec<String> {
    let Ok(pattern) = Regex::new(r"^(.+)_densities L$") else {
        return Vec::new();
    };
    table
        .columns()
        .iter()
        .filter_map(|c| pattern.captures(c))
        .filter_map(|caps| caps.get(1).map(|m| m.as_str().to_string()))
        .filter(|rat| table.column_position(&densities_column(rat, Side::Right)).is_some())
        .collect()
}

/// Rat ids of the `<rat>_LI` columns, in column order.
pub fn li_rats(table: &RegionTable) -> Vec<String> {
    table
        .columns()
        .iter()
        .filter_map(|c| c.strip_suffix("_LI"))
        .map(str::to_string)
        .collect()
}

fn required_column(table: &RegionTable, name: &str) -> Result<Vec<Option<f64>>> {
    table
        .column_by_name(name)
        .ok_or_else(|| LateralityError::MissingColumn(name.to_string()))
}

/// Appends (or overwrites) a `<rat>_LI` column for every rat.
///
/// With an empty `rats` list the rats are detected from the columns.
/// Returns the rat ids processed.
pub fn add_laterality_indices(table: &mut RegionTable, rats: &[String]) -> Result<Vec<String>> {
    let rats = if rats.is_empty() {
        detect_rats(table)
    } else {
        rats.to_vec()
    };
    if rats.is_empty() {
        return Err(LateralityError::NoRats);
    }

    for rat in &rats {
        let left = required_column(table, &densities_column(rat, Side::Left))?;
        let right = required_column(table, &densities_column(rat, Side::Right))?;
        let li: Vec<Option<f64>> = left
            .into_iter()
            .zip(right)
            .map(|(l, r)| laterality_index(l, r))
            .collect();

        let name = li_column(rat);
        match table.column_position(&name) {
            Some(c) => {
                for (r, value) in li.into_iter().enumerate() {
                    table.set(r, c, value);
                }
            }
            None => table.push_column(name, li)?,
        }
    }

    Ok(rats)
}

/// Copy of `table` without the rows whose label is in `excluded`.
pub fn without_labels(table: &RegionTable, excluded: &[String]) -> RegionTable {
    let mut kept = table.clone();
    kept.retain_rows(|label, _| !excluded.iter().any(|e| e == label));
    kept
}

/// Mean LI with the limits of agreement mean ± z·SD (sample SD).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AgreementStats {
    pub mean: f64,
    pub sd: f64,
    pub lower: f64,
    pub upper: f64,
}

/// Bland-Altman data of one rat.
#[derive(Debug, Clone, PartialEq)]
pub struct BlandAltman {
    pub rat: String,
    /// `((L + R) / 2, LI)` for rows where both exist.
    pub points: Vec<(f64, f64)>,
    /// `None` with fewer than two LI values.
    pub stats: Option<AgreementStats>,
}

/// Limits of agreement of a set of LI values.
pub fn agreement_stats(values: &[f64], z: f64) -> Option<AgreementStats> {
    let m = mean(values)?;
    let sd = std_dev(values, 1)?;
    Some(AgreementStats {
        mean: m,
        sd,
        lower: m - z * sd,
        upper: m + z * sd,
    })
}

/// Bland-Altman points and statistics of one rat.
pub fn bland_altman(table: &RegionTable, rat: &str, z: f64) -> Result<BlandAltman> {
    let left = required_column(table, &densities_column(rat, Side::Left))?;
    let right = required_column(table, &densities_column(rat, Side::Right))?;
    let li = required_column(table, &li_column(rat))?;

    let points = left
        .iter()
        .zip(&right)
        .zip(&li)
        .filter_map(|((l, r), li)| Some(((l.as_ref()? + r.as_ref()?) / 2.0, (*li)?)))
        .collect();
    let values: Vec<f64> = li.into_iter().flatten().collect();

    Ok(BlandAltman {
        rat: rat.to_string(),
        points,
        stats: agreement_stats(&values, z),
    })
}

/// `(R, L)` density pairs of one rat, rows with a missing side skipped.
pub fn scatter_points(table: &RegionTable, rat: &str) -> Result<Vec<(f64, f64)>> {
    let left = required_column(table, &densities_column(rat, Side::Left))?;
    let right = required_column(table, &densities_column(rat, Side::Right))?;
    Ok(right
        .into_iter()
        .zip(left)
        .filter_map(|(r, l)| Some((r?, l?)))
        .collect())
}

/// Slope of the least-squares line through the origin: Σxy / Σx².
pub fn zero_constrained_slope(points: &[(f64, f64)]) -> Option<f64> {
    let sxy: f64 = points.iter().map(|(x, y)| x * y).sum();
    let sxx: f64 = points.iter().map(|(x, _)| x * x).sum();
    (sxx != 0.0).then(|| sxy / sxx)
}

/// `(label, LI)` of one rat ordered by descending |LI|. Missing LI values are
/// left out.
pub fn ranked_by_magnitude(table: &RegionTable, rat: &str) -> Result<Vec<(String, f64)>> {
    let li = required_column(table, &li_column(rat))?;
    let mut ranked: Vec<(String, f64)> = table
        .rows()
        .iter()
        .zip(li)
        .filter_map(|(label, v)| Some((label.clone(), v?)))
        .collect();
    ranked.sort_by(|a, b| b.1.abs().total_cmp(&a.1.abs()));
    Ok(ranked)
}

/// Output name `<stem>_with_LI.xlsx`.
pub fn with_li_file_name(stem: &str) -> String {
    format!("{stem}_with_LI.xlsx")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn processed() -> RegionTable {
        RegionTable::from_values(
            vec!["CA1".into(), "DG".into(), "4th ventricle".into()],
            vec![
                "03_densities R".into(),
                "03_objects_counts R".into(),
                "03_densities L".into(),
                "03_objects_counts L".into(),
            ],
            vec![
                vec![Some(1.0), Some(5.0), Some(3.0), Some(5.0)],
                vec![Some(0.0), Some(5.0), Some(0.0), Some(5.0)],
                vec![Some(2.0), Some(5.0), Some(2.0), Some(5.0)],
            ],
        )
        .unwrap()
        .with_index_name("Base Label")
    }

    #[test]
    fn test_laterality_index() {
        assert_eq!(laterality_index(Some(3.0), Some(1.0)), Some(0.5));
        assert_eq!(laterality_index(Some(1.0), Some(3.0)), Some(-0.5));
        assert_eq!(laterality_index(Some(0.0), Some(0.0)), None);
        assert_eq!(laterality_index(None, Some(1.0)), None);
    }

    #[test]
    fn test_detect_rats() {
        assert_eq!(detect_rats(&processed()), vec!["03".to_string()]);
    }

    #[test]
    fn test_add_laterality_indices() {
        let mut table = processed();
        let rats = add_laterality_indices(&mut table, &[]).unwrap();
        assert_eq!(rats, vec!["03".to_string()]);
        assert_eq!(table.value("CA1", "03_LI"), Some(0.5));
        assert_eq!(table.value("DG", "03_LI"), None);

        // Re-running overwrites instead of duplicating.
        add_laterality_indices(&mut table, &rats).unwrap();
        assert_eq!(table.n_cols(), 5);
        assert_eq!(li_rats(&table), vec!["03".to_string()]);
    }

    #[test]
    fn test_add_laterality_indices_missing_column() {
        let mut table = processed();
        let result = add_laterality_indices(&mut table, &["04".to_string()]);
        assert_eq!(
            result,
            Err(LateralityError::MissingColumn("04_densities L".into()))
        );
    }

    #[test]
    fn test_bland_altman_uses_sample_sd() {
        let mut table = processed();
        add_laterality_indices(&mut table, &[]).unwrap();
        let ba = bland_altman(&table, "03", 1.96).unwrap();

        assert_eq!(ba.points, vec![(2.0, 0.5), (2.0, 0.0)]);
        let stats = ba.stats.unwrap();
        assert!((stats.mean - 0.25).abs() < 1e-12);
        let sd = (0.125f64).sqrt();
        assert!((stats.sd - sd).abs() < 1e-12);
        assert!((stats.upper - (0.25 + 1.96 * sd)).abs() < 1e-12);
    }

    #[test]
    fn test_zero_constrained_slope() {
        let points = vec![(1.0, 2.0), (2.0, 4.0), (3.0, 6.0)];
        assert_eq!(zero_constrained_slope(&points), Some(2.0));
        assert_eq!(zero_constrained_slope(&[(0.0, 1.0)]), None);
    }

    #[test]
    fn test_ranked_by_magnitude_and_exclusion() {
        let mut table = RegionTable::from_values(
            vec!["A".into(), "B".into(), "C".into()],
            vec!["03_LI".into()],
            vec![vec![Some(0.1)], vec![Some(-0.7)], vec![None]],
        )
        .unwrap();
        let ranked = ranked_by_magnitude(&table, "03").unwrap();
        assert_eq!(ranked, vec![("B".to_string(), -0.7), ("A".to_string(), 0.1)]);

        table = without_labels(&table, &["B".to_string()]);
        assert_eq!(table.rows(), &["A".to_string(), "C".to_string()][..]);
    }
}
