//! Merging per-slice atlas exports into a slice-by-region table.
//!
//! Each `RefAtlasRegions__sNNN.csv` export holds one row per atlas region for
//! a single slice. The merged table has one row per slice (`s001` up to the
//! highest slice number seen, gaps left empty) and one column per region in
//! first-seen order.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::fs;
use std::path::{Path, PathBuf};

use rayon::prelude::*;
use thiserror::Error;

use crate::core::labels::{qc_label, slice_number_from_file_name};
use crate::core::loaders::{load_export_column, preview_lines};
use crate::core::table::RegionTable;

/// File name marker of the region exports.
pub const REGION_EXPORT_MARKER: &str = "RefAtlasRegions__s";

/// Value column holding object counts.
pub const OBJECT_COUNT_COLUMN: &str = "Object count";

/// Value column holding region areas in pixels.
pub const REGION_PIXELS_COLUMN: &str = "Region pixels";

/// Errors that can occur while merging slice exports.
#[derive(Debug, Error)]
pub enum MergeError {
    #[error("Failed to list directory {path}: {source}")]
    ReadDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("No slice exports could be parsed in {0}")]
    NoTables(PathBuf),
}

/// Result type for merge operations.
pub type Result<T> = std::result::Result<T, MergeError>;

/// Outcome of a merge.
#[derive(Debug, Clone)]
pub struct MergeReport {
    /// Merged slice-by-region table.
    pub table: RegionTable,
    /// Export files found.
    pub files_found: usize,
    /// Export files skipped because they could not be parsed.
    pub files_skipped: Vec<PathBuf>,
}

/// Find region exports in a folder, sorted by slice number.
///
/// Files whose name contains the export marker but carries no parsable
/// slice number are ignored.
pub fn find_slice_exports(folder: &Path) -> Result<Vec<(u32, PathBuf)>> {
    let entries = fs::read_dir(folder).map_err(|e| MergeError::ReadDir {
        path: folder.to_path_buf(),
        source: e,
    })?;

    let mut exports: Vec<(u32, PathBuf)> = entries
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .filter_map(|path| {
            let name = path.file_name()?.to_str()?;
            if !name.contains(REGION_EXPORT_MARKER) || !name.ends_with(".csv") {
                return None;
            }
            let slice = slice_number_from_file_name(name)?;
            Some((slice, path))
        })
        .collect();

    exports.sort();
    Ok(exports)
}

/// Merge the given exports, reading `value_column` from each.
///
/// Malformed files are logged together with their first lines and skipped.
///
/// # Errors
///
/// Returns [`MergeError::NoTables`] when no file could be parsed.
pub fn merge_slice_exports(
    folder: &Path,
    exports: &[(u32, PathBuf)],
    value_column: &str,
) -> Result<MergeReport> {
    let parsed: Vec<(u32, &PathBuf, _)> = exports
        .par_iter()
        .map(|(slice, path)| (*slice, path, load_export_column(path, value_column)))
        .collect();

    let mut columns: Vec<String> = Vec::new();
    let mut seen: HashMap<String, usize> = HashMap::new();
    let mut slices: BTreeMap<u32, Vec<(usize, Option<f64>)>> = BTreeMap::new();
    let mut skipped = Vec::new();

    for (slice, path, result) in parsed {
        match result {
            Ok(rows) => {
                let cells = slices.entry(slice).or_default();
                for (region, value) in rows {
                    let idx = *seen.entry(region.clone()).or_insert_with(|| {
                        columns.push(region);
                        columns.len() - 1
                    });
                    cells.push((idx, value));
                }
            }
            Err(e) => {
                log::warn!(
                    "Error reading {}. It might be malformed: {}",
                    path.display(),
                    e
                );
                for line in preview_lines(path, 5) {
                    log::warn!("  | {}", line);
                }
                skipped.push(path.clone());
            }
        }
    }

    if slices.is_empty() {
        return Err(MergeError::NoTables(folder.to_path_buf()));
    }

    let max_slice = exports.iter().map(|(s, _)| *s).max().unwrap_or(0);
    let row_numbers: BTreeSet<u32> = (1..=max_slice).chain(slices.keys().copied()).collect();

    let labels: Vec<String> = row_numbers.iter().map(|&n| qc_label(n)).collect();
    let mut table = RegionTable::new(labels, columns);
    for (r, number) in row_numbers.iter().enumerate() {
        if let Some(cells) = slices.get(number) {
            for &(c, value) in cells {
                table.set(r, c, value);
            }
        }
    }

    Ok(MergeReport {
        table,
        files_found: exports.len(),
        files_skipped: skipped,
    })
}

/// Find and merge every region export in `folder`.
pub fn merge_folder(folder: &Path, value_column: &str) -> Result<MergeReport> {
    let exports = find_slice_exports(folder)?;
    log::info!(
        "Found {} region exports in {}",
        exports.len(),
        folder.display()
    );
    merge_slice_exports(folder, &exports, value_column)
}

/// Output file name: `<rat><_col?>_objects.xlsx` for counts,
/// `<rat><_col?>_regions.xlsx` for any other value column.
pub fn merged_file_name(rat: &str, colliculi: bool, value_column: &str) -> String {
    let suffix = if colliculi { "_col" } else { "" };
    let kind = if value_column == OBJECT_COUNT_COLUMN {
        "objects"
    } else {
        "regions"
    };
    format!("{rat}{suffix}_{kind}.xlsx")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs::File;
    use std::io::Write;
    use tempfile::tempdir;

    fn write_export(dir: &Path, name: &str, rows: &[(&str, &str)]) {
        let mut file = File::create(dir.join(name)).unwrap();
        writeln!(file, "Region ID;Region Name;Region pixels;Object count").unwrap();
        for (i, (region, count)) in rows.iter().enumerate() {
            writeln!(file, "{};{};100;{}", i, region, count).unwrap();
        }
    }

    #[test]
    fn test_find_slice_exports_sorted() {
        let dir = tempdir().unwrap();
        write_export(dir.path(), "RefAtlasRegions__s010.csv", &[]);
        write_export(dir.path(), "RefAtlasRegions__s002.csv", &[]);
        write_export(dir.path(), "Objects__s001.csv", &[]);
        File::create(dir.path().join("RefAtlasRegions__s003.txt")).unwrap();

        let exports = find_slice_exports(dir.path()).unwrap();
        let numbers: Vec<u32> = exports.iter().map(|(n, _)| *n).collect();
        assert_eq!(numbers, vec![2, 10]);
    }

    #[test]
    fn test_merge_fills_missing_slices() {
        let dir = tempdir().unwrap();
        write_export(dir.path(), "RefAtlasRegions__s001.csv", &[("CA1 L", "5"), ("CA1 R", "7")]);
        write_export(dir.path(), "RefAtlasRegions__s003.csv", &[("CA1 R", "2"), ("DG L", "1")]);

        let report = merge_folder(dir.path(), OBJECT_COUNT_COLUMN).unwrap();
        let table = report.table;

        assert_eq!(report.files_found, 2);
        assert_eq!(table.rows(), &["s001", "s002", "s003"].map(String::from)[..]);
        assert_eq!(table.columns(), &["CA1 L", "CA1 R", "DG L"].map(String::from)[..]);
        assert_eq!(table.value("s001", "CA1 R"), Some(7.0));
        assert_eq!(table.value("s003", "CA1 L"), None);
        assert!(table.row_values(1).iter().all(Option::is_none));
    }

    #[test]
    fn test_merge_skips_malformed_file() {
        let dir = tempdir().unwrap();
        write_export(dir.path(), "RefAtlasRegions__s001.csv", &[("CA1 L", "5")]);
        let mut bad = File::create(dir.path().join("RefAtlasRegions__s002.csv")).unwrap();
        writeln!(bad, "garbage without the expected header").unwrap();

        let report = merge_folder(dir.path(), OBJECT_COUNT_COLUMN).unwrap();
        assert_eq!(report.files_skipped.len(), 1);
        assert_eq!(report.table.n_rows(), 2);
    }

    #[test]
    fn test_merge_without_tables_fails() {
        let dir = tempdir().unwrap();
        let result = merge_folder(dir.path(), OBJECT_COUNT_COLUMN);
        assert!(matches!(result, Err(MergeError::NoTables(_))));
    }

    #[test]
    fn test_merged_file_name() {
        assert_eq!(merged_file_name("03", false, OBJECT_COUNT_COLUMN), "03_objects.xlsx");
        assert_eq!(merged_file_name("03", true, REGION_PIXELS_COLUMN), "03_col_regions.xlsx");
    }
}
