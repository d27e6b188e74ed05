//! Per-region object sizes and counts from `Objects__<slice>.csv` exports.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use rayon::prelude::*;

use crate::core::loaders::{load_export_column, preview_lines, LoaderError};
use crate::core::table::{Highlight, MarkedTable, RegionTable};

/// Column of the object exports holding object sizes.
pub const OBJECT_PIXELS_COLUMN: &str = "Object pixels";

/// Mean object size and object count of every region in one slice.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SliceObjects {
    by_region: HashMap<String, (f64, usize)>,
}

impl SliceObjects {
    /// Aggregates `(region, object pixels)` rows. Objects with a missing size
    /// are neither averaged nor counted.
    pub fn from_rows(rows: &[(String, Option<f64>)]) -> Self {
        let mut by_region: HashMap<String, (f64, usize)> = HashMap::new();
        for (region, pixels) in rows {
            if let Some(p) = pixels {
                let entry = by_region.entry(region.clone()).or_insert((0.0, 0));
                entry.0 += p;
                entry.1 += 1;
            }
        }
        Self { by_region }
    }

    /// Mean object size of a region; `None` when it has no objects.
    pub fn mean_size(&self, region: &str) -> Option<f64> {
        self.by_region
            .get(region)
            .map(|(sum, n)| sum / *n as f64)
    }

    /// Number of objects in a region.
    pub fn count(&self, region: &str) -> usize {
        self.by_region.get(region).map_or(0, |(_, n)| *n)
    }
}

/// Object sizes and counts shaped like the template.
#[derive(Debug, Clone)]
pub struct ObjectTables {
    pub sizes: MarkedTable,
    pub counts: MarkedTable,
    /// Slices whose export was missing.
    pub missing: Vec<String>,
    /// Slices whose export could not be parsed.
    pub malformed: Vec<PathBuf>,
}

/// Export path of one slice: `<folder>/Objects__<slice>.csv`.
pub fn object_export_path(folder: &Path, slice: &str) -> PathBuf {
    folder.join(format!("Objects__{slice}.csv"))
}

enum SliceLoad {
    Missing,
    Malformed(PathBuf, LoaderError),
    Loaded(SliceObjects),
}

fn load_slice(folder: &Path, slice: &str) -> SliceLoad {
    let path = object_export_path(folder, slice);
    if !path.exists() {
        return SliceLoad::Missing;
    }
    match load_export_column(&path, OBJECT_PIXELS_COLUMN) {
        Ok(rows) => SliceLoad::Loaded(SliceObjects::from_rows(&rows)),
        Err(e) => SliceLoad::Malformed(path, e),
    }
}

/// Fill size and count tables shaped like `template` from the object exports
/// in `folder`.
///
/// Slices whose export is missing or malformed keep empty rows. A slice with
/// an export but no objects in a region gets a count of 0 and no size.
/// `Adjusted` and `Damaged` highlights of the template are copied to both
/// outputs.
pub fn size_and_count_objects(folder: &Path, template: &MarkedTable) -> ObjectTables {
    let shape = &template.table;
    let loads: Vec<SliceLoad> = shape
        .rows()
        .par_iter()
        .map(|slice| load_slice(folder, slice))
        .collect();

    let mut sizes = RegionTable::new(shape.rows().to_vec(), shape.columns().to_vec())
        .with_index_name(shape.index_name.clone());
    let mut counts = sizes.clone();
    let mut missing = Vec::new();
    let mut malformed = Vec::new();

    for (r, (slice, load)) in shape.rows().iter().zip(loads).enumerate() {
        match load {
            SliceLoad::Missing => {
                log::warn!("Objects__{}.csv not found. Skipping...", slice);
                missing.push(slice.clone());
            }
            SliceLoad::Malformed(path, e) => {
                log::warn!("Error reading {}. It might be malformed: {}", path.display(), e);
                for line in preview_lines(&path, 5) {
                    log::warn!("  | {}", line);
                }
                malformed.push(path);
            }
            SliceLoad::Loaded(objects) => {
                for (c, region) in shape.columns().iter().enumerate() {
                    sizes.set(r, c, objects.mean_size(region));
                    counts.set(r, c, Some(objects.count(region) as f64));
                }
            }
        }
    }

    let kept = template.marks.filtered(Highlight::is_manual);
    ObjectTables {
        sizes: MarkedTable::new(sizes, kept.clone()),
        counts: MarkedTable::new(counts, kept),
        missing,
        malformed,
    }
}

/// Output names `<rat><_col?>_objects_sizes.xlsx` and
/// `<rat><_col?>_objects_counts.xlsx`.
pub fn object_file_names(rat: &str, colliculi: bool) -> (String, String) {
    let suffix = if colliculi { "_col" } else { "" };
    (
        format!("{rat}{suffix}_objects_sizes.xlsx"),
        format!("{rat}{suffix}_objects_counts.xlsx"),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::table::CellMarks;
    use std::fs::File;
    use std::io::Write;
    use tempfile::tempdir;

    fn template() -> MarkedTable {
        let table = RegionTable::new(
            vec!["s001".into(), "s002".into(), "s003".into()],
            vec!["CA1 L".into(), "DG L".into()],
        );
        let mut marks = CellMarks::new();
        marks.mark("s001", "CA1 L", Highlight::Adjusted);
        marks.mark("s002", "DG L", Highlight::Damaged);
        marks.mark("s003", "DG L", Highlight::Outlier);
        MarkedTable::new(table, marks)
    }

    #[test]
    fn test_slice_objects_aggregate() {
        let rows = vec![
            ("CA1 L".to_string(), Some(10.0)),
            ("CA1 L".to_string(), Some(20.0)),
            ("DG L".to_string(), None),
        ];
        let objects = SliceObjects::from_rows(&rows);
        assert_eq!(objects.mean_size("CA1 L"), Some(15.0));
        assert_eq!(objects.count("CA1 L"), 2);
        assert_eq!(objects.mean_size("DG L"), None);
        assert_eq!(objects.count("DG L"), 0);
    }

    #[test]
    fn test_size_and_count_objects() {
        let dir = tempdir().unwrap();
        let mut file = File::create(object_export_path(dir.path(), "s001")).unwrap();
        writeln!(file, "Object ID;Region Name;Object pixels").unwrap();
        writeln!(file, "1;CA1 L;30").unwrap();
        writeln!(file, "2;CA1 L;50").unwrap();
        writeln!(file, "3;CA3 L;70").unwrap();
        let mut bad = File::create(object_export_path(dir.path(), "s003")).unwrap();
        writeln!(bad, "not an export").unwrap();

        let result = size_and_count_objects(dir.path(), &template());

        assert_eq!(result.sizes.table.value("s001", "CA1 L"), Some(40.0));
        assert_eq!(result.counts.table.value("s001", "CA1 L"), Some(2.0));
        assert_eq!(result.sizes.table.value("s001", "DG L"), None);
        assert_eq!(result.counts.table.value("s001", "DG L"), Some(0.0));
        assert_eq!(result.counts.table.value("s002", "CA1 L"), None);
        assert_eq!(result.missing, vec!["s002".to_string()]);
        assert_eq!(result.malformed.len(), 1);

        assert_eq!(result.sizes.marks.len(), 2);
        assert_eq!(result.counts.marks.get("s002", "DG L"), Some(Highlight::Damaged));
        assert_eq!(result.counts.marks.get("s003", "DG L"), None);
    }

    #[test]
    fn test_object_file_names() {
        let (sizes, counts) = object_file_names("04", true);
        assert_eq!(sizes, "04_col_objects_sizes.xlsx");
        assert_eq!(counts, "04_col_objects_counts.xlsx");
    }
}
