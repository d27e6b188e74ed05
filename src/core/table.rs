//! Region-by-slice tables and the cell highlight side channel.
//!
//! Every spreadsheet in the pipeline is an index-addressed grid: the first
//! column holds row labels (slice identifiers such as `s003`, or region base
//! labels in summary tables) and the header row holds column names. Numeric
//! cells are `Option<f64>`; `None` is a missing value.
//!
//! Manual annotations travel between pipeline steps as cell background
//! colours. [`CellMarks`] keeps them keyed by `(row label, column name)` so
//! they survive row reordering and re-indexing.

use std::collections::BTreeMap;

use thiserror::Error;

/// Errors raised when a table would become non-rectangular.
#[derive(Error, Debug, PartialEq)]
pub enum TableError {
    #[error("row '{label}' has {found} cells, table has {expected} columns")]
    RowLength {
        label: String,
        expected: usize,
        found: usize,
    },

    #[error("column '{name}' has {found} cells, table has {expected} rows")]
    ColumnLength {
        name: String,
        expected: usize,
        found: usize,
    },

    #[error("expected {expected} row labels, got {found}")]
    LabelCount { expected: usize, found: usize },
}

/// Result type for table operations.
pub type Result<T> = std::result::Result<T, TableError>;

/// Cell background colours with a meaning in the pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Highlight {
    /// Yellow: value taken from the colliculi alignment.
    Adjusted,
    /// Green: slice damaged for this region.
    Damaged,
    /// Orange: outlier among body rows.
    Outlier,
    /// Pink: outlier in the trailing totals row.
    TotalOutlier,
}

impl Highlight {
    /// All highlight kinds, in declaration order.
    pub const ALL: [Highlight; 4] = [
        Highlight::Adjusted,
        Highlight::Damaged,
        Highlight::Outlier,
        Highlight::TotalOutlier,
    ];

    /// RGB hex code of the fill colour.
    pub const fn rgb(self) -> &'static str {
        match self {
            Highlight::Adjusted => "FFFF00",
            Highlight::Damaged => "008000",
            Highlight::Outlier => "FF6600",
            Highlight::TotalOutlier => "FF00FF",
        }
    }

    /// Opaque ARGB code used when writing workbooks.
    pub fn argb(self) -> String {
        format!("FF{}", self.rgb())
    }

    /// Match a fill colour code (`RRGGBB` or `AARRGGBB`) against the known
    /// highlights. The alpha byte is ignored.
    pub fn from_argb(code: &str) -> Option<Self> {
        let code = code.trim();
        let rgb = code.get(code.len().checked_sub(6)?..)?;
        Self::ALL
            .into_iter()
            .find(|h| h.rgb().eq_ignore_ascii_case(rgb))
    }

    /// Marks placed by hand during quality control (as opposed to outlier marks).
    pub const fn is_manual(self) -> bool {
        matches!(self, Highlight::Adjusted | Highlight::Damaged)
    }
}

/// Highlighted cells keyed by `(row label, column name)`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CellMarks {
    marks: BTreeMap<(String, String), Highlight>,
}

impl CellMarks {
    /// Creates an empty set of marks.
    pub fn new() -> Self {
        Self::default()
    }

    /// Marks a cell, replacing any previous highlight.
    pub fn mark(&mut self, row: impl Into<String>, column: impl Into<String>, highlight: Highlight) {
        self.marks.insert((row.into(), column.into()), highlight);
    }

    /// Highlight of a cell, if any.
    pub fn get(&self, row: &str, column: &str) -> Option<Highlight> {
        self.marks
            .get(&(row.to_string(), column.to_string()))
            .copied()
    }

    /// Removes the highlight of a cell.
    pub fn unmark(&mut self, row: &str, column: &str) -> Option<Highlight> {
        self.marks.remove(&(row.to_string(), column.to_string()))
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.marks.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.marks.is_empty()
    }

    /// Iterates over `((row, column), highlight)` in label order.
    pub fn iter(&self) -> impl Iterator<Item = (&(String, String), &Highlight)> {
        self.marks.iter()
    }

    /// Cells carrying the given highlight.
    pub fn cells_with(&self, highlight: Highlight) -> Vec<(String, String)> {
        self.marks
            .iter()
            .filter(|(_, h)| **h == highlight)
            .map(|(key, _)| key.clone())
            .collect()
    }

    /// Returns only the marks whose highlight satisfies `keep`.
    pub fn filtered(&self, keep: impl Fn(Highlight) -> bool) -> CellMarks {
        CellMarks {
            marks: self
                .marks
                .iter()
                .filter(|(_, h)| keep(**h))
                .map(|(k, h)| (k.clone(), *h))
                .collect(),
        }
    }

    /// Copies every mark of `other` into `self`. Marks in `other` win.
    pub fn merge(&mut self, other: &CellMarks) {
        for (key, highlight) in &other.marks {
            self.marks.insert(key.clone(), *highlight);
        }
    }

    /// Renames row labels through `rename`, e.g. after slice label normalisation.
    pub fn rename_rows(&mut self, rename: impl Fn(&str) -> String) {
        let marks = std::mem::take(&mut self.marks);
        self.marks = marks
            .into_iter()
            .map(|((row, column), h)| ((rename(&row), column), h))
            .collect();
    }
}

/// Index-addressed numeric table.
#[derive(Debug, Clone, PartialEq)]
pub struct RegionTable {
    /// Header of the index column (empty for slice tables).
    pub index_name: String,
    rows: Vec<String>,
    columns: Vec<String>,
    values: Vec<Vec<Option<f64>>>,
}

impl RegionTable {
    /// Creates a table of the given shape with every cell missing.
    pub fn new(rows: Vec<String>, columns: Vec<String>) -> Self {
        let values = vec![vec![None; columns.len()]; rows.len()];
        Self {
            index_name: String::new(),
            rows,
            columns,
            values,
        }
    }

    /// Creates a table from row-major values, checking the shape.
    pub fn from_values(
        rows: Vec<String>,
        columns: Vec<String>,
        values: Vec<Vec<Option<f64>>>,
    ) -> Result<Self> {
        if values.len() != rows.len() {
            return Err(TableError::LabelCount {
                expected: values.len(),
                found: rows.len(),
            });
        }
        for (label, row) in rows.iter().zip(&values) {
            if row.len() != columns.len() {
                return Err(TableError::RowLength {
                    label: label.clone(),
                    expected: columns.len(),
                    found: row.len(),
                });
            }
        }
        Ok(Self {
            index_name: String::new(),
            rows,
            columns,
            values,
        })
    }

    /// Sets the index column header.
    pub fn with_index_name(mut self, name: impl Into<String>) -> Self {
        self.index_name = name.into();
        self
    }

    #[inline]
    pub fn rows(&self) -> &[String] {
        &self.rows
    }

    #[inline]
    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    #[inline]
    pub fn n_rows(&self) -> usize {
        self.rows.len()
    }

    #[inline]
    pub fn n_cols(&self) -> usize {
        self.columns.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty() || self.columns.is_empty()
    }

    pub fn row_position(&self, label: &str) -> Option<usize> {
        self.rows.iter().position(|r| r == label)
    }

    pub fn column_position(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == name)
    }

    /// Positional read; out-of-range positions read as missing.
    #[inline]
    pub fn get(&self, row: usize, column: usize) -> Option<f64> {
        self.values.get(row).and_then(|r| r.get(column)).copied().flatten()
    }

    /// Positional write; out-of-range positions are ignored.
    #[inline]
    pub fn set(&mut self, row: usize, column: usize, value: Option<f64>) {
        if let Some(cell) = self.values.get_mut(row).and_then(|r| r.get_mut(column)) {
            *cell = value;
        }
    }

    /// Read by labels.
    pub fn value(&self, row: &str, column: &str) -> Option<f64> {
        let r = self.row_position(row)?;
        let c = self.column_position(column)?;
        self.get(r, c)
    }

    /// Write by labels. Returns `false` when either label is unknown.
    pub fn set_value(&mut self, row: &str, column: &str, value: Option<f64>) -> bool {
        match (self.row_position(row), self.column_position(column)) {
            (Some(r), Some(c)) => {
                self.set(r, c, value);
                true
            }
            _ => false,
        }
    }

    /// Cells of one row.
    pub fn row_values(&self, row: usize) -> &[Option<f64>] {
        self.values.get(row).map_or(&[], |r| r.as_slice())
    }

    /// Cells of one column, top to bottom.
    pub fn column_values(&self, column: usize) -> Vec<Option<f64>> {
        self.values
            .iter()
            .map(|r| r.get(column).copied().flatten())
            .collect()
    }

    /// Cells of a named column, if it exists.
    pub fn column_by_name(&self, name: &str) -> Option<Vec<Option<f64>>> {
        self.column_position(name).map(|c| self.column_values(c))
    }

    /// Appends a row.
    pub fn push_row(&mut self, label: impl Into<String>, values: Vec<Option<f64>>) -> Result<()> {
        let label = label.into();
        if values.len() != self.columns.len() {
            return Err(TableError::RowLength {
                label,
                expected: self.columns.len(),
                found: values.len(),
            });
        }
        self.rows.push(label);
        self.values.push(values);
        Ok(())
    }

    /// Appends a column.
    pub fn push_column(&mut self, name: impl Into<String>, values: Vec<Option<f64>>) -> Result<()> {
        let name = name.into();
        if values.len() != self.rows.len() {
            return Err(TableError::ColumnLength {
                name,
                expected: self.rows.len(),
                found: values.len(),
            });
        }
        self.columns.push(name);
        for (row, value) in self.values.iter_mut().zip(values) {
            row.push(value);
        }
        Ok(())
    }

    /// Removes every row with the given label. Returns whether any was removed.
    pub fn remove_row(&mut self, label: &str) -> bool {
        let before = self.rows.len();
        self.retain_rows(|l, _| l != label);
        self.rows.len() != before
    }

    /// Keeps rows for which `keep(label, cells)` holds.
    pub fn retain_rows(&mut self, mut keep: impl FnMut(&str, &[Option<f64>]) -> bool) {
        let rows = std::mem::take(&mut self.rows);
        let values = std::mem::take(&mut self.values);
        for (label, row) in rows.into_iter().zip(values) {
            if keep(&label, &row) {
                self.rows.push(label);
                self.values.push(row);
            }
        }
    }

    /// Reorders rows by positions. Positions out of range are skipped.
    pub fn select_rows(&self, order: &[usize]) -> RegionTable {
        let mut rows = Vec::with_capacity(order.len());
        let mut values = Vec::with_capacity(order.len());
        for &i in order {
            if let (Some(label), Some(row)) = (self.rows.get(i), self.values.get(i)) {
                rows.push(label.clone());
                values.push(row.clone());
            }
        }
        RegionTable {
            index_name: self.index_name.clone(),
            rows,
            columns: self.columns.clone(),
            values,
        }
    }

    /// Replaces the row labels.
    pub fn set_row_labels(&mut self, labels: Vec<String>) -> Result<()> {
        if labels.len() != self.rows.len() {
            return Err(TableError::LabelCount {
                expected: self.rows.len(),
                found: labels.len(),
            });
        }
        self.rows = labels;
        Ok(())
    }

    /// Column sums skipping missing cells (an all-missing column sums to 0).
    pub fn column_sums(&self) -> Vec<f64> {
        (0..self.columns.len())
            .map(|c| self.values.iter().filter_map(|r| r[c]).sum())
            .collect()
    }

    /// Splits into (all rows but the last, last row).
    pub fn split_last_row(&self) -> Option<(RegionTable, RegionTable)> {
        let n = self.rows.len();
        if n == 0 {
            return None;
        }
        let body: Vec<usize> = (0..n - 1).collect();
        Some((self.select_rows(&body), self.select_rows(&[n - 1])))
    }

    /// Every present, finite value in row-major order.
    pub fn present_values(&self) -> Vec<f64> {
        self.values
            .iter()
            .flatten()
            .filter_map(|v| *v)
            .filter(|v| v.is_finite())
            .collect()
    }

    /// Iterates over `(label, cells)` pairs.
    pub fn iter_rows(&self) -> impl Iterator<Item = (&str, &[Option<f64>])> {
        self.rows
            .iter()
            .map(String::as_str)
            .zip(self.values.iter().map(Vec::as_slice))
    }
}

/// A numeric table with its highlight side channel.
#[derive(Debug, Clone, PartialEq)]
pub struct MarkedTable {
    pub table: RegionTable,
    pub marks: CellMarks,
}

impl MarkedTable {
    pub fn new(table: RegionTable, marks: CellMarks) -> Self {
        Self { table, marks }
    }

    /// A table without any highlighted cell.
    pub fn unmarked(table: RegionTable) -> Self {
        Self {
            table,
            marks: CellMarks::new(),
        }
    }
}

/// Index-addressed table of free text, used for quality control sheets.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct TextTable {
    pub index_name: String,
    pub rows: Vec<String>,
    pub columns: Vec<String>,
    /// Row-major cells; `None` is an empty cell.
    pub cells: Vec<Vec<Option<String>>>,
}

impl TextTable {
    pub fn column_position(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == name)
    }

    /// `(row label, cell)` pairs of one column.
    pub fn column_cells(&self, column: usize) -> Vec<(&str, Option<&str>)> {
        self.rows
            .iter()
            .zip(&self.cells)
            .map(|(label, row)| {
                let cell = row.get(column).and_then(|c| c.as_deref());
                (label.as_str(), cell)
            })
            .collect()
    }

    pub fn set_cell(&mut self, row: usize, column: usize, value: Option<String>) {
        if let Some(cell) = self.cells.get_mut(row).and_then(|r| r.get_mut(column)) {
            *cell = value;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn labels(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    fn sample_table() -> RegionTable {
        RegionTable::from_values(
            labels(&["s001", "s002", "s003"]),
            labels(&["CA1", "CA3"]),
            vec![
                vec![Some(1.0), Some(10.0)],
                vec![None, Some(20.0)],
                vec![Some(3.0), None],
            ],
        )
        .unwrap()
    }

    #[test]
    fn test_highlight_from_argb_ignores_alpha_and_case() {
        assert_eq!(Highlight::from_argb("00FFFF00"), Some(Highlight::Adjusted));
        assert_eq!(Highlight::from_argb("FFFFFF00"), Some(Highlight::Adjusted));
        assert_eq!(Highlight::from_argb("00008000"), Some(Highlight::Damaged));
        assert_eq!(Highlight::from_argb("ffff6600"), Some(Highlight::Outlier));
        assert_eq!(Highlight::from_argb("FFFF00FF"), Some(Highlight::TotalOutlier));
        assert_eq!(Highlight::from_argb("FF123456"), None);
        assert_eq!(Highlight::from_argb("FF"), None);
    }

    #[test]
    fn test_highlight_argb_round_trip() {
        for h in Highlight::ALL {
            assert_eq!(Highlight::from_argb(&h.argb()), Some(h));
        }
    }

    #[test]
    fn test_from_values_rejects_ragged_rows() {
        let result = RegionTable::from_values(
            labels(&["s001"]),
            labels(&["CA1", "CA3"]),
            vec![vec![Some(1.0)]],
        );
        assert!(matches!(result, Err(TableError::RowLength { .. })));
    }

    #[test]
    fn test_label_access() {
        let mut table = sample_table();
        assert_eq!(table.value("s001", "CA3"), Some(10.0));
        assert_eq!(table.value("s002", "CA1"), None);
        assert_eq!(table.value("s999", "CA1"), None);

        assert!(table.set_value("s002", "CA1", Some(2.0)));
        assert!(!table.set_value("s002", "DG", Some(2.0)));
        assert_eq!(table.get(1, 0), Some(2.0));
    }

    #[test]
    fn test_column_sums_skip_missing() {
        let table = sample_table();
        assert_eq!(table.column_sums(), vec![4.0, 30.0]);
    }

    #[test]
    fn test_push_and_remove_row() {
        let mut table = sample_table();
        let sums = table.column_sums().into_iter().map(Some).collect();
        table.push_row("Total", sums).unwrap();
        assert_eq!(table.n_rows(), 4);
        assert_eq!(table.value("Total", "CA1"), Some(4.0));

        assert!(table.remove_row("Total"));
        assert!(!table.remove_row("Total"));
        assert_eq!(table.n_rows(), 3);

        assert!(table.push_row("bad", vec![Some(1.0)]).is_err());
    }

    #[test]
    fn test_split_last_row() {
        let table = sample_table();
        let (body, last) = table.split_last_row().unwrap();
        assert_eq!(body.rows(), &labels(&["s001", "s002"])[..]);
        assert_eq!(last.rows(), &labels(&["s003"])[..]);
        assert_eq!(last.get(0, 0), Some(3.0));
    }

    #[test]
    fn test_present_values_row_major() {
        let table = sample_table();
        assert_eq!(table.present_values(), vec![1.0, 10.0, 20.0, 3.0]);
    }

    #[test]
    fn test_marks_filter_and_rename() {
        let mut marks = CellMarks::new();
        marks.mark("3", "CA1", Highlight::Adjusted);
        marks.mark("4", "CA3", Highlight::Outlier);

        let manual = marks.filtered(Highlight::is_manual);
        assert_eq!(manual.len(), 1);

        marks.rename_rows(|r| format!("s{:0>3}", r));
        assert_eq!(marks.get("s003", "CA1"), Some(Highlight::Adjusted));
        assert_eq!(marks.cells_with(Highlight::Outlier), vec![("s004".to_string(), "CA3".to_string())]);
    }
}
