//! Data loaders for spreadsheets and atlas export CSVs.
//!
//! This module provides parsers for:
//! - XLSX workbooks, keeping both cell values and cell fill colours
//! - Plain comma-separated tables with an index column
//! - Semicolon-separated per-slice exports (`RefAtlasRegions__sNNN.csv`,
//!   `Objects__sNNN.csv`)
//! - The JSON brain region dictionary used to expand QC region names

use std::collections::HashMap;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};

use csv::ReaderBuilder;
use thiserror::Error;

use super::table::{CellMarks, Highlight, MarkedTable, RegionTable, TableError, TextTable};

/// Errors that can occur during file loading.
#[derive(Error, Debug)]
pub enum LoaderError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV parsing error: {0}")]
    Csv(#[from] csv::Error),

    #[error("JSON parsing error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Failed to read workbook {path}: {message}")]
    Workbook { path: PathBuf, message: String },

    #[error("Empty file: {0}")]
    EmptyFile(PathBuf),

    #[error("Missing required columns: {0}")]
    MissingColumns(String),

    #[error("Unsupported file format: {0}")]
    UnsupportedFormat(PathBuf),

    #[error(transparent)]
    Table(#[from] TableError),
}

/// Result type for loader operations.
pub type Result<T> = std::result::Result<T, LoaderError>;

/// Spreadsheet file formats understood by the loaders.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TableFormat {
    /// Excel workbook; the first worksheet is used.
    Xlsx,
    /// Comma-separated text without highlight information.
    Csv,
}

impl TableFormat {
    /// Detect the format from the file extension.
    pub fn from_path(path: &Path) -> Option<Self> {
        let ext = path.extension()?.to_str()?.to_ascii_lowercase();
        match ext.as_str() {
            "xlsx" | "xlsm" => Some(TableFormat::Xlsx),
            "csv" => Some(TableFormat::Csv),
            _ => None,
        }
    }
}

/// Raw cell grid: text per cell plus any recognised fill colour.
#[derive(Debug, Default)]
struct Grid {
    cells: Vec<Vec<Option<String>>>,
    fills: Vec<Vec<Option<Highlight>>>,
}

impl Grid {
    fn text(&self, row: usize, col: usize) -> Option<&str> {
        self.cells.get(row)?.get(col)?.as_deref()
    }

    fn fill(&self, row: usize, col: usize) -> Option<Highlight> {
        self.fills.get(row)?.get(col).copied().flatten()
    }

    fn width(&self) -> usize {
        self.cells.iter().map(Vec::len).max().unwrap_or(0)
    }

    fn row_is_blank(&self, row: usize) -> bool {
        self.cells
            .get(row)
            .map_or(true, |r| r.iter().all(Option::is_none))
    }
}

fn read_xlsx_grid(path: &Path) -> Result<Grid> {
    let book = umya_spreadsheet::reader::xlsx::read(path).map_err(|e| LoaderError::Workbook {
        path: path.to_path_buf(),
        message: e.to_string(),
    })?;
    let sheet = book
        .get_sheet_collection()
        .first()
        .ok_or_else(|| LoaderError::EmptyFile(path.to_path_buf()))?;

    let (max_col, max_row) = sheet.get_highest_column_and_row();
    let mut grid = Grid::default();

    for row in 1..=max_row {
        let mut texts = Vec::with_capacity(max_col as usize);
        let mut fills = Vec::with_capacity(max_col as usize);
        for col in 1..=max_col {
            let cell = sheet.get_cell((col, row));
            let text = cell
                .map(|c| c.get_value().trim().to_string())
                .filter(|s| !s.is_empty());
            let fill = cell
                .and_then(|c| c.get_style().get_background_color())
                .and_then(|color| Highlight::from_argb(color.get_argb()));
            texts.push(text);
            fills.push(fill);
        }
        grid.cells.push(texts);
        grid.fills.push(fills);
    }

    Ok(grid)
}

fn read_csv_grid(path: &Path, delimiter: u8) -> Result<Grid> {
    let file = File::open(path)?;
    let mut reader = ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .delimiter(delimiter)
        .from_reader(BufReader::new(file));

    let mut grid = Grid::default();
    for result in reader.records() {
        let record = result?;
        let texts: Vec<Option<String>> = record
            .iter()
            .map(|s| Some(s.trim().to_string()).filter(|s| !s.is_empty()))
            .collect();
        grid.fills.push(vec![None; texts.len()]);
        grid.cells.push(texts);
    }
    Ok(grid)
}

fn read_grid(path: &Path) -> Result<Grid> {
    match TableFormat::from_path(path) {
        Some(TableFormat::Xlsx) => read_xlsx_grid(path),
        Some(TableFormat::Csv) => read_csv_grid(path, b','),
        None => Err(LoaderError::UnsupportedFormat(path.to_path_buf())),
    }
}

/// Header row as (index name, column names). Columns whose header cell is
/// empty are named `Unnamed: N` like pandas does.
fn grid_header(grid: &Grid) -> (String, Vec<String>) {
    let width = grid.width();
    let index_name = grid.text(0, 0).unwrap_or_default().to_string();
    let columns = (1..width)
        .map(|c| {
            grid.text(0, c)
                .map_or_else(|| format!("Unnamed: {c}"), str::to_string)
        })
        .collect();
    (index_name, columns)
}

/// Parse a numeric cell. Text that is not a number reads as missing.
pub fn parse_number(text: &str) -> Option<f64> {
    let text = text.trim();
    if text.is_empty() || text.eq_ignore_ascii_case("nan") {
        return None;
    }
    text.parse::<f64>().ok().filter(|v| v.is_finite())
}

/// Load a numeric table and its highlighted cells.
///
/// The first column is the row index and the first row the header. Blank
/// rows are skipped. CSV files carry no highlights.
///
/// # Errors
///
/// Returns an error if the file cannot be read, has an unsupported
/// extension, or holds no header row.
pub fn load_marked_table<P: AsRef<Path>>(path: P) -> Result<MarkedTable> {
    let path = path.as_ref();
    let grid = read_grid(path)?;
    if grid.cells.is_empty() {
        return Err(LoaderError::EmptyFile(path.to_path_buf()));
    }

    let (index_name, columns) = grid_header(&grid);
    let mut labels = Vec::with_capacity(grid.cells.len());
    let mut values = Vec::with_capacity(grid.cells.len());
    let mut marks = CellMarks::new();

    for r in 1..grid.cells.len() {
        if grid.row_is_blank(r) {
            continue;
        }
        let label = grid.text(r, 0).unwrap_or_default().to_string();
        let row: Vec<Option<f64>> = (0..columns.len())
            .map(|c| grid.text(r, c + 1).and_then(parse_number))
            .collect();
        for (c, column) in columns.iter().enumerate() {
            if let Some(highlight) = grid.fill(r, c + 1) {
                marks.mark(label.clone(), column.clone(), highlight);
            }
        }
        labels.push(label);
        values.push(row);
    }

    let table = RegionTable::from_values(labels, columns, values)?.with_index_name(index_name);

    log::debug!(
        "Loaded {} ({} rows x {} columns, {} highlighted cells)",
        path.display(),
        table.n_rows(),
        table.n_cols(),
        marks.len()
    );

    Ok(MarkedTable::new(table, marks))
}

/// Load a numeric table, discarding highlights.
pub fn load_table<P: AsRef<Path>>(path: P) -> Result<RegionTable> {
    load_marked_table(path).map(|m| m.table)
}

/// Load a text table such as a quality control sheet.
pub fn load_text_table<P: AsRef<Path>>(path: P) -> Result<TextTable> {
    let path = path.as_ref();
    let grid = read_grid(path)?;
    if grid.cells.is_empty() {
        return Err(LoaderError::EmptyFile(path.to_path_buf()));
    }

    let (index_name, columns) = grid_header(&grid);
    let mut table = TextTable {
        index_name,
        columns,
        ..TextTable::default()
    };

    for r in 1..grid.cells.len() {
        if grid.row_is_blank(r) {
            continue;
        }
        table
            .rows
            .push(grid.text(r, 0).unwrap_or_default().to_string());
        table.cells.push(
            (0..table.columns.len())
                .map(|c| grid.text(r, c + 1).map(str::to_string))
                .collect(),
        );
    }

    Ok(table)
}

/// Load `(Region Name, value)` pairs from a semicolon-separated atlas export.
///
/// # Arguments
///
/// * `path` - Path to the export CSV
/// * `value_column` - Header of the value column, e.g. `Object count`
///
/// # Errors
///
/// Returns an error if the file cannot be parsed or lacks the `Region Name`
/// or value column.
pub fn load_export_column<P: AsRef<Path>>(
    path: P,
    value_column: &str,
) -> Result<Vec<(String, Option<f64>)>> {
    let path = path.as_ref();
    let file = File::open(path)?;
    let mut reader = ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .delimiter(b';')
        .from_reader(BufReader::new(file));

    let headers = reader.headers()?.clone();
    let col_map: HashMap<&str, usize> = headers
        .iter()
        .enumerate()
        .map(|(i, name)| (name.trim(), i))
        .collect();

    let region_idx = col_map
        .get("Region Name")
        .copied()
        .ok_or_else(|| LoaderError::MissingColumns("Region Name".to_string()))?;
    let value_idx = col_map
        .get(value_column)
        .copied()
        .ok_or_else(|| LoaderError::MissingColumns(value_column.to_string()))?;

    let mut rows = Vec::new();
    for result in reader.records() {
        let record = result?;
        let Some(region) = record.get(region_idx).map(str::trim) else {
            continue;
        };
        if region.is_empty() {
            continue;
        }
        let value = record.get(value_idx).and_then(parse_number);
        rows.push((region.to_string(), value));
    }

    Ok(rows)
}

/// Load the brain region dictionary: coarse name -> list of sub-regions.
pub fn load_region_dictionary<P: AsRef<Path>>(path: P) -> Result<HashMap<String, Vec<String>>> {
    let file = File::open(path.as_ref())?;
    let dictionary = serde_json::from_reader(BufReader::new(file))?;
    Ok(dictionary)
}

/// First `n` lines of a file, for reporting malformed inputs.
pub fn preview_lines(path: &Path, n: usize) -> Vec<String> {
    File::open(path)
        .map(|f| {
            BufReader::new(f)
                .lines()
                .take(n)
                .map_while(std::result::Result::ok)
                .collect()
        })
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::{tempdir, NamedTempFile};

    #[test]
    fn test_table_format_from_path() {
        assert_eq!(TableFormat::from_path(Path::new("a.xlsx")), Some(TableFormat::Xlsx));
        assert_eq!(TableFormat::from_path(Path::new("a.CSV")), Some(TableFormat::Csv));
        assert_eq!(TableFormat::from_path(Path::new("a.txt")), None);
    }

    #[test]
    fn test_parse_number() {
        assert_eq!(parse_number(" 3.5 "), Some(3.5));
        assert_eq!(parse_number("nan"), None);
        assert_eq!(parse_number(""), None);
        assert_eq!(parse_number("CA1"), None);
    }

    #[test]
    fn test_load_csv_table() -> Result<()> {
        let dir = tempdir()?;
        let path = dir.path().join("counts.csv");
        let mut file = File::create(&path)?;
        writeln!(file, ",CA1,CA3")?;
        writeln!(file, "s001,1,2")?;
        writeln!(file, ",,")?;
        writeln!(file, "s002,,4.5")?;
        file.flush()?;

        let marked = load_marked_table(&path)?;
        assert!(marked.marks.is_empty());
        let table = marked.table;
        assert_eq!(table.rows(), &["s001".to_string(), "s002".to_string()][..]);
        assert_eq!(table.columns(), &["CA1".to_string(), "CA3".to_string()][..]);
        assert_eq!(table.value("s002", "CA1"), None);
        assert_eq!(table.value("s002", "CA3"), Some(4.5));
        Ok(())
    }

    #[test]
    fn test_load_unsupported_format() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("counts.txt");
        File::create(&path).unwrap();
        assert!(matches!(
            load_marked_table(&path),
            Err(LoaderError::UnsupportedFormat(_))
        ));
    }

    #[test]
    fn test_load_export_column() -> Result<()> {
        let mut file = NamedTempFile::new()?;
        writeln!(file, "Region ID;Region Name;Region pixels;Object count")?;
        writeln!(file, "1;CA1 L;1000;12")?;
        writeln!(file, "2;CA3 L;2000;")?;
        file.flush()?;

        let rows = load_export_column(file.path(), "Object count")?;
        assert_eq!(
            rows,
            vec![("CA1 L".to_string(), Some(12.0)), ("CA3 L".to_string(), None)]
        );

        let areas = load_export_column(file.path(), "Region pixels")?;
        assert_eq!(areas[1].1, Some(2000.0));
        Ok(())
    }

    #[test]
    fn test_load_export_column_missing_column() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "Region ID;Object count").unwrap();
        writeln!(file, "1;12").unwrap();
        file.flush().unwrap();

        let result = load_export_column(file.path(), "Object count");
        assert!(matches!(result, Err(LoaderError::MissingColumns(c)) if c == "Region Name"));
    }

    #[test]
    fn test_load_region_dictionary() -> Result<()> {
        let mut file = NamedTempFile::new()?;
        writeln!(file, r#"{{"Hippocampus": ["CA1 L", "CA1 R"]}}"#)?;
        file.flush()?;

        let dict = load_region_dictionary(file.path())?;
        assert_eq!(dict["Hippocampus"], vec!["CA1 L", "CA1 R"]);
        Ok(())
    }

    #[test]
    fn test_load_text_table() -> Result<()> {
        let dir = tempdir()?;
        let path = dir.path().join("qc.csv");
        let mut file = File::create(&path)?;
        writeln!(file, "slice,damage,parts adjustment")?;
        writeln!(file, "s001,CA1 L; CA3 L,")?;
        writeln!(file, "s002,,SC R")?;
        file.flush()?;

        let table = load_text_table(&path)?;
        assert_eq!(table.index_name, "slice");
        let damage = table.column_position("damage").unwrap();
        assert_eq!(
            table.column_cells(damage),
            vec![("s001", Some("CA1 L; CA3 L")), ("s002", None)]
        );
        Ok(())
    }

    #[test]
    fn test_preview_lines() {
        let mut file = NamedTempFile::new().unwrap();
        for i in 0..10 {
            writeln!(file, "line {i}").unwrap();
        }
        file.flush().unwrap();

        let lines = preview_lines(file.path(), 5);
        assert_eq!(lines.len(), 5);
        assert_eq!(lines[4], "line 4");
    }
}
