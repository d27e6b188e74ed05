//! Data writers for XLSX and CSV formats.
//!
//! This module provides functions for writing tables to various file formats:
//! - XLSX with cell fill colours carrying the highlight annotations
//! - XLSX text tables (quality control sheets)
//! - CSV with the index column first

use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use thiserror::Error;
use umya_spreadsheet::{Spreadsheet, Worksheet};

use super::table::{CellMarks, RegionTable, TextTable};

/// Errors that can occur during write operations.
#[derive(Error, Debug)]
pub enum WriteError {
    /// Failed to create parent directories.
    #[error("failed to create parent directories for '{path}': {source}")]
    CreateDirectory {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// Failed to create or open file for writing.
    #[error("failed to create file '{path}': {source}")]
    CreateFile {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// Failed to write data to file.
    #[error("failed to write to file '{path}': {source}")]
    WriteFile {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// CSV writing error.
    #[error("CSV write error for '{path}': {source}")]
    CsvError {
        path: String,
        #[source]
        source: csv::Error,
    },

    /// Workbook assembly or serialisation error.
    #[error("workbook error for '{path}': {message}")]
    Workbook { path: String, message: String },
}

/// Result type for write operations.
pub type Result<T> = std::result::Result<T, WriteError>;

/// Creates parent directories for a file path if they don't exist.
fn ensure_parent_dirs(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() && !parent.exists() {
            fs::create_dir_all(parent).map_err(|e| WriteError::CreateDirectory {
                path: parent.display().to_string(),
                source: e,
            })?;
        }
    }
    Ok(())
}

/// Appends `suffix` to the file stem, keeping directory and extension:
/// `dir/03_objects.xlsx` + `_damage` -> `dir/03_objects_damage.xlsx`.
pub fn with_stem_suffix(path: &Path, suffix: &str) -> PathBuf {
    let stem = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    let ext = path
        .extension()
        .map(|e| e.to_string_lossy().into_owned())
        .unwrap_or_else(|| "xlsx".to_string());
    path.with_file_name(format!("{stem}{suffix}.{ext}"))
}

fn new_workbook<'a>(book: &'a mut Spreadsheet, sheet_name: &str, path: &Path) -> Result<&'a mut Worksheet> {
    book.new_sheet(sheet_name).map_err(|e| WriteError::Workbook {
        path: path.display().to_string(),
        message: e.to_string(),
    })
}

fn save_workbook(book: &Spreadsheet, path: &Path) -> Result<()> {
    umya_spreadsheet::writer::xlsx::write(book, path).map_err(|e| WriteError::Workbook {
        path: path.display().to_string(),
        message: e.to_string(),
    })
}

/// Writes the index header, row labels and column headers. Data cells start
/// at column 2, row 2 (1-based).
fn write_frame(sheet: &mut Worksheet, index_name: &str, rows: &[String], columns: &[String]) {
    if !index_name.is_empty() {
        sheet.get_cell_mut((1, 1)).set_value_string(index_name);
    }
    for (c, name) in columns.iter().enumerate() {
        sheet
            .get_cell_mut((c as u32 + 2, 1))
            .set_value_string(name.as_str());
    }
    for (r, label) in rows.iter().enumerate() {
        sheet
            .get_cell_mut((1, r as u32 + 2))
            .set_value_string(label.as_str());
    }
}

/// Write a numeric table to XLSX, filling highlighted cells with their colour.
///
/// Marks whose row or column is not in the table are ignored.
///
/// # Arguments
///
/// * `path` - Output file path (parent directories will be created if needed)
/// * `table` - Table to write; missing cells are left empty
/// * `marks` - Highlighted cells
/// * `sheet_name` - Name of the single worksheet
///
/// # Errors
///
/// Returns an error if:
/// - Parent directories cannot be created
/// - The workbook cannot be serialised to `path`
pub fn write_marked_table(
    path: &Path,
    table: &RegionTable,
    marks: &CellMarks,
    sheet_name: &str,
) -> Result<()> {
    ensure_parent_dirs(path)?;

    let mut book = umya_spreadsheet::new_file_empty_worksheet();
    let sheet = new_workbook(&mut book, sheet_name, path)?;
    write_frame(sheet, &table.index_name, table.rows(), table.columns());

    for (r, (_, cells)) in table.iter_rows().enumerate() {
        for (c, value) in cells.iter().enumerate() {
            if let Some(v) = value {
                sheet
                    .get_cell_mut((c as u32 + 2, r as u32 + 2))
                    .set_value_number(*v);
            }
        }
    }

    let mut filled = 0usize;
    for ((row, column), highlight) in marks.iter() {
        let (Some(r), Some(c)) = (table.row_position(row), table.column_position(column)) else {
            continue;
        };
        sheet
            .get_cell_mut((c as u32 + 2, r as u32 + 2))
            .get_style_mut()
            .set_background_color(highlight.argb());
        filled += 1;
    }

    save_workbook(&book, path)?;
    log::debug!(
        "Wrote {} ({} rows, {} highlighted cells)",
        path.display(),
        table.n_rows(),
        filled
    );
    Ok(())
}

/// Write a numeric table without highlights.
pub fn write_table(path: &Path, table: &RegionTable, sheet_name: &str) -> Result<()> {
    write_marked_table(path, table, &CellMarks::new(), sheet_name)
}

/// Write a text table (e.g. an extended quality control sheet) to XLSX.
pub fn write_text_table(path: &Path, table: &TextTable, sheet_name: &str) -> Result<()> {
    ensure_parent_dirs(path)?;

    let mut book = umya_spreadsheet::new_file_empty_worksheet();
    let sheet = new_workbook(&mut book, sheet_name, path)?;
    write_frame(sheet, &table.index_name, &table.rows, &table.columns);

    for (r, row) in table.cells.iter().enumerate() {
        for (c, cell) in row.iter().enumerate() {
            if let Some(text) = cell {
                sheet
                    .get_cell_mut((c as u32 + 2, r as u32 + 2))
                    .set_value_string(text.as_str());
            }
        }
    }

    save_workbook(&book, path)
}

/// Write a numeric table to CSV with the index column first.
///
/// Missing cells are written as empty fields.
pub fn write_table_csv(path: &Path, table: &RegionTable) -> Result<()> {
    ensure_parent_dirs(path)?;

    let file = File::create(path).map_err(|e| WriteError::CreateFile {
        path: path.display().to_string(),
        source: e,
    })?;
    let buf_writer = BufWriter::new(file);
    let mut csv_writer = csv::Writer::from_writer(buf_writer);

    let path_str = path.display().to_string();

    let header: Vec<&str> = std::iter::once(table.index_name.as_str())
        .chain(table.columns().iter().map(String::as_str))
        .collect();
    csv_writer
        .write_record(&header)
        .map_err(|e| WriteError::CsvError {
            path: path_str.clone(),
            source: e,
        })?;

    for (label, cells) in table.iter_rows() {
        let record: Vec<String> = std::iter::once(label.to_string())
            .chain(cells.iter().map(|v| v.map(|v| v.to_string()).unwrap_or_default()))
            .collect();
        csv_writer
            .write_record(&record)
            .map_err(|e| WriteError::CsvError {
                path: path_str.clone(),
                source: e,
            })?;
    }

    let mut inner = csv_writer.into_inner().map_err(|e| WriteError::WriteFile {
        path: path_str.clone(),
        source: e.into_error(),
    })?;
    inner.flush().map_err(|e| WriteError::WriteFile {
        path: path_str,
        source: e,
    })?;

    Ok(())
}
