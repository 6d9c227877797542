use crate::error::{PipelineError, Result};
use crate::structs::{Cell, Table};
use calamine::{Data, Reader, Xlsx};
use log::debug;
use std::io::{Cursor, Read, Seek};
use std::{fs::File, path::Path};

/// Reads the records of an uploaded yard file.
///
/// The format is picked from the extension: `.xlsx`/`.xlsm` workbooks or
/// `.csv` files.
///
/// # Errors
///
/// Returns `PipelineError::Data` for other extensions, or the reader's error
/// if the file cannot be opened or parsed.
pub fn read_records(path: &Path) -> Result<Table> {
    let extension = path
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase)
        .unwrap_or_default();
    debug!("Reading records from {}", path.display());

    match extension.as_str() {
        "xlsx" | "xlsm" => read_workbook(File::open(path)?),
        "csv" => read_csv(File::open(path)?),
        other => Err(PipelineError::Data(format!(
            "Unsupported input format '{}' for {}",
            other,
            path.display()
        ))),
    }
}

/// Reads the first sheet of an in-memory XLSX workbook.
pub fn read_workbook_bytes(bytes: &[u8]) -> Result<Table> {
    read_workbook(Cursor::new(bytes))
}

/// Reads the first sheet of an XLSX workbook.
///
/// The first row is the header. Fully blank rows are skipped.
pub fn read_workbook<R: Read + Seek>(reader: R) -> Result<Table> {
    let mut workbook: Xlsx<_> = Xlsx::new(reader)?;
    let sheet_name = workbook
        .sheet_names()
        .first()
        .cloned()
        .ok_or_else(|| PipelineError::Data("Workbook has no sheets".to_string()))?;
    let range = workbook.worksheet_range(&sheet_name)?;

    let mut rows = range.rows();
    let Some(header) = rows.next() else {
        debug!("Sheet '{}' is empty", sheet_name);
        return Ok(Table::default());
    };

    let mut table = Table::new(header.iter().enumerate().map(|(i, c)| header_name(i, c)));
    for row in rows {
        let cells: Vec<Cell> = row.iter().map(cell_from_data).collect();
        if cells.iter().all(Cell::is_null) {
            continue;
        }
        table.push_row(cells);
    }

    debug!(
        "Read {} rows x {} columns from sheet '{}'",
        table.len(),
        table.columns.len(),
        sheet_name
    );
    Ok(table)
}

/// Reads a CSV file with a header row. Numbers become numeric cells, all
/// other values stay as text.
pub fn read_csv<R: Read>(reader: R) -> Result<Table> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_reader(reader);

    let headers = reader.headers()?.clone();
    let mut table = Table::new(headers.iter().enumerate().map(|(i, h)| {
        if h.trim().is_empty() {
            format!("Unnamed: {}", i)
        } else {
            h.to_string()
        }
    }));

    for record in reader.records() {
        let record = record?;
        let cells: Vec<Cell> = record.iter().map(cell_from_str).collect();
        if cells.iter().all(Cell::is_null) {
            continue;
        }
        table.push_row(cells);
    }

    debug!(
        "Read {} rows x {} columns from CSV",
        table.len(),
        table.columns.len()
    );
    Ok(table)
}

fn header_name(idx: usize, cell: &Data) -> String {
    match cell_from_data(cell) {
        Cell::Empty => format!("Unnamed: {}", idx),
        Cell::Text(s) if s.trim().is_empty() => format!("Unnamed: {}", idx),
        other => other.to_string(),
    }
}

/// Converts a workbook cell. Whole-number floats become integers.
fn cell_from_data(cell: &Data) -> Cell {
    match cell {
        Data::Empty | Data::Error(_) => Cell::Empty,
        Data::String(s) if s.is_empty() => Cell::Empty,
        Data::String(s) => Cell::Text(s.clone()),
        Data::Int(i) => Cell::Int(*i),
        Data::Float(f) => float_cell(*f),
        Data::Bool(b) => Cell::Bool(*b),
        Data::DateTime(dt) => dt.as_datetime().map_or(Cell::Empty, Cell::DateTime),
        Data::DateTimeIso(s) | Data::DurationIso(s) => Cell::Text(s.clone()),
    }
}

fn cell_from_str(value: &str) -> Cell {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Cell::Empty;
    }
    if let Ok(i) = trimmed.parse::<i64>() {
        return Cell::Int(i);
    }
    if let Ok(f) = trimmed.parse::<f64>() {
        if f.is_finite() {
            return Cell::Float(f);
        }
    }
    Cell::Text(value.to_string())
}

fn float_cell(f: f64) -> Cell {
    if f.fract() == 0.0 && f >= i64::MIN as f64 && f <= i64::MAX as f64 {
        Cell::Int(f as i64)
    } else {
        Cell::Float(f)
    }
}
