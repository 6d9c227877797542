use crate::error::Result;
use crate::structs::{Cell, Table};
use arrow_array::{ArrayRef, BooleanArray, Float64Array, Int64Array, RecordBatch, StringArray};
use arrow_schema::{DataType, Field, Schema};
use csv::Writer;
use log::debug;
use parquet::arrow::ArrowWriter;
use parquet::file::properties::WriterProperties;
use rust_xlsxwriter::{Workbook, Worksheet};
use std::{fs::File, path::Path, sync::Arc};

pub const SHEET_NAME: &str = "Sheet1";
pub const XLSX_MIME: &str = "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet";

/// Largest integer an Excel number (an f64) holds exactly.
const MAX_EXACT_INT: u64 = 1 << 53;

/// Serializes a table to an in-memory XLSX workbook.
///
/// The workbook has a single sheet named `Sheet1` with the column names as
/// its header row. No row index is written. Empty cells are left blank.
///
/// # Errors
///
/// Returns `PipelineError::Xlsx` if any cell cannot be encoded (for example
/// text longer than Excel's cell limit). No partial buffer is returned.
pub fn to_xlsx_bytes(table: &Table) -> Result<Vec<u8>> {
    let mut workbook = Workbook::new();
    let sheet = workbook.add_worksheet();
    sheet.set_name(SHEET_NAME)?;

    for (col, name) in table.columns.iter().enumerate() {
        sheet.write_string(0, col as u16, name)?;
    }
    for (idx, row) in table.rows.iter().enumerate() {
        let row_num = (idx + 1) as u32;
        for (col, cell) in row.iter().enumerate() {
            write_cell(sheet, row_num, col as u16, cell)?;
        }
    }

    let buffer = workbook.save_to_buffer()?;
    debug!(
        "Encoded {} rows into {} byte workbook",
        table.len(),
        buffer.len()
    );
    Ok(buffer)
}

fn write_cell(sheet: &mut Worksheet, row: u32, col: u16, cell: &Cell) -> Result<()> {
    match cell {
        Cell::Empty => {}
        Cell::Bool(b) => {
            sheet.write_boolean(row, col, *b)?;
        }
        Cell::Int(i) if i.unsigned_abs() > MAX_EXACT_INT => {
            sheet.write_string(row, col, i.to_string())?;
        }
        Cell::Int(i) => {
            sheet.write_number(row, col, *i as f64)?;
        }
        Cell::Float(f) if f.is_nan() => {}
        Cell::Float(f) => {
            sheet.write_number(row, col, *f)?;
        }
        Cell::Text(s) => {
            sheet.write_string(row, col, s)?;
        }
        Cell::DateTime(_) => {
            sheet.write_string(row, col, cell.to_string())?;
        }
    }
    Ok(())
}

/// Writes a table to a CSV file with a header row.
///
/// CSV carries no cell types: text that looks like a number, such as the
/// `0` TAT range or a `20` size, reads back through `read_csv` as a number.
///
/// # Errors
/// Returns error if file cannot be created or written to.
pub fn write_csv(table: &Table, output_path: &Path) -> Result<()> {
    let file = File::create(output_path)?;
    let mut writer = Writer::from_writer(file);

    writer.write_record(&table.columns)?;
    for row in &table.rows {
        writer.write_record(row.iter().map(|cell| cell.to_string()))?;
    }

    writer.flush()?;
    Ok(())
}

/// Writes a table to a pretty-formatted JSON file of columns and rows.
///
/// # Errors
/// Returns error if file cannot be created or serialization fails.
pub fn write_json(table: &Table, output_path: &Path) -> Result<()> {
    let file = File::create(output_path)?;
    serde_json::to_writer_pretty(file, table)?;
    Ok(())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ColumnKind {
    Int,
    Float,
    Bool,
    Text,
}

/// Narrowest Arrow type holding every non-empty cell of a column.
fn column_kind(table: &Table, idx: usize) -> ColumnKind {
    let mut kind: Option<ColumnKind> = None;
    for cell in table.rows.iter().map(|row| &row[idx]) {
        let cell_kind = match cell {
            Cell::Empty => continue,
            Cell::Float(f) if f.is_nan() => continue,
            Cell::Int(_) => ColumnKind::Int,
            Cell::Float(_) => ColumnKind::Float,
            Cell::Bool(_) => ColumnKind::Bool,
            Cell::Text(_) | Cell::DateTime(_) => return ColumnKind::Text,
        };
        kind = Some(match (kind, cell_kind) {
            (None, k) => k,
            (Some(a), b) if a == b => a,
            (Some(ColumnKind::Int), ColumnKind::Float) | (Some(ColumnKind::Float), ColumnKind::Int) => {
                ColumnKind::Float
            }
            _ => return ColumnKind::Text,
        });
    }
    kind.unwrap_or(ColumnKind::Text)
}

fn column_array(table: &Table, idx: usize, kind: ColumnKind) -> ArrayRef {
    let cells = table.rows.iter().map(|row| &row[idx]);
    match kind {
        ColumnKind::Int => Arc::new(
            cells
                .map(|c| c.as_int())
                .collect::<Int64Array>(),
        ),
        ColumnKind::Float => Arc::new(
            cells
                .map(|c| match c {
                    Cell::Int(i) => Some(*i as f64),
                    Cell::Float(f) if !f.is_nan() => Some(*f),
                    _ => None,
                })
                .collect::<Float64Array>(),
        ),
        ColumnKind::Bool => Arc::new(
            cells
                .map(|c| match c {
                    Cell::Bool(b) => Some(*b),
                    _ => None,
                })
                .collect::<BooleanArray>(),
        ),
        ColumnKind::Text => Arc::new(
            cells
                .map(|c| if c.is_null() { None } else { Some(c.to_string()) })
                .collect::<StringArray>(),
        ),
    }
}

/// Writes a table to a Parquet file using Arrow format.
///
/// Column types are inferred from the cells: Int64, Float64, Boolean, or
/// Utf8 for anything mixed or textual. Every column is nullable.
///
/// # Errors
/// Returns error if file cannot be created, schema is invalid, or Arrow operations fail.
pub fn write_parquet(table: &Table, output_path: &Path) -> Result<()> {
    let kinds: Vec<ColumnKind> = (0..table.columns.len())
        .map(|idx| column_kind(table, idx))
        .collect();

    let schema = Arc::new(Schema::new(
        table
            .columns
            .iter()
            .zip(&kinds)
            .map(|(name, kind)| {
                let data_type = match kind {
                    ColumnKind::Int => DataType::Int64,
                    ColumnKind::Float => DataType::Float64,
                    ColumnKind::Bool => DataType::Boolean,
                    ColumnKind::Text => DataType::Utf8,
                };
                Field::new(name, data_type, true)
            })
            .collect::<Vec<_>>(),
    ));

    let arrays: Vec<ArrayRef> = kinds
        .iter()
        .enumerate()
        .map(|(idx, kind)| column_array(table, idx, *kind))
        .collect();
    let batch = RecordBatch::try_new(schema.clone(), arrays)?;

    let file = File::create(output_path)?;
    let props = WriterProperties::builder().build();
    let mut writer = ArrowWriter::try_new(file, schema, Some(props))?;
    writer.write(&batch)?;
    writer.close()?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::PipelineError;
    use crate::extract::{read_csv, read_workbook_bytes};
    use arrow_array::Array;
    use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;
    use std::fs;

    fn report_table() -> Table {
        let mut table = Table::new(["CONTAINER NO", "IN DATE", "GROSS WT", "Ageing", "Range"]);
        table.push_row(vec![
            Cell::from("MSKU0000001"),
            Cell::from("01-01-2024"),
            Cell::Float(24500.5),
            Cell::Int(9),
            Cell::from("08-15"),
        ]);
        table.push_row(vec![
            Cell::from("MSKU0000002"),
            Cell::from("20-01-2024"),
            Cell::Int(30000),
            Cell::Int(-10),
            Cell::Empty,
        ]);
        table
    }

    #[test]
    fn xlsx_is_a_zip_container() {
        let bytes = to_xlsx_bytes(&report_table()).unwrap();
        assert!(bytes.len() > 100);
        assert_eq!(&bytes[0..2], b"PK");
    }

    #[test]
    fn xlsx_round_trip() {
        let table = report_table();
        let read_back = read_workbook_bytes(&to_xlsx_bytes(&table).unwrap()).unwrap();
        assert_eq!(read_back, table);
    }

    #[test]
    fn empty_table_keeps_header() {
        let table = Table::new(["CONTAINER NO", "TAT", "Range"]);
        let read_back = read_workbook_bytes(&to_xlsx_bytes(&table).unwrap()).unwrap();
        assert_eq!(read_back.columns, table.columns);
        assert!(read_back.is_empty());
    }

    #[test]
    fn oversized_cell_fails_export() {
        let mut table = Table::new(["CONTAINER NO"]);
        table.push_row(vec![Cell::Text("X".repeat(40_000))]);
        let err = to_xlsx_bytes(&table).unwrap_err();
        assert!(matches!(err, PipelineError::Xlsx(_)));
    }

    #[test]
    fn csv_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ageing.csv");
        let table = report_table();
        write_csv(&table, &path).unwrap();

        let read_back = read_csv(File::open(&path).unwrap()).unwrap();
        assert_eq!(read_back, table);
    }

    #[test]
    fn csv_reads_numeric_text_as_numbers() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tat.csv");
        let mut table = Table::new(["SIZE", "Range"]);
        table.push_row(vec![Cell::from("20"), Cell::from("0")]);
        write_csv(&table, &path).unwrap();

        let read_back = read_csv(File::open(&path).unwrap()).unwrap();
        assert_eq!(read_back.rows[0], vec![Cell::Int(20), Cell::Int(0)]);
    }

    #[test]
    fn large_ints_export_as_text() {
        let mut table = Table::new(["SR. NO"]);
        table.push_row(vec![Cell::Int(9_007_199_254_740_993)]);
        table.push_row(vec![Cell::Int(9_007_199_254_740_992)]);

        let read_back = read_workbook_bytes(&to_xlsx_bytes(&table).unwrap()).unwrap();
        assert_eq!(read_back.rows[0][0], Cell::from("9007199254740993"));
        assert_eq!(read_back.rows[1][0], Cell::Int(9_007_199_254_740_992));
    }

    #[test]
    fn json_has_columns_and_rows() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ageing.json");
        write_json(&report_table(), &path).unwrap();

        let value: serde_json::Value =
            serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(value["columns"][3], "Ageing");
        assert_eq!(value["rows"][0][3], 9);
        assert_eq!(value["rows"][1][4], serde_json::Value::Null);
    }

    #[test]
    fn parquet_infers_column_types() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ageing.parquet");
        write_parquet(&report_table(), &path).unwrap();

        let builder = ParquetRecordBatchReaderBuilder::try_new(File::open(&path).unwrap()).unwrap();
        let schema = builder.schema().clone();
        assert_eq!(schema.field(0).data_type(), &DataType::Utf8);
        assert_eq!(schema.field(2).data_type(), &DataType::Float64);
        assert_eq!(schema.field(3).data_type(), &DataType::Int64);

        let batch = builder.build().unwrap().next().unwrap().unwrap();
        assert_eq!(batch.num_rows(), 2);
        let ranges = batch
            .column(4)
            .as_any()
            .downcast_ref::<StringArray>()
            .unwrap();
        assert_eq!(ranges.value(0), "08-15");
        assert!(ranges.is_null(1));
    }

    #[test]
    fn mixed_columns_fall_back_to_text() {
        let mut table = Table::new(["SR. NO"]);
        table.push_row(vec![Cell::Int(1)]);
        table.push_row(vec![Cell::from("2a")]);
        assert_eq!(column_kind(&table, 0), ColumnKind::Text);

        let empty = Table::new(["SR. NO"]);
        assert_eq!(column_kind(&empty, 0), ColumnKind::Text);
    }
}
