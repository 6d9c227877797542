pub mod error;
pub mod extract;
pub mod load;
pub mod ranges;
pub mod report;
pub mod structs;
pub mod transform;

// Re-export public API
pub use error::{DateParseError, PipelineError, Result};
pub use extract::{read_records, read_workbook_bytes};
pub use load::{to_xlsx_bytes, write_csv, write_json, write_parquet};
pub use report::{ReportRequest, ReportResponse, generate_reports, handle_request};
pub use structs::{Cell, OutputFormat, ReportConfig, ReportKind, SimpleLogger, Table};
pub use transform::{Report, process_ageing, process_tat};
