use arrow_schema::ArrowError;

#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error("I/O Error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Parquet Error: {0}")]
    Parquet(#[from] parquet::errors::ParquetError),
    #[error("Arrow Error: {0}")]
    Arrow(#[from] ArrowError),
    #[error("Data Error: {0}")]
    Data(String),
    #[error("CSV Error: {0}")]
    Csv(#[from] csv::Error),
    #[error("JSON Error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Workbook Error: {0}")]
    Workbook(#[from] calamine::XlsxError),
    #[error("Export Error: {0}")]
    Xlsx(#[from] rust_xlsxwriter::XlsxError),
    #[error("{report} report requires column '{column}'")]
    MissingColumn { report: String, column: String },
}

/// A date cell that could not be parsed.
///
/// Not fatal: the report is still produced, with its metric column left
/// undefined for every row.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("cannot parse '{value}' in column {column} (row {row}, {failures} unparseable cell(s))")]
pub struct DateParseError {
    pub column: String,
    /// Zero-based row within the filtered report.
    pub row: usize,
    pub value: String,
    pub failures: usize,
}

pub type Result<T> = std::result::Result<T, PipelineError>;
