use crate::error::Result;
use crate::extract::read_workbook_bytes;
use crate::load::{XLSX_MIME, to_xlsx_bytes};
use crate::structs::{ReportConfig, ReportKind, Table};
use crate::transform::{Report, process_ageing, process_tat};
use log::debug;

pub const NOTHING_SELECTED: &str = "Please select at least one sheet to generate.";

/// One invocation: the uploaded workbook plus the report toggles.
#[derive(Debug, Clone)]
pub struct ReportRequest {
    pub workbook: Vec<u8>,
    pub config: ReportConfig,
}

/// A downloadable export of a report.
#[derive(Debug, Clone)]
pub struct Download {
    pub file_name: &'static str,
    pub mime: &'static str,
    pub bytes: Vec<u8>,
}

/// A generated report, displayable whether or not its export succeeded.
#[derive(Debug)]
pub struct GeneratedReport {
    pub report: Report,
    pub download: Result<Download>,
}

#[derive(Debug)]
pub struct ReportOutput {
    pub kind: ReportKind,
    pub result: Result<GeneratedReport>,
}

#[derive(Debug)]
pub enum ReportResponse {
    /// Neither report was requested. Informational, not an error.
    NothingSelected,
    Generated(Vec<ReportOutput>),
}

impl ReportResponse {
    pub fn notice(&self) -> Option<&'static str> {
        match self {
            ReportResponse::NothingSelected => Some(NOTHING_SELECTED),
            ReportResponse::Generated(_) => None,
        }
    }
}

/// Loads the uploaded workbook and generates the requested reports.
///
/// # Errors
///
/// Fails only if the workbook itself cannot be read. Per-report failures are
/// carried inside the response.
pub fn handle_request(request: &ReportRequest) -> Result<ReportResponse> {
    if request.config.selected().is_empty() {
        return Ok(ReportResponse::NothingSelected);
    }
    let records = read_workbook_bytes(&request.workbook)?;
    Ok(generate_reports(&records, &request.config))
}

/// Runs every selected transformer independently on the full record set.
pub fn generate_reports(records: &Table, config: &ReportConfig) -> ReportResponse {
    let selected = config.selected();
    if selected.is_empty() {
        return ReportResponse::NothingSelected;
    }

    let outputs = selected
        .into_iter()
        .map(|kind| {
            debug!("Generating {} report", kind);
            let result = run(kind, records, config).map(|report| {
                let download = export(&report);
                GeneratedReport { report, download }
            });
            ReportOutput { kind, result }
        })
        .collect();
    ReportResponse::Generated(outputs)
}

fn run(kind: ReportKind, records: &Table, config: &ReportConfig) -> Result<Report> {
    match kind {
        ReportKind::Ageing => process_ageing(records, config.now),
        ReportKind::Tat => process_tat(records),
    }
}

/// Encodes a report as its downloadable workbook.
pub fn export(report: &Report) -> Result<Download> {
    Ok(Download {
        file_name: report.kind.file_name(),
        mime: XLSX_MIME,
        bytes: to_xlsx_bytes(&report.table)?,
    })
}
