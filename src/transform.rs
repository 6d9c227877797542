use crate::error::{DateParseError, PipelineError, Result};
use crate::ranges::{AGEING_RANGES, RangeScheme, TAT_RANGES};
use crate::structs::{Cell, ReportKind, Table};
use chrono::{Duration, NaiveDate, NaiveDateTime, NaiveTime};
use log::{debug, warn};

pub const SERIAL_NO: &str = "SR. NO";
pub const CONTAINER_NO: &str = "CONTAINER NO";
pub const SIZE: &str = "SIZE";
pub const SHIPPING_LINE: &str = "SHIPPING LINE";
pub const IN_DATE: &str = "IN DATE";
pub const OUT_DATE: &str = "OUT DATE";
pub const GROSS_WT: &str = "GROSS WT";
pub const TARE_WT: &str = "TARE WT";
pub const TRANSPORTERS: &str = "TRANSPORTERS";

pub const AGEING: &str = "Ageing";
pub const TAT: &str = "TAT";
pub const RANGE: &str = "Range";

/// Columns kept in the ageing report, in output order.
pub const AGEING_COLUMNS: [&str; 7] = [
    SERIAL_NO,
    CONTAINER_NO,
    SIZE,
    SHIPPING_LINE,
    IN_DATE,
    GROSS_WT,
    TARE_WT,
];

/// Columns kept in the TAT report, in output order.
pub const TAT_COLUMNS: [&str; 6] = [
    CONTAINER_NO,
    SIZE,
    SHIPPING_LINE,
    IN_DATE,
    TRANSPORTERS,
    OUT_DATE,
];

const DISPLAY_DATE_FORMAT: &str = "%d-%m-%Y";

const DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M",
    "%d-%m-%Y %H:%M:%S",
    "%d-%m-%Y %H:%M",
    "%d/%m/%Y %H:%M:%S",
    "%d/%m/%Y %H:%M",
    "%d.%m.%Y %H:%M:%S",
    "%d.%m.%Y %H:%M",
    "%Y/%m/%d %H:%M:%S",
    "%Y/%m/%d %H:%M",
];

const DATE_FORMATS: &[&str] = &[
    "%Y-%m-%d",
    "%d-%m-%Y",
    "%d/%m/%Y",
    "%d.%m.%Y",
    "%Y/%m/%d",
    "%d-%b-%Y",
    "%d %b %Y",
];

/// A derived report: the projected rows plus the metric and range columns.
#[derive(Debug, Clone)]
pub struct Report {
    pub kind: ReportKind,
    pub table: Table,
    /// Set when the metric column could not be computed.
    pub date_error: Option<DateParseError>,
}

impl Report {
    pub fn ranges(&self) -> RangeScheme {
        match self.kind {
            ReportKind::Ageing => AGEING_RANGES,
            ReportKind::Tat => TAT_RANGES,
        }
    }

    /// Row count per range label, in bin order. Rows without a label are
    /// counted under `None`.
    pub fn range_counts(&self) -> Vec<(Option<&'static str>, usize)> {
        let ranges = self.table.column(RANGE).unwrap_or_default();
        let mut counts: Vec<(Option<&'static str>, usize)> =
            self.ranges().labels().map(|label| (Some(label), 0)).collect();
        let mut undefined = 0;
        for cell in ranges {
            match counts
                .iter_mut()
                .find(|(label, _)| label.is_some() && *label == cell.as_str())
            {
                Some((_, count)) => *count += 1,
                None => undefined += 1,
            }
        }
        if undefined > 0 {
            counts.push((None, undefined));
        }
        counts
    }
}

/// Builds the ageing report: containers still on site, aged against `now`.
///
/// # Errors
///
/// Returns `PipelineError::MissingColumn` if `OUT DATE` or any projected
/// column is absent. Unparseable dates do not fail the call; they are
/// reported through `Report::date_error`.
pub fn process_ageing(records: &Table, now: NaiveDateTime) -> Result<Report> {
    let kind = ReportKind::Ageing;
    let out_idx = require_column(records, OUT_DATE, kind)?;
    let mut table = project(records, &AGEING_COLUMNS, kind, |row| {
        row.get(out_idx).is_none_or(Cell::is_null)
    })?;
    debug!(
        "Ageing: {} of {} records are still on site",
        table.len(),
        records.len()
    );

    let in_idx = require_column(&table, IN_DATE, kind)?;
    let in_dates = normalize_dates(&mut table, in_idx);

    let days: Vec<Option<i64>> = match &in_dates.error {
        Some(err) => {
            warn!("Error calculating Ageing: {}", err);
            vec![None; table.len()]
        }
        None => in_dates
            .dates
            .iter()
            .map(|date| date.map(|d| whole_days(now - at_midnight(d))))
            .collect(),
    };
    append_metric(&mut table, AGEING, &days, &AGEING_RANGES);

    Ok(Report {
        kind,
        table,
        date_error: in_dates.error,
    })
}

/// Builds the TAT report: departed containers, measured from arrival to
/// departure.
///
/// # Errors
///
/// Returns `PipelineError::MissingColumn` if any projected column is absent.
/// Unparseable dates are reported through `Report::date_error`.
pub fn process_tat(records: &Table) -> Result<Report> {
    let kind = ReportKind::Tat;
    let out_idx = require_column(records, OUT_DATE, kind)?;
    let mut table = project(records, &TAT_COLUMNS, kind, |row| {
        row.get(out_idx).is_some_and(|cell| !cell.is_null())
    })?;
    debug!(
        "TAT: {} of {} records have departed",
        table.len(),
        records.len()
    );

    let in_idx = require_column(&table, IN_DATE, kind)?;
    let out_idx = require_column(&table, OUT_DATE, kind)?;
    let in_dates = normalize_dates(&mut table, in_idx);
    let out_dates = normalize_dates(&mut table, out_idx);
    let date_error = in_dates.error.or(out_dates.error);

    let days: Vec<Option<i64>> = match &date_error {
        Some(err) => {
            warn!("Error calculating TAT: {}", err);
            vec![None; table.len()]
        }
        None => in_dates
            .dates
            .iter()
            .zip(&out_dates.dates)
            .map(|(arrived, departed)| match (arrived, departed) {
                (Some(a), Some(d)) => Some((*d - *a).num_days()),
                _ => None,
            })
            .collect(),
    };
    append_metric(&mut table, TAT, &days, &TAT_RANGES);

    Ok(Report {
        kind,
        table,
        date_error,
    })
}

/// Parses a cell as a calendar date, dropping any time of day.
///
/// Accepts date-time cells, Excel serial numbers and common text layouts.
/// Slash-separated dates are read day first.
pub fn parse_date(cell: &Cell) -> Option<NaiveDate> {
    match cell {
        Cell::DateTime(dt) => Some(dt.date()),
        Cell::Int(serial) => excel_serial_to_datetime(*serial as f64).map(|dt| dt.date()),
        Cell::Float(serial) => excel_serial_to_datetime(*serial).map(|dt| dt.date()),
        Cell::Text(text) => parse_date_str(text.trim()),
        Cell::Empty | Cell::Bool(_) => None,
    }
}

fn parse_date_str(text: &str) -> Option<NaiveDate> {
    DATETIME_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(text, fmt).ok())
        .map(|dt| dt.date())
        .or_else(|| {
            DATE_FORMATS
                .iter()
                .find_map(|fmt| NaiveDate::parse_from_str(text, fmt).ok())
        })
}

/// Converts an Excel serial day number to a date-time.
///
/// Excel counts 1900 as a leap year, so serials before 1 March 1900 are one
/// day ahead of the calendar.
pub fn excel_serial_to_datetime(serial: f64) -> Option<NaiveDateTime> {
    if !serial.is_finite() || serial < 0.0 {
        return None;
    }
    let epoch = NaiveDate::from_ymd_opt(1899, 12, 30)?.and_time(NaiveTime::MIN);
    let serial = if serial < 60.0 { serial + 1.0 } else { serial };
    let millis = (serial * 86_400_000.0).round() as i64;
    epoch.checked_add_signed(Duration::milliseconds(millis))
}

/// Whole days in `delta`, rounded towards negative infinity.
fn whole_days(delta: Duration) -> i64 {
    let days = delta.num_days();
    if delta < Duration::days(days) {
        days - 1
    } else {
        days
    }
}

fn at_midnight(date: NaiveDate) -> NaiveDateTime {
    date.and_time(NaiveTime::MIN)
}

fn require_column(table: &Table, name: &str, kind: ReportKind) -> Result<usize> {
    table
        .column_index(name)
        .ok_or_else(|| PipelineError::MissingColumn {
            report: kind.to_string(),
            column: name.to_string(),
        })
}

/// Keeps the rows matching `keep`, restricted to `columns` in that order.
fn project(
    records: &Table,
    columns: &[&str],
    kind: ReportKind,
    keep: impl Fn(&[Cell]) -> bool,
) -> Result<Table> {
    let indices = columns
        .iter()
        .map(|name| require_column(records, name, kind))
        .collect::<Result<Vec<_>>>()?;

    let mut table = Table::new(columns.iter().copied());
    for row in records.rows.iter().filter(|row| keep(row.as_slice())) {
        table.push_row(
            indices
                .iter()
                .map(|&i| row.get(i).cloned().unwrap_or(Cell::Empty))
                .collect(),
        );
    }
    Ok(table)
}

struct DateColumn {
    /// `None` for blank or unparseable cells.
    dates: Vec<Option<NaiveDate>>,
    error: Option<DateParseError>,
}

/// Rewrites a date column as `DD-MM-YYYY` text in place.
///
/// Blank cells stay blank. Unparseable cells keep their original value and
/// are summarised in the returned error.
fn normalize_dates(table: &mut Table, idx: usize) -> DateColumn {
    let column = table.columns[idx].clone();
    let mut dates = Vec::with_capacity(table.len());
    let mut error: Option<DateParseError> = None;

    for (row_idx, row) in table.rows.iter_mut().enumerate() {
        let cell = &mut row[idx];
        if cell.is_null() {
            *cell = Cell::Empty;
            dates.push(None);
            continue;
        }
        match parse_date(cell) {
            Some(date) => {
                *cell = Cell::Text(date.format(DISPLAY_DATE_FORMAT).to_string());
                dates.push(Some(date));
            }
            None => {
                match error.as_mut() {
                    Some(err) => err.failures += 1,
                    None => {
                        error = Some(DateParseError {
                            column: column.clone(),
                            row: row_idx,
                            value: cell.to_string(),
                            failures: 1,
                        })
                    }
                }
                dates.push(None);
            }
        }
    }

    DateColumn { dates, error }
}

fn append_metric(table: &mut Table, name: &str, days: &[Option<i64>], ranges: &RangeScheme) {
    table.columns.push(name.to_string());
    table.columns.push(RANGE.to_string());
    for (row, value) in table.rows.iter_mut().zip(days) {
        row.push(Cell::from(*value));
        row.push(Cell::from(value.and_then(|d| ranges.label(d))));
    }
}
