use chrono::{Local, NaiveDate, NaiveTime};
use clap::Parser;
use lib::report::GeneratedReport;
use lib::{
    OutputFormat, PipelineError, ReportConfig, ReportResponse, SimpleLogger, generate_reports,
    read_records, write_csv, write_json, write_parquet,
};
use log::debug;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Instant;

static LOGGER: SimpleLogger = SimpleLogger;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Yard spreadsheet to process (.xlsx, .xlsm or .csv)
    #[arg(short, long)]
    input_file: PathBuf,

    /// Generate the Ageing report (containers still on site)
    #[arg(long, default_value_t = false)]
    ageing: bool,

    /// Generate the TAT report (departed containers)
    #[arg(long, default_value_t = false)]
    tat: bool,

    /// Output directory for the generated reports
    #[arg(short, long, default_value = "output")]
    output: PathBuf,

    /// Age containers against this date (DD-MM-YYYY or YYYY-MM-DD) instead of now
    #[arg(long, value_parser = parse_as_of)]
    as_of: Option<NaiveDate>,

    /// Output formats (e.g., xlsx,csv)
    #[arg(short, long, value_delimiter = ',', default_value = "xlsx")]
    format: Vec<OutputFormat>,

    /// Print each generated report
    #[arg(long, default_value_t = false)]
    preview: bool,

    /// Log level for output
    #[arg(long, default_value = "false")]
    debug: bool,
}

fn parse_as_of(value: &str) -> Result<NaiveDate, String> {
    NaiveDate::parse_from_str(value, "%d-%m-%Y")
        .or_else(|_| NaiveDate::parse_from_str(value, "%Y-%m-%d"))
        .map_err(|e| format!("invalid date '{}': {}", value, e))
}

fn main() -> Result<(), PipelineError> {
    let total_start = Instant::now();
    log::set_logger(&LOGGER).map_err(|e| PipelineError::Data(e.to_string()))?;

    let args = Args::parse();
    if args.debug {
        log::set_max_level(log::LevelFilter::Debug);
    } else {
        log::set_max_level(log::LevelFilter::Info);
    }

    let now = match args.as_of {
        Some(date) => date.and_time(NaiveTime::MIN),
        None => Local::now().naive_local(),
    };
    let config = ReportConfig {
        ageing: args.ageing,
        tat: args.tat,
        now,
    };

    println!("Ageing and TAT Sheet Generator");
    debug!(
        "Input file: {} | Ageing={} TAT={} | As of {}",
        args.input_file.display(),
        config.ageing,
        config.tat,
        config.now
    );

    let load_start = Instant::now();
    let records = read_records(&args.input_file)?;
    println!(
        "Loaded {} records in {:.2?}",
        records.len(),
        load_start.elapsed()
    );

    let outputs = match generate_reports(&records, &config) {
        ReportResponse::Generated(outputs) => outputs,
        response @ ReportResponse::NothingSelected => {
            if let Some(notice) = response.notice() {
                println!("{}", notice);
            }
            return Ok(());
        }
    };

    fs::create_dir_all(&args.output)?;
    let mut failures = 0;
    for output in outputs {
        println!("\n{} Sheet", output.kind);
        let generated = match output.result {
            Ok(generated) => generated,
            Err(e) => {
                eprintln!("Error generating {} report: {}", output.kind, e);
                failures += 1;
                continue;
            }
        };
        if let Some(err) = &generated.report.date_error {
            eprintln!("Error calculating {}: {}", output.kind, err);
        }
        if args.preview {
            print!("{}", generated.report.table);
        }
        summarize(&generated);

        if let Err(e) = write_outputs(&generated, &args.output, &args.format) {
            eprintln!("Error exporting {} report: {}", output.kind, e);
            failures += 1;
        }
    }

    println!("\nCompleted in {:.2?}", total_start.elapsed());
    if failures > 0 {
        return Err(PipelineError::Data(format!(
            "{} report(s) could not be produced",
            failures
        )));
    }
    Ok(())
}

fn summarize(generated: &GeneratedReport) {
    println!("{} rows", generated.report.table.len());
    for (label, count) in generated.report.range_counts() {
        debug!("  {:<14} {}", label.unwrap_or("(undefined)"), count);
    }
}

fn write_outputs(
    generated: &GeneratedReport,
    output_dir: &Path,
    formats: &[OutputFormat],
) -> Result<(), PipelineError> {
    let report = &generated.report;
    for format in formats {
        let path = output_dir.join(format!(
            "{}.{}",
            report.kind.file_stem(),
            format.extension()
        ));
        let write_start = Instant::now();
        match format {
            OutputFormat::Xlsx => match &generated.download {
                Ok(download) => fs::write(&path, &download.bytes)?,
                Err(e) => return Err(PipelineError::Data(e.to_string())),
            },
            OutputFormat::Csv => write_csv(&report.table, &path)?,
            OutputFormat::Json => write_json(&report.table, &path)?,
            OutputFormat::Parquet => write_parquet(&report.table, &path)?,
        }
        println!(
            "Wrote {} in {:.2?}",
            path.display(),
            write_start.elapsed()
        );
    }
    Ok(())
}
