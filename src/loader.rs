// Record extraction: turns raw spreadsheet rows into `TypedRow`s.
//
// The intake export carries many columns; only five matter here. Positions
// are fixed by the upstream system (1-based in the file): state in column 3,
// referral date in 6, admission date in 9, referral flag in 26, admission
// flag in 27. Flags are numeric cells where any non-zero value marks an
// event.
//
// Malformed or missing dates on flagged events are recovered here by
// dropping the event and counting it; the report engine never sees an
// invalid date.
use crate::error::{ReportError, Result};
use crate::types::TypedRow;
use crate::util::parse_date_flexible;
use calamine::{open_workbook, Data, DataType, Reader, Xlsx};
use chrono::NaiveDate;
use csv::StringRecord;
use std::path::{Path, PathBuf};

// 0-based column indices.
const STATE_COL: usize = 2;
const REFERRED_DATE_COL: usize = 5;
const ADMITTED_DATE_COL: usize = 8;
const REFERRED_FLAG_COL: usize = 25;
const ADMITTED_FLAG_COL: usize = 26;

/// Diagnostics from one load, printed by the caller.
#[derive(Debug, Clone)]
pub struct LoadReport {
    pub rows_scanned: usize,
    pub rows_extracted: usize,
    pub skipped_dates: usize,
}

impl LoadReport {
    fn new() -> Self {
        LoadReport {
            rows_scanned: 0,
            rows_extracted: 0,
            skipped_dates: 0,
        }
    }
}

/// Pick the input spreadsheet: the first `.xlsx` or `.csv` file (sorted by
/// name) in the given folder.
pub fn find_input_file(dir: &Path) -> Result<PathBuf> {
    let mut candidates: Vec<PathBuf> = std::fs::read_dir(dir)?
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .filter(|path| {
            matches!(
                path.extension().and_then(|e| e.to_str()),
                Some("xlsx") | Some("csv")
            )
        })
        .collect();
    candidates.sort();
    candidates.into_iter().next().ok_or_else(|| {
        ReportError::InvalidRequest(format!(
            "no .xlsx or .csv files found in {}",
            dir.display()
        ))
    })
}

/// Load typed rows from an input file, dispatching on its extension.
///
/// Rows for every state are kept; the caller filters by state code before the
/// aggregation runs, so one loaded file can serve several reports.
pub fn load_rows(path: &Path) -> Result<(Vec<TypedRow>, LoadReport)> {
    log::info!("reading input file {}", path.display());
    let loaded = match path.extension().and_then(|e| e.to_str()) {
        Some("csv") => load_csv(path),
        _ => load_xlsx(path),
    }?;
    log::info!(
        "reading input file completed: {} rows scanned, {} extracted, {} dates skipped",
        loaded.1.rows_scanned,
        loaded.1.rows_extracted,
        loaded.1.skipped_dates
    );
    Ok(loaded)
}

fn load_xlsx(path: &Path) -> Result<(Vec<TypedRow>, LoadReport)> {
    let mut workbook: Xlsx<_> = open_workbook(path)?;
    let range = workbook
        .worksheet_range_at(0)
        .ok_or_else(|| ReportError::InvalidRequest("workbook has no worksheets".to_string()))??;

    let mut rows = Vec::new();
    let mut report = LoadReport::new();

    // Row 0 is the header.
    for raw in range.rows().skip(1) {
        report.rows_scanned += 1;
        let state = match raw.get(STATE_COL).and_then(cell_text) {
            Some(s) => s,
            None => continue,
        };

        let referred = raw.get(REFERRED_FLAG_COL).map(cell_flag).unwrap_or(false);
        let admitted = raw.get(ADMITTED_FLAG_COL).map(cell_flag).unwrap_or(false);

        let referred_date = recover_event_date(
            event_date(referred, raw.get(REFERRED_DATE_COL).and_then(cell_date), || {
                cell_display(raw.get(REFERRED_DATE_COL))
            }),
            &mut report,
        );
        let admitted_date = recover_event_date(
            event_date(admitted, raw.get(ADMITTED_DATE_COL).and_then(cell_date), || {
                cell_display(raw.get(ADMITTED_DATE_COL))
            }),
            &mut report,
        );

        push_row(&mut rows, &mut report, state, referred_date, admitted_date);
    }

    Ok((rows, report))
}

fn load_csv(path: &Path) -> Result<(Vec<TypedRow>, LoadReport)> {
    let reader = csv::ReaderBuilder::new().flexible(true).from_path(path)?;
    extract_csv_records(reader)
}

/// Extract typed rows from any csv reader (also used by tests with an
/// in-memory buffer).
fn extract_csv_records<R: std::io::Read>(
    mut reader: csv::Reader<R>,
) -> Result<(Vec<TypedRow>, LoadReport)> {
    let mut rows = Vec::new();
    let mut report = LoadReport::new();

    for result in reader.records() {
        let record: StringRecord = result?;
        report.rows_scanned += 1;
        let state = match record.get(STATE_COL).map(str::trim) {
            Some(s) if !s.is_empty() => s.to_string(),
            _ => continue,
        };

        let referred = record.get(REFERRED_FLAG_COL).map(field_flag).unwrap_or(false);
        let admitted = record.get(ADMITTED_FLAG_COL).map(field_flag).unwrap_or(false);

        let referred_date = recover_event_date(
            event_date(
                referred,
                record.get(REFERRED_DATE_COL).and_then(field_date),
                || record.get(REFERRED_DATE_COL).unwrap_or("").to_string(),
            ),
            &mut report,
        );
        let admitted_date = recover_event_date(
            event_date(
                admitted,
                record.get(ADMITTED_DATE_COL).and_then(field_date),
                || record.get(ADMITTED_DATE_COL).unwrap_or("").to_string(),
            ),
            &mut report,
        );

        push_row(&mut rows, &mut report, state, referred_date, admitted_date);
    }

    Ok((rows, report))
}

/// A flagged event must carry a parseable date; otherwise it is a
/// `MalformedDate`. Unflagged cells are simply no event.
fn event_date(
    flagged: bool,
    date: Option<NaiveDate>,
    raw: impl FnOnce() -> String,
) -> Result<Option<NaiveDate>> {
    match (flagged, date) {
        (false, _) => Ok(None),
        (true, Some(d)) => Ok(Some(d)),
        (true, None) => Err(ReportError::MalformedDate(raw())),
    }
}

/// Recovery policy for extraction: drop the offending event, count it, and
/// keep going.
fn recover_event_date(result: Result<Option<NaiveDate>>, report: &mut LoadReport) -> Option<NaiveDate> {
    match result {
        Ok(date) => date,
        Err(e) => {
            log::warn!("{} (event dropped)", e);
            report.skipped_dates += 1;
            None
        }
    }
}

/// Emit a `TypedRow` when at least one event survived extraction.
fn push_row(
    rows: &mut Vec<TypedRow>,
    report: &mut LoadReport,
    state: String,
    referred_date: Option<NaiveDate>,
    admitted_date: Option<NaiveDate>,
) {
    let referred = referred_date.is_some();
    let admitted = admitted_date.is_some();
    if !referred && !admitted {
        return;
    }
    report.rows_extracted += 1;
    rows.push(TypedRow {
        state,
        referred_date,
        referred,
        admitted_date,
        admitted,
    });
}

fn cell_text(cell: &Data) -> Option<String> {
    let s = cell.as_string()?;
    let s = s.trim().to_string();
    if s.is_empty() {
        None
    } else {
        Some(s)
    }
}

/// A flag cell counts as set when it holds any non-zero numeric value.
fn cell_flag(cell: &Data) -> bool {
    cell.as_f64().map(|v| v != 0.0).unwrap_or(false)
}

/// Date cells are usually real spreadsheet dates, but exports sometimes
/// store them as text.
fn cell_date(cell: &Data) -> Option<NaiveDate> {
    cell.as_date()
        .or_else(|| cell.get_string().and_then(parse_date_flexible))
}

fn cell_display(cell: Option<&Data>) -> String {
    cell.and_then(|c| c.as_string()).unwrap_or_default()
}

fn field_flag(field: &str) -> bool {
    field.trim().parse::<f64>().map(|v| v != 0.0).unwrap_or(false)
}

fn field_date(field: &str) -> Option<NaiveDate> {
    parse_date_flexible(field)
}
