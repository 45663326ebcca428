use chrono::NaiveDate;
use serde::Serialize;
use std::collections::BTreeMap;
use tabled::Tabled;

/// One intake row after extraction, before any aggregation.
///
/// A row carries at most one referral event and one admission event; either,
/// both, or neither may be present. The `state` field is kept so the same
/// loaded file can be filtered for different states in one session.
#[derive(Debug, Clone)]
pub struct TypedRow {
    pub state: String,
    pub referred_date: Option<NaiveDate>,
    pub referred: bool,
    pub admitted_date: Option<NaiveDate>,
    pub admitted: bool,
}

/// Per-date totals for one reporting week.
///
/// `week_of` is the referral date used as the grouping key; it is unique
/// across a run's aggregates. `conversion_ratio` is zero until the metrics
/// step fills it in.
#[derive(Debug, Clone, PartialEq)]
pub struct WeeklyAggregate {
    pub week_of: NaiveDate,
    pub referred: u32,
    pub admitted: u32,
    pub conversion_ratio: f64,
}

/// One display row of the finished report, used for the console preview.
#[derive(Debug, Clone, PartialEq, Tabled)]
pub struct ReportRow {
    #[tabled(rename = "Week")]
    pub week: String,
    #[tabled(rename = "WeekOf")]
    pub week_of: String,
    #[tabled(rename = "Conversion")]
    pub conversion: String,
    #[tabled(rename = "Average")]
    pub average: String,
    #[tabled(rename = "Admitted")]
    pub admitted: u32,
    #[tabled(rename = "Referred")]
    pub referred: u32,
    #[tabled(rename = "ReferredDate")]
    pub referred_date: String,
}

/// A single spreadsheet cell value.
#[derive(Debug, Clone, PartialEq)]
pub enum Cell {
    Text(String),
    Int(u32),
}

/// Renderer-independent report grid.
///
/// Cells are keyed by 1-based (row, column) to match spreadsheet addressing.
/// `header_cols` is the extent of the bold/filled header range on row 1 and
/// `width_cols` the extent of the fixed-width column range; both are computed
/// by the layout step and merely applied by the renderer.
#[derive(Debug, Clone, PartialEq)]
pub struct ReportGrid {
    pub cells: BTreeMap<(u32, u32), Cell>,
    pub header_cols: u32,
    pub width_cols: u32,
}

/// Everything the layout step produces for one report run.
#[derive(Debug, Clone, PartialEq)]
pub struct WeeklyReport {
    pub rows: Vec<ReportRow>,
    pub grid: ReportGrid,
    pub average_ratio: f64,
}

/// Machine-readable summary of one report run, written next to the workbook.
#[derive(Debug, Serialize)]
pub struct RunSummary {
    pub state: String,
    pub num_weeks: usize,
    pub total_referred: u32,
    pub total_admitted: u32,
    pub average_ratio: f64,
    pub output_file: String,
}
