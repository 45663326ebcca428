// The aggregation-and-report engine.
//
// Everything in this module is a pure function of its input: rows in,
// aggregates / grid out. File formats, prompting, and styling live in the
// collaborator modules (`loader`, `main`, `output`).
use crate::error::{ReportError, Result};
use crate::types::{Cell, ReportGrid, ReportRow, TypedRow, WeeklyAggregate, WeeklyReport};
use crate::util::{format_pct, full_date_label, round2, short_date_label};
use chrono::NaiveDate;
use std::collections::{BTreeMap, HashMap};

/// Group referral and admission events by date.
///
/// Both counters are local maps consumed before this function returns; the
/// result is the immutable aggregate collection keyed by referral date.
///
/// An aggregate exists only for dates that received at least one referral.
/// An admission is counted under its own date, so admissions on dates with
/// zero referrals are silently dropped rather than creating a zero-referral
/// aggregate.
pub fn aggregate_by_week(rows: &[TypedRow]) -> Vec<WeeklyAggregate> {
    let mut refer_by_date: HashMap<NaiveDate, u32> = HashMap::new();
    let mut admit_by_date: HashMap<NaiveDate, u32> = HashMap::new();

    for row in rows {
        if row.referred {
            if let Some(date) = row.referred_date {
                *refer_by_date.entry(date).or_insert(0) += 1;
            }
        }
        if row.admitted {
            if let Some(date) = row.admitted_date {
                *admit_by_date.entry(date).or_insert(0) += 1;
            }
        }
    }

    refer_by_date
        .into_iter()
        .map(|(week_of, referred)| WeeklyAggregate {
            week_of,
            referred,
            admitted: admit_by_date.get(&week_of).copied().unwrap_or(0),
            conversion_ratio: 0.0,
        })
        .collect()
}

/// Order aggregates by date descending and keep the most recent `num_weeks`.
///
/// Callers validate the requested count against the available weeks before
/// invoking the pipeline; this check is the fail-fast backstop.
pub fn select_recent_weeks(
    mut aggregates: Vec<WeeklyAggregate>,
    num_weeks: usize,
) -> Result<Vec<WeeklyAggregate>> {
    if num_weeks == 0 || num_weeks > aggregates.len() {
        return Err(ReportError::InvalidRequest(format!(
            "requested {} weeks but {} are available",
            num_weeks,
            aggregates.len()
        )));
    }
    // Dates are unique by construction, so no tie-break is needed.
    aggregates.sort_by(|a, b| b.week_of.cmp(&a.week_of));
    aggregates.truncate(num_weeks);
    Ok(aggregates)
}

/// Fill in each week's conversion ratio and return the overall average.
///
/// The ratio is admitted-over-referred (that is the business's "conversion"),
/// zero when nothing was referred. Ratios are stored rounded to two decimals
/// and the average is the unweighted mean of those stored values, rounded the
/// same way, so the summary matches the figures the report displays.
pub fn compute_ratios(weeks: &mut [WeeklyAggregate]) -> f64 {
    let mut total = 0.0;
    for week in weeks.iter_mut() {
        let ratio = if week.referred > 0 {
            round2(week.admitted as f64 / week.referred as f64 * 100.0)
        } else {
            0.0
        };
        week.conversion_ratio = ratio;
        total += ratio;
    }
    if weeks.is_empty() {
        0.0
    } else {
        round2(total / weeks.len() as f64)
    }
}

/// Column holding week `week_number`'s ratio value and date label.
///
/// The ratio block runs right-to-left as weeks get older: the most recent
/// week (W0) lands in the rightmost column of the block and each subsequent
/// week shifts one column left on the next row, producing the report's
/// diagonal. Kept as a named function so the layout cannot silently drift.
pub fn column_for_week(week_number: usize, num_weeks: usize) -> u32 {
    (num_weeks + 1 - week_number) as u32
}

/// Build the preview rows for the selected weeks, most recent first.
///
/// The average appears only on the first data row, matching the single
/// average cell in the rendered grid.
pub fn build_report_rows(weeks: &[WeeklyAggregate], average_ratio: f64) -> Vec<ReportRow> {
    weeks
        .iter()
        .enumerate()
        .map(|(i, week)| ReportRow {
            week: format!("W{}", i),
            week_of: short_date_label(week.week_of),
            conversion: format_pct(week.conversion_ratio),
            average: if i == 0 {
                format_pct(average_ratio)
            } else {
                String::new()
            },
            admitted: week.admitted,
            referred: week.referred,
            referred_date: full_date_label(week.week_of),
        })
        .collect()
}

/// Lay out the fixed-schema report grid.
///
/// Columns are 1-based with `W = weeks.len()`:
/// - column 1 holds the `W{i}` row labels;
/// - columns 2..=W+1 hold the diagonal ratio block, with each week's short
///   date label written into row 1 of the same column;
/// - columns W+2..=W+5 hold the Average / Admitted / Referred / ReferredDate
///   headers and values, with the single average cell at row 2.
///
/// The bold header range spans columns 1..=W+6 and the fixed-width range
/// 1..=W+5; applying them is the renderer's job. With zero weeks the grid is
/// header-only and no average cell is written.
pub fn build_grid(weeks: &[WeeklyAggregate], average_ratio: f64) -> ReportGrid {
    let num_weeks = weeks.len();
    let w = num_weeks as u32;
    let mut cells: BTreeMap<(u32, u32), Cell> = BTreeMap::new();

    cells.insert((1, 1), Cell::Text("Week".to_string()));
    cells.insert((1, w + 2), Cell::Text("Average".to_string()));
    cells.insert((1, w + 3), Cell::Text("Admitted".to_string()));
    cells.insert((1, w + 4), Cell::Text("Referred".to_string()));
    cells.insert((1, w + 5), Cell::Text("ReferredDate".to_string()));

    for (i, week) in weeks.iter().enumerate() {
        let row = i as u32 + 2;
        let ratio_col = column_for_week(i, num_weeks);
        cells.insert((row, 1), Cell::Text(format!("W{}", i)));
        cells.insert((1, ratio_col), Cell::Text(short_date_label(week.week_of)));
        cells.insert((row, ratio_col), Cell::Text(format_pct(week.conversion_ratio)));
        cells.insert((row, w + 3), Cell::Int(week.admitted));
        cells.insert((row, w + 4), Cell::Int(week.referred));
        cells.insert((row, w + 5), Cell::Text(full_date_label(week.week_of)));
    }

    if num_weeks > 0 {
        cells.insert((2, w + 2), Cell::Text(format_pct(average_ratio)));
    }

    ReportGrid {
        cells,
        header_cols: w + 6,
        width_cols: w + 5,
    }
}

/// Run the core pipeline over an already-built aggregate collection:
/// select the most recent weeks, compute ratios, and lay out the report.
pub fn build_weekly_report(
    aggregates: Vec<WeeklyAggregate>,
    num_weeks: usize,
) -> Result<WeeklyReport> {
    let mut weeks = select_recent_weeks(aggregates, num_weeks)?;
    let average_ratio = compute_ratios(&mut weeks);
    let rows = build_report_rows(&weeks, average_ratio);
    let grid = build_grid(&weeks, average_ratio);
    Ok(WeeklyReport {
        rows,
        grid,
        average_ratio,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn referral(state: &str, d: NaiveDate) -> TypedRow {
        TypedRow {
            state: state.to_string(),
            referred_date: Some(d),
            referred: true,
            admitted_date: None,
            admitted: false,
        }
    }

    fn admission(state: &str, d: NaiveDate) -> TypedRow {
        TypedRow {
            state: state.to_string(),
            referred_date: None,
            referred: false,
            admitted_date: Some(d),
            admitted: true,
        }
    }

    fn sample_rows() -> Vec<TypedRow> {
        let recent = date(2024, 1, 7);
        let older = date(2023, 12, 31);
        let mut rows = vec![referral("MN", recent); 3];
        rows.push(admission("MN", recent));
        rows.push(admission("MN", recent));
        rows.push(referral("MN", older));
        rows
    }

    #[test]
    fn one_aggregate_per_distinct_referral_date() {
        let rows = sample_rows();
        let aggregates = aggregate_by_week(&rows);
        assert_eq!(aggregates.len(), 2);
        let mut dates: Vec<NaiveDate> = aggregates.iter().map(|a| a.week_of).collect();
        dates.sort();
        assert_eq!(dates, vec![date(2023, 12, 31), date(2024, 1, 7)]);
    }

    #[test]
    fn admissions_without_referrals_are_dropped() {
        // An admission on a date that never received a referral contributes
        // nothing to the aggregates.
        let orphan = date(2024, 2, 14);
        let mut rows = sample_rows();
        rows.push(admission("MN", orphan));
        let aggregates = aggregate_by_week(&rows);
        assert_eq!(aggregates.len(), 2);
        assert!(aggregates.iter().all(|a| a.week_of != orphan));
    }

    #[test]
    fn rows_with_both_events_count_in_both_totals() {
        let d = date(2024, 1, 7);
        let rows = vec![TypedRow {
            state: "MN".to_string(),
            referred_date: Some(d),
            referred: true,
            admitted_date: Some(d),
            admitted: true,
        }];
        let aggregates = aggregate_by_week(&rows);
        assert_eq!(aggregates.len(), 1);
        assert_eq!(aggregates[0].referred, 1);
        assert_eq!(aggregates[0].admitted, 1);
    }

    #[test]
    fn selector_orders_descending_and_truncates() {
        let aggregates = aggregate_by_week(&sample_rows());
        let weeks = select_recent_weeks(aggregates, 1).unwrap();
        assert_eq!(weeks.len(), 1);
        assert_eq!(weeks[0].week_of, date(2024, 1, 7));
    }

    #[test]
    fn selector_rejects_out_of_range_requests() {
        let aggregates = aggregate_by_week(&sample_rows());
        assert!(matches!(
            select_recent_weeks(aggregates.clone(), 3),
            Err(ReportError::InvalidRequest(_))
        ));
        assert!(matches!(
            select_recent_weeks(aggregates, 0),
            Err(ReportError::InvalidRequest(_))
        ));
    }

    #[test]
    fn ratio_is_zero_when_nothing_referred() {
        let mut weeks = vec![WeeklyAggregate {
            week_of: date(2024, 1, 7),
            referred: 0,
            admitted: 4,
            conversion_ratio: 0.0,
        }];
        let average = compute_ratios(&mut weeks);
        assert_eq!(weeks[0].conversion_ratio, 0.0);
        assert_eq!(average, 0.0);
    }

    #[test]
    fn average_is_unweighted_mean_of_rounded_ratios() {
        let mut weeks = vec![
            WeeklyAggregate {
                week_of: date(2024, 1, 7),
                referred: 3,
                admitted: 2,
                conversion_ratio: 0.0,
            },
            WeeklyAggregate {
                week_of: date(2023, 12, 31),
                referred: 1,
                admitted: 0,
                conversion_ratio: 0.0,
            },
        ];
        let average = compute_ratios(&mut weeks);
        assert_eq!(weeks[0].conversion_ratio, 66.67);
        assert_eq!(weeks[1].conversion_ratio, 0.0);
        assert_eq!(average, 33.34);
    }

    #[test]
    fn column_for_week_runs_right_to_left() {
        // Five weeks: W0 lands in the rightmost block column, W4 in column 2.
        assert_eq!(column_for_week(0, 5), 6);
        assert_eq!(column_for_week(1, 5), 5);
        assert_eq!(column_for_week(4, 5), 2);
        // Degenerate single-week report still uses column 2.
        assert_eq!(column_for_week(0, 1), 2);
    }

    #[test]
    fn worked_example_two_weeks() {
        let aggregates = aggregate_by_week(&sample_rows());
        let report = build_weekly_report(aggregates, 2).unwrap();

        assert_eq!(report.rows.len(), 2);
        assert_eq!(report.rows[0].week, "W0");
        assert_eq!(report.rows[0].referred_date, "1/7/2024");
        assert_eq!(report.rows[0].conversion, "66.67%");
        assert_eq!(report.rows[0].average, "33.34%");
        assert_eq!(report.rows[1].week, "W1");
        assert_eq!(report.rows[1].referred_date, "12/31/2023");
        assert_eq!(report.rows[1].conversion, "0.00%");
        assert_eq!(report.rows[1].average, "");
        assert_eq!(report.average_ratio, 33.34);
    }

    #[test]
    fn grid_layout_matches_fixed_schema() {
        let aggregates = aggregate_by_week(&sample_rows());
        let report = build_weekly_report(aggregates, 2).unwrap();
        let grid = &report.grid;

        // Headers: W = 2, so Average sits at column 4 and the bold range
        // extends one column past the last header.
        assert_eq!(grid.cells[&(1, 1)], Cell::Text("Week".to_string()));
        assert_eq!(grid.cells[&(1, 4)], Cell::Text("Average".to_string()));
        assert_eq!(grid.cells[&(1, 5)], Cell::Text("Admitted".to_string()));
        assert_eq!(grid.cells[&(1, 6)], Cell::Text("Referred".to_string()));
        assert_eq!(grid.cells[&(1, 7)], Cell::Text("ReferredDate".to_string()));
        assert_eq!(grid.header_cols, 8);
        assert_eq!(grid.width_cols, 7);

        // Diagonal ratio block: W0 at (2,3), W1 at (3,2), with the matching
        // short date labels on row 1.
        assert_eq!(grid.cells[&(2, 3)], Cell::Text("66.67%".to_string()));
        assert_eq!(grid.cells[&(1, 3)], Cell::Text("Jan-7".to_string()));
        assert_eq!(grid.cells[&(3, 2)], Cell::Text("0.00%".to_string()));
        assert_eq!(grid.cells[&(1, 2)], Cell::Text("Dec-31".to_string()));

        // Totals, dates, and the single average cell.
        assert_eq!(grid.cells[&(2, 1)], Cell::Text("W0".to_string()));
        assert_eq!(grid.cells[&(2, 4)], Cell::Text("33.34%".to_string()));
        assert_eq!(grid.cells[&(2, 5)], Cell::Int(2));
        assert_eq!(grid.cells[&(2, 6)], Cell::Int(3));
        assert_eq!(grid.cells[&(2, 7)], Cell::Text("1/7/2024".to_string()));
        assert_eq!(grid.cells[&(3, 5)], Cell::Int(0));
        assert_eq!(grid.cells[&(3, 6)], Cell::Int(1));
        assert_eq!(grid.cells[&(3, 7)], Cell::Text("12/31/2023".to_string()));
        assert!(!grid.cells.contains_key(&(3, 4)));
    }

    #[test]
    fn zero_weeks_builds_header_only_grid() {
        let grid = build_grid(&[], 0.0);
        assert_eq!(grid.cells.len(), 5);
        assert!(grid.cells.keys().all(|(row, _)| *row == 1));
        // No average cell is written for an empty selection.
        assert!(!grid.cells.contains_key(&(2, 2)));
        assert_eq!(grid.header_cols, 6);
        assert_eq!(grid.width_cols, 5);
    }

    #[test]
    fn pipeline_is_idempotent() {
        let aggregates = aggregate_by_week(&sample_rows());
        let first = build_weekly_report(aggregates.clone(), 2).unwrap();
        let second = build_weekly_report(aggregates, 2).unwrap();
        assert_eq!(first.grid, second.grid);
        assert_eq!(first.rows, second.rows);
    }
}
