// Rendering collaborators: styled workbook output, console preview, and the
// JSON run summary. Nothing here computes report content; it applies the
// ranges and values the layout step already decided.
use crate::error::Result;
use crate::types::{Cell, ReportGrid, ReportRow, RunSummary};
use chrono::Local;
use rust_xlsxwriter::{Color, Format, Workbook};
use std::path::{Path, PathBuf};
use tabled::{settings::Style, Table};

/// Fixed width applied to every column in the grid's width range.
const COLUMN_WIDTH: f64 = 10.0;

/// Light-gray solid fill for the header row.
const HEADER_FILL: Color = Color::RGB(0xD3D3D3);

/// Output filename carrying the run timestamp, e.g.
/// `GeneratedReport_20240107_134500.xlsx`.
pub fn timestamped_report_path(dir: &Path) -> PathBuf {
    let timestamp = Local::now().format("%Y%m%d_%H%M%S");
    dir.join(format!("GeneratedReport_{}.xlsx", timestamp))
}

/// Write the report grid to a styled workbook.
///
/// The whole header range is bold on a light-gray fill, including cells the
/// layout left empty, and every column in the width range gets the same
/// fixed width. Grid coordinates are 1-based; the writer is 0-based.
pub fn write_workbook(path: &Path, grid: &ReportGrid) -> Result<()> {
    let mut workbook = Workbook::new();
    let worksheet = workbook.add_worksheet();
    worksheet.set_name("Report")?;

    let header_format = Format::new().set_bold().set_background_color(HEADER_FILL);

    for col in 1..=grid.header_cols {
        let col_idx = (col - 1) as u16;
        match grid.cells.get(&(1, col)) {
            Some(Cell::Text(s)) => {
                worksheet.write_string_with_format(0, col_idx, s.as_str(), &header_format)?;
            }
            Some(Cell::Int(v)) => {
                worksheet.write_number_with_format(0, col_idx, *v as f64, &header_format)?;
            }
            None => {
                worksheet.write_blank(0, col_idx, &header_format)?;
            }
        }
    }

    for ((row, col), cell) in &grid.cells {
        if *row == 1 {
            continue;
        }
        let (row_idx, col_idx) = (row - 1, (col - 1) as u16);
        match cell {
            Cell::Text(s) => worksheet.write_string(row_idx, col_idx, s.as_str())?,
            Cell::Int(v) => worksheet.write_number(row_idx, col_idx, *v as f64)?,
        };
    }

    for col in 1..=grid.width_cols {
        worksheet.set_column_width((col - 1) as u16, COLUMN_WIDTH)?;
    }

    workbook.save(path)?;
    Ok(())
}

/// Print a markdown-style preview of the report rows to the console.
pub fn preview_report(rows: &[ReportRow]) {
    if rows.is_empty() {
        println!("(no rows)\n");
        return;
    }
    let table = Table::new(rows).with(Style::markdown()).to_string();
    println!("{}\n", table);
}

/// Write the machine-readable run summary next to the workbook.
pub fn write_summary(path: &Path, summary: &RunSummary) -> Result<()> {
    let s = serde_json::to_string_pretty(summary)?;
    std::fs::write(path, s)?;
    Ok(())
}
