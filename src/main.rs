// Entry point and high-level console flow.
//
// - Option [1] discovers and loads the input spreadsheet, printing
//   diagnostics.
// - Option [2] prompts for a state code and a week count, runs the weekly
//   conversion pipeline, and writes the styled workbook plus a JSON summary.
// - After generating a report, the user can go back to the menu or exit.
mod error;
mod loader;
mod output;
mod reports;
mod types;
mod util;

use error::Result;
use once_cell::sync::Lazy;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use types::{RunSummary, TypedRow};

/// Folder scanned for the input spreadsheet.
const INPUT_DIR: &str = "InputFiles";
/// Folder receiving the generated report and summary.
const OUTPUT_DIR: &str = "OutputFiles";

// Simple in-memory app state so we only load the spreadsheet once but can
// generate reports for several states in a single run.
static APP_STATE: Lazy<Mutex<AppState>> = Lazy::new(|| Mutex::new(AppState { rows: None }));

struct AppState {
    rows: Option<Vec<TypedRow>>,
}

/// Print a prompt and read a single trimmed line of input.
fn read_line(prompt: &str) -> String {
    print!("{}", prompt);
    let _ = io::stdout().flush();
    let mut buf = String::new();
    io::stdin().read_line(&mut buf).ok();
    buf.trim().to_string()
}

/// Ask the user whether to go back to the report menu after generating a
/// report. Returns `true` for `Y`, `false` for `N`.
fn prompt_back_to_menu() -> bool {
    loop {
        match read_line("Back to Report Selection (Y/N): ").to_uppercase().as_str() {
            "Y" => return true,
            "N" => return false,
            _ => println!("Invalid choice. Please enter Y or N."),
        }
    }
}

/// Prompt until a non-empty, alphabetic state code is entered; the code is
/// uppercased for matching against the file's state column.
fn prompt_state() -> String {
    loop {
        let input = read_line("Enter the state to filter (e.g., MN, IA, WI): ");
        if input.is_empty() {
            println!("Please provide the state data for filtering");
            log::error!("empty state filter entered");
        } else if !util::is_alphabetic(&input) {
            println!("Error: State filter must contain only alphabetic characters.");
            log::error!("non-alphabetic state filter entered: {}", input);
        } else {
            let state = input.to_uppercase();
            log::info!("user entered state {}", state);
            return state;
        }
    }
}

/// Prompt until a week count within `1..=available` is entered.
fn prompt_num_weeks(available: usize) -> usize {
    loop {
        let input = read_line(&format!(
            "Enter the number of weeks the report should cover (within {}): ",
            available
        ));
        match input.parse::<usize>() {
            Ok(n) if (1..=available).contains(&n) => return n,
            Ok(n) => {
                println!("Please enter a number between 1 and {}.", available);
                log::error!("number of weeks out of range: {}", n);
            }
            Err(_) => {
                println!("Invalid input. Please enter a valid number of weeks.");
                log::error!("invalid input for number of weeks: {}", input);
            }
        }
    }
}

/// Handle option [1]: discover and load the input spreadsheet.
///
/// On success the typed rows are stored in `APP_STATE` and a short textual
/// summary of the load is printed.
fn handle_load() {
    match load_input() {
        Ok((rows, load_report)) => {
            println!(
                "Processing dataset... ({} rows scanned, {} with referral or admission events)",
                util::format_int(load_report.rows_scanned as i64),
                util::format_int(load_report.rows_extracted as i64)
            );
            if load_report.skipped_dates > 0 {
                println!(
                    "Note: {} events skipped due to malformed dates.",
                    util::format_int(load_report.skipped_dates as i64)
                );
            }
            println!();
            let mut state = APP_STATE.lock().unwrap();
            state.rows = Some(rows);
        }
        Err(e) => {
            eprintln!("Failed to load input: {}\n", e);
            log::error!("load failed: {}", e);
        }
    }
}

fn load_input() -> Result<(Vec<TypedRow>, loader::LoadReport)> {
    let path = loader::find_input_file(Path::new(INPUT_DIR))?;
    if let Some(name) = path.file_name().and_then(|n| n.to_str()) {
        println!("Using file: {}", name);
    }
    loader::load_rows(&path)
}

/// Handle option [2]: prompt for parameters and run the report pipeline.
fn handle_generate_report() {
    let rows = {
        let state = APP_STATE.lock().unwrap();
        state.rows.clone()
    };
    let Some(rows) = rows else {
        println!("Error: No data loaded. Please load the input spreadsheet first (option 1).\n");
        return;
    };

    let state_code = prompt_state();
    let filtered: Vec<TypedRow> = rows
        .iter()
        .filter(|r| r.state == state_code)
        .cloned()
        .collect();
    let aggregates = reports::aggregate_by_week(&filtered);
    if aggregates.is_empty() {
        println!("No records found for the specified state.");
        log::warn!("no records found for state {}", state_code);
        return;
    }

    let num_weeks = prompt_num_weeks(aggregates.len());
    log::info!(
        "report generation starts for state {} over {} weeks",
        state_code,
        num_weeks
    );
    match run_report(&state_code, aggregates, num_weeks) {
        Ok(path) => {
            println!("Report written to {}\n", path.display());
            log::info!("report generation completed: {}", path.display());
        }
        Err(e) => {
            eprintln!("Report generation failed: {}\n", e);
            log::error!("report generation failed: {}", e);
        }
    }
}

/// Run the core pipeline over the aggregates and write all artifacts:
/// console preview, styled workbook, JSON summary.
fn run_report(
    state_code: &str,
    aggregates: Vec<types::WeeklyAggregate>,
    num_weeks: usize,
) -> Result<PathBuf> {
    let report = reports::build_weekly_report(aggregates, num_weeks)?;
    output::preview_report(&report.rows);

    std::fs::create_dir_all(OUTPUT_DIR)?;
    let path = output::timestamped_report_path(Path::new(OUTPUT_DIR));
    output::write_workbook(&path, &report.grid)?;

    let summary = RunSummary {
        state: state_code.to_string(),
        num_weeks,
        total_referred: report.rows.iter().map(|r| r.referred).sum(),
        total_admitted: report.rows.iter().map(|r| r.admitted).sum(),
        average_ratio: report.average_ratio,
        output_file: path.display().to_string(),
    };
    output::write_summary(&Path::new(OUTPUT_DIR).join("summary.json"), &summary)?;

    Ok(path)
}

fn main() {
    env_logger::init();
    loop {
        println!("Select an option:");
        println!("[1] Load the input spreadsheet");
        println!("[2] Generate weekly conversion report\n");
        match read_line("Enter choice: ").as_str() {
            "1" => {
                handle_load();
            }
            "2" => {
                println!();
                handle_generate_report();
                if !prompt_back_to_menu() {
                    println!("Exiting the program.");
                    break;
                }
            }
            _ => {
                println!("Invalid choice. Please enter 1 or 2.\n");
            }
        }
    }
}
