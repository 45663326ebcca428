use thiserror::Error;

/// Failure taxonomy for a report run.
///
/// `InvalidRequest` and `MalformedDate` are contract violations surfaced to
/// the caller; the remaining variants wrap I/O and format errors from the
/// reader/writer collaborators and abort the run with no partial output.
#[derive(Debug, Error)]
pub enum ReportError {
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error("malformed date: {0}")]
    MalformedDate(String),

    #[error("I/O failure: {0}")]
    Io(#[from] std::io::Error),

    #[error("workbook read failure: {0}")]
    WorkbookRead(#[from] calamine::XlsxError),

    #[error("workbook write failure: {0}")]
    WorkbookWrite(#[from] rust_xlsxwriter::XlsxError),

    #[error("csv read failure: {0}")]
    Csv(#[from] csv::Error),

    #[error("summary write failure: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, ReportError>;
