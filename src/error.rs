use thiserror::Error;

pub type Result<T> = std::result::Result<T, PipelineError>;

/// Errors surfaced by the ingestion/merge/analysis pipeline. All of these
/// are user-recoverable: a failed stage never invalidates tables that were
/// already loaded into the session.
#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("failed to parse {format} data: {message}")]
    Parse {
        format: &'static str,
        message: String,
    },

    #[error("unsupported file format {extension:?} (expected .csv, .tsv, .xlsx, .xls, or .ods)")]
    UnsupportedFormat { extension: String },

    #[error("no common identifier found (SSN or Student ID)")]
    NoCommonKey,

    #[error("column {0:?} is not present in the merged data")]
    MissingAttribute(&'static str),

    #[error("{0} data has not been loaded")]
    TableNotLoaded(&'static str),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
