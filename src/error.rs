use std::path::PathBuf;

use miette::Diagnostic;
use thiserror::Error;

#[derive(Debug, Error, Diagnostic)]
pub enum VdbError {
    #[error("invalid date format (expected YYYY-MM-DD, XX for unknown parts): {0}")]
    InvalidDateFormat(String),

    #[error("date interval must list the earlier date first: {start} - {end}")]
    InvalidInterval { start: String, end: String },

    #[error("persistence failed: {0}")]
    PersistenceError(String),

    #[error("unsupported output format: {0} (expected json, fasta or tsv)")]
    UnsupportedOutputFormat(String),

    #[error("record is missing identity field `{field}`")]
    MissingIdentityField { field: String },

    #[error("invalid selector: {0}")]
    InvalidSelector(String),

    #[error("can't use this database: {0}")]
    InvalidDatabase(String),

    #[error("table not found: {0}")]
    TableNotFound(String),

    #[error("table already exists: {0}")]
    TableExists(String),

    #[error("failed to read config file at {0}")]
    ConfigRead(PathBuf),

    #[error("failed to parse JSON config: {0}")]
    ConfigParse(String),

    #[error("failed to parse input: {0}")]
    InputParse(String),

    #[error("filesystem error: {0}")]
    Filesystem(String),
}
