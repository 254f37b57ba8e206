use crate::domain::record::Column;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("missing column: {0}")]
    MissingColumn(Column),

    #[error("invalid period selector: {0:?}")]
    InvalidPeriodSelector(String),

    #[error("undefined EBITDA margin (revenue is zero) at data row {row}")]
    UndefinedMargin { row: usize },

    #[error("missing feature: {0}")]
    MissingFeature(&'static str),

    #[error("failed to load model bundle {path}: {reason}")]
    BundleLoadFailure { path: PathBuf, reason: String },

    #[error("classifier produced class id {0} outside the label encoder")]
    UnknownClass(usize),

    #[error("invalid record at data row {row}: {detail}")]
    InvalidRecord { row: usize, detail: String },

    #[error("insufficient data: {0}")]
    InsufficientData(String),

    #[error("csv error: {0}")]
    Csv(#[from] csv::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
