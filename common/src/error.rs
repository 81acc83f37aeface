//! Error taxonomy shared by every crate in the workspace

use chrono::NaiveDate;
use std::path::PathBuf;
use thiserror::Error;

/// Errors raised by panel handling, backtesting and the alpha pool.
///
/// Degenerate numeric situations (zero variance, empty cross sections, too few
/// paired observations) are never errors; they surface as missing values.
#[derive(Debug, Error)]
pub enum AlphaError {
    /// Universe selector is malformed or does not fit the return panel
    #[error("invalid universe: {0}")]
    InvalidUniverse(String),

    /// Two panels were combined without aligned date indices
    #[error("index mismatch: {0}")]
    IndexMismatch(String),

    /// A persisted factor exists but its paired artifact does not
    #[error("missing file: {}", path.display())]
    MissingArtifact { path: PathBuf },

    /// Evaluator finished without producing the metrics the caller asked for
    #[error("evaluation of '{0}' produced no metrics")]
    MissingMetrics(String),

    /// Comparison table ordered by a column that does not exist
    #[error("sort key '{key}' should be one of {available:?}")]
    InvalidSortKey { key: String, available: Vec<String> },

    /// Factor date with no matching row in the return panel
    #[error("date {date} is absent from the return panel")]
    Alignment { date: NaiveDate },

    /// Panel values do not match the declared index shape
    #[error("malformed panel: {0}")]
    PanelShape(String),

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("csv error: {0}")]
    Csv(String),

    #[error("parse error: {0}")]
    Parse(String),
}

pub type Result<T> = std::result::Result<T, AlphaError>;
