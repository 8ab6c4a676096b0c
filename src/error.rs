use polars::prelude::PolarsError;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, PipelineError>;

/// Fatal failures of the analysis pipeline.
#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("Malformed input: {0}")]
    MalformedInput(String),

    #[error("Margin undefined for row {row_id}: sales is zero")]
    DivisionUndefined { row_id: u64 },

    #[error("Row {row_id} ships before it is ordered ({ship_date} < {order_date})")]
    NegativeTurnaround {
        row_id: u64,
        order_date: chrono::NaiveDate,
        ship_date: chrono::NaiveDate,
    },

    #[error("Singular fit: {reason} ({n_obs} observations, {n_params} parameters)")]
    SingularFit {
        reason: String,
        n_obs: usize,
        n_params: usize,
    },

    #[error("Unknown column: {0}")]
    UnknownColumn(String),

    #[error("Level '{level}' was not seen when fitting '{term}'")]
    UnknownLevel { term: String, level: String },

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Polars error: {0}")]
    Polars(#[from] PolarsError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl PipelineError {
    pub fn malformed(message: impl Into<String>) -> Self {
        PipelineError::MalformedInput(message.into())
    }
}

/// Non-fatal findings surfaced for human review.
#[derive(Debug, Clone, PartialEq)]
pub enum DataQualityWarning {
    IncompleteColumn {
        column: String,
        missing: usize,
        total: usize,
    },
    UnlistedValue {
        column: String,
        value: String,
        occurrences: usize,
    },
    OutOfRange {
        column: String,
        row_id: u64,
        value: f64,
    },
    UnexpectedColumn(String),
}

impl std::fmt::Display for DataQualityWarning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DataQualityWarning::IncompleteColumn {
                column,
                missing,
                total,
            } => write!(f, "column '{}' is missing {} of {} values", column, missing, total),
            DataQualityWarning::UnlistedValue {
                column,
                value,
                occurrences,
            } => write!(
                f,
                "column '{}' has value '{}' ({} rows) outside the allow-list",
                column, value, occurrences
            ),
            DataQualityWarning::OutOfRange {
                column,
                row_id,
                value,
            } => write!(f, "row {} has {} = {} out of range", row_id, column, value),
            DataQualityWarning::UnexpectedColumn(name) => {
                write!(f, "column '{}' is not part of the order schema", name)
            }
        }
    }
}
