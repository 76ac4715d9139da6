use std::path::PathBuf;

#[derive(Debug, thiserror::Error)]
pub enum DealsheetError {
    #[error("workbook read failed: {0}")]
    WorkbookRead(String),

    #[error("invalid value '{value}': {reason}")]
    InvalidValue { value: String, reason: String },

    #[error("failed to load configuration from {path}: {reason}")]
    ConfigLoad { path: PathBuf, reason: String },

    #[error("invalid configuration: {0}")]
    ConfigInvalid(String),

    #[error("unknown preset '{name}'. Available: {available}")]
    UnknownPreset { name: String, available: String },

    #[error("no usable sheets: every worksheet in the workbook is empty")]
    NoUsableSheets,

    #[error("invalid valuation input: {0}")]
    InvalidValuationInput(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}
