//! Error types shared by the mesh builder, serializer and publishing pipeline.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ExportError {
    #[error("Invalid stroke: {0}")]
    InvalidStroke(String),

    #[error("Degenerate geometry: {0}")]
    DegenerateGeometry(String),

    #[error("Nothing to export: {0}")]
    EmptyExport(String),

    #[error("Texture fetch failed for {source_ref}: {reason}")]
    TextureFetch { source_ref: String, reason: String },

    #[error("Texture decode failed for {source_ref}: {reason}")]
    TextureDecode { source_ref: String, reason: String },

    #[error("Timed out after {0:?} waiting for texture uploads")]
    Timeout(std::time::Duration),

    #[error("Export cancelled")]
    Cancelled,

    #[error("Asset store error: {0}")]
    Asset(String),

    #[error("Invalid job: {0}")]
    InvalidJob(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl ExportError {
    pub(crate) fn fetch(source_ref: &str, reason: impl ToString) -> Self {
        ExportError::TextureFetch {
            source_ref: source_ref.to_string(),
            reason: reason.to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, ExportError>;
