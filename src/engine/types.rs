use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EngineError {
    #[error("failed to open {path}: {reason}")]
    OpenFailed { path: PathBuf, reason: String },

    #[error("failed to save {path}: {reason}")]
    SaveFailed { path: PathBuf, reason: String },

    #[error("failed to render page {page}: {reason}")]
    RenderFailed { page: usize, reason: String },

    #[error("recognition failed: {0}")]
    RecognitionFailed(String),

    #[error("engine unavailable: {0}")]
    Unavailable(String),

    #[error("malformed document: {0}")]
    Malformed(String),
}

/// One rendered page, PNG-encoded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Raster {
    pub png: Vec<u8>,
    pub dpi: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecognizerDiag {
    pub exe: String,
    pub version: String,
    pub languages: Vec<String>,
    pub ok: bool,
    #[serde(default)]
    pub error: Option<String>,
}
