//! Error taxonomy for the batch engine.
//!
//! Only [`JobError::Validation`] and [`JobError::SetupFatal`] ever reach the
//! caller of a job; everything in [`FileError`] stays attached to the file
//! that caused it.

use crate::engine::EngineError;
use crate::job::JobState;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum JobError {
    #[error("cannot start job: {0}")]
    Validation(String),

    #[error("job setup failed: {0}")]
    SetupFatal(String),

    #[error("cannot {action} while job is {state}")]
    InvalidTransition {
        action: &'static str,
        state: JobState,
    },

    #[error("worker thread panicked")]
    WorkerPanicked,
}

#[derive(Error, Debug)]
pub enum FileError {
    #[error("stopped by user")]
    Stopped,

    #[error(transparent)]
    Engine(#[from] EngineError),

    #[error("{context}: {path}: {source}")]
    Io {
        context: &'static str,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl FileError {
    pub fn io(context: &'static str, path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        FileError::Io {
            context,
            path: path.into(),
            source,
        }
    }
}
