use crate::job::JobOutcome;
use crate::progress::ProgressSnapshot;
use crate::report::LogRecord;
use serde::Serialize;
use std::path::PathBuf;
use std::sync::mpsc::Sender;
use tracing::{error, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Info,
    Warn,
    Error,
}

/// Everything a job tells its observer. Delivered in emission order.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum JobEvent {
    Started {
        total: usize,
    },
    FileStarted {
        index: usize,
        total: usize,
        path: PathBuf,
    },
    Log {
        level: LogLevel,
        message: String,
    },
    /// `page` is 1-based.
    PageRecognized {
        index: usize,
        page: usize,
        pages: usize,
    },
    FileFinished {
        index: usize,
        record: LogRecord,
        progress: ProgressSnapshot,
    },
    Progress {
        progress: ProgressSnapshot,
    },
    Finished {
        outcome: JobOutcome,
        progress: ProgressSnapshot,
    },
}

/// Sends job events to the observer and mirrors log lines into `tracing`.
/// A dropped receiver is not an error: the job keeps running unobserved.
#[derive(Debug, Clone, Default)]
pub struct EventSink {
    tx: Option<Sender<JobEvent>>,
}

impl EventSink {
    pub fn new(tx: Sender<JobEvent>) -> Self {
        Self { tx: Some(tx) }
    }

    /// A sink that only logs.
    pub fn discard() -> Self {
        Self { tx: None }
    }

    pub fn emit(&self, event: JobEvent) {
        if let Some(tx) = &self.tx {
            let _ = tx.send(event);
        }
    }

    pub fn info(&self, message: impl Into<String>) {
        let message = message.into();
        info!("{message}");
        self.log(LogLevel::Info, message);
    }

    pub fn warn(&self, message: impl Into<String>) {
        let message = message.into();
        warn!("{message}");
        self.log(LogLevel::Warn, message);
    }

    pub fn error(&self, message: impl Into<String>) {
        let message = message.into();
        error!("{message}");
        self.log(LogLevel::Error, message);
    }

    fn log(&self, level: LogLevel, message: String) {
        self.emit(JobEvent::Log { level, message });
    }
}
