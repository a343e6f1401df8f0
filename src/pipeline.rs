use crate::{
    config::RunConfig,
    engine::{Document, DocumentEngine, EngineError, Recognizer},
    error::FileError,
    job::{Checkpoint, EventSink, Flow, JobEvent},
    report::{LogRecord, RecordStatus},
    util::file_name_lossy,
};
use std::path::{Path, PathBuf};
use tracing::debug;

/// What the scan stage learned about a file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScanOutcome {
    NotRequested,
    /// The scan was requested but the document could not be read.
    Unavailable {
        reason: String,
        ignore_first_page: bool,
    },
    Counted {
        pages_lacking_text: u32,
        first_page_ignored: bool,
    },
}

/// Per-file working state, folded into a [`LogRecord`] once the file is done.
#[derive(Debug, Clone)]
pub struct FileTask {
    pub input: PathBuf,
    pub scan: ScanOutcome,
    pub first_page_removed: bool,
    pub recognized: bool,
    pub output: Option<PathBuf>,
    pub failure: Option<String>,
    pub warnings: Vec<String>,
}

impl FileTask {
    pub fn new(input: &Path) -> Self {
        Self {
            input: input.to_path_buf(),
            scan: ScanOutcome::NotRequested,
            first_page_removed: false,
            recognized: false,
            output: None,
            failure: None,
            warnings: Vec::new(),
        }
    }

    pub fn into_record(self) -> LogRecord {
        let original_filename = file_name_lossy(&self.input);
        let new_filename = self
            .output
            .as_deref()
            .map(file_name_lossy)
            .unwrap_or_else(|| original_filename.clone());
        let (scanned, first_page_ignored_in_scan, pages_lacking_text, scan_available) =
            match self.scan {
                ScanOutcome::NotRequested => (false, None, 0, false),
                ScanOutcome::Unavailable {
                    ignore_first_page, ..
                } => (true, Some(ignore_first_page), 0, false),
                ScanOutcome::Counted {
                    pages_lacking_text,
                    first_page_ignored,
                } => (true, Some(first_page_ignored), pages_lacking_text, true),
            };
        let status = match self.failure {
            Some(reason) => RecordStatus::Failed { reason },
            None => RecordStatus::Ok,
        };
        LogRecord {
            original_filename,
            scanned,
            first_page_ignored_in_scan,
            pages_lacking_text,
            scan_available,
            recognized: self.recognized,
            first_page_removed: self.first_page_removed,
            new_filename,
            output_path: self.output,
            status,
            warnings: self.warnings,
        }
    }
}

/// A modified document waiting to be written. Its flags reach the record
/// only once the write succeeds.
pub struct Mutation<T> {
    pub document: T,
    pub first_page_removed: bool,
    pub recognized: bool,
}

/// The scan and mutate stages for one file. Writing the result is the
/// caller's job, so the pipeline never touches the output location.
pub struct Pipeline<'a, D: DocumentEngine, R: Recognizer> {
    config: &'a RunConfig,
    documents: &'a D,
    recognizer: &'a R,
}

impl<'a, D: DocumentEngine, R: Recognizer> Pipeline<'a, D, R> {
    pub fn new(config: &'a RunConfig, documents: &'a D, recognizer: &'a R) -> Self {
        Self {
            config,
            documents,
            recognizer,
        }
    }

    /// Counts pages without extractable text. Read-only; a failure only marks
    /// the scan unavailable and never fails the file.
    pub fn scan(&self, task: &mut FileTask, events: &EventSink) {
        let ops = &self.config.operations;
        if !ops.scan_for_missing_text {
            return;
        }
        events.info("Scanning for pages lacking text...");
        match self.count_pages_lacking_text(&task.input) {
            Ok((pages_lacking_text, first_page_ignored)) => {
                events.info(format!("Scan result: {pages_lacking_text} page(s) lack text."));
                task.scan = ScanOutcome::Counted {
                    pages_lacking_text,
                    first_page_ignored,
                };
            }
            Err(e) => {
                let reason = e.to_string();
                events.warn(format!("Scan unavailable: {reason}"));
                task.warnings.push(format!("scan unavailable: {reason}"));
                task.scan = ScanOutcome::Unavailable {
                    reason,
                    ignore_first_page: ops.ignore_first_page_in_scan,
                };
            }
        }
    }

    fn count_pages_lacking_text(&self, input: &Path) -> Result<(u32, bool), EngineError> {
        let doc = self.documents.open(input)?;
        let pages = doc.page_count();
        let skip_first = self.config.operations.ignore_first_page_in_scan && pages > 1;
        let first = usize::from(skip_first);
        let mut lacking = 0u32;
        for index in first..pages {
            if !doc.page_has_text(index)? {
                lacking += 1;
            }
        }
        debug!(pages, skip_first, lacking, "scan counted");
        Ok((lacking, skip_first))
    }

    /// Applies the selected mutations to a working copy of the file.
    /// Returns `None` when nothing was changed.
    ///
    /// The checkpoint is consulted before every recognized page; a stop there
    /// abandons the file with [`FileError::Stopped`].
    pub fn mutate(
        &self,
        index: usize,
        task: &mut FileTask,
        checkpoint: &dyn Checkpoint,
        events: &EventSink,
    ) -> Result<Option<Mutation<D::Doc>>, FileError> {
        let ops = &self.config.operations;
        if !ops.mutates() {
            return Ok(None);
        }
        let mut doc = self.documents.open(&task.input)?;

        let mut first_page_removed = false;
        if ops.remove_first_page {
            if doc.page_count() > 1 {
                events.info("Removing first page...");
                doc.delete_page(0)?;
                first_page_removed = true;
            } else {
                events.info("Skipping first page removal (single page document).");
                task.warnings
                    .push("first page kept: document has a single page".to_string());
            }
        }

        if ops.perform_recognition {
            let document = self.recognize_pages(index, &doc, checkpoint, events)?;
            return Ok(Some(Mutation {
                document,
                first_page_removed,
                recognized: true,
            }));
        }

        Ok(first_page_removed.then_some(Mutation {
            document: doc,
            first_page_removed,
            recognized: false,
        }))
    }

    fn recognize_pages(
        &self,
        index: usize,
        doc: &D::Doc,
        checkpoint: &dyn Checkpoint,
        events: &EventSink,
    ) -> Result<D::Doc, FileError> {
        let params = &self.config.recognition;
        let pages = doc.page_count();
        events.info(format!(
            "Performing OCR on {pages} page(s) at {} DPI ({})...",
            params.dpi, params.language
        ));
        let mut out = self.documents.create()?;
        for page in 0..pages {
            if checkpoint.checkpoint() == Flow::Stop {
                return Err(FileError::Stopped);
            }
            let raster = doc.render_page(page, params.dpi)?;
            let pdf = self.recognizer.recognize(&raster, &params.language)?;
            out.append_pdf_page(&pdf)?;
            events.emit(JobEvent::PageRecognized {
                index,
                page: page + 1,
                pages,
            });
        }
        Ok(out)
    }
}
