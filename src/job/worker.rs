use crate::{
    config::RunConfig,
    engine::{Document, DocumentEngine, Recognizer},
    error::FileError,
    job::{
        events::{EventSink, JobEvent},
        state::{Checkpoint, Flow, JobOutcome, JobShared},
    },
    naming::OutputResolver,
    pipeline::{FileTask, Pipeline},
    queue::FileQueue,
    report::ReportBuilder,
    util::file_name_lossy,
};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

pub(crate) struct Worker<D: DocumentEngine, R: Recognizer> {
    pub shared: Arc<JobShared>,
    pub documents: Arc<D>,
    pub recognizer: Arc<R>,
    pub config: RunConfig,
    pub queue: FileQueue,
    pub events: EventSink,
}

pub(crate) struct WorkerOutput {
    pub report: ReportBuilder,
    pub setup_error: Option<String>,
}

impl<D: DocumentEngine, R: Recognizer> Worker<D, R> {
    pub fn run(self) -> WorkerOutput {
        let total = self.queue.len();

        let resolver = match self.setup() {
            Ok(resolver) => resolver,
            Err(message) => {
                self.events.error(format!("Job setup failed: {message}"));
                let progress = self.shared.finish(JobOutcome::Error);
                self.events.emit(JobEvent::Finished {
                    outcome: JobOutcome::Error,
                    progress,
                });
                return WorkerOutput {
                    report: ReportBuilder::default(),
                    setup_error: Some(message),
                };
            }
        };

        let pipeline = Pipeline::new(&self.config, &*self.documents, &*self.recognizer);
        let mut report = ReportBuilder::default();

        for (index, input) in self.queue.iter().enumerate() {
            if self.shared.checkpoint() == Flow::Stop {
                self.events.warn("Processing stopped by user.");
                break;
            }
            let name = file_name_lossy(input);
            self.events.emit(JobEvent::FileStarted {
                index,
                total,
                path: input.to_path_buf(),
            });
            self.events
                .info(format!("--- Starting: {name} ({}/{total}) ---", index + 1));

            let Some(task) = self.process_file(&pipeline, &resolver, index, input) else {
                self.events
                    .warn(format!("Stopped while processing {name}; no output written."));
                break;
            };

            let record = task.into_record();
            report.push(record.clone());
            let progress = self.shared.complete_one();
            self.events.emit(JobEvent::FileFinished {
                index,
                record,
                progress,
            });
        }

        let outcome = if self.shared.stop_requested() {
            JobOutcome::Stopped
        } else {
            JobOutcome::Completed
        };
        let progress = self.shared.finish(outcome);
        self.events.info(format!(
            "Job {}: {}/{} file(s) processed, {} failed.",
            outcome.as_str(),
            progress.completed,
            progress.total,
            report.failures()
        ));
        self.events.emit(JobEvent::Finished { outcome, progress });
        WorkerOutput {
            report,
            setup_error: None,
        }
    }

    /// Checks that every requested operation can run before any file is touched.
    fn setup(&self) -> Result<OutputResolver, String> {
        if self.config.operations.perform_recognition {
            let language = &self.config.recognition.language;
            let diag = self
                .recognizer
                .probe(language)
                .map_err(|e| format!("recognition engine: {e}"))?;
            self.events.info(format!(
                "Recognition engine ready: {} {} ({language})",
                diag.exe, diag.version
            ));
            self.documents
                .probe_rendering()
                .map_err(|e| format!("page rendering: {e}"))?;
        }
        OutputResolver::new(&self.config.output).map_err(|e| format!("{e:#}"))
    }

    /// `None` when a stop request abandoned the file.
    fn process_file(
        &self,
        pipeline: &Pipeline<'_, D, R>,
        resolver: &OutputResolver,
        index: usize,
        input: &Path,
    ) -> Option<FileTask> {
        let mut task = FileTask::new(input);
        pipeline.scan(&mut task, &self.events);

        let mutation = match pipeline.mutate(index, &mut task, &*self.shared, &self.events) {
            Ok(m) => m,
            Err(FileError::Stopped) => return None,
            Err(e) => {
                self.fail(&mut task, e);
                return Some(task);
            }
        };

        if let Some(mut mutation) = mutation {
            let written = resolver.write_output(input, |tmp| {
                mutation.document.save(tmp).map_err(FileError::from)
            });
            match written {
                Ok(path) => {
                    self.events.info(format!("Saved to: {}", path.display()));
                    task.first_page_removed = mutation.first_page_removed;
                    task.recognized = mutation.recognized;
                    task.output = Some(path);
                }
                Err(e) => self.fail(&mut task, e),
            }
        }
        Some(task)
    }

    fn fail(&self, task: &mut FileTask, err: FileError) {
        self.events.error(format!(
            "Failed processing {}: {err}",
            file_name_lossy(&task.input)
        ));
        task.failure = Some(err.to_string());
    }
}

/// Emits a progress snapshot every `interval` while the job runs, and stays
/// quiet while it is paused.
pub(crate) fn tick(shared: Arc<JobShared>, events: EventSink, interval: Duration) {
    while shared.tick(interval, &events) {}
}
