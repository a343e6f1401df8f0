//! The job controller: one batch at a time, driven on a worker thread.
//!
//! ```text
//! Idle --start--> Running <--pause/resume--> Paused
//!                    |                          |
//!                    +----------stop------------+--> Stopping
//!                    |                                  |
//!                    v                                  v
//!         Finished(Completed | Error)          Finished(Stopped)
//! ```
//!
//! Control calls never block. The worker only observes pause and stop at
//! checkpoints: between files and before each recognized page.

mod events;
mod state;
mod worker;

pub use events::{EventSink, JobEvent, LogLevel};
pub use state::{Checkpoint, ControlHandle, Flow, JobOutcome, JobState};

use crate::{
    config::RunConfig,
    engine::{DocumentEngine, Recognizer},
    error::JobError,
    progress::ProgressSnapshot,
    queue::FileQueue,
    report::ReportBuilder,
};
use serde::Serialize;
use state::JobShared;
use std::sync::{mpsc, Arc};
use std::thread::{self, JoinHandle};
use std::time::Duration;
use tracing::{info, warn};
use worker::{Worker, WorkerOutput};

pub const DEFAULT_TICK_INTERVAL: Duration = Duration::from_secs(1);

#[derive(Debug, Clone, Serialize)]
pub struct JobSummary {
    pub outcome: JobOutcome,
    pub progress: ProgressSnapshot,
    pub records: usize,
    pub failures: usize,
}

struct ActiveRun {
    worker: JoinHandle<WorkerOutput>,
    ticker: Option<JoinHandle<()>>,
}

struct FinishedRun {
    summary: JobSummary,
    report: ReportBuilder,
}

pub struct JobController<D: DocumentEngine, R: Recognizer> {
    documents: Arc<D>,
    recognizer: Arc<R>,
    shared: Arc<JobShared>,
    tick_interval: Duration,
    active: Option<ActiveRun>,
    finished: Option<FinishedRun>,
}

impl<D: DocumentEngine, R: Recognizer> JobController<D, R> {
    pub fn new(documents: D, recognizer: R) -> Self {
        Self::from_shared(Arc::new(documents), Arc::new(recognizer))
    }

    pub fn from_shared(documents: Arc<D>, recognizer: Arc<R>) -> Self {
        Self {
            documents,
            recognizer,
            shared: Arc::new(JobShared::new()),
            tick_interval: DEFAULT_TICK_INTERVAL,
            active: None,
            finished: None,
        }
    }

    pub fn with_tick_interval(mut self, interval: Duration) -> Self {
        self.tick_interval = interval;
        self
    }

    /// Validates the request, snapshots `config` and starts the worker.
    /// Events arrive on the returned receiver in emission order.
    pub fn start(
        &mut self,
        queue: FileQueue,
        config: RunConfig,
    ) -> Result<mpsc::Receiver<JobEvent>, JobError> {
        let state = self.shared.state();
        if state != JobState::Idle {
            return Err(JobError::InvalidTransition {
                action: "start",
                state,
            });
        }
        if queue.is_empty() {
            return Err(JobError::Validation("no input files selected".into()));
        }
        if !config.operations.any_selected() {
            return Err(JobError::Validation("no operation selected".into()));
        }

        let (tx, rx) = mpsc::channel();
        let events = EventSink::new(tx);
        let total = queue.len();
        self.shared.begin(total)?;
        info!(total, operations = ?config.operations, "starting job");
        events.emit(JobEvent::Started { total });

        let job = Worker {
            shared: Arc::clone(&self.shared),
            documents: Arc::clone(&self.documents),
            recognizer: Arc::clone(&self.recognizer),
            config,
            queue,
            events: events.clone(),
        };
        let worker = match thread::Builder::new()
            .name("pdf-batch-worker".into())
            .spawn(move || job.run())
        {
            Ok(handle) => handle,
            Err(e) => {
                self.shared.finish(JobOutcome::Error);
                return Err(JobError::SetupFatal(format!("spawning worker: {e}")));
            }
        };

        let shared = Arc::clone(&self.shared);
        let interval = self.tick_interval;
        let ticker = thread::Builder::new()
            .name("pdf-batch-ticker".into())
            .spawn(move || worker::tick(shared, events, interval))
            .map_err(|e| warn!("progress ticker unavailable: {e}"))
            .ok();

        self.finished = None;
        self.active = Some(ActiveRun { worker, ticker });
        Ok(rx)
    }

    pub fn pause(&self) -> Result<(), JobError> {
        self.shared.pause()
    }

    pub fn resume(&self) -> Result<(), JobError> {
        self.shared.resume()
    }

    pub fn stop(&self) -> Result<(), JobError> {
        self.shared.stop()
    }

    /// For driving pause/resume/stop from another thread while [`Self::wait`] blocks.
    pub fn handle(&self) -> ControlHandle {
        ControlHandle {
            shared: Arc::clone(&self.shared),
        }
    }

    pub fn state(&self) -> JobState {
        self.shared.state()
    }

    pub fn progress(&self) -> ProgressSnapshot {
        self.shared.snapshot()
    }

    /// Blocks until the worker exits. A job that could not get past setup
    /// yields [`JobError::SetupFatal`]; every other ending is a summary.
    pub fn wait(&mut self) -> Result<JobSummary, JobError> {
        let Some(active) = self.active.take() else {
            return match &self.finished {
                Some(run) => Ok(run.summary.clone()),
                None => Err(JobError::InvalidTransition {
                    action: "wait",
                    state: self.shared.state(),
                }),
            };
        };

        let joined = active.worker.join();
        if joined.is_err() {
            self.shared.finish(JobOutcome::Error);
        }
        if let Some(ticker) = active.ticker {
            let _ = ticker.join();
        }
        let output = joined.map_err(|_| JobError::WorkerPanicked)?;

        let outcome = match self.shared.state() {
            JobState::Finished(outcome) => outcome,
            _ => JobOutcome::Error,
        };
        let summary = JobSummary {
            outcome,
            progress: self.shared.snapshot(),
            records: output.report.len(),
            failures: output.report.failures(),
        };
        self.finished = Some(FinishedRun {
            summary: summary.clone(),
            report: output.report,
        });
        match output.setup_error {
            Some(message) => Err(JobError::SetupFatal(message)),
            None => Ok(summary),
        }
    }

    /// Records of the last job, offered only when it completed or was stopped
    /// and processed at least one file.
    pub fn report(&self) -> Option<&ReportBuilder> {
        let run = self.finished.as_ref()?;
        let exportable = matches!(
            run.summary.outcome,
            JobOutcome::Completed | JobOutcome::Stopped
        );
        (exportable && !run.report.is_empty()).then_some(&run.report)
    }

    /// Back to `Idle`, discarding records and progress. Refused while a job is active.
    pub fn reset(&mut self) -> Result<(), JobError> {
        let state = self.shared.state();
        if state.is_active() {
            return Err(JobError::InvalidTransition {
                action: "reset",
                state,
            });
        }
        if self.active.is_some() {
            // Finished but never waited on: reap the threads first.
            let _ = self.wait();
        }
        self.shared.reset()?;
        self.finished = None;
        Ok(())
    }
}

impl<D: DocumentEngine, R: Recognizer> Drop for JobController<D, R> {
    fn drop(&mut self) {
        if let Some(active) = self.active.take() {
            let _ = self.shared.stop();
            let _ = active.worker.join();
            if let Some(ticker) = active.ticker {
                let _ = ticker.join();
            }
        }
    }
}
