use super::events::{EventSink, JobEvent};
use crate::error::JobError;
use crate::progress::{ProgressSnapshot, ProgressState};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};
use tracing::{debug, info};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobOutcome {
    Completed,
    Stopped,
    Error,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobState {
    Idle,
    Running,
    Paused,
    Stopping,
    Finished(JobOutcome),
}

impl JobState {
    pub fn is_active(self) -> bool {
        matches!(self, JobState::Running | JobState::Paused | JobState::Stopping)
    }
}

impl fmt::Display for JobState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            JobState::Idle => f.write_str("idle"),
            JobState::Running => f.write_str("running"),
            JobState::Paused => f.write_str("paused"),
            JobState::Stopping => f.write_str("stopping"),
            JobState::Finished(o) => write!(f, "finished ({})", o.as_str()),
        }
    }
}

impl JobOutcome {
    pub fn as_str(self) -> &'static str {
        match self {
            JobOutcome::Completed => "completed",
            JobOutcome::Stopped => "stopped",
            JobOutcome::Error => "error",
        }
    }
}

/// What the worker does after a checkpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Continue,
    Stop,
}

/// A point where the worker yields to pause/stop requests.
pub trait Checkpoint {
    fn checkpoint(&self) -> Flow;
}

impl<F: Fn() -> Flow> Checkpoint for F {
    fn checkpoint(&self) -> Flow {
        self()
    }
}

struct Cell {
    state: JobState,
    progress: ProgressState,
}

/// State and clock of one controller, shared with its worker and ticker.
/// A single mutex guards both so transitions and timing never disagree.
pub(crate) struct JobShared {
    cell: Mutex<Cell>,
    changed: Condvar,
}

impl JobShared {
    pub(crate) fn new() -> Self {
        Self {
            cell: Mutex::new(Cell {
                state: JobState::Idle,
                progress: ProgressState::default(),
            }),
            changed: Condvar::new(),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Cell> {
        self.cell.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub(crate) fn state(&self) -> JobState {
        self.lock().state
    }

    pub(crate) fn snapshot(&self) -> ProgressSnapshot {
        self.lock().progress.snapshot(Instant::now())
    }

    pub(crate) fn begin(&self, total: usize) -> Result<(), JobError> {
        let mut cell = self.lock();
        if cell.state != JobState::Idle {
            return Err(JobError::InvalidTransition {
                action: "start",
                state: cell.state,
            });
        }
        cell.state = JobState::Running;
        cell.progress.start(total, Instant::now());
        self.changed.notify_all();
        Ok(())
    }

    pub(crate) fn pause(&self) -> Result<(), JobError> {
        let mut cell = self.lock();
        if cell.state != JobState::Running {
            return Err(JobError::InvalidTransition {
                action: "pause",
                state: cell.state,
            });
        }
        cell.state = JobState::Paused;
        cell.progress.pause(Instant::now());
        info!("pause requested");
        self.changed.notify_all();
        Ok(())
    }

    pub(crate) fn resume(&self) -> Result<(), JobError> {
        let mut cell = self.lock();
        if cell.state != JobState::Paused {
            return Err(JobError::InvalidTransition {
                action: "resume",
                state: cell.state,
            });
        }
        cell.state = JobState::Running;
        cell.progress.resume(Instant::now());
        info!("resumed");
        self.changed.notify_all();
        Ok(())
    }

    /// Idempotent while a stop is already pending.
    pub(crate) fn stop(&self) -> Result<(), JobError> {
        let mut cell = self.lock();
        match cell.state {
            JobState::Running | JobState::Paused => {
                cell.state = JobState::Stopping;
                cell.progress.resume(Instant::now());
                info!("stop requested");
                self.changed.notify_all();
                Ok(())
            }
            JobState::Stopping => Ok(()),
            state => Err(JobError::InvalidTransition {
                action: "stop",
                state,
            }),
        }
    }

    pub(crate) fn stop_requested(&self) -> bool {
        self.lock().state == JobState::Stopping
    }

    pub(crate) fn complete_one(&self) -> ProgressSnapshot {
        let mut cell = self.lock();
        cell.progress.complete_one();
        cell.progress.snapshot(Instant::now())
    }

    pub(crate) fn finish(&self, outcome: JobOutcome) -> ProgressSnapshot {
        let mut cell = self.lock();
        let now = Instant::now();
        cell.state = JobState::Finished(outcome);
        cell.progress.finish(now);
        self.changed.notify_all();
        cell.progress.snapshot(now)
    }

    pub(crate) fn reset(&self) -> Result<(), JobError> {
        let mut cell = self.lock();
        match cell.state {
            JobState::Idle | JobState::Finished(_) => {
                cell.state = JobState::Idle;
                cell.progress = ProgressState::default();
                self.changed.notify_all();
                Ok(())
            }
            state => Err(JobError::InvalidTransition {
                action: "reset",
                state,
            }),
        }
    }

    /// Sleeps up to `interval` (or until the state changes), then publishes a
    /// snapshot unless paused. The send happens under the lock, so no snapshot
    /// can follow the job's final event. Returns false once the job is over.
    pub(crate) fn tick(&self, interval: Duration, events: &EventSink) -> bool {
        let cell = self.lock();
        if !cell.state.is_active() {
            return false;
        }
        let (cell, _) = self
            .changed
            .wait_timeout(cell, interval)
            .unwrap_or_else(PoisonError::into_inner);
        match cell.state {
            JobState::Running | JobState::Stopping => {
                events.emit(JobEvent::Progress {
                    progress: cell.progress.snapshot(Instant::now()),
                });
                true
            }
            JobState::Paused => true,
            JobState::Idle | JobState::Finished(_) => false,
        }
    }
}

impl Checkpoint for JobShared {
    /// Parks the calling thread while paused.
    fn checkpoint(&self) -> Flow {
        let mut cell = self.lock();
        let mut parked = false;
        loop {
            match cell.state {
                JobState::Running => {
                    if parked {
                        debug!("worker leaving checkpoint");
                    }
                    return Flow::Continue;
                }
                JobState::Paused => {
                    if !parked {
                        debug!("worker parked at checkpoint");
                        parked = true;
                    }
                    cell = self
                        .changed
                        .wait(cell)
                        .unwrap_or_else(PoisonError::into_inner);
                }
                JobState::Stopping | JobState::Idle | JobState::Finished(_) => return Flow::Stop,
            }
        }
    }
}

/// Cloneable control surface for a running job. Never blocks.
#[derive(Clone)]
pub struct ControlHandle {
    pub(crate) shared: Arc<JobShared>,
}

impl ControlHandle {
    pub fn pause(&self) -> Result<(), JobError> {
        self.shared.pause()
    }

    pub fn resume(&self) -> Result<(), JobError> {
        self.shared.resume()
    }

    pub fn stop(&self) -> Result<(), JobError> {
        self.shared.stop()
    }

    pub fn state(&self) -> JobState {
        self.shared.state()
    }

    pub fn progress(&self) -> ProgressSnapshot {
        self.shared.snapshot()
    }
}
