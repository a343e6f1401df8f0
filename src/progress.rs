use serde::Serialize;
use std::time::{Duration, Instant};

/// Counters and clock for one job. All methods take `now` so the arithmetic
/// can be checked without sleeping.
#[derive(Debug, Clone, Default)]
pub struct ProgressState {
    total: usize,
    completed: usize,
    started: Option<Instant>,
    paused_total: Duration,
    paused_since: Option<Instant>,
    finished: Option<Instant>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProgressSnapshot {
    pub total: usize,
    pub completed: usize,
    pub remaining: usize,
    pub elapsed: Duration,
    /// Unknown until the first file completes.
    pub estimated_remaining: Option<Duration>,
}

impl ProgressSnapshot {
    pub fn percent(&self) -> f64 {
        if self.total == 0 {
            0.0
        } else {
            self.completed as f64 * 100.0 / self.total as f64
        }
    }
}

impl ProgressState {
    pub fn start(&mut self, total: usize, now: Instant) {
        *self = ProgressState {
            total,
            started: Some(now),
            ..Default::default()
        };
    }

    pub fn total(&self) -> usize {
        self.total
    }

    pub fn completed(&self) -> usize {
        self.completed
    }

    /// Never moves past `total`.
    pub fn complete_one(&mut self) {
        self.completed = (self.completed + 1).min(self.total);
    }

    pub fn pause(&mut self, now: Instant) {
        if self.paused_since.is_none() && self.finished.is_none() {
            self.paused_since = Some(now);
        }
    }

    /// Folds the paused interval into the baseline so it never counts as elapsed.
    pub fn resume(&mut self, now: Instant) {
        if let Some(since) = self.paused_since.take() {
            self.paused_total += now.saturating_duration_since(since);
        }
    }

    pub fn finish(&mut self, now: Instant) {
        self.resume(now);
        if self.finished.is_none() {
            self.finished = Some(now);
        }
    }

    pub fn is_paused(&self) -> bool {
        self.paused_since.is_some()
    }

    /// `now - start - paused`. Frozen while paused and after finishing.
    pub fn elapsed(&self, now: Instant) -> Duration {
        let Some(started) = self.started else {
            return Duration::ZERO;
        };
        let end = self.finished.or(self.paused_since).unwrap_or(now);
        end.saturating_duration_since(started)
            .saturating_sub(self.paused_total)
    }

    pub fn estimated_remaining(&self, now: Instant) -> Option<Duration> {
        if self.completed == 0 {
            return None;
        }
        let per_file = self.elapsed(now).as_secs_f64() / self.completed as f64;
        let left = self.total.saturating_sub(self.completed) as f64;
        Some(Duration::from_secs_f64(per_file * left))
    }

    pub fn snapshot(&self, now: Instant) -> ProgressSnapshot {
        ProgressSnapshot {
            total: self.total,
            completed: self.completed,
            remaining: self.total.saturating_sub(self.completed),
            elapsed: self.elapsed(now),
            estimated_remaining: self.estimated_remaining(now),
        }
    }
}
