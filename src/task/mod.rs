/// Progress-tracked ingest stages
///
/// This module handles:
/// - The task state machine: step counters, status, ETA (this file)
/// - Sequencing tasks and halting on the first failure (pipeline.rs)
/// - The concrete stages: card check, copy, geotag, thumbnails

use chrono::{DateTime, Duration, Utc};
use std::cell::RefCell;
use std::path::PathBuf;
use std::rc::Rc;
use tracing::{error, info, warn};

use crate::media::scan;
use crate::Result;

pub mod copy;
pub mod geotag;
pub mod mount;
pub mod pipeline;
pub mod thumbnail;

pub use pipeline::{Pipeline, PipelineReport};

/// Where a task is in its lifecycle. Idle -> Running -> Done | Error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskStatus {
    Idle,
    Running,
    Done,
    Error,
}

/// Time estimate for a task
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Estimate {
    /// Still running; linear extrapolation of what is left
    Remaining(Duration),
    /// Finished; how long the whole run took
    Elapsed(Duration),
}

/// Progress bookkeeping shared by every task.
#[derive(Debug, Clone)]
pub struct TaskState {
    title: String,
    description: String,
    total: usize,
    completed: usize,
    status: TaskStatus,
    started: Option<DateTime<Utc>>,
    ended: Option<DateTime<Utc>>,
    /// Precondition failure found by `prepare`; the run ends in Error
    blocked: Option<String>,
}

impl TaskState {
    pub fn new(title: impl Into<String>, total: usize) -> Self {
        TaskState {
            title: title.into(),
            description: String::new(),
            total,
            completed: 0,
            status: TaskStatus::Idle,
            started: None,
            ended: None,
            blocked: None,
        }
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn set_description(&mut self, description: impl Into<String>) {
        self.description = description.into();
    }

    pub fn total(&self) -> usize {
        self.total
    }

    pub fn completed(&self) -> usize {
        self.completed
    }

    pub fn status(&self) -> TaskStatus {
        self.status
    }

    pub fn started(&self) -> Option<DateTime<Utc>> {
        self.started
    }

    pub fn ended(&self) -> Option<DateTime<Utc>> {
        self.ended
    }

    /// Fix the step count once `prepare` has discovered it. Ignored once
    /// the task has started.
    pub fn set_total(&mut self, total: usize) {
        if self.status != TaskStatus::Idle {
            warn!("Ignoring step count change for running task '{}'", self.title);
            return;
        }
        self.total = total;
        self.completed = self.completed.min(total);
    }

    /// One more step done; never goes past the total.
    pub fn increment(&mut self) {
        if self.completed < self.total {
            self.completed += 1;
        }
    }

    /// Increment and report to the progress callback
    pub fn advance(&mut self, progress: &mut dyn FnMut(&TaskState)) {
        self.increment();
        progress(self);
    }

    pub fn is_over(&self) -> bool {
        self.completed >= self.total
    }

    /// Record a precondition failure. The description carries the reason and
    /// the task keeps at least one outstanding step so it is not skipped.
    pub fn block(&mut self, reason: impl Into<String>) {
        let reason = reason.into();
        warn!("{}: {}", self.title, reason);
        self.description = reason.clone();
        self.blocked = Some(reason);
        if self.total == 0 {
            self.total = 1;
        }
    }

    pub fn unblock(&mut self) {
        self.blocked = None;
    }

    pub fn blocked(&self) -> Option<&str> {
        self.blocked.as_deref()
    }

    pub fn estimate_remaining(&self) -> Option<Estimate> {
        self.estimate_remaining_at(Utc::now())
    }

    /// Linear ETA: `elapsed * (total - completed) / completed` while
    /// running, total elapsed time once finished, nothing otherwise.
    pub fn estimate_remaining_at(&self, now: DateTime<Utc>) -> Option<Estimate> {
        let started = self.started?;

        if self.completed >= self.total {
            return self.ended.map(|ended| Estimate::Elapsed(ended - started));
        }
        if self.completed == 0 {
            return None;
        }

        let elapsed = now - started;
        let remaining = (self.total - self.completed) as i64;
        let completed = self.completed as i64;
        let estimate = match elapsed.num_microseconds() {
            Some(us) => Duration::microseconds(us.saturating_mul(remaining) / completed),
            None => Duration::milliseconds(
                elapsed.num_milliseconds().saturating_mul(remaining) / completed,
            ),
        };
        // Steps remain, so never report nothing left
        Some(Estimate::Remaining(estimate.max(Duration::microseconds(1))))
    }

    fn begin(&mut self, now: DateTime<Utc>) {
        self.started = Some(now);
        self.ended = None;
        self.status = TaskStatus::Running;
    }

    fn finish(&mut self, now: DateTime<Utc>, failure: Option<String>) {
        self.ended = Some(now);
        match failure {
            None if self.is_over() => self.status = TaskStatus::Done,
            None => {
                self.status = TaskStatus::Error;
                self.description = format!(
                    "Stopped after {} of {} steps",
                    self.completed, self.total
                );
            }
            Some(reason) => {
                self.status = TaskStatus::Error;
                self.description = reason;
            }
        }
    }
}

/// A stage of the ingest pipeline.
///
/// Implementors provide `prepare` (discover work, check preconditions) and
/// `execute` (do the work, advancing the step counter). `run` wraps
/// `execute` with the state transitions and never lets an error escape.
pub trait Task {
    fn state(&self) -> &TaskState;

    fn state_mut(&mut self) -> &mut TaskState;

    /// Side-effect-free setup. Problems go into the description via
    /// [`TaskState::block`]; the status is not touched.
    fn prepare(&mut self) {}

    fn execute(&mut self, progress: &mut dyn FnMut(&TaskState)) -> Result<()>;

    fn is_over(&self) -> bool {
        self.state().is_over()
    }

    fn run(&mut self, progress: &mut dyn FnMut(&TaskState)) {
        if self.state().status() != TaskStatus::Idle {
            warn!("Task '{}' has already run", self.state().title());
            return;
        }

        self.state_mut().begin(Utc::now());
        progress(self.state());

        let failure = match self.state().blocked().map(str::to_string) {
            Some(reason) => Some(reason),
            None => self.execute(progress).err().map(|e| e.to_string()),
        };

        self.state_mut().finish(Utc::now(), failure);

        let state = self.state();
        match state.status() {
            TaskStatus::Done => info!("✅ {}: {}", state.title(), state.description()),
            _ => error!("❌ {}: {}", state.title(), state.description()),
        }
        progress(state);
    }
}

/// Destination paths published by the copy stage for the stages after it
pub type Manifest = Rc<RefCell<Vec<PathBuf>>>;

pub fn new_manifest() -> Manifest {
    Rc::new(RefCell::new(Vec::new()))
}

/// Where a stage gets its photographs from
#[derive(Debug, Clone)]
pub enum PhotoSource {
    /// Every image under a directory
    Directory { dir: PathBuf, extensions: Vec<String> },
    /// Whatever an earlier stage planned to produce
    Manifest(Manifest),
}

impl PhotoSource {
    pub fn list(&self) -> Result<Vec<PathBuf>> {
        match self {
            PhotoSource::Directory { dir, extensions } => scan::list_files(dir, extensions),
            PhotoSource::Manifest(manifest) => Ok(manifest.borrow().clone()),
        }
    }
}
