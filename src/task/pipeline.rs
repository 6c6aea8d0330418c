//! Runs an ordered list of tasks, stopping at the first one that fails.

use tracing::{info, warn};

use super::{Task, TaskState};

/// An ordered, single-use sequence of tasks
#[derive(Default)]
pub struct Pipeline {
    tasks: Vec<Box<dyn Task>>,
}

/// What a pipeline run left behind
pub struct PipelineReport {
    pub tasks: Vec<Box<dyn Task>>,
    /// Index of the task that failed and stopped the run
    pub halted_at: Option<usize>,
}

impl PipelineReport {
    pub fn succeeded(&self) -> bool {
        self.halted_at.is_none()
    }

    /// The task that stopped the run, if any
    pub fn failed_task(&self) -> Option<&TaskState> {
        self.halted_at.map(|i| self.tasks[i].state())
    }
}

impl Pipeline {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, task: Box<dyn Task>) {
        self.tasks.push(task);
    }

    pub fn with(mut self, task: Box<dyn Task>) -> Self {
        self.push(task);
        self
    }

    /// Prepare every unfinished task, then run them in order. A task that
    /// is still not over after running halts the sequence.
    ///
    /// Consumes the pipeline: tasks are single-use.
    pub fn run(mut self, progress: &mut dyn FnMut(&TaskState)) -> PipelineReport {
        for task in self.tasks.iter_mut() {
            if !task.is_over() {
                task.prepare();
            }
            progress(task.state());
        }

        let mut halted_at = None;
        for (i, task) in self.tasks.iter_mut().enumerate() {
            if task.is_over() {
                continue;
            }
            task.run(progress);
            if !task.is_over() {
                halted_at = Some(i);
                break;
            }
        }

        match halted_at {
            Some(i) => warn!(
                "Pipeline stopped at '{}'; {} later task(s) not run",
                self.tasks[i].state().title(),
                self.tasks.len() - i - 1
            ),
            None => info!("Pipeline finished: {} task(s)", self.tasks.len()),
        }

        PipelineReport {
            tasks: self.tasks,
            halted_at,
        }
    }
}
