use std::path::PathBuf;

use super::{Task, TaskState};
use crate::{Error, Result};

/// Checks that the camera card (or transfer folder) is reachable.
pub struct MountCheckTask {
    state: TaskState,
    path: PathBuf,
}

impl MountCheckTask {
    pub fn new(path: PathBuf) -> Self {
        MountCheckTask {
            state: TaskState::new("Check card", 1),
            path,
        }
    }
}

impl Task for MountCheckTask {
    fn state(&self) -> &TaskState {
        &self.state
    }

    fn state_mut(&mut self) -> &mut TaskState {
        &mut self.state
    }

    fn prepare(&mut self) {
        self.state.unblock();
        if self.path.is_dir() {
            self.state
                .set_description(format!("Card mounted at {}", self.path.display()));
        } else {
            self.state
                .block(format!("{} is not mounted", self.path.display()));
        }
    }

    fn execute(&mut self, progress: &mut dyn FnMut(&TaskState)) -> Result<()> {
        // The card may have been pulled since prepare
        if !self.path.is_dir() {
            return Err(Error::Precondition(format!(
                "{} is no longer mounted",
                self.path.display()
            )));
        }
        self.state.advance(progress);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::task::TaskStatus;

    #[test]
    fn test_mounted() {
        let dir = tempfile::tempdir().unwrap();
        let mut task = MountCheckTask::new(dir.path().to_path_buf());
        task.prepare();
        assert!(task.state().description().starts_with("Card mounted"));

        task.run(&mut |_| {});
        assert_eq!(task.state().status(), TaskStatus::Done);
    }

    #[test]
    fn test_not_mounted() {
        let dir = tempfile::tempdir().unwrap();
        let mut task = MountCheckTask::new(dir.path().join("NIKON D850"));
        task.prepare();
        assert_eq!(task.state().status(), TaskStatus::Idle);
        assert!(task.state().description().ends_with("is not mounted"));

        task.run(&mut |_| {});
        assert_eq!(task.state().status(), TaskStatus::Error);
        assert!(!task.is_over());
    }
}
