//! Terminal presentation of task progress: labels, colours and ETA text.

use chrono::Duration;
use std::io::{self, Write};

use crate::task::{Estimate, TaskState, TaskStatus};

const RESET: &str = "\x1b[0m";

pub fn status_label(state: &TaskState) -> &'static str {
    match state.status() {
        TaskStatus::Idle if state.is_over() => "Skipped",
        TaskStatus::Idle => "Waiting",
        TaskStatus::Running => "Running",
        TaskStatus::Done => "Done",
        TaskStatus::Error => "Failed",
    }
}

/// ANSI colour escape for a status
pub fn status_color(status: TaskStatus) -> &'static str {
    match status {
        TaskStatus::Idle => "\x1b[90m",
        TaskStatus::Running => "\x1b[33m",
        TaskStatus::Done => "\x1b[32m",
        TaskStatus::Error => "\x1b[31m",
    }
}

/// "1:02:03" above an hour, "2:03" below
pub fn format_duration(duration: Duration) -> String {
    let secs = duration.num_seconds().max(0);
    let (h, m, s) = (secs / 3600, (secs % 3600) / 60, secs % 60);
    if h > 0 {
        format!("{}:{:02}:{:02}", h, m, s)
    } else {
        format!("{}:{:02}", m, s)
    }
}

pub fn format_estimate(estimate: Estimate) -> String {
    match estimate {
        Estimate::Remaining(d) => format!("ETA {}", format_duration(d)),
        Estimate::Elapsed(d) => format!("took {}", format_duration(d)),
    }
}

/// One status line, e.g. `Copy photos        [ 12/40] Running  ETA 0:34  ...`
pub fn render_line(state: &TaskState, color: bool) -> String {
    let width = state.total().to_string().len();
    let estimate = state
        .estimate_remaining()
        .map(format_estimate)
        .unwrap_or_default();

    let label = status_label(state);
    let label = if color {
        format!("{}{:<8}{}", status_color(state.status()), label, RESET)
    } else {
        format!("{:<8}", label)
    };

    format!(
        "{:<18} [{:>w$}/{}] {} {:<10} {}",
        state.title(),
        state.completed(),
        state.total(),
        label,
        estimate,
        state.description(),
        w = width
    )
}

/// Redraws the current task's line in place and leaves a permanent line
/// once a task stops running.
pub struct TerminalProgress {
    color: bool,
}

impl TerminalProgress {
    pub fn new(color: bool) -> Self {
        TerminalProgress { color }
    }

    pub fn update(&mut self, state: &TaskState) {
        let line = render_line(state, self.color);
        let mut out = io::stdout().lock();
        // Progress output is best-effort; a closed stdout must not stop ingest
        let _ = match state.status() {
            TaskStatus::Running => write!(out, "\r\x1b[2K{}", line),
            _ => writeln!(out, "\r\x1b[2K{}", line),
        };
        let _ = out.flush();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_duration() {
        assert_eq!(format_duration(Duration::seconds(0)), "0:00");
        assert_eq!(format_duration(Duration::seconds(75)), "1:15");
        assert_eq!(format_duration(Duration::seconds(3723)), "1:02:03");
        assert_eq!(format_duration(Duration::seconds(-5)), "0:00");
    }

    #[test]
    fn test_labels() {
        let mut state = TaskState::new("Geotag photos", 3);
        assert_eq!(status_label(&state), "Waiting");
        state.set_total(0);
        assert_eq!(status_label(&state), "Skipped");
    }

    #[test]
    fn test_render_line_without_color() {
        let mut state = TaskState::new("Copy photos", 12);
        state.set_description("12 photos and 0 track logs to /photos");
        state.increment();

        let line = render_line(&state, false);
        assert!(line.starts_with("Copy photos"));
        assert!(line.contains("[ 1/12] Waiting"));
        assert!(line.ends_with("12 photos and 0 track logs to /photos"));
        assert!(!line.contains('\x1b'));
    }
}
